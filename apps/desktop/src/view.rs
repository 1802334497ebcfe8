//! Pure rendering of cache, notification and selection state.

use std::fmt::Write as _;

use client_core::{CacheSnapshot, Notification, NotificationKind, PendingKind};
use shared::domain::{UserId, UserRecord};

/// Transient selection owned by the view, never by the core.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub add_modal_open: bool,
    pub add_draft: String,
    pub edit_target: Option<UserRecord>,
    pub delete_target: Option<UserId>,
}

impl Selection {
    pub fn open_add(&mut self) {
        self.close_overlays();
        self.add_modal_open = true;
    }

    pub fn open_edit(&mut self, record: UserRecord) {
        self.close_overlays();
        self.edit_target = Some(record);
    }

    pub fn open_delete(&mut self, id: UserId) {
        self.close_overlays();
        self.delete_target = Some(id);
    }

    /// Closes whatever is open. The add draft survives a cancel.
    pub fn close_overlays(&mut self) {
        self.add_modal_open = false;
        self.edit_target = None;
        self.delete_target = None;
    }

    pub fn is_idle(&self) -> bool {
        !self.add_modal_open && self.edit_target.is_none() && self.delete_target.is_none()
    }
}

pub fn render(
    snapshot: &CacheSnapshot,
    notification: Option<&Notification>,
    selection: &Selection,
) -> String {
    let mut out = String::new();

    if let Some(notification) = notification {
        let tag = match notification.kind {
            NotificationKind::Success => "OK",
            NotificationKind::Error => "ERROR",
        };
        let _ = writeln!(out, "[{tag}] {}  (dismiss)", notification.text);
    }

    let _ = writeln!(out, "Candidate List:");
    if snapshot.is_loading() && !snapshot.is_loaded() {
        let _ = writeln!(out, "  Loading users...");
    }
    if snapshot.list_error().is_some() {
        let _ = writeln!(out, "  Error fetching users!");
    }
    for record in snapshot.records() {
        let marker = match snapshot.pending(record.id) {
            Some(PendingKind::Update) => "  (saving...)",
            Some(PendingKind::Delete) => "  (deleting...)",
            None => "",
        };
        let _ = writeln!(out, "  [{}] {}{marker}", record.id, record.name);
    }
    if snapshot.pending_creates() > 0 {
        let _ = writeln!(out, "  (adding {} user(s)...)", snapshot.pending_creates());
    }

    if selection.add_modal_open {
        let _ = writeln!(out, "-- Add New User --");
        let _ = writeln!(out, "  name: {}", selection.add_draft);
        let _ = writeln!(out, "  save <name> | cancel");
    }
    if let Some(target) = &selection.edit_target {
        let _ = writeln!(out, "-- Edit User [{}] --", target.id);
        let _ = writeln!(out, "  name: {}", target.name);
        let _ = writeln!(out, "  save <name> | cancel");
    }
    if selection.delete_target.is_some() {
        let _ = writeln!(out, "-- Confirm Deletion --");
        let _ = writeln!(out, "  Are you sure you want to delete this user?");
        let _ = writeln!(out, "  confirm | cancel");
    }
    if selection.is_idle() {
        let _ = writeln!(out, "add [name] | edit <id> | delete <id> | help");
    }

    out
}

#[cfg(test)]
#[path = "tests/view_tests.rs"]
mod tests;
