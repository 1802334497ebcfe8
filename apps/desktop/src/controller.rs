//! Turns UI commands into core intents and keeps the selection in step with
//! their outcomes.

use std::sync::Arc;

use client_core::DirectoryHandle;
use shared::domain::UserId;
use tokio::sync::watch;
use tracing::debug;

use crate::{
    commands::{UiCommand, HELP},
    view::Selection,
};

pub struct Controller {
    directory: Arc<dyn DirectoryHandle>,
    selection: watch::Sender<Selection>,
}

impl Controller {
    pub fn new(directory: Arc<dyn DirectoryHandle>) -> Arc<Self> {
        let (selection, _) = watch::channel(Selection::default());
        Arc::new(Self {
            directory,
            selection,
        })
    }

    pub fn directory(&self) -> &Arc<dyn DirectoryHandle> {
        &self.directory
    }

    pub fn selection(&self) -> Selection {
        self.selection.borrow().clone()
    }

    pub fn subscribe_selection(&self) -> watch::Receiver<Selection> {
        self.selection.subscribe()
    }

    /// Runs one command to completion. Returns a line of feedback for the
    /// console when there is something to say that the render does not show.
    pub async fn handle(&self, command: UiCommand) -> Option<String> {
        debug!(command = command.name(), "ui: handling command");
        match command {
            UiCommand::Add { name: None } => {
                self.selection.send_modify(Selection::open_add);
                None
            }
            UiCommand::Add { name: Some(name) } => {
                self.selection.send_modify(Selection::open_add);
                self.submit_add(name).await;
                None
            }
            UiCommand::Save { name } => {
                let selection = self.selection();
                if let Some(target) = selection.edit_target {
                    self.submit_edit(target.id, name).await;
                    None
                } else if selection.add_modal_open {
                    self.submit_add(name).await;
                    None
                } else {
                    Some("nothing to save; open 'add' or 'edit <id>' first".to_string())
                }
            }
            UiCommand::Edit { id } => match self.directory.snapshot().get(id) {
                Some(record) => {
                    let record = record.clone();
                    self.selection.send_modify(|s| s.open_edit(record));
                    None
                }
                None => Some(format!("no user with id {id}")),
            },
            UiCommand::Delete { id } => {
                if !self.directory.snapshot().contains(id) {
                    return Some(format!("no user with id {id}"));
                }
                self.selection.send_modify(|s| s.open_delete(id));
                None
            }
            UiCommand::Confirm => match self.selection().delete_target {
                Some(id) => {
                    self.submit_delete(id).await;
                    None
                }
                None => Some("nothing to confirm; use 'delete <id>' first".to_string()),
            },
            UiCommand::Cancel => {
                self.selection.send_if_modified(|s| {
                    let before = s.clone();
                    s.close_overlays();
                    *s != before
                });
                None
            }
            UiCommand::Dismiss => {
                self.directory.dismiss_notification();
                None
            }
            UiCommand::Reload => {
                if let Err(err) = self.directory.load().await {
                    debug!(error = %err, "ui: reload failed");
                }
                None
            }
            UiCommand::Help => Some(HELP.to_string()),
            UiCommand::List | UiCommand::Quit => None,
        }
    }

    async fn submit_add(&self, name: String) {
        self.selection
            .send_modify(|s| s.add_draft.clone_from(&name));
        match self.directory.create(&name).await {
            Ok(record) => {
                debug!(id = record.id.0, "ui: add modal closed");
                self.selection.send_modify(|s| {
                    s.add_modal_open = false;
                    s.add_draft.clear();
                });
            }
            Err(err) => debug!(error = %err, "ui: add modal kept open"),
        }
    }

    async fn submit_edit(&self, id: UserId, name: String) {
        self.selection.send_modify(|s| {
            if let Some(target) = s.edit_target.as_mut().filter(|t| t.id == id) {
                target.name.clone_from(&name);
            }
        });
        match self.directory.update(id, &name).await {
            Ok(_) => {
                self.selection.send_if_modified(|s| {
                    if s.edit_target.as_ref().is_some_and(|t| t.id == id) {
                        s.edit_target = None;
                        return true;
                    }
                    false
                });
            }
            Err(err) => debug!(error = %err, id = id.0, "ui: edit overlay kept open"),
        }
    }

    async fn submit_delete(&self, id: UserId) {
        match self.directory.delete(id).await {
            Ok(()) => {
                self.selection.send_if_modified(|s| {
                    if s.delete_target == Some(id) {
                        s.delete_target = None;
                        return true;
                    }
                    false
                });
            }
            Err(err) => debug!(error = %err, id = id.0, "ui: delete overlay kept open"),
        }
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
