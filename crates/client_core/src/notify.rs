use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::{sync::watch, task::JoinHandle};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub text: String,
}

impl Notification {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            text: text.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == NotificationKind::Error
    }
}

#[derive(Default)]
struct Slot {
    seq: u64,
    shown: u64,
    timer: Option<JoinHandle<()>>,
}

/// Single-slot transient message with timed auto-clear. Last writer wins.
///
/// Requires a tokio runtime: every `notify` spawns the expiry task.
pub struct NotificationChannel {
    ttl: Duration,
    slot: Arc<Mutex<Slot>>,
    current: Arc<watch::Sender<Option<Notification>>>,
}

impl NotificationChannel {
    pub fn new(ttl: Duration) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            ttl,
            slot: Arc::new(Mutex::new(Slot::default())),
            current: Arc::new(current),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of notifications shown since creation.
    pub fn shown(&self) -> u64 {
        lock(&self.slot).shown
    }

    pub fn current(&self) -> Option<Notification> {
        self.current.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Notification>> {
        self.current.subscribe()
    }

    pub fn notify(&self, notification: Notification) {
        let mut slot = lock(&self.slot);
        if let Some(previous) = slot.timer.take() {
            previous.abort();
        }
        slot.seq += 1;
        slot.shown += 1;
        let seq = slot.seq;
        debug!(
            seq,
            kind = ?notification.kind,
            text = %notification.text,
            "notification: shown"
        );
        self.current.send_replace(Some(notification));

        let ttl = self.ttl;
        let slot_ref = Arc::clone(&self.slot);
        let current = Arc::clone(&self.current);
        slot.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let mut slot = lock(&slot_ref);
            // A newer notify may have raced past the abort.
            if slot.seq != seq {
                return;
            }
            slot.timer = None;
            current.send_replace(None);
            debug!(seq, "notification: expired");
        }));
    }

    pub fn success(&self, text: impl Into<String>) {
        self.notify(Notification::success(text));
    }

    pub fn error(&self, text: impl Into<String>) {
        self.notify(Notification::error(text));
    }

    pub fn dismiss(&self) {
        let mut slot = lock(&self.slot);
        if let Some(timer) = slot.timer.take() {
            timer.abort();
        }
        slot.seq += 1;
        self.current.send_if_modified(|current| current.take().is_some());
    }
}

impl Drop for NotificationChannel {
    fn drop(&mut self) {
        if let Some(timer) = lock(&self.slot).timer.take() {
            timer.abort();
        }
    }
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[path = "tests/notify_tests.rs"]
mod tests;
