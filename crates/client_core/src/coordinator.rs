//! Turns user intents into remote calls and confirmed cache patches.
//!
//! Every intent walks `Validating -> Sending -> {Applied, Failed}`. Patches are
//! applied only after the remote confirms: no optimistic writes, so nothing is
//! ever rolled back. Failures are reported on the notification channel and
//! returned to the caller; they go no further.

use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};

use chrono::Utc;
use shared::domain::{UserDraft, UserId, UserRecord};
use tracing::{info, instrument, warn};

use crate::{
    cache::{EntityCache, PendingKind},
    error::{FetchError, IntentError, ListError, ValidationError},
    notify::NotificationChannel,
    remote::RemoteCollection,
};

pub const MSG_EMPTY_NAME: &str = "User name cannot be empty!";
pub const MSG_ADDED: &str = "User added successfully!";
pub const MSG_ADD_FAILED: &str = "Failed to add user!";
pub const MSG_UPDATED: &str = "User updated successfully!";
pub const MSG_UPDATE_FAILED: &str = "Failed to update user!";
pub const MSG_DELETED: &str = "User deleted successfully!";
pub const MSG_DELETE_FAILED: &str = "Failed to delete user!";
pub const MSG_LIST_FAILED: &str = "Failed to fetch users!";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Create { name: String },
    Update { id: UserId, name: String },
    Delete { id: UserId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentPhase {
    Validating,
    Sending,
    Applied,
    Failed,
}

/// Source of provisional ids.
pub trait IdSource: Send + Sync {
    fn next_id(&self) -> UserId;
}

/// Wall-clock milliseconds, bumped so two calls never return the same value.
#[derive(Default)]
pub struct ClockIds {
    last: AtomicI64,
}

impl IdSource for ClockIds {
    fn next_id(&self) -> UserId {
        let now = Utc::now().timestamp_millis();
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let next = now.max(last + 1);
            match self
                .last
                .compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return UserId(next),
                Err(actual) => last = actual,
            }
        }
    }
}

/// Decides which updates stay local instead of reaching the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalRecordPolicy {
    /// Ids above this were never persisted by the remote. `None` trusts the
    /// record origin flag alone.
    pub seed_id_ceiling: Option<i64>,
}

impl LocalRecordPolicy {
    pub fn is_local(&self, id: UserId, cached: Option<&UserRecord>) -> bool {
        if cached.is_some_and(UserRecord::is_local) {
            return true;
        }
        self.seed_id_ceiling.is_some_and(|ceiling| id.0 > ceiling)
    }
}

pub struct MutationCoordinator {
    remote: Arc<dyn RemoteCollection>,
    cache: Arc<EntityCache>,
    notifications: Arc<NotificationChannel>,
    ids: Arc<dyn IdSource>,
    policy: LocalRecordPolicy,
}

impl MutationCoordinator {
    pub fn new(
        remote: Arc<dyn RemoteCollection>,
        cache: Arc<EntityCache>,
        notifications: Arc<NotificationChannel>,
        policy: LocalRecordPolicy,
    ) -> Self {
        Self::with_id_source(
            remote,
            cache,
            notifications,
            policy,
            Arc::new(ClockIds::default()),
        )
    }

    pub fn with_id_source(
        remote: Arc<dyn RemoteCollection>,
        cache: Arc<EntityCache>,
        notifications: Arc<NotificationChannel>,
        policy: LocalRecordPolicy,
        ids: Arc<dyn IdSource>,
    ) -> Self {
        Self {
            remote,
            cache,
            notifications,
            ids,
            policy,
        }
    }

    pub fn cache(&self) -> &Arc<EntityCache> {
        &self.cache
    }

    pub fn notifications(&self) -> &Arc<NotificationChannel> {
        &self.notifications
    }

    pub async fn dispatch(&self, intent: Intent) -> Result<Option<UserRecord>, IntentError> {
        match intent {
            Intent::Create { name } => self.create(&name).await.map(Some),
            Intent::Update { id, name } => self.update(id, &name).await.map(Some),
            Intent::Delete { id } => self.delete(id).await.map(|()| None),
        }
    }

    /// Loads the collection through the fetch-generation guard.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<usize, IntentError> {
        let ticket = self.cache.begin_fetch();
        match self.remote.list().await {
            Ok(records) => {
                let count = records.len();
                if self.cache.complete_fetch(ticket, Ok(records)) {
                    info!(count, "users: list applied");
                }
                Ok(count)
            }
            Err(err) => {
                let list_err = ListError::from(&err);
                warn!(error = %err, "users: list failed");
                if self.cache.complete_fetch(ticket, Err(list_err.clone())) {
                    self.notifications.error(MSG_LIST_FAILED);
                }
                Err(list_err.into())
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn create(&self, name: &str) -> Result<UserRecord, IntentError> {
        trace_phase(IntentPhase::Validating);
        let name = self.validate(name)?;

        trace_phase(IntentPhase::Sending);
        let draft = UserDraft::new(self.fresh_id(), name);
        self.cache.begin_create();
        let result = self.remote.create(&draft).await;
        self.cache.end_create();

        match result {
            Ok(created) => {
                // The echoed id is not unique; substitute a provisional one.
                let record = UserRecord::local(self.fresh_id(), created.name);
                self.cache.insert(record.clone());
                trace_phase(IntentPhase::Applied);
                info!(
                    id = record.id.0,
                    echoed_id = created.id.map(|id| id.0),
                    "users: created"
                );
                self.notifications.success(MSG_ADDED);
                Ok(record)
            }
            Err(err) => Err(self.fail(err, MSG_ADD_FAILED)),
        }
    }

    #[instrument(skip(self))]
    pub async fn update(&self, id: UserId, name: &str) -> Result<UserRecord, IntentError> {
        trace_phase(IntentPhase::Validating);
        let name = self.validate(name)?;

        trace_phase(IntentPhase::Sending);
        let cached = self.cache.get(id);
        let record = if self.policy.is_local(id, cached.as_ref()) {
            info!(id = id.0, "users: local record, remote update skipped");
            let origin = cached.map(|record| record.origin).unwrap_or_default();
            UserRecord {
                id,
                name,
                origin,
            }
        } else {
            self.cache.mark_pending(id, PendingKind::Update);
            let result = self
                .remote
                .update(id, &UserDraft::new(id, name.as_str()))
                .await;
            self.cache.clear_pending(id);
            match result {
                Ok(updated) => UserRecord {
                    id,
                    name: updated.name,
                    origin: updated.origin,
                },
                Err(err) => return Err(self.fail(err, MSG_UPDATE_FAILED)),
            }
        };

        self.cache.replace_by_id(id, record.clone());
        trace_phase(IntentPhase::Applied);
        info!(id = id.0, "users: updated");
        self.notifications.success(MSG_UPDATED);
        Ok(record)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: UserId) -> Result<(), IntentError> {
        trace_phase(IntentPhase::Sending);
        self.cache.mark_pending(id, PendingKind::Delete);
        let result = self.remote.delete(id).await;
        self.cache.clear_pending(id);

        match result {
            Ok(()) => {
                self.cache.remove_by_id(id);
                trace_phase(IntentPhase::Applied);
                info!(id = id.0, "users: deleted");
                self.notifications.success(MSG_DELETED);
                Ok(())
            }
            Err(err) => Err(self.fail(err, MSG_DELETE_FAILED)),
        }
    }

    fn validate(&self, name: &str) -> Result<String, IntentError> {
        if name.trim().is_empty() {
            trace_phase(IntentPhase::Failed);
            warn!("users: rejected empty name");
            self.notifications.error(MSG_EMPTY_NAME);
            return Err(ValidationError::EmptyName.into());
        }
        Ok(name.to_string())
    }

    fn fresh_id(&self) -> UserId {
        loop {
            let id = self.ids.next_id();
            if !self.cache.contains(id) {
                return id;
            }
        }
    }

    fn fail(&self, err: FetchError, text: &str) -> IntentError {
        trace_phase(IntentPhase::Failed);
        warn!(
            error = %err,
            server_message = err.server_message().unwrap_or(""),
            "users: intent failed"
        );
        self.notifications.error(text);
        err.into()
    }
}

fn trace_phase(phase: IntentPhase) {
    tracing::trace!(?phase, "intent phase");
}

#[cfg(test)]
#[path = "tests/coordinator_tests.rs"]
mod tests;
