use std::sync::Arc;

use async_trait::async_trait;
use shared::domain::{UserId, UserRecord};
use tokio::sync::watch;

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod notify;
pub mod remote;

pub use cache::{CacheSnapshot, EntityCache, FetchTicket, PendingKind, QueryStatus};
pub use config::{load_settings, Settings};
pub use coordinator::{ClockIds, IdSource, Intent, LocalRecordPolicy, MutationCoordinator};
pub use error::{FetchError, IntentError, ListError, SettingsError, ValidationError};
pub use notify::{Notification, NotificationChannel, NotificationKind};
pub use remote::{HttpCollectionClient, RemoteCollection};

/// What a view binder needs from the sync core.
#[async_trait]
pub trait DirectoryHandle: Send + Sync {
    async fn load(&self) -> Result<usize, IntentError>;
    async fn create(&self, name: &str) -> Result<UserRecord, IntentError>;
    async fn update(&self, id: UserId, name: &str) -> Result<UserRecord, IntentError>;
    async fn delete(&self, id: UserId) -> Result<(), IntentError>;
    fn dismiss_notification(&self);
    fn notification(&self) -> Option<Notification>;
    fn snapshot(&self) -> CacheSnapshot;
    fn subscribe_snapshots(&self) -> watch::Receiver<CacheSnapshot>;
    fn subscribe_notifications(&self) -> watch::Receiver<Option<Notification>>;
}

/// One cache, one notification slot and one coordinator over a remote collection.
pub struct UserDirectory {
    coordinator: MutationCoordinator,
}

impl UserDirectory {
    pub fn new(settings: &Settings) -> Result<Arc<Self>, FetchError> {
        let remote = HttpCollectionClient::new(settings)?;
        Ok(Self::new_with_remote(settings, Arc::new(remote)))
    }

    pub fn new_with_remote(settings: &Settings, remote: Arc<dyn RemoteCollection>) -> Arc<Self> {
        let coordinator = MutationCoordinator::new(
            remote,
            Arc::new(EntityCache::new()),
            Arc::new(NotificationChannel::new(settings.notification_ttl)),
            LocalRecordPolicy {
                seed_id_ceiling: settings.seed_id_ceiling,
            },
        );
        Arc::new(Self { coordinator })
    }

    pub fn coordinator(&self) -> &MutationCoordinator {
        &self.coordinator
    }

    pub fn cache(&self) -> &Arc<EntityCache> {
        self.coordinator.cache()
    }

    pub fn notifications(&self) -> &Arc<NotificationChannel> {
        self.coordinator.notifications()
    }
}

#[async_trait]
impl DirectoryHandle for UserDirectory {
    async fn load(&self) -> Result<usize, IntentError> {
        self.coordinator.load().await
    }

    async fn create(&self, name: &str) -> Result<UserRecord, IntentError> {
        self.coordinator.create(name).await
    }

    async fn update(&self, id: UserId, name: &str) -> Result<UserRecord, IntentError> {
        self.coordinator.update(id, name).await
    }

    async fn delete(&self, id: UserId) -> Result<(), IntentError> {
        self.coordinator.delete(id).await
    }

    fn dismiss_notification(&self) {
        self.notifications().dismiss();
    }

    fn notification(&self) -> Option<Notification> {
        self.notifications().current()
    }

    fn snapshot(&self) -> CacheSnapshot {
        self.cache().snapshot()
    }

    fn subscribe_snapshots(&self) -> watch::Receiver<CacheSnapshot> {
        self.cache().subscribe()
    }

    fn subscribe_notifications(&self) -> watch::Receiver<Option<Notification>> {
        self.notifications().subscribe()
    }
}
