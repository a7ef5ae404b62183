//! services/bot/src/bot/state.rs
//!
//! Defines the application's shared state.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use paraphrase_bot_core::domain::UserId;
use paraphrase_bot_core::ports::{ChatTransport, ParaphraseService, StorageService};
use paraphrase_bot_core::rotation::RotationWindow;
use tokio::sync::Mutex;
use tracing::warn;

use crate::config::Config;

/// The shared application state, created once at startup and passed to all
/// event handlers and background tasks.
pub struct AppState {
    pub store: Arc<dyn StorageService>,
    pub transport: Arc<dyn ChatTransport>,
    pub generator: Arc<dyn ParaphraseService>,
    pub config: Arc<Config>,
    /// The global rotation window. Every mutation funnels through this one
    /// lock, since a rotation is visible across all users.
    pub rotation: Mutex<RotationWindow>,
    /// Per-user serialization locks: events from the same user are processed
    /// one at a time, distinct users in parallel.
    user_locks: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
    /// Users whose next text message is an admin password attempt.
    awaiting_admin_password: Mutex<HashSet<UserId>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn StorageService>,
        transport: Arc<dyn ChatTransport>,
        generator: Arc<dyn ParaphraseService>,
        config: Arc<Config>,
        rotation: RotationWindow,
    ) -> Self {
        Self {
            store,
            transport,
            generator,
            config,
            rotation: Mutex::new(rotation),
            user_locks: Mutex::new(HashMap::new()),
            awaiting_admin_password: Mutex::new(HashSet::new()),
        }
    }

    /// The serialization lock for one user's events. The returned handle is
    /// locked by the caller for the duration of the event, so a user's next
    /// event queues behind an in-flight batch instead of racing it.
    pub async fn user_lock(&self, user_id: UserId) -> Arc<Mutex<()>> {
        let mut locks = self.user_locks.lock().await;
        locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub async fn begin_admin_auth(&self, user_id: UserId) {
        self.awaiting_admin_password.lock().await.insert(user_id);
    }

    /// Takes the user out of the awaiting-password state, reporting whether
    /// they were in it.
    pub async fn take_admin_auth(&self, user_id: UserId) -> bool {
        self.awaiting_admin_password.lock().await.remove(&user_id)
    }

    /// Persists the rotation window so a restart keeps the 24-hour horizon.
    /// Failures are logged, not fatal: the in-memory window stays correct
    /// for the process lifetime.
    pub async fn persist_rotation(&self) {
        let snapshot = self.rotation.lock().await.snapshot();
        if let Err(e) = self.store.save_rotation(&snapshot).await {
            warn!("Failed to persist rotation window: {e}");
        }
    }
}
