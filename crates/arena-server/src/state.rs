//! Application state

use crate::config::Settings;
use crate::db::DbPool;
use crate::models::WsEvent;
use crate::websocket::events::EventBroadcaster;
use parking_lot::RwLock;
use std::sync::Arc;

pub struct AppState {
    pub db: DbPool,
    pub broadcaster: Arc<EventBroadcaster>,
    /// Runtime-tunable settings; admins may replace them without a restart.
    settings: RwLock<Settings>,
}

impl AppState {
    pub fn new(db: DbPool, settings: Settings) -> Self {
        Self {
            db,
            broadcaster: Arc::new(EventBroadcaster::new(1000)),
            settings: RwLock::new(settings),
        }
    }

    /// Snapshot of the current settings. Operations work on the snapshot so
    /// a mid-flight reload cannot mix two configurations in one operation.
    pub fn settings(&self) -> Settings {
        self.settings.read().clone()
    }

    pub fn update_settings(&self, settings: Settings) {
        *self.settings.write() = settings;
    }

    pub fn broadcast_event(&self, event: WsEvent) {
        self.broadcaster.broadcast(event);
    }
}
