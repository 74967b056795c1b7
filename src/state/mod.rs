pub mod arena;
pub mod matchmaker;
pub mod state_machine;
pub mod tap;

use std::sync::Arc;

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::{Mutex, mpsc};
use uuid::Uuid;

use crate::config::AppConfig;
use self::matchmaker::Matchmaker;

pub type SharedState = Arc<AppState>;

#[derive(Clone)]
/// Handle used to push messages to a connected game client.
pub struct ConnectionHandle {
    pub id: Uuid,
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Central application state: live socket connections and the matchmaker.
///
/// The matchmaker sits behind a single [`Mutex`]; event handlers, timer
/// tasks, and disconnect callbacks all mutate it through that lock, which
/// gives every state change (and the events it emits) one total order.
pub struct AppState {
    config: AppConfig,
    connections: DashMap<Uuid, ConnectionHandle>,
    matchmaker: Mutex<Matchmaker>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(config: AppConfig) -> SharedState {
        Arc::new(Self {
            matchmaker: Mutex::new(Matchmaker::new(config.clone())),
            config,
            connections: DashMap::new(),
        })
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Registry of active game sockets keyed by connection id.
    pub fn connections(&self) -> &DashMap<Uuid, ConnectionHandle> {
        &self.connections
    }

    /// The serialized matchmaking core.
    pub fn matchmaker(&self) -> &Mutex<Matchmaker> {
        &self.matchmaker
    }
}
