pub mod config;
pub mod error;
pub mod gateway;
pub mod routes;

use std::sync::Arc;

use config::Config;
use gateway::{Room, RoomSettings};
use pointer_common::NameGenerator;
use tokio_util::sync::CancellationToken;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub room: Arc<Room>,
    pub names: Arc<NameGenerator>,
    pub config: Arc<Config>,
    /// Cancelled on server shutdown; every session scope is a child of it.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Build the state for one room from configuration.
    pub fn new(config: Config, names: NameGenerator) -> Self {
        let room_name = config
            .room_name
            .clone()
            .unwrap_or_else(|| format!("Room {}", names.phrase()));
        let room = Room::new(RoomSettings {
            name: room_name,
            queue_capacity: config.queue_capacity,
            write_timeout: config.write_timeout,
        });

        Self {
            room: Arc::new(room),
            names: Arc::new(names),
            config: Arc::new(config),
            shutdown: CancellationToken::new(),
        }
    }
}
