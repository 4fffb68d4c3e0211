//! Shared application state plus the game domain model.

pub mod board;
pub mod gate;
pub mod player;
pub mod state_machine;

use std::sync::Arc;

use crate::{bus::hub::PeripheralHub, config::AppConfig, services::controller::GameController};

pub type SharedState = Arc<AppState>;

/// Handles shared by the HTTP routes and the station sockets.
pub struct AppState {
    config: AppConfig,
    hub: Arc<PeripheralHub>,
    controller: Arc<GameController>,
}

impl AppState {
    /// Build the hub and the controller for one game session.
    ///
    /// The controller is registered as the hub's dispatcher before any
    /// station can attach.
    pub fn new(config: AppConfig) -> SharedState {
        let hub = PeripheralHub::new(config.client_id.clone());
        let controller = GameController::new(&config, hub.clone());
        hub.register_dispatcher(controller.clone());
        Arc::new(Self {
            config,
            hub,
            controller,
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Station router.
    pub fn hub(&self) -> &Arc<PeripheralHub> {
        &self.hub
    }

    /// Game orchestrator.
    pub fn controller(&self) -> &Arc<GameController> {
        &self.controller
    }
}
