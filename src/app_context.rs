//! Application state and global context management.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
    config::{Config, ConfigManager},
    controller::LedController,
    drivers::bledom::{BledomBle, LinkManager},
    effects::supervisor::EffectSupervisor,
    event::EventBus,
    stats::Stats,
};

/// Shared application state containing all runtime data.
///
/// Holds the shared pieces every service needs: the configuration, the
/// dispatcher handle onto the link task, statistics, and the effect
/// supervisor. The link manager itself sits here only until the link
/// service provider claims it at startup; after that the link task is the
/// sole owner of the transport.
pub struct AppState {
    /// Configuration manager for centralized config handling
    pub config_manager: Arc<ConfigManager>,
    /// Dispatcher handle used by every caller that issues device commands
    pub controller: LedController,
    /// Command/reconnection counters
    pub stats: Arc<Stats>,
    /// Single-active-effect supervisor
    pub effects: EffectSupervisor,
    /// Claimed once by the link service; None afterwards
    link: Mutex<Option<LinkManager<BledomBle>>>,
}

impl AppState {
    /// Creates the application state from the given configuration manager.
    ///
    /// Builds the transport and link manager but does not touch the BLE
    /// stack; connecting starts when the link service runs.
    pub async fn new(config_manager: ConfigManager, event_bus: EventBus) -> anyhow::Result<Self> {
        let config = config_manager.clone_config().await;
        let characteristic = config.characteristic_uuid()?;

        let transport = BledomBle::new(config.device.address.clone(), characteristic);
        let stats = Arc::new(Stats::new());
        let (link, handles) =
            LinkManager::new(transport, &config, stats.clone(), event_bus.clone());
        let controller =
            LedController::new(handles, stats.clone(), config.link.dispatch_timeout());

        Ok(Self {
            config_manager: Arc::new(config_manager),
            controller,
            stats,
            effects: EffectSupervisor::new(event_bus),
            link: Mutex::new(Some(link)),
        })
    }

    /// Gets a read-only reference to the current configuration.
    pub async fn config(&self) -> tokio::sync::RwLockReadGuard<'_, Config> {
        self.config_manager.get().await
    }

    /// Gets the configuration manager.
    pub fn config_manager(&self) -> &Arc<ConfigManager> {
        &self.config_manager
    }

    /// Hands the link manager to the link service. Subsequent calls return
    /// None.
    pub async fn take_link(&self) -> Option<LinkManager<BledomBle>> {
        self.link.lock().await.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn link_manager_can_be_taken_exactly_once() {
        let config_manager =
            ConfigManager::new(Config::default(), std::path::PathBuf::from("/tmp/test.yml"));
        let state = AppState::new(config_manager, EventBus::new()).await.unwrap();

        assert!(state.take_link().await.is_some());
        assert!(state.take_link().await.is_none());
    }

    #[tokio::test]
    async fn controller_reports_disconnected_before_link_runs() {
        let config_manager =
            ConfigManager::new(Config::default(), std::path::PathBuf::from("/tmp/test.yml"));
        let state = AppState::new(config_manager, EventBus::new()).await.unwrap();

        assert!(!state.controller.is_connected().await);
    }
}
