use anyhow::Result;
use async_trait::async_trait;
use log::info;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use zbus::Connection;

use crate::{
    app_context::AppState,
    event::{Event, EventBus},
    interface::DBusInterface,
    providers::{dbus::DBUS_PATH, traits::ServiceProvider},
    task_manager::TaskManager,
};

/// Link state broadcast service provider.
///
/// Provides a non-critical service that mirrors link up/down transitions
/// onto the D-Bus `link_changed` signal so external listeners don't have to
/// poll, and periodically logs a statistics heartbeat when enabled in the
/// configuration.
///
/// # Priority and Criticality
///
/// - **Priority**: 3 (low)
/// - **Critical**: No (optional service)
///
/// # Configuration
///
/// The heartbeat is controlled by `enable_broadcast` and
/// `broadcast_interval` in the main configuration; link change signals are
/// always emitted.
pub struct BroadcastServiceProvider {
    state: Arc<AppState>,
    event_bus: EventBus,
    connection: Connection,
}

impl BroadcastServiceProvider {
    /// Creates a new broadcast service provider.
    ///
    /// `connection` must be the connection whose object server hosts the
    /// control interface; signals are emitted through it.
    pub fn new(state: Arc<AppState>, event_bus: EventBus, connection: Connection) -> Self {
        Self {
            state,
            event_bus,
            connection,
        }
    }
}

#[async_trait]
impl ServiceProvider for BroadcastServiceProvider {
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
        let state = self.state.clone();
        let event_bus = self.event_bus.clone();
        let connection = self.connection.clone();

        task_manager
            .spawn_task(self.name().to_string(), |cancel_token| async move {
                run_broadcast_service(state, event_bus, connection, cancel_token).await
            })
            .await
    }

    fn name(&self) -> &'static str {
        "BroadcastService"
    }

    fn priority(&self) -> i32 {
        3
    }

    fn is_critical(&self) -> bool {
        false
    }
}

async fn run_broadcast_service(
    state: Arc<AppState>,
    event_bus: EventBus,
    connection: Connection,
    cancel_token: CancellationToken,
) -> Result<()> {
    let mut receiver = event_bus.subscribe();
    let (heartbeat_enabled, heartbeat_secs) = {
        let config = state.config().await;
        (config.enable_broadcast, config.broadcast_interval)
    };
    let mut heartbeat = interval(Duration::from_secs(u64::from(heartbeat_secs.max(1))));

    loop {
        tokio::select! {
            () = cancel_token.cancelled() => {
                info!("Broadcast service cancelled");
                break;
            }
            _instant = heartbeat.tick() => {
                if heartbeat_enabled {
                    let stats = state.stats.snapshot();
                    info!(
                        "Heartbeat: connected={} sent={} failed={} reconnections={} uptime={}s",
                        state.controller.is_connected().await,
                        stats.commands_sent,
                        stats.commands_failed,
                        stats.reconnections,
                        stats.uptime_seconds,
                    );
                }
            }
            event_result = receiver.recv() => {
                match event_result {
                    Ok(Event::LinkUp) => emit_link_changed(&connection, true).await,
                    Ok(Event::LinkDown(_)) => emit_link_changed(&connection, false).await,
                    Err(e) => {
                        log::error!("Failed to receive event: {e}");
                    }
                    _ => {}
                }
            }
        }
    }
    Ok(())
}

async fn emit_link_changed(connection: &Connection, connected: bool) {
    let iface = match connection
        .object_server()
        .interface::<_, DBusInterface>(DBUS_PATH)
        .await
    {
        Ok(iface) => iface,
        Err(e) => {
            log::error!("Failed to get object server interface: {e}");
            return;
        }
    };
    if let Err(e) = DBusInterface::link_changed(iface.signal_emitter(), connected).await {
        log::error!("Failed to emit link_changed signal: {e}");
    }
}
