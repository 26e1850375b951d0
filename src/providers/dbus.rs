//! D-Bus service provider for dependency injection.

use anyhow::Result;
use async_trait::async_trait;
use event_listener::Event as StopEvent;
use log::info;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use zbus::Connection;

use crate::{
    app_context::AppState,
    event::{Event, EventBus},
    interface::DBusInterface,
    providers::traits::ServiceProvider,
    task_manager::TaskManager,
};

pub const DBUS_NAME: &str = "io.github.bledomd";
pub const DBUS_PATH: &str = "/io/github/bledomd";

/// D-Bus service provider for external system integration.
///
/// Provides a critical service that exposes the controller through the
/// D-Bus interface: power/color/brightness commands, effect start/stop,
/// and the status/health/stats surface. Runs on the session bus.
///
/// # Priority and Criticality
///
/// - **Priority**: 8 (high)
/// - **Critical**: Yes (the daemon is useless without its control surface)
///
/// # Interface
///
/// - **Service Name**: `io.github.bledomd`
/// - **Object Path**: `/io/github/bledomd`
///
/// # Requirements
///
/// Requires a running D-Bus session bus. Creation fails if D-Bus is not
/// available, which the system coordinator reports as a fatal startup
/// error.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use bledomd::providers::DBusServiceProvider;
/// use bledomd::event::EventBus;
/// use bledomd::app_context::AppState;
///
/// # async fn example(state: Arc<AppState>) -> anyhow::Result<()> {
/// let event_bus = EventBus::new();
/// // Note: This may fail if D-Bus session is not available
/// let provider = DBusServiceProvider::new(state, event_bus).await?;
/// // Use with TaskManager to start the service
/// # Ok(())
/// # }
/// ```
pub struct DBusServiceProvider {
    state: Arc<AppState>,
    event_bus: EventBus,
    connection: Connection,
}

impl DBusServiceProvider {
    /// Creates a new D-Bus service provider with session bus connection.
    pub async fn new(state: Arc<AppState>, event_bus: EventBus) -> Result<Self> {
        let connection = Connection::session().await?;
        Ok(Self {
            state,
            event_bus,
            connection,
        })
    }

    /// The connection hosting the control interface. The broadcast service
    /// emits its signals through this same connection.
    pub fn connection(&self) -> &Connection {
        &self.connection
    }
}

#[async_trait]
impl ServiceProvider for DBusServiceProvider {
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
        let state = self.state.clone();
        let event_bus = self.event_bus.clone();
        let connection = self.connection.clone();

        task_manager
            .spawn_task(self.name().to_string(), |cancel_token| async move {
                run_dbus_service(state, event_bus, connection, cancel_token).await
            })
            .await
    }

    fn name(&self) -> &'static str {
        "DBusService"
    }

    fn priority(&self) -> i32 {
        8
    }

    fn is_critical(&self) -> bool {
        true
    }
}

/// Serves the control interface until cancellation or a `stop` method call.
async fn run_dbus_service(
    state: Arc<AppState>,
    event_bus: EventBus,
    connection: Connection,
    cancel_token: CancellationToken,
) -> Result<()> {
    let stop = Arc::new(StopEvent::new());
    let interface = DBusInterface::new(
        state,
        env!("CARGO_PKG_VERSION").to_string(),
        stop.clone(),
    );
    connection.object_server().at(DBUS_PATH, interface).await?;

    connection.request_name(DBUS_NAME).await?;

    loop {
        let stop_listener = stop.listen();
        tokio::select! {
            () = cancel_token.cancelled() => {
                info!("D-Bus service cancelled");
                break;
            }
            () = stop_listener => {
                info!("Stop requested over D-Bus, shutting the daemon down");
                let _ = event_bus.publish(Event::SystemShutdown);
                break;
            }
        }
    }

    Ok(())
}
