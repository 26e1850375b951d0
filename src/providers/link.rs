use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    app_context::AppState, event::EventBus, providers::traits::ServiceProvider,
    task_manager::TaskManager,
};

/// BLE link maintenance service provider.
///
/// Provides the critical service that owns the Bluetooth connection for the
/// process lifetime: connecting, keepalive polling, reconnecting with
/// bounded backoff, and executing every command marshaled onto it. This is
/// the core service; nothing reaches the strip without it.
///
/// # Priority and Criticality
///
/// - **Priority**: 10 (highest)
/// - **Critical**: Yes (system cannot function without it)
///
/// # Features
///
/// - Exclusive transport ownership (totally ordered device writes)
/// - Keepalive-driven drop detection
/// - Retry/cooldown reconnect policy, no terminal give-up state
/// - Immediate `NotConnected` answers while the link is down
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use bledomd::providers::LinkServiceProvider;
/// use bledomd::event::EventBus;
/// use bledomd::app_context::AppState;
///
/// # async fn example(state: Arc<AppState>) -> anyhow::Result<()> {
/// let event_bus = EventBus::new();
/// let provider = LinkServiceProvider::new(state, event_bus);
/// // Use with TaskManager to start the service
/// # Ok(())
/// # }
/// ```
pub struct LinkServiceProvider {
    state: Arc<AppState>,
    #[allow(dead_code)] // The link manager publishes through its own clone
    event_bus: EventBus,
}

impl LinkServiceProvider {
    /// Creates a new link service provider.
    pub fn new(state: Arc<AppState>, event_bus: EventBus) -> Self {
        Self { state, event_bus }
    }
}

#[async_trait]
impl ServiceProvider for LinkServiceProvider {
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
        let link = self
            .state
            .take_link()
            .await
            .context("Link manager already claimed by another service")?;

        task_manager
            .spawn_task(self.name().to_string(), |cancel_token| async move {
                link.run(cancel_token).await
            })
            .await
    }

    fn name(&self) -> &'static str {
        "LinkService"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn is_critical(&self) -> bool {
        true
    }
}
