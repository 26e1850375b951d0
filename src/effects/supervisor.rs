//! At-most-one-effect supervision.

use std::time::Duration;

use log::{info, warn};
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    controller::LedController,
    error::CommandError,
    event::{Event, EventBus},
};

use super::{EffectSpec, engine::run_effect};

/// How long a superseded effect gets to observe its cancellation token
/// before the replacement is started anyway.
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

struct ActiveEffect {
    name: &'static str,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns the single active effect.
///
/// `start` signals cancellation to the running effect, waits a bounded time
/// for it to exit, then launches the requested effect on a fresh task with
/// a fresh token. If the old effect misses the join timeout the new one is
/// started anyway; both may transiently issue commands until the stale
/// loop's next cancellation check. That window is accepted, not a
/// correctness guarantee.
pub struct EffectSupervisor {
    active: Mutex<Option<ActiveEffect>>,
    event_bus: EventBus,
}

impl EffectSupervisor {
    pub fn new(event_bus: EventBus) -> Self {
        Self {
            active: Mutex::new(None),
            event_bus,
        }
    }

    /// Replaces whatever is running with the requested effect.
    pub async fn start(
        &self,
        controller: LedController,
        spec: EffectSpec,
    ) -> Result<(), CommandError> {
        spec.validate()?;
        let name = spec.name();

        let mut guard = self.active.lock().await;
        self.halt(&mut guard).await;

        let token = CancellationToken::new();
        let handle = tokio::spawn(run_effect(controller, spec, token.clone()));
        *guard = Some(ActiveEffect {
            name,
            token,
            handle,
        });

        info!("Supervisor started effect '{name}'");
        let _ = self.event_bus.publish(Event::EffectStarted(name.to_string()));
        Ok(())
    }

    /// Stops the active effect, if any. Returns the stopped effect's name.
    pub async fn stop(&self) -> Option<&'static str> {
        let mut guard = self.active.lock().await;
        self.halt(&mut guard).await
    }

    /// Name of the effect currently running, if one is alive.
    pub async fn current(&self) -> Option<&'static str> {
        let mut guard = self.active.lock().await;
        match guard.as_ref() {
            Some(active) if !active.handle.is_finished() => Some(active.name),
            Some(_) => {
                // Ran to natural completion (bounded blink, pomodoro).
                *guard = None;
                None
            }
            None => None,
        }
    }

    async fn halt(&self, guard: &mut Option<ActiveEffect>) -> Option<&'static str> {
        let active = guard.take()?;
        active.token.cancel();

        match tokio::time::timeout(JOIN_TIMEOUT, active.handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Effect '{}' task failed: {e}", active.name),
            Err(_) => warn!(
                "Effect '{}' did not exit within {JOIN_TIMEOUT:?}; proceeding anyway",
                active.name
            ),
        }

        let _ = self
            .event_bus
            .publish(Event::EffectStopped(active.name.to_string()));
        Some(active.name)
    }
}
