//! Command dispatcher: the cloneable handle callers use to reach the link
//! task.

use std::{sync::Arc, time::Duration};

use tokio::sync::oneshot;

use crate::{
    color::Rgb,
    drivers::bledom::{Command, DeviceSnapshot, LinkRequest, LinkState, link::LinkHandles},
    error::CommandError,
    stats::Stats,
};

/// Synchronous-looking command execution from any task.
///
/// Marshals each command onto the link task through the request channel and
/// waits up to the dispatch timeout for the outcome. Exactly one of
/// `commands_sent`/`commands_failed` is recorded per call. Concurrent
/// callers are serialized by the link task's single execution context, in
/// channel-arrival order.
///
/// # Example
///
/// ```no_run
/// use bledomd::{color::Rgb, controller::LedController};
///
/// # async fn example(led: LedController) -> anyhow::Result<()> {
/// led.power_on().await?;
/// led.set_color(Rgb::new(255, 120, 0)).await?;
/// led.set_brightness(80).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LedController {
    handles: Arc<LinkHandles>,
    stats: Arc<Stats>,
    dispatch_timeout: Duration,
}

impl LedController {
    pub fn new(handles: LinkHandles, stats: Arc<Stats>, dispatch_timeout: Duration) -> Self {
        Self {
            handles: Arc::new(handles),
            stats,
            dispatch_timeout,
        }
    }

    /// Executes one command against the device.
    pub async fn execute(&self, command: Command) -> Result<(), CommandError> {
        let result = self.execute_inner(command).await;
        match result {
            Ok(()) => self.stats.record_sent(),
            Err(_) => self.stats.record_failed(),
        }
        result
    }

    async fn execute_inner(&self, command: Command) -> Result<(), CommandError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.handles
            .requests
            .send(LinkRequest::Execute {
                command,
                reply: reply_tx,
            })
            .await
            .map_err(|_| CommandError::NotConnected)?;

        match tokio::time::timeout(self.dispatch_timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            // Link task dropped the reply without answering.
            Ok(Err(_)) => Err(CommandError::NotConnected),
            Err(_) => Err(CommandError::TimeoutExceeded),
        }
    }

    pub async fn power_on(&self) -> Result<(), CommandError> {
        self.execute(Command::power(true)).await
    }

    pub async fn power_off(&self) -> Result<(), CommandError> {
        self.execute(Command::power(false)).await
    }

    pub async fn set_color(&self, rgb: Rgb) -> Result<(), CommandError> {
        self.execute(Command::color(rgb)).await
    }

    pub async fn set_brightness(&self, pct: u8) -> Result<(), CommandError> {
        match Command::brightness(pct) {
            Ok(command) => self.execute(command).await,
            Err(e) => {
                self.stats.record_failed();
                Err(e)
            }
        }
    }

    /// Pure white mode at the given 8-bit intensity: full-white color,
    /// then a scaled brightness when below full intensity.
    pub async fn set_white(&self, intensity: u8) -> Result<(), CommandError> {
        self.set_color(crate::color::WHITE).await?;
        if intensity < 255 {
            let pct = ((f32::from(intensity) / 255.0) * 100.0).round() as u8;
            self.set_brightness(pct).await?;
        }
        Ok(())
    }

    /// Copy of the last-applied device state.
    pub async fn snapshot(&self) -> DeviceSnapshot {
        *self.handles.snapshot.read().await
    }

    pub async fn link_state(&self) -> LinkState {
        *self.handles.state.read().await
    }

    pub async fn is_connected(&self) -> bool {
        self.link_state().await == LinkState::Connected
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tokio::sync::{RwLock, mpsc};

    fn controller_with_receiver(
        timeout: Duration,
    ) -> (LedController, mpsc::Receiver<LinkRequest>, Arc<Stats>) {
        let (tx, rx) = mpsc::channel(16);
        let stats = Arc::new(Stats::new());
        let handles = LinkHandles {
            requests: tx,
            state: Arc::new(RwLock::new(LinkState::Disconnected)),
            snapshot: Arc::new(RwLock::new(DeviceSnapshot::default())),
        };
        let controller = LedController::new(handles, stats.clone(), timeout);
        (controller, rx, stats)
    }

    #[tokio::test]
    async fn execute_records_sent_on_success() {
        let (controller, mut rx, stats) = controller_with_receiver(Duration::from_secs(2));

        let link = tokio::spawn(async move {
            let Some(LinkRequest::Execute { reply, .. }) = rx.recv().await else {
                panic!("expected a request");
            };
            reply.send(Ok(())).unwrap();
        });

        assert_eq!(controller.power_on().await, Ok(()));
        link.await.unwrap();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.commands_sent, 1);
        assert_eq!(snapshot.commands_failed, 0);
    }

    #[tokio::test]
    async fn execute_records_failed_on_link_error() {
        let (controller, mut rx, stats) = controller_with_receiver(Duration::from_secs(2));

        let link = tokio::spawn(async move {
            let Some(LinkRequest::Execute { reply, .. }) = rx.recv().await else {
                panic!("expected a request");
            };
            reply.send(Err(CommandError::NotConnected)).unwrap();
        });

        assert_eq!(controller.power_on().await, Err(CommandError::NotConnected));
        link.await.unwrap();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.commands_sent, 0);
        assert_eq!(snapshot.commands_failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn execute_times_out_when_link_task_stalls() {
        let (controller, rx, stats) = controller_with_receiver(Duration::from_millis(100));
        // Keep the receiver alive but never answer.
        let _rx = rx;

        let result = controller.power_on().await;
        assert_eq!(result, Err(CommandError::TimeoutExceeded));
        assert_eq!(stats.snapshot().commands_failed, 1);
    }

    #[tokio::test]
    async fn invalid_brightness_rejected_without_reaching_the_link() {
        let (controller, mut rx, stats) = controller_with_receiver(Duration::from_secs(2));

        let result = controller.set_brightness(150).await;
        assert!(matches!(result, Err(CommandError::InvalidArgument(_))));
        assert_eq!(stats.snapshot().commands_failed, 1);
        // Nothing was marshaled onto the link.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn set_white_full_intensity_skips_brightness() {
        let (controller, mut rx, _stats) = controller_with_receiver(Duration::from_secs(2));

        let link = tokio::spawn(async move {
            let mut commands = Vec::new();
            while let Some(LinkRequest::Execute { command, reply }) = rx.recv().await {
                commands.push(command);
                reply.send(Ok(())).unwrap();
            }
            commands
        });

        controller.set_white(255).await.unwrap();
        drop(controller);

        let commands = link.await.unwrap();
        assert_eq!(commands, vec![Command::color(color::WHITE)]);
    }

    #[tokio::test]
    async fn set_white_partial_intensity_scales_brightness() {
        let (controller, mut rx, _stats) = controller_with_receiver(Duration::from_secs(2));

        let link = tokio::spawn(async move {
            let mut commands = Vec::new();
            while let Some(LinkRequest::Execute { command, reply }) = rx.recv().await {
                commands.push(command);
                reply.send(Ok(())).unwrap();
            }
            commands
        });

        controller.set_white(128).await.unwrap();
        drop(controller);

        let commands = link.await.unwrap();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0], Command::color(color::WHITE));
        // 128/255 -> 50%
        assert_eq!(commands[1], Command::Brightness { pct: 50 });
    }
}
