//! BLE link ownership: connection lifecycle, keepalive, reconnect backoff,
//! and serialized command execution.
//!
//! Exactly one task runs [`LinkManager::run`] for the process lifetime. All
//! writes are funneled through its request channel, which makes device
//! writes totally ordered; the transport is never touched from anywhere
//! else. Transport errors never escape this module: they drive the
//! reconnect state machine and surface to callers only as
//! [`CommandError`] values.

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use log::{info, warn};
use serde::Serialize;
use tokio::sync::{RwLock, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::{
    color::{self, Rgb},
    config::{Config, LinkCfg},
    error::CommandError,
    event::{Event, EventBus},
    stats::Stats,
};

use super::{protocol::Command, transport::LinkTransport};

/// Capacity of the request channel. Callers block on their reply, so this
/// only needs to absorb a burst of concurrent dispatchers.
const REQUEST_QUEUE: usize = 16;

/// Connection state, driven only by the link manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

/// Last-applied color/brightness/power, the reference point for effects
/// that fade from the current state.
///
/// Written only on the link task after a successful write; everyone else
/// gets a copy and may observe a slightly stale value while a write is in
/// flight.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DeviceSnapshot {
    pub color: Rgb,
    pub brightness: u8,
    pub powered: bool,
}

impl Default for DeviceSnapshot {
    fn default() -> Self {
        Self {
            color: color::WHITE,
            brightness: 100,
            powered: false,
        }
    }
}

/// A command marshaled onto the link task.
#[derive(Debug)]
pub enum LinkRequest {
    Execute {
        command: Command,
        reply: oneshot::Sender<Result<(), CommandError>>,
    },
}

/// Shared handles the dispatcher side needs.
pub struct LinkHandles {
    pub requests: mpsc::Sender<LinkRequest>,
    pub state: Arc<RwLock<LinkState>>,
    pub snapshot: Arc<RwLock<DeviceSnapshot>>,
}

/// Owns the BLE transport and the connection state machine.
///
/// Disconnected → Connecting → Connected → (write failure | keepalive
/// failure) → Disconnected → Connecting → … with no terminal give-up
/// state. Incoming requests are answered in every phase: immediately with
/// [`CommandError::NotConnected`] whenever the link is not up, so a caller
/// never burns its dispatch timeout on a down link.
pub struct LinkManager<T: LinkTransport> {
    transport: T,
    connect_timeout: Duration,
    cfg: LinkCfg,
    requests: mpsc::Receiver<LinkRequest>,
    state: Arc<RwLock<LinkState>>,
    snapshot: Arc<RwLock<DeviceSnapshot>>,
    stats: Arc<Stats>,
    event_bus: EventBus,
    attempts: u32,
    ever_connected: bool,
}

enum Phase {
    /// Keep going with the state machine.
    Continue,
    /// Cancellation observed (or every requester gone): exit the run loop.
    Shutdown,
}

impl<T: LinkTransport> LinkManager<T> {
    pub fn new(
        transport: T,
        config: &Config,
        stats: Arc<Stats>,
        event_bus: EventBus,
    ) -> (Self, LinkHandles) {
        let (tx, rx) = mpsc::channel(REQUEST_QUEUE);
        let state = Arc::new(RwLock::new(LinkState::Disconnected));
        let snapshot = Arc::new(RwLock::new(DeviceSnapshot::default()));

        let manager = Self {
            transport,
            connect_timeout: config.device.connect_timeout(),
            cfg: config.link.clone(),
            requests: rx,
            state: state.clone(),
            snapshot: snapshot.clone(),
            stats,
            event_bus,
            attempts: 0,
            ever_connected: false,
        };

        (
            manager,
            LinkHandles {
                requests: tx,
                state,
                snapshot,
            },
        )
    }

    /// Runs the connection state machine until cancelled.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        loop {
            if cancel.is_cancelled() {
                break;
            }

            self.set_state(LinkState::Connecting).await;
            match self.connect_phase(&cancel).await {
                None => break,
                Some(Ok(())) => {
                    self.attempts = 0;
                    if self.ever_connected {
                        self.stats.record_reconnection();
                    }
                    self.ever_connected = true;
                    self.set_state(LinkState::Connected).await;
                    let _ = self.event_bus.publish(Event::LinkUp);
                    info!("Link established");

                    match self.serve_connected(&cancel).await {
                        Some(reason) => {
                            self.set_state(LinkState::Disconnected).await;
                            warn!("Link lost: {reason}");
                            let _ = self.event_bus.publish(Event::LinkDown(reason));
                        }
                        None => break,
                    }
                }
                Some(Err(e)) => {
                    self.set_state(LinkState::Disconnected).await;
                    self.attempts += 1;
                    let delay = if self.attempts >= self.cfg.max_reconnect_attempts {
                        warn!(
                            "Connection attempt {}/{} failed: {e}; cooling down for {:?}",
                            self.attempts,
                            self.cfg.max_reconnect_attempts,
                            self.cfg.cooldown()
                        );
                        self.attempts = 0;
                        self.cfg.cooldown()
                    } else {
                        warn!(
                            "Connection attempt {}/{} failed: {e}; retrying in {:?}",
                            self.attempts,
                            self.cfg.max_reconnect_attempts,
                            self.cfg.retry_delay()
                        );
                        self.cfg.retry_delay()
                    };

                    if let Phase::Shutdown = self.wait_disconnected(delay, &cancel).await {
                        break;
                    }
                }
            }
        }

        // Caller-initiated shutdown: close cleanly, no auto-retry.
        self.set_state(LinkState::Disconnected).await;
        if let Err(e) = self.transport.disconnect().await {
            warn!("Error closing link on shutdown: {e}");
        }
        info!("Link task stopped");
        Ok(())
    }

    /// One connection attempt, serving (rejecting) requests while it runs.
    ///
    /// `None` means cancellation was observed mid-attempt.
    async fn connect_phase(&mut self, cancel: &CancellationToken) -> Option<Result<()>> {
        let connect_timeout = self.connect_timeout;
        let transport = &mut self.transport;
        let requests = &mut self.requests;

        let connect = transport.connect(connect_timeout);
        tokio::pin!(connect);

        loop {
            tokio::select! {
                () = cancel.cancelled() => return None,
                result = &mut connect => return Some(result),
                request = requests.recv() => match request {
                    Some(request) => reject_not_connected(request),
                    None => return None,
                },
            }
        }
    }

    /// Sleeps out a backoff delay, still answering requests with
    /// `NotConnected`.
    async fn wait_disconnected(&mut self, delay: Duration, cancel: &CancellationToken) -> Phase {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                () = cancel.cancelled() => return Phase::Shutdown,
                () = &mut sleep => return Phase::Continue,
                request = self.requests.recv() => match request {
                    Some(request) => reject_not_connected(request),
                    None => return Phase::Shutdown,
                },
            }
        }
    }

    /// Connected phase: keepalive polling plus request execution.
    ///
    /// `Some(reason)` means the link dropped and the state machine should
    /// reconnect; `None` means shutdown.
    async fn serve_connected(&mut self, cancel: &CancellationToken) -> Option<String> {
        let mut keepalive = tokio::time::interval(self.cfg.keepalive());
        // The first tick fires immediately, which doubles as a post-connect
        // sanity probe.
        loop {
            tokio::select! {
                () = cancel.cancelled() => return None,
                _ = keepalive.tick() => {
                    if !self.transport.is_alive().await {
                        return Some("keepalive probe failed".to_string());
                    }
                }
                request = self.requests.recv() => {
                    let Some(LinkRequest::Execute { command, reply }) = request else {
                        return None;
                    };
                    match self.execute(command).await {
                        Ok(()) => {
                            let _ = reply.send(Ok(()));
                        }
                        Err(e) => {
                            let reason = format!("{} write failed: {e}", command.kind());
                            let _ = reply.send(Err(e));
                            return Some(reason);
                        }
                    }
                }
            }
        }
    }

    /// Writes one command, waits out the strip's settle delay, and records
    /// the new device state.
    async fn execute(&mut self, command: Command) -> Result<(), CommandError> {
        let packet = command.to_bytes();
        self.transport
            .write(&packet)
            .await
            .map_err(|e| CommandError::WriteFailed(e.to_string()))?;

        tokio::time::sleep(self.cfg.settle()).await;

        let mut snapshot = self.snapshot.write().await;
        match command {
            Command::Power { on } => snapshot.powered = on,
            Command::Color { rgb } => snapshot.color = rgb,
            Command::Brightness { pct } => snapshot.brightness = pct,
        }
        Ok(())
    }

    async fn set_state(&self, state: LinkState) {
        *self.state.write().await = state;
    }
}

fn reject_not_connected(request: LinkRequest) {
    let LinkRequest::Execute { reply, .. } = request;
    let _ = reply.send(Err(CommandError::NotConnected));
}
