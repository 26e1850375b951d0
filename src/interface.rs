//! D-Bus control surface.
//!
//! Mirrors the operations of the original HTTP surface as D-Bus methods
//! with `{status, message}` JSON replies. Command failures surface as
//! D-Bus errors carrying the failure reason.

use std::sync::Arc;

use event_listener::Event as StopEvent;
use serde_json::json;
use zbus::{interface, object_server::SignalEmitter};

use crate::{
    app_context::AppState,
    color::Rgb,
    effects::EffectSpec,
    error::CommandError,
};

pub struct DBusInterface {
    state: Arc<AppState>,

    // Events
    pub stop: Arc<StopEvent>,
    pub version: String,
}

impl DBusInterface {
    pub fn new(state: Arc<AppState>, version: String, stop: Arc<StopEvent>) -> Self {
        Self {
            state,
            stop,
            version,
        }
    }
}

fn reply(message: impl Into<String>) -> String {
    json!({ "status": "success", "message": message.into() }).to_string()
}

fn map_err(e: CommandError) -> zbus::fdo::Error {
    match e {
        CommandError::InvalidArgument(msg) => zbus::fdo::Error::InvalidArgs(msg),
        other => zbus::fdo::Error::Failed(other.to_string()),
    }
}

#[interface(name = "io.github.bledomd1")]
impl DBusInterface {
    #[zbus(signal)]
    async fn stopped(emitter: &SignalEmitter<'_>) -> zbus::Result<()>;

    /// Emitted whenever the BLE link goes up or down.
    #[zbus(signal)]
    pub async fn link_changed(emitter: &SignalEmitter<'_>, connected: bool) -> zbus::Result<()>;

    async fn stop(
        &self,
        #[zbus(signal_emitter)] emitter: SignalEmitter<'_>,
    ) -> zbus::fdo::Result<()> {
        Self::stopped(&emitter).await?;
        self.stop.notify(1);

        Ok(())
    }

    async fn power_on(&self) -> zbus::fdo::Result<String> {
        self.state.controller.power_on().await.map_err(map_err)?;
        Ok(reply("LEDs on"))
    }

    async fn power_off(&self) -> zbus::fdo::Result<String> {
        self.state.controller.power_off().await.map_err(map_err)?;
        Ok(reply("LEDs off"))
    }

    async fn set_color(&self, r: u8, g: u8, b: u8) -> zbus::fdo::Result<String> {
        self.state
            .controller
            .set_color(Rgb::new(r, g, b))
            .await
            .map_err(map_err)?;
        Ok(reply(format!("Color set: RGB({r},{g},{b})")))
    }

    async fn set_brightness(&self, pct: u8) -> zbus::fdo::Result<String> {
        self.state
            .controller
            .set_brightness(pct)
            .await
            .map_err(map_err)?;
        Ok(reply(format!("Brightness: {pct}%")))
    }

    /// Pure white mode at an 8-bit intensity (255 = full).
    async fn set_white(&self, intensity: u8) -> zbus::fdo::Result<String> {
        self.state
            .controller
            .set_white(intensity)
            .await
            .map_err(map_err)?;
        Ok(reply(format!("White mode: {intensity}")))
    }

    /// Convenience trigger for home automation: warm light on arrival.
    async fn home_arrival(&self) -> zbus::fdo::Result<String> {
        self.state.controller.power_on().await.map_err(map_err)?;
        self.state
            .controller
            .set_color(Rgb::new(255, 180, 50))
            .await
            .map_err(map_err)?;
        Ok(reply("Welcome home"))
    }

    /// Starts a named effect. `params_json` is a JSON object with the
    /// effect's optional parameters (color, speed, count, ...); empty for
    /// defaults.
    async fn start_effect(&self, name: &str, params_json: &str) -> zbus::fdo::Result<String> {
        let spec = EffectSpec::from_request(name, params_json).map_err(map_err)?;
        let effect = spec.name();
        self.state
            .effects
            .start(self.state.controller.clone(), spec)
            .await
            .map_err(map_err)?;
        Ok(reply(format!("Effect '{effect}' started")))
    }

    async fn stop_effect(&self) -> zbus::fdo::Result<String> {
        match self.state.effects.stop().await {
            Some(name) => Ok(reply(format!("Effect '{name}' stopped"))),
            None => Ok(reply("No effect running")),
        }
    }

    async fn status(&self) -> String {
        let connected = self.state.controller.is_connected().await;
        let active_effect = self.state.effects.current().await;
        let snapshot = self.state.controller.snapshot().await;
        json!({
            "status": "online",
            "bluetooth_connected": connected,
            "active_effect": active_effect,
            "device": snapshot,
            "version": self.version,
        })
        .to_string()
    }

    async fn health(&self) -> String {
        let stats = self.state.stats.snapshot();
        let connected = self.state.controller.is_connected().await;
        let link_state = self.state.controller.link_state().await;
        let address = self.state.config().await.device.address.clone();
        let status = if connected { "healthy" } else { "degraded" };
        json!({
            "status": status,
            "bluetooth": {
                "connected": connected,
                "state": link_state,
                "address": address,
                "reconnections": stats.reconnections,
            },
            "performance": {
                "commands_sent": stats.commands_sent,
                "commands_failed": stats.commands_failed,
                "success_rate": format!("{:.2}%", stats.success_rate),
                "uptime_seconds": stats.uptime_seconds,
            },
        })
        .to_string()
    }

    async fn stats(&self) -> String {
        let snapshot = self.state.stats.snapshot();
        serde_json::to_string(&snapshot).unwrap_or_else(|_| "{}".to_string())
    }

    #[zbus(property)]
    async fn version(&self) -> String {
        self.version.clone()
    }

    #[zbus(property)]
    async fn connected(&self) -> bool {
        self.state.controller.is_connected().await
    }
}
