//! # bledomd
//!
//! A Linux daemon for controlling BLEDOM-family Bluetooth LE RGB LED strips.
//!
//! ## Features
//!
//! - **Async Architecture**: Built on Tokio for high performance
//! - **Event-Driven**: Modular services communicate via EventBus
//! - **Persistent Link**: One task owns the BLE connection and reconnects
//!   with bounded backoff when the strip drops off
//! - **Lighting Effects**: Cancellable generated effects (rainbow, fire,
//!   aurora, pomodoro, ...) supervised so at most one runs at a time
//! - **D-Bus Interface**: System integration and external control
//!
//! ## Architecture
//!
//! The daemon uses a provider-based dependency injection system with:
//! - [`SystemCoordinator`](coordinator::SystemCoordinator) - Main lifecycle manager
//! - [`EventBus`](event::EventBus) - Inter-service communication
//! - [`AppState`](app_context::AppState) - Shared application state
//! - Service providers for modular functionality
//!
//! ## Example
//!
//! ```no_run
//! use bledomd::{application::Application, config::ConfigManager};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config_manager = ConfigManager::load(None).await?;
//!     Application::builder()
//!         .with_config_manager(config_manager)
//!         .build()
//!         .await?
//!         .run()
//!         .await
//! }
//! ```

pub mod app_context;
pub mod application;
pub mod cli;
pub mod color;
pub mod config;
pub mod controller;
pub mod coordinator;
pub mod drivers;
pub mod effects;
pub mod error;
pub mod event;
pub mod interface;
pub mod providers;
pub mod stats;
pub mod task_manager;
