//! Driver for BLEDOM-family BLE LED strips.
//!
//! Split into the pure command codec ([`protocol`]), the transport seam over
//! the platform BLE stack ([`transport`]), and the link manager that owns
//! the connection lifecycle ([`link`]).

pub mod link;
pub mod protocol;
pub mod transport;

pub use link::{DeviceSnapshot, LinkManager, LinkRequest, LinkState};
pub use protocol::Command;
pub use transport::{BledomBle, LinkTransport};
