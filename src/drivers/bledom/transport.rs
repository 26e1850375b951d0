use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use btleplug::api::{
    Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use log::{debug, info};
use uuid::Uuid;

/// How often the scan results are polled while looking for the strip.
const SCAN_POLL: Duration = Duration::from_millis(500);

/// Seam over the platform BLE stack.
///
/// The link manager is generic over this trait so that connection-lifecycle
/// logic can be exercised against scripted transports in tests.
#[async_trait]
pub trait LinkTransport: Send + 'static {
    /// Opens the link, bounded by `timeout`.
    async fn connect(&mut self, timeout: Duration) -> Result<()>;

    /// Writes one packet, fire-and-forget.
    async fn write(&mut self, packet: &[u8]) -> Result<()>;

    /// Liveness probe for the keepalive loop.
    async fn is_alive(&mut self) -> bool;

    /// Closes the link cleanly.
    async fn disconnect(&mut self) -> Result<()>;
}

/// btleplug-backed transport for a BLEDOM strip.
///
/// Holds only addressing data until [`LinkTransport::connect`] succeeds;
/// the adapter, peripheral, and write characteristic live for the duration
/// of one connection and are dropped when the link closes.
pub struct BledomBle {
    address: String,
    characteristic: Uuid,
    session: Option<BleSession>,
}

struct BleSession {
    // The adapter must outlive the peripheral on some platforms.
    #[allow(dead_code)]
    adapter: Adapter,
    peripheral: Peripheral,
    write_char: Characteristic,
}

impl BledomBle {
    pub fn new(address: String, characteristic: Uuid) -> Self {
        Self {
            address,
            characteristic,
            session: None,
        }
    }

    async fn open_session(&self) -> Result<BleSession> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No Bluetooth adapters found"))?;

        adapter.start_scan(ScanFilter::default()).await?;

        let peripheral = loop {
            let mut found = None;
            for p in adapter.peripherals().await? {
                if p.address().to_string().eq_ignore_ascii_case(&self.address) {
                    found = Some(p);
                    break;
                }
            }
            if let Some(p) = found {
                break p;
            }
            tokio::time::sleep(SCAN_POLL).await;
        };

        adapter.stop_scan().await?;

        if !peripheral.is_connected().await? {
            peripheral.connect().await?;
        }
        debug!("Connected to {}, discovering services", self.address);
        peripheral.discover_services().await?;

        let write_char = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == self.characteristic)
            .ok_or_else(|| anyhow!("Characteristic {} not found", self.characteristic))?;

        info!("Link to {} established", self.address);
        Ok(BleSession {
            adapter,
            peripheral,
            write_char,
        })
    }
}

#[async_trait]
impl LinkTransport for BledomBle {
    async fn connect(&mut self, timeout: Duration) -> Result<()> {
        let session = tokio::time::timeout(timeout, self.open_session())
            .await
            .map_err(|_| anyhow!("Connection to {} timed out", self.address))??;
        self.session = Some(session);
        Ok(())
    }

    async fn write(&mut self, packet: &[u8]) -> Result<()> {
        let Some(session) = self.session.as_ref() else {
            bail!("No active session");
        };
        session
            .peripheral
            .write(&session.write_char, packet, WriteType::WithoutResponse)
            .await
            .map_err(|e| anyhow!("{e}"))
    }

    async fn is_alive(&mut self) -> bool {
        match self.session.as_ref() {
            Some(session) => session.peripheral.is_connected().await.unwrap_or(false),
            None => false,
        }
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(session) = self.session.take() {
            session
                .peripheral
                .disconnect()
                .await
                .map_err(|e| anyhow!("{e}"))?;
            info!("Link to {} closed", self.address);
        }
        Ok(())
    }
}
