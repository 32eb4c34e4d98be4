//! Shared access to open devices, one engine per serial port.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use x10_core::{CommandCode, Error, HouseCode, Result};

use crate::controller::X10Controller;
use crate::engine::ProtocolEngine;
use crate::transport::Transport;

struct DeviceEntry {
    engine: Arc<ProtocolEngine>,
    ref_count: usize,
}

struct RegistryShared {
    monitored_house: HouseCode,
    devices: StdMutex<HashMap<String, DeviceEntry>>,
    // Serializes slow port opens without blocking map lookups
    creation: Mutex<()>,
}

/// Registry handing out shared engines keyed by serial port path.
///
/// Two callers asking for the same port get the same engine, so their
/// transactions queue on one bus lock instead of fighting over the
/// device. A share counter per port closes the device when the last
/// handle goes away.
#[derive(Clone)]
pub struct DeviceRegistry {
    shared: Arc<RegistryShared>,
}

impl DeviceRegistry {
    #[must_use]
    pub fn new(monitored_house: HouseCode) -> Self {
        DeviceRegistry {
            shared: Arc::new(RegistryShared {
                monitored_house,
                devices: StdMutex::new(HashMap::new()),
                creation: Mutex::new(()),
            }),
        }
    }

    /// Open the device on `port_name`, or share the engine already
    /// running on it.
    ///
    /// The first caller pays for the port setup; the device map stays
    /// unlocked while that runs, so lookups for other ports never
    /// stall behind a slow open. Every call counts as one share.
    ///
    /// # Errors
    /// `Error::InvalidArgument` for an empty port name, and
    /// `Error::DeviceOpen` when the serial device cannot be opened.
    pub async fn acquire(&self, port_name: &str) -> Result<DeviceHandle> {
        if port_name.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "serial port name must not be empty".to_string(),
            ));
        }
        if let Some(handle) = self.share_existing(port_name) {
            return Ok(handle);
        }

        let _creating = self.shared.creation.lock().await;
        // A racing caller may have opened the port while we waited
        if let Some(handle) = self.share_existing(port_name) {
            return Ok(handle);
        }

        let transport = Transport::open(port_name)
            .await
            .map_err(|e| Error::DeviceOpen {
                port: port_name.to_string(),
                source: Box::new(e),
            })?;
        let engine = Arc::new(ProtocolEngine::new(transport, self.shared.monitored_house));
        engine.initialize().await?;
        info!("Opened device {} as {}", port_name, engine.instance_id());

        let mut devices = lock_devices(&self.shared);
        devices.insert(
            port_name.to_string(),
            DeviceEntry {
                engine: engine.clone(),
                ref_count: 1,
            },
        );
        Ok(DeviceHandle {
            engine: Some(engine),
            registry: self.shared.clone(),
            port_name: port_name.to_string(),
        })
    }

    /// Install an engine built elsewhere, an in-memory transport say,
    /// under a port name, as if `acquire` had opened it.
    ///
    /// # Errors
    /// `Error::InvalidArgument` when the name is empty or already in
    /// use, or whatever engine initialization reports.
    pub async fn adopt(&self, port_name: &str, engine: ProtocolEngine) -> Result<DeviceHandle> {
        if port_name.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "serial port name must not be empty".to_string(),
            ));
        }
        let _creating = self.shared.creation.lock().await;
        if lock_devices(&self.shared).contains_key(port_name) {
            return Err(Error::InvalidArgument(format!(
                "port '{port_name}' is already open"
            )));
        }
        engine.initialize().await?;
        info!("Adopted device {} as {}", port_name, engine.instance_id());

        let engine = Arc::new(engine);
        let mut devices = lock_devices(&self.shared);
        devices.insert(
            port_name.to_string(),
            DeviceEntry {
                engine: engine.clone(),
                ref_count: 1,
            },
        );
        Ok(DeviceHandle {
            engine: Some(engine),
            registry: self.shared.clone(),
            port_name: port_name.to_string(),
        })
    }

    fn share_existing(&self, port_name: &str) -> Option<DeviceHandle> {
        let mut devices = lock_devices(&self.shared);
        let entry = devices.get_mut(port_name)?;
        entry.ref_count += 1;
        debug!(
            "Device {} now shared by {} handles",
            port_name, entry.ref_count
        );
        Some(DeviceHandle {
            engine: Some(entry.engine.clone()),
            registry: self.shared.clone(),
            port_name: port_name.to_string(),
        })
    }

    /// Names of the ports currently open, in name order.
    #[must_use]
    pub fn open_ports(&self) -> Vec<String> {
        let mut ports: Vec<String> = lock_devices(&self.shared).keys().cloned().collect();
        ports.sort();
        ports
    }
}

fn lock_devices(
    shared: &RegistryShared,
) -> std::sync::MutexGuard<'_, HashMap<String, DeviceEntry>> {
    shared
        .devices
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// One share of an open device.
///
/// Handles delegate the controller operations to the shared engine.
/// Dropping a handle returns its share and, on the last one, cancels
/// the device's I/O; call [`release`](DeviceHandle::release) instead
/// when shutdown should wait for the device to finish closing.
pub struct DeviceHandle {
    engine: Option<Arc<ProtocolEngine>>,
    registry: Arc<RegistryShared>,
    port_name: String,
}

impl DeviceHandle {
    /// Identity of the shared engine; equal across handles to the same
    /// port.
    ///
    /// # Errors
    /// `Error::Cancelled` once the handle has been released.
    pub fn instance_id(&self) -> Result<Uuid> {
        Ok(self.engine()?.instance_id())
    }

    /// Port this handle is a share of.
    #[must_use]
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Power-line data the engine has drained in the background.
    pub async fn take_drained(&self) -> Vec<u8> {
        match &self.engine {
            Some(engine) => engine.take_drained().await,
            None => Vec::new(),
        }
    }

    /// Return this share and, if it was the last, wait for the device
    /// to close.
    pub async fn release(mut self) {
        if let Some(engine) = self.surrender() {
            engine.close().await;
        }
    }

    fn engine(&self) -> Result<&Arc<ProtocolEngine>> {
        self.engine.as_ref().ok_or(Error::Cancelled)
    }

    /// Give the share back. Returns the engine when this was the last
    /// share and the caller must close it.
    fn surrender(&mut self) -> Option<Arc<ProtocolEngine>> {
        let engine = self.engine.take()?;
        let mut devices = lock_devices(&self.registry);
        let last = match devices.get_mut(&self.port_name) {
            Some(entry) => {
                entry.ref_count -= 1;
                entry.ref_count == 0
            }
            None => false,
        };
        if last {
            devices.remove(&self.port_name);
            debug!("Last share of {} returned, closing device", self.port_name);
            Some(engine)
        } else {
            None
        }
    }
}

impl fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("port", &self.port_name)
            .field(
                "instance_id",
                &self.engine.as_ref().map(|engine| engine.instance_id()),
            )
            .finish()
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        if let Some(engine) = self.surrender() {
            // Cancellation is synchronous; the background tasks see it
            // and wind down on their own.
            engine.begin_close();
        }
    }
}

impl X10Controller for DeviceHandle {
    async fn initialize(&self) -> Result<()> {
        self.engine()?.initialize().await
    }

    async fn send_command(
        &self,
        house: HouseCode,
        unit: u8,
        command: CommandCode,
        dim_percent: Option<u8>,
    ) -> Result<()> {
        self.engine()?
            .send_command(house, unit, command, dim_percent)
            .await
    }

    async fn get_bytes(&self) -> Result<Bytes> {
        self.engine()?.get_bytes().await
    }

    async fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        self.engine()?.write_bytes(bytes).await
    }
}
