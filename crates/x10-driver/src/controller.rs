//! Controller facade over the interchangeable backends.
//!
//! Uses native async traits (Edition 2024 RPITIT), so implementations
//! need no boxing and no extra crates.

#![allow(async_fn_in_trait)]

use bytes::Bytes;

use x10_core::{CommandCode, HouseCode, Result};

use crate::radio::RadioController;
use crate::registry::DeviceHandle;

/// Uniform interface to every way of reaching the power line.
pub trait X10Controller {
    /// Bring the backend up; safe to call more than once.
    async fn initialize(&self) -> Result<()>;

    /// Deliver one command to a device.
    ///
    /// `dim_percent` only matters for dim and bright; `None` leaves
    /// the step at the default.
    async fn send_command(
        &self,
        house: HouseCode,
        unit: u8,
        command: CommandCode,
        dim_percent: Option<u8>,
    ) -> Result<()>;

    /// Read whatever the backend has ready.
    async fn get_bytes(&self) -> Result<Bytes>;

    /// Write raw bytes straight through to the backend.
    async fn write_bytes(&self, bytes: &[u8]) -> Result<()>;
}

/// The configured way to reach the power line.
///
/// An enum rather than a boxed trait object: the controller trait's
/// async methods make it unusable as `dyn`, and the set of backends is
/// closed anyway.
pub enum Backend {
    /// Serial bridge, shared through the device registry.
    Serial(DeviceHandle),
    /// Radio transceiver.
    Radio(RadioController),
}

impl X10Controller for Backend {
    async fn initialize(&self) -> Result<()> {
        match self {
            Backend::Serial(handle) => handle.initialize().await,
            Backend::Radio(radio) => radio.initialize().await,
        }
    }

    async fn send_command(
        &self,
        house: HouseCode,
        unit: u8,
        command: CommandCode,
        dim_percent: Option<u8>,
    ) -> Result<()> {
        match self {
            Backend::Serial(handle) => {
                handle.send_command(house, unit, command, dim_percent).await
            }
            Backend::Radio(radio) => radio.send_command(house, unit, command, dim_percent).await,
        }
    }

    async fn get_bytes(&self) -> Result<Bytes> {
        match self {
            Backend::Serial(handle) => handle.get_bytes().await,
            Backend::Radio(radio) => radio.get_bytes().await,
        }
    }

    async fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        match self {
            Backend::Serial(handle) => handle.write_bytes(bytes).await,
            Backend::Radio(radio) => radio.write_bytes(bytes).await,
        }
    }
}
