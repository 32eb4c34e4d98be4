//! Radio transceiver backend.

use bytes::Bytes;
use tracing::info;

use x10_core::{CommandCode, Error, HouseCode, Result};

use crate::controller::X10Controller;

/// Controller for the 2.4 GHz transceiver path.
///
/// Bring-up succeeds so the service can boot with the radio selected.
/// Payload operations report `Error::Unsupported` until the
/// transceiver integration lands.
#[derive(Debug, Default)]
pub struct RadioController {
    _private: (),
}

impl RadioController {
    #[must_use]
    pub fn new() -> Self {
        RadioController::default()
    }
}

impl X10Controller for RadioController {
    async fn initialize(&self) -> Result<()> {
        info!("Radio backend selected, transceiver bring-up pending");
        Ok(())
    }

    async fn send_command(
        &self,
        _house: HouseCode,
        _unit: u8,
        _command: CommandCode,
        _dim_percent: Option<u8>,
    ) -> Result<()> {
        Err(Error::Unsupported(
            "send_command over the radio backend".to_string(),
        ))
    }

    async fn get_bytes(&self) -> Result<Bytes> {
        Err(Error::Unsupported(
            "get_bytes over the radio backend".to_string(),
        ))
    }

    async fn write_bytes(&self, _bytes: &[u8]) -> Result<()> {
        Err(Error::Unsupported(
            "write_bytes over the radio backend".to_string(),
        ))
    }
}
