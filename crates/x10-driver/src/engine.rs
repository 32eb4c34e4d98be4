//! Protocol engine: checksummed delivery, retries, and status handling.
//!
//! Every command is a transaction under the bus lock:
//!
//! ```text
//! host                     bridge
//!  |--- address frame ------->|
//!  |<-- checksum echo --------|   mismatch? classify the byte,
//!  |--- 0x00 acknowledge ---->|   handle it, retry the exchange
//!  |<-- 0x55 ready -----------|
//!  |--- function frame ------>|
//!  |        (same dance)      |
//! ```
//!
//! A failed exchange retries up to the attempt cap, but only for
//! recoverable failures (a timeout or a bad checksum). Status bytes
//! that arrive in place of an echo get handled inline: a power failure
//! triggers a best-effort clock push, a poll triggers a drain of the
//! bridge's receive buffer into the engine's queue.
//!
//! The same handling serves the listener task that
//! [`initialize`](ProtocolEngine::initialize) registers: signal bytes
//! announced by the ring-indicator line arrive on the transport's
//! channel and are dispatched under the same bus lock, so background
//! recovery never splices into a foreground transaction.

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Local;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use x10_core::constants::{
    ACKNOWLEDGE, DEFAULT_DIM_PERCENT, DRAINED_BUFFER_CAPACITY, MAX_POLL_ROUNDS, MAX_SEND_ATTEMPTS,
    POLL_ACKNOWLEDGE, POLL_SIGNAL,
};
use x10_core::{CommandCode, DimAmount, Error, HouseCode, Result, UnitCode};
use x10_protocol::{BridgeSignal, Frame, encode_address, encode_clock, encode_function};

use crate::transport::{PortState, Transport};

/// State shared with the signal-listener task.
struct EngineShared {
    port: Arc<Mutex<PortState>>,
    monitored_house: HouseCode,
    drained: Mutex<VecDeque<u8>>,
    instance_id: Uuid,
}

/// Driver for one bridge, owning its transport.
pub struct ProtocolEngine {
    shared: Arc<EngineShared>,
    transport: Transport,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl ProtocolEngine {
    /// Wrap a transport and bind it to the house code whose incoming
    /// traffic the bridge watches.
    #[must_use]
    pub fn new(transport: Transport, monitored_house: HouseCode) -> Self {
        let shared = Arc::new(EngineShared {
            port: transport.state_handle(),
            monitored_house,
            drained: Mutex::new(VecDeque::new()),
            instance_id: Uuid::new_v4(),
        });
        ProtocolEngine {
            shared,
            transport,
            listener: Mutex::new(None),
        }
    }

    /// Identity of this engine instance, distinct per open port.
    #[must_use]
    pub fn instance_id(&self) -> Uuid {
        self.shared.instance_id
    }

    /// Name of the underlying port.
    #[must_use]
    pub fn port_name(&self) -> &str {
        self.transport.port_name()
    }

    /// Register the status-signal listener. Later calls are no-ops.
    ///
    /// # Errors
    /// Currently infallible; the listener runs until shutdown.
    pub async fn initialize(&self) -> Result<()> {
        let Some(mut signals) = self.transport.take_signal_receiver().await else {
            debug!(
                "Signal listener already registered on {}",
                self.transport.port_name()
            );
            return Ok(());
        };
        let shared = self.shared.clone();
        let cancel = self.transport.cancel_token();
        let handle = tokio::spawn(async move {
            loop {
                let byte = tokio::select! {
                    () = cancel.cancelled() => break,
                    received = signals.recv() => match received {
                        Some(byte) => byte,
                        None => break,
                    },
                };
                let signal = BridgeSignal::classify(byte);
                debug!("Device announced status byte {:#04x} ({:?})", byte, signal);
                let mut port = shared.port.lock().await;
                if let Err(e) = shared.dispatch_signal(&mut port, signal).await {
                    warn!("Status signal handling failed: {}", e);
                }
            }
        });
        *self.listener.lock().await = Some(handle);
        info!("Signal listener registered on {}", self.transport.port_name());
        Ok(())
    }

    /// Deliver one command to a device, retrying failed exchanges.
    ///
    /// Arguments are validated before anything touches the wire. The
    /// bus lock then spans the whole transaction: the address frame
    /// and the function frame, each checksum-verified. Dim and bright
    /// default to a 50% step when no amount is given.
    ///
    /// # Errors
    /// `Error::InvalidArgument` for an out-of-range unit or dim amount,
    /// `Error::CommandDelivery` when every attempt failed recoverably,
    /// or the first non-recoverable failure as-is.
    pub async fn send_command(
        &self,
        house: HouseCode,
        unit: u8,
        command: CommandCode,
        dim_percent: Option<u8>,
    ) -> Result<()> {
        let unit = UnitCode::new(unit)?;
        let dim = DimAmount::new(dim_percent.unwrap_or(DEFAULT_DIM_PERCENT))?;
        let address = encode_address(house, unit);
        let function = encode_function(house, command, dim);

        debug!("Sending {} to device {}{}", command, house, unit);
        let mut port = self.shared.port.lock().await;
        port.clear_scratch();
        for attempt in 1..=MAX_SEND_ATTEMPTS {
            match self.shared.deliver(&mut port, &address, &function).await {
                Ok(()) => {
                    debug!("Command delivered on attempt {}", attempt);
                    return Ok(());
                }
                Err(e) if e.is_recoverable() => {
                    debug!("Exchange attempt {} failed: {}, retrying", attempt, e);
                }
                Err(e) => return Err(e),
            }
        }
        error!(
            "Command delivery failed after {} attempts",
            MAX_SEND_ATTEMPTS
        );
        Err(Error::CommandDelivery {
            attempts: MAX_SEND_ATTEMPTS,
        })
    }

    /// Read whatever the bridge has ready.
    ///
    /// # Errors
    /// Propagates transport failures.
    pub async fn get_bytes(&self) -> Result<Bytes> {
        self.transport.read_bytes().await
    }

    /// Write raw bytes straight through to the bridge.
    ///
    /// # Errors
    /// Propagates transport failures.
    pub async fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        self.transport.write_bytes(bytes).await
    }

    /// Hand over the power-line data collected by poll drains, oldest
    /// byte first. The internal queue is empty afterwards.
    pub async fn take_drained(&self) -> Vec<u8> {
        self.shared.drained.lock().await.drain(..).collect()
    }

    pub(crate) fn begin_close(&self) {
        self.transport.begin_close();
    }

    /// Cancel I/O, stop the listener, and release the device. Safe to
    /// call more than once.
    pub async fn close(&self) {
        self.transport.begin_close();
        if let Some(handle) = self.listener.lock().await.take() {
            if handle.await.is_err() {
                warn!(
                    "Signal listener on {} ended abnormally",
                    self.transport.port_name()
                );
            }
        }
        self.transport.close().await;
    }
}

impl EngineShared {
    /// One full transaction: address frame, then function frame.
    async fn deliver(&self, port: &mut PortState, address: &Frame, function: &Frame) -> Result<()> {
        self.exchange(port, address).await?;
        self.exchange(port, function).await
    }

    /// One frame: write it, verify the checksum echo, acknowledge.
    ///
    /// A wrong echo is first treated as a status byte and handled,
    /// then reported as a checksum mismatch so the caller retries.
    async fn exchange(&self, port: &mut PortState, frame: &Frame) -> Result<()> {
        port.write_bytes(frame.as_bytes()).await?;
        let echo = port.read_byte().await?;
        let expected = frame.checksum();
        if echo != expected {
            self.dispatch_signal(port, BridgeSignal::classify(echo)).await?;
            return Err(Error::ChecksumMismatch {
                expected,
                actual: echo,
            });
        }
        port.write_bytes(&[ACKNOWLEDGE]).await?;
        // The bridge closes the exchange with its ready byte.
        let _ready = port.read_byte().await?;
        Ok(())
    }

    /// Act on a status byte, whichever domain it arrived from.
    ///
    /// Clock-push and drain failures are logged and swallowed so a
    /// transaction can still retry; the drain round cap is the one
    /// fatal exception.
    async fn dispatch_signal(&self, port: &mut PortState, signal: BridgeSignal) -> Result<()> {
        match signal {
            BridgeSignal::PowerFailure => {
                info!("Bridge reports a power failure, pushing the clock");
                if let Err(e) = self.synchronize_clock(port).await {
                    warn!("Clock push failed: {}", e);
                }
                Ok(())
            }
            BridgeSignal::Poll => match self.drain_incoming(port).await {
                Ok(count) => {
                    debug!("Drained {} bytes of power-line data", count);
                    Ok(())
                }
                Err(e @ Error::PollDrainExceeded { .. }) => Err(e),
                Err(e) => {
                    warn!("Poll drain failed: {}", e);
                    Ok(())
                }
            },
            BridgeSignal::Other(byte) => {
                debug!("Ignoring unrecognized status byte {:#04x}", byte);
                Ok(())
            }
        }
    }

    /// Push the wall-clock time into the bridge's battery-backed
    /// clock. The bridge's checksum reply is consumed but trusted.
    async fn synchronize_clock(&self, port: &mut PortState) -> Result<()> {
        let frame = encode_clock(&Local::now(), self.monitored_house);
        port.write_bytes(&frame).await?;
        let _checksum = port.read_byte().await?;
        port.write_bytes(&[ACKNOWLEDGE]).await?;
        let _ready = port.read_byte().await?;
        Ok(())
    }

    /// Acknowledge poll signals until the bridge switches to data,
    /// then pull its buffer into the drained queue.
    ///
    /// # Errors
    /// `Error::PollDrainExceeded` when the bridge keeps signalling
    /// instead of sending data, plus transport failures.
    async fn drain_incoming(&self, port: &mut PortState) -> Result<usize> {
        let mut length = None;
        for _ in 0..MAX_POLL_ROUNDS {
            port.write_bytes(&[POLL_ACKNOWLEDGE]).await?;
            let byte = port.read_byte().await?;
            if byte != POLL_SIGNAL {
                length = Some(byte);
                break;
            }
        }
        let Some(length) = length else {
            return Err(Error::PollDrainExceeded {
                rounds: MAX_POLL_ROUNDS,
            });
        };

        // The length covers a summary byte we discard plus the data.
        let count = usize::from(length).saturating_sub(1);
        let _summary = port.read_byte().await?;
        let mut data = Vec::with_capacity(count);
        for _ in 0..count {
            data.push(port.read_byte().await?);
        }

        let mut drained = self.drained.lock().await;
        for byte in data {
            if drained.len() == DRAINED_BUFFER_CAPACITY {
                drained.pop_front();
            }
            drained.push_back(byte);
        }
        Ok(count)
    }
}
