//! Serial transport with bounded, cancellable I/O.
//!
//! One [`Transport`] owns one byte stream to the bridge, either a real
//! serial device or an in-memory pipe for tests and the emulated
//! backend. All port access funnels through a single async mutex; the
//! protocol engine holds that lock for the span of a whole command
//! transaction so nothing can interleave with a half-finished
//! exchange.
//!
//! Real devices also get a background watcher on the ring-indicator
//! line. The bridge asserts it to announce a status byte outside any
//! host-initiated exchange; the watcher drains that byte and forwards
//! it on the signal channel for the engine's listener.

use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio::sync::{Mutex, MutexGuard, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_serial::{SerialPort, SerialPortBuilderExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use x10_core::constants::{
    READ_CHUNK_SIZE, READ_TIMEOUT_MS, RING_POLL_INTERVAL_MS, SERIAL_BAUD_RATE,
    SIGNAL_CHANNEL_CAPACITY, WRITE_TIMEOUT_MS,
};
use x10_core::{Error, Result};

trait ByteStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> ByteStream for T {}

enum PortKind {
    Serial(tokio_serial::SerialStream),
    InMemory(DuplexStream),
}

impl PortKind {
    fn stream(&mut self) -> &mut dyn ByteStream {
        match self {
            PortKind::Serial(port) => port,
            PortKind::InMemory(pipe) => pipe,
        }
    }

    /// Level of the ring-indicator line; always low for pipes.
    fn ring_asserted(&mut self) -> bool {
        match self {
            PortKind::Serial(port) => port.read_ring_indicator().unwrap_or(false),
            PortKind::InMemory(_) => false,
        }
    }
}

/// Everything that lives under the bus lock: the stream itself plus
/// the receive scratch carrying bytes read but not yet consumed.
pub struct PortState {
    kind: PortKind,
    scratch: BytesMut,
    read_timeout: Duration,
    write_timeout: Duration,
    cancel: CancellationToken,
}

impl PortState {
    /// Discard bytes left over from an earlier exchange.
    pub fn clear_scratch(&mut self) {
        self.scratch.clear();
    }

    /// Write all bytes, bounded by the write timeout.
    ///
    /// Empty input is a no-op and cancellation quietly gives up, so
    /// shutdown never turns an in-flight write into a hard failure.
    ///
    /// # Errors
    /// `Error::Timeout` when the device stops accepting data, or
    /// `Error::Io` for a failed stream.
    pub async fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        let cancel = self.cancel.clone();
        let deadline = self.write_timeout;
        let stream = self.kind.stream();
        tokio::select! {
            () = cancel.cancelled() => Ok(()),
            result = tokio::time::timeout(deadline, async {
                stream.write_all(bytes).await?;
                stream.flush().await
            }) => match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(Error::Io(e)),
                Err(_) => Err(Error::Timeout {
                    operation: "write".to_string(),
                }),
            },
        }
    }

    /// Read whatever the device has ready, up to one chunk.
    ///
    /// Returns an empty buffer when cancellation interrupts the read.
    ///
    /// # Errors
    /// `Error::Timeout` when the device stays quiet past the read
    /// timeout, or `Error::Io` for a failed or closed stream.
    pub async fn read_chunk(&mut self) -> Result<Bytes> {
        let cancel = self.cancel.clone();
        let deadline = self.read_timeout;
        let mut buf = BytesMut::zeroed(READ_CHUNK_SIZE);
        let stream = self.kind.stream();
        tokio::select! {
            () = cancel.cancelled() => Ok(Bytes::new()),
            result = tokio::time::timeout(deadline, stream.read(&mut buf)) => match result {
                Ok(Ok(0)) => Err(Error::Io(std::io::Error::new(
                    ErrorKind::UnexpectedEof,
                    "device closed the line",
                ))),
                Ok(Ok(n)) => {
                    buf.truncate(n);
                    Ok(buf.freeze())
                }
                Ok(Err(e)) => Err(Error::Io(e)),
                Err(_) => Err(Error::Timeout {
                    operation: "read".to_string(),
                }),
            },
        }
    }

    /// Next byte from the device, consuming the scratch first.
    ///
    /// # Errors
    /// `Error::Cancelled` when shutdown interrupts the read, plus
    /// everything [`read_chunk`](PortState::read_chunk) can return.
    pub async fn read_byte(&mut self) -> Result<u8> {
        if self.scratch.is_empty() {
            let chunk = self.read_chunk().await?;
            if chunk.is_empty() {
                return Err(Error::Cancelled);
            }
            self.scratch.extend_from_slice(&chunk);
        }
        Ok(self.scratch.get_u8())
    }

    fn take_buffered(&mut self) -> Bytes {
        self.scratch.split().freeze()
    }

    fn ring_asserted(&mut self) -> bool {
        self.kind.ring_asserted()
    }
}

/// Handle to one open port.
///
/// Cheap operations lock the port briefly; the engine instead keeps
/// the lock across a whole transaction via
/// [`lock_port`](Transport::lock_port).
pub struct Transport {
    state: Arc<Mutex<PortState>>,
    port_name: String,
    cancel: CancellationToken,
    signal_tx: mpsc::Sender<u8>,
    signal_rx: Mutex<Option<mpsc::Receiver<u8>>>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

/// Test-side counterpart of an in-memory transport.
///
/// Holds the far end of the pipe, which speaks the bridge's side of
/// the conversation, and a sender that delivers status bytes as if the
/// ring-indicator line had fired.
pub struct MockPortHandle {
    stream: Option<DuplexStream>,
    signal_tx: mpsc::Sender<u8>,
}

impl MockPortHandle {
    /// The bridge-side stream. Feed it to an emulator or drive it
    /// directly; `None` once taken.
    pub fn take_stream(&mut self) -> Option<DuplexStream> {
        self.stream.take()
    }

    /// Deliver a status byte through the signal channel.
    ///
    /// # Errors
    /// `Error::Cancelled` when the transport has shut down and nobody
    /// is listening any more.
    pub async fn inject_signal(&self, byte: u8) -> Result<()> {
        self.signal_tx
            .send(byte)
            .await
            .map_err(|_| Error::Cancelled)
    }
}

impl Transport {
    /// Open and configure the serial device.
    ///
    /// Port setup runs on the blocking pool. The line profile is fixed
    /// at 4800 baud, eight data bits, no parity, one stop bit, no flow
    /// control; reads and writes are bounded by 2.5 second timeouts.
    ///
    /// # Errors
    /// `Error::Connection` when the device cannot be opened.
    pub async fn open(port_name: &str) -> Result<Self> {
        let path = port_name.to_string();
        let port = tokio::task::spawn_blocking(move || open_serial_port(&path))
            .await
            .map_err(|e| Error::Connection {
                port: port_name.to_string(),
                message: format!("port setup task failed: {e}"),
            })??;

        let transport = Self::build(
            PortKind::Serial(port),
            port_name,
            Duration::from_millis(READ_TIMEOUT_MS),
            Duration::from_millis(WRITE_TIMEOUT_MS),
        );
        transport.spawn_ring_watcher().await;
        Ok(transport)
    }

    /// In-memory transport joined to a peer stream, for tests and the
    /// emulated backend.
    #[must_use]
    pub fn mock() -> (Self, MockPortHandle) {
        Self::mock_with_timeouts(
            Duration::from_millis(READ_TIMEOUT_MS),
            Duration::from_millis(WRITE_TIMEOUT_MS),
        )
    }

    /// Like [`mock`](Transport::mock), with tighter timeouts so tests
    /// that provoke a quiet line finish quickly.
    #[must_use]
    pub fn mock_with_timeouts(
        read_timeout: Duration,
        write_timeout: Duration,
    ) -> (Self, MockPortHandle) {
        let (near, far) = tokio::io::duplex(READ_CHUNK_SIZE);
        let transport = Self::build(PortKind::InMemory(near), "mock", read_timeout, write_timeout);
        let signal_tx = transport.signal_tx.clone();
        (
            transport,
            MockPortHandle {
                stream: Some(far),
                signal_tx,
            },
        )
    }

    fn build(
        kind: PortKind,
        port_name: &str,
        read_timeout: Duration,
        write_timeout: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();
        let (signal_tx, signal_rx) = mpsc::channel(SIGNAL_CHANNEL_CAPACITY);
        let state = Arc::new(Mutex::new(PortState {
            kind,
            scratch: BytesMut::new(),
            read_timeout,
            write_timeout,
            cancel: cancel.clone(),
        }));
        Transport {
            state,
            port_name: port_name.to_string(),
            cancel,
            signal_tx,
            signal_rx: Mutex::new(Some(signal_rx)),
            watcher: Mutex::new(None),
        }
    }

    async fn spawn_ring_watcher(&self) {
        let handle = tokio::spawn(watch_ring_indicator(
            self.state.clone(),
            self.signal_tx.clone(),
            self.cancel.clone(),
        ));
        *self.watcher.lock().await = Some(handle);
    }

    /// Name the port was opened with; `"mock"` for in-memory pipes.
    #[must_use]
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Lock the port for a multi-step exchange.
    pub async fn lock_port(&self) -> MutexGuard<'_, PortState> {
        self.state.lock().await
    }

    pub(crate) fn state_handle(&self) -> Arc<Mutex<PortState>> {
        self.state.clone()
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The ring-indicator byte channel; `None` after the first call.
    pub(crate) async fn take_signal_receiver(&self) -> Option<mpsc::Receiver<u8>> {
        self.signal_rx.lock().await.take()
    }

    /// Read whatever the device has ready, draining buffered bytes
    /// before touching the wire.
    ///
    /// # Errors
    /// See [`PortState::read_chunk`].
    pub async fn read_bytes(&self) -> Result<Bytes> {
        let mut state = self.state.lock().await;
        let buffered = state.take_buffered();
        if !buffered.is_empty() {
            return Ok(buffered);
        }
        state.read_chunk().await
    }

    /// Write raw bytes to the device.
    ///
    /// # Errors
    /// See [`PortState::write_bytes`].
    pub async fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        self.state.lock().await.write_bytes(bytes).await
    }

    /// Cancel all I/O without waiting for the watcher to wind down.
    pub fn begin_close(&self) {
        self.cancel.cancel();
    }

    /// Cancel all I/O and wait for the watcher to finish. Safe to call
    /// more than once.
    pub async fn close(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.watcher.lock().await.take() {
            if handle.await.is_err() {
                warn!("Ring watcher on {} ended abnormally", self.port_name);
            }
        }
    }
}

fn open_serial_port(path: &str) -> Result<tokio_serial::SerialStream> {
    tokio_serial::new(path, SERIAL_BAUD_RATE)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
        .map_err(|e| Error::Connection {
            port: path.to_string(),
            message: e.to_string(),
        })
}

/// Poll the ring-indicator line and forward each announced status byte
/// on the signal channel.
///
/// Each firing means exactly one byte is waiting; it gets drained here
/// under the bus lock so a concurrent transaction never sees it.
async fn watch_ring_indicator(
    state: Arc<Mutex<PortState>>,
    signals: mpsc::Sender<u8>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(Duration::from_millis(RING_POLL_INTERVAL_MS));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let byte = {
            let mut state = state.lock().await;
            if !state.ring_asserted() {
                continue;
            }
            match state.read_byte().await {
                Ok(byte) => byte,
                Err(Error::Cancelled) => break,
                Err(e) => {
                    debug!("Ring indicator fired but the read failed: {}", e);
                    continue;
                }
            }
        };
        if signals.send(byte).await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_mock() -> (Transport, MockPortHandle) {
        Transport::mock_with_timeouts(Duration::from_millis(50), Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_write_then_read_round_trip() {
        let (transport, mut handle) = fast_mock();
        let mut peer = handle.take_stream().unwrap();

        transport.write_bytes(&[0x04, 0x66]).await.unwrap();
        let mut buf = [0u8; 2];
        peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0x04, 0x66]);

        peer.write_all(&[0x6A, 0x55]).await.unwrap();
        let bytes = transport.read_bytes().await.unwrap();
        assert_eq!(&bytes[..], &[0x6A, 0x55]);
    }

    #[tokio::test]
    async fn test_empty_write_is_a_no_op() {
        let (transport, _handle) = fast_mock();
        transport.write_bytes(&[]).await.unwrap();
    }

    #[tokio::test]
    async fn test_quiet_line_times_out() {
        let (transport, _handle) = fast_mock();
        let err = transport.read_bytes().await.unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_cancelled_read_returns_empty() {
        let (transport, _handle) = fast_mock();
        transport.begin_close();
        let bytes = transport.read_bytes().await.unwrap();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn test_read_byte_consumes_scratch_in_order() {
        let (transport, mut handle) = fast_mock();
        let mut peer = handle.take_stream().unwrap();
        peer.write_all(&[1, 2, 3]).await.unwrap();

        let mut state = transport.lock_port().await;
        assert_eq!(state.read_byte().await.unwrap(), 1);
        assert_eq!(state.read_byte().await.unwrap(), 2);
        assert_eq!(state.read_byte().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_clear_scratch_discards_stale_bytes() {
        let (transport, mut handle) = fast_mock();
        let mut peer = handle.take_stream().unwrap();
        peer.write_all(&[0xBB, 0xCC]).await.unwrap();

        let mut state = transport.lock_port().await;
        // First read pulls both bytes in; the second is still buffered
        assert_eq!(state.read_byte().await.unwrap(), 0xBB);
        state.clear_scratch();
        let err = state.read_byte().await.unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_peer_hangup_is_an_io_error() {
        let (transport, mut handle) = fast_mock();
        drop(handle.take_stream());
        let err = transport.read_bytes().await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (transport, _handle) = fast_mock();
        transport.close().await;
        transport.close().await;
    }
}
