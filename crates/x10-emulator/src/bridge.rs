//! The bridge's side of the serial conversation.

use std::collections::VecDeque;
use std::io::ErrorKind;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use x10_core::constants::{
    ACKNOWLEDGE, CLOCK_FRAME_LEN, CLOCK_HEADER, INTERFACE_READY, POLL_ACKNOWLEDGE, POLL_SIGNAL,
    POWER_FAILURE,
};
use x10_protocol::Frame;

use crate::script::{EmulatorEvent, Fault};

/// Longest power-line payload one poll drain can serve. The length
/// byte covers the payload plus the summary byte the host skips.
const MAX_LINE_DATA: usize = 254;

#[derive(Debug, Error)]
pub enum EmulatorError {
    #[error("emulator stream failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Emulated bridge speaking over any byte stream.
///
/// Construct one over the far end of an in-memory pipe, script any
/// faults, then let [`run`](BridgeEmulator::run) own the conversation
/// until the host hangs up.
pub struct BridgeEmulator<S> {
    stream: S,
    faults: VecDeque<Fault>,
    line_data: VecDeque<Vec<u8>>,
    poll_forever: bool,
    events: Vec<EmulatorEvent>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> BridgeEmulator<S> {
    pub fn new(stream: S) -> Self {
        BridgeEmulator {
            stream,
            faults: VecDeque::new(),
            line_data: VecDeque::new(),
            poll_forever: false,
            events: Vec::new(),
        }
    }

    /// Queue one fault for the next unconsumed frame.
    #[must_use]
    pub fn script_fault(mut self, fault: Fault) -> Self {
        self.faults.push_back(fault);
        self
    }

    /// Queue several faults at once, in order.
    #[must_use]
    pub fn script_faults(mut self, faults: impl IntoIterator<Item = Fault>) -> Self {
        self.faults.extend(faults);
        self
    }

    /// Buffer one batch of power-line data; each poll drain serves one
    /// queued batch, oldest first.
    ///
    /// # Panics
    /// Panics if `bytes` exceeds what one length byte can describe.
    #[must_use]
    pub fn queue_line_data(mut self, bytes: &[u8]) -> Self {
        assert!(
            bytes.len() <= MAX_LINE_DATA,
            "line data limited to {MAX_LINE_DATA} bytes per batch"
        );
        self.line_data.push_back(bytes.to_vec());
        self
    }

    /// Speak the bridge's side of the conversation until the peer hangs
    /// up, then return the ordered event log.
    ///
    /// # Errors
    /// Returns `EmulatorError::Io` only for stream failures that are
    /// not a plain disconnect; the host closing its end is the normal
    /// way a session finishes.
    pub async fn run(mut self) -> Result<Vec<EmulatorEvent>, EmulatorError> {
        loop {
            let Some(first) = self.read_byte().await? else {
                break;
            };
            match first {
                ACKNOWLEDGE => {
                    self.events.push(EmulatorEvent::HostAcknowledged);
                    if !self.write(&[INTERFACE_READY]).await? {
                        break;
                    }
                }
                POLL_ACKNOWLEDGE => {
                    self.events.push(EmulatorEvent::PollAcknowledged);
                    let response = if self.poll_forever {
                        vec![POLL_SIGNAL]
                    } else {
                        self.drain_response()
                    };
                    if !self.write(&response).await? {
                        break;
                    }
                }
                CLOCK_HEADER => {
                    let mut frame = [0u8; CLOCK_FRAME_LEN];
                    frame[0] = CLOCK_HEADER;
                    if !self.read_exact(&mut frame[1..]).await? {
                        break;
                    }
                    self.events.push(EmulatorEvent::ClockSet(frame));
                    let checksum = frame.iter().fold(0u8, |sum, b| sum.wrapping_add(*b));
                    if !self.write(&[checksum]).await? {
                        break;
                    }
                }
                header => {
                    let Some(payload) = self.read_byte().await? else {
                        break;
                    };
                    let frame = Frame::from_parts(header, payload);
                    self.events.push(EmulatorEvent::FrameReceived([header, payload]));
                    if !self.answer_frame(frame).await? {
                        break;
                    }
                }
            }
        }
        Ok(self.events)
    }

    async fn answer_frame(&mut self, frame: Frame) -> Result<bool, EmulatorError> {
        let Some(fault) = self.faults.pop_front() else {
            return self.write(&[frame.checksum()]).await;
        };
        self.events.push(EmulatorEvent::FaultInjected(fault));
        match fault {
            Fault::WrongChecksum => self.write(&[corrupt(frame.checksum())]).await,
            Fault::PowerFailure => self.write(&[POWER_FAILURE]).await,
            Fault::PollForever => {
                self.poll_forever = true;
                self.write(&[POLL_SIGNAL]).await
            }
            Fault::Silent => Ok(true),
        }
    }

    /// Build the drain payload: length byte, a summary byte the host
    /// discards, then the oldest buffered batch.
    fn drain_response(&mut self) -> Vec<u8> {
        let payload = self.line_data.pop_front().unwrap_or_default();
        let mut response = Vec::with_capacity(payload.len() + 2);
        response.push((payload.len() + 1) as u8);
        response.push(0x00);
        response.extend_from_slice(&payload);
        response
    }

    async fn read_byte(&mut self) -> Result<Option<u8>, EmulatorError> {
        let mut buf = [0u8; 1];
        match self.stream.read(&mut buf).await {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(buf[0])),
            Err(e) if is_disconnect(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_exact(&mut self, buf: &mut [u8]) -> Result<bool, EmulatorError> {
        match self.stream.read_exact(buf).await {
            Ok(_) => Ok(true),
            Err(e) if is_disconnect(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<bool, EmulatorError> {
        match self.stream.write_all(bytes).await {
            Ok(()) => Ok(true),
            Err(e) if is_disconnect(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// A checksum echo guaranteed wrong, avoiding the bytes the host would
/// read as a status signal.
fn corrupt(checksum: u8) -> u8 {
    let mut bad = checksum.wrapping_add(1);
    while bad == POWER_FAILURE || bad == POLL_SIGNAL {
        bad = bad.wrapping_add(1);
    }
    bad
}

fn is_disconnect(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::UnexpectedEof | ErrorKind::BrokenPipe | ErrorKind::ConnectionReset
    )
}
