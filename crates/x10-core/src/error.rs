use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Validation errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // Device errors
    #[error("Connection error on {port}: {message}")]
    Connection { port: String, message: String },

    #[error("Failed to open device on {port}")]
    DeviceOpen {
        port: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Operation not supported: {0}")]
    Unsupported(String),

    // Protocol errors
    #[error("Timed out during {operation}")]
    Timeout { operation: String },

    #[error("Checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    #[error("Command delivery failed after {attempts} attempts")]
    CommandDelivery { attempts: u32 },

    #[error("Poll drain gave up after {rounds} rounds without a length byte")]
    PollDrainExceeded { rounds: u32 },

    #[error("Operation cancelled")]
    Cancelled,

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether a failed bridge exchange may be retried.
    ///
    /// A timed-out read/write or a checksum echo that does not match the
    /// sent frame are transient line conditions; everything else means the
    /// device, the connection, or the caller's input is bad and retrying
    /// cannot help.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Timeout { .. } | Error::ChecksumMismatch { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
