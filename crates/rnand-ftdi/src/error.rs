//! Error types for the FTDI transport

use std::fmt;

/// Result type for FTDI operations
pub type Result<T> = std::result::Result<T, FtdiError>;

/// Errors raised by the FTDI bus
#[derive(Debug)]
pub enum FtdiError {
    /// The channel could not be opened
    OpenFailed {
        /// USB vendor ID searched for
        vid: u16,
        /// USB product ID searched for
        pid: u16,
        /// Channel letter
        interface: char,
        /// libftdi message
        reason: String,
    },

    /// A setup step failed after the channel was opened
    ConfigFailed {
        /// What was being configured
        step: &'static str,
        /// libftdi message
        reason: String,
    },

    /// Writing a command buffer failed
    WriteFailed(String),

    /// Reading bus data failed
    ReadFailed(String),

    /// The chip stopped returning data
    Timeout {
        /// Bytes received before giving up
        got: usize,
        /// Bytes requested
        expected: usize,
    },

    /// Invalid option value
    InvalidParameter(String),

    /// USB enumeration error
    Usb(String),
}

impl fmt::Display for FtdiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FtdiError::OpenFailed {
                vid,
                pid,
                interface,
                reason,
            } => write!(
                f,
                "cannot open {:04X}:{:04X} channel {}: {}",
                vid, pid, interface, reason
            ),
            FtdiError::ConfigFailed { step, reason } => {
                write!(f, "{} failed: {}", step, reason)
            }
            FtdiError::WriteFailed(s) => write!(f, "bus write failed: {}", s),
            FtdiError::ReadFailed(s) => write!(f, "bus read failed: {}", s),
            FtdiError::Timeout { got, expected } => write!(
                f,
                "bus read timed out after {} of {} bytes",
                got, expected
            ),
            FtdiError::InvalidParameter(s) => write!(f, "invalid parameter: {}", s),
            FtdiError::Usb(s) => write!(f, "USB error: {}", s),
        }
    }
}

impl std::error::Error for FtdiError {}

impl From<nusb::Error> for FtdiError {
    fn from(e: nusb::Error) -> Self {
        FtdiError::Usb(e.to_string())
    }
}

// Every transport fault looks the same to the protocol engine
impl From<FtdiError> for rnand_core::Error {
    fn from(e: FtdiError) -> Self {
        log::error!("ftdi: {}", e);
        rnand_core::Error::Transport
    }
}
