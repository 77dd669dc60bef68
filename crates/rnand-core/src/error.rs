//! Error types for rnand-core
//!
//! The protocol side of the crate uses a small `Copy` error so it stays
//! usable without `std`. Offline dump decoding has its own richer error type
//! in [`crate::decode::DecodeError`].

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Transport errors
    /// The bus could not be read or written (disconnected, USB failure)
    Transport,
    /// A read returned fewer bytes than requested
    ShortRead {
        /// Number of bytes requested
        expected: usize,
        /// Number of bytes actually returned
        got: usize,
    },

    // Identification errors
    /// Device ID did not match the expected byte sequence, or the device
    /// has not been identified yet
    NotIdentified,
    /// ONFI parameter page did not start with the "ONFI" signature
    OnfiSignature,

    // Read errors
    /// No two consecutive reads of a page agreed
    ConsensusFailure {
        /// Page that could not be confirmed
        page: u32,
        /// Number of attempts made
        attempts: usize,
    },
    /// Page index is beyond the device geometry
    PageOutOfRange {
        /// Requested page
        page: u32,
    },
    /// Block index is beyond the device geometry
    BlockOutOfRange {
        /// Requested block
        block: u32,
    },

    // Configuration errors
    /// Geometry values are zero or inconsistent
    InvalidGeometry,
    /// Invalid protocol parameter (chunk size, attempt count)
    InvalidParameter,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport => write!(f, "bus transport error"),
            Self::ShortRead { expected, got } => {
                write!(f, "short read: expected {} bytes, got {}", expected, got)
            }
            Self::NotIdentified => write!(f, "NAND device not identified"),
            Self::OnfiSignature => write!(f, "ONFI parameter page signature mismatch"),
            Self::ConsensusFailure { page, attempts } => write!(
                f,
                "no consensus for page {} after {} attempts",
                page, attempts
            ),
            Self::PageOutOfRange { page } => write!(f, "page {} out of range", page),
            Self::BlockOutOfRange { block } => write!(f, "block {} out of range", block),
            Self::InvalidGeometry => write!(f, "invalid device geometry"),
            Self::InvalidParameter => write!(f, "invalid protocol parameter"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
