//! Offline dump decoding
//!
//! A dump is a flat sequence of raw page records, each `page_size` data
//! bytes followed by `oob_size` spare bytes. Page `n` starts at byte
//! offset `n * raw_page_size`. The data part of every page is scrambled by
//! the vendor and is recovered by [`decode_page`]:
//!
//! 1. every byte is complemented ([`invert`])
//! 2. the repeating key is subtracted byte by byte ([`mask_delta`])
//!
//! [`DumpReader`] exposes the record layout of a dump stream and produces
//! partition images, the concatenated spare areas and the boot header.
//! [`extract`] wraps these into file artifacts.

pub mod extract;
mod reader;
mod transform;

use std::string::String;
use std::vec::Vec;

pub use reader::{DumpReader, ExtractProgress, NoProgress};
pub use transform::{decode_page, invert, mask_delta};

/// Bytes at the start of a dump that hold the early boot header
pub const HEADER_SIZE: usize = 3520;

/// De-obfuscation key of the Echo Dot firmware
pub const DEFAULT_KEY: [u8; 8] = [0x8e, 0x21, 0x49, 0x9d, 0x9f, 0x3a, 0xa0, 0x0f];

/// Errors from offline decoding
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// I/O error on the dump or an artifact
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Key is empty or does not tile the page
    #[error("invalid key length {len} for page size {page_size}")]
    InvalidKeyLength {
        /// Key length in bytes
        len: usize,
        /// Page size in bytes
        page_size: usize,
    },

    /// The dump ends inside a page record
    #[error("page {page} is truncated: expected {expected} bytes, got {got}")]
    TruncatedPage {
        /// Page index
        page: u32,
        /// Raw page size
        expected: usize,
        /// Bytes present in the dump
        got: usize,
    },

    /// The dump is shorter than the boot header
    #[error("dump too short for header: expected {expected} bytes, got {got}")]
    TruncatedHeader {
        /// Header size
        expected: usize,
        /// Dump length
        got: u64,
    },

    /// Page index past the end of the dump
    #[error("page {page} is beyond the end of the dump ({page_count} pages)")]
    PageOutOfRange {
        /// Page index
        page: u32,
        /// Complete pages in the dump
        page_count: u32,
    },

    /// Malformed partition descriptor
    #[error("invalid partition '{name}': {reason}")]
    InvalidPartition {
        /// Partition name
        name: String,
        /// What is wrong with it
        reason: &'static str,
    },

    /// Geometry or other device-level error
    #[error("{0}")]
    Device(#[from] crate::Error),

    /// Partition table could not be parsed
    #[error("partition table: {0}")]
    Config(String),

    /// Malformed hex string
    #[error("invalid hex string: {0}")]
    InvalidHex(String),
}

/// Check that a key can be cycled across a page of `page_size` bytes
pub fn check_key(key: &[u8], page_size: usize) -> Result<(), DecodeError> {
    if key.is_empty() || page_size % key.len() != 0 {
        return Err(DecodeError::InvalidKeyLength {
            len: key.len(),
            page_size,
        });
    }
    Ok(())
}

/// Parse a key written as hex digits, e.g. `8e21499d9f3aa00f`
///
/// An optional `0x` prefix and embedded whitespace, `:` or `-` separators
/// are accepted.
pub fn parse_hex_key(s: &str) -> Result<Vec<u8>, DecodeError> {
    let trimmed = s.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let digits: Vec<u8> = body
        .bytes()
        .filter(|b| !b.is_ascii_whitespace() && *b != b':' && *b != b'-')
        .collect();

    if digits.is_empty() || digits.len() % 2 != 0 {
        return Err(DecodeError::InvalidHex(s.into()));
    }

    digits
        .chunks(2)
        .map(|pair| {
            let hi = (pair[0] as char).to_digit(16);
            let lo = (pair[1] as char).to_digit(16);
            match (hi, lo) {
                (Some(hi), Some(lo)) => Ok(((hi << 4) | lo) as u8),
                _ => Err(DecodeError::InvalidHex(s.into())),
            }
        })
        .collect()
}
