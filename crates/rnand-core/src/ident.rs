//! Identification record
//!
//! Everything gathered while identifying a device. Only the ID bytes gate
//! page I/O; the rest is diagnostic.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write;

use crate::chip::{manufacturer_name, ChipProfile};
use crate::onfi::OnfiParameters;

/// Number of READ ID bytes sampled
pub const ID_LEN: usize = 8;

/// Length of the raw unique ID sample
pub const UNIQUE_ID_LEN: usize = 32;

/// Feature addresses sampled during identification, with their names
pub const FEATURE_ADDRESSES: [(u8, &str); 6] = [
    (0x01, "Timing mode"),
    (0x80, "Programmable I/O drive strength"),
    (0x89, "Special read for data recovery"),
    (0x90, "Array operation mode"),
    (0xA0, "Block protection"),
    (0xB0, "Configuration"),
];

/// Unique ID sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniqueId {
    /// Raw 32-byte sample (ID followed by its complement on real parts)
    pub raw: [u8; UNIQUE_ID_LEN],
}

impl UniqueId {
    /// XOR of the first 16 bytes against the second 16 bytes
    ///
    /// A healthy sample of an ID/complement pair yields all 0xFF.
    pub fn fingerprint(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        for (i, b) in out.iter_mut().enumerate() {
            *b = self.raw[i] ^ self.raw[i + 16];
        }
        out
    }
}

/// A sampled GET FEATURES parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureValue {
    /// Feature address
    pub address: u8,
    /// Feature name
    pub name: &'static str,
    /// The four parameter bytes P1..P4
    pub params: [u8; 4],
}

/// Result of a successful identification
#[derive(Debug, Clone)]
pub struct Identification {
    /// Matched chip profile
    pub profile: &'static ChipProfile,
    /// Raw READ ID bytes
    pub id_bytes: [u8; ID_LEN],
    /// ONFI parameter page, if the device advertised one
    pub onfi: Option<OnfiParameters>,
    /// Unique ID sample
    pub unique_id: UniqueId,
    /// Feature configuration samples
    pub features: Vec<FeatureValue>,
}

impl Identification {
    /// Manufacturer name from the first ID byte
    pub fn manufacturer(&self) -> &'static str {
        manufacturer_name(self.id_bytes[0])
    }

    /// Compact ID string
    ///
    /// Many parts wrap around after their real ID length, so a trailing
    /// repetition of the leading bytes is removed.
    pub fn id_string(&self) -> String {
        compact_id_string(&self.id_bytes)
    }

    /// Number of meaningful ID bytes
    pub fn id_length(&self) -> usize {
        self.id_string().len() / 2
    }
}

fn compact_id_string(id: &[u8]) -> String {
    let mut s = String::with_capacity(id.len() * 2);
    for b in id {
        let _ = write!(s, "{:02X}", b);
    }
    if s.len() >= 8 && s[..4] == s[s.len() - 4..] {
        s.truncate(s.len() - 4);
        if s.len() >= 4 && s[..2] == s[s.len() - 2..] {
            s.truncate(s.len() - 2);
        }
    }
    s
}
