//! Partition tables
//!
//! A partition is a contiguous page range of a raw dump that decodes to one
//! output image. Tables come from a TOML file or the built-in list.

mod toml;
mod types;

pub use self::toml::parse_number;
pub use types::{DecodeSettings, PartitionDescriptor, PartitionTable};
