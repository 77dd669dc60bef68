//! rnand-core - Core library for raw NAND dumping
//!
//! This crate turns a byte-oriented NAND control bus into reliable page
//! reads, and decodes captured dumps into partition images.
//!
//! - [`bus::NandBus`] is the transport contract implemented by hardware
//!   and emulator crates.
//! - [`protocol::NandDevice`] runs the command/address/data phases,
//!   identifies the device and reads pages and blocks.
//! - [`consensus`] requires two identical reads before a page is accepted.
//! - [`decode`] and [`partition`] work offline on a dump file.
//!
//! # Features
//!
//! - `std` (default) - File-backed dump decoding and TOML partition tables.
//!   Without it the protocol side only needs `alloc`.
//!
//! # Example
//!
//! ```ignore
//! use rnand_core::{bus::NandBus, protocol::NandDevice};
//!
//! fn dump_first_page<B: NandBus>(bus: B) -> rnand_core::Result<Vec<u8>> {
//!     let mut nand = NandDevice::new(bus);
//!     nand.identify()?;
//!     Ok(nand.read_page_confirmed(0)?.data)
//! }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

extern crate alloc;

pub mod bus;
pub mod chip;
pub mod consensus;
#[cfg(feature = "std")]
pub mod decode;
pub mod error;
pub mod geometry;
pub mod ident;
pub mod onfi;
pub mod opcodes;
#[cfg(feature = "std")]
pub mod partition;
pub mod protocol;

pub use error::{Error, Result};
