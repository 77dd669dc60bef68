//! rnand-ftdi - FTDI MCU host bus transport
//!
//! Drives a raw NAND chip wired to the MCU host bus of an FT2232H:
//!
//! - data bus D0..D7 to NAND I/O0..I/O7
//! - address-high lines to CE# (0x10), WP# (0x20), CLE (0x40) and ALE (0x80)
//! - ready/busy sensed through the high GPIO byte (bits 1 and 2)
//!
//! # Example
//!
//! ```no_run
//! use rnand_ftdi::{FtdiNand, FtdiNandConfig};
//! use rnand_core::protocol::NandDevice;
//!
//! let bus = FtdiNand::open(&FtdiNandConfig::default())?;
//! let mut nand = NandDevice::new(bus);
//! nand.identify()?;
//! let page = nand.read_page_confirmed(0)?;
//! println!("page 0: {} bytes", page.data.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Programmer Options
//!
//! - `vid=<hex>` / `pid=<hex>` - USB IDs (default: 0403:6010)
//! - `interface=<A|B>` - Channel to use (default: B)
//! - `clock=<slow|fast>` - 12 MHz or 60 MHz bus clock (default: slow)
//! - `latency=<ms>` - USB latency timer (default: 1)
//!
//! In slow mode the chip returns every data byte twice; the duplicates are
//! dropped before the data reaches the protocol engine.

mod device;
mod error;
mod protocol;

pub use device::{parse_options, FtdiDeviceInfo, FtdiNand, FtdiNandConfig};
pub use error::{FtdiError, Result};
pub use protocol::{ClockMode, FtdiInterface, FTDI_FT2232H_PID, FTDI_VID};
