//! Bus transport contract
//!
//! A NAND bus is the byte-oriented control interface the protocol engine
//! drives: four control lines, byte writes, byte reads and a ready/busy
//! poll. Implementations live in their own crates (FTDI, emulator).
//!
//! The control lines are expressed logically: a set flag means the line is
//! *asserted*, regardless of the electrical polarity of the pin. Backends
//! translate to pin levels (CE# and WP# are active low on real parts).

use alloc::vec::Vec;
use bitflags::bitflags;

use crate::error::Result;

bitflags! {
    /// NAND control lines, logically asserted when set
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ControlLines: u8 {
        /// Chip enable (CE#)
        const CHIP_ENABLE   = 1 << 0;
        /// Write protect (WP#)
        const WRITE_PROTECT = 1 << 1;
        /// Command latch enable (CLE)
        const COMMAND_LATCH = 1 << 2;
        /// Address latch enable (ALE)
        const ADDRESS_LATCH = 1 << 3;
    }
}

impl Default for ControlLines {
    fn default() -> Self {
        ControlLines::CHIP_ENABLE | ControlLines::WRITE_PROTECT
    }
}

impl ControlLines {
    /// Lines for a command cycle
    pub fn command(base: ControlLines) -> Self {
        (base | ControlLines::COMMAND_LATCH) - ControlLines::ADDRESS_LATCH
    }

    /// Lines for an address cycle
    pub fn address(base: ControlLines) -> Self {
        (base | ControlLines::ADDRESS_LATCH) - ControlLines::COMMAND_LATCH
    }

    /// Lines for a data cycle (neither latch asserted)
    pub fn data(base: ControlLines) -> Self {
        base - (ControlLines::COMMAND_LATCH | ControlLines::ADDRESS_LATCH)
    }
}

/// NAND bus transport
///
/// The protocol engine assumes nothing about transport reliability beyond
/// this: a read either returns exactly `count` bytes or reports an error.
/// Returning fewer bytes is treated as a transport failure by the caller.
///
/// All methods block until the transport has completed the operation.
pub trait NandBus {
    /// Set the control lines used for subsequent byte transfers
    fn assert_control(&mut self, lines: ControlLines) -> Result<()>;

    /// Write bytes with the currently asserted control lines
    fn write_bytes(&mut self, data: &[u8]) -> Result<()>;

    /// Read `count` bytes with the currently asserted control lines
    fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>>;

    /// Sample the ready/busy line
    ///
    /// Returns `Ok(true)` when the device is ready. An `Err` means the line
    /// could not be sampled at all, which is fatal to the caller.
    fn poll_ready(&mut self) -> Result<bool>;

    /// Short human-readable name of the transport
    fn name(&self) -> &'static str {
        "nand-bus"
    }
}

// Forwarding impls so sessions can hold a boxed or borrowed bus chosen at runtime
impl<T: NandBus + ?Sized> NandBus for alloc::boxed::Box<T> {
    fn assert_control(&mut self, lines: ControlLines) -> Result<()> {
        (**self).assert_control(lines)
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        (**self).write_bytes(data)
    }

    fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        (**self).read_bytes(count)
    }

    fn poll_ready(&mut self) -> Result<bool> {
        (**self).poll_ready()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

impl<T: NandBus + ?Sized> NandBus for &mut T {
    fn assert_control(&mut self, lines: ControlLines) -> Result<()> {
        (**self).assert_control(lines)
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        (**self).write_bytes(data)
    }

    fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        (**self).read_bytes(count)
    }

    fn poll_ready(&mut self) -> Result<bool> {
        (**self).poll_ready()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latch_helpers() {
        let base = ControlLines::default();
        let cmd = ControlLines::command(base);
        assert!(cmd.contains(ControlLines::COMMAND_LATCH));
        assert!(!cmd.contains(ControlLines::ADDRESS_LATCH));
        assert!(cmd.contains(ControlLines::WRITE_PROTECT));

        let addr = ControlLines::address(cmd);
        assert!(addr.contains(ControlLines::ADDRESS_LATCH));
        assert!(!addr.contains(ControlLines::COMMAND_LATCH));

        let data = ControlLines::data(addr);
        assert_eq!(data, base);
    }
}
