//! FTDI MCU host bus emulation protocol
//!
//! In MCU mode the FT2232H drives an 8-bit data bus plus an address bus.
//! The NAND I/O lines sit on the data bus and the NAND control lines on
//! the upper address byte, so every transfer carries the control state in
//! its address-high byte. The NAND ready/busy line is sampled through the
//! high GPIO byte.

use rnand_core::bus::ControlLines;

// ============================================================================
// USB VID/PID constants
// ============================================================================

/// FTDI vendor ID
pub const FTDI_VID: u16 = 0x0403;

/// FT2232H product ID (dual channel)
pub const FTDI_FT2232H_PID: u16 = 0x6010;

// ============================================================================
// MCU host bus emulation commands
// ============================================================================

/// Read one byte, 8-bit address
pub const READ_SHORT: u8 = 0x90;

/// Read one byte, 16-bit address
pub const READ_EXTENDED: u8 = 0x91;

/// Write one byte, 8-bit address
pub const WRITE_SHORT: u8 = 0x92;

/// Write one byte, 16-bit address
pub const WRITE_EXTENDED: u8 = 0x93;

/// Set data bits high byte
pub const SET_BITS_HIGH: u8 = 0x82;

/// Get data bits high byte
pub const GET_BITS_HIGH: u8 = 0x83;

/// Send immediate (flush buffers)
pub const SEND_IMMEDIATE: u8 = 0x87;

/// Disable divide-by-5 prescaler (60 MHz clock)
pub const DIS_DIV_5: u8 = 0x8A;

/// Enable divide-by-5 prescaler (12 MHz clock)
pub const EN_DIV_5: u8 = 0x8B;

// ============================================================================
// Address-high byte: NAND control lines
// ============================================================================

/// Chip enable, active low
pub const ADR_CE: u8 = 0x10;

/// Write protect, active low
pub const ADR_WP: u8 = 0x20;

/// Command latch enable
pub const ADR_CL: u8 = 0x40;

/// Address latch enable
pub const ADR_AL: u8 = 0x80;

/// Both ready/busy sense bits in the high GPIO byte
pub const READY_MASK: u8 = 0x06;

/// Initial high GPIO byte value and direction
pub const INIT_BITS_HIGH: [u8; 3] = [SET_BITS_HIGH, 0x00, 0x01];

/// Default USB latency timer in milliseconds
pub const DEFAULT_LATENCY: u8 = 1;

/// FTDI channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FtdiInterface {
    /// Channel A
    A,
    /// Channel B (default, the MCU bus of the reader board)
    #[default]
    B,
}

impl FtdiInterface {
    /// Parse interface from character
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'A' => Some(FtdiInterface::A),
            'B' => Some(FtdiInterface::B),
            _ => None,
        }
    }

    /// Get the channel letter
    pub fn letter(&self) -> char {
        match self {
            FtdiInterface::A => 'A',
            FtdiInterface::B => 'B',
        }
    }
}

/// MCU bus clock
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClockMode {
    /// 12 MHz with the divide-by-5 prescaler
    ///
    /// Every read returns each data byte twice.
    #[default]
    Slow,
    /// 60 MHz
    Fast,
}

impl ClockMode {
    /// Parse a clock name
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "slow" | "12mhz" | "12" => Some(ClockMode::Slow),
            "fast" | "60mhz" | "60" => Some(ClockMode::Fast),
            _ => None,
        }
    }

    /// Prescaler command selecting this clock
    pub fn command(&self) -> u8 {
        match self {
            ClockMode::Slow => EN_DIV_5,
            ClockMode::Fast => DIS_DIV_5,
        }
    }

    /// Clock frequency in MHz
    pub fn mhz(&self) -> u32 {
        match self {
            ClockMode::Slow => 12,
            ClockMode::Fast => 60,
        }
    }

    /// Bytes returned per data byte read
    pub fn read_multiplier(&self) -> usize {
        match self {
            ClockMode::Slow => 2,
            ClockMode::Fast => 1,
        }
    }
}

/// Address-high byte carrying the control lines
pub fn control_byte(lines: ControlLines) -> u8 {
    let mut byte = 0;
    if !lines.contains(ControlLines::CHIP_ENABLE) {
        byte |= ADR_CE;
    }
    if !lines.contains(ControlLines::WRITE_PROTECT) {
        byte |= ADR_WP;
    }
    if lines.contains(ControlLines::COMMAND_LATCH) {
        byte |= ADR_CL;
    }
    if lines.contains(ControlLines::ADDRESS_LATCH) {
        byte |= ADR_AL;
    }
    byte
}

/// Build the command stream writing `data` under `control`
///
/// The first byte sets the full 16-bit address, the rest reuse it.
pub fn encode_write(control: u8, data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(data.len() * 3 + 1);
    for (i, b) in data.iter().enumerate() {
        if i == 0 {
            buf.extend_from_slice(&[WRITE_EXTENDED, control, 0x00, *b]);
        } else {
            buf.extend_from_slice(&[WRITE_SHORT, 0x00, *b]);
        }
    }
    buf
}

/// Build the command stream reading `count` bytes under `control`
pub fn encode_read(control: u8, count: usize) -> Vec<u8> {
    let mut buf = Vec::with_capacity(count * 2 + 2);
    if count > 0 {
        buf.extend_from_slice(&[READ_EXTENDED, control, 0x00]);
        for _ in 1..count {
            buf.extend_from_slice(&[READ_SHORT, 0x00]);
        }
    }
    buf.push(SEND_IMMEDIATE);
    buf
}

/// Drop the duplicate bytes returned in slow clock mode
pub fn undouble(raw: &[u8]) -> Vec<u8> {
    raw.iter().step_by(2).copied().collect()
}

/// Whether a high GPIO sample reports the device ready
pub fn is_ready(bits: u8) -> bool {
    bits & READY_MASK == READY_MASK
}
