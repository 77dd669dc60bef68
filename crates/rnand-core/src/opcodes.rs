//! ONFI-style NAND command opcodes
//!
//! Only the read-side command set is used; program and erase opcodes are
//! deliberately absent.

// ============================================================================
// Page read
// ============================================================================

/// Read page, first cycle (followed by address cycles)
pub const READ: u8 = 0x00;
/// Read page, confirm cycle (starts the array-to-register transfer)
pub const READ_START: u8 = 0x30;

// ============================================================================
// Identification
// ============================================================================

/// Read ID
pub const READ_ID: u8 = 0x90;
/// Read parameter page
pub const READ_PARAMETER_PAGE: u8 = 0xEC;
/// Read unique ID
pub const READ_UNIQUE_ID: u8 = 0xED;
/// Get features
pub const GET_FEATURES: u8 = 0xEE;

// ============================================================================
// Misc
// ============================================================================

/// Read status register
pub const READ_STATUS: u8 = 0x70;
/// Reset the device
pub const RESET: u8 = 0xFF;

// ============================================================================
// READ ID addresses
// ============================================================================

/// READ ID address returning manufacturer/device bytes
pub const READ_ID_ADDR_JEDEC: u8 = 0x00;
/// READ ID address returning the "ONFI" signature
pub const READ_ID_ADDR_ONFI: u8 = 0x20;

/// Column address cycles on large-page parts
pub const COLUMN_CYCLES: u8 = 2;
