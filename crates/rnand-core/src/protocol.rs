//! NAND protocol engine
//!
//! Turns the byte-oriented [`NandBus`] into identification and page reads.
//! Every transaction follows the same phase order:
//!
//! ```text
//! Idle -> (wait) -> CommandSent -> (wait) -> AddressSent -> (confirm)
//!      -> Busy -> (wait) -> DataPhase -> Idle
//! ```
//!
//! A ready wait precedes every command, address and data phase. The wait is
//! unbounded: a device that never becomes ready hangs the caller, while a
//! bus that cannot be sampled at all fails the operation immediately.
//!
//! No ECC is applied to page data. The consensus read in
//! [`crate::consensus`] is the only protection against transfer errors.

use alloc::vec::Vec;
use bitflags::bitflags;

use crate::bus::{ControlLines, NandBus};
use crate::chip::{ChipProfile, MX30LF4G28AD};
use crate::consensus::{self, MAX_ATTEMPTS};
use crate::error::{Error, Result};
use crate::geometry::Geometry;
use crate::ident::{
    FeatureValue, Identification, UniqueId, FEATURE_ADDRESSES, ID_LEN, UNIQUE_ID_LEN,
};
use crate::onfi::{OnfiParameters, ONFI_SIGNATURE, PARAMETER_PAGE_LEN};
use crate::opcodes;

/// Default bytes per data-phase transfer
///
/// One byte per transfer is slow but is what bit-banged and MCU-mode
/// transports handle reliably.
pub const DEFAULT_CHUNK_SIZE: usize = 1;

bitflags! {
    /// NAND status register (READ STATUS)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Status: u8 {
        /// Last operation failed
        const FAIL          = 1 << 0;
        /// Previous cache operation failed
        const CACHE_FAIL    = 1 << 1;
        /// Array idle (no internal operation in progress)
        const ARRAY_READY   = 1 << 5;
        /// Ready for a new command
        const READY         = 1 << 6;
        /// Device is not write protected
        const NOT_PROTECTED = 1 << 7;
    }
}

/// Transaction phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No transaction in progress
    Idle,
    /// A command byte was latched
    CommandSent,
    /// Address bytes were latched
    AddressSent,
    /// Confirm command sent, device is loading the page register
    Busy,
    /// Data is being clocked out
    DataPhase,
}

/// A raw page as read from the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageBuffer {
    /// Page index this buffer was read from
    pub page: u32,
    /// Page bytes (data followed by spare area unless stripped)
    pub data: Vec<u8>,
}

impl PageBuffer {
    /// Spare area of the page, empty if already stripped
    pub fn spare(&self, geometry: &Geometry) -> &[u8] {
        self.data.get(geometry.page_size..).unwrap_or(&[])
    }

    /// Drop the spare area
    pub fn strip_spare(mut self, geometry: &Geometry) -> Self {
        self.data.truncate(geometry.page_size);
        self
    }

    /// Whether the factory bad-block marker of this page is set
    pub fn has_bad_block_marker(&self, geometry: &Geometry) -> bool {
        self.data
            .get(geometry.bad_block_marker_offset())
            .is_some_and(|&b| b != 0xFF)
    }
}

/// Result of a whole-block read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockData {
    /// Block index
    pub block: u32,
    /// Whether the block carries a bad-block marker
    pub bad: bool,
    /// Concatenated page buffers; empty for a bad block outside raw mode
    pub data: Vec<u8>,
}

impl BlockData {
    /// Whether no data was returned
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A NAND device session over a bus
///
/// Owns the bus for its whole lifetime, so command/address/data phases of
/// different operations can never interleave. Use [`NandDevice::into_bus`]
/// to release the bus.
pub struct NandDevice<B: NandBus> {
    bus: B,
    profile: &'static ChipProfile,
    geometry: Geometry,
    ident: Option<Identification>,
    lines: ControlLines,
    phase: Phase,
    chunk_size: usize,
    attempts: usize,
    #[cfg(test)]
    transitions: Vec<(Phase, Phase)>,
}

impl<B: NandBus> NandDevice<B> {
    /// Create a session expecting the default chip profile
    pub fn new(bus: B) -> Self {
        Self::with_profile(bus, &MX30LF4G28AD)
    }

    /// Create a session expecting a specific chip profile
    pub fn with_profile(bus: B, profile: &'static ChipProfile) -> Self {
        Self {
            bus,
            profile,
            geometry: profile.geometry,
            ident: None,
            lines: ControlLines::default(),
            phase: Phase::Idle,
            chunk_size: DEFAULT_CHUNK_SIZE,
            attempts: MAX_ATTEMPTS,
            #[cfg(test)]
            transitions: Vec::new(),
        }
    }

    /// Set the number of bytes requested per data-phase transfer
    pub fn set_chunk_size(&mut self, chunk_size: usize) -> Result<()> {
        if chunk_size == 0 {
            return Err(Error::InvalidParameter);
        }
        self.chunk_size = chunk_size;
        Ok(())
    }

    /// Set the number of consensus attempts per page
    pub fn set_attempts(&mut self, attempts: usize) -> Result<()> {
        if attempts == 0 {
            return Err(Error::InvalidParameter);
        }
        self.attempts = attempts;
        Ok(())
    }

    /// Bytes per data-phase transfer
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Consensus attempts per page
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Geometry used for page I/O
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Expected chip profile
    pub fn profile(&self) -> &'static ChipProfile {
        self.profile
    }

    /// Identification record, if identification succeeded
    pub fn identification(&self) -> Option<&Identification> {
        self.ident.as_ref()
    }

    /// Whether page operations are enabled
    pub fn is_identified(&self) -> bool {
        self.ident.is_some()
    }

    /// Current transaction phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Borrow the underlying bus
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Mutably borrow the underlying bus
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// End the session and hand back the bus
    pub fn into_bus(self) -> B {
        self.bus
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            log::trace!("nand: {:?} -> {:?}", self.phase, phase);
            #[cfg(test)]
            self.transitions.push((self.phase, phase));
            self.phase = phase;
        }
    }

    fn ensure_identified(&self) -> Result<()> {
        if self.ident.is_none() {
            return Err(Error::NotIdentified);
        }
        Ok(())
    }

    /// Block until the ready/busy line reports ready
    ///
    /// There is deliberately no iteration bound. A bus error is returned
    /// as-is and never retried.
    pub fn wait_ready(&mut self) -> Result<()> {
        let mut polls: u64 = 0;
        loop {
            if self.bus.poll_ready()? {
                if polls > 0 {
                    log::trace!("nand: ready after {} busy polls", polls);
                }
                return Ok(());
            }
            polls += 1;
        }
    }

    /// Latch a command byte
    pub fn send_command(&mut self, command: u8) -> Result<()> {
        self.wait_ready()?;
        self.bus.assert_control(ControlLines::command(self.lines))?;
        self.bus.write_bytes(&[command])?;
        self.set_phase(Phase::CommandSent);
        Ok(())
    }

    /// Latch the confirm command that starts an array operation
    ///
    /// The chip goes busy straight from the address phase.
    fn send_confirm(&mut self, command: u8) -> Result<()> {
        self.wait_ready()?;
        self.bus.assert_control(ControlLines::command(self.lines))?;
        self.bus.write_bytes(&[command])?;
        self.set_phase(Phase::Busy);
        Ok(())
    }

    /// Latch `cycles` address bytes, least significant byte first
    pub fn send_address(&mut self, value: u64, cycles: u8) -> Result<()> {
        let bytes = value.to_le_bytes();
        let cycles = cycles as usize;
        if cycles == 0 || cycles > bytes.len() {
            return Err(Error::InvalidParameter);
        }
        self.wait_ready()?;
        self.bus.assert_control(ControlLines::address(self.lines))?;
        self.bus.write_bytes(&bytes[..cycles])?;
        self.set_phase(Phase::AddressSent);
        Ok(())
    }

    /// Clock out `count` data bytes in transfers of `chunk_size` bytes
    fn read_data(&mut self, count: usize) -> Result<Vec<u8>> {
        self.wait_ready()?;
        self.bus.assert_control(ControlLines::data(self.lines))?;
        self.set_phase(Phase::DataPhase);

        let mut data = Vec::with_capacity(count);
        while data.len() < count {
            let len = self.chunk_size.min(count - data.len());
            let chunk = self.bus.read_bytes(len)?;
            if chunk.is_empty() {
                return Err(Error::Transport);
            }
            if chunk.len() != len {
                return Err(Error::ShortRead {
                    expected: len,
                    got: chunk.len(),
                });
            }
            data.extend_from_slice(&chunk);
        }

        self.set_phase(Phase::Idle);
        Ok(data)
    }

    /// Issue a command, a single-byte address, and read back `count` bytes
    fn command_read(&mut self, command: u8, address: u8, count: usize) -> Result<Vec<u8>> {
        self.send_command(command)?;
        self.send_address(address as u64, 1)?;
        self.read_data(count)
    }

    /// Read the raw ID bytes
    pub fn read_id(&mut self) -> Result<[u8; ID_LEN]> {
        let data = self.command_read(opcodes::READ_ID, opcodes::READ_ID_ADDR_JEDEC, ID_LEN)?;
        let mut id = [0u8; ID_LEN];
        id.copy_from_slice(&data);
        Ok(id)
    }

    /// Identify the device
    ///
    /// Reads the ID bytes and compares them against the expected profile.
    /// On a mismatch, page operations are disabled until a later call
    /// succeeds. On success, the diagnostic ONFI, unique ID and feature
    /// samples are collected as well.
    pub fn identify(&mut self) -> Result<&Identification> {
        self.ident = None;

        let id_bytes = self.read_id()?;
        log::debug!("nand: READ ID {:02X?}", id_bytes);

        if !self.profile.matches(&id_bytes) {
            log::error!(
                "nand: ID mismatch, expected {:02X?} for {}, got {:02X?}",
                self.profile.id_bytes,
                self.profile.name,
                id_bytes
            );
            return Err(Error::NotIdentified);
        }

        let onfi = self.read_onfi()?;
        if let Some(onfi) = &onfi {
            self.compare_onfi_geometry(onfi);
        }
        let unique_id = self.read_unique_id()?;
        let features = self.read_features()?;

        log::info!(
            "nand: identified {} {} ({} pages of {}+{} bytes)",
            self.profile.vendor,
            self.profile.name,
            self.geometry.page_count(),
            self.geometry.page_size,
            self.geometry.oob_size
        );

        Ok(self.ident.insert(Identification {
            profile: self.profile,
            id_bytes,
            onfi,
            unique_id,
            features,
        }))
    }

    fn compare_onfi_geometry(&self, onfi: &OnfiParameters) {
        let hint = onfi.geometry_hint();
        if hint != self.geometry {
            log::warn!(
                "nand: ONFI geometry {} ({} addr cycles) differs from profile {} ({} addr cycles); using profile",
                hint,
                hint.addr_cycles,
                self.geometry,
                self.geometry.addr_cycles
            );
        }
    }

    /// Check the ONFI signature under READ ID
    pub fn probe_onfi(&mut self) -> Result<bool> {
        let sig = self.command_read(opcodes::READ_ID, opcodes::READ_ID_ADDR_ONFI, 4)?;
        Ok(sig == ONFI_SIGNATURE)
    }

    /// Read and parse the ONFI parameter page, if the device advertises one
    pub fn read_onfi(&mut self) -> Result<Option<OnfiParameters>> {
        if !self.probe_onfi()? {
            log::debug!("nand: no ONFI signature");
            return Ok(None);
        }

        let page = self.command_read(opcodes::READ_PARAMETER_PAGE, 0x00, PARAMETER_PAGE_LEN)?;
        match OnfiParameters::parse(&page) {
            Ok(params) => {
                if !params.crc_valid() {
                    log::warn!(
                        "nand: ONFI parameter page CRC mismatch (stored 0x{:04X}, computed 0x{:04X})",
                        params.crc,
                        params.computed_crc
                    );
                }
                Ok(Some(params))
            }
            Err(e) => {
                log::warn!("nand: ignoring ONFI parameter page: {}", e);
                Ok(None)
            }
        }
    }

    /// Sample the unique ID
    pub fn read_unique_id(&mut self) -> Result<UniqueId> {
        let data = self.command_read(opcodes::READ_UNIQUE_ID, 0x00, UNIQUE_ID_LEN)?;
        let mut raw = [0u8; UNIQUE_ID_LEN];
        raw.copy_from_slice(&data);
        let uid = UniqueId { raw };
        log::debug!("nand: unique ID fingerprint {:02X?}", uid.fingerprint());
        Ok(uid)
    }

    /// Read the four parameter bytes of a feature address
    pub fn read_feature(&mut self, address: u8) -> Result<[u8; 4]> {
        let data = self.command_read(opcodes::GET_FEATURES, address, 4)?;
        let mut params = [0u8; 4];
        params.copy_from_slice(&data);
        Ok(params)
    }

    /// Sample every known feature address
    pub fn read_features(&mut self) -> Result<Vec<FeatureValue>> {
        let mut out = Vec::with_capacity(FEATURE_ADDRESSES.len());
        for (address, name) in FEATURE_ADDRESSES {
            let params = self.read_feature(address)?;
            log::debug!("nand: feature {} [0x{:02X}] = {:02X?}", name, address, params);
            out.push(FeatureValue {
                address,
                name,
                params,
            });
        }
        Ok(out)
    }

    /// Reset the device and wait for it to become ready
    pub fn reset(&mut self) -> Result<()> {
        self.send_command(opcodes::RESET)?;
        self.wait_ready()?;
        self.set_phase(Phase::Idle);
        Ok(())
    }

    /// Read the status register
    pub fn read_status(&mut self) -> Result<Status> {
        self.send_command(opcodes::READ_STATUS)?;
        let data = self.read_data(1)?;
        Ok(Status::from_bits_retain(data[0]))
    }

    /// Read one raw page (data + spare area)
    pub fn read_page(&mut self, page: u32) -> Result<PageBuffer> {
        self.ensure_identified()?;
        self.geometry.check_page(page)?;

        let column_bits = 8 * opcodes::COLUMN_CYCLES as u32;
        let address = (page as u64) << column_bits;

        self.send_command(opcodes::READ)?;
        self.send_address(address, self.geometry.addr_cycles)?;
        self.send_confirm(opcodes::READ_START)?;

        let data = self.read_data(self.geometry.raw_page_size())?;
        Ok(PageBuffer { page, data })
    }

    /// Read one page, requiring two identical reads
    pub fn read_page_confirmed(&mut self, page: u32) -> Result<PageBuffer> {
        let attempts = self.attempts;
        consensus::read_page_confirmed(self, page, attempts)
    }

    /// Read every page of a block
    ///
    /// The bad-block marker is checked in the first two pages. A bad block
    /// yields empty data unless `raw_mode` is set, in which case its bytes
    /// are returned as read.
    pub fn read_sequential_block(
        &mut self,
        block: u32,
        strip_spare: bool,
        raw_mode: bool,
    ) -> Result<BlockData> {
        self.ensure_identified()?;
        self.geometry.check_block(block)?;

        let geometry = self.geometry;
        let first = geometry.first_page(block);
        let page_len = if strip_spare {
            geometry.page_size
        } else {
            geometry.raw_page_size()
        };

        let mut bad = false;
        let mut data = Vec::with_capacity(page_len * geometry.pages_per_block as usize);
        for i in 0..geometry.pages_per_block {
            let page = self.read_page(first + i)?;
            if i < 2 && page.has_bad_block_marker(&geometry) {
                bad = true;
            }
            data.extend_from_slice(&page.data[..page_len]);
        }

        if bad && !raw_mode {
            log::warn!("nand: skipping bad block {}", block);
            data = Vec::new();
        }

        Ok(BlockData { block, bad, data })
    }
}
