//! rnand-dummy - In-memory raw NAND emulator
//!
//! `DummyNand` implements the `NandBus` trait on top of a raw page array
//! (data + spare area per page). It decodes the command/address/data
//! sequence the same way a real part does, so the protocol engine,
//! consensus reads and dump workflows can run without hardware.
//!
//! Transport faults can be injected: random bit flips on read data, a
//! number of busy polls after every array operation, and a disconnect after
//! a given number of bus operations.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rnand_core::bus::{ControlLines, NandBus};
use rnand_core::chip::{ChipProfile, MX30LF4G28AD};
use rnand_core::error::{Error, Result};
use rnand_core::geometry::Geometry;
use rnand_core::ident::{FEATURE_ADDRESSES, UNIQUE_ID_LEN};
use rnand_core::onfi::build_parameter_page;
use rnand_core::opcodes;
use rnand_core::protocol::Status;

/// Configuration for the emulated part
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Geometry of the emulated array
    pub geometry: Geometry,
    /// Bytes returned by READ ID at address 0x00 (padded with 0x00)
    pub id_bytes: Vec<u8>,
    /// Answer the ONFI signature probe and serve a parameter page
    pub onfi: bool,
    /// Probability that a data byte read back has one bit flipped
    pub noise: f64,
    /// Seed for the noise generator
    pub seed: u64,
    /// Busy polls reported after each array operation
    pub busy_polls: u32,
    /// Fail every bus operation after this many have succeeded
    pub disconnect_after: Option<usize>,
}

impl DummyConfig {
    /// Configuration emulating a chip profile
    pub fn for_profile(profile: &ChipProfile) -> Self {
        Self {
            geometry: profile.geometry,
            id_bytes: profile.id_bytes.to_vec(),
            onfi: true,
            noise: 0.0,
            seed: 0,
            busy_polls: 1,
            disconnect_after: None,
        }
    }
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self::for_profile(&MX30LF4G28AD)
    }
}

/// What the emulated part does with the next address bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    None,
    ReadId,
    ParameterPage,
    UniqueId,
    Feature,
    Read,
}

/// In-memory raw NAND
pub struct DummyNand {
    config: DummyConfig,
    array: Vec<u8>,
    lines: ControlLines,
    pending: Pending,
    address: Vec<u8>,
    output: Vec<u8>,
    cursor: usize,
    busy: u32,
    rng: SmallRng,
    ops: usize,
    flipped: u64,
    unique_id: [u8; 16],
    features: HashMap<u8, [u8; 4]>,
}

impl DummyNand {
    /// Create an erased part (every byte 0xFF)
    pub fn new(config: DummyConfig) -> Self {
        Self::with_data(config, &[])
    }

    /// Create a part holding a raw dump image
    ///
    /// Bytes past the end of a short image read as 0xFF; extra bytes are
    /// ignored.
    pub fn with_data(config: DummyConfig, image: &[u8]) -> Self {
        let size = usize::try_from(config.geometry.raw_total_size()).unwrap_or(usize::MAX);
        let array = image[..image.len().min(size)].to_vec();
        if image.len() > size {
            log::warn!(
                "dummy: image is {} bytes, only the first {} are used",
                image.len(),
                size
            );
        }

        let mut unique_id = [0u8; 16];
        for (i, b) in unique_id.iter_mut().enumerate() {
            *b = (config.seed as u8).wrapping_add(i as u8).wrapping_mul(0x3D);
        }

        let features = FEATURE_ADDRESSES
            .iter()
            .map(|&(addr, _)| (addr, [addr & 0x0F, 0x00, 0x00, 0x00]))
            .collect();

        Self {
            rng: SmallRng::seed_from_u64(config.seed),
            config,
            array,
            lines: ControlLines::empty(),
            pending: Pending::None,
            address: Vec::new(),
            output: Vec::new(),
            cursor: 0,
            busy: 0,
            ops: 0,
            flipped: 0,
            unique_id,
            features,
        }
    }

    /// Load a raw dump image from a file
    pub fn from_file(config: DummyConfig, path: impl AsRef<Path>) -> std::io::Result<Self> {
        let image = fs::read(path)?;
        Ok(Self::with_data(config, &image))
    }

    /// Stored array contents; everything past the end reads as erased
    pub fn data(&self) -> &[u8] {
        &self.array
    }

    /// Emulator configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Change the noise probability
    pub fn set_noise(&mut self, noise: f64) {
        self.config.noise = noise;
    }

    /// Fail every bus operation after `ops` more have succeeded
    pub fn disconnect_after(&mut self, ops: usize) {
        self.config.disconnect_after = Some(self.ops + ops);
    }

    /// Bus operations performed so far
    pub fn operations(&self) -> usize {
        self.ops
    }

    /// Bytes corrupted by injected noise so far
    pub fn flipped_bytes(&self) -> u64 {
        self.flipped
    }

    /// Count a bus operation and fail once the disconnect point is reached
    fn tick(&mut self) -> Result<()> {
        if let Some(limit) = self.config.disconnect_after {
            if self.ops >= limit {
                log::debug!("dummy: disconnected after {} operations", limit);
                return Err(Error::Transport);
            }
        }
        self.ops += 1;
        Ok(())
    }

    fn set_output(&mut self, data: Vec<u8>) {
        self.output = data;
        self.cursor = 0;
    }

    fn start_busy(&mut self) {
        self.busy = self.config.busy_polls;
    }

    fn handle_command(&mut self, command: u8) {
        log::trace!("dummy: command 0x{:02X}", command);
        if command != opcodes::READ_START {
            self.address.clear();
        }
        match command {
            opcodes::READ => self.pending = Pending::Read,
            opcodes::READ_START => self.start_page_read(),
            opcodes::READ_ID => self.pending = Pending::ReadId,
            opcodes::READ_PARAMETER_PAGE => self.pending = Pending::ParameterPage,
            opcodes::READ_UNIQUE_ID => self.pending = Pending::UniqueId,
            opcodes::GET_FEATURES => self.pending = Pending::Feature,
            opcodes::READ_STATUS => {
                self.pending = Pending::None;
                let status = self.status();
                self.set_output(vec![status.bits()]);
            }
            opcodes::RESET => {
                self.pending = Pending::None;
                self.set_output(Vec::new());
                self.start_busy();
            }
            other => {
                log::warn!("dummy: unsupported command 0x{:02X}", other);
                self.pending = Pending::None;
            }
        }
    }

    fn status(&self) -> Status {
        let mut status = Status::empty();
        if self.busy == 0 {
            status |= Status::READY | Status::ARRAY_READY;
        }
        if !self.lines.contains(ControlLines::WRITE_PROTECT) {
            status |= Status::NOT_PROTECTED;
        }
        status
    }

    fn handle_address(&mut self, byte: u8) {
        self.address.push(byte);
        let addr = self.address[0];
        match self.pending {
            Pending::ReadId => {
                let mut out = match addr {
                    opcodes::READ_ID_ADDR_ONFI if self.config.onfi => b"ONFI".to_vec(),
                    opcodes::READ_ID_ADDR_ONFI => vec![0x00; 4],
                    _ => self.config.id_bytes.clone(),
                };
                out.resize(8, 0x00);
                self.set_output(out);
                self.pending = Pending::None;
            }
            Pending::ParameterPage => {
                let out = if self.config.onfi {
                    build_parameter_page(&self.config.geometry, "EMULATED", "DUMMY-NAND", 0xC2)
                        .to_vec()
                } else {
                    Vec::new()
                };
                self.set_output(out);
                self.start_busy();
                self.pending = Pending::None;
            }
            Pending::UniqueId => {
                let mut out = Vec::with_capacity(UNIQUE_ID_LEN);
                out.extend_from_slice(&self.unique_id);
                out.extend(self.unique_id.iter().map(|b| !b));
                self.set_output(out);
                self.start_busy();
                self.pending = Pending::None;
            }
            Pending::Feature => {
                let params = self.features.get(&addr).copied().unwrap_or([0; 4]);
                self.set_output(params.to_vec());
                self.start_busy();
                self.pending = Pending::None;
            }
            Pending::Read | Pending::None => {}
        }
    }

    /// Load the page register from the latched row/column address
    fn start_page_read(&mut self) {
        let geometry = self.config.geometry;
        let cycles = geometry.addr_cycles as usize;
        if self.pending != Pending::Read || self.address.len() != cycles {
            log::warn!(
                "dummy: READ START with {} address bytes, expected {}",
                self.address.len(),
                cycles
            );
            self.pending = Pending::None;
            return;
        }

        let mut value = 0u64;
        for (i, b) in self.address.iter().enumerate() {
            value |= (*b as u64) << (8 * i);
        }
        let column_bits = 8 * opcodes::COLUMN_CYCLES as u32;
        let column = (value & ((1u64 << column_bits) - 1)) as usize;
        let page = (value >> column_bits) as u32;

        self.pending = Pending::None;
        self.start_busy();
        if page >= geometry.page_count() {
            log::warn!("dummy: read of page {} beyond the array", page);
            self.set_output(Vec::new());
            return;
        }

        let raw = geometry.raw_page_size();
        let start = geometry.page_offset(page) as usize + column.min(raw);
        let end = geometry.page_offset(page) as usize + raw;
        let mut data = vec![0xFF; end - start];
        if start < self.array.len() {
            let stored = &self.array[start..end.min(self.array.len())];
            data[..stored.len()].copy_from_slice(stored);
        }
        log::trace!("dummy: page {} column {} loaded", page, column);
        self.set_output(data);
    }

    fn next_output_byte(&mut self) -> u8 {
        let byte = self.output.get(self.cursor).copied().unwrap_or(0xFF);
        self.cursor += 1;
        if self.config.noise > 0.0 && self.rng.gen_bool(self.config.noise.min(1.0)) {
            self.flipped += 1;
            byte ^ (1 << self.rng.gen_range(0..8))
        } else {
            byte
        }
    }
}

impl NandBus for DummyNand {
    fn assert_control(&mut self, lines: ControlLines) -> Result<()> {
        self.tick()?;
        self.lines = lines;
        Ok(())
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.tick()?;
        if !self.lines.contains(ControlLines::CHIP_ENABLE) {
            return Ok(());
        }
        let latch = self.lines & (ControlLines::COMMAND_LATCH | ControlLines::ADDRESS_LATCH);
        for &b in data {
            if latch == ControlLines::COMMAND_LATCH {
                self.handle_command(b);
            } else if latch == ControlLines::ADDRESS_LATCH {
                self.handle_address(b);
            } else {
                log::warn!("dummy: ignoring data write 0x{:02X} (read-only part)", b);
            }
        }
        Ok(())
    }

    fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        self.tick()?;
        if !self.lines.contains(ControlLines::CHIP_ENABLE) {
            return Ok(vec![0xFF; count]);
        }
        Ok((0..count).map(|_| self.next_output_byte()).collect())
    }

    fn poll_ready(&mut self) -> Result<bool> {
        self.tick()?;
        if self.busy > 0 {
            self.busy -= 1;
            return Ok(false);
        }
        Ok(true)
    }

    fn name(&self) -> &'static str {
        "dummy"
    }
}

/// Parse programmer options
///
/// Format: "image=<path>,noise=<p>,seed=<n>,busy=<n>,disconnect=<n>,onfi=<yes|no>"
pub fn parse_options(options: &[(&str, &str)]) -> std::result::Result<DummyNand, String> {
    let mut config = DummyConfig::default();
    let mut image: Option<String> = None;

    for (key, value) in options {
        match *key {
            "image" => image = Some(value.to_string()),
            "noise" => {
                let noise: f64 = value
                    .parse()
                    .map_err(|_| format!("Invalid noise '{}'", value))?;
                if !(0.0..=1.0).contains(&noise) {
                    return Err(format!("Noise {} must be between 0 and 1", noise));
                }
                config.noise = noise;
            }
            "seed" => {
                config.seed = value
                    .parse()
                    .map_err(|_| format!("Invalid seed '{}'", value))?;
            }
            "busy" => {
                config.busy_polls = value
                    .parse()
                    .map_err(|_| format!("Invalid busy poll count '{}'", value))?;
            }
            "disconnect" => {
                config.disconnect_after = Some(
                    value
                        .parse()
                        .map_err(|_| format!("Invalid disconnect count '{}'", value))?,
                );
            }
            "onfi" => {
                config.onfi = match value.to_ascii_lowercase().as_str() {
                    "yes" | "true" | "1" => true,
                    "no" | "false" | "0" => false,
                    _ => return Err(format!("Invalid onfi flag '{}'", value)),
                };
            }
            _ => {
                log::warn!("Unknown dummy option: {}={}", key, value);
            }
        }
    }

    match image {
        Some(path) => {
            log::info!("dummy: loading image {}", path);
            DummyNand::from_file(config, &path).map_err(|e| format!("{}: {}", path, e))
        }
        None => Ok(DummyNand::new(config)),
    }
}
