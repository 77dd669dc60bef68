//! FTDI MCU-mode NAND bus
//!
//! This module provides the `FtdiNand` struct that drives a raw NAND chip
//! through the MCU host bus emulation of an FT2232H and implements the
//! `NandBus` trait.

use std::io::{Read, Write};
use std::time::Duration;

use ftdi::{find_by_vid_pid, BitMode, Device, Interface};
use rnand_core::bus::{ControlLines, NandBus};
use rnand_core::error::Result as CoreResult;

use crate::error::{FtdiError, Result};
use crate::protocol::*;

/// Empty reads tolerated before a receive is declared failed
const RECV_ATTEMPTS: usize = 1000;

/// Configuration for opening an FTDI device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtdiNandConfig {
    /// USB vendor ID
    pub vid: u16,
    /// USB product ID
    pub pid: u16,
    /// Channel wired to the NAND
    pub interface: FtdiInterface,
    /// Bus clock
    pub clock: ClockMode,
    /// USB latency timer in milliseconds
    pub latency: u8,
}

impl Default for FtdiNandConfig {
    fn default() -> Self {
        FtdiNandConfig {
            vid: FTDI_VID,
            pid: FTDI_FT2232H_PID,
            interface: FtdiInterface::default(),
            clock: ClockMode::default(),
            latency: DEFAULT_LATENCY,
        }
    }
}

impl FtdiNandConfig {
    /// Set the latency timer
    pub fn latency(mut self, latency: u8) -> Result<Self> {
        if latency == 0 {
            return Err(FtdiError::InvalidParameter(
                "latency must be at least 1 ms".to_string(),
            ));
        }
        self.latency = latency;
        Ok(self)
    }
}

/// FTDI MCU-mode NAND bus
pub struct FtdiNand {
    /// libftdi device context
    device: Device,
    /// Bus clock, determines read doubling
    clock: ClockMode,
    /// Address-high byte for the next transfer
    control: u8,
}

impl FtdiNand {
    /// Open an FTDI device with the given configuration
    pub fn open(config: &FtdiNandConfig) -> Result<Self> {
        log::info!(
            "Opening FTDI {:04X}:{:04X} channel {}",
            config.vid,
            config.pid,
            config.interface.letter()
        );

        let interface = match config.interface {
            FtdiInterface::A => Interface::A,
            FtdiInterface::B => Interface::B,
        };

        let mut device = find_by_vid_pid(config.vid, config.pid)
            .interface(interface)
            .open()
            .map_err(|e| FtdiError::OpenFailed {
                vid: config.vid,
                pid: config.pid,
                interface: config.interface.letter(),
                reason: e.to_string(),
            })?;

        device
            .set_bitmode(0x00, BitMode::Mcu)
            .map_err(|e| config_failed("MCU bit mode", e))?;

        let mut nand = FtdiNand {
            device,
            clock: config.clock,
            control: control_byte(ControlLines::default()),
        };

        log::debug!("Selecting {} MHz bus clock", config.clock.mhz());
        nand.send(&[config.clock.command()])?;

        nand.device
            .set_latency_timer(config.latency)
            .map_err(|e| config_failed("latency timer", e))?;
        nand.device
            .usb_purge_buffers()
            .map_err(|e| config_failed("buffer purge", e))?;

        nand.send(&INIT_BITS_HIGH)?;

        log::info!("FTDI configured for MCU bus at {} MHz", config.clock.mhz());
        Ok(nand)
    }

    /// Open the first FT2232H with default settings
    pub fn open_default() -> Result<Self> {
        Self::open(&FtdiNandConfig::default())
    }

    /// Send data to the FTDI device
    fn send(&mut self, data: &[u8]) -> Result<()> {
        self.device
            .write_all(data)
            .map_err(|e| FtdiError::WriteFailed(e.to_string()))?;
        log::trace!("Sent {} bytes", data.len());
        Ok(())
    }

    /// Receive exactly `len` bytes
    ///
    /// Gives up after `RECV_ATTEMPTS` consecutive empty reads.
    fn recv(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        let mut total = 0;
        let mut empty = 0;

        while total < len {
            match self.device.read(&mut buf[total..]) {
                Ok(0) => {
                    empty += 1;
                    if empty >= RECV_ATTEMPTS {
                        return Err(FtdiError::Timeout {
                            got: total,
                            expected: len,
                        });
                    }
                    std::thread::sleep(Duration::from_micros(100));
                }
                Ok(n) => {
                    total += n;
                    empty = 0;
                }
                Err(e) => {
                    return Err(FtdiError::ReadFailed(e.to_string()));
                }
            }
        }

        log::trace!("Received {} bytes", total);
        Ok(buf)
    }

    /// Read `count` bus cycles, undoing the slow-clock duplication
    fn bus_read(&mut self, count: usize) -> Result<Vec<u8>> {
        let cmds = encode_read(self.control, count);
        self.send(&cmds)?;
        let raw = self.recv(count * self.clock.read_multiplier())?;
        Ok(match self.clock {
            ClockMode::Slow => undouble(&raw),
            ClockMode::Fast => raw,
        })
    }

    /// Sample the high GPIO byte
    fn read_bits_high(&mut self) -> Result<u8> {
        self.send(&[GET_BITS_HIGH, SEND_IMMEDIATE])?;
        let data = self.recv(1)?;
        Ok(data[0])
    }

    /// Deselect the chip and return the high GPIO byte to its idle state
    fn release_bus(&mut self) -> Result<()> {
        self.send(&INIT_BITS_HIGH)?;
        self.device
            .set_bitmode(0x00, BitMode::Reset)
            .map_err(|e| config_failed("bit mode reset", e))
    }

    /// List FTDI devices visible over USB
    pub fn list_devices() -> Result<Vec<FtdiDeviceInfo>> {
        let mut devices = Vec::new();

        for dev in nusb::list_devices()? {
            if dev.vendor_id() != FTDI_VID {
                continue;
            }
            devices.push(FtdiDeviceInfo {
                bus: dev.bus_number(),
                address: dev.device_address(),
                vendor_id: dev.vendor_id(),
                product_id: dev.product_id(),
                product: dev.product_string().map(|s| s.to_string()),
                serial: dev.serial_number().map(|s| s.to_string()),
            });
        }

        Ok(devices)
    }
}

impl Drop for FtdiNand {
    fn drop(&mut self) {
        if let Err(e) = self.release_bus() {
            log::warn!("Failed to release bus on close: {}", e);
        }
    }
}

impl NandBus for FtdiNand {
    fn assert_control(&mut self, lines: ControlLines) -> CoreResult<()> {
        self.control = control_byte(lines);
        Ok(())
    }

    fn write_bytes(&mut self, data: &[u8]) -> CoreResult<()> {
        let cmds = encode_write(self.control, data);
        Ok(self.send(&cmds)?)
    }

    fn read_bytes(&mut self, count: usize) -> CoreResult<Vec<u8>> {
        Ok(self.bus_read(count)?)
    }

    fn poll_ready(&mut self) -> CoreResult<bool> {
        let bits = self.read_bits_high()?;
        Ok(is_ready(bits))
    }

    fn name(&self) -> &'static str {
        "ftdi"
    }
}

fn config_failed(step: &'static str, e: impl std::fmt::Display) -> FtdiError {
    FtdiError::ConfigFailed {
        step,
        reason: e.to_string(),
    }
}

/// Information about a connected FTDI device
#[derive(Debug, Clone)]
pub struct FtdiDeviceInfo {
    /// USB bus number
    pub bus: u8,
    /// USB device address
    pub address: u8,
    /// Vendor ID
    pub vendor_id: u16,
    /// Product ID
    pub product_id: u16,
    /// Product string (if available)
    pub product: Option<String>,
    /// Serial number (if available)
    pub serial: Option<String>,
}

impl std::fmt::Display for FtdiDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at bus {} address {} ({:04X}:{:04X})",
            self.product.as_deref().unwrap_or("FTDI device"),
            self.bus,
            self.address,
            self.vendor_id,
            self.product_id
        )?;
        if let Some(serial) = &self.serial {
            write!(f, " serial {}", serial)?;
        }
        Ok(())
    }
}

fn parse_u16(key: &str, value: &str) -> Result<u16> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => u16::from_str_radix(value, 16),
    };
    parsed.map_err(|_| FtdiError::InvalidParameter(format!("Invalid {} '{}'", key, value)))
}

/// Parse programmer options
///
/// Format: "vid=<hex>,pid=<hex>,interface=<A|B>,clock=<slow|fast>,latency=<ms>"
pub fn parse_options(options: &[(&str, &str)]) -> Result<FtdiNandConfig> {
    let mut config = FtdiNandConfig::default();

    for (key, value) in options {
        match *key {
            "vid" => config.vid = parse_u16(key, value)?,
            "pid" => config.pid = parse_u16(key, value)?,
            "interface" | "port" | "channel" => {
                let mut chars = value.chars();
                config.interface = match (chars.next(), chars.next()) {
                    (Some(c), None) => FtdiInterface::from_char(c),
                    _ => None,
                }
                .ok_or_else(|| {
                    FtdiError::InvalidParameter(format!(
                        "Invalid interface '{}': must be A or B",
                        value
                    ))
                })?;
            }
            "clock" => {
                config.clock = ClockMode::parse(value).ok_or_else(|| {
                    FtdiError::InvalidParameter(format!(
                        "Invalid clock '{}': must be slow or fast",
                        value
                    ))
                })?;
            }
            "latency" => {
                let latency: u8 = value.parse().map_err(|_| {
                    FtdiError::InvalidParameter(format!("Invalid latency '{}'", value))
                })?;
                config = config.latency(latency)?;
            }
            _ => {
                log::warn!("Unknown FTDI option: {}={}", key, value);
            }
        }
    }

    Ok(config)
}
