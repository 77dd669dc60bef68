//! Bus registration and session setup
//!
//! This module provides a centralized registry for all bus backends, with
//! support for feature-gated inclusion and dynamic help text generation.

use std::collections::HashMap;

use rnand_core::bus::NandBus;
use rnand_core::chip::ChipProfile;
use rnand_core::consensus::MAX_ATTEMPTS;
use rnand_core::protocol::{NandDevice, DEFAULT_CHUNK_SIZE};

/// Errors raised while selecting or opening a bus
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// The bus name is unknown or not compiled in
    #[error("unknown bus: {name}\n\n{help}\nUse 'rnand list-buses' for more details")]
    Unknown {
        /// Name given on the command line
        name: String,
        /// Help text listing the available buses
        help: String,
    },
    /// A bus option could not be parsed
    #[error("invalid {bus} parameters: {reason}")]
    InvalidParameter {
        /// Bus name
        bus: String,
        /// What was wrong
        reason: String,
    },
    /// The backend failed to open
    #[error("failed to open {bus}: {reason}")]
    Open {
        /// Bus name
        bus: &'static str,
        /// Backend error with hints
        reason: String,
    },
    /// The session could not be configured or identified
    #[error(transparent)]
    Device(#[from] rnand_core::Error),
}

/// Information about a bus backend
pub struct BusInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Get information about all available buses (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_buses() -> Vec<BusInfo> {
    let mut buses = Vec::new();

    #[cfg(feature = "dummy")]
    buses.push(BusInfo {
        name: "dummy",
        aliases: &["emulator"],
        description: "In-memory NAND emulator (image=<file>,noise=<p>,seed=<n>,disconnect=<ops>)",
    });

    #[cfg(feature = "ftdi")]
    buses.push(BusInfo {
        name: "ftdi",
        aliases: &["ft2232h", "ft2232_nand"],
        description: "FT2232H in MCU host bus mode (interface=<A|B>,clock=<slow|fast>,latency=<ms>)",
    });

    buses
}

/// Generate help text listing all available buses
pub fn bus_help() -> String {
    let buses = available_buses();

    if buses.is_empty() {
        return "No buses available (recompile with bus features enabled)".to_string();
    }

    let mut help = String::from("Available buses:\n");
    for b in &buses {
        help.push_str(&format!("  {:8} - {}\n", b.name, b.description));
        if !b.aliases.is_empty() {
            help.push_str(&format!("  {:8}   aliases: {}\n", "", b.aliases.join(", ")));
        }
    }
    help.push_str("\nEvery bus also accepts chunk=<bytes> and attempts=<n>\n");

    help
}

/// Generate a short list of bus names for CLI help
pub fn bus_names_short() -> String {
    let buses = available_buses();
    let names: Vec<&str> = buses.iter().map(|b| b.name).collect();
    names.join(", ")
}

/// Resolve a bus name or alias to its primary name
pub fn find_bus(name: &str) -> Option<&'static str> {
    available_buses()
        .into_iter()
        .find(|b| b.name == name || b.aliases.contains(&name))
        .map(|b| b.name)
}

/// Parsed bus specification
#[derive(Debug, Clone)]
pub struct BusParams {
    /// Bus name as given
    pub name: String,
    /// Options in `key=value` form
    pub params: HashMap<String, String>,
}

impl BusParams {
    /// Options as borrowed pairs, for the backend option parsers
    pub fn options(&self) -> Vec<(&str, &str)> {
        self.params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

/// Parse a bus specification into name and options
///
/// Format: "name" or "name:option1=value1,option2=value2"
pub fn parse_bus_params(s: &str) -> Result<BusParams, BusError> {
    let (name, opts_str) = s.split_once(':').unwrap_or((s, ""));

    let mut params = HashMap::new();
    if !opts_str.is_empty() {
        for opt in opts_str.split(',') {
            if let Some((key, value)) = opt.split_once('=') {
                params.insert(key.trim().to_string(), value.trim().to_string());
            } else {
                return Err(BusError::InvalidParameter {
                    bus: name.to_string(),
                    reason: format!("'{}' (expected key=value)", opt),
                });
            }
        }
    }

    Ok(BusParams {
        name: name.to_string(),
        params,
    })
}

/// Session settings shared by every bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Bytes per data-phase transfer
    pub chunk: usize,
    /// Consensus attempts per page
    pub attempts: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            chunk: DEFAULT_CHUNK_SIZE,
            attempts: MAX_ATTEMPTS,
        }
    }
}

/// Remove the session options from `params`, leaving the backend options
fn take_session_options(params: &mut BusParams) -> Result<SessionOptions, BusError> {
    let mut opts = SessionOptions::default();

    if let Some(v) = params.params.remove("chunk") {
        opts.chunk = parse_count(&params.name, "chunk", &v)?;
    }
    if let Some(v) = params.params.remove("attempts") {
        opts.attempts = parse_count(&params.name, "attempts", &v)?;
    }

    Ok(opts)
}

fn parse_count(bus: &str, key: &str, value: &str) -> Result<usize, BusError> {
    match value.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(BusError::InvalidParameter {
            bus: bus.to_string(),
            reason: format!("{} must be a positive integer, got '{}'", key, value),
        }),
    }
}

/// Open the bus backend named in `params`
#[allow(unused_variables)]
pub fn open_bus(params: &BusParams) -> Result<Box<dyn NandBus>, BusError> {
    let canonical = find_bus(&params.name).ok_or_else(|| BusError::Unknown {
        name: params.name.clone(),
        help: bus_help(),
    })?;
    let options = params.options();

    match canonical {
        #[cfg(feature = "dummy")]
        "dummy" => {
            log::info!("Opening NAND emulator...");
            let nand = rnand_dummy::parse_options(&options).map_err(|reason| {
                BusError::InvalidParameter {
                    bus: "dummy".into(),
                    reason,
                }
            })?;
            Ok(Box::new(nand))
        }

        #[cfg(feature = "ftdi")]
        "ftdi" => {
            log::info!("Opening FTDI bus...");
            let config =
                rnand_ftdi::parse_options(&options).map_err(|e| BusError::InvalidParameter {
                    bus: "ftdi".into(),
                    reason: e.to_string(),
                })?;

            let bus = rnand_ftdi::FtdiNand::open(&config).map_err(|e| BusError::Open {
                bus: "ftdi",
                reason: format!(
                    "{}\n\
                     Make sure the device is connected and you have permissions.\n\
                     You may need to unbind the kernel ftdi_sio driver:\n\
                     echo -n '<bus>-<port>' | sudo tee /sys/bus/usb/drivers/ftdi_sio/unbind",
                    e
                ),
            })?;
            Ok(Box::new(bus))
        }

        _ => Err(BusError::Unknown {
            name: params.name.clone(),
            help: bus_help(),
        }),
    }
}

/// Open a bus, configure a session on it and identify the device
///
/// The bus string can be just the name (e.g., "ftdi") or include
/// parameters (e.g., "ftdi:interface=B,chunk=64").
pub fn open_device(
    spec: &str,
    profile: &'static ChipProfile,
) -> Result<NandDevice<Box<dyn NandBus>>, BusError> {
    let mut params = parse_bus_params(spec)?;
    let session = take_session_options(&mut params)?;
    let bus = open_bus(&params)?;

    let mut device = NandDevice::with_profile(bus, profile);
    device.set_chunk_size(session.chunk)?;
    device.set_attempts(session.attempts)?;
    log::debug!(
        "Session on {}: chunk {} bytes, {} consensus attempts",
        device.bus().name(),
        session.chunk,
        session.attempts
    );

    device.identify()?;
    Ok(device)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bus_params() {
        let p = parse_bus_params("ftdi:interface=B, clock=fast").unwrap();
        assert_eq!(p.name, "ftdi");
        assert_eq!(p.params.get("interface").map(String::as_str), Some("B"));
        assert_eq!(p.params.get("clock").map(String::as_str), Some("fast"));

        let p = parse_bus_params("dummy").unwrap();
        assert_eq!(p.name, "dummy");
        assert!(p.params.is_empty());
    }

    #[test]
    fn test_parse_bus_params_rejects_bare_option() {
        let err = parse_bus_params("ftdi:interface").unwrap_err();
        assert!(matches!(err, BusError::InvalidParameter { .. }));
    }

    #[test]
    fn test_session_options() {
        let mut p = parse_bus_params("dummy:chunk=64,attempts=3,seed=7").unwrap();
        let opts = take_session_options(&mut p).unwrap();
        assert_eq!(opts.chunk, 64);
        assert_eq!(opts.attempts, 3);
        assert_eq!(p.params.len(), 1);
        assert!(p.params.contains_key("seed"));

        let mut p = parse_bus_params("dummy").unwrap();
        assert_eq!(take_session_options(&mut p).unwrap(), SessionOptions::default());

        let mut p = parse_bus_params("dummy:attempts=0").unwrap();
        assert!(take_session_options(&mut p).is_err());
    }

    #[test]
    fn test_unknown_bus() {
        let err = open_device("nosuchbus", &rnand_core::chip::MX30LF4G28AD).err().unwrap();
        assert!(matches!(err, BusError::Unknown { .. }));
        assert!(err.to_string().contains("nosuchbus"));
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_open_dummy_device() {
        assert_eq!(find_bus("emulator"), Some("dummy"));

        let mut device =
            open_device("dummy:chunk=512,attempts=2", &rnand_core::chip::MX30LF4G28AD).unwrap();
        assert!(device.is_identified());
        assert_eq!(device.chunk_size(), 512);
        assert_eq!(device.attempts(), 2);

        let page = device.read_page_confirmed(0).unwrap();
        assert_eq!(page.data.len(), device.geometry().raw_page_size());
        assert!(page.data.iter().all(|&b| b == 0xFF));
    }
}
