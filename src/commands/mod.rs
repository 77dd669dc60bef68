//! CLI command implementations
//!
//! ## Live commands
//!
//! `probe`, `dump` and `dump-blocks` drive an identified `NandDevice` over
//! whichever bus was selected on the command line.
//!
//! ## Offline commands
//!
//! `merge`, `extract`, `partitions` and `decode-page` only touch files and
//! never open a bus.

pub mod blocks;
pub mod decode_page;
pub mod dump;
pub mod extract;
mod list;
pub mod merge;
pub mod partitions;
pub mod probe;
pub mod progress;

pub use list::{list_buses, list_chips, list_devices};

use crate::cli::TableArgs;
use rnand_core::decode::{parse_hex_key, DecodeError};
use rnand_core::partition::PartitionTable;

/// Build the effective partition table from the command-line options
///
/// Starts from the TOML table (or the built-in one) and applies the
/// geometry and key overrides.
pub fn load_table(args: &TableArgs) -> Result<PartitionTable, DecodeError> {
    let mut table = match &args.table {
        Some(path) => {
            let table = PartitionTable::from_toml_file(path)?;
            log::info!(
                "Loaded partition table {:?} with {} partitions",
                path,
                table.len()
            );
            table
        }
        None => PartitionTable::builtin(),
    };

    if let Some(geometry) = args.geometry {
        table.geometry = geometry;
    }
    if let Some(key) = &args.key {
        table.decode.key = parse_hex_key(key)?;
    }

    table.validate()?;
    Ok(table)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    use rnand_core::chip::ChipProfile;
    use rnand_core::geometry::Geometry;

    static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

    pub(crate) fn unique_root(prefix: &str) -> PathBuf {
        let pid = std::process::id();
        let t = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("rnand-{}-{}-{}-{}", prefix, pid, t, id))
    }

    pub(crate) static SMALL_PROFILE: ChipProfile = ChipProfile {
        name: "SMALL",
        vendor: "Emulated",
        id_bytes: &[0xC2, 0x11, 0x22, 0x33],
        geometry: Geometry {
            page_size: 64,
            oob_size: 16,
            pages_per_block: 4,
            block_count: 8,
            addr_cycles: 4,
            bits_per_cell: 1,
        },
    };

    /// Raw image whose page `n` holds `n + i` at data byte `i`
    ///
    /// Block 2 carries a bad-block marker in its first page.
    pub(crate) fn small_image() -> Vec<u8> {
        let g = SMALL_PROFILE.geometry;
        let mut image = Vec::new();
        for page in 0..g.page_count() {
            image.extend((0..g.page_size).map(|i| (page as u8).wrapping_add(i as u8)));
            let mut spare = vec![0xFF; g.oob_size];
            if page == g.first_page(2) {
                spare[g.bad_block_marker_offset() - g.page_size] = 0x00;
            }
            image.extend(spare);
        }
        image
    }

    /// Identified session on an emulator holding [`small_image`]
    #[cfg(feature = "dummy")]
    pub(crate) fn small_device(
        noise: f64,
    ) -> rnand_core::protocol::NandDevice<rnand_dummy::DummyNand> {
        use rnand_dummy::{DummyConfig, DummyNand};

        let mut config = DummyConfig::for_profile(&SMALL_PROFILE);
        config.seed = 7;
        let bus = DummyNand::with_data(config, &small_image());
        let mut device = rnand_core::protocol::NandDevice::with_profile(bus, &SMALL_PROFILE);
        device.identify().unwrap();
        device.bus_mut().set_noise(noise);
        device
    }
}
