//! rnand - raw NAND dumper and dump decoder
//!
//! Reads a parallel NAND flash over a slow host bus (an FT2232H in MCU host
//! bus emulation mode, or an in-memory emulator) and decodes the captured
//! dump offline.
//!
//! # Architecture
//!
//! - **Live commands** (`probe`, `dump`, `dump-blocks`) open a bus, wrap it
//!   in an identified `NandDevice` session and read pages through the
//!   consensus layer, which only accepts a page after two identical reads.
//! - **Offline commands** (`merge`, `extract`, `partitions`, `decode-page`)
//!   work on dump files only and never touch hardware.

mod bus;
mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use rnand_core::chip::{find_profile, ChipProfile, PROFILES};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    match cli.command {
        Commands::Probe { bus } => {
            let mut device = bus::open_device(&bus, chip_profile(&cli.chip)?)?;
            commands::probe::run_probe(&mut device)
        }
        Commands::Dump {
            bus,
            output,
            pages_dir,
            start,
            end,
            bad_log,
        } => {
            let mut device = bus::open_device(&bus, chip_profile(&cli.chip)?)?;
            let range = commands::dump::page_range(device.geometry(), start, end)?;

            if let Some(dir) = pages_dir {
                commands::dump::run_dump_pages(&mut device, &dir, range)?;
            } else if let Some(output) = output {
                let bad_log = bad_log.unwrap_or_else(|| commands::dump::default_bad_log(&output));
                commands::dump::run_dump(&mut device, &output, range, &bad_log)?;
            }
            Ok(())
        }
        Commands::DumpBlocks {
            bus,
            output,
            start,
            end,
            raw,
            strip_spare,
        } => {
            let mut device = bus::open_device(&bus, chip_profile(&cli.chip)?)?;
            let range = commands::blocks::block_range(device.geometry(), start, end)?;
            commands::blocks::run_dump_blocks(&mut device, &output, range, raw, strip_spare)?;
            Ok(())
        }
        Commands::Merge {
            dir,
            output,
            pages,
            fill,
        } => {
            let geometry = chip_profile(&cli.chip)?.geometry;
            let pages = pages.unwrap_or_else(|| geometry.page_count());
            commands::merge::run_merge(&geometry, &dir, &output, pages, fill)?;
            Ok(())
        }
        Commands::Extract {
            dump,
            output,
            table,
            only,
            partitions,
            spare,
            header,
        } => {
            let table = commands::load_table(&table)?;
            let options = commands::extract::select_artifacts(partitions, spare, header, only);
            commands::extract::run_extract(&table, &dump, &output, &options)
        }
        Commands::Partitions { table, toml } => {
            let table = commands::load_table(&table)?;
            commands::partitions::cmd_show(&table, toml);
            Ok(())
        }
        Commands::DecodePage {
            dump,
            page,
            output,
            table,
        } => {
            let table = commands::load_table(&table)?;
            commands::decode_page::run_decode_page(&table, &dump, page, output.as_deref())
        }
        Commands::ListDevices => commands::list_devices(),
        Commands::ListBuses => {
            commands::list_buses();
            Ok(())
        }
        Commands::ListChips => {
            commands::list_chips();
            Ok(())
        }
    }
}

/// Look up the chip profile named on the command line
fn chip_profile(name: &str) -> Result<&'static ChipProfile, Box<dyn std::error::Error>> {
    find_profile(name).ok_or_else(|| {
        let known: Vec<&str> = PROFILES.iter().map(|p| p.name).collect();
        format!(
            "Unknown chip profile: {} (supported: {})",
            name,
            known.join(", ")
        )
        .into()
    })
}
