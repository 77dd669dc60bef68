//! CLI argument parsing

use crate::bus;
use clap::{Parser, Subcommand};
use rnand_core::geometry::Geometry;
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a geometry given as BLOCKSxPAGESxBYTES+OOB
fn parse_geometry(s: &str) -> Result<Geometry, String> {
    s.parse::<Geometry>().map_err(|e| e.to_string())
}

/// Generate dynamic help text for the bus argument
fn bus_arg_help() -> String {
    format!("Bus to use [available: {}]", bus::bus_names_short())
}

#[derive(Parser)]
#[command(name = "rnand")]
#[command(author, version, about = "Raw NAND dumper and dump decoder", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Expected chip profile
    #[arg(long, global = true, default_value = "MX30LF4G28AD")]
    pub chip: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Partition table options shared by the offline commands
#[derive(clap::Args, Debug, Clone, Default)]
pub struct TableArgs {
    /// Partition table (TOML format, defaults to the built-in table)
    #[arg(short, long)]
    pub table: Option<PathBuf>,

    /// Dump geometry as BLOCKSxPAGESxBYTES+OOB (overrides the table)
    #[arg(short, long, value_parser = parse_geometry)]
    pub geometry: Option<Geometry>,

    /// De-obfuscation key in hex (overrides the table)
    #[arg(short, long)]
    pub key: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Identify the NAND device and show its diagnostics
    Probe {
        /// Bus to use
        #[arg(short, long, help = bus_arg_help())]
        bus: String,
    },

    /// Dump a page range with consensus reads
    Dump {
        /// Bus to use
        #[arg(short, long, help = bus_arg_help())]
        bus: String,

        /// Output dump file
        #[arg(short, long, required_unless_present = "pages_dir")]
        output: Option<PathBuf>,

        /// Write one <page>.bin file per page into this directory (resumable)
        #[arg(long, conflicts_with = "output")]
        pages_dir: Option<PathBuf>,

        /// First page (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        start: u32,

        /// End page, exclusive (hex or decimal, defaults to the whole device)
        #[arg(long, value_parser = parse_hex_u32)]
        end: Option<u32>,

        /// Bad-page log (defaults to <output>.bad_pages.log)
        #[arg(long)]
        bad_log: Option<PathBuf>,
    },

    /// Dump whole blocks, skipping bad blocks
    DumpBlocks {
        /// Bus to use
        #[arg(short, long, help = bus_arg_help())]
        bus: String,

        /// Output file (block data is appended)
        #[arg(short, long)]
        output: PathBuf,

        /// First block (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        start: u32,

        /// End block, exclusive (hex or decimal, defaults to the whole device)
        #[arg(long, value_parser = parse_hex_u32)]
        end: Option<u32>,

        /// Keep the contents of bad blocks
        #[arg(long)]
        raw: bool,

        /// Drop the spare area of every page
        #[arg(long)]
        strip_spare: bool,
    },

    /// Merge per-page files into one raw dump
    Merge {
        /// Directory holding <page>.bin files
        #[arg(short, long)]
        dir: PathBuf,

        /// Output dump file
        #[arg(short, long)]
        output: PathBuf,

        /// Number of pages to merge (defaults to the whole device)
        #[arg(long, value_parser = parse_hex_u32)]
        pages: Option<u32>,

        /// Substitute 0xFF pages for missing files
        #[arg(long)]
        fill: bool,
    },

    /// Extract partitions, spare areas and boot header from a dump
    Extract {
        /// Raw dump file
        #[arg(short, long)]
        dump: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        table: TableArgs,

        /// Extract only this partition
        #[arg(long)]
        only: Option<String>,

        /// Decode partitions (all artifacts when no selector is given)
        #[arg(long)]
        partitions: bool,

        /// Write the concatenated spare areas
        #[arg(long)]
        spare: bool,

        /// Copy the boot header
        #[arg(long)]
        header: bool,
    },

    /// Show the effective partition table
    Partitions {
        #[command(flatten)]
        table: TableArgs,

        /// Print the table as TOML
        #[arg(long)]
        toml: bool,
    },

    /// Decode a single page of a dump
    DecodePage {
        /// Raw dump file
        #[arg(short, long)]
        dump: PathBuf,

        /// Page index (hex or decimal)
        #[arg(short, long, value_parser = parse_hex_u32)]
        page: u32,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        table: TableArgs,
    },

    /// List FTDI devices visible over USB
    ListDevices,

    /// List supported buses
    ListBuses,

    /// List supported chip profiles
    ListChips,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_hex_u32() {
        assert_eq!(parse_hex_u32("0x1000"), Ok(4096));
        assert_eq!(parse_hex_u32("4096"), Ok(4096));
        assert!(parse_hex_u32("0xZZ").is_err());
    }

    #[test]
    fn test_dump_requires_a_destination() {
        assert!(Cli::try_parse_from(["rnand", "dump", "-b", "dummy"]).is_err());
        assert!(Cli::try_parse_from(["rnand", "dump", "-b", "dummy", "-o", "x.bin"]).is_ok());
        assert!(
            Cli::try_parse_from(["rnand", "dump", "-b", "dummy", "--pages-dir", "pages"]).is_ok()
        );
    }

    #[test]
    fn test_geometry_argument() {
        let cli = Cli::try_parse_from(["rnand", "partitions", "-g", "2048x64x4096+256"]).unwrap();
        match cli.command {
            Commands::Partitions { table, .. } => {
                assert_eq!(table.geometry, Some(Geometry::MX30LF4G28AD));
            }
            _ => panic!("wrong subcommand"),
        }
    }
}
