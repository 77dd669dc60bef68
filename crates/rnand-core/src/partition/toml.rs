//! TOML partition table parsing
//!
//! ```toml
//! [table]
//! name = "echo-dot-3"
//!
//! [geometry]
//! page_size = 4096
//! oob_size = 256
//! pages_per_block = 64
//! block_count = 2048
//! addr_cycles = 5
//!
//! [decode]
//! key = "8e21499d9f3aa00f"
//! header_size = 3520
//!
//! [[partition]]
//! id = 13
//! name = "boot_a"
//! start_page = 4864
//! end_page = 0x2240
//! ```

use std::fs;
use std::path::Path;
use std::string::{String, ToString};
use std::vec::Vec;

use super::{DecodeSettings, PartitionDescriptor, PartitionTable};
use crate::decode::{parse_hex_key, DecodeError};
use crate::geometry::Geometry;

/// TOML table file structure
#[derive(Debug, serde::Deserialize)]
struct TomlTableFile {
    table: Option<TomlTableMeta>,
    geometry: Option<Geometry>,
    decode: Option<TomlDecode>,
    #[serde(default)]
    partition: Vec<TomlPartition>,
}

/// Table metadata
#[derive(Debug, serde::Deserialize)]
struct TomlTableMeta {
    name: Option<String>,
}

/// Decode section
#[derive(Debug, serde::Deserialize)]
struct TomlDecode {
    key: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_hex_u32")]
    header_size: Option<u32>,
}

/// Partition definition in TOML
#[derive(Debug, serde::Deserialize)]
struct TomlPartition {
    id: u32,
    name: String,
    #[serde(deserialize_with = "deserialize_hex_u32")]
    start_page: u32,
    #[serde(deserialize_with = "deserialize_hex_u32")]
    end_page: u32,
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum HexOrInt {
    Int(u32),
    Str(String),
}

impl HexOrInt {
    fn into_u32(self) -> Result<u32, String> {
        match self {
            HexOrInt::Int(n) => Ok(n),
            HexOrInt::Str(s) => parse_number(&s),
        }
    }
}

/// Deserialize a u32 that can be hex (0x...) or decimal
fn deserialize_hex_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    HexOrInt::deserialize(deserializer)?
        .into_u32()
        .map_err(serde::de::Error::custom)
}

fn deserialize_opt_hex_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    deserialize_hex_u32(deserializer).map(Some)
}

/// Parse a number that can be hex (0x...) or decimal
pub fn parse_number(s: &str) -> Result<u32, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("invalid hex: {}", e))
    } else {
        s.parse().map_err(|e| format!("invalid number: {}", e))
    }
}

impl PartitionTable {
    /// Load a partition table from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, DecodeError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse a partition table from a TOML string
    ///
    /// Missing sections fall back to the default geometry, key and header
    /// size. The result is validated before it is returned.
    pub fn from_toml_str(content: &str) -> Result<Self, DecodeError> {
        let file: TomlTableFile =
            toml::from_str(content).map_err(|e| DecodeError::Config(e.to_string()))?;

        let mut table = PartitionTable::new(file.geometry.unwrap_or_default());
        table.name = file.table.and_then(|t| t.name);

        if let Some(decode) = file.decode {
            let defaults = DecodeSettings::default();
            table.decode = DecodeSettings {
                key: match decode.key {
                    Some(hex) => parse_hex_key(&hex)?,
                    None => defaults.key,
                },
                header_size: decode
                    .header_size
                    .map(|n| n as usize)
                    .unwrap_or(defaults.header_size),
            };
        }

        table.partitions = file
            .partition
            .into_iter()
            .map(|p| PartitionDescriptor::new(p.id, p.name, p.start_page, p.end_page))
            .collect();

        table.validate()?;
        Ok(table)
    }

    /// Convert the table to a TOML string
    pub fn to_toml_string(&self) -> String {
        let mut output = String::new();

        if let Some(name) = &self.name {
            output.push_str("[table]\n");
            output.push_str(&format!("name = \"{}\"\n\n", name));
        }

        let g = &self.geometry;
        output.push_str("[geometry]\n");
        output.push_str(&format!("page_size = {}\n", g.page_size));
        output.push_str(&format!("oob_size = {}\n", g.oob_size));
        output.push_str(&format!("pages_per_block = {}\n", g.pages_per_block));
        output.push_str(&format!("block_count = {}\n", g.block_count));
        output.push_str(&format!("addr_cycles = {}\n", g.addr_cycles));
        output.push_str(&format!("bits_per_cell = {}\n\n", g.bits_per_cell));

        output.push_str("[decode]\n");
        let key: String = self.decode.key.iter().map(|b| format!("{:02x}", b)).collect();
        output.push_str(&format!("key = \"{}\"\n", key));
        output.push_str(&format!("header_size = {}\n\n", self.decode.header_size));

        for p in &self.partitions {
            output.push_str("[[partition]]\n");
            output.push_str(&format!("id = {}\n", p.id));
            output.push_str(&format!("name = \"{}\"\n", p.name));
            output.push_str(&format!("start_page = {}\n", p.start_page));
            output.push_str(&format!("end_page = {}\n\n", p.end_page));
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("4096").unwrap(), 4096);
        assert_eq!(parse_number("0x1300").unwrap(), 0x1300);
        assert_eq!(parse_number(" 0X10 ").unwrap(), 16);
        assert!(parse_number("boot").is_err());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[table]
name = "small"

[geometry]
page_size = 512
oob_size = 16
pages_per_block = 4
block_count = 16
addr_cycles = 4

[decode]
key = "0102030405060708"
header_size = "0x100"

[[partition]]
id = 0
name = "boot"
start_page = 0
end_page = 8

[[partition]]
id = 1
name = "data"
start_page = "0x8"
end_page = 64
"#;
        let table = PartitionTable::from_toml_str(toml).unwrap();
        assert_eq!(table.name.as_deref(), Some("small"));
        assert_eq!(table.geometry.page_size, 512);
        assert_eq!(table.geometry.bits_per_cell, 1);
        assert_eq!(table.decode.key, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(table.decode.header_size, 256);
        assert_eq!(table.len(), 2);
        assert_eq!(table.partitions[1].start_page, 8);
        assert_eq!(table.partitions[1].end_page, 64);
    }

    #[test]
    fn test_defaults_when_sections_missing() {
        let toml = r#"
[[partition]]
id = 13
name = "boot_a"
start_page = 4864
end_page = 8768
"#;
        let table = PartitionTable::from_toml_str(toml).unwrap();
        assert_eq!(table.geometry, Geometry::MX30LF4G28AD);
        assert_eq!(table.decode, DecodeSettings::default());
        assert_eq!(table.find("boot_a").unwrap().page_count(), 3904);
    }

    #[test]
    fn test_invalid_tables_rejected() {
        let bad_key = r#"
[decode]
key = "0102030"
"#;
        assert!(matches!(
            PartitionTable::from_toml_str(bad_key),
            Err(DecodeError::InvalidHex(_))
        ));

        let bad_range = r#"
[[partition]]
id = 0
name = "x"
start_page = 10
end_page = 2
"#;
        assert!(matches!(
            PartitionTable::from_toml_str(bad_range),
            Err(DecodeError::InvalidPartition { .. })
        ));

        assert!(matches!(
            PartitionTable::from_toml_str("[[partition]]\nid = \"x\""),
            Err(DecodeError::Config(_))
        ));
    }

    #[test]
    fn test_toml_roundtrip_of_builtin() {
        let table = PartitionTable::builtin();
        let parsed = PartitionTable::from_toml_str(&table.to_toml_string()).unwrap();
        assert_eq!(parsed, table);
    }
}
