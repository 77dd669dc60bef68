//! Partition table types

use std::string::String;
use std::vec::Vec;

use crate::decode::{DecodeError, HEADER_SIZE};
use crate::geometry::Geometry;

/// One partition: pages `[start_page, end_page)` of the dump
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PartitionDescriptor {
    /// Partition number
    pub id: u32,
    /// Partition name, used for the output file name
    pub name: String,
    /// First page (inclusive)
    pub start_page: u32,
    /// Last page (exclusive)
    pub end_page: u32,
}

impl PartitionDescriptor {
    /// Create a new descriptor
    pub fn new(id: u32, name: impl Into<String>, start_page: u32, end_page: u32) -> Self {
        Self {
            id,
            name: name.into(),
            start_page,
            end_page,
        }
    }

    /// Number of pages covered
    pub fn page_count(&self) -> u32 {
        self.end_page.saturating_sub(self.start_page)
    }

    /// Size of the decoded image in bytes
    pub fn image_size(&self, geometry: &Geometry) -> u64 {
        self.page_count() as u64 * geometry.page_size as u64
    }

    /// Output file name
    pub fn file_name(&self) -> String {
        format!("{}.img", self.name)
    }

    /// Check bounds and name
    pub fn validate(&self) -> Result<(), DecodeError> {
        if self.start_page > self.end_page {
            return Err(DecodeError::InvalidPartition {
                name: self.name.clone(),
                reason: "start page is after end page",
            });
        }
        if self.name.is_empty()
            || self.name == "."
            || self.name == ".."
            || self.name.contains(['/', '\\', '\0'])
        {
            return Err(DecodeError::InvalidPartition {
                name: self.name.clone(),
                reason: "name is not usable as a file name",
            });
        }
        Ok(())
    }
}

/// Decoding parameters that travel with a partition table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeSettings {
    /// De-obfuscation key
    pub key: Vec<u8>,
    /// Bytes of boot header copied verbatim from the start of the dump
    pub header_size: usize,
}

impl Default for DecodeSettings {
    fn default() -> Self {
        Self {
            key: crate::decode::DEFAULT_KEY.to_vec(),
            header_size: HEADER_SIZE,
        }
    }
}

/// A partition table together with the geometry and key it applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionTable {
    /// Optional table name
    pub name: Option<String>,
    /// Geometry of the dump
    pub geometry: Geometry,
    /// Decoding parameters
    pub decode: DecodeSettings,
    /// Partitions, in file order
    pub partitions: Vec<PartitionDescriptor>,
}

impl PartitionTable {
    /// Create an empty table for a geometry
    pub fn new(geometry: Geometry) -> Self {
        Self {
            name: None,
            geometry,
            decode: DecodeSettings::default(),
            partitions: Vec::new(),
        }
    }

    /// Partition list of the Echo Dot (3rd gen) NAND, in raw page units
    ///
    /// Only `boot_a` has verified offsets. Other partitions can be added
    /// through a TOML table.
    pub fn builtin() -> Self {
        let mut table = Self::new(Geometry::MX30LF4G28AD);
        table.name = Some("echo-dot-3".into());
        table.partitions = vec![PartitionDescriptor::new(13, "boot_a", 4864, 8768)];
        table
    }

    /// Find a partition by name (case-insensitive)
    pub fn find(&self, name: &str) -> Option<&PartitionDescriptor> {
        self.partitions
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Number of partitions
    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    /// Whether the table has no partitions
    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Check every descriptor against the geometry, plus the key and name uniqueness
    ///
    /// Overlapping partitions are allowed: each one is extracted into its
    /// own image.
    pub fn validate(&self) -> Result<(), DecodeError> {
        self.geometry.validate()?;
        crate::decode::check_key(&self.decode.key, self.geometry.page_size)?;

        let page_count = self.geometry.page_count();
        for (i, p1) in self.partitions.iter().enumerate() {
            p1.validate()?;
            if p1.end_page > page_count {
                return Err(DecodeError::InvalidPartition {
                    name: p1.name.clone(),
                    reason: "end page is beyond the device",
                });
            }
            for p2 in self.partitions.iter().skip(i + 1) {
                if p1.name.eq_ignore_ascii_case(&p2.name) {
                    return Err(DecodeError::InvalidPartition {
                        name: p2.name.clone(),
                        reason: "duplicate partition name",
                    });
                }
            }
        }
        Ok(())
    }
}

impl Default for PartitionTable {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table() {
        let table = PartitionTable::builtin();
        table.validate().unwrap();
        assert_eq!(table.len(), 1);
        let boot = table.find("BOOT_A").unwrap();
        assert_eq!(boot.id, 13);
        assert_eq!(boot.page_count(), 3904);
        assert_eq!(boot.image_size(&table.geometry), 3904 * 4096);
        assert_eq!(boot.file_name(), "boot_a.img");
    }

    #[test]
    fn test_descriptor_validation() {
        assert!(PartitionDescriptor::new(0, "ok", 3, 3).validate().is_ok());
        assert!(PartitionDescriptor::new(0, "rev", 4, 3).validate().is_err());
        assert!(PartitionDescriptor::new(0, "../etc", 0, 1).validate().is_err());
        assert!(PartitionDescriptor::new(0, "", 0, 1).validate().is_err());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut table = PartitionTable::new(Geometry::MX30LF4G28AD);
        table.partitions.push(PartitionDescriptor::new(0, "misc", 0, 4));
        table.partitions.push(PartitionDescriptor::new(1, "MISC", 4, 8));
        assert!(matches!(
            table.validate(),
            Err(DecodeError::InvalidPartition { .. })
        ));
    }

    #[test]
    fn test_partition_past_device_rejected() {
        let g = Geometry::MX30LF4G28AD;
        let mut table = PartitionTable::new(g);
        table
            .partitions
            .push(PartitionDescriptor::new(0, "last", g.page_count() - 64, g.page_count()));
        table.validate().unwrap();

        table
            .partitions
            .push(PartitionDescriptor::new(14, "tee2", 277312, 287552));
        assert!(matches!(
            table.validate(),
            Err(DecodeError::InvalidPartition { ref name, .. }) if name == "tee2"
        ));
    }
}
