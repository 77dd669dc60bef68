//! Device geometry
//!
//! Sizes that describe how a NAND device (and therefore a raw dump of it)
//! is organised. A raw dump is a flat sequence of `raw_page_size()` byte
//! records: page data immediately followed by its spare (OOB) area.

use core::fmt;
use core::str::FromStr;

use crate::error::{Error, Result};

/// Offset inside the spare area of the factory bad-block marker
pub const BAD_BLOCK_MARKER_OOB_OFFSET: usize = 5;

/// NAND geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct Geometry {
    /// Data bytes per page
    pub page_size: usize,
    /// Spare (OOB) bytes per page
    pub oob_size: usize,
    /// Pages per erase block
    pub pages_per_block: u32,
    /// Number of erase blocks
    pub block_count: u32,
    /// Address cycles for a full (column + row) address
    pub addr_cycles: u8,
    /// Bits stored per cell
    #[cfg_attr(feature = "std", serde(default = "default_bits_per_cell"))]
    pub bits_per_cell: u8,
}

#[cfg(feature = "std")]
fn default_bits_per_cell() -> u8 {
    1
}

impl Geometry {
    /// Geometry of the Macronix MX30LF4G28AD family parts
    pub const MX30LF4G28AD: Geometry = Geometry {
        page_size: 4096,
        oob_size: 256,
        pages_per_block: 64,
        block_count: 2048,
        addr_cycles: 5,
        bits_per_cell: 1,
    };

    /// Check that every size is non-zero and the derived sizes fit
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0
            || self.pages_per_block == 0
            || self.block_count == 0
            || self.addr_cycles == 0
            || self.addr_cycles > 8
            || self.bits_per_cell == 0
        {
            return Err(Error::InvalidGeometry);
        }
        // Bad-block marker must live inside the spare area
        if self.oob_size <= BAD_BLOCK_MARKER_OOB_OFFSET {
            return Err(Error::InvalidGeometry);
        }
        self.block_count
            .checked_mul(self.pages_per_block)
            .ok_or(Error::InvalidGeometry)?;
        Ok(())
    }

    /// Page data plus spare area
    pub fn raw_page_size(&self) -> usize {
        self.page_size + self.oob_size
    }

    /// Total number of pages
    pub fn page_count(&self) -> u32 {
        self.block_count * self.pages_per_block
    }

    /// Erase block size without spare areas
    pub fn block_size(&self) -> usize {
        self.page_size * self.pages_per_block as usize
    }

    /// Erase block size including spare areas
    pub fn raw_block_size(&self) -> usize {
        self.raw_page_size() * self.pages_per_block as usize
    }

    /// Byte offset of a page record inside a raw dump
    pub fn page_offset(&self, page: u32) -> u64 {
        page as u64 * self.raw_page_size() as u64
    }

    /// Byte offset of a block inside a raw dump
    pub fn block_offset(&self, block: u32) -> u64 {
        block as u64 * self.raw_block_size() as u64
    }

    /// First page of a block
    pub fn first_page(&self, block: u32) -> u32 {
        block * self.pages_per_block
    }

    /// Block containing a page
    pub fn block_of(&self, page: u32) -> u32 {
        page / self.pages_per_block
    }

    /// Offset of the bad-block marker inside a raw page
    pub fn bad_block_marker_offset(&self) -> usize {
        self.page_size + BAD_BLOCK_MARKER_OOB_OFFSET
    }

    /// Total device size without spare areas
    pub fn total_size(&self) -> u64 {
        self.page_count() as u64 * self.page_size as u64
    }

    /// Size of a full raw dump, spare areas included
    pub fn raw_total_size(&self) -> u64 {
        self.page_count() as u64 * self.raw_page_size() as u64
    }

    /// Check a page index against the geometry
    pub fn check_page(&self, page: u32) -> Result<()> {
        if page >= self.page_count() {
            return Err(Error::PageOutOfRange { page });
        }
        Ok(())
    }

    /// Check a block index against the geometry
    pub fn check_block(&self, block: u32) -> Result<()> {
        if block >= self.block_count {
            return Err(Error::BlockOutOfRange { block });
        }
        Ok(())
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Geometry::MX30LF4G28AD
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}x{}+{}",
            self.block_count, self.pages_per_block, self.page_size, self.oob_size
        )
    }
}

/// Parse strings like "BLOCKSxPAGESxBYTES+OOB"
///
/// Address cycles and bits per cell keep the values of the default profile.
impl FromStr for Geometry {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (layout, oob) = s.split_once('+').ok_or(Error::InvalidGeometry)?;
        let mut parts = layout.split('x');
        let mut next = || -> Result<u32> {
            parts
                .next()
                .and_then(|p| p.trim().parse().ok())
                .ok_or(Error::InvalidGeometry)
        };
        let block_count = next()?;
        let pages_per_block = next()?;
        let page_size = next()? as usize;
        if parts.next().is_some() {
            return Err(Error::InvalidGeometry);
        }
        let oob_size = oob.trim().parse().map_err(|_| Error::InvalidGeometry)?;

        let geometry = Geometry {
            page_size,
            oob_size,
            pages_per_block,
            block_count,
            ..Geometry::MX30LF4G28AD
        };
        geometry.validate()?;
        Ok(geometry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_sizes() {
        let g = Geometry::MX30LF4G28AD;
        g.validate().unwrap();
        assert_eq!(g.raw_page_size(), g.page_size + g.oob_size);
        assert_eq!(g.raw_page_size(), 4352);
        assert_eq!(g.page_count(), g.block_count * g.pages_per_block);
        assert_eq!(g.page_count(), 131072);
        assert_eq!(g.block_size(), 64 * 4096);
        assert_eq!(g.raw_block_size(), 270848);
        assert_eq!(g.page_offset(3), 3 * 4352);
        assert_eq!(g.block_offset(2), g.page_offset(128));
        assert_eq!(g.bad_block_marker_offset(), 4101);
    }

    #[test]
    fn test_parse() {
        let g: Geometry = "16x4x512+16".parse().unwrap();
        assert_eq!(g.block_count, 16);
        assert_eq!(g.pages_per_block, 4);
        assert_eq!(g.page_size, 512);
        assert_eq!(g.oob_size, 16);
        assert_eq!(g.raw_page_size(), 528);
        assert_eq!(g.page_count(), 64);

        assert!("16x4x512".parse::<Geometry>().is_err());
        assert!("16x4+16".parse::<Geometry>().is_err());
        assert!("0x4x512+16".parse::<Geometry>().is_err());
        assert!("16x4x512+4".parse::<Geometry>().is_err());
    }

    #[test]
    fn test_range_checks() {
        let g: Geometry = "2x4x512+16".parse().unwrap();
        assert!(g.check_page(7).is_ok());
        assert_eq!(g.check_page(8), Err(Error::PageOutOfRange { page: 8 }));
        assert!(g.check_block(1).is_ok());
        assert_eq!(g.check_block(2), Err(Error::BlockOutOfRange { block: 2 }));
        assert_eq!(g.block_of(5), 1);
        assert_eq!(g.first_page(1), 4);
    }
}
