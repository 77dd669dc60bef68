//! ONFI parameter page parsing
//!
//! The parameter page is read for diagnostics only. Geometry used for page
//! I/O always comes from the chip profile; [`OnfiParameters::geometry_hint`]
//! exists so the two can be compared and mismatches logged.

use alloc::string::String;

use crc::{Algorithm, Crc};

use crate::error::{Error, Result};
use crate::geometry::Geometry;
use crate::opcodes::COLUMN_CYCLES;

/// Parameter page length
pub const PARAMETER_PAGE_LEN: usize = 256;

/// Parameter page signature
pub const ONFI_SIGNATURE: &[u8; 4] = b"ONFI";

/// Bytes covered by the integrity CRC
const CRC_COVERED_LEN: usize = 254;

const CRC_16_ONFI: Algorithm<u16> = Algorithm {
    width: 16,
    poly: 0x8005,
    init: 0x4F4E,
    refin: false,
    refout: false,
    xorout: 0x0000,
    check: 0x2771,
    residue: 0x0000,
};

const ONFI_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_ONFI);

// Field offsets
const POS_REVISION: usize = 4;
const POS_FEATURES: usize = 6;
const POS_OPT_COMMANDS: usize = 8;
const POS_MANUFACTURER: usize = 32;
const POS_MODEL: usize = 44;
const POS_JEDEC_ID: usize = 64;
const POS_DATE_CODE: usize = 65;
const POS_PAGE_SIZE: usize = 80;
const POS_SPARE_SIZE: usize = 84;
const POS_PARTIAL_PAGE_SIZE: usize = 86;
const POS_PARTIAL_SPARE_SIZE: usize = 90;
const POS_PAGES_PER_BLOCK: usize = 92;
const POS_BLOCKS_PER_LUN: usize = 96;
const POS_LUN_COUNT: usize = 100;
const POS_ADDR_CYCLES: usize = 101;
const POS_BITS_PER_CELL: usize = 102;
const POS_MAX_BAD_BLOCKS: usize = 103;
const POS_BLOCK_ENDURANCE: usize = 105;
const POS_GUARANTEED_BLOCKS: usize = 107;
const POS_PROGRAMS_PER_PAGE: usize = 110;
const POS_ECC_BITS: usize = 112;
const POS_PIN_CAPACITANCE: usize = 128;
const POS_TIMING_MODES: usize = 129;
const POS_CACHE_TIMING_MODES: usize = 131;
const POS_T_PROG: usize = 133;
const POS_T_BERS: usize = 135;
const POS_T_R: usize = 137;
const POS_T_CCS: usize = 139;
const POS_VENDOR_REVISION: usize = 164;
const POS_CRC: usize = 254;

/// Compute the ONFI integrity CRC over a parameter page
pub fn parameter_page_crc(page: &[u8]) -> u16 {
    ONFI_CRC.checksum(&page[..CRC_COVERED_LEN.min(page.len())])
}

/// Build a minimal parameter page describing `geometry`
///
/// Used by emulators. Text fields are space padded, the integrity CRC is
/// filled in.
pub fn build_parameter_page(
    geometry: &Geometry,
    manufacturer: &str,
    model: &str,
    jedec_id: u8,
) -> [u8; PARAMETER_PAGE_LEN] {
    let mut p = [0u8; PARAMETER_PAGE_LEN];
    p[..4].copy_from_slice(ONFI_SIGNATURE);
    p[POS_REVISION] = 0x02;
    put_ascii(&mut p, POS_MANUFACTURER, 12, manufacturer);
    put_ascii(&mut p, POS_MODEL, 20, model);
    p[POS_JEDEC_ID] = jedec_id;
    p[POS_PAGE_SIZE..POS_PAGE_SIZE + 4].copy_from_slice(&(geometry.page_size as u32).to_le_bytes());
    p[POS_SPARE_SIZE..POS_SPARE_SIZE + 2].copy_from_slice(&(geometry.oob_size as u16).to_le_bytes());
    p[POS_PAGES_PER_BLOCK..POS_PAGES_PER_BLOCK + 4]
        .copy_from_slice(&geometry.pages_per_block.to_le_bytes());
    p[POS_BLOCKS_PER_LUN..POS_BLOCKS_PER_LUN + 4].copy_from_slice(&geometry.block_count.to_le_bytes());
    p[POS_LUN_COUNT] = 1;
    let column = COLUMN_CYCLES;
    let row = geometry.addr_cycles.saturating_sub(column);
    p[POS_ADDR_CYCLES] = (column << 4) | (row & 0x0F);
    p[POS_BITS_PER_CELL] = geometry.bits_per_cell;
    let crc = parameter_page_crc(&p);
    p[POS_CRC..].copy_from_slice(&crc.to_le_bytes());
    p
}

fn put_ascii(page: &mut [u8], pos: usize, len: usize, text: &str) {
    let field = &mut page[pos..pos + len];
    field.fill(b' ');
    for (dst, src) in field.iter_mut().zip(text.bytes()) {
        *dst = src;
    }
}

/// Parsed ONFI parameter page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnfiParameters {
    /// ONFI revision bitfield
    pub revision: u16,
    /// Features supported bitfield
    pub features: u16,
    /// Optional commands supported bitfield
    pub optional_commands: u16,
    /// Device manufacturer (ASCII, trimmed)
    pub manufacturer: String,
    /// Device model (ASCII, trimmed)
    pub model: String,
    /// JEDEC manufacturer ID
    pub jedec_id: u8,
    /// Date code
    pub date_code: u16,
    /// Data bytes per page
    pub page_size: u32,
    /// Spare bytes per page
    pub spare_size: u16,
    /// Data bytes per partial page
    pub partial_page_size: u32,
    /// Spare bytes per partial page
    pub partial_spare_size: u16,
    /// Pages per block
    pub pages_per_block: u32,
    /// Blocks per logical unit
    pub blocks_per_lun: u32,
    /// Number of logical units
    pub lun_count: u8,
    /// Row address cycles
    pub row_addr_cycles: u8,
    /// Column address cycles
    pub column_addr_cycles: u8,
    /// Bits per cell
    pub bits_per_cell: u8,
    /// Maximum bad blocks per LUN
    pub max_bad_blocks_per_lun: u16,
    /// Block endurance (encoded value/multiplier)
    pub block_endurance: u16,
    /// Guaranteed valid blocks at the beginning of the target
    pub guaranteed_valid_blocks: u8,
    /// Number of programs per page
    pub programs_per_page: u8,
    /// Number of bits of ECC correctability
    pub ecc_bits: u8,
    /// I/O pin capacitance
    pub pin_capacitance: u8,
    /// Timing modes supported
    pub timing_modes: u16,
    /// Program cache timing modes supported
    pub cache_timing_modes: u16,
    /// Maximum page program time (us)
    pub t_prog_us: u16,
    /// Maximum block erase time (us)
    pub t_bers_us: u16,
    /// Maximum page read time (us)
    pub t_r_us: u16,
    /// Minimum change column setup time (ns)
    pub t_ccs_ns: u16,
    /// Vendor specific revision
    pub vendor_revision: u16,
    /// Integrity CRC stored in the page
    pub crc: u16,
    /// Integrity CRC computed over the page
    pub computed_crc: u16,
}

fn le16(buf: &[u8], pos: usize) -> u16 {
    u16::from_le_bytes([buf[pos], buf[pos + 1]])
}

fn le32(buf: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes([buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]])
}

fn ascii(buf: &[u8], pos: usize, len: usize) -> String {
    String::from_utf8_lossy(&buf[pos..pos + len])
        .trim_matches(|c: char| c == ' ' || c == '\0')
        .into()
}

impl OnfiParameters {
    /// Parse a raw parameter page
    ///
    /// Fails if the page is short or the signature is missing. A CRC
    /// mismatch is not an error here; check [`OnfiParameters::crc_valid`].
    pub fn parse(page: &[u8]) -> Result<Self> {
        if page.len() < PARAMETER_PAGE_LEN {
            return Err(Error::ShortRead {
                expected: PARAMETER_PAGE_LEN,
                got: page.len(),
            });
        }
        if &page[..4] != ONFI_SIGNATURE {
            return Err(Error::OnfiSignature);
        }

        let addr_cycles = page[POS_ADDR_CYCLES];

        Ok(Self {
            revision: le16(page, POS_REVISION),
            features: le16(page, POS_FEATURES),
            optional_commands: le16(page, POS_OPT_COMMANDS),
            manufacturer: ascii(page, POS_MANUFACTURER, 12),
            model: ascii(page, POS_MODEL, 20),
            jedec_id: page[POS_JEDEC_ID],
            date_code: le16(page, POS_DATE_CODE),
            page_size: le32(page, POS_PAGE_SIZE),
            spare_size: le16(page, POS_SPARE_SIZE),
            partial_page_size: le32(page, POS_PARTIAL_PAGE_SIZE),
            partial_spare_size: le16(page, POS_PARTIAL_SPARE_SIZE),
            pages_per_block: le32(page, POS_PAGES_PER_BLOCK),
            blocks_per_lun: le32(page, POS_BLOCKS_PER_LUN),
            lun_count: page[POS_LUN_COUNT],
            row_addr_cycles: addr_cycles & 0x0F,
            column_addr_cycles: addr_cycles >> 4,
            bits_per_cell: page[POS_BITS_PER_CELL],
            max_bad_blocks_per_lun: le16(page, POS_MAX_BAD_BLOCKS),
            block_endurance: le16(page, POS_BLOCK_ENDURANCE),
            guaranteed_valid_blocks: page[POS_GUARANTEED_BLOCKS],
            programs_per_page: page[POS_PROGRAMS_PER_PAGE],
            ecc_bits: page[POS_ECC_BITS],
            pin_capacitance: page[POS_PIN_CAPACITANCE],
            timing_modes: le16(page, POS_TIMING_MODES),
            cache_timing_modes: le16(page, POS_CACHE_TIMING_MODES),
            t_prog_us: le16(page, POS_T_PROG),
            t_bers_us: le16(page, POS_T_BERS),
            t_r_us: le16(page, POS_T_R),
            t_ccs_ns: le16(page, POS_T_CCS),
            vendor_revision: le16(page, POS_VENDOR_REVISION),
            crc: le16(page, POS_CRC),
            computed_crc: parameter_page_crc(page),
        })
    }

    /// Whether the stored integrity CRC matches the page contents
    pub fn crc_valid(&self) -> bool {
        self.crc == self.computed_crc
    }

    /// Total address cycles (row + column)
    pub fn addr_cycles(&self) -> u8 {
        self.row_addr_cycles + self.column_addr_cycles
    }

    /// Geometry as claimed by the parameter page
    pub fn geometry_hint(&self) -> Geometry {
        Geometry {
            page_size: self.page_size as usize,
            oob_size: self.spare_size as usize,
            pages_per_block: self.pages_per_block,
            block_count: self.blocks_per_lun * self.lun_count.max(1) as u32,
            addr_cycles: self.addr_cycles(),
            bits_per_cell: self.bits_per_cell,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_page() -> [u8; PARAMETER_PAGE_LEN] {
        let mut p = [0u8; PARAMETER_PAGE_LEN];
        p[..4].copy_from_slice(b"ONFI");
        p[POS_REVISION] = 0x02;
        p[POS_MANUFACTURER..POS_MANUFACTURER + 12].copy_from_slice(b"MACRONIX    ");
        p[POS_MODEL..POS_MODEL + 20].copy_from_slice(b"MX30LF4G28AD        ");
        p[POS_JEDEC_ID] = 0xC2;
        p[POS_PAGE_SIZE..POS_PAGE_SIZE + 4].copy_from_slice(&4096u32.to_le_bytes());
        p[POS_SPARE_SIZE..POS_SPARE_SIZE + 2].copy_from_slice(&256u16.to_le_bytes());
        p[POS_PAGES_PER_BLOCK..POS_PAGES_PER_BLOCK + 4].copy_from_slice(&64u32.to_le_bytes());
        p[POS_BLOCKS_PER_LUN..POS_BLOCKS_PER_LUN + 4].copy_from_slice(&2048u32.to_le_bytes());
        p[POS_LUN_COUNT] = 1;
        p[POS_ADDR_CYCLES] = 0x23;
        p[POS_BITS_PER_CELL] = 1;
        p[POS_T_R..POS_T_R + 2].copy_from_slice(&25u16.to_le_bytes());
        let crc = parameter_page_crc(&p);
        p[POS_CRC..].copy_from_slice(&crc.to_le_bytes());
        p
    }

    #[test]
    fn test_crc_check_value() {
        assert_eq!(ONFI_CRC.checksum(b"123456789"), 0x2771);
    }

    #[test]
    fn test_parse_parameter_page() {
        let params = OnfiParameters::parse(&sample_page()).unwrap();
        assert_eq!(params.manufacturer, "MACRONIX");
        assert_eq!(params.model, "MX30LF4G28AD");
        assert_eq!(params.jedec_id, 0xC2);
        assert_eq!(params.row_addr_cycles, 3);
        assert_eq!(params.column_addr_cycles, 2);
        assert_eq!(params.t_r_us, 25);
        assert!(params.crc_valid());
        assert_eq!(params.geometry_hint(), Geometry::MX30LF4G28AD);
    }

    #[test]
    fn test_parse_rejects_bad_signature() {
        let mut page = sample_page();
        page[0] = b'X';
        assert_eq!(OnfiParameters::parse(&page), Err(Error::OnfiSignature));
        assert!(matches!(
            OnfiParameters::parse(&page[..100]),
            Err(Error::ShortRead { .. })
        ));
    }

    #[test]
    fn test_built_page_describes_geometry() {
        let small = Geometry {
            page_size: 512,
            oob_size: 16,
            pages_per_block: 32,
            block_count: 128,
            addr_cycles: 4,
            bits_per_cell: 1,
        };
        let page = build_parameter_page(&small, "EMULATED", "DUMMY-NAND", 0xC2);
        let params = OnfiParameters::parse(&page).unwrap();
        assert!(params.crc_valid());
        assert_eq!(params.manufacturer, "EMULATED");
        assert_eq!(params.model, "DUMMY-NAND");
        assert_eq!(params.geometry_hint(), small);
    }

    #[test]
    fn test_crc_mismatch_detected() {
        let mut page = sample_page();
        page[POS_T_R] ^= 0x01;
        let params = OnfiParameters::parse(&page).unwrap();
        assert!(!params.crc_valid());
    }
}
