//! Supported NAND chip profiles
//!
//! A profile ties the expected READ ID bytes to the geometry used for page
//! I/O. The geometry is fixed by the profile once identification succeeds;
//! ONFI data is only compared against it for diagnostics.

use crate::geometry::Geometry;

/// Static description of a supported NAND part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipProfile {
    /// Chip name
    pub name: &'static str,
    /// Vendor name
    pub vendor: &'static str,
    /// Expected leading READ ID bytes
    pub id_bytes: &'static [u8],
    /// Geometry used for page I/O
    pub geometry: Geometry,
}

impl ChipProfile {
    /// Check whether READ ID output matches this profile
    pub fn matches(&self, id: &[u8]) -> bool {
        id.len() >= self.id_bytes.len() && id[..self.id_bytes.len()] == *self.id_bytes
    }
}

/// Macronix MX30LF4G28AD as found on the Echo Dot (3rd gen) board
pub const MX30LF4G28AD: ChipProfile = ChipProfile {
    name: "MX30LF4G28AD",
    vendor: "Macronix",
    id_bytes: &[0xC2, 0xDC, 0x90, 0xA2, 0x57, 0x03],
    geometry: Geometry::MX30LF4G28AD,
};

/// All built-in profiles
pub const PROFILES: &[ChipProfile] = &[MX30LF4G28AD];

/// Find a profile by (case-insensitive) name
pub fn find_profile(name: &str) -> Option<&'static ChipProfile> {
    PROFILES.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}

/// Vendor name for a JEDEC manufacturer ID byte
pub fn manufacturer_name(id: u8) -> &'static str {
    match id {
        0xC2 => "Macronix",
        0x2C => "Micron",
        0xEC => "Samsung",
        0x98 => "Toshiba/Kioxia",
        0xAD => "SK Hynix",
        0x01 => "Spansion/Cypress",
        0xC8 => "GigaDevice",
        0xEF => "Winbond",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_match() {
        let id = [0xC2, 0xDC, 0x90, 0xA2, 0x57, 0x03, 0xC2, 0xDC];
        assert!(MX30LF4G28AD.matches(&id));
        assert!(!MX30LF4G28AD.matches(&id[..4]));

        let mut bad = id;
        bad[3] = 0xA1;
        assert!(!MX30LF4G28AD.matches(&bad));
    }

    #[test]
    fn test_find_profile() {
        assert_eq!(find_profile("mx30lf4g28ad"), Some(&MX30LF4G28AD));
        assert!(find_profile("w25q128").is_none());
        assert_eq!(manufacturer_name(0xC2), "Macronix");
        assert_eq!(manufacturer_name(0x42), "Unknown");
    }
}
