//! Page de-obfuscation

use std::vec::Vec;

/// Complement every byte in place
///
/// Applying it twice restores the input.
pub fn invert(data: &mut [u8]) {
    for b in data.iter_mut() {
        *b = !*b;
    }
}

/// Subtract the key from the data, cycling the key every `key.len()` bytes
///
/// `data[i] = data[i] - key[i % key.len()]` with wrapping arithmetic. An
/// empty key leaves the data unchanged.
pub fn mask_delta(data: &mut [u8], key: &[u8]) {
    if key.is_empty() {
        return;
    }
    for (b, k) in data.iter_mut().zip(key.iter().cycle()) {
        *b = b.wrapping_sub(*k);
    }
}

/// Recover the plain bytes of one page (spare area already removed)
pub fn decode_page(page: &[u8], key: &[u8]) -> Vec<u8> {
    let mut out = page.to_vec();
    invert(&mut out);
    mask_delta(&mut out, key);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::DEFAULT_KEY;

    #[test]
    fn test_invert_is_self_inverse() {
        let orig: Vec<u8> = (0..=255).collect();
        let mut data = orig.clone();
        invert(&mut data);
        assert_eq!(data[0], 0xFF);
        assert_eq!(data[0xFF], 0x00);
        invert(&mut data);
        assert_eq!(data, orig);
    }

    #[test]
    fn test_zero_page_decodes_to_tiled_key_pattern() {
        let page = vec![0u8; 4096];
        let out = decode_page(&page, &DEFAULT_KEY);
        assert_eq!(out.len(), 4096);
        for (i, b) in out.iter().enumerate() {
            assert_eq!(*b, 0xFF - DEFAULT_KEY[i % 8], "byte {}", i);
        }
        assert_eq!(&out[..8], &[0x71, 0xDE, 0xB6, 0x62, 0x60, 0xC5, 0x5F, 0xF0]);
    }

    #[test]
    fn test_mask_delta_wraps() {
        let mut data = [0x00, 0x01, 0xFF];
        mask_delta(&mut data, &[0x01]);
        assert_eq!(data, [0xFF, 0x00, 0xFE]);
    }

    #[test]
    fn test_decode_reverses_vendor_scrambling() {
        let plain: Vec<u8> = (0..64u8).map(|i| i.wrapping_mul(37)).collect();
        let scrambled: Vec<u8> = plain
            .iter()
            .enumerate()
            .map(|(i, b)| !b.wrapping_add(DEFAULT_KEY[i % 8]))
            .collect();
        assert_eq!(decode_page(&scrambled, &DEFAULT_KEY), plain);
    }
}
