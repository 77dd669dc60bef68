//! Single page decoding

use rnand_core::decode::DumpReader;
use rnand_core::partition::PartitionTable;
use std::io::Write;
use std::path::Path;

/// Decode one page of a dump to `output`, or to stdout
pub fn run_decode_page(
    table: &PartitionTable,
    dump: &Path,
    page: u32,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut reader = DumpReader::open(dump, table.geometry)?;
    let decoded = reader.decode_page(page, &table.decode.key)?;

    match output {
        Some(path) => {
            std::fs::write(path, &decoded)?;
            log::info!("Wrote {} decoded bytes of page {} to {:?}", decoded.len(), page, path);
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&decoded)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::{small_image, unique_root, SMALL_PROFILE};
    use rnand_core::decode::{decode_page, DecodeError, DEFAULT_KEY};
    use std::fs;

    #[test]
    fn test_decode_page_to_file() {
        let root = unique_root("decode-page");
        fs::create_dir_all(&root).unwrap();
        let dump = root.join("nand.bin");
        let out = root.join("page5.bin");
        fs::write(&dump, small_image()).unwrap();

        let g = SMALL_PROFILE.geometry;
        let table = PartitionTable::new(g);
        run_decode_page(&table, &dump, 5, Some(&out)).unwrap();

        let raw = g.raw_page_size();
        let image = small_image();
        let expected = decode_page(&image[5 * raw..5 * raw + g.page_size], &DEFAULT_KEY);
        assert_eq!(fs::read(&out).unwrap(), expected);

        let err = run_decode_page(&table, &dump, g.page_count(), Some(&out)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DecodeError>(),
            Some(DecodeError::PageOutOfRange { .. })
        ));

        let _ = fs::remove_dir_all(&root);
    }
}
