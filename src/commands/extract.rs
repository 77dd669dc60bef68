//! Extract command implementation

use rnand_core::decode::extract::{extract_all, ExtractOptions};
use rnand_core::decode::DumpReader;
use rnand_core::partition::PartitionTable;
use std::path::Path;

use super::progress::IndicatifProgress;

/// Select artifacts from the command-line flags
///
/// With no selector every artifact is produced. `--only` implies
/// partition extraction.
pub fn select_artifacts(
    partitions: bool,
    spare: bool,
    header: bool,
    only: Option<String>,
) -> ExtractOptions {
    let partitions = partitions || only.is_some();
    if !partitions && !spare && !header {
        return ExtractOptions::all();
    }
    ExtractOptions {
        partitions,
        only,
        spare,
        header,
    }
}

/// Decode a dump into the selected artifacts under `out_dir`
pub fn run_extract(
    table: &PartitionTable,
    dump: &Path,
    out_dir: &Path,
    options: &ExtractOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut reader = DumpReader::open(dump, table.geometry)?;
    println!(
        "Dump {:?}: {} pages of {}+{} bytes",
        dump,
        reader.page_count(),
        table.geometry.page_size,
        table.geometry.oob_size
    );

    let mut progress = IndicatifProgress::new();
    let artifacts = extract_all(&mut reader, table, options, out_dir, &mut progress)?;

    println!("Wrote {} file(s) to {:?}:", artifacts.len(), out_dir);
    for artifact in &artifacts {
        let name = artifact
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!("  {:24} {:>12} bytes", name, artifact.bytes);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::{small_image, unique_root, SMALL_PROFILE};
    use rnand_core::decode::{decode_page, DEFAULT_KEY};
    use rnand_core::partition::PartitionDescriptor;
    use std::fs;

    #[test]
    fn test_select_artifacts() {
        let all = select_artifacts(false, false, false, None);
        assert!(all.partitions && all.spare && all.header);

        let only = select_artifacts(false, false, false, Some("boot".into()));
        assert!(only.partitions && !only.spare && !only.header);
        assert_eq!(only.only.as_deref(), Some("boot"));

        let spare = select_artifacts(false, true, false, None);
        assert!(!spare.partitions && spare.spare && !spare.header);
    }

    #[test]
    fn test_run_extract() {
        let root = unique_root("extract");
        fs::create_dir_all(&root).unwrap();
        let dump = root.join("nand.bin");
        fs::write(&dump, small_image()).unwrap();

        let g = SMALL_PROFILE.geometry;
        let mut table = PartitionTable::new(g);
        table.decode.header_size = 100;
        table.partitions.push(PartitionDescriptor::new(0, "boot", 1, 3));

        let out = root.join("out");
        run_extract(&table, &dump, &out, &ExtractOptions::all()).unwrap();

        let raw = g.raw_page_size();
        let image = small_image();
        let mut expected = decode_page(&image[raw..raw + g.page_size], &DEFAULT_KEY);
        expected.extend(decode_page(
            &image[2 * raw..2 * raw + g.page_size],
            &DEFAULT_KEY,
        ));
        assert_eq!(fs::read(out.join("boot.img")).unwrap(), expected);
        assert_eq!(fs::read(out.join("header.bin")).unwrap(), &image[..100]);
        assert_eq!(
            fs::read(out.join("oob.bin")).unwrap().len(),
            g.page_count() as usize * g.oob_size
        );

        let _ = fs::remove_dir_all(&root);
    }
}
