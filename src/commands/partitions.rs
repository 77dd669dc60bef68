//! Partition table display

use rnand_core::partition::PartitionTable;

/// Print the partition table, either as a listing or as TOML
pub fn cmd_show(table: &PartitionTable, as_toml: bool) {
    if as_toml {
        print!("{}", table.to_toml_string());
        return;
    }

    let g = &table.geometry;
    println!(
        "Partition table: {}",
        table.name.as_deref().unwrap_or("(unnamed)")
    );
    println!(
        "Geometry: {} ({} pages, {} address cycles)",
        g,
        g.page_count(),
        g.addr_cycles
    );
    println!(
        "Key: {}, header: {} bytes",
        table
            .decode
            .key
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<String>(),
        table.decode.header_size
    );
    println!();
    println!(
        "{:>3}  {:<16} {:>10} {:>10} {:>8} {:>12}",
        "ID", "Name", "Start", "End", "Pages", "Size"
    );
    println!("{}", "-".repeat(64));

    for p in &table.partitions {
        println!(
            "{:>3}  {:<16} {:>10} {:>10} {:>8} {:>12}",
            p.id,
            p.name,
            p.start_page,
            p.end_page,
            p.page_count(),
            format_size(p.image_size(g))
        );
    }

    if table.is_empty() {
        println!("  (no partitions)");
    }
}

fn format_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1} MiB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{} KiB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::TableArgs;
    use crate::commands::load_table;
    use crate::commands::tests::unique_root;
    use rnand_core::geometry::Geometry;
    use std::fs;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(8192), "8 KiB");
        assert_eq!(format_size(3 * 1024 * 1024 / 2), "1.5 MiB");
    }

    #[test]
    fn test_load_builtin_table() {
        let table = load_table(&TableArgs::default()).unwrap();
        assert_eq!(table, PartitionTable::builtin());
    }

    #[test]
    fn test_load_table_overrides() {
        let root = unique_root("table");
        fs::create_dir_all(&root).unwrap();
        let path = root.join("table.toml");
        fs::write(
            &path,
            r#"
[[partition]]
id = 1
name = "boot"
start_page = 0x10
end_page = 0x20
"#,
        )
        .unwrap();

        let geometry: Geometry = "16x4x64+16".parse().unwrap();
        let args = TableArgs {
            table: Some(path),
            geometry: Some(geometry),
            key: Some("0102".into()),
        };
        let table = load_table(&args).unwrap();
        assert_eq!(table.geometry, geometry);
        assert_eq!(table.decode.key, vec![1, 2]);
        assert_eq!(table.find("boot").unwrap().page_count(), 16);

        let bad_key = TableArgs {
            key: Some("010203".into()),
            ..args
        };
        assert!(load_table(&bad_key).is_err());

        let _ = fs::remove_dir_all(&root);
    }
}
