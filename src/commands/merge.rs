//! Merge per-page files into one raw dump

use rnand_core::geometry::Geometry;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use super::dump::page_file;
use super::progress::create_page_bar;

/// Concatenate `0.bin..pages-1.bin` from `dir` into `output`
///
/// Every page file must hold exactly one raw page. A missing file is an
/// error unless `fill` is set, in which case an erased page is written in
/// its place. Returns the pages that were filled.
pub fn run_merge(
    geometry: &Geometry,
    dir: &Path,
    output: &Path,
    pages: u32,
    fill: bool,
) -> Result<Vec<u32>, Box<dyn std::error::Error>> {
    let raw = geometry.raw_page_size();
    let erased = vec![0xFF; raw];

    println!("Merging {} pages from {:?} into {:?}", pages, dir, output);

    let mut out = BufWriter::new(File::create(output)?);
    let mut filled = Vec::new();
    let pb = create_page_bar(pages as u64, "Merging");

    for page in 0..pages {
        let path = page_file(dir, page);
        match fs::read(&path) {
            Ok(data) if data.len() == raw => out.write_all(&data)?,
            Ok(data) => {
                pb.abandon();
                return Err(format!(
                    "{:?} holds {} bytes, expected a {}-byte raw page",
                    path,
                    data.len(),
                    raw
                )
                .into());
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound && fill => {
                pb.suspend(|| log::warn!("Page {} missing, filling with 0xFF", page));
                out.write_all(&erased)?;
                filled.push(page);
            }
            Err(e) => {
                pb.abandon();
                return Err(format!("{:?}: {}", path, e).into());
            }
        }
        pb.inc(1);
    }
    out.flush()?;
    pb.finish_with_message("done");

    if !filled.is_empty() {
        println!("Filled {} missing page(s)", filled.len());
    }
    println!(
        "Wrote {} bytes to {:?}",
        pages as u64 * raw as u64,
        output
    );

    Ok(filled)
}
