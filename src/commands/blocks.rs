//! Block dump command

use rnand_core::bus::NandBus;
use rnand_core::geometry::Geometry;
use rnand_core::protocol::NandDevice;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::ops::Range;
use std::path::Path;

use super::progress::create_page_bar;

/// Resolve `[start, end)` against the device, `end` defaulting to the last block
pub fn block_range(
    geometry: &Geometry,
    start: u32,
    end: Option<u32>,
) -> Result<Range<u32>, rnand_core::Error> {
    let end = end.unwrap_or(geometry.block_count);
    if end > geometry.block_count {
        return Err(rnand_core::Error::BlockOutOfRange { block: end - 1 });
    }
    if start >= end {
        return Err(rnand_core::Error::InvalidParameter);
    }
    Ok(start..end)
}

/// Read whole blocks and append their data to `output`
///
/// Returns the bad blocks found. Their data is only written in `raw` mode.
pub fn run_dump_blocks<B: NandBus>(
    device: &mut NandDevice<B>,
    output: &Path,
    range: Range<u32>,
    raw: bool,
    strip_spare: bool,
) -> Result<Vec<u32>, Box<dyn std::error::Error>> {
    let file = OpenOptions::new().create(true).append(true).open(output)?;
    let mut out = BufWriter::new(file);

    println!(
        "Dumping blocks {}..{} to {:?}{}{}",
        range.start,
        range.end,
        output,
        if raw { " (raw)" } else { "" },
        if strip_spare { " (no spare)" } else { "" }
    );

    let mut bad_blocks = Vec::new();
    let pb = create_page_bar(range.len() as u64, "Dumping blocks");

    for block in range {
        let data = match device.read_sequential_block(block, strip_spare, raw) {
            Ok(data) => data,
            Err(e) => {
                pb.abandon_with_message(format!("failed at block {}", block));
                out.flush()?;
                return Err(e.into());
            }
        };
        if data.bad {
            bad_blocks.push(block);
        }
        out.write_all(&data.data)?;
        pb.inc(1);
    }
    out.flush()?;
    pb.finish_with_message("done");

    if !bad_blocks.is_empty() {
        let verb = if raw { "kept" } else { "skipped" };
        println!("Bad blocks ({}): {:?}", verb, bad_blocks);
    }

    Ok(bad_blocks)
}
