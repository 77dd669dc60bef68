//! File artifacts produced from a dump
//!
//! Every artifact is created (or truncated) and written through a buffered
//! writer that is flushed on every exit path, so a failed decode still
//! leaves the bytes produced so far on disk.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};
use std::vec::Vec;

use super::{DecodeError, DumpReader, ExtractProgress};
use crate::partition::{PartitionDescriptor, PartitionTable};

/// File name of the concatenated spare areas
pub const SPARE_FILE: &str = "oob.bin";

/// File name of the boot header copy
pub const HEADER_FILE: &str = "header.bin";

/// Which artifacts an extraction run produces
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Decode partitions
    pub partitions: bool,
    /// Restrict partition decoding to one name
    pub only: Option<std::string::String>,
    /// Write the spare areas
    pub spare: bool,
    /// Copy the boot header
    pub header: bool,
}

impl ExtractOptions {
    /// Every artifact
    pub fn all() -> Self {
        Self {
            partitions: true,
            only: None,
            spare: true,
            header: true,
        }
    }
}

/// One artifact written to disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Output path
    pub path: PathBuf,
    /// Bytes written
    pub bytes: u64,
}

/// Create `path` and fill it through `fill`
///
/// The writer is flushed whether or not `fill` succeeds. The error from
/// `fill` takes precedence over a flush error.
pub fn write_artifact<F>(path: &Path, fill: F) -> Result<Artifact, DecodeError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<u64, DecodeError>,
{
    let mut writer = BufWriter::new(File::create(path)?);
    let result = fill(&mut writer);
    let flushed = writer.flush();
    let bytes = result?;
    flushed?;

    log::info!("Wrote {} ({} bytes)", path.display(), bytes);
    Ok(Artifact {
        path: path.to_path_buf(),
        bytes,
    })
}

/// Decode one partition into `<out_dir>/<name>.img`
///
/// Nothing is created if the descriptor does not fit the dump.
pub fn extract_partition<R: Read + Seek>(
    reader: &mut DumpReader<R>,
    desc: &PartitionDescriptor,
    key: &[u8],
    out_dir: &Path,
    progress: &mut dyn ExtractProgress,
) -> Result<Artifact, DecodeError> {
    reader.check_partition(desc, key)?;
    let path = out_dir.join(desc.file_name());
    write_artifact(&path, |w| reader.decode_partition(desc, key, w, progress))
}

/// Write every spare area into `<out_dir>/oob.bin`
pub fn extract_spare_areas<R: Read + Seek>(
    reader: &mut DumpReader<R>,
    out_dir: &Path,
    progress: &mut dyn ExtractProgress,
) -> Result<Artifact, DecodeError> {
    let path = out_dir.join(SPARE_FILE);
    write_artifact(&path, |w| reader.extract_spare_areas(w, progress))
}

/// Copy the boot header into `<out_dir>/header.bin`
pub fn extract_header<R: Read + Seek>(
    reader: &mut DumpReader<R>,
    size: usize,
    out_dir: &Path,
) -> Result<Artifact, DecodeError> {
    reader.check_header(size)?;
    let path = out_dir.join(HEADER_FILE);
    write_artifact(&path, |w| reader.extract_header(w, size))
}

/// Produce the selected artifacts for a partition table
///
/// All selected partitions are checked before the first file is written.
pub fn extract_all<R: Read + Seek>(
    reader: &mut DumpReader<R>,
    table: &PartitionTable,
    options: &ExtractOptions,
    out_dir: &Path,
    progress: &mut dyn ExtractProgress,
) -> Result<Vec<Artifact>, DecodeError> {
    let key = &table.decode.key;

    let selected: Vec<&PartitionDescriptor> = if !options.partitions {
        Vec::new()
    } else if let Some(name) = &options.only {
        match table.find(name) {
            Some(p) => vec![p],
            None => {
                return Err(DecodeError::InvalidPartition {
                    name: name.clone(),
                    reason: "not in the partition table",
                })
            }
        }
    } else {
        table.partitions.iter().collect()
    };

    for desc in &selected {
        reader.check_partition(desc, key)?;
    }
    if options.header {
        reader.check_header(table.decode.header_size)?;
    }

    fs::create_dir_all(out_dir)?;

    let mut artifacts = Vec::new();
    for desc in selected {
        artifacts.push(extract_partition(reader, desc, key, out_dir, progress)?);
    }
    if options.spare {
        artifacts.push(extract_spare_areas(reader, out_dir, progress)?);
    }
    if options.header {
        artifacts.push(extract_header(reader, table.decode.header_size, out_dir)?);
    }
    Ok(artifacts)
}
