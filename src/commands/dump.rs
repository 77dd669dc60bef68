//! Page dump commands
//!
//! Every page goes through the consensus read. A page that never reads the
//! same twice is recorded in a bad-page log instead of aborting the run;
//! transport failures abort.

use rnand_core::bus::NandBus;
use rnand_core::geometry::Geometry;
use rnand_core::protocol::NandDevice;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};

use super::progress::create_page_bar;

/// Name of the bad-page log inside a per-page directory
pub const BAD_PAGES_FILE: &str = "bad_pages.log";

/// Summary of a dump run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DumpReport {
    /// Pages written (or already present)
    pub pages: u32,
    /// Pages skipped because their file already existed
    pub skipped: u32,
    /// Pages that failed consensus
    pub bad_pages: Vec<u32>,
}

/// Resolve `[start, end)` against the device, `end` defaulting to the last page
pub fn page_range(
    geometry: &Geometry,
    start: u32,
    end: Option<u32>,
) -> Result<Range<u32>, rnand_core::Error> {
    let end = end.unwrap_or_else(|| geometry.page_count());
    if end > geometry.page_count() {
        return Err(rnand_core::Error::PageOutOfRange { page: end - 1 });
    }
    if start >= end {
        return Err(rnand_core::Error::InvalidParameter);
    }
    Ok(start..end)
}

/// Default bad-page log path for a dump file
pub fn default_bad_log(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".bad_pages.log");
    PathBuf::from(name)
}

/// Dump a page range into one raw file
///
/// Failed pages are written as 0xFF so the offsets of later pages stay
/// aligned.
pub fn run_dump<B: NandBus>(
    device: &mut NandDevice<B>,
    output: &Path,
    range: Range<u32>,
    bad_log: &Path,
) -> Result<DumpReport, Box<dyn std::error::Error>> {
    let geometry = *device.geometry();
    let erased = vec![0xFF; geometry.raw_page_size()];

    println!(
        "Dumping pages {}..{} ({} bytes each) to {:?}",
        range.start,
        range.end,
        geometry.raw_page_size(),
        output
    );

    let mut out = BufWriter::new(File::create(output)?);
    let mut report = DumpReport::default();
    let pb = create_page_bar(range.len() as u64, "Dumping");

    for page in range {
        match device.read_page_confirmed(page) {
            Ok(buf) => out.write_all(&buf.data)?,
            Err(e @ rnand_core::Error::ConsensusFailure { .. }) => {
                pb.suspend(|| log::warn!("{}", e));
                out.write_all(&erased)?;
                report.bad_pages.push(page);
            }
            Err(e) => {
                pb.abandon_with_message(format!("failed at page {}", page));
                out.flush()?;
                return Err(e.into());
            }
        }
        report.pages += 1;
        pb.inc(1);
    }
    out.flush()?;
    pb.finish_with_message("done");

    if !report.bad_pages.is_empty() {
        write_bad_pages(bad_log, &report.bad_pages, false)?;
        println!(
            "{} page(s) failed consensus, listed in {:?}",
            report.bad_pages.len(),
            bad_log
        );
    } else {
        remove_stale_log(bad_log)?;
    }
    println!("Wrote {} pages to {:?}", report.pages, output);

    Ok(report)
}

/// Dump a page range into one `<page>.bin` file per page
///
/// Pages whose file already exists are skipped, so an interrupted run can
/// be resumed. Consensus failures are appended to `bad_pages.log` in the
/// same directory.
pub fn run_dump_pages<B: NandBus>(
    device: &mut NandDevice<B>,
    dir: &Path,
    range: Range<u32>,
) -> Result<DumpReport, Box<dyn std::error::Error>> {
    fs::create_dir_all(dir)?;

    println!(
        "Dumping pages {}..{} into {:?}",
        range.start, range.end, dir
    );

    let mut report = DumpReport::default();
    let pb = create_page_bar(range.len() as u64, "Dumping");

    for page in range {
        let path = page_file(dir, page);
        if path.exists() {
            report.skipped += 1;
        } else {
            match device.read_page_confirmed(page) {
                Ok(buf) => write_page_file(&path, &buf.data)?,
                Err(e @ rnand_core::Error::ConsensusFailure { .. }) => {
                    pb.suspend(|| log::warn!("{}", e));
                    write_bad_pages(&dir.join(BAD_PAGES_FILE), &[page], true)?;
                    report.bad_pages.push(page);
                }
                Err(e) => {
                    pb.abandon_with_message(format!("failed at page {}", page));
                    return Err(e.into());
                }
            }
        }
        report.pages += 1;
        pb.inc(1);
    }
    pb.finish_with_message("done");

    if report.skipped > 0 {
        println!("Skipped {} page(s) already on disk", report.skipped);
    }
    if !report.bad_pages.is_empty() {
        println!(
            "{} page(s) failed consensus, appended to {:?}",
            report.bad_pages.len(),
            dir.join(BAD_PAGES_FILE)
        );
    }

    Ok(report)
}

/// Path of the file holding `page` in a per-page directory
pub fn page_file(dir: &Path, page: u32) -> PathBuf {
    dir.join(format!("{}.bin", page))
}

// Written under a temporary name first so an interrupted write is never
// mistaken for a finished page on resume.
fn write_page_file(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("bin.part");
    fs::write(&tmp, data)?;
    fs::rename(&tmp, path)
}

/// Remove a bad-page log left by an earlier run
fn remove_stale_log(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            log::info!("Removed stale bad-page log {:?}", path);
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn write_bad_pages(path: &Path, pages: &[u32], append: bool) -> std::io::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(path)?;
    let mut out = BufWriter::new(file);
    for page in pages {
        writeln!(out, "{}", page)?;
    }
    out.flush()
}

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::*;
    use crate::commands::tests::{small_device, small_image, unique_root, SMALL_PROFILE};

    #[test]
    fn test_page_range() {
        let g = SMALL_PROFILE.geometry;
        assert_eq!(page_range(&g, 0, None).unwrap(), 0..32);
        assert_eq!(page_range(&g, 4, Some(8)).unwrap(), 4..8);
        assert!(page_range(&g, 8, Some(8)).is_err());
        assert!(matches!(
            page_range(&g, 0, Some(33)),
            Err(rnand_core::Error::PageOutOfRange { page: 32 })
        ));
    }

    #[test]
    fn test_dump_file() {
        let root = unique_root("dump-file");
        fs::create_dir_all(&root).unwrap();
        let output = root.join("nand.bin");
        let log = default_bad_log(&output);

        let mut device = small_device(0.0);
        let report = run_dump(&mut device, &output, 0..32, &log).unwrap();
        assert_eq!(report.pages, 32);
        assert!(report.bad_pages.is_empty());
        assert_eq!(fs::read(&output).unwrap(), small_image());
        assert!(!log.exists());

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_clean_dump_removes_old_log() {
        let root = unique_root("dump-stale-log");
        fs::create_dir_all(&root).unwrap();
        let output = root.join("nand.bin");
        let log = default_bad_log(&output);
        fs::write(&log, "2\n3\n").unwrap();

        let mut device = small_device(0.0);
        let report = run_dump(&mut device, &output, 0..4, &log).unwrap();
        assert!(report.bad_pages.is_empty());
        assert!(!log.exists());

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_dump_file_fills_failed_pages() {
        let root = unique_root("dump-noisy");
        fs::create_dir_all(&root).unwrap();
        let output = root.join("nand.bin");
        let log = default_bad_log(&output);

        let mut device = small_device(1.0);
        let report = run_dump(&mut device, &output, 2..4, &log).unwrap();
        assert_eq!(report.bad_pages, vec![2, 3]);

        let raw = SMALL_PROFILE.geometry.raw_page_size();
        let data = fs::read(&output).unwrap();
        assert_eq!(data.len(), 2 * raw);
        assert!(data.iter().all(|&b| b == 0xFF));
        assert_eq!(fs::read_to_string(&log).unwrap(), "2\n3\n");

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_dump_pages_resumes() {
        let root = unique_root("dump-pages");
        let raw = SMALL_PROFILE.geometry.raw_page_size();
        let image = small_image();

        fs::create_dir_all(&root).unwrap();
        fs::write(page_file(&root, 1), b"kept").unwrap();

        let mut device = small_device(0.0);
        let report = run_dump_pages(&mut device, &root, 0..4).unwrap();
        assert_eq!(report.pages, 4);
        assert_eq!(report.skipped, 1);

        assert_eq!(fs::read(page_file(&root, 0)).unwrap(), &image[..raw]);
        assert_eq!(fs::read(page_file(&root, 1)).unwrap(), b"kept");
        assert_eq!(
            fs::read(page_file(&root, 3)).unwrap(),
            &image[3 * raw..4 * raw]
        );
        assert!(!root.join(BAD_PAGES_FILE).exists());

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_dump_pages_logs_failures() {
        let root = unique_root("dump-pages-bad");

        let mut device = small_device(1.0);
        let report = run_dump_pages(&mut device, &root, 5..7).unwrap();
        assert_eq!(report.bad_pages, vec![5, 6]);
        assert!(!page_file(&root, 5).exists());

        let report = run_dump_pages(&mut device, &root, 7..8).unwrap();
        assert_eq!(report.bad_pages, vec![7]);
        assert_eq!(
            fs::read_to_string(root.join(BAD_PAGES_FILE)).unwrap(),
            "5\n6\n7\n"
        );

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_dump_aborts_on_disconnect() {
        let root = unique_root("dump-disconnect");
        fs::create_dir_all(&root).unwrap();
        let output = root.join("nand.bin");

        let mut device = small_device(0.0);
        device.bus_mut().disconnect_after(200);
        let err = run_dump(&mut device, &output, 0..32, &default_bad_log(&output)).unwrap_err();
        assert!(err.to_string().contains("transport"));

        let _ = fs::remove_dir_all(&root);
    }
}
