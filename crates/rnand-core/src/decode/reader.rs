//! Random access to the page records of a dump

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::vec;
use std::vec::Vec;

use super::{check_key, decode_page, DecodeError};
use crate::geometry::Geometry;
use crate::partition::PartitionDescriptor;

/// Progress callbacks for long extraction passes
pub trait ExtractProgress {
    /// Called before the first page with the number of pages to process
    fn started(&mut self, label: &str, total_pages: u64);

    /// Called after each page
    fn advanced(&mut self, pages_done: u64);

    /// Called when the pass ends successfully
    fn finished(&mut self);
}

/// A no-op progress reporter
pub struct NoProgress;

impl ExtractProgress for NoProgress {
    fn started(&mut self, _label: &str, _total_pages: u64) {}
    fn advanced(&mut self, _pages_done: u64) {}
    fn finished(&mut self) {}
}

/// Reader over the raw page records of a dump
pub struct DumpReader<R> {
    inner: R,
    geometry: Geometry,
    len: u64,
}

impl DumpReader<BufReader<File>> {
    /// Open a dump file
    pub fn open(path: impl AsRef<Path>, geometry: Geometry) -> Result<Self, DecodeError> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file), geometry)
    }
}

impl<R: Read + Seek> DumpReader<R> {
    /// Wrap a dump stream
    ///
    /// A trailing partial record is reported once and otherwise ignored.
    pub fn new(mut inner: R, geometry: Geometry) -> Result<Self, DecodeError> {
        geometry.validate()?;
        let len = inner.seek(SeekFrom::End(0))?;
        let raw = geometry.raw_page_size() as u64;
        let partial = len % raw;
        if partial != 0 {
            log::warn!(
                "dump: {} trailing bytes do not form a complete {}-byte page record",
                partial,
                raw
            );
        }
        Ok(Self {
            inner,
            geometry,
            len,
        })
    }

    /// Dump geometry
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Dump length in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the dump is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of complete page records
    pub fn page_count(&self) -> u32 {
        let pages = self.len / self.geometry.raw_page_size() as u64;
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    /// Release the underlying stream
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Error for a page that has no complete record
    fn missing_page(&self, page: u32) -> DecodeError {
        let raw = self.geometry.raw_page_size();
        let offset = self.geometry.page_offset(page);
        if offset < self.len {
            DecodeError::TruncatedPage {
                page,
                expected: raw,
                got: (self.len - offset) as usize,
            }
        } else {
            DecodeError::PageOutOfRange {
                page,
                page_count: self.page_count(),
            }
        }
    }

    /// Read a full page record (data + spare area)
    pub fn read_raw_page(&mut self, page: u32) -> Result<Vec<u8>, DecodeError> {
        if page >= self.page_count() {
            return Err(self.missing_page(page));
        }
        let mut buf = vec![0u8; self.geometry.raw_page_size()];
        self.inner
            .seek(SeekFrom::Start(self.geometry.page_offset(page)))?;
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Read a page, optionally without its spare area
    pub fn read_page(&mut self, page: u32, strip_spare: bool) -> Result<Vec<u8>, DecodeError> {
        let mut buf = self.read_raw_page(page)?;
        if strip_spare {
            buf.truncate(self.geometry.page_size);
        }
        Ok(buf)
    }

    /// Read only the spare area of a page
    pub fn read_spare(&mut self, page: u32) -> Result<Vec<u8>, DecodeError> {
        let buf = self.read_raw_page(page)?;
        Ok(buf[self.geometry.page_size..].to_vec())
    }

    /// Read and decode the data part of a page
    pub fn decode_page(&mut self, page: u32, key: &[u8]) -> Result<Vec<u8>, DecodeError> {
        check_key(key, self.geometry.page_size)?;
        let data = self.read_page(page, true)?;
        Ok(decode_page(&data, key))
    }

    /// Check a descriptor and key against this dump
    pub fn check_partition(&self, desc: &PartitionDescriptor, key: &[u8]) -> Result<(), DecodeError> {
        desc.validate()?;
        check_key(key, self.geometry.page_size)?;
        if desc.end_page > self.page_count() {
            return Err(self.missing_page(self.page_count().max(desc.start_page)));
        }
        Ok(())
    }

    /// Check that the dump holds at least `size` header bytes
    pub fn check_header(&self, size: usize) -> Result<(), DecodeError> {
        if self.len < size as u64 {
            return Err(DecodeError::TruncatedHeader {
                expected: size,
                got: self.len,
            });
        }
        Ok(())
    }

    /// Decode pages `[start_page, end_page)` of a partition into `out`
    ///
    /// The descriptor and key are checked against the dump before anything
    /// is written. Returns the number of bytes written.
    pub fn decode_partition<W: Write>(
        &mut self,
        desc: &PartitionDescriptor,
        key: &[u8],
        out: &mut W,
        progress: &mut dyn ExtractProgress,
    ) -> Result<u64, DecodeError> {
        self.check_partition(desc, key)?;

        log::debug!(
            "dump: decoding {} pages [{}, {})",
            desc.name,
            desc.start_page,
            desc.end_page
        );
        progress.started(&desc.name, desc.page_count() as u64);

        let mut written = 0u64;
        for (i, page) in (desc.start_page..desc.end_page).enumerate() {
            let data = self.read_page(page, true)?;
            let decoded = decode_page(&data, key);
            out.write_all(&decoded)?;
            written += decoded.len() as u64;
            progress.advanced(i as u64 + 1);
        }

        progress.finished();
        Ok(written)
    }

    /// Write the spare area of every page to `out`, in page order
    pub fn extract_spare_areas<W: Write>(
        &mut self,
        out: &mut W,
        progress: &mut dyn ExtractProgress,
    ) -> Result<u64, DecodeError> {
        let pages = self.page_count();
        progress.started("spare areas", pages as u64);

        let mut written = 0u64;
        for page in 0..pages {
            let spare = self.read_spare(page)?;
            out.write_all(&spare)?;
            written += spare.len() as u64;
            progress.advanced(page as u64 + 1);
        }

        progress.finished();
        Ok(written)
    }

    /// Copy the first `size` bytes of the dump to `out`
    pub fn extract_header<W: Write>(&mut self, out: &mut W, size: usize) -> Result<u64, DecodeError> {
        self.check_header(size)?;
        self.inner.seek(SeekFrom::Start(0))?;
        let copied = io::copy(&mut (&mut self.inner).take(size as u64), out)?;
        Ok(copied)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::decode::DEFAULT_KEY;
    use std::io::Cursor;

    // 32 data bytes + 8 spare bytes per page, 4 pages per block
    pub(crate) const SMALL: Geometry = Geometry {
        page_size: 32,
        oob_size: 8,
        pages_per_block: 4,
        block_count: 4,
        addr_cycles: 4,
        bits_per_cell: 1,
    };

    /// Dump whose page `n` holds data bytes `n` and spare bytes `0xA0 | n`
    pub(crate) fn synthetic_dump(pages: u32) -> Vec<u8> {
        let mut dump = Vec::new();
        for n in 0..pages {
            dump.extend(std::iter::repeat(n as u8).take(SMALL.page_size));
            dump.extend(std::iter::repeat(0xA0 | n as u8).take(SMALL.oob_size));
        }
        dump
    }

    #[test]
    fn test_page_records() {
        let mut reader = DumpReader::new(Cursor::new(synthetic_dump(6)), SMALL).unwrap();
        assert_eq!(reader.page_count(), 6);
        assert_eq!(reader.len(), 240);

        let raw = reader.read_raw_page(3).unwrap();
        assert_eq!(raw.len(), 40);
        assert_eq!(reader.read_page(3, true).unwrap(), vec![3u8; 32]);
        assert_eq!(reader.read_spare(3).unwrap(), vec![0xA3u8; 8]);
        assert!(matches!(
            reader.read_raw_page(6),
            Err(DecodeError::PageOutOfRange { page: 6, page_count: 6 })
        ));
    }

    #[test]
    fn test_trailing_partial_record() {
        let mut dump = synthetic_dump(2);
        dump.extend_from_slice(&[0u8; 10]);
        let mut reader = DumpReader::new(Cursor::new(dump), SMALL).unwrap();
        assert_eq!(reader.page_count(), 2);
        assert!(matches!(
            reader.read_raw_page(2),
            Err(DecodeError::TruncatedPage {
                page: 2,
                expected: 40,
                got: 10
            })
        ));
    }

    #[test]
    fn test_decode_partition_size_and_order() {
        let mut reader = DumpReader::new(Cursor::new(synthetic_dump(8)), SMALL).unwrap();
        let desc = PartitionDescriptor::new(0, "part", 2, 5);
        let mut out = Vec::new();
        let written = reader
            .decode_partition(&desc, &DEFAULT_KEY, &mut out, &mut NoProgress)
            .unwrap();
        assert_eq!(written, 3 * 32);
        assert_eq!(out.len(), 3 * 32);
        for (i, page) in (2..5u32).enumerate() {
            let expected = decode_page(&[page as u8; 32], &DEFAULT_KEY);
            assert_eq!(&out[i * 32..(i + 1) * 32], &expected[..]);
        }
    }

    #[test]
    fn test_empty_partition() {
        let mut reader = DumpReader::new(Cursor::new(synthetic_dump(2)), SMALL).unwrap();
        let desc = PartitionDescriptor::new(0, "empty", 1, 1);
        let mut out = Vec::new();
        assert_eq!(
            reader
                .decode_partition(&desc, &DEFAULT_KEY, &mut out, &mut NoProgress)
                .unwrap(),
            0
        );
        assert!(out.is_empty());
    }

    #[test]
    fn test_partition_checks_before_writing() {
        let mut reader = DumpReader::new(Cursor::new(synthetic_dump(4)), SMALL).unwrap();
        let mut out = Vec::new();

        let past_end = PartitionDescriptor::new(0, "big", 2, 9);
        assert!(matches!(
            reader.decode_partition(&past_end, &DEFAULT_KEY, &mut out, &mut NoProgress),
            Err(DecodeError::PageOutOfRange { page: 4, .. })
        ));

        let reversed = PartitionDescriptor::new(0, "rev", 3, 1);
        assert!(matches!(
            reader.decode_partition(&reversed, &DEFAULT_KEY, &mut out, &mut NoProgress),
            Err(DecodeError::InvalidPartition { .. })
        ));

        let ok = PartitionDescriptor::new(0, "ok", 0, 1);
        assert!(matches!(
            reader.decode_partition(&ok, &[1, 2, 3], &mut out, &mut NoProgress),
            Err(DecodeError::InvalidKeyLength { len: 3, .. })
        ));

        assert!(out.is_empty());
    }

    #[test]
    fn test_spare_areas_in_page_order() {
        let mut reader = DumpReader::new(Cursor::new(synthetic_dump(3)), SMALL).unwrap();
        let mut out = Vec::new();
        assert_eq!(reader.extract_spare_areas(&mut out, &mut NoProgress).unwrap(), 24);
        let mut expected = vec![0xA0u8; 8];
        expected.extend_from_slice(&[0xA1; 8]);
        expected.extend_from_slice(&[0xA2; 8]);
        assert_eq!(out, expected);
    }

    #[test]
    fn test_header_is_verbatim_prefix() {
        let dump = synthetic_dump(4);
        let mut reader = DumpReader::new(Cursor::new(dump.clone()), SMALL).unwrap();
        let mut out = Vec::new();
        assert_eq!(reader.extract_header(&mut out, 100).unwrap(), 100);
        assert_eq!(out, &dump[..100]);

        assert!(matches!(
            reader.extract_header(&mut Vec::new(), 1000),
            Err(DecodeError::TruncatedHeader {
                expected: 1000,
                got: 160
            })
        ));
    }

    #[test]
    fn test_progress_reports_every_page() {
        #[derive(Default)]
        struct Recorder {
            total: u64,
            last: u64,
            done: bool,
        }
        impl ExtractProgress for Recorder {
            fn started(&mut self, _label: &str, total_pages: u64) {
                self.total = total_pages;
            }
            fn advanced(&mut self, pages_done: u64) {
                self.last = pages_done;
            }
            fn finished(&mut self) {
                self.done = true;
            }
        }

        let mut reader = DumpReader::new(Cursor::new(synthetic_dump(5)), SMALL).unwrap();
        let mut rec = Recorder::default();
        reader.extract_spare_areas(&mut Vec::new(), &mut rec).unwrap();
        assert_eq!((rec.total, rec.last, rec.done), (5, 5, true));
    }
}
