//! Streaming access to the source CSV.
//!
//! Plain `.csv` files are read directly; files ending in `.zst` are decompressed on the
//! fly. The header is validated once, up front, and every data row is addressed by its
//! 0-based index (header excluded), which is what checkpoints record.

use crate::columns::HeaderIndex;
use crate::progress::ProgressReader;
use anyhow::{Context, Result};
use csv::StringRecord;
use indicatif::ProgressBar;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

pub struct CsvSource {
    path: PathBuf,
    header: HeaderIndex,
    reader: csv::Reader<Box<dyn Read>>,
    next_row: u64,
    unreadable_rows: u64,
    scratch: StringRecord,
}

/// Size of the source file on disk.
pub fn source_len(path: &Path) -> Result<u64> {
    Ok(fs::metadata(path).with_context(|| format!("stat source {}", path.display()))?.len())
}

fn is_zstd(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()).is_some_and(|e| e.eq_ignore_ascii_case("zst"))
}

impl CsvSource {
    /// Open `path` and validate its header against the required columns.
    pub fn open(path: &Path, read_buf_bytes: usize, pb: Option<ProgressBar>) -> Result<Self> {
        let f = File::open(path).with_context(|| format!("open source {}", path.display()))?;
        let counted = ProgressReader::new(f, pb);
        let raw: Box<dyn Read> = if is_zstd(path) {
            let mut dec = zstd::stream::read::Decoder::with_buffer(BufReader::with_capacity(read_buf_bytes, counted))
                .with_context(|| format!("zstd decoder for {}", path.display()))?;
            dec.window_log_max(31)?;
            Box::new(dec)
        } else {
            Box::new(counted)
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .buffer_capacity(read_buf_bytes)
            .from_reader(raw);
        let headers = reader
            .headers()
            .with_context(|| format!("read header of {}", path.display()))?
            .clone();
        let header = HeaderIndex::from_headers(&headers)
            .with_context(|| format!("validate header of {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            header,
            reader,
            next_row: 0,
            unreadable_rows: 0,
            scratch: StringRecord::new(),
        })
    }

    pub fn header(&self) -> &HeaderIndex {
        &self.header
    }

    /// Index the next row read will get.
    pub fn next_row(&self) -> u64 {
        self.next_row
    }

    /// Rows the CSV layer itself could not decode (e.g. invalid UTF-8). They are logged,
    /// counted and skipped; their index is still consumed.
    pub fn unreadable_rows(&self) -> u64 {
        self.unreadable_rows
    }

    /// Read up to `max` `(row index, record)` pairs into `out` (cleared first).
    /// An empty `out` means end of file.
    pub fn read_chunk(&mut self, max: usize, out: &mut Vec<(u64, StringRecord)>) -> Result<()> {
        out.clear();
        while out.len() < max {
            match self.read_one()? {
                Some(rec) => out.push(rec),
                None => break,
            }
        }
        Ok(())
    }

    /// Read past rows without returning them, up to (not including) row `until`.
    pub fn skip_to(&mut self, until: u64) -> Result<u64> {
        let mut skipped = 0;
        while self.next_row < until {
            if self.read_one()?.is_none() {
                break;
            }
            skipped += 1;
        }
        Ok(skipped)
    }

    fn read_one(&mut self) -> Result<Option<(u64, StringRecord)>> {
        loop {
            let idx = self.next_row;
            match self.reader.read_record(&mut self.scratch) {
                Ok(true) => {
                    self.next_row += 1;
                    return Ok(Some((idx, self.scratch.clone())));
                }
                Ok(false) => return Ok(None),
                Err(e) if e.is_io_error() => {
                    return Err(e).with_context(|| format!("read {} at row {}", self.path.display(), idx));
                }
                Err(e) => {
                    self.next_row += 1;
                    self.unreadable_rows += 1;
                    tracing::warn!(row = idx, error = %e, "skipping undecodable CSV row");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::Column;
    use std::io::Write;

    fn header_line() -> String {
        Column::ALL.iter().map(|c| format!("\"{}\"", c.name())).collect::<Vec<_>>().join(",")
    }

    fn row_line(invoice: &str) -> String {
        let mut cells = vec!["x".to_string(); Column::ALL.len()];
        cells[Column::InvoiceItemNumber as usize] = invoice.to_string();
        cells.join(",")
    }

    fn write_csv(path: &Path, rows: &[String]) {
        let mut f = File::create(path).unwrap();
        writeln!(f, "{}", header_line()).unwrap();
        for r in rows {
            writeln!(f, "{}", r).unwrap();
        }
    }

    #[test]
    fn reads_rows_in_chunks_with_indices() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sales.csv");
        write_csv(&path, &(0..5).map(|i| row_line(&format!("INV-{i}"))).collect::<Vec<_>>());

        let mut src = CsvSource::open(&path, 8 * 1024, None).unwrap();
        let mut chunk = Vec::new();
        src.read_chunk(3, &mut chunk).unwrap();
        assert_eq!(chunk.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![0, 1, 2]);
        let row = src.header().row(&chunk[2].1);
        assert_eq!(row.get(Column::InvoiceItemNumber), "INV-2");

        src.read_chunk(3, &mut chunk).unwrap();
        assert_eq!(chunk.len(), 2);
        src.read_chunk(3, &mut chunk).unwrap();
        assert!(chunk.is_empty());
        assert_eq!(src.next_row(), 5);
    }

    #[test]
    fn skip_to_consumes_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sales.csv");
        write_csv(&path, &(0..4).map(|i| row_line(&format!("INV-{i}"))).collect::<Vec<_>>());

        let mut src = CsvSource::open(&path, 8 * 1024, None).unwrap();
        assert_eq!(src.skip_to(3).unwrap(), 3);
        let mut chunk = Vec::new();
        src.read_chunk(10, &mut chunk).unwrap();
        assert_eq!(chunk.len(), 1);
        assert_eq!(chunk[0].0, 3);
        assert_eq!(src.skip_to(100).unwrap(), 0);
    }

    #[test]
    fn zstd_sources_are_decompressed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sales.csv.zst");
        let f = File::create(&path).unwrap();
        let mut enc = zstd::stream::write::Encoder::new(f, 3).unwrap();
        writeln!(enc, "{}", header_line()).unwrap();
        writeln!(enc, "{}", row_line("INV-Z")).unwrap();
        enc.finish().unwrap();

        let mut src = CsvSource::open(&path, 8 * 1024, None).unwrap();
        let mut chunk = Vec::new();
        src.read_chunk(10, &mut chunk).unwrap();
        assert_eq!(chunk.len(), 1);
        assert_eq!(src.header().row(&chunk[0].1).get(Column::InvoiceItemNumber), "INV-Z");
    }

    #[test]
    fn missing_columns_fail_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "Date,Store Number\n01/07/2015,1\n").unwrap();
        let err = CsvSource::open(&path, 8 * 1024, None).err().unwrap();
        assert!(format!("{err:#}").contains("Invoice/Item Number"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CsvSource::open(&dir.path().join("nope.csv"), 8 * 1024, None).is_err());
        assert!(source_len(&dir.path().join("nope.csv")).is_err());
    }
}
