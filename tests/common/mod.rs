#![allow(dead_code)]

use liquor_etl::storage::SqliteStore;
use liquor_etl::Column;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// One source row, starting from a well-formed default; override cells as needed.
#[derive(Clone, Debug)]
pub struct SaleRow {
    cells: Vec<String>,
}

impl SaleRow {
    pub fn new(invoice: &str, store: i64, item: i64) -> Self {
        let mut cells: Vec<String> = Column::ALL
            .iter()
            .map(|c| {
                match c {
                    Column::InvoiceItemNumber => invoice,
                    Column::Date => "01/07/2015",
                    Column::StoreNumber => "",
                    Column::StoreName => "Hy-Vee Food Store / Keokuk",
                    Column::Address => "3111 MAIN",
                    Column::City => "KEOKUK",
                    Column::ZipCode => "52632",
                    Column::StoreLocation => "3111 MAIN\nKEOKUK 52632\n(40.410963, -91.400287)",
                    Column::CountyNumber => "56",
                    Column::County => "Lee",
                    Column::Category => "1031080",
                    Column::CategoryName => "VODKA 80 PROOF",
                    Column::VendorNumber => "260",
                    Column::VendorName => "Diageo Americas",
                    Column::ItemNumber => "",
                    Column::ItemDescription => "Smirnoff Vodka 80 Prf",
                    Column::Pack => "12",
                    Column::BottleVolumeMl => "750",
                    Column::StateBottleCost => "$7.50",
                    Column::StateBottleRetail => "$11.25",
                    Column::BottlesSold => "12",
                    Column::SaleDollars => "$135.00",
                    Column::VolumeSoldLiters => "9.00",
                    Column::VolumeSoldGallons => "2.38",
                }
                .to_string()
            })
            .collect();
        cells[Column::StoreNumber as usize] = store.to_string();
        cells[Column::ItemNumber as usize] = item.to_string();
        Self { cells }
    }

    pub fn with(mut self, col: Column, value: &str) -> Self {
        self.cells[col as usize] = value.to_string();
        self
    }
}

/// Write a CSV with the full header (column order shuffled relative to `Column::ALL`,
/// to prove lookups go by name) and the given rows.
pub fn write_sales_csv(path: &Path, rows: &[SaleRow]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let order: Vec<usize> = (0..Column::ALL.len()).rev().collect();
    let mut w = csv::Writer::from_writer(File::create(path).unwrap());
    w.write_record(order.iter().map(|&i| Column::ALL[i].name())).unwrap();
    for r in rows {
        w.write_record(order.iter().map(|&i| r.cells[i].as_str())).unwrap();
    }
    w.flush().unwrap();
}

/// Fresh scratch directory that outlives the test (teardown is left to the OS).
pub fn scratch_dir() -> PathBuf {
    tempfile::tempdir().unwrap().into_path()
}

/// The 3-row fixture: two good rows sharing nothing, and one whose bottle cost lacks `$`.
/// Row 0: INV-1, store 2191, item 100
/// Row 1: INV-2, store 2192, item 200 (malformed "State Bottle Cost")
/// Row 2: INV-3, store 2193, item 300
pub fn make_sales_basic() -> PathBuf {
    let base = scratch_dir();
    let csv = base.join("Iowa_Liquor_Sales.csv");
    write_sales_csv(
        &csv,
        &[
            SaleRow::new("INV-1", 2191, 100),
            SaleRow::new("INV-2", 2192, 200).with(Column::StateBottleCost, "7.50"),
            SaleRow::new("INV-3", 2193, 300),
        ],
    );
    csv
}

/// `n` well-formed rows with distinct invoices, cycling over 3 stores and 2 items.
pub fn make_sales_rows(path: &Path, n: usize) {
    let rows: Vec<SaleRow> = (0..n)
        .map(|i| SaleRow::new(&format!("INV-{i}"), 2000 + (i % 3) as i64, 100 + (i % 2) as i64))
        .collect();
    write_sales_csv(path, &rows);
}

pub fn query_i64s(store: &SqliteStore, sql: &str) -> Vec<i64> {
    let mut stmt = store.connection().prepare(sql).unwrap();
    stmt.query_map([], |r| r.get(0)).unwrap().map(|r| r.unwrap()).collect()
}

pub fn query_strings(store: &SqliteStore, sql: &str) -> Vec<String> {
    let mut stmt = store.connection().prepare(sql).unwrap();
    stmt.query_map([], |r| r.get(0)).unwrap().map(|r| r.unwrap()).collect()
}

pub fn append_line(path: &Path, line: &str) {
    let mut f = fs::OpenOptions::new().append(true).open(path).unwrap();
    writeln!(f, "{}", line).unwrap();
}

/// In-memory sink for a thread-local tracing subscriber.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with warnings and above captured as plain text.
pub fn capture_warnings<R>(f: impl FnOnce() -> R) -> (R, String) {
    let sink = LogCapture::default();
    let writer = sink.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();
    let out = tracing::subscriber::with_default(subscriber, f);
    (out, sink.contents())
}
