//! The fixed set of source columns and a header index that resolves them by name.
//!
//! Column order in the file is irrelevant; column *names* are load-bearing and must
//! match exactly (after trimming surrounding whitespace from the header cells).

use anyhow::{bail, Result};
use csv::StringRecord;
use std::fmt;

const COLUMN_COUNT: usize = 24;

/// Every column the pipeline reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Column {
    InvoiceItemNumber,
    Date,
    StoreNumber,
    StoreName,
    Address,
    City,
    ZipCode,
    StoreLocation,
    CountyNumber,
    County,
    Category,
    CategoryName,
    VendorNumber,
    VendorName,
    ItemNumber,
    ItemDescription,
    Pack,
    BottleVolumeMl,
    StateBottleCost,
    StateBottleRetail,
    BottlesSold,
    SaleDollars,
    VolumeSoldLiters,
    VolumeSoldGallons,
}

impl Column {
    pub const ALL: [Column; COLUMN_COUNT] = [
        Column::InvoiceItemNumber,
        Column::Date,
        Column::StoreNumber,
        Column::StoreName,
        Column::Address,
        Column::City,
        Column::ZipCode,
        Column::StoreLocation,
        Column::CountyNumber,
        Column::County,
        Column::Category,
        Column::CategoryName,
        Column::VendorNumber,
        Column::VendorName,
        Column::ItemNumber,
        Column::ItemDescription,
        Column::Pack,
        Column::BottleVolumeMl,
        Column::StateBottleCost,
        Column::StateBottleRetail,
        Column::BottlesSold,
        Column::SaleDollars,
        Column::VolumeSoldLiters,
        Column::VolumeSoldGallons,
    ];

    /// Header text as it appears in the source file.
    pub fn name(self) -> &'static str {
        match self {
            Column::InvoiceItemNumber => "Invoice/Item Number",
            Column::Date => "Date",
            Column::StoreNumber => "Store Number",
            Column::StoreName => "Store Name",
            Column::Address => "Address",
            Column::City => "City",
            Column::ZipCode => "Zip Code",
            Column::StoreLocation => "Store Location",
            Column::CountyNumber => "County Number",
            Column::County => "County",
            Column::Category => "Category",
            Column::CategoryName => "Category Name",
            Column::VendorNumber => "Vendor Number",
            Column::VendorName => "Vendor Name",
            Column::ItemNumber => "Item Number",
            Column::ItemDescription => "Item Description",
            Column::Pack => "Pack",
            Column::BottleVolumeMl => "Bottle Volume (ml)",
            Column::StateBottleCost => "State Bottle Cost",
            Column::StateBottleRetail => "State Bottle Retail",
            Column::BottlesSold => "Bottles Sold",
            Column::SaleDollars => "Sale (Dollars)",
            Column::VolumeSoldLiters => "Volume Sold (Liters)",
            Column::VolumeSoldGallons => "Volume Sold (Gallons)",
        }
    }

    #[inline]
    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Position of every required column in the source header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderIndex {
    positions: [usize; COLUMN_COUNT],
}

impl HeaderIndex {
    /// Resolve all required columns against `headers`. Fails listing every missing column.
    pub fn from_headers(headers: &StringRecord) -> Result<Self> {
        let trimmed: Vec<&str> = headers.iter().map(str::trim).collect();
        let mut positions = [0usize; COLUMN_COUNT];
        let mut missing = Vec::new();
        for col in Column::ALL {
            match trimmed.iter().position(|h| *h == col.name()) {
                Some(pos) => positions[col.slot()] = pos,
                None => missing.push(col.name()),
            }
        }
        if !missing.is_empty() {
            bail!("source header is missing required columns: {}", missing.join(", "));
        }
        Ok(Self { positions })
    }

    #[inline]
    pub fn position(&self, col: Column) -> usize {
        self.positions[col.slot()]
    }

    pub fn row<'a>(&'a self, record: &'a StringRecord) -> RawRow<'a> {
        RawRow { index: self, record }
    }
}

/// One CSV record viewed through a validated header.
#[derive(Clone, Copy, Debug)]
pub struct RawRow<'a> {
    index: &'a HeaderIndex,
    record: &'a StringRecord,
}

impl<'a> RawRow<'a> {
    /// Raw cell text. Short records (fewer cells than the header) read as empty.
    #[inline]
    pub fn get(&self, col: Column) -> &'a str {
        self.record.get(self.index.position(col)).unwrap_or("")
    }

    pub fn record(&self) -> &'a StringRecord {
        self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_header() -> StringRecord {
        StringRecord::from(Column::ALL.iter().rev().map(|c| c.name()).collect::<Vec<_>>())
    }

    #[test]
    fn resolves_columns_by_name_not_position() {
        let idx = HeaderIndex::from_headers(&full_header()).unwrap();
        assert_eq!(idx.position(Column::VolumeSoldGallons), 0);
        assert_eq!(idx.position(Column::InvoiceItemNumber), Column::ALL.len() - 1);
    }

    #[test]
    fn header_cells_are_trimmed() {
        let mut names: Vec<String> = Column::ALL.iter().map(|c| c.name().to_string()).collect();
        names[3] = format!("  {} ", names[3]);
        let idx = HeaderIndex::from_headers(&StringRecord::from(names)).unwrap();
        assert_eq!(idx.position(Column::StoreName), 3);
    }

    #[test]
    fn missing_columns_are_reported() {
        let names: Vec<&str> = Column::ALL
            .iter()
            .filter(|c| !matches!(c, Column::ZipCode | Column::Pack))
            .map(|c| c.name())
            .collect();
        let err = HeaderIndex::from_headers(&StringRecord::from(names)).unwrap_err().to_string();
        assert!(err.contains("Zip Code"), "{err}");
        assert!(err.contains("Pack"), "{err}");
    }

    #[test]
    fn short_records_read_as_empty() {
        let idx = HeaderIndex::from_headers(&full_header()).unwrap();
        let rec = StringRecord::from(vec!["1.5"]);
        let row = idx.row(&rec);
        assert_eq!(row.get(Column::VolumeSoldGallons), "1.5");
        assert_eq!(row.get(Column::Date), "");
    }
}
