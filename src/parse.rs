//! Row parser: one raw CSV record → typed `Item`, `Store` and `Transaction`.
//!
//! Pure functions only. A failure in any required field rejects the whole row with a
//! `RowError`; county number and store location are the two partial-failure fields
//! that degrade to `None` instead.

use crate::columns::{Column, RawRow};
use crate::model::{Item, ParsedRow, Store, Transaction};
use regex::Regex;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;
use time::macros::format_description;
use time::Date;

/// The one known malformed zip code in the source data, and its correction.
const MALFORMED_ZIP: &str = "712-2";
const MALFORMED_ZIP_FIXED: i64 = 51529;

/// Why a row was rejected.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RowError {
    #[error("column {column:?}: expected a number, got {value:?}")]
    InvalidNumber { column: &'static str, value: String },

    #[error("column {column:?}: expected a currency amount like \"$4.50\", got {value:?}")]
    InvalidCurrency { column: &'static str, value: String },

    #[error("column {column:?}: expected a MM/DD/YYYY date, got {value:?}")]
    InvalidDate { column: &'static str, value: String },

    #[error("column {column:?}: key is empty")]
    EmptyKey { column: &'static str },
}

/// Parse a full row into its three records.
pub fn parse_row(row: &RawRow<'_>) -> Result<ParsedRow, RowError> {
    let item = parse_item(row)?;
    let store = parse_store(row)?;
    let transaction = parse_transaction(row, item.number, store.number)?;
    Ok(ParsedRow { item, store, transaction })
}

pub fn parse_item(row: &RawRow<'_>) -> Result<Item, RowError> {
    Ok(Item {
        number: int_field(row, Column::ItemNumber)?,
        bottle_volume: float_field(row, Column::BottleVolumeMl)?,
        category: text_field(row, Column::Category),
        category_name: text_field(row, Column::CategoryName),
        description: text_field(row, Column::ItemDescription),
        pack: int_field(row, Column::Pack)?,
        vendor_name: text_field(row, Column::VendorName),
        vendor_number: int_field(row, Column::VendorNumber)?,
    })
}

pub fn parse_store(row: &RawRow<'_>) -> Result<Store, RowError> {
    let location = row.get(Column::StoreLocation).to_string();
    let coords = parse_location(location.trim());
    Ok(Store {
        number: int_field(row, Column::StoreNumber)?,
        address: text_field(row, Column::Address),
        city: text_field(row, Column::City),
        county: text_field(row, Column::County),
        county_number: parse_county_number(row.get(Column::CountyNumber)),
        longitude: coords.map(|(lon, _)| lon),
        latitude: coords.map(|(_, lat)| lat),
        location,
        name: text_field(row, Column::StoreName),
        zip_code: parse_zip_code(row.get(Column::ZipCode))
            .ok_or_else(|| invalid_number(Column::ZipCode, row.get(Column::ZipCode)))?,
    })
}

pub fn parse_transaction(row: &RawRow<'_>, item_number: i64, store_number: i64) -> Result<Transaction, RowError> {
    Ok(Transaction {
        number: key_field(row, Column::InvoiceItemNumber)?,
        bottle_cost: currency_field(row, Column::StateBottleCost)?,
        bottle_retail: currency_field(row, Column::StateBottleRetail)?,
        bottles_sold: int_field(row, Column::BottlesSold)?,
        date: parse_date(row.get(Column::Date)).ok_or_else(|| RowError::InvalidDate {
            column: Column::Date.name(),
            value: row.get(Column::Date).to_string(),
        })?,
        gallons_sold: float_field(row, Column::VolumeSoldGallons)?,
        liters_sold: float_field(row, Column::VolumeSoldLiters)?,
        total_sale: currency_field(row, Column::SaleDollars)?,
        item_number,
        store_number,
    })
}

// ----------------------------- Field parsers ------------------------------------

/// Strip a leading currency symbol and parse the remainder, e.g. `"$4.50"` → `4.5`.
/// A value without a leading symbol, or with nothing after it, is rejected.
pub fn parse_currency(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let mut chars = raw.chars();
    let symbol = chars.next()?;
    if !is_currency_symbol(symbol) {
        return None;
    }
    parse_finite(chars.as_str().trim())
}

fn is_currency_symbol(c: char) -> bool {
    !(c.is_alphanumeric() || c.is_whitespace() || matches!(c, '.' | '-' | '+' | ','))
}

/// Parse `month/day/year`, e.g. `"01/07/2015"`.
pub fn parse_date(raw: &str) -> Option<Date> {
    let fmt = format_description!("[month padding:none]/[day padding:none]/[year]");
    Date::parse(raw.trim(), &fmt).ok()
}

/// Zip codes are integers, except one known malformed literal that is patched.
pub fn parse_zip_code(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw == MALFORMED_ZIP {
        return Some(MALFORMED_ZIP_FIXED);
    }
    raw.parse().ok()
}

/// County numbers are often missing or junk in the source; those become `None`.
pub fn parse_county_number(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}

fn location_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\(\s*([-+]?\d+(?:\.\d+)?)\s*,\s*([-+]?\d+(?:\.\d+)?)\s*\)\s*$")
            .expect("location regex is valid")
    })
}

/// Extract `(longitude, latitude)` from `"<prefix>(<longitude>, <latitude>)"`.
pub fn parse_location(raw: &str) -> Option<(f64, f64)> {
    let caps = location_regex().captures(raw)?;
    let lon = caps.get(1)?.as_str().parse().ok()?;
    let lat = caps.get(2)?.as_str().parse().ok()?;
    Some((lon, lat))
}

// ----------------------------- Column helpers ------------------------------------

fn text_field(row: &RawRow<'_>, col: Column) -> String {
    row.get(col).trim().to_string()
}

fn key_field(row: &RawRow<'_>, col: Column) -> Result<String, RowError> {
    let v = row.get(col).trim();
    if v.is_empty() {
        return Err(RowError::EmptyKey { column: col.name() });
    }
    Ok(v.to_string())
}

fn int_field(row: &RawRow<'_>, col: Column) -> Result<i64, RowError> {
    let raw = row.get(col);
    parse_number::<i64>(raw).ok_or_else(|| invalid_number(col, raw))
}

fn float_field(row: &RawRow<'_>, col: Column) -> Result<f64, RowError> {
    let raw = row.get(col);
    parse_finite(raw.trim()).ok_or_else(|| invalid_number(col, raw))
}

fn currency_field(row: &RawRow<'_>, col: Column) -> Result<f64, RowError> {
    let raw = row.get(col);
    parse_currency(raw).ok_or_else(|| RowError::InvalidCurrency {
        column: col.name(),
        value: raw.to_string(),
    })
}

fn parse_number<T: FromStr>(raw: &str) -> Option<T> {
    raw.trim().parse().ok()
}

fn parse_finite(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn invalid_number(col: Column, raw: &str) -> RowError {
    RowError::InvalidNumber { column: col.name(), value: raw.to_string() }
}
