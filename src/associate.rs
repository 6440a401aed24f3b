//! Second-pass extraction of `stores_items` join rows.
//!
//! Reads only the three key columns, so a row whose other fields are too broken for a
//! full `Transaction` still yields its association.

use crate::columns::{Column, RawRow};
use crate::model::Association;
use crate::parse::RowError;

pub fn extract_association(row: &RawRow<'_>) -> Result<Association, RowError> {
    let transaction_number = row.get(Column::InvoiceItemNumber).trim();
    if transaction_number.is_empty() {
        return Err(RowError::EmptyKey { column: Column::InvoiceItemNumber.name() });
    }
    Ok(Association {
        transaction_number: transaction_number.to_string(),
        store_number: key_number(row, Column::StoreNumber)?,
        item_number: key_number(row, Column::ItemNumber)?,
    })
}

fn key_number(row: &RawRow<'_>, col: Column) -> Result<i64, RowError> {
    let raw = row.get(col);
    raw.trim().parse().map_err(|_| RowError::InvalidNumber {
        column: col.name(),
        value: raw.to_string(),
    })
}
