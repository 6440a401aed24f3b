//! Typed records produced by the row parser and written by the storage backend.

use time::Date;

/// A product, keyed by its item number.
#[derive(Clone, Debug, PartialEq)]
pub struct Item {
    pub number: i64,
    pub bottle_volume: f64, // milliliters
    pub category: String,
    pub category_name: String,
    pub description: String,
    pub pack: i64,
    pub vendor_name: String,
    pub vendor_number: i64,
}

/// A retail location, keyed by its store number.
#[derive(Clone, Debug, PartialEq)]
pub struct Store {
    pub number: i64,
    pub address: String,
    pub city: String,
    pub county: String,
    pub county_number: Option<i64>,
    pub location: String, // raw text, usually the address plus "(lon, lat)"
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub name: String,
    pub zip_code: i64,
}

/// One sales line. Not deduplicated: every accepted row yields one.
#[derive(Clone, Debug, PartialEq)]
pub struct Transaction {
    pub number: String, // "Invoice/Item Number", not purely numeric
    pub bottle_cost: f64,
    pub bottle_retail: f64,
    pub bottles_sold: i64,
    pub date: Date,
    pub gallons_sold: f64,
    pub liters_sold: f64,
    pub total_sale: f64, // dollars
    pub item_number: i64,
    pub store_number: i64,
}

/// A `stores_items` join row: which store sold which item in which transaction.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Association {
    pub transaction_number: String,
    pub store_number: i64,
    pub item_number: i64,
}

/// The three records a fully parsed CSV row produces.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedRow {
    pub item: Item,
    pub store: Store,
    pub transaction: Transaction,
}
