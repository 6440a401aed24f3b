mod config;
mod columns;
mod model;
mod parse;
mod dedupe;
mod associate;

mod batch;
mod cancel;
mod checkpoint;
mod progress;
mod source;
mod util;
mod pipeline;

pub mod storage;

pub use crate::config::{expand_home, BuildOptions, DEFAULT_BATCH_SIZE, DEFAULT_DATABASE, DEFAULT_SOURCE};
pub use crate::columns::{Column, HeaderIndex, RawRow};
pub use crate::model::{Association, Item, ParsedRow, Store, Transaction};
pub use crate::pipeline::{BuildReport, LiquorETL, Stage};

// Row-level parsing, exposed for reuse and for callers that parse rows themselves.
pub use crate::parse::{
    parse_county_number, parse_currency, parse_date, parse_item, parse_location, parse_row, parse_store,
    parse_transaction, parse_zip_code, RowError,
};
pub use crate::associate::extract_association;
pub use crate::dedupe::EntityDeduplicator;

// Batching, resumability and cancellation.
pub use crate::batch::{BatchWriter, FlushStats, Flushed};
pub use crate::checkpoint::{Checkpoint, Pass};
pub use crate::cancel::CancelToken;

pub use crate::source::{source_len, CsvSource};
pub use crate::progress::{make_progress_bar_labeled, ProgressReader};
pub use crate::util::init_tracing_once;
