//! Batch writer: buffers homogeneous records and flushes them to the storage backend in
//! fixed-size chunks, one atomic commit per flush.

use crate::storage::{Insertable, StorageBackend};
use anyhow::{Context, Result};

/// Counters for one writer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub flushes: u64,
    /// Records handed to the backend.
    pub records: u64,
    /// Records the backend actually inserted (excludes ignored duplicates).
    pub inserted: u64,
    /// Size of every non-empty flush, in order.
    pub sizes: Vec<usize>,
}

impl FlushStats {
    pub fn ignored(&self) -> u64 {
        self.records.saturating_sub(self.inserted)
    }
}

/// Outcome of a flush that reached the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Flushed {
    pub records: usize,
    pub inserted: usize,
}

pub struct BatchWriter<T: Insertable> {
    threshold: usize,
    buf: Vec<T>,
    stats: FlushStats,
}

impl<T: Insertable> BatchWriter<T> {
    /// `threshold` is clamped to at least 1.
    pub fn new(threshold: usize) -> Self {
        let threshold = threshold.max(1);
        // Cap the up-front allocation; huge thresholds grow on demand.
        Self { threshold, buf: Vec::with_capacity(threshold.min(64 * 1024)), stats: FlushStats::default() }
    }

    pub fn threshold(&self) -> usize { self.threshold }
    pub fn pending(&self) -> usize { self.buf.len() }
    pub fn stats(&self) -> &FlushStats { &self.stats }

    /// Buffer `record`; flush when the buffer reaches the threshold.
    pub fn push<S: StorageBackend + ?Sized>(&mut self, store: &mut S, record: T) -> Result<Option<Flushed>> {
        self.buf.push(record);
        if self.buf.len() >= self.threshold {
            return self.flush(store);
        }
        Ok(None)
    }

    /// Buffer many records, flushing at every threshold crossing.
    pub fn extend<S, I>(&mut self, store: &mut S, records: I) -> Result<u64>
    where
        S: StorageBackend + ?Sized,
        I: IntoIterator<Item = T>,
    {
        let mut flushes = 0;
        for r in records {
            if self.push(store, r)?.is_some() {
                flushes += 1;
            }
        }
        Ok(flushes)
    }

    /// Write everything buffered as one batch. An empty buffer is a no-op that never
    /// touches the backend. On failure the buffer is kept intact.
    pub fn flush<S: StorageBackend + ?Sized>(&mut self, store: &mut S) -> Result<Option<Flushed>> {
        if self.buf.is_empty() {
            return Ok(None);
        }
        let records = self.buf.len();
        let inserted = T::insert_batch(store, &self.buf)
            .with_context(|| format!("flush {} rows into {}", records, T::TABLE))?;
        self.buf.clear();

        self.stats.flushes += 1;
        self.stats.records += records as u64;
        self.stats.inserted += inserted as u64;
        self.stats.sizes.push(records);

        let table = T::TABLE;
        let ignored = records.saturating_sub(inserted);
        if ignored > 0 {
            tracing::warn!(
                %table,
                ignored,
                "batch contained rows whose key already exists; they were not written"
            );
        }
        tracing::debug!(%table, records, inserted, "batch committed");
        Ok(Some(Flushed { records, inserted }))
    }

    /// End-of-stream flush of whatever remains, then the final counters.
    pub fn finish<S: StorageBackend + ?Sized>(mut self, store: &mut S) -> Result<FlushStats> {
        self.flush(store)?;
        Ok(self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Association, Item, Store, Transaction};
    use crate::storage::{SchemaMode, Table};
    use anyhow::bail;

    /// Backend that records the size of every association batch it receives.
    #[derive(Default)]
    struct RecordingStore {
        batches: Vec<usize>,
        fail_next: bool,
    }

    impl StorageBackend for RecordingStore {
        fn setup_schema(&mut self, _mode: SchemaMode) -> Result<()> { Ok(()) }
        fn insert_items(&mut self, items: &[Item]) -> Result<usize> { Ok(items.len()) }
        fn insert_stores(&mut self, stores: &[Store]) -> Result<usize> { Ok(stores.len()) }
        fn insert_transactions(&mut self, t: &[Transaction]) -> Result<usize> { Ok(t.len()) }
        fn insert_associations(&mut self, links: &[Association]) -> Result<usize> {
            if std::mem::take(&mut self.fail_next) {
                bail!("disk full");
            }
            self.batches.push(links.len());
            Ok(links.len())
        }
        fn count(&self, _table: Table) -> Result<u64> { Ok(0) }
        fn dangling_associations(&self) -> Result<u64> { Ok(0) }
    }

    fn link(n: usize) -> Association {
        Association { transaction_number: format!("INV-{n}"), store_number: 1, item_number: 2 }
    }

    #[test]
    fn threshold_two_five_records_three_flushes() {
        let mut store = RecordingStore::default();
        let mut w = BatchWriter::new(2);
        let flushes = w.extend(&mut store, (0..5).map(link)).unwrap();
        assert_eq!(flushes, 2);
        assert_eq!(w.pending(), 1);

        let stats = w.finish(&mut store).unwrap();
        assert_eq!(store.batches, vec![2, 2, 1]);
        assert_eq!(stats.flushes, 3);
        assert_eq!(stats.sizes, vec![2, 2, 1]);
        assert_eq!(stats.records, 5);
        assert_eq!(stats.ignored(), 0);
    }

    #[test]
    fn empty_flush_is_a_noop() {
        let mut store = RecordingStore::default();
        let mut w: BatchWriter<Association> = BatchWriter::new(2);
        assert_eq!(w.flush(&mut store).unwrap(), None);

        w.extend(&mut store, (0..4).map(link)).unwrap();
        assert_eq!(w.pending(), 0);
        let stats = w.finish(&mut store).unwrap();
        assert_eq!(store.batches, vec![2, 2]);
        assert_eq!(stats.flushes, 2);
    }

    #[test]
    fn failed_flush_keeps_the_buffer() {
        let mut store = RecordingStore { fail_next: true, ..Default::default() };
        let mut w = BatchWriter::new(10);
        w.push(&mut store, link(1)).unwrap();
        w.push(&mut store, link(2)).unwrap();

        let err = w.flush(&mut store).unwrap_err();
        assert!(format!("{err:#}").contains("disk full"));
        assert_eq!(w.pending(), 2);

        let flushed = w.flush(&mut store).unwrap();
        assert_eq!(flushed, Some(Flushed { records: 2, inserted: 2 }));
        assert_eq!(store.batches, vec![2]);
    }

    #[test]
    fn zero_threshold_is_clamped() {
        let w: BatchWriter<Association> = BatchWriter::new(0);
        assert_eq!(w.threshold(), 1);
    }
}
