use crate::associate::extract_association;
use crate::batch::BatchWriter;
use crate::cancel::CancelToken;
use crate::checkpoint::{Checkpoint, Pass};
use crate::config::BuildOptions;
use crate::dedupe::EntityDeduplicator;
use crate::model::{Association, Item, ParsedRow, Store, Transaction};
use crate::parse::{parse_row, RowError};
use crate::progress::{make_progress_bar_labeled, pass_label};
use crate::source::{source_len, CsvSource};
use crate::storage::{Insertable, SchemaMode, SqliteStore, StorageBackend};
use crate::util::init_tracing_once;
use anyhow::{bail, Context, Result};
use indicatif::ProgressBar;
use rayon::prelude::*;
use std::fmt;
use std::path::Path;

/// Where a build is in its linear life cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Init,
    SchemaReady,
    Pass1Scanning,
    Pass1FlushingEntities,
    Pass2Scanning,
    Pass2Flushing,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Init => "init",
            Stage::SchemaReady => "schema setup",
            Stage::Pass1Scanning => "pass 1 (scanning)",
            Stage::Pass1FlushingEntities => "pass 1 (flushing entities)",
            Stage::Pass2Scanning => "pass 2 (scanning)",
            Stage::Pass2Flushing => "pass 2 (flushing)",
            Stage::Done => "done",
        })
    }
}

/// Summary of a completed build.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Data rows read in pass 1 (header excluded).
    pub rows_read: u64,
    /// Pass 1 rows rejected by the row parser or the CSV decoder.
    pub rows_skipped: u64,
    /// Pass 2 rows whose association keys could not be parsed.
    pub association_rows_skipped: u64,
    pub items_written: u64,
    pub stores_written: u64,
    pub transactions_written: u64,
    /// Transactions dropped because an earlier row already used the same number.
    pub duplicate_transactions: u64,
    pub associations_written: u64,
    pub duplicate_associations: u64,
    /// `stores_items` rows pointing at a transaction, store or item that pass 1 rejected.
    pub dangling_associations: u64,
    pub transaction_flushes: u64,
    pub association_flushes: u64,
    /// Checkpoint the build resumed from, if any.
    pub resumed_from: Option<Checkpoint>,
}

#[derive(Clone, Default)]
pub struct LiquorETL {
    pub(crate) opts: BuildOptions,
    cancel: CancelToken,
}

impl LiquorETL {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_options(opts: BuildOptions) -> Self {
        Self { opts, cancel: CancelToken::new() }
    }

    pub fn options(&self) -> &BuildOptions {
        &self.opts
    }

    // -------- Builder methods --------
    pub fn source(mut self, path: impl AsRef<Path>) -> Self { self.opts = self.opts.with_source(path); self }
    pub fn database(mut self, path: impl AsRef<Path>) -> Self { self.opts = self.opts.with_database(path); self }
    pub fn echo(mut self, yes: bool) -> Self { self.opts = self.opts.with_echo(yes); self }
    pub fn drop_existing(mut self, yes: bool) -> Self { self.opts = self.opts.with_drop_existing(yes); self }
    pub fn batch_size(mut self, rows: usize) -> Self { self.opts = self.opts.with_batch_size(rows); self }
    pub fn association_batch_size(mut self, rows: usize) -> Self { self.opts = self.opts.with_association_batch_size(rows); self }
    pub fn parse_chunk_rows(mut self, rows: usize) -> Self { self.opts = self.opts.with_parse_chunk_rows(rows); self }
    pub fn parallelism(mut self, threads: usize) -> Self { self.opts = self.opts.with_parallelism(threads); self }
    pub fn progress(mut self, yes: bool) -> Self { self.opts = self.opts.with_progress(yes); self }
    pub fn progress_label(mut self, label: impl Into<String>) -> Self { self.opts = self.opts.with_progress_label(label); self }
    pub fn io_read_buffer(mut self, bytes: usize) -> Self { self.opts = self.opts.with_io_read_buffer(bytes); self }
    pub fn checkpoint(mut self, path: impl AsRef<Path>) -> Self { self.opts = self.opts.with_checkpoint(path); self }
    pub fn resume(mut self, yes: bool) -> Self { self.opts = self.opts.with_resume(yes); self }
    pub fn cancel_token(mut self, token: CancelToken) -> Self { self.cancel = token; self }

    /// Run the full build against the configured SQLite database.
    pub fn build(&self) -> Result<BuildReport> {
        init_tracing_once(self.opts.echo);
        let db = self.opts.resolved_database_path();
        let mut store = SqliteStore::open(&db, self.opts.echo)
            .with_context(|| format!("{}: cannot open database {}", Stage::SchemaReady, db.display()))?;
        self.build_into(&mut store)
    }

    /// Run the full build against any storage backend.
    pub fn build_into<S: StorageBackend + ?Sized>(&self, store: &mut S) -> Result<BuildReport> {
        init_tracing_once(self.opts.echo);
        if let Some(n) = self.opts.parallelism {
            if n > 0 {
                rayon::ThreadPoolBuilder::new().num_threads(n).build_global().ok();
            }
        }

        let source = self.opts.source_path.as_path();
        let len = source_len(source).with_context(|| format!("{}: source file unreadable", Stage::Init))?;
        let resumed = self.load_resume_point(source, len)?;
        let mut report = BuildReport { resumed_from: resumed.clone(), ..Default::default() };
        let mut cp = resumed.unwrap_or_else(|| Checkpoint::start(source, len));

        tracing::info!(stage = %Stage::Init, source = %source.display(), bytes = len, "starting build");

        // Validate the header before touching the schema, so a bad source never wipes a database.
        let pass1_src = self.open_source(len, "pass 1: entities + transactions")?;

        let mode = if self.opts.drop_existing && report.resumed_from.is_none() {
            SchemaMode::Rebuild
        } else {
            SchemaMode::CreateIfAbsent
        };
        store.setup_schema(mode).with_context(|| format!("{}: schema setup failed", Stage::SchemaReady))?;
        tracing::info!(stage = %Stage::SchemaReady, ?mode, "schema ready");

        if cp.pass == Pass::Transactions {
            self.run_pass1(store, pass1_src, &mut cp, &mut report)?;
            cp.pass = Pass::Associations;
            cp.rows_committed = 0;
            self.save_checkpoint(&cp)?;
            self.check_cancel(Stage::Pass1FlushingEntities, &cp)?;
        } else {
            if let (_, Some(pb)) = pass1_src {
                pb.finish_and_clear();
            }
            tracing::info!("checkpoint is past pass 1; entities and transactions already committed");
        }

        let pass2_src = self.open_source(len, "pass 2: stores_items")?;
        self.run_pass2(store, pass2_src, &mut cp, &mut report)?;

        report.dangling_associations = store
            .dangling_associations()
            .with_context(|| format!("{}: foreign key check failed", Stage::Done))?;

        if let Some(p) = &self.opts.checkpoint_path {
            Checkpoint::remove(p)?;
        }
        tracing::info!(
            stage = %Stage::Done,
            rows = report.rows_read,
            skipped = report.rows_skipped,
            items = report.items_written,
            stores = report.stores_written,
            transactions = report.transactions_written,
            associations = report.associations_written,
            "build complete"
        );
        if report.dangling_associations > 0 {
            tracing::warn!(
                dangling = report.dangling_associations,
                "stores_items rows reference transactions, stores or items that were skipped"
            );
        }
        if report.duplicate_transactions > 0 {
            tracing::warn!(
                duplicates = report.duplicate_transactions,
                "source reused transaction numbers; only the first row per number was kept"
            );
        }
        Ok(report)
    }

    fn load_resume_point(&self, source: &Path, len: u64) -> Result<Option<Checkpoint>> {
        if !self.opts.resume {
            return Ok(None);
        }
        let Some(path) = &self.opts.checkpoint_path else {
            tracing::warn!("resume requested without a checkpoint path; starting from row 0");
            return Ok(None);
        };
        let Some(cp) = Checkpoint::load(path)? else {
            tracing::info!(checkpoint = %path.display(), "no checkpoint found; starting from row 0");
            return Ok(None);
        };
        cp.ensure_matches(source, len)?;
        tracing::info!(pass = ?cp.pass, rows_committed = cp.rows_committed, "resuming from checkpoint");
        Ok(Some(cp))
    }

    fn open_source(&self, len: u64, pass: &str) -> Result<(CsvSource, Option<ProgressBar>)> {
        let pb = if self.opts.progress {
            Some(make_progress_bar_labeled(len, Some(&pass_label(self.opts.progress_label.as_deref(), pass))))
        } else {
            None
        };
        let src = CsvSource::open(&self.opts.source_path, self.opts.read_buffer_bytes, pb.clone())
            .with_context(|| format!("{}: source file unreadable", Stage::Init))?;
        Ok((src, pb))
    }

    fn save_checkpoint(&self, cp: &Checkpoint) -> Result<()> {
        if let Some(path) = &self.opts.checkpoint_path {
            cp.save(path)?;
        }
        Ok(())
    }

    /// Stop right after a committed batch when cancelled; the checkpoint is saved first.
    fn check_cancel(&self, stage: Stage, cp: &Checkpoint) -> Result<()> {
        if !self.cancel.is_cancelled() {
            return Ok(());
        }
        self.save_checkpoint(cp)?;
        tracing::warn!(%stage, pass = ?cp.pass, rows_committed = cp.rows_committed, "build cancelled");
        bail!("{}: build cancelled after {} committed rows", stage, cp.rows_committed)
    }

    fn run_pass1<S: StorageBackend + ?Sized>(
        &self,
        store: &mut S,
        (mut src, pb): (CsvSource, Option<ProgressBar>),
        cp: &mut Checkpoint,
        report: &mut BuildReport,
    ) -> Result<()> {
        let stage = Stage::Pass1Scanning;
        let resume_at = cp.rows_committed;
        tracing::info!(%stage, resume_at, "scanning source");

        let mut entities = EntityDeduplicator::new();
        let mut transactions: BatchWriter<Transaction> = BatchWriter::new(self.opts.batch_size);
        let mut chunk = Vec::with_capacity(self.opts.parse_chunk_rows.min(1 << 20));

        loop {
            src.read_chunk(self.opts.parse_chunk_rows, &mut chunk).with_context(|| format!("{stage}"))?;
            if chunk.is_empty() {
                break;
            }
            let header = src.header();
            let parsed: Vec<Result<ParsedRow, RowError>> =
                chunk.par_iter().map(|(_, rec)| parse_row(&header.row(rec))).collect();

            // Fold in source order so last-seen-wins holds.
            for ((idx, rec), res) in chunk.iter().zip(parsed) {
                report.rows_read += 1;
                let row = match res {
                    Ok(row) => row,
                    Err(e) => {
                        report.rows_skipped += 1;
                        tracing::warn!(row = idx, error = %e, raw = ?rec, "skipping malformed row");
                        continue;
                    }
                };
                entities.observe(row.item, row.store);
                if *idx < resume_at {
                    continue;
                }
                let flushed = transactions
                    .push(store, row.transaction)
                    .with_context(|| format!("{stage}: writing transactions"))?;
                if flushed.is_some() {
                    cp.rows_committed = idx + 1;
                    self.save_checkpoint(cp)?;
                    self.check_cancel(stage, cp)?;
                }
            }
            self.check_cancel(stage, cp)?;
        }
        report.rows_skipped += src.unreadable_rows();
        if let Some(pb) = &pb {
            pb.finish_with_message("pass 1 scanned");
        }

        let stage = Stage::Pass1FlushingEntities;
        tracing::info!(
            %stage,
            items = entities.item_count(),
            stores = entities.store_count(),
            pending_transactions = transactions.pending(),
            "writing entities"
        );
        let (items, stores) = entities.into_parts();
        report.items_written = write_all::<S, Item>(store, items, self.opts.batch_size)
            .with_context(|| format!("{stage}: writing items"))?;
        report.stores_written = write_all::<S, Store>(store, stores, self.opts.batch_size)
            .with_context(|| format!("{stage}: writing stores"))?;

        let stats = transactions.finish(store).with_context(|| format!("{stage}: writing transactions"))?;
        report.transactions_written += stats.inserted;
        report.duplicate_transactions += stats.ignored();
        report.transaction_flushes += stats.flushes;
        Ok(())
    }

    fn run_pass2<S: StorageBackend + ?Sized>(
        &self,
        store: &mut S,
        (mut src, pb): (CsvSource, Option<ProgressBar>),
        cp: &mut Checkpoint,
        report: &mut BuildReport,
    ) -> Result<()> {
        let stage = Stage::Pass2Scanning;
        let resume_at = cp.rows_committed;
        let skipped = src.skip_to(resume_at).with_context(|| format!("{stage}"))?;
        tracing::info!(%stage, resume_at, skipped, "scanning source");

        let mut links: BatchWriter<Association> = BatchWriter::new(self.opts.association_batch_size);
        let mut chunk = Vec::with_capacity(self.opts.parse_chunk_rows.min(1 << 20));
        loop {
            src.read_chunk(self.opts.parse_chunk_rows, &mut chunk).with_context(|| format!("{stage}"))?;
            if chunk.is_empty() {
                break;
            }
            for (idx, rec) in &chunk {
                match extract_association(&src.header().row(rec)) {
                    Ok(link) => {
                        let flushed = links
                            .push(store, link)
                            .with_context(|| format!("{stage}: writing stores_items"))?;
                        if flushed.is_some() {
                            cp.rows_committed = idx + 1;
                            self.save_checkpoint(cp)?;
                            self.check_cancel(stage, cp)?;
                        }
                    }
                    Err(e) => {
                        report.association_rows_skipped += 1;
                        tracing::debug!(row = idx, error = %e, "no association for row");
                    }
                }
            }
            self.check_cancel(stage, cp)?;
        }
        report.association_rows_skipped += src.unreadable_rows();
        if let Some(pb) = &pb {
            pb.finish_with_message("pass 2 scanned");
        }

        let stage = Stage::Pass2Flushing;
        tracing::info!(%stage, pending = links.pending(), "flushing associations");
        let stats = links.finish(store).with_context(|| format!("{stage}: writing stores_items"))?;
        report.associations_written += stats.inserted;
        report.duplicate_associations += stats.ignored();
        report.association_flushes += stats.flushes;
        Ok(())
    }
}

/// Write a complete entity set in `batch_size` chunks. Returns rows inserted.
fn write_all<S, T>(store: &mut S, records: Vec<T>, batch_size: usize) -> Result<u64>
where
    S: StorageBackend + ?Sized,
    T: Insertable,
{
    let mut w: BatchWriter<T> = BatchWriter::new(batch_size);
    w.extend(store, records)?;
    let stats = w.finish(store)?;
    if stats.records == 0 {
        let table = T::TABLE;
        tracing::warn!(%table, "no rows survived parsing; nothing to write");
    }
    Ok(stats.inserted)
}
