use std::path::{Path, PathBuf};

pub const DEFAULT_SOURCE: &str = "Iowa_Liquor_Sales.csv";
pub const DEFAULT_DATABASE: &str = "~/iowa.sqlite";
pub const DEFAULT_BATCH_SIZE: usize = 1_000_000;

/// User-facing options with sensible defaults and builder chaining.
#[derive(Clone, Debug)]
pub struct BuildOptions {
    pub source_path: PathBuf,
    pub database_path: PathBuf,           // "~/" is expanded against $HOME
    pub echo: bool,                       // trace every SQL statement
    pub drop_existing: bool,              // true = full rebuild, false = create-if-absent
    pub batch_size: usize,                // entity/transaction rows per commit
    pub association_batch_size: usize,    // stores_items rows per commit
    pub parse_chunk_rows: usize,          // rows handed to the parallel parser at once
    pub parallelism: Option<usize>,       // Some(N) to set rayon threads, None to use default
    pub progress: bool,                   // show progress bar
    pub progress_label: Option<String>,   // optional label prefix for progress bars

    // IO tuning
    pub read_buffer_bytes: usize,         // BufReader capacity

    // resumability
    pub checkpoint_path: Option<PathBuf>, // where the last committed row offset is kept
    pub resume: bool,                     // continue from checkpoint_path if it exists
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            source_path: PathBuf::from(DEFAULT_SOURCE),
            database_path: PathBuf::from(DEFAULT_DATABASE),
            echo: false,
            drop_existing: true,
            batch_size: DEFAULT_BATCH_SIZE,
            association_batch_size: DEFAULT_BATCH_SIZE,
            parse_chunk_rows: 64 * 1024,
            parallelism: None,
            progress: true,
            progress_label: None,

            read_buffer_bytes: 256 * 1024,

            checkpoint_path: None,
            resume: false,
        }
    }
}

impl BuildOptions {
    pub fn with_source(mut self, path: impl AsRef<Path>) -> Self {
        self.source_path = path.as_ref().to_path_buf();
        self
    }
    pub fn with_database(mut self, path: impl AsRef<Path>) -> Self {
        self.database_path = path.as_ref().to_path_buf();
        self
    }
    pub fn with_echo(mut self, yes: bool) -> Self {
        self.echo = yes;
        self
    }
    pub fn with_drop_existing(mut self, yes: bool) -> Self {
        self.drop_existing = yes;
        self
    }
    pub fn with_batch_size(mut self, rows: usize) -> Self {
        self.batch_size = rows.max(1);
        self
    }
    pub fn with_association_batch_size(mut self, rows: usize) -> Self {
        self.association_batch_size = rows.max(1);
        self
    }
    pub fn with_parse_chunk_rows(mut self, rows: usize) -> Self {
        self.parse_chunk_rows = rows.max(1);
        self
    }
    pub fn with_parallelism(mut self, threads: usize) -> Self {
        self.parallelism = Some(threads);
        self
    }
    pub fn with_progress(mut self, yes: bool) -> Self {
        self.progress = yes;
        self
    }
    pub fn with_progress_label(mut self, label: impl Into<String>) -> Self {
        self.progress_label = Some(label.into());
        self
    }
    pub fn with_io_read_buffer(mut self, bytes: usize) -> Self {
        self.read_buffer_bytes = bytes.max(8 * 1024);
        self
    }
    pub fn with_checkpoint(mut self, path: impl AsRef<Path>) -> Self {
        self.checkpoint_path = Some(path.as_ref().to_path_buf());
        self
    }
    pub fn with_resume(mut self, yes: bool) -> Self {
        self.resume = yes;
        self
    }

    /// Database path with a leading `~` expanded.
    pub fn resolved_database_path(&self) -> PathBuf {
        expand_home(&self.database_path)
    }
}

/// Expand a leading `~` using `$HOME` (or `%USERPROFILE%`). Other paths pass through.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
        Some(home) => PathBuf::from(home).join(rest),
        None => path.to_path_buf(),
    }
}
