//! Resumability marker: which pass a build reached and how many source rows of that pass
//! are already committed. Persisted as a small JSON document, replaced atomically.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// The pass a checkpoint refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pass {
    /// Pass 1: transactions (entities are written when the pass ends).
    Transactions,
    /// Pass 2: `stores_items` rows. Entities and transactions are complete.
    Associations,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub source: PathBuf,
    pub source_len: u64,
    pub pass: Pass,
    /// Data rows (0-based, header excluded) of `pass` whose output is committed.
    pub rows_committed: u64,
}

impl Checkpoint {
    pub fn start(source: &Path, source_len: u64) -> Self {
        Self { source: source.to_path_buf(), source_len, pass: Pass::Transactions, rows_committed: 0 }
    }

    /// Load a checkpoint if the file exists.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        match fs::read(path) {
            Ok(bytes) => {
                let cp = serde_json::from_slice(&bytes)
                    .with_context(|| format!("parse checkpoint {}", path.display()))?;
                Ok(Some(cp))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read checkpoint {}", path.display())),
        }
    }

    /// Refuse to resume against a different source file.
    pub fn ensure_matches(&self, source: &Path, source_len: u64) -> Result<()> {
        if self.source != source || self.source_len != source_len {
            bail!(
                "checkpoint was written for {} ({} bytes), not {} ({} bytes)",
                self.source.display(),
                self.source_len,
                source.display(),
                source_len
            );
        }
        Ok(())
    }

    /// Write to a sibling temp file, then rename over `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("inprogress");
        {
            let mut f = fs::File::create(&tmp).with_context(|| format!("create {}", tmp.display()))?;
            serde_json::to_writer_pretty(&mut f, self)?;
            f.write_all(b"\n")?;
            f.sync_all()?;
        }
        fs::rename(&tmp, path).with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
        Ok(())
    }

    pub fn remove(path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("remove checkpoint {}", path.display())),
        }
    }
}
