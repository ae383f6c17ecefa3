//! Path-addressed completion ledger.
//!
//! The presence of a stage artifact on disk *is* its completion state; there
//! is no separate manifest. The trait lets tests simulate partial completion
//! with an in-memory store instead of real files.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub trait Ledger {
    /// Whether the artifact at `path` already exists.
    fn is_complete(&self, path: &Path) -> bool;

    /// Note a fresh write so later probes see it without re-touching the
    /// backing store.
    fn record(&self, path: &Path);

    /// Make sure a results directory exists before a stage writes into it.
    fn prepare_dir(&self, path: &Path) -> io::Result<()>;
}

/// Filesystem-backed ledger with a positive-probe cache.
///
/// Only positive results are cached: artifacts are never deleted or
/// overwritten by the pipeline, so existence is monotone within a run, while
/// a negative probe may turn positive after the engine writes.
#[derive(Debug, Default)]
pub struct FsLedger {
    seen: RefCell<HashSet<PathBuf>>,
}

impl FsLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Ledger for FsLedger {
    fn is_complete(&self, path: &Path) -> bool {
        if self.seen.borrow().contains(path) {
            return true;
        }
        let exists = path.exists();
        if exists {
            self.seen.borrow_mut().insert(path.to_path_buf());
        }
        exists
    }

    fn record(&self, path: &Path) {
        self.seen.borrow_mut().insert(path.to_path_buf());
    }

    fn prepare_dir(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }
}
