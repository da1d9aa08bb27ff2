mod scanner;
mod writer;

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use jiff::Timestamp;
use log::trace;
use thiserror::Error;

use crate::remote::MessageId;

pub use scanner::{LocalEntry, LocalSnapshot};

/// Names starting with this marker are never removed by the orphan sweep.
pub const RESERVED_PREFIX: char = '.';

/// Deletion guard for lock files, sidecars and interrupted downloads.
pub fn is_protected(name: &str) -> bool {
    name.starts_with(RESERVED_PREFIX)
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unable to list {}: {source}", path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unable to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unable to delete {}: {source}", path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Flat directory holding one file per message, named by its [`MessageId`].
///
/// The directory listing is the only state; there is no index.
#[derive(Debug, Clone)]
pub struct MailStore {
    root: PathBuf,
}

impl MailStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scan(&self) -> Result<LocalSnapshot, StoreError> {
        scanner::scan(&self.root)
    }

    pub fn store(
        &self,
        id: &MessageId,
        content: &[u8],
        timestamp: Timestamp,
    ) -> Result<PathBuf, StoreError> {
        writer::write(&self.root, id, content, timestamp)
    }

    pub fn remove(&self, name: &str) -> Result<(), StoreError> {
        let path = self.root.join(name);
        trace!("deleting {}", path.display());
        fs::remove_file(&path).map_err(|source| StoreError::Remove { path, source })
    }
}
