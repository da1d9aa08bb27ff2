mod reconciler;

use thiserror::Error;

use crate::{maildir::StoreError, remote::RemoteError};

pub use reconciler::Reconciler;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Report what would happen without touching the mail directory or fetching content.
    pub dry_run: bool,
    /// Stop at the first listed message that already exists locally.
    pub incremental: bool,
    /// Remove local messages that are no longer listed remotely.
    pub delete_orphans: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Listed messages that were downloaded or found already present.
    pub processed: u64,
    pub fetched: u64,
    pub deleted: u64,
    /// The listing was cut short by incremental mode.
    pub stopped_early: bool,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
}
