use std::{
    fs::{self, DirBuilder, OpenOptions},
    io::{self, Write as _},
    os::unix::fs::{DirBuilderExt as _, OpenOptionsExt as _},
    path::Path,
};

use jiff::{SignedDuration, Timestamp};
use log::debug;
use serde::{Deserialize, Serialize};

/// Tokens expiring within this window are refreshed before use.
const EXPIRY_LEEWAY: SignedDuration = SignedDuration::from_secs(60);

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CachedToken {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Timestamp>,
}

impl CachedToken {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at <= now + EXPIRY_LEEWAY)
    }

    /// Returns `Ok(None)` if no token has been cached yet.
    pub fn load(path: &Path) -> Result<Option<Self>, TokenCacheError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no cached token at {}", path.display());
                return Ok(None);
            }
            Err(e) => return Err(TokenCacheError::Io(e)),
        };
        Ok(Some(serde_json::from_str(&contents)?))
    }

    pub fn save(&self, path: &Path) -> Result<(), TokenCacheError> {
        if let Some(dir) = path.parent() {
            DirBuilder::new().recursive(true).mode(0o700).create(dir)?;
        }
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)?;
        serde_json::to_writer(&mut file, self)?;
        file.write_all(b"\n")?;
        debug!("saved token to {}", path.display());

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokenCacheError {
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("token cache is not valid json: {0}")]
    Format(#[from] serde_json::Error),
}
