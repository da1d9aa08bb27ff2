use std::{
    fs::Permissions,
    io::{self, Write as _},
    os::unix::fs::PermissionsExt as _,
    path::{Path, PathBuf},
    time::SystemTime,
};

use jiff::Timestamp;
use log::trace;
use tempfile::Builder;

use crate::remote::MessageId;

use super::{RESERVED_PREFIX, StoreError};

const READ_ONLY: u32 = 0o400;

// Algorithm
// The temp file lives in the destination directory itself so the final rename never crosses
// filesystems. Its name carries the reserved prefix, so a file left behind by a crash is neither
// taken for a message nor removed by the orphan sweep.
pub fn write(
    dir: &Path,
    id: &MessageId,
    content: &[u8],
    timestamp: Timestamp,
) -> Result<PathBuf, StoreError> {
    write_staged(dir, id, content, timestamp, |_| Ok(()))
}

fn write_staged(
    dir: &Path,
    id: &MessageId,
    content: &[u8],
    timestamp: Timestamp,
    before_commit: impl FnOnce(&Path) -> io::Result<()>,
) -> Result<PathBuf, StoreError> {
    let path = dir.join(id.as_str());
    let write_error = |source: io::Error| StoreError::Write {
        path: path.clone(),
        source,
    };

    let mut file = Builder::new()
        .prefix(&format!("{RESERVED_PREFIX}{}-", env!("CARGO_PKG_NAME")))
        .tempfile_in(dir)
        .map_err(write_error)?;
    trace!("writing {} to {}", id, file.path().display());

    file.write_all(content).map_err(write_error)?;
    file.as_file()
        .set_permissions(Permissions::from_mode(READ_ONLY))
        .map_err(write_error)?;
    file.as_file()
        .set_modified(SystemTime::from(timestamp))
        .map_err(write_error)?;
    file.as_file().sync_all().map_err(write_error)?;
    before_commit(file.path()).map_err(write_error)?;

    file.persist(&path).map_err(|e| write_error(e.error))?;

    Ok(path)
}
