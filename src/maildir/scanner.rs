use std::{collections::BTreeMap, fs::read_dir, io, path::Path};

use log::{debug, trace, warn};

use super::{StoreError, is_protected};

#[derive(Debug, Clone)]
pub struct LocalEntry {
    name: String,
    hidden: bool,
}

impl LocalEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }
}

/// Contents of the mail directory at scan time. Not refreshed during a run.
#[derive(Debug, Default, Clone)]
pub struct LocalSnapshot {
    entries: BTreeMap<String, LocalEntry>,
}

impl LocalSnapshot {
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = &LocalEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn scan(path: &Path) -> Result<LocalSnapshot, StoreError> {
    let scan_error = |source: io::Error| StoreError::Scan {
        path: path.to_path_buf(),
        source,
    };

    let mut entries = BTreeMap::new();
    for entry in read_dir(path).map_err(scan_error)? {
        let entry = entry.map_err(scan_error)?;
        // d_type from the listing itself, no stat per file
        let file_type = entry.file_type().map_err(scan_error)?;
        let Ok(name) = entry.file_name().into_string() else {
            warn!("ignoring non UTF-8 filename {:?}", entry.file_name());
            continue;
        };
        if file_type.is_dir() {
            trace!("ignoring directory {name}");
            continue;
        }
        let hidden = is_protected(&name);
        entries.insert(name.clone(), LocalEntry { name, hidden });
    }
    debug!("found {} local entries in {}", entries.len(), path.display());

    Ok(LocalSnapshot { entries })
}
