use std::collections::HashSet;

use log::{debug, info};

use crate::{
    maildir::{LocalSnapshot, MailStore},
    remote::{MessageFetcher, MessageId, RemoteError, RemotePage},
};

use super::{SyncError, SyncOptions, SyncReport};

/// Transient bookkeeping of one run.
#[derive(Default)]
struct RunState {
    remote_seen: HashSet<MessageId>,
    report: SyncReport,
}

pub struct Reconciler<'a, F> {
    store: &'a MailStore,
    fetcher: &'a F,
    options: SyncOptions,
}

impl<'a, F: MessageFetcher> Reconciler<'a, F> {
    pub fn new(store: &'a MailStore, fetcher: &'a F, options: SyncOptions) -> Self {
        Self {
            store,
            fetcher,
            options,
        }
    }

    // Algorithm
    // Pages are consumed strictly in listing order and ids within a page in the order returned.
    // An id seen earlier in the same run counts as present, so duplicates across pages are not
    // downloaded twice. The orphan sweep only runs after the listing was fully consumed, since a
    // partial remote set would make every unlisted message look deleted.
    pub fn reconcile<P>(&self, local: &LocalSnapshot, pages: P) -> Result<SyncReport, SyncError>
    where
        P: IntoIterator<Item = Result<RemotePage, RemoteError>>,
    {
        let mut state = RunState::default();

        for page in pages {
            let page = page?;
            debug!("processing page of {} messages", page.ids.len());
            for id in page.ids {
                let already_seen = state.remote_seen.contains(&id);
                if !already_seen && !local.contains(id.as_str()) {
                    self.download(&id)?;
                    state.report.fetched += 1;
                } else if self.options.incremental {
                    info!("{id} already present, stopping incremental sync");
                    state.report.stopped_early = true;
                    return Ok(state.report);
                }
                state.remote_seen.insert(id);
                state.report.processed += 1;
            }
        }

        if self.options.delete_orphans {
            state.report.deleted = self.delete_orphans(local, &state.remote_seen)?;
        }

        Ok(state.report)
    }

    fn download(&self, id: &MessageId) -> Result<(), SyncError> {
        if self.options.dry_run {
            info!("would download {id}");
            return Ok(());
        }
        info!("downloading {id}");
        let message = self.fetcher.fetch(id)?;
        self.store.store(id, &message.content, message.timestamp)?;

        Ok(())
    }

    fn delete_orphans(
        &self,
        local: &LocalSnapshot,
        remote_seen: &HashSet<MessageId>,
    ) -> Result<u64, SyncError> {
        let mut deleted = 0;
        for entry in local.iter() {
            let name = entry.name();
            if remote_seen.contains(name) {
                continue;
            }
            if entry.is_hidden() {
                debug!("keeping protected {name}");
                continue;
            }
            if self.options.dry_run {
                info!("would delete {name}");
            } else {
                info!("deleting {name}");
                self.store.remove(name)?;
            }
            deleted += 1;
        }

        Ok(deleted)
    }
}
