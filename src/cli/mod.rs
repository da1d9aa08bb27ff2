use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Parser;
use log::{debug, info};

use crate::{
    auth,
    config::{Config, Dirs},
    maildir::MailStore,
    remote::{GmailClient, HttpTransport, MessageLister as _},
    sync::{Reconciler, SyncOptions},
};

/// Incrementally back up a Gmail mailbox into a local directory, one file per message.
#[derive(Debug, Parser)]
#[command(version, after_help = "Default destination is $HOME/mail/")]
pub struct Args {
    /// Delete local mail that has been deleted in Gmail
    #[arg(short, long)]
    pub delete: bool,

    /// Don't make any changes
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Gmail account to back up
    #[arg(short, long)]
    pub user: Option<String>,

    /// Log what is being done
    #[arg(short, long)]
    pub verbose: bool,

    /// Stop fetching on first existing mail, won't detect deletes
    #[arg(short, long)]
    pub incremental: bool,

    /// Config file to use instead of the default location
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory holding the backed up messages
    pub destination: Option<PathBuf>,
}

impl Args {
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            dry_run: self.dry_run,
            incremental: self.incremental,
            delete_orphans: self.delete,
        }
    }
}

pub fn run(args: &Args) -> Result<()> {
    let dirs = Dirs::from_env()?;
    let config = Config::load(args.config.as_deref(), &dirs)?;
    let destination = args
        .destination
        .clone()
        .or_else(|| config.maildir().clone())
        .unwrap_or_else(|| dirs.default_maildir());
    let user = args
        .user
        .clone()
        .or_else(|| config.user().clone())
        .unwrap_or_else(|| "me".to_string());

    let store = MailStore::new(destination);
    let local = store.scan().context("unable to list messages")?;
    debug!("{} messages present locally", local.len());

    let credentials = config.client_credentials(&dirs)?;
    let agent = ureq::AgentBuilder::new().redirects(0).build();
    let token_file = dirs.token_file();
    let tokens = auth::authorize(credentials, token_file.clone(), agent.clone())
        .with_context(|| {
            format!(
                "failed to load authorization token (remove {} to log in again)",
                token_file.display()
            )
        })?;

    let gmail = GmailClient::new(HttpTransport::new(agent, tokens), &user);
    let query = config.list_query();
    let report = Reconciler::new(&store, &gmail, args.sync_options())
        .reconcile(&local, gmail.pages(&query))
        .context("sync failed")?;

    info!(
        "processed {} messages in {}: {} fetched, {} deleted{}",
        report.processed,
        store.root().display(),
        report.fetched,
        report.deleted,
        if report.stopped_early {
            ", stopped at first known message"
        } else {
            ""
        }
    );

    Ok(())
}
