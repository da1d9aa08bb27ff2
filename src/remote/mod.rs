mod gmail;
mod message_id;
mod transport;

use std::{fmt::Debug, mem};

use jiff::Timestamp;
use thiserror::Error;

use crate::auth::AuthError;

pub use gmail::GmailClient;
pub use message_id::{InvalidMessageIdError, MessageId};
pub use transport::{HttpTransport, Transport};

/// Upper bound for `maxResults` accepted by the listing endpoint.
pub const MAX_PAGE_SIZE: u32 = 500;

/// Chat transcripts are stored as messages too; they are never mirrored.
pub const DEFAULT_QUERY: &str = "-in:CHAT";

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: Box<ureq::Transport>,
    },
    #[error("request to {url} returned status {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
    #[error("could not read response from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to authorize request: {0}")]
    Auth(#[from] AuthError),
    #[error("malformed response: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("remote returned unusable message id: {0}")]
    InvalidId(#[from] InvalidMessageIdError),
    #[error("message {id} has no raw content")]
    MissingContent { id: MessageId },
    #[error("message {id} content is not valid base64url: {source}")]
    Decode {
        id: MessageId,
        #[source]
        source: base64::DecodeError,
    },
    #[error("message {id} has invalid internal date {value:?}")]
    InvalidTimestamp { id: MessageId, value: String },
}

/// One listing round-trip worth of identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemotePage {
    pub ids: Vec<MessageId>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    filter: String,
    page_size: u32,
}

impl ListQuery {
    pub fn new(filter: impl Into<String>, page_size: u32) -> Self {
        Self {
            filter: filter.into(),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }
}

impl Default for ListQuery {
    fn default() -> Self {
        Self::new(DEFAULT_QUERY, MAX_PAGE_SIZE)
    }
}

pub struct FetchedMessage {
    pub content: Vec<u8>,
    pub timestamp: Timestamp,
}

impl Debug for FetchedMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchedMessage")
            .field("len", &self.content.len())
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

pub trait MessageLister {
    /// Performs exactly one round-trip. `page_token` is `None` for the first page.
    fn list_page(
        &self,
        query: &ListQuery,
        page_token: Option<&str>,
    ) -> Result<RemotePage, RemoteError>;

    fn pages<'a>(&'a self, query: &'a ListQuery) -> Pages<'a, Self>
    where
        Self: Sized,
    {
        Pages::new(self, query)
    }
}

pub trait MessageFetcher {
    fn fetch(&self, id: &MessageId) -> Result<FetchedMessage, RemoteError>;
}

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Lazy page sequence of one listing traversal.
///
/// A page is only requested when the iterator is advanced, so a consumer
/// that stops early never causes further round-trips. After an error or
/// the last page the iterator is exhausted.
pub struct Pages<'a, L> {
    lister: &'a L,
    query: &'a ListQuery,
    cursor: Cursor,
}

impl<'a, L: MessageLister> Pages<'a, L> {
    pub fn new(lister: &'a L, query: &'a ListQuery) -> Self {
        Self {
            lister,
            query,
            cursor: Cursor::Start,
        }
    }
}

impl<L: MessageLister> Iterator for Pages<'_, L> {
    type Item = Result<RemotePage, RemoteError>;

    fn next(&mut self) -> Option<Self::Item> {
        let token = match mem::replace(&mut self.cursor, Cursor::Done) {
            Cursor::Done => return None,
            Cursor::Start => None,
            Cursor::Next(token) => Some(token),
        };
        let page = match self.lister.list_page(self.query, token.as_deref()) {
            Ok(page) => page,
            Err(e) => return Some(Err(e)),
        };
        if let Some(next) = page.next_page_token.as_ref().filter(|t| !t.is_empty()) {
            self.cursor = Cursor::Next(next.clone());
        }

        Some(Ok(page))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::{
        cell::{Cell, RefCell},
        collections::HashMap,
    };

    use super::*;

    pub fn id(value: &str) -> MessageId {
        MessageId::try_from(value).expect("test ids should be valid")
    }

    /// Serves a fixed list of pages, chained by tokens `"1"`, `"2"`, ...
    pub struct FakeLister {
        pages: Vec<Vec<MessageId>>,
        pub calls: RefCell<Vec<Option<String>>>,
        fail_at: Option<usize>,
    }

    impl FakeLister {
        pub fn new(pages: &[&[&str]]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|page| page.iter().copied().map(id).collect())
                    .collect(),
                calls: RefCell::new(Vec::new()),
                fail_at: None,
            }
        }

        pub fn failing_at(mut self, page: usize) -> Self {
            self.fail_at = Some(page);
            self
        }
    }

    impl MessageLister for FakeLister {
        fn list_page(
            &self,
            _query: &ListQuery,
            page_token: Option<&str>,
        ) -> Result<RemotePage, RemoteError> {
            self.calls.borrow_mut().push(page_token.map(str::to_string));
            let index = page_token.map_or(0, |t| t.parse().expect("fake token should be numeric"));
            if self.fail_at == Some(index) {
                return Err(RemoteError::Status {
                    url: "fake://list".to_string(),
                    status: 503,
                    body: "unavailable".to_string(),
                });
            }
            let ids = self.pages.get(index).cloned().unwrap_or_default();
            let next_page_token = (index + 1 < self.pages.len()).then(|| (index + 1).to_string());
            Ok(RemotePage {
                ids,
                next_page_token,
            })
        }
    }

    #[derive(Default)]
    pub struct FakeFetcher {
        messages: HashMap<String, (Vec<u8>, Timestamp)>,
        pub fetched: RefCell<Vec<MessageId>>,
        failing: Cell<Option<&'static str>>,
    }

    impl FakeFetcher {
        pub fn with(mut self, id: &str, content: &[u8], millis: i64) -> Self {
            let timestamp =
                Timestamp::from_millisecond(millis).expect("test timestamp should be valid");
            self.messages
                .insert(id.to_string(), (content.to_vec(), timestamp));
            self
        }

        pub fn failing_on(self, id: &'static str) -> Self {
            self.failing.set(Some(id));
            self
        }
    }

    impl MessageFetcher for FakeFetcher {
        fn fetch(&self, id: &MessageId) -> Result<FetchedMessage, RemoteError> {
            self.fetched.borrow_mut().push(id.clone());
            if self.failing.get() == Some(id.as_str()) {
                return Err(RemoteError::Status {
                    url: format!("fake://get/{id}"),
                    status: 401,
                    body: "token expired".to_string(),
                });
            }
            let (content, timestamp) = self
                .messages
                .get(id.as_str())
                .cloned()
                .unwrap_or_else(|| {
                    (
                        format!("Subject: {id}\r\n\r\nbody\r\n").into_bytes(),
                        Timestamp::UNIX_EPOCH,
                    )
                });
            Ok(FetchedMessage { content, timestamp })
        }
    }
}
