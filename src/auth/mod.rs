mod credentials;
mod flow;
mod token;

use std::{cell::RefCell, fmt::Debug, io, path::PathBuf};

use jiff::Timestamp;
use log::{debug, info, warn};
use thiserror::Error;

pub use credentials::ClientCredentials;
pub use token::{CachedToken, TokenCacheError};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("invalid OAuth endpoint: {0}")]
    Endpoint(#[from] oauth2::url::ParseError),
    #[error("unable to retrieve token: {0}")]
    Exchange(String),
    #[error("authorization callback failed: {0}")]
    Callback(String),
    #[error("authorization denied: {0}")]
    Denied(String),
    #[error("cached token expired and cannot be refreshed")]
    NoRefreshToken,
    #[error("token cache: {0}")]
    Cache(#[from] TokenCacheError),
}

/// Bearer token for the mail API.
#[derive(Clone)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Hands out access tokens for one run, refreshing them once they expire.
///
/// A refreshed token is written back to the cache so the next run starts from it.
#[derive(Debug)]
pub struct TokenSource {
    credentials: ClientCredentials,
    cache_path: PathBuf,
    http: ureq::Agent,
    token: RefCell<CachedToken>,
}

impl TokenSource {
    pub fn new(
        credentials: ClientCredentials,
        cache_path: PathBuf,
        http: ureq::Agent,
        token: CachedToken,
    ) -> Self {
        Self {
            credentials,
            cache_path,
            http,
            token: RefCell::new(token),
        }
    }

    pub fn access_token(&self) -> Result<AccessToken, AuthError> {
        if self.token.borrow().is_expired(Timestamp::now()) {
            return self.refresh();
        }
        Ok(AccessToken(self.token.borrow().access_token.clone()))
    }

    pub fn can_refresh(&self) -> bool {
        self.token.borrow().refresh_token.is_some()
    }

    pub fn refresh(&self) -> Result<AccessToken, AuthError> {
        let refreshed = flow::refresh(&self.credentials, &self.token.borrow(), &self.http)?;
        if let Err(e) = refreshed.save(&self.cache_path) {
            warn!("unable to cache refreshed token in {}: {e}", self.cache_path.display());
        }
        let access = AccessToken(refreshed.access_token.clone());
        self.token.replace(refreshed);

        Ok(access)
    }
}

/// Loads the cached token for `credentials`, consulting and updating `cache_path`.
///
/// Falls back to the interactive browser flow only when there is no cached
/// token or an expired one without refresh token. A cache file that exists
/// but cannot be parsed is an error rather than a reason to re-authorize.
pub fn authorize(
    credentials: ClientCredentials,
    cache_path: PathBuf,
    http: ureq::Agent,
) -> Result<TokenSource, AuthError> {
    let token = match CachedToken::load(&cache_path)? {
        Some(token) if !token.is_expired(Timestamp::now()) => {
            debug!("using cached token from {}", cache_path.display());
            token
        }
        Some(token) if token.refresh_token.is_some() => {
            let token = flow::refresh(&credentials, &token, &http)?;
            token.save(&cache_path)?;
            token
        }
        _ => {
            info!("no usable token cached, starting browser authorization");
            let token = flow::authorize_in_browser(&credentials, &http)?;
            token.save(&cache_path)?;
            token
        }
    };

    Ok(TokenSource::new(credentials, cache_path, http, token))
}
