mod dirs;

use std::{
    fs::read_to_string,
    io,
    path::{Path, PathBuf},
};

use derive_getters::Getters;
use log::debug;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    auth::ClientCredentials,
    remote::{DEFAULT_QUERY, ListQuery, MAX_PAGE_SIZE},
};

pub use dirs::Dirs;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("HOME is not set")]
    NoHome,
    #[error("unable to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unable to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<toml::de::Error>,
    },
    #[error("unable to parse client secret file {}: {source}", path.display())]
    Credentials {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(
        "no OAuth client configured: provide {} or a [client] section in {}",
        credentials.display(),
        config.display()
    )]
    NoClient {
        credentials: PathBuf,
        config: PathBuf,
    },
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
struct ClientSection {
    client_id: String,
    client_secret: String,
}

#[derive(Clone, Debug, Deserialize, Getters, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    maildir: Option<PathBuf>,
    user: Option<String>,
    #[getter(skip)]
    query: String,
    #[getter(skip)]
    page_size: u32,
    #[getter(skip)]
    client: Option<ClientSection>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            maildir: None,
            user: None,
            query: DEFAULT_QUERY.to_string(),
            page_size: MAX_PAGE_SIZE,
            client: None,
        }
    }
}

impl Config {
    /// Loads `file`, or the default location if none is given.
    ///
    /// Only an explicitly given file has to exist.
    pub fn load(file: Option<&Path>, dirs: &Dirs) -> Result<Self, ConfigError> {
        let (path, required) = match file {
            Some(file) => (file.to_path_buf(), true),
            None => (dirs.config_file(), false),
        };
        match read_to_string(&path) {
            Ok(contents) => {
                debug!("using config {}", path.display());
                toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                    path,
                    source: Box::new(source),
                })
            }
            Err(e) if !required && e.kind() == io::ErrorKind::NotFound => {
                debug!("no config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io { path, source }),
        }
    }

    pub fn list_query(&self) -> ListQuery {
        ListQuery::new(self.query.clone(), self.page_size)
    }

    /// `credentials.json` takes precedence over the `[client]` section, which takes
    /// precedence over the registration built into the binary.
    pub fn client_credentials(&self, dirs: &Dirs) -> Result<ClientCredentials, ConfigError> {
        self.resolve_client(dirs, ClientCredentials::built_in())
    }

    fn resolve_client(
        &self,
        dirs: &Dirs,
        built_in: Option<ClientCredentials>,
    ) -> Result<ClientCredentials, ConfigError> {
        let path = dirs.credentials_file();
        match read_to_string(&path) {
            Ok(contents) => {
                debug!("using client credentials from {}", path.display());
                return ClientCredentials::from_google_json(&contents)
                    .map_err(|source| ConfigError::Credentials { path, source });
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("unable to read client secret file {}", path.display());
            }
            Err(source) => return Err(ConfigError::Io { path, source }),
        }

        if let Some(client) = &self.client {
            debug!("using client credentials from {}", dirs.config_file().display());
            return Ok(ClientCredentials::new(
                client.client_id.clone(),
                client.client_secret.clone(),
            ));
        }
        if let Some(built_in) = built_in {
            debug!("using default client credentials");
            return Ok(built_in);
        }
        Err(ConfigError::NoClient {
            credentials: path,
            config: dirs.config_file(),
        })
    }
}
