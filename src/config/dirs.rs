use std::{env, path::PathBuf};

use super::ConfigError;

/// Base directories after XDG resolution, each already suffixed with the program name
/// except `home`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dirs {
    home: PathBuf,
    config: PathBuf,
    cache: PathBuf,
}

impl Dirs {
    pub fn new(home: PathBuf, config_home: PathBuf, cache_home: PathBuf) -> Self {
        Self {
            home,
            config: config_home.join(env!("CARGO_PKG_NAME")),
            cache: cache_home.join(env!("CARGO_PKG_NAME")),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let home = env::var_os("HOME")
            .filter(|home| !home.is_empty())
            .map(PathBuf::from)
            .ok_or(ConfigError::NoHome)?;
        let config_home = xdg_dir("XDG_CONFIG_HOME").unwrap_or_else(|| home.join(".config"));
        let cache_home = xdg_dir("XDG_CACHE_HOME").unwrap_or_else(|| home.join(".cache"));

        Ok(Self::new(home, config_home, cache_home))
    }

    pub fn config_file(&self) -> PathBuf {
        self.config.join("config.toml")
    }

    pub fn credentials_file(&self) -> PathBuf {
        self.config.join("credentials.json")
    }

    pub fn token_file(&self) -> PathBuf {
        self.cache.join("token.json")
    }

    pub fn default_maildir(&self) -> PathBuf {
        self.home.join("mail")
    }
}

/// XDG variables holding relative paths are invalid and ignored.
fn xdg_dir(var: &str) -> Option<PathBuf> {
    env::var_os(var)
        .map(PathBuf::from)
        .filter(|path| path.is_absolute())
}
