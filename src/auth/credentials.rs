use derive_getters::Getters;
use serde::Deserialize;

pub const GOOGLE_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// OAuth client registration. Identifies the application, not the user.
#[derive(Clone, Debug, Deserialize, Getters, PartialEq, Eq)]
pub struct ClientCredentials {
    client_id: String,
    #[getter(skip)]
    client_secret: String,
    #[serde(default = "default_auth_uri")]
    auth_uri: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

/// Layout of the `credentials.json` download from the Google Cloud console.
#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum CredentialsFile {
    Installed(ClientCredentials),
    Web(ClientCredentials),
}

impl ClientCredentials {
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            client_id,
            client_secret,
            auth_uri: default_auth_uri(),
            token_uri: default_token_uri(),
        }
    }

    /// Registration compiled in via `MAILMIRROR_CLIENT_ID` and `MAILMIRROR_CLIENT_SECRET`,
    /// so packaged builds work without any client setup.
    pub fn built_in() -> Option<Self> {
        let client_id = option_env!("MAILMIRROR_CLIENT_ID")?;
        let client_secret = option_env!("MAILMIRROR_CLIENT_SECRET")?;
        Some(Self::new(client_id.to_string(), client_secret.to_string()))
    }

    pub fn from_google_json(contents: &str) -> Result<Self, serde_json::Error> {
        match serde_json::from_str::<CredentialsFile>(contents)? {
            CredentialsFile::Installed(credentials) | CredentialsFile::Web(credentials) => {
                Ok(credentials)
            }
        }
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }
}

fn default_auth_uri() -> String {
    GOOGLE_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}
