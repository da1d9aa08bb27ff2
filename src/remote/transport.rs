use std::io::Read as _;

use log::{debug, trace};

use crate::auth::{AccessToken, TokenSource};

use super::RemoteError;

/// Executes authorized requests against the mail provider's API.
pub trait Transport {
    /// Sends a single GET request and returns the response body.
    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<String, RemoteError>;
}

pub struct HttpTransport {
    agent: ureq::Agent,
    tokens: TokenSource,
}

impl HttpTransport {
    pub fn new(agent: ureq::Agent, tokens: TokenSource) -> Self {
        Self { agent, tokens }
    }

    fn send(
        &self,
        url: &str,
        query: &[(&str, &str)],
        token: &AccessToken,
    ) -> Result<String, RemoteError> {
        trace!("GET {url} {query:?}");
        let mut request = self
            .agent
            .get(url)
            .set("Authorization", &format!("Bearer {}", token.secret()));
        for (key, value) in query {
            request = request.query(key, value);
        }

        match request.call() {
            // raw messages routinely exceed the size cap of `into_string`
            Ok(response) => {
                let mut body = String::new();
                response
                    .into_reader()
                    .read_to_string(&mut body)
                    .map_err(|source| RemoteError::Body {
                        url: url.to_string(),
                        source,
                    })?;
                Ok(body)
            }
            Err(ureq::Error::Status(status, response)) => Err(RemoteError::Status {
                url: url.to_string(),
                status,
                body: response.into_string().unwrap_or_default(),
            }),
            Err(ureq::Error::Transport(transport)) => Err(RemoteError::Transport {
                url: url.to_string(),
                source: Box::new(transport),
            }),
        }
    }
}

impl Transport for HttpTransport {
    /// Access tokens expire during long runs. A rejected token is refreshed and the
    /// request retried once.
    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<String, RemoteError> {
        let token = self.tokens.access_token()?;
        match self.send(url, query, &token) {
            Err(RemoteError::Status { status: 401, .. }) if self.tokens.can_refresh() => {
                debug!("access token rejected by {url}, refreshing");
                let token = self.tokens.refresh()?;
                self.send(url, query, &token)
            }
            result => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::{BufRead as _, BufReader, Write as _},
        net::TcpListener,
        path::Path,
        thread::{self, JoinHandle},
    };

    use assertables::*;
    use jiff::{SignedDuration, Timestamp};
    use rstest::*;
    use tempfile::{TempDir, tempdir};

    use super::*;
    use crate::auth::{CachedToken, ClientCredentials};

    const TOKEN_RESPONSE: &str =
        r#"{"access_token":"fresh","token_type":"bearer","expires_in":3600}"#;

    /// Answers one connection per canned `(status, body)` and returns the request heads.
    fn serve(responses: Vec<(&'static str, String)>) -> (String, JoinHandle<Vec<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
        let base = format!("http://{}", listener.local_addr().expect("bound address"));
        let server = thread::spawn(move || {
            responses
                .into_iter()
                .map(|(status, body)| {
                    let (mut stream, _) = listener.accept().expect("client should connect");
                    let mut reader = BufReader::new(&stream);
                    let mut head = Vec::new();
                    let mut content_length = 0;
                    loop {
                        let mut line = String::new();
                        reader.read_line(&mut line).expect("request should be readable");
                        let line = line.trim_end().to_string();
                        if line.is_empty() {
                            break;
                        }
                        if let Some((name, value)) = line.split_once(':')
                            && name.eq_ignore_ascii_case("content-length")
                        {
                            content_length = value.trim().parse().expect("numeric length");
                        }
                        head.push(line);
                    }
                    let mut request_body = vec![0; content_length];
                    std::io::Read::read_exact(&mut reader, &mut request_body)
                        .expect("request body should be readable");
                    write!(
                        stream,
                        "HTTP/1.1 {status}\r\n\
                         Content-Type: application/json\r\n\
                         Content-Length: {}\r\n\
                         Connection: close\r\n\r\n",
                        body.len()
                    )
                    .expect("response head should be writable");
                    stream
                        .write_all(body.as_bytes())
                        .expect("response body should be writable");
                    head
                })
                .collect()
        });
        (base, server)
    }

    fn credentials(base: &str) -> ClientCredentials {
        let json = format!(
            r#"{{"installed":{{"client_id":"id","client_secret":"s","token_uri":"{base}/token"}}}}"#
        );
        assert_ok!(ClientCredentials::from_google_json(&json))
    }

    fn transport(base: &str, cache: &Path, token: CachedToken) -> HttpTransport {
        let agent = ureq::AgentBuilder::new().redirects(0).build();
        let tokens = TokenSource::new(credentials(base), cache.to_path_buf(), agent.clone(), token);
        HttpTransport::new(agent, tokens)
    }

    fn token(refresh_token: Option<&str>, expires_at: Option<Timestamp>) -> CachedToken {
        CachedToken {
            access_token: "stale".to_string(),
            refresh_token: refresh_token.map(str::to_string),
            expires_at,
        }
    }

    fn authorization(head: &[String]) -> Option<&str> {
        head.iter().find_map(|line| line.strip_prefix("Authorization: "))
    }

    #[fixture]
    fn temp_dir() -> TempDir {
        assert_ok!(tempdir())
    }

    #[rstest]
    fn test_bodies_above_ten_mebibytes_are_read_completely(temp_dir: TempDir) {
        let raw = "A".repeat(11 * 1024 * 1024);
        let body = format!(r#"{{"raw":"{raw}","internalDate":"1"}}"#);
        let (base, server) = serve(vec![("200 OK", body.clone())]);
        let transport = transport(&base, &temp_dir.path().join("token.json"), token(None, None));

        let received = assert_ok!(transport.get(&format!("{base}/m"), &[("format", "raw")]));

        assert_eq!(received.len(), body.len());
        let heads = assert_ok!(server.join());
        assert!(heads[0][0].starts_with("GET /m?format=raw "));
        assert_eq!(authorization(&heads[0]), Some("Bearer stale"));
    }

    #[rstest]
    fn test_rejected_token_is_refreshed_and_request_retried(temp_dir: TempDir) {
        let cache = temp_dir.path().join("token.json");
        let (base, server) = serve(vec![
            ("401 Unauthorized", r#"{"error":"expired"}"#.to_string()),
            ("200 OK", TOKEN_RESPONSE.to_string()),
            ("200 OK", r#"{"messages":[]}"#.to_string()),
        ]);
        let transport = transport(&base, &cache, token(Some("1//refresh"), None));

        let body = assert_ok!(transport.get(&format!("{base}/messages"), &[]));

        assert_eq!(body, r#"{"messages":[]}"#);
        let heads = assert_ok!(server.join());
        assert_eq!(authorization(&heads[0]), Some("Bearer stale"));
        assert!(heads[1][0].starts_with("POST /token "));
        assert_eq!(authorization(&heads[2]), Some("Bearer fresh"));
        let cached = assert_some!(assert_ok!(CachedToken::load(&cache)));
        assert_eq!(cached.access_token, "fresh");
        assert_eq!(cached.refresh_token.as_deref(), Some("1//refresh"));
    }

    #[rstest]
    fn test_expired_token_is_refreshed_before_the_request(temp_dir: TempDir) {
        let expired = Timestamp::now() - SignedDuration::from_secs(3600);
        let (base, server) = serve(vec![
            ("200 OK", TOKEN_RESPONSE.to_string()),
            ("200 OK", "{}".to_string()),
        ]);
        let transport = transport(
            &base,
            &temp_dir.path().join("token.json"),
            token(Some("1//refresh"), Some(expired)),
        );

        assert_ok!(transport.get(&format!("{base}/messages"), &[]));

        let heads = assert_ok!(server.join());
        assert!(heads[0][0].starts_with("POST /token "));
        assert_eq!(authorization(&heads[1]), Some("Bearer fresh"));
    }

    #[rstest]
    fn test_rejection_without_refresh_token_is_reported(temp_dir: TempDir) {
        let (base, server) = serve(vec![("401 Unauthorized", "denied".to_string())]);
        let transport = transport(&base, &temp_dir.path().join("token.json"), token(None, None));

        let result = transport.get(&format!("{base}/messages"), &[]);

        assert!(matches!(result, Err(RemoteError::Status { status: 401, .. })));
        assert_eq!(assert_ok!(server.join()).len(), 1);
    }
}
