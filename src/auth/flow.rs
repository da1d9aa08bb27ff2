use std::{
    io::{self, BufRead as _, BufReader, Write as _},
    net::{TcpListener, TcpStream},
};

use jiff::{SignedDuration, Timestamp};
use log::{debug, info, warn};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, RedirectUrl, RefreshToken, Scope, TokenResponse as _, TokenUrl,
    basic::{BasicClient, BasicTokenResponse},
    url::Url,
};

use super::{AuthError, CachedToken, ClientCredentials};

pub const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

type GoogleClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

fn client(credentials: &ClientCredentials) -> Result<GoogleClient, AuthError> {
    Ok(BasicClient::new(ClientId::new(credentials.client_id().clone()))
        .set_client_secret(ClientSecret::new(credentials.client_secret().to_string()))
        .set_auth_uri(AuthUrl::new(credentials.auth_uri().clone())?)
        .set_token_uri(TokenUrl::new(credentials.token_uri().clone())?))
}

fn into_cached(response: &BasicTokenResponse, previous_refresh: Option<String>) -> CachedToken {
    let expires_at = response.expires_in().and_then(|expires_in| {
        SignedDuration::try_from(expires_in)
            .ok()
            .and_then(|expires_in| Timestamp::now().checked_add(expires_in).ok())
    });
    CachedToken {
        access_token: response.access_token().secret().clone(),
        refresh_token: response
            .refresh_token()
            .map(|token| token.secret().clone())
            .or(previous_refresh),
        expires_at,
    }
}

pub fn refresh(
    credentials: &ClientCredentials,
    token: &CachedToken,
    http: &ureq::Agent,
) -> Result<CachedToken, AuthError> {
    let refresh_token = token.refresh_token.clone().ok_or(AuthError::NoRefreshToken)?;
    debug!("refreshing access token");
    let response = client(credentials)?
        .exchange_refresh_token(&RefreshToken::new(refresh_token.clone()))
        .request(http)
        .map_err(|e| AuthError::Exchange(e.to_string()))?;

    Ok(into_cached(&response, Some(refresh_token)))
}

/// Authorization code flow with a loopback redirect.
pub fn authorize_in_browser(
    credentials: &ClientCredentials,
    http: &ureq::Agent,
) -> Result<CachedToken, AuthError> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let redirect = format!("http://{}", listener.local_addr()?);
    let client = client(credentials)?.set_redirect_uri(RedirectUrl::new(redirect)?);

    let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
    let (auth_url, csrf_state) = client
        .authorize_url(CsrfToken::new_random)
        .add_scope(Scope::new(GMAIL_READONLY_SCOPE.to_string()))
        .add_extra_param("access_type", "offline")
        .set_pkce_challenge(pkce_challenge)
        .url();

    eprintln!("Go to the following link in your browser to authorize:\n{auth_url}");
    open_browser(auth_url.as_str());

    let code = wait_for_code(&listener, csrf_state.secret())?;
    info!("authorization code received, exchanging for token");
    let response = client
        .exchange_code(AuthorizationCode::new(code))
        .set_pkce_verifier(pkce_verifier)
        .request(http)
        .map_err(|e| AuthError::Exchange(e.to_string()))?;

    Ok(into_cached(&response, None))
}

fn open_browser(url: &str) {
    match open::that(url) {
        Ok(()) => debug!("launched browser"),
        Err(e) => warn!("failed to open browser: {e}"),
    }
}

/// Serves requests on `listener` until one carries the authorization result.
fn wait_for_code(listener: &TcpListener, expected_state: &str) -> Result<String, AuthError> {
    for stream in listener.incoming() {
        let mut stream = stream?;
        let url = match read_request_url(&stream) {
            Ok(Some(url)) => url,
            Ok(None) => {
                respond(&mut stream, "404 Not Found", "Not found\n");
                continue;
            }
            Err(e) => {
                debug!("ignoring unreadable request: {e}");
                continue;
            }
        };

        match callback_result(&url, expected_state) {
            Some(Ok(code)) => {
                respond(
                    &mut stream,
                    "200 OK",
                    "Login successful!\nYou can now close this window.\n",
                );
                return Ok(code);
            }
            Some(Err(e)) => {
                respond(&mut stream, "400 Bad Request", "Error: authorization failed\n");
                return Err(e);
            }
            None => respond(&mut stream, "404 Not Found", "Not found\n"),
        }
    }
    Err(AuthError::Callback("listener closed".to_string()))
}

fn read_request_url(stream: &TcpStream) -> io::Result<Option<Url>> {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;
    // drain headers so closing the socket does not reset the connection
    let mut header = String::new();
    while reader.read_line(&mut header)? > 2 {
        header.clear();
    }
    let Some(target) = request_line.split_whitespace().nth(1) else {
        return Ok(None);
    };
    Ok(Url::parse("http://127.0.0.1")
        .and_then(|base| base.join(target))
        .ok())
}

/// `None` for requests unrelated to the redirect, e.g. favicon lookups.
fn callback_result(url: &Url, expected_state: &str) -> Option<Result<String, AuthError>> {
    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Some(Err(AuthError::Denied(error)));
    }
    if state.is_none() && code.is_none() {
        return None;
    }
    if state.as_deref() != Some(expected_state) {
        return Some(Err(AuthError::Callback("state parameter mismatch".to_string())));
    }
    Some(code.ok_or_else(|| AuthError::Callback("URL parameter 'code' is missing".to_string())))
}

/// The browser may hang up early; that never affects the outcome of the flow.
fn respond(stream: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {status}\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\r\n{body}",
        body.len()
    );
    if let Err(e) = stream.write_all(response.as_bytes()).and_then(|()| stream.flush()) {
        debug!("unable to answer browser: {e}");
    }
}
