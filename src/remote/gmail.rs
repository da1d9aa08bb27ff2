use base64::{
    Engine as _,
    engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD},
};
use jiff::Timestamp;
use log::debug;
use serde::Deserialize;

use super::{
    FetchedMessage, InvalidMessageIdError, ListQuery, MessageFetcher, MessageId, MessageLister,
    RemoteError, RemotePage, Transport,
};

const API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListMessagesResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessageResponse {
    raw: Option<String>,
    internal_date: Option<String>,
}

/// Gmail REST client for one account, `"me"` being the authorized user.
pub struct GmailClient<T> {
    transport: T,
    messages_url: String,
}

impl<T: Transport> GmailClient<T> {
    pub fn new(transport: T, user: &str) -> Self {
        let messages_url = format!("{API_BASE}/{}/messages", urlencoding::encode(user));
        Self {
            transport,
            messages_url,
        }
    }
}

impl<T: Transport> MessageLister for GmailClient<T> {
    fn list_page(
        &self,
        query: &ListQuery,
        page_token: Option<&str>,
    ) -> Result<RemotePage, RemoteError> {
        let page_size = query.page_size().to_string();
        let mut params = vec![("maxResults", page_size.as_str()), ("q", query.filter())];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }

        let body = self.transport.get(&self.messages_url, &params)?;
        let response: ListMessagesResponse = serde_json::from_str(&body)?;
        debug!("listed {} messages", response.messages.len());

        let ids = response
            .messages
            .into_iter()
            .map(|message| MessageId::try_from(message.id))
            .collect::<Result<Vec<_>, InvalidMessageIdError>>()?;
        Ok(RemotePage {
            ids,
            next_page_token: response.next_page_token.filter(|token| !token.is_empty()),
        })
    }
}

impl<T: Transport> MessageFetcher for GmailClient<T> {
    fn fetch(&self, id: &MessageId) -> Result<FetchedMessage, RemoteError> {
        let url = format!("{}/{}", self.messages_url, urlencoding::encode(id.as_str()));
        let body = self.transport.get(&url, &[("format", "raw")])?;
        let response: RawMessageResponse = serde_json::from_str(&body)?;

        let raw = response
            .raw
            .ok_or_else(|| RemoteError::MissingContent { id: id.clone() })?;
        let content = decode_raw(&raw).map_err(|source| RemoteError::Decode {
            id: id.clone(),
            source,
        })?;
        let internal_date = response.internal_date.unwrap_or_default();
        let timestamp = parse_internal_date(&internal_date).ok_or_else(|| {
            RemoteError::InvalidTimestamp {
                id: id.clone(),
                value: internal_date,
            }
        })?;

        Ok(FetchedMessage { content, timestamp })
    }
}

fn decode_raw(raw: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE
        .decode(raw.as_bytes())
        .or_else(|_| URL_SAFE_NO_PAD.decode(raw.as_bytes()))
}

fn parse_internal_date(value: &str) -> Option<Timestamp> {
    let millis = value.parse::<i64>().ok()?;
    Timestamp::from_millisecond(millis).ok()
}
