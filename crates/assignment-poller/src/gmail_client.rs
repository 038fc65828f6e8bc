//! Gmail API client for listing and fetching mailbox messages.
//!
//! The client is a collaborator of the pipeline: it authenticates, lists
//! recent message ids (cheap, used by the sync probe) and fetches full
//! message records. Everything downstream operates on [`RawMessage`].

use anyhow::{Context, Result};
use base64::engine::{DecodePaddingMode, Engine as _, GeneralPurpose, GeneralPurposeConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use yup_oauth2::authenticator::DefaultAuthenticator;

use crate::config::{FilterCriteria, GmailConfig};

const GMAIL_SCOPE: &str = "https://mail.google.com/";
const BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1";

/// Bodies arrive urlsafe-base64 encoded, padded or not depending on the part.
const BODY_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &base64::alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// One fetched mailbox message, as consumed by the pipeline and persisted
/// in the snapshot file. Immutable once fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMessage {
    /// Mailbox-assigned identifier, stable across fetches
    pub id: String,
    /// Top-level headers (From, Subject, ...)
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub payload: MessagePart,
}

/// One node of the nested body-part tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessagePart {
    #[serde(default)]
    pub mime_type: String,
    /// Part content in its urlsafe-base64 transfer encoding
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

impl RawMessage {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Header filter: both the sender fragment and the subject fragment must
    /// appear (case-insensitively) in the corresponding header.
    pub fn matches_filter(&self, criteria: &FilterCriteria) -> bool {
        let from = self.header("From").unwrap_or("").to_lowercase();
        let subject = self.header("Subject").unwrap_or("").to_lowercase();

        from.contains(&criteria.from_contains.to_lowercase())
            && subject.contains(&criteria.subject_contains.to_lowercase())
    }

    /// First text/html part in the tree, decoded to UTF-8.
    pub fn html_body(&self) -> Option<String> {
        let part = self.payload.find_html()?;
        let data = part.data.as_ref()?;
        let bytes = BODY_ENGINE.decode(data.as_bytes()).ok()?;
        String::from_utf8(bytes).ok()
    }
}

impl MessagePart {
    fn find_html(&self) -> Option<&MessagePart> {
        if self.mime_type == "text/html" && self.data.is_some() {
            return Some(self);
        }
        for part in &self.parts {
            if let Some(found) = part.find_html() {
                return Some(found);
            }
        }
        None
    }
}

// Wire shapes of the messages.list / messages.get responses.

#[derive(Debug, Deserialize)]
struct MessageList {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiMessage {
    id: String,
    payload: Option<ApiPart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPart {
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    headers: Vec<ApiHeader>,
    #[serde(default)]
    body: Option<ApiBody>,
    #[serde(default)]
    parts: Vec<ApiPart>,
}

#[derive(Debug, Deserialize)]
struct ApiHeader {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct ApiBody {
    #[serde(default)]
    data: Option<String>,
}

impl ApiMessage {
    fn into_raw(self) -> RawMessage {
        let payload = self.payload.unwrap_or_default();
        let headers = payload
            .headers
            .iter()
            .map(|h| (h.name.clone(), h.value.clone()))
            .collect();

        RawMessage {
            id: self.id,
            headers,
            payload: convert_part(payload),
        }
    }
}

fn convert_part(part: ApiPart) -> MessagePart {
    MessagePart {
        mime_type: part.mime_type.unwrap_or_default(),
        data: part.body.and_then(|b| b.data),
        parts: part.parts.into_iter().map(convert_part).collect(),
    }
}

/// Authenticated mailbox handle, acquired per run scope.
pub struct GmailClient {
    http: reqwest::Client,
    auth: DefaultAuthenticator,
}

impl GmailClient {
    pub async fn connect(config: &GmailConfig) -> Result<Self> {
        let secret = yup_oauth2::read_application_secret(&config.credentials_path)
            .await
            .context("Failed to read OAuth credentials")?;

        let auth = yup_oauth2::InstalledFlowAuthenticator::builder(
            secret,
            yup_oauth2::InstalledFlowReturnMethod::HTTPRedirect,
        )
        .persist_tokens_to_disk(config.token_cache_path.clone())
        .build()
        .await
        .context("Failed to build authenticator")?;

        Ok(Self {
            http: reqwest::Client::new(),
            auth,
        })
    }

    async fn bearer_token(&self) -> Result<String> {
        let token = self
            .auth
            .token(&[GMAIL_SCOPE])
            .await
            .context("Failed to obtain access token")?;

        token
            .token()
            .map(str::to_string)
            .context("Authenticator returned no access token")
    }

    /// List ids of the most recent messages, newest first. No detail fetch.
    /// Transient failures are retried with a fixed delay before giving up.
    pub async fn list_message_ids(
        &self,
        max_results: u32,
        retries: u32,
        retry_delay: Duration,
    ) -> Result<Vec<String>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_list_message_ids(max_results).await {
                Ok(ids) => return Ok(ids),
                Err(e) if attempt < retries => {
                    tracing::warn!(
                        "Message list failed (attempt {}/{}): {}",
                        attempt,
                        retries,
                        e
                    );
                    tokio::time::sleep(retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_list_message_ids(&self, max_results: u32) -> Result<Vec<String>> {
        let token = self.bearer_token().await?;

        let response = self
            .http
            .get(format!("{}/users/me/messages", BASE_URL))
            .bearer_auth(&token)
            .query(&[("maxResults", max_results.to_string())])
            .send()
            .await
            .context("Failed to list messages")?
            .error_for_status()
            .context("Message list request failed")?;

        let list: MessageList = response
            .json()
            .await
            .context("Malformed message list response")?;

        Ok(list.messages.into_iter().map(|m| m.id).collect())
    }

    /// Fetch one full message record, retrying transient failures with a
    /// fixed delay before giving up on the item.
    pub async fn get_message(
        &self,
        message_id: &str,
        retries: u32,
        retry_delay: Duration,
    ) -> Result<RawMessage> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_get_message(message_id).await {
                Ok(message) => return Ok(message),
                Err(e) if attempt < retries => {
                    tracing::warn!(
                        "Fetch of message {} failed (attempt {}/{}): {}",
                        message_id,
                        attempt,
                        retries,
                        e
                    );
                    tokio::time::sleep(retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_get_message(&self, message_id: &str) -> Result<RawMessage> {
        let token = self.bearer_token().await?;

        let response = self
            .http
            .get(format!("{}/users/me/messages/{}", BASE_URL, message_id))
            .bearer_auth(&token)
            .query(&[("format", "full")])
            .send()
            .await
            .context("Failed to get message")?
            .error_for_status()
            .context("Message get request failed")?;

        let message: ApiMessage = response
            .json()
            .await
            .context("Malformed message response")?;

        Ok(message.into_raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;

    fn encode(body: &str) -> String {
        BODY_ENGINE.encode(body)
    }

    fn message_with_headers(from: &str, subject: &str) -> RawMessage {
        RawMessage {
            id: "m1".to_string(),
            headers: HashMap::from([
                ("From".to_string(), from.to_string()),
                ("Subject".to_string(), subject.to_string()),
            ]),
            payload: MessagePart::default(),
        }
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let message = message_with_headers("Classroom <no-reply@classroom.google.com>", "Hi");
        assert!(message.header("from").is_some());
        assert!(message.header("SUBJECT").is_some());
        assert!(message.header("Date").is_none());
    }

    #[test]
    fn filter_requires_both_headers_to_match() {
        let criteria = FilterCriteria {
            from_contains: "no-reply@classroom.google.com".to_string(),
            subject_contains: "new assignment".to_string(),
        };

        let hit = message_with_headers(
            "Classroom <No-Reply@Classroom.Google.Com>",
            "New assignment: \"Essay 1\"",
        );
        assert!(hit.matches_filter(&criteria));

        let wrong_sender =
            message_with_headers("someone@example.com", "New assignment: \"Essay 1\"");
        assert!(!wrong_sender.matches_filter(&criteria));

        let wrong_subject = message_with_headers(
            "Classroom <no-reply@classroom.google.com>",
            "New announcement",
        );
        assert!(!wrong_subject.matches_filter(&criteria));
    }

    #[test]
    fn html_body_walks_nested_parts() {
        let html = "<div>Essay 1</div>";
        let message = RawMessage {
            id: "m1".to_string(),
            headers: HashMap::new(),
            payload: MessagePart {
                mime_type: "multipart/alternative".to_string(),
                data: None,
                parts: vec![
                    MessagePart {
                        mime_type: "text/plain".to_string(),
                        data: Some(encode("Essay 1")),
                        parts: vec![],
                    },
                    MessagePart {
                        mime_type: "multipart/related".to_string(),
                        data: None,
                        parts: vec![MessagePart {
                            mime_type: "text/html".to_string(),
                            data: Some(encode(html)),
                            parts: vec![],
                        }],
                    },
                ],
            },
        };

        assert_eq!(message.html_body().as_deref(), Some(html));
    }

    #[test]
    fn html_body_accepts_unpadded_data() {
        // "a" encodes to a single urlsafe block that needs padding
        let message = RawMessage {
            id: "m1".to_string(),
            headers: HashMap::new(),
            payload: MessagePart {
                mime_type: "text/html".to_string(),
                data: Some("YQ".to_string()),
                parts: vec![],
            },
        };

        assert_eq!(message.html_body().as_deref(), Some("a"));
    }

    #[test]
    fn html_body_missing_when_no_html_part() {
        let message = RawMessage {
            id: "m1".to_string(),
            headers: HashMap::new(),
            payload: MessagePart {
                mime_type: "text/plain".to_string(),
                data: Some(encode("plain only")),
                parts: vec![],
            },
        };

        assert!(message.html_body().is_none());
    }

    #[test]
    fn api_message_converts_to_raw() {
        let api: ApiMessage = serde_json::from_value(serde_json::json!({
            "id": "18f0a",
            "threadId": "18f0a",
            "payload": {
                "mimeType": "multipart/alternative",
                "headers": [
                    {"name": "From", "value": "no-reply@classroom.google.com"},
                    {"name": "Subject", "value": "New assignment: \"Essay 1\""}
                ],
                "parts": [
                    {"mimeType": "text/html", "body": {"data": encode("<div>Essay 1</div>")}}
                ]
            }
        }))
        .unwrap();

        let raw = api.into_raw();
        assert_eq!(raw.id, "18f0a");
        assert_eq!(raw.header("from"), Some("no-reply@classroom.google.com"));
        assert_eq!(raw.html_body().as_deref(), Some("<div>Essay 1</div>"));
    }
}
