use serde::de::DeserializeOwned;
use std::io::Read;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::types::*;

pub const DEFAULT_API_BASE_URL: &str = "https://gmail.googleapis.com";

/// Upper bound on ids accepted by a single `batchModify` request.
const BATCH_MODIFY_LIMIT: usize = 1000;

const UNREAD_LABEL: &str = "UNREAD";

/// Blocking Gmail v1 REST client for one user.
///
/// Not meant to be shared between concurrent runs; create one client per
/// caller.
pub struct GmailClient {
    agent: ureq::Agent,
    api_base_url: String,
    user_id: String,
    access_token: String,
}

#[derive(Debug, Error)]
pub enum GmailError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("HTTP {code} error: {body}")]
    Status { code: u16, body: String },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("API error: {0}")]
    Api(String),
}

impl GmailClient {
    pub fn new(api_base_url: &str, user_id: &str, access_token: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(120))
            .build();
        GmailClient {
            agent,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            user_id: user_id.to_string(),
            access_token: access_token.to_string(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/gmail/v1/users/{}/messages",
            self.api_base_url, self.user_id
        )
    }

    /// Send a prepared request and return the raw response body.
    fn execute(
        &self,
        request: ureq::Request,
        json_body: Option<serde_json::Value>,
    ) -> Result<String, GmailError> {
        let request = request.set("Authorization", &self.auth_header());
        debug!("[Gmail] {} {}", request.method(), request.url());

        let result = match json_body {
            Some(body) => request.send_json(body),
            None => request.call(),
        };

        match result {
            Ok(resp) => {
                let status = resp.status();
                // Attachment bodies can exceed the into_string size cap.
                let mut bytes = Vec::new();
                resp.into_reader()
                    .read_to_end(&mut bytes)
                    .map_err(|e| GmailError::Parse(format!("Failed to read response: {}", e)))?;
                let body = String::from_utf8(bytes)
                    .map_err(|e| GmailError::Parse(format!("Response is not UTF-8: {}", e)))?;
                debug!(
                    "[Gmail] Got {} response ({} bytes): {}",
                    status,
                    body.len(),
                    truncate_str(&body, 500)
                );
                Ok(body)
            }
            Err(ureq::Error::Status(code, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                error!("[Gmail] HTTP error {}: {}", code, truncate_str(&body, 500));

                if code == 401 {
                    return Err(GmailError::Http(
                        "Authentication failed (401 Unauthorized)".to_string(),
                    ));
                }

                Err(GmailError::Status {
                    code,
                    body: if body.is_empty() {
                        "(empty response)".to_string()
                    } else {
                        truncate_str(&body, 200).to_string()
                    },
                })
            }
            Err(e) => {
                error!("[Gmail] Connection error: {}", e);
                Err(GmailError::Http(e.to_string()))
            }
        }
    }

    fn get_json<T: DeserializeOwned>(&self, request: ureq::Request) -> Result<T, GmailError> {
        let body = self.execute(request, None)?;
        serde_json::from_str(&body).map_err(|e| {
            GmailError::Parse(format!(
                "Failed to parse response: {}. Response was: {}",
                e,
                truncate_str(&body, 500)
            ))
        })
    }

    /// List message summaries matching a search-box style query, following
    /// `nextPageToken` until the listing is exhausted.
    pub fn list_messages(&self, query: &str) -> Result<Vec<Message>, GmailError> {
        info!("[Gmail] messages.list for {} (q: {:?})", self.user_id, query);

        let url = self.messages_url();
        let mut messages = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.agent.get(&url);
            if !query.is_empty() {
                request = request.query("q", query);
            }
            if let Some(token) = &page_token {
                request = request.query("pageToken", token);
            }

            let page: ListMessagesResponse = self.get_json(request)?;
            debug!("[Gmail] messages.list page with {} ids", page.messages.len());
            messages.extend(page.messages);

            match page.next_page_token {
                Some(token) if page_token.as_deref() == Some(token.as_str()) => {
                    warn!(
                        "[Gmail] messages.list repeated page token {:?}, stopping",
                        token
                    );
                    break;
                }
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        info!("[Gmail] messages.list returned {} messages", messages.len());
        Ok(messages)
    }

    pub fn get_message(&self, id: &str) -> Result<Message, GmailError> {
        info!("[Gmail] messages.get {}", id);
        let url = format!("{}/{}", self.messages_url(), id);
        let request = self.agent.get(&url).query("format", "full");
        let message: Message = self.get_json(request)?;
        if message.id != id {
            return Err(GmailError::Api(format!(
                "messages.get for {} returned message {}",
                id, message.id
            )));
        }
        Ok(message)
    }

    pub fn get_attachment(
        &self,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<MessagePartBody, GmailError> {
        info!(
            "[Gmail] messages.attachments.get {} for message {}",
            truncate_str(attachment_id, 32),
            message_id
        );
        let url = format!(
            "{}/{}/attachments/{}",
            self.messages_url(),
            message_id,
            attachment_id
        );
        let body: MessagePartBody = self.get_json(self.agent.get(&url))?;
        info!("[Gmail] Attachment downloaded, {} bytes", body.size);
        Ok(body)
    }

    /// Remove the `UNREAD` label from every id. Ids are sent in as few
    /// requests as the API allows.
    pub fn mark_messages_read(&self, ids: &[String]) -> Result<(), GmailError> {
        if ids.is_empty() {
            return Ok(());
        }

        info!("[Gmail] messages.batchModify marking {} messages as read", ids.len());

        let url = format!("{}/batchModify", self.messages_url());
        for chunk in ids.chunks(BATCH_MODIFY_LIMIT) {
            let request = BatchModifyRequest {
                ids: chunk,
                remove_label_ids: vec![UNREAD_LABEL],
            };
            let body = serde_json::to_value(&request)
                .map_err(|e| GmailError::Parse(format!("Failed to serialize request: {}", e)))?;
            self.execute(
                self.agent
                    .post(&url)
                    .set("Content-Type", "application/json"),
                Some(body),
            )?;
        }

        Ok(())
    }
}

fn truncate_str(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        s
    } else {
        // Find a valid UTF-8 boundary
        let mut end = max_len;
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        &s[..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_str_respects_char_boundary() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello", 3), "hel");
        assert_eq!(truncate_str("héllo", 2), "h");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = GmailClient::new("https://example.com/", "me", "token");
        assert_eq!(
            client.messages_url(),
            "https://example.com/gmail/v1/users/me/messages"
        );
        assert_eq!(client.auth_header(), "Bearer token");
    }

    #[test]
    fn test_mark_no_messages_read_is_noop() {
        // Unroutable base URL: any request would fail.
        let client = GmailClient::new("http://127.0.0.1:1", "me", "token");
        assert!(client.mark_messages_read(&[]).is_ok());
    }

    #[test]
    fn test_error_display() {
        let err = GmailError::Status {
            code: 404,
            body: "not found".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 404 error: not found");
        assert_eq!(
            GmailError::Api("boom".to_string()).to_string(),
            "API error: boom"
        );
    }
}
