use serde::{Deserialize, Serialize};

// Message listing
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMessagesResponse {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub result_size_estimate: Option<u64>,
}

/// A Gmail message. Listing returns only `id` and `thread_id`; `payload`
/// is populated by a full fetch.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub label_ids: Vec<String>,
    #[serde(default)]
    pub payload: Option<MessagePart>,
}

impl Message {
    pub fn summary(id: &str) -> Self {
        Message {
            id: id.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default)]
    pub part_id: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub headers: Vec<MessagePartHeader>,
    #[serde(default)]
    pub body: MessagePartBody,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct MessagePartHeader {
    pub name: String,
    pub value: String,
}

/// Part body as sent by the API. Large bodies carry only an
/// `attachment_id` and must be fetched separately.
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessagePartBody {
    #[serde(default)]
    pub attachment_id: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyRef<'a> {
    Inline(&'a str),
    Remote(&'a str),
}

impl MessagePartBody {
    pub fn inline(data: &str) -> Self {
        MessagePartBody {
            attachment_id: None,
            size: data.len() as u64,
            data: Some(data.to_string()),
        }
    }

    pub fn remote(attachment_id: &str) -> Self {
        MessagePartBody {
            attachment_id: Some(attachment_id.to_string()),
            size: 0,
            data: None,
        }
    }

    pub fn reference(&self) -> BodyRef<'_> {
        match self.attachment_id.as_deref() {
            Some(id) if !id.is_empty() => BodyRef::Remote(id),
            _ => BodyRef::Inline(self.data.as_deref().unwrap_or("")),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchModifyRequest<'a> {
    pub ids: &'a [String],
    pub remove_label_ids: Vec<&'static str>,
}
