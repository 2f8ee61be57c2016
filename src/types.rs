use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    pub messages: Option<Vec<MessageRef>>,
}

#[derive(Debug, Deserialize)]
pub struct MessageRef {
    pub id: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Message {
    pub id: Option<String>,
    pub snippet: Option<String>,
    pub payload: Option<MessagePart>,
    // Epoch milliseconds as a string, per the Gmail API.
    #[serde(rename = "internalDate")]
    pub internal_date: Option<String>,
}

impl Message {
    pub fn internal_date_millis(&self) -> i64 {
        self.internal_date
            .as_deref()
            .and_then(|d| d.parse::<i64>().ok())
            .unwrap_or(0)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MessagePart {
    #[serde(rename = "mimeType")]
    pub mime_type: Option<String>,
    pub headers: Option<Vec<Header>>,
    pub body: Option<MessagePartBody>,
    pub parts: Option<Vec<MessagePart>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Header {
    pub name: Option<String>,
    pub value: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MessagePartBody {
    pub data: Option<String>,
}

// Response body of users/me/messages/send.
#[derive(Debug, Deserialize)]
pub struct SendMessageResponse {
    pub id: String,
    #[serde(rename = "threadId")]
    pub thread_id: Option<String>,
}

/// Provider identifiers for a successfully sent message.
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub id: String,
    pub thread_id: Option<String>,
}

/// An inbound message reduced to what the agent needs: display headers, the
/// snippet and the extracted plain-text body. Transient within a single run.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub id: String,
    pub sender: String,
    pub subject: String,
    pub snippet: String,
    pub body: String,
}
