use crate::email_content::extract_plain_text_body;
use crate::error::FetchError;
use crate::types::{EmailMessage, Message, MessagePart, MessagesResponse};

use super::GMAIL_BASE_URL;

// How many recent refs to hydrate before picking the newest. The list call
// returns newest-first, but internalDate is what actually orders receipt.
const LATEST_PROBE_COUNT: usize = 5;

/// Fetch the newest message in the inbox: list recent INBOX refs, hydrate
/// them in full and select the one with the highest internalDate.
pub async fn fetch_latest_inbox_message(
    http: &reqwest::Client,
    token: &str,
) -> Result<EmailMessage, FetchError> {
    let list_url = format!(
        "{GMAIL_BASE_URL}/messages?labelIds=INBOX&maxResults={LATEST_PROBE_COUNT}"
    );
    let response = http
        .get(&list_url)
        .bearer_auth(token)
        .send()
        .await
        .map_err(FetchError::Http)?;

    let status = response.status();
    if !status.is_success() {
        let detail = response.text().await.unwrap_or_default();
        return Err(FetchError::Rejected { status, detail });
    }

    let listing: MessagesResponse = response.json().await.map_err(FetchError::Http)?;
    let refs = listing.messages.unwrap_or_default();
    if refs.is_empty() {
        return Err(FetchError::EmptyInbox);
    }

    let mut hydrated = Vec::with_capacity(refs.len());
    for msg_ref in refs {
        if let Some(id) = msg_ref.id {
            hydrated.push(fetch_message_by_id(http, token, &id).await?);
        }
    }

    newest_message(hydrated)
        .map(into_email)
        .ok_or(FetchError::EmptyInbox)
}

async fn fetch_message_by_id(
    http: &reqwest::Client,
    token: &str,
    id: &str,
) -> Result<Message, FetchError> {
    let url = format!("{GMAIL_BASE_URL}/messages/{id}?format=full");
    let response = http
        .get(&url)
        .bearer_auth(token)
        .send()
        .await
        .map_err(FetchError::Http)?;

    let status = response.status();
    if !status.is_success() {
        let detail = response.text().await.unwrap_or_default();
        return Err(FetchError::Rejected { status, detail });
    }

    response.json().await.map_err(FetchError::Http)
}

// Receipt order is internalDate, not list order.
pub fn newest_message(messages: Vec<Message>) -> Option<Message> {
    messages
        .into_iter()
        .max_by_key(|m| m.internal_date_millis())
}

fn header_value(payload: Option<&MessagePart>, name: &str) -> Option<String> {
    payload?
        .headers
        .as_ref()?
        .iter()
        .find(|h| {
            h.name
                .as_deref()
                .is_some_and(|n| n.eq_ignore_ascii_case(name))
        })
        .and_then(|h| h.value.clone())
}

fn into_email(message: Message) -> EmailMessage {
    let payload = message.payload.as_ref();
    let subject =
        header_value(payload, "Subject").unwrap_or_else(|| "(No Subject)".to_string());
    let sender =
        header_value(payload, "From").unwrap_or_else(|| "(Unknown Sender)".to_string());
    let snippet = message.snippet.clone().unwrap_or_default().trim().to_string();

    let body = message
        .payload
        .as_ref()
        .and_then(extract_plain_text_body)
        .filter(|b| !b.trim().is_empty())
        .unwrap_or_else(|| snippet.clone());

    EmailMessage {
        id: message.id.unwrap_or_default(),
        sender,
        subject,
        snippet,
        body,
    }
}
