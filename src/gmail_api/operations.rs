use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::engine::Engine;

use crate::error::SendError;
use crate::types::{SendMessageResponse, SentMessage};

use super::GMAIL_BASE_URL;

// RFC 2822 text/plain envelope for the outbound message.
fn format_rfc2822(to: &str, subject: &str, body: &str) -> String {
    let mut message = String::new();
    message.push_str(&format!("To: {to}\r\n"));
    message.push_str(&format!("Subject: {subject}\r\n"));
    message.push_str("Content-Type: text/plain; charset=utf-8\r\n");
    message.push_str("\r\n");
    message.push_str(body);
    message
}

pub fn build_raw_message(to: &str, subject: &str, body: &str) -> String {
    URL_SAFE_NO_PAD.encode(format_rfc2822(to, subject, body).as_bytes())
}

/// Submit one outbound message. Any non-2xx response is a `SendError` with
/// the provider detail preserved; the caller has no retry logic that would
/// need finer-grained kinds.
pub async fn send_email(
    http: &reqwest::Client,
    token: &str,
    to: &str,
    subject: &str,
    body: &str,
) -> Result<SentMessage, SendError> {
    let request_body = serde_json::json!({
        "raw": build_raw_message(to, subject, body),
    });

    let send_url = format!("{GMAIL_BASE_URL}/messages/send");
    let response = http
        .post(&send_url)
        .bearer_auth(token)
        .json(&request_body)
        .send()
        .await
        .map_err(SendError::Http)?;

    let status = response.status();
    if !status.is_success() {
        let detail = response.text().await.unwrap_or_default();
        return Err(SendError::Rejected { status, detail });
    }

    let sent: SendMessageResponse = response.json().await.map_err(SendError::Http)?;
    Ok(SentMessage {
        id: sent.id,
        thread_id: sent.thread_id,
    })
}
