use crate::types::MessagePart;
use base64::engine::general_purpose::URL_SAFE;
use base64::engine::Engine;

// Decode a base64url body chunk, tolerating the missing padding Gmail
// sometimes produces. Undecodable input yields an empty string rather than an
// error; a snippet fallback covers that case upstream.
pub fn decode_base64url(data: &str) -> String {
    if data.is_empty() {
        return String::new();
    }
    let padding = "=".repeat((4 - data.len() % 4) % 4);
    let padded = format!("{data}{padding}");
    URL_SAFE
        .decode(padded.as_bytes())
        .ok()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

// Recursively extract the plain-text body from a Gmail payload. Prefers a
// text/plain part anywhere in the tree; falls back to whatever body data the
// top-level part carries (e.g. a bare text/html message).
pub fn extract_plain_text_body(payload: &MessagePart) -> Option<String> {
    if payload.mime_type.as_deref() == Some("text/plain") {
        if let Some(data) = payload.body.as_ref().and_then(|b| b.data.as_ref()) {
            return Some(decode_base64url(data));
        }
    }

    if let Some(parts) = &payload.parts {
        for part in parts {
            if let Some(text) = extract_plain_text_body(part) {
                if !text.trim().is_empty() {
                    return Some(text);
                }
            }
        }
    }

    // Last resort: decode the part's own body regardless of mime type
    if let Some(data) = payload.body.as_ref().and_then(|b| b.data.as_ref()) {
        let text = decode_base64url(data);
        if !text.is_empty() {
            return Some(text);
        }
    }

    None
}
