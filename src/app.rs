use crate::error::AgentError;
use crate::gmail_api::MailTransport;
use crate::summarizer::{summarize, TextGenerator};

// The fixed outbound template.
pub const TEMPLATE_SUBJECT: &str = "Hello from Gullie Agent";
pub const TEMPLATE_BODY: &str = "hello from jolie";

/// Send the templated email to `recipient` and report the provider ids.
pub async fn run_send<M: MailTransport + ?Sized>(
    mail: &M,
    recipient: &str,
) -> Result<(), AgentError> {
    println!("Sending email to: {recipient}");
    println!("Subject: {TEMPLATE_SUBJECT}");
    println!("Body: {TEMPLATE_BODY}");

    let sent = mail.send(recipient, TEMPLATE_SUBJECT, TEMPLATE_BODY).await?;

    println!("Message Id: {}", sent.id);
    if let Some(thread_id) = &sent.thread_id {
        println!("Thread Id: {thread_id}");
    }
    println!("Email sent successfully.");
    Ok(())
}

/// Fetch the newest inbox message and print a generated summary. There is no
/// fallback to the raw body when generation fails.
pub async fn run_summarize<M, G>(mail: &M, generator: &G) -> Result<String, AgentError>
where
    M: MailTransport + ?Sized,
    G: TextGenerator + ?Sized,
{
    let latest = mail.fetch_latest_inbox_message().await?;

    println!("Latest email:");
    println!("From: {}", latest.sender);
    println!("Subject: {}", latest.subject);
    if !latest.snippet.is_empty() {
        println!("Snippet: {}", latest.snippet);
    }

    println!("\nGenerating summary...");
    let summary = summarize(generator, &latest).await?;

    println!("\nSummary:");
    println!("{summary}");
    Ok(summary)
}
