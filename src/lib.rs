pub mod app;
pub mod cli;
pub mod credentials;
pub mod email_content;
pub mod error;
pub mod gmail_api;
pub mod summarizer;
pub mod types;
