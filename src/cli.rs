use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    /// Send the templated email or summarize the newest inbox message.
    #[clap(long, value_enum, default_value_t = Action::Send)]
    pub action: Action,

    /// Recipient email address (send action only). Falls back to the
    /// RECIPIENT_EMAIL environment variable, then to an interactive prompt.
    pub recipient: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Send,
    Summarize,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Action::Send => "send",
            Action::Summarize => "summarize",
        })
    }
}

/// Argument wins over RECIPIENT_EMAIL; blank values are treated as unset.
pub fn resolve_recipient(arg: Option<String>) -> Option<String> {
    arg.filter(|r| !r.trim().is_empty()).or_else(|| {
        std::env::var("RECIPIENT_EMAIL")
            .ok()
            .filter(|r| !r.trim().is_empty())
    })
}
