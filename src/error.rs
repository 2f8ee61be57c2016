use std::path::PathBuf;
use thiserror::Error;

// Configuration and local-file failures. Reading the token cache and the
// client secret file both land here; no network is involved.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("credential file not found: {0}")]
    MissingClientSecret(PathBuf),

    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(
        "OpenAI API key not found; set OPENAI_API_KEY or add `openai_api_key` to {0}"
    )]
    MissingOpenAiKey(PathBuf),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("authorization was denied: {0}")]
    ConsentDenied(String),

    #[error("no authorization code received before the timeout")]
    ConsentTimeout,

    #[error("redirect callback was malformed: {0}")]
    BadRedirect(String),

    #[error("state parameter mismatch in redirect callback")]
    StateMismatch,

    #[error("could not bind the local redirect listener: {0}")]
    Listener(String),

    #[error("token endpoint request failed")]
    TokenRequest(#[source] reqwest::Error),

    #[error("token endpoint returned {status}: {detail}")]
    TokenRejected {
        status: reqwest::StatusCode,
        detail: String,
    },

    #[error("authorization code exchange failed: {0}")]
    Exchange(String),
}

// Send and fetch errors stay coarse on purpose: the provider detail is kept
// in the message but there is no retry logic that would need to tell a quota
// failure from a malformed address.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("send request failed")]
    Http(#[source] reqwest::Error),

    #[error("gmail rejected the message ({status}): {detail}")]
    Rejected {
        status: reqwest::StatusCode,
        detail: String,
    },
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("inbox fetch failed")]
    Http(#[source] reqwest::Error),

    #[error("gmail returned {status}: {detail}")]
    Rejected {
        status: reqwest::StatusCode,
        detail: String,
    },

    #[error("the inbox contains no messages")]
    EmptyInbox,
}

#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("text generation request failed")]
    Http(#[source] reqwest::Error),

    #[error("text generation API returned {status}: {detail}")]
    Rejected {
        status: reqwest::StatusCode,
        detail: String,
    },

    #[error("the response contained no completions")]
    NoCompletion,
}

// Umbrella error surfaced at the CLI boundary. Every failure propagates here
// untouched; main prints the chain to stderr and exits non-zero.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Send(#[from] SendError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Summarize(#[from] SummarizeError),

    #[error("failed to build the HTTP client")]
    Http(#[from] reqwest::Error),
}
