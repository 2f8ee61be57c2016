use std::io::Write;
use std::path::Path;
use std::time::Duration;

use clap::Parser;

use gmail_agent::app::{run_send, run_summarize};
use gmail_agent::cli::{resolve_recipient, Action, Cli};
use gmail_agent::credentials::{
    load_client_secret, load_openai_api_key, FileTokenStore, CLIENT_SECRET_FILE,
    TOKEN_CACHE_FILE,
};
use gmail_agent::error::AgentError;
use gmail_agent::gmail_api::{
    Authenticator, BrowserConsentFlow, GmailClient, SystemClock,
};
use gmail_agent::summarizer::OpenAiGenerator;

#[tokio::main]
async fn main() {
    init_logger();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        let mut source = std::error::Error::source(&e);
        while let Some(cause) = source {
            eprintln!("  caused by: {cause}");
            source = cause.source();
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), AgentError> {
    // Credentials are checked before any network interaction.
    let secret = load_client_secret(Path::new(CLIENT_SECRET_FILE))?;
    let store = FileTokenStore::new(TOKEN_CACHE_FILE);

    // One shared client; every remote call gets a bounded timeout.
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .build()?;

    let authenticator = Authenticator::new(
        secret,
        store,
        BrowserConsentFlow::new(),
        SystemClock,
        http.clone(),
    );
    let token = authenticator.get_valid_token().await?;
    let mail = GmailClient::new(http.clone(), token.access_token);

    match cli.action {
        Action::Send => {
            let recipient = match resolve_recipient(cli.recipient) {
                Some(r) => r,
                None => prompt_for_recipient()?,
            };
            run_send(&mail, &recipient).await
        }
        Action::Summarize => {
            let api_key = load_openai_api_key(Path::new(CLIENT_SECRET_FILE))?;
            let generator = OpenAiGenerator::new(http, api_key);
            run_summarize(&mail, &generator).await.map(|_| ())
        }
    }
}

fn prompt_for_recipient() -> Result<String, AgentError> {
    print!("Enter recipient email address: ");
    std::io::stdout().flush().map_err(io_config_error)?;
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .map_err(io_config_error)?;
    Ok(line.trim().to_string())
}

fn io_config_error(source: std::io::Error) -> AgentError {
    AgentError::Config(gmail_agent::error::ConfigError::Io {
        path: std::path::PathBuf::from("<stdin>"),
        source,
    })
}

fn init_logger() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gmail_agent=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
