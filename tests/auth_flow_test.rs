use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tiny_http::{Header, Response, Server};

use gmail_agent::credentials::{CachedToken, ClientSecret, TokenStore};
use gmail_agent::error::{AuthError, ConfigError};
use gmail_agent::gmail_api::{Authenticator, Clock, ConsentFlow};

// In-memory token store whose contents stay observable after the
// authenticator takes ownership.
#[derive(Clone, Default)]
struct MemoryStore {
    inner: Arc<Mutex<Option<CachedToken>>>,
}

impl TokenStore for MemoryStore {
    fn load(&self) -> Result<Option<CachedToken>, ConfigError> {
        Ok(self.inner.lock().unwrap().clone())
    }

    fn save(&self, token: &CachedToken) -> Result<(), ConfigError> {
        *self.inner.lock().unwrap() = Some(token.clone());
        Ok(())
    }
}

struct FixedClock(DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

// Consent stub that counts invocations and hands back a canned token.
#[derive(Clone)]
struct CountingConsent {
    calls: Arc<AtomicUsize>,
    token: CachedToken,
}

impl CountingConsent {
    fn new(token: CachedToken) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            token,
        }
    }
}

#[async_trait]
impl ConsentFlow for CountingConsent {
    async fn authorize(
        &self,
        _secret: &ClientSecret,
        _scopes: Vec<String>,
    ) -> Result<CachedToken, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.token.clone())
    }
}

fn secret_with_token_uri(token_uri: String) -> ClientSecret {
    ClientSecret {
        client_id: "test-client".to_string(),
        client_secret: "test-secret".to_string(),
        auth_uri: "http://127.0.0.1:1/auth".to_string(),
        token_uri,
    }
}

fn token(access: &str, refresh: Option<&str>, expires_at: DateTime<Utc>) -> CachedToken {
    CachedToken {
        access_token: access.to_string(),
        refresh_token: refresh.map(|r| r.to_string()),
        expires_at,
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap()
}

// Serve exactly one response at an ephemeral port and return its URL.
fn spawn_token_endpoint(status: u16, body: &'static str) -> String {
    let server = Server::http("127.0.0.1:0").unwrap();
    let port = server.server_addr().to_ip().unwrap().port();
    std::thread::spawn(move || {
        if let Ok(request) = server.recv() {
            let response = Response::from_string(body)
                .with_status_code(status)
                .with_header(
                    Header::from_bytes(b"Content-Type", b"application/json").unwrap(),
                );
            let _ = request.respond(response);
        }
    });
    format!("http://127.0.0.1:{port}/token")
}

#[tokio::test(flavor = "multi_thread")]
async fn expired_token_is_refreshed_and_cache_overwritten() {
    let token_uri = spawn_token_endpoint(
        200,
        r#"{"access_token":"refreshed-at","expires_in":3600,"token_type":"Bearer"}"#,
    );

    let store = MemoryStore::default();
    store
        .save(&token("stale-at", Some("rt-1"), now() - Duration::hours(1)))
        .unwrap();

    let consent = CountingConsent::new(token("unused", None, now() + Duration::hours(1)));
    let consent_calls = consent.calls.clone();

    let authenticator = Authenticator::new(
        secret_with_token_uri(token_uri),
        store.clone(),
        consent,
        FixedClock(now()),
        reqwest::Client::new(),
    );

    let refreshed = authenticator.get_valid_token().await.unwrap();
    assert_eq!(refreshed.access_token, "refreshed-at");
    // The refresh grant omitted a refresh token; the old one is kept so the
    // cache stays refreshable.
    assert_eq!(refreshed.refresh_token.as_deref(), Some("rt-1"));
    assert_eq!(refreshed.expires_at, now() + Duration::seconds(3600));

    // Cache overwritten wholesale, consent never ran.
    assert_eq!(store.load().unwrap().unwrap(), refreshed);
    assert_eq!(consent_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_refresh_falls_back_to_consent() {
    let token_uri = spawn_token_endpoint(400, r#"{"error":"invalid_grant"}"#);

    let store = MemoryStore::default();
    store
        .save(&token("stale-at", Some("revoked-rt"), now() - Duration::hours(1)))
        .unwrap();

    let fresh = token("consent-at", Some("rt-2"), now() + Duration::hours(1));
    let consent = CountingConsent::new(fresh.clone());
    let consent_calls = consent.calls.clone();

    let authenticator = Authenticator::new(
        secret_with_token_uri(token_uri),
        store.clone(),
        consent,
        FixedClock(now()),
        reqwest::Client::new(),
    );

    let obtained = authenticator.get_valid_token().await.unwrap();
    assert_eq!(obtained, fresh);
    assert_eq!(consent_calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.load().unwrap().unwrap(), fresh);
}

#[tokio::test(flavor = "multi_thread")]
async fn valid_cached_token_needs_no_network_or_consent() {
    // Unroutable token endpoint: any network attempt would fail the test.
    let store = MemoryStore::default();
    let cached = token("live-at", Some("rt"), now() + Duration::minutes(5));
    store.save(&cached).unwrap();

    let consent = CountingConsent::new(token("unused", None, now()));
    let consent_calls = consent.calls.clone();

    let authenticator = Authenticator::new(
        secret_with_token_uri("http://127.0.0.1:1/token".to_string()),
        store,
        consent,
        FixedClock(now()),
        reqwest::Client::new(),
    );

    let obtained = authenticator.get_valid_token().await.unwrap();
    assert_eq!(obtained, cached);
    assert_eq!(consent_calls.load(Ordering::SeqCst), 0);
}
