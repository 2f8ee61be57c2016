use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::credentials::{CachedToken, ClientSecret, TokenStore};
use crate::error::AuthError;

pub const SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/gmail.send",
    "https://www.googleapis.com/auth/gmail.readonly",
];

// Lifetime assumed when the token endpoint omits expires_in.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

// Interactive consent seam, mockable so the state machine below can be
// tested without a browser.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConsentFlow: Send + Sync {
    async fn authorize(
        &self,
        secret: &ClientSecret,
        scopes: Vec<String>,
    ) -> Result<CachedToken, AuthError>;
}

#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// Wire shape of the token endpoint response (refresh grant).
#[derive(Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

/// Owns the client secret for the process lifetime and produces a valid
/// access token: cached if unexpired, refreshed if possible, otherwise via
/// a fresh interactive consent. The persisted cache is overwritten wholesale
/// on every acquisition.
pub struct Authenticator<S, F, C> {
    secret: ClientSecret,
    store: S,
    consent: F,
    clock: C,
    http: reqwest::Client,
}

impl<S: TokenStore, F: ConsentFlow, C: Clock> Authenticator<S, F, C> {
    pub fn new(
        secret: ClientSecret,
        store: S,
        consent: F,
        clock: C,
        http: reqwest::Client,
    ) -> Self {
        Self {
            secret,
            store,
            consent,
            clock,
            http,
        }
    }

    pub async fn get_valid_token(&self) -> Result<CachedToken, AuthError> {
        if let Some(cached) = self.store.load()? {
            if cached.is_valid_at(self.clock.now()) {
                tracing::debug!("using cached access token");
                return Ok(cached);
            }

            // Expired: a single refresh attempt, then fall through to
            // interactive re-consent.
            if let Some(refresh_token) = &cached.refresh_token {
                match self.refresh(refresh_token).await {
                    Ok(mut token) => {
                        // Google often omits the refresh token on refresh
                        // grants; keep the one we had so the cache stays
                        // refreshable.
                        if token.refresh_token.is_none() {
                            token.refresh_token = Some(refresh_token.clone());
                        }
                        self.store.save(&token)?;
                        tracing::debug!("access token refreshed");
                        return Ok(token);
                    }
                    Err(e) => {
                        tracing::warn!(
                            "token refresh failed, falling back to interactive consent: {e}"
                        );
                    }
                }
            }
        }

        tracing::info!("starting interactive authorization");
        let scopes = SCOPES.iter().map(|s| s.to_string()).collect();
        let token = self.consent.authorize(&self.secret, scopes).await?;
        self.store.save(&token)?;
        Ok(token)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<CachedToken, AuthError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.secret.client_id.as_str()),
            ("client_secret", self.secret.client_secret.as_str()),
        ];

        let response = self
            .http
            .post(&self.secret.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(AuthError::TokenRequest)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenRejected { status, detail });
        }

        let body: TokenEndpointResponse =
            response.json().await.map_err(AuthError::TokenRequest)?;

        let lifetime = body.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        Ok(CachedToken {
            access_token: body.access_token,
            refresh_token: body.refresh_token,
            expires_at: self.clock.now() + Duration::seconds(lifetime),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MockTokenStore;
    use chrono::TimeZone;
    use mockall::predicate::eq;

    fn test_secret() -> ClientSecret {
        ClientSecret {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            auth_uri: "https://accounts.example.com/auth".to_string(),
            token_uri: "https://accounts.example.com/token".to_string(),
        }
    }

    fn fixed_clock(at: DateTime<Utc>) -> MockClock {
        let mut clock = MockClock::new();
        clock.expect_now().return_const(at);
        clock
    }

    fn token(access: &str, refresh: Option<&str>, expires_at: DateTime<Utc>) -> CachedToken {
        CachedToken {
            access_token: access.to_string(),
            refresh_token: refresh.map(|r| r.to_string()),
            expires_at,
        }
    }

    #[tokio::test]
    async fn test_valid_cached_token_skips_consent() {
        let now = Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap();
        let cached = token("cached-at", None, now + Duration::hours(1));

        let mut store = MockTokenStore::new();
        let loaded = cached.clone();
        store.expect_load().times(1).returning(move || Ok(Some(loaded.clone())));
        store.expect_save().times(0);

        let mut consent = MockConsentFlow::new();
        consent.expect_authorize().times(0);

        let auth = Authenticator::new(
            test_secret(),
            store,
            consent,
            fixed_clock(now),
            reqwest::Client::new(),
        );
        assert_eq!(auth.get_valid_token().await.unwrap(), cached);
    }

    #[tokio::test]
    async fn test_cached_token_just_before_expiry_skips_consent() {
        let expires_at = Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap();
        let cached = token("almost-expired", Some("rt"), expires_at);

        let mut store = MockTokenStore::new();
        let loaded = cached.clone();
        store.expect_load().returning(move || Ok(Some(loaded.clone())));

        let mut consent = MockConsentFlow::new();
        consent.expect_authorize().times(0);

        let auth = Authenticator::new(
            test_secret(),
            store,
            consent,
            fixed_clock(expires_at - Duration::seconds(1)),
            reqwest::Client::new(),
        );
        assert_eq!(auth.get_valid_token().await.unwrap(), cached);
    }

    #[tokio::test]
    async fn test_no_cached_token_runs_consent_and_persists() {
        let now = Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap();
        let fresh = token("fresh-at", Some("fresh-rt"), now + Duration::hours(1));

        let mut store = MockTokenStore::new();
        store.expect_load().returning(|| Ok(None));
        store
            .expect_save()
            .with(eq(fresh.clone()))
            .times(1)
            .returning(|_| Ok(()));

        let mut consent = MockConsentFlow::new();
        let granted = fresh.clone();
        consent
            .expect_authorize()
            .times(1)
            .returning(move |_, _| Ok(granted.clone()));

        let auth = Authenticator::new(
            test_secret(),
            store,
            consent,
            fixed_clock(now),
            reqwest::Client::new(),
        );
        assert_eq!(auth.get_valid_token().await.unwrap(), fresh);
    }

    #[tokio::test]
    async fn test_consent_denied_surfaces_error() {
        let now = Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap();

        let mut store = MockTokenStore::new();
        store.expect_load().returning(|| Ok(None));
        store.expect_save().times(0);

        let mut consent = MockConsentFlow::new();
        consent
            .expect_authorize()
            .returning(|_, _| Err(AuthError::ConsentDenied("access_denied".to_string())));

        let auth = Authenticator::new(
            test_secret(),
            store,
            consent,
            fixed_clock(now),
            reqwest::Client::new(),
        );
        assert!(matches!(
            auth.get_valid_token().await,
            Err(AuthError::ConsentDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_expired_token_without_refresh_runs_consent() {
        let now = Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap();
        let expired = token("stale", None, now - Duration::hours(1));
        let fresh = token("fresh", Some("rt"), now + Duration::hours(1));

        let mut store = MockTokenStore::new();
        let loaded = expired.clone();
        store.expect_load().returning(move || Ok(Some(loaded.clone())));
        store
            .expect_save()
            .with(eq(fresh.clone()))
            .times(1)
            .returning(|_| Ok(()));

        let mut consent = MockConsentFlow::new();
        let granted = fresh.clone();
        consent
            .expect_authorize()
            .times(1)
            .returning(move |_, _| Ok(granted.clone()));

        let auth = Authenticator::new(
            test_secret(),
            store,
            consent,
            fixed_clock(now),
            reqwest::Client::new(),
        );
        assert_eq!(auth.get_valid_token().await.unwrap(), fresh);
    }
}
