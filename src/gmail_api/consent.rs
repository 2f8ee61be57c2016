use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret as OauthClientSecret, CsrfToken,
    PkceCodeChallenge, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use tiny_http::{Response, Server};
use tokio::sync::oneshot;
use url::Url;

use crate::credentials::{CachedToken, ClientSecret};
use crate::error::AuthError;

use super::auth::ConsentFlow;

// How long to wait for the user to finish the browser consent.
const CALLBACK_TIMEOUT_SECS: u64 = 180;

const SUCCESS_PAGE: &str = "Authorization received. You can close this tab.";
const DENIED_PAGE: &str = "Authorization was not granted. You can close this tab.";

/// Interactive authorization-code grant with PKCE. Binds a short-lived
/// loopback listener on an ephemeral port, opens the system browser and
/// exchanges the returned code at the token endpoint.
pub struct BrowserConsentFlow;

impl BrowserConsentFlow {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BrowserConsentFlow {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConsentFlow for BrowserConsentFlow {
    async fn authorize(
        &self,
        secret: &ClientSecret,
        scopes: Vec<String>,
    ) -> Result<CachedToken, AuthError> {
        // Bind first so the redirect cannot race the browser.
        let server = Server::http("127.0.0.1:0")
            .map_err(|e| AuthError::Listener(e.to_string()))?;
        let port = server
            .server_addr()
            .to_ip()
            .map(|a| a.port())
            .ok_or_else(|| AuthError::Listener("listener has no IP address".to_string()))?;
        let redirect_uri = format!("http://127.0.0.1:{port}");

        let client = BasicClient::new(
            ClientId::new(secret.client_id.clone()),
            Some(OauthClientSecret::new(secret.client_secret.clone())),
            AuthUrl::new(secret.auth_uri.clone())
                .map_err(|e| AuthError::Exchange(e.to_string()))?,
            Some(
                TokenUrl::new(secret.token_uri.clone())
                    .map_err(|e| AuthError::Exchange(e.to_string()))?,
            ),
        )
        .set_redirect_uri(
            RedirectUrl::new(redirect_uri.clone())
                .map_err(|e| AuthError::Exchange(e.to_string()))?,
        );

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let (auth_url, csrf_state) = client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(scopes.into_iter().map(Scope::new))
            .set_pkce_challenge(pkce_challenge)
            .url();

        println!("Open this URL in your browser to authorize:\n{auth_url}");
        if let Err(e) = webbrowser::open(auth_url.as_str()) {
            tracing::warn!("could not open browser automatically: {e}");
        }

        // The tiny_http accept loop is blocking; run it on its own thread
        // and hand the result back over a oneshot channel.
        let (tx, rx) = oneshot::channel();
        let listener_redirect = redirect_uri.clone();
        std::thread::spawn(move || {
            let result = wait_for_callback(&server, &listener_redirect);
            let _ = tx.send(result);
        });

        let (code, state) =
            tokio::time::timeout(Duration::from_secs(CALLBACK_TIMEOUT_SECS), rx)
                .await
                .map_err(|_| AuthError::ConsentTimeout)?
                .map_err(|_| AuthError::ConsentTimeout)??;

        if state != *csrf_state.secret() {
            return Err(AuthError::StateMismatch);
        }

        let token = client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pkce_verifier)
            .request_async(oauth2::reqwest::async_http_client)
            .await
            .map_err(|e| AuthError::Exchange(e.to_string()))?;

        let lifetime = token
            .expires_in()
            .unwrap_or(Duration::from_secs(3600))
            .as_secs() as i64;

        Ok(CachedToken {
            access_token: token.access_token().secret().to_string(),
            refresh_token: token.refresh_token().map(|r| r.secret().to_string()),
            expires_at: Utc::now() + chrono::Duration::seconds(lifetime),
        })
    }
}

// Accept requests until one carries a code or an error. Returns the code and
// the echoed state parameter.
fn wait_for_callback(server: &Server, redirect_uri: &str) -> Result<(String, String), AuthError> {
    for request in server.incoming_requests() {
        let full = format!("{}{}", redirect_uri, request.url());
        let parsed = match Url::parse(&full) {
            Ok(u) => u,
            Err(e) => {
                let _ = request.respond(Response::from_string(DENIED_PAGE));
                return Err(AuthError::BadRedirect(e.to_string()));
            }
        };

        let params: HashMap<String, String> = parsed.query_pairs().into_owned().collect();

        if let Some(error) = params.get("error") {
            let _ = request.respond(Response::from_string(DENIED_PAGE));
            return Err(AuthError::ConsentDenied(error.clone()));
        }

        match (params.get("code"), params.get("state")) {
            (Some(code), Some(state)) => {
                let _ = request.respond(Response::from_string(SUCCESS_PAGE));
                return Ok((code.clone(), state.clone()));
            }
            _ => {
                // Favicon probes and the like: answer and keep waiting.
                let _ = request.respond(Response::from_string(DENIED_PAGE));
            }
        }
    }
    Err(AuthError::ConsentTimeout)
}
