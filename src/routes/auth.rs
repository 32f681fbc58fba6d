// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google OAuth authentication routes.

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use minijinja::context;
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;

use super::{load_session, respond, start_auth_flow};
use crate::error::{AppError, Result};
use crate::middleware::session::random_token;
use crate::services::google::AuthorizationRequest;
use crate::AppState;

// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

/// How long a signed OAuth state stays valid (10 minutes).
const STATE_MAX_AGE_MS: u128 = 10 * 60 * 1000;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/start-auth-flow", get(start_auth_flow_default))
        .route("/start-auth-flow/{destination}", get(start_auth_flow_page))
        .route("/authorize", get(authorize_default))
        .route("/authorize/{destination}", get(authorize))
        .route("/callback", get(callback))
        .route("/revoke", get(revoke))
        .route("/clear", get(clear))
}

/// Where the iframe goes once sign-in completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDestination {
    Discovery,
    Attachment,
    Coursework,
}

impl AuthDestination {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Discovery => "discovery",
            Self::Attachment => "attachment",
            Self::Coursework => "coursework",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "discovery" => Some(Self::Discovery),
            "attachment" => Some(Self::Attachment),
            "coursework" => Some(Self::Coursework),
            _ => None,
        }
    }

    /// Page the popup's opener is sent to after the callback.
    pub fn landing_path(self) -> &'static str {
        match self {
            Self::Discovery => "/classroom-addon",
            Self::Attachment => "/load-attachment",
            Self::Coursework => "/",
        }
    }
}

fn parse_destination(value: &str) -> Result<AuthDestination> {
    AuthDestination::parse(value)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown destination: {}", value)))
}

/// Authorization page. It opens the Google consent screen in a popup,
/// since Google's pages cannot be framed.
async fn start_auth_flow_page(
    State(state): State<Arc<AppState>>,
    Path(destination): Path<String>,
) -> Result<Response> {
    let destination = parse_destination(&destination)?;
    render_authorization(&state, destination)
}

async fn start_auth_flow_default(State(state): State<Arc<AppState>>) -> Result<Response> {
    render_authorization(&state, AuthDestination::Discovery)
}

fn render_authorization(state: &AppState, destination: AuthDestination) -> Result<Response> {
    let page = state.templates.render(
        "authorization.html",
        context! { authorize_path => format!("/authorize/{}", destination.as_str()) },
    )?;
    Ok(page.into_response())
}

async fn authorize(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(destination): Path<String>,
) -> Result<Response> {
    let destination = parse_destination(&destination)?;
    begin_authorization(&state, jar, destination)
}

async fn authorize_default(State(state): State<Arc<AppState>>, jar: CookieJar) -> Result<Response> {
    begin_authorization(&state, jar, AuthDestination::Discovery)
}

/// Redirect to Google with a signed state bound to this session.
fn begin_authorization(
    state: &AppState,
    jar: CookieJar,
    destination: AuthDestination,
) -> Result<Response> {
    let mut session = load_session(state, &jar);

    let nonce = random_token()?;
    let oauth_state = sign_state(
        destination,
        &nonce,
        now_millis()?,
        &state.config.oauth_state_key,
    )?;
    session.oauth_state = Some(oauth_state.clone());

    // Without a stored refresh token Google must show the consent screen,
    // otherwise it will not issue a new one.
    let force_consent = match &session.login_hint {
        Some(hint) => !state
            .db
            .get_credential(hint)?
            .is_some_and(|stored| stored.has_refresh_token()),
        None => true,
    };

    let callback_url = state.config.callback_url();
    let auth_url = state
        .credentials
        .google()
        .authorization_url(&AuthorizationRequest {
            redirect_uri: &callback_url,
            state: &oauth_state,
            login_hint: session.login_hint.as_deref(),
            hd: session.hd.as_deref(),
            force_consent,
        })?;

    tracing::info!(
        client_id = %state.config.google_client_id,
        destination = destination.as_str(),
        force_consent,
        "Starting OAuth flow, redirecting to Google"
    );

    respond(state, jar, &session, Redirect::temporary(&auth_url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - exchange code for tokens, store credentials.
async fn callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<Response> {
    let mut session = load_session(&state, &jar);

    let returned = params
        .state
        .ok_or_else(|| AppError::BadRequest("Missing OAuth state".to_string()))?;
    let expected = session.oauth_state.take().unwrap_or_default();
    if !bool::from(expected.as_bytes().ct_eq(returned.as_bytes())) {
        tracing::warn!("OAuth state does not match the session");
        return Err(AppError::BadRequest("OAuth state mismatch".to_string()));
    }

    let destination =
        verify_and_decode_state(&returned, &state.config.oauth_state_key, now_millis()?)
            .ok_or_else(|| AppError::BadRequest("Invalid OAuth state".to_string()))?;

    // Check for OAuth errors
    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Google");
        return Err(AppError::BadRequest(format!("Authorization failed: {}", error)));
    }

    let code = params
        .code
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))?;

    tracing::info!("Exchanging authorization code for tokens");
    state
        .credentials
        .complete_authorization(&mut session, &code, &state.config.callback_url())
        .await?;

    let page = state.templates.render(
        "close-me.html",
        context! { redirect => destination.landing_path() },
    )?;
    respond(&state, jar, &session, page)
}

/// Revoke the signed-in user's grant and forget their stored credentials.
async fn revoke(State(state): State<Arc<AppState>>, jar: CookieJar) -> Result<Response> {
    let mut session = load_session(&state, &jar);

    if session.credentials.is_none() {
        let page = state.templates.render(
            "addon-discovery.html",
            context! {
                message => "You need to authorize before attempting to revoke credentials.",
            },
        )?;
        return respond(&state, jar, &session, page);
    }

    if state.credentials.revoke(&mut session).await? {
        return respond(
            &state,
            jar,
            &session,
            start_auth_flow(AuthDestination::Discovery),
        );
    }

    let page = state.templates.render(
        "addon-discovery.html",
        context! { message => "An error occurred during revocation!" },
    )?;
    respond(&state, jar, &session, page)
}

/// Clear credentials from the session (the stored refresh token stays).
async fn clear(State(state): State<Arc<AppState>>, jar: CookieJar) -> Result<Response> {
    let mut session = load_session(&state, &jar);
    session.clear_credentials();

    let page = state.templates.render("signed-out.html", context! {})?;
    respond(&state, jar, &session, page)
}

fn now_millis() -> Result<u128> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis())
}

/// Build the `state` parameter: base64url of
/// `destination|nonce_hex|timestamp_hex|hmac_hex`.
fn sign_state(
    destination: AuthDestination,
    nonce: &str,
    timestamp_ms: u128,
    secret: &[u8],
) -> Result<String> {
    let payload = format!("{}|{}|{:x}", destination.as_str(), nonce, timestamp_ms);

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = mac.finalize().into_bytes();

    let signed_state = format!("{}|{}", payload, hex::encode(signature));
    Ok(URL_SAFE_NO_PAD.encode(signed_state.as_bytes()))
}

/// Verify the HMAC signature and age of an OAuth state parameter and
/// decode its destination.
fn verify_and_decode_state(state: &str, secret: &[u8], now_ms: u128) -> Option<AuthDestination> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    let parts: Vec<&str> = state_str.splitn(4, '|').collect();
    if parts.len() != 4 {
        return None;
    }

    let (destination, nonce, timestamp_hex, signature_hex) = (parts[0], parts[1], parts[2], parts[3]);

    let payload = format!("{}|{}|{}", destination, nonce, timestamp_hex);
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload.as_bytes());
    let signature = hex::decode(signature_hex).ok()?;

    if mac.verify_slice(&signature).is_err() {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return None;
    }

    let timestamp = u128::from_str_radix(timestamp_hex, 16).ok()?;
    if now_ms.saturating_sub(timestamp) > STATE_MAX_AGE_MS {
        tracing::warn!("OAuth state expired");
        return None;
    }

    AuthDestination::parse(destination)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"secret_key";
    const NOW: u128 = 1_760_000_000_000;

    #[test]
    fn test_verify_and_decode_state_success() {
        let state = sign_state(AuthDestination::Attachment, "abcd", NOW, SECRET).unwrap();
        let result = verify_and_decode_state(&state, SECRET, NOW + 1_000);
        assert_eq!(result, Some(AuthDestination::Attachment));
    }

    #[test]
    fn test_verify_and_decode_state_invalid_signature() {
        let payload = format!("discovery|abcd|{:x}", NOW);
        let state_data = format!("{}|{}", payload, "invalid_signature");
        let encoded_state = URL_SAFE_NO_PAD.encode(state_data.as_bytes());

        assert_eq!(verify_and_decode_state(&encoded_state, SECRET, NOW), None);
    }

    #[test]
    fn test_verify_and_decode_state_wrong_secret() {
        let state = sign_state(AuthDestination::Discovery, "abcd", NOW, SECRET).unwrap();
        assert_eq!(verify_and_decode_state(&state, b"wrong_key", NOW), None);
    }

    #[test]
    fn test_verify_and_decode_state_tampered_destination() {
        let state = sign_state(AuthDestination::Discovery, "abcd", NOW, SECRET).unwrap();
        let decoded = String::from_utf8(URL_SAFE_NO_PAD.decode(&state).unwrap()).unwrap();
        let tampered = decoded.replacen("discovery", "coursework", 1);
        let encoded = URL_SAFE_NO_PAD.encode(tampered.as_bytes());

        assert_eq!(verify_and_decode_state(&encoded, SECRET, NOW), None);
    }

    #[test]
    fn test_verify_and_decode_state_expired() {
        let state = sign_state(AuthDestination::Discovery, "abcd", NOW, SECRET).unwrap();
        assert_eq!(
            verify_and_decode_state(&state, SECRET, NOW + STATE_MAX_AGE_MS + 1),
            None
        );
    }

    #[test]
    fn test_verify_and_decode_state_malformed() {
        let encoded_state = URL_SAFE_NO_PAD.encode("invalid|format");
        assert_eq!(verify_and_decode_state(&encoded_state, SECRET, NOW), None);
        assert_eq!(verify_and_decode_state("%%%not-base64", SECRET, NOW), None);
    }

    #[test]
    fn test_destination_landing_paths() {
        assert_eq!(
            AuthDestination::parse("discovery").map(AuthDestination::landing_path),
            Some("/classroom-addon")
        );
        assert_eq!(
            AuthDestination::Attachment.landing_path(),
            "/load-attachment"
        );
        assert_eq!(AuthDestination::Coursework.landing_path(), "/");
        assert_eq!(AuthDestination::parse("elsewhere"), None);
    }
}
