// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google OAuth 2.0 client.
//!
//! Handles:
//! - Building the authorization URL
//! - Authorization code and refresh token exchanges
//! - Token revocation
//! - The OAuth2 v2 userinfo profile

use crate::config::GoogleEndpoints;
use crate::error::AppError;
use crate::middleware::session::CredentialBundle;
use crate::models::ProfileFields;
use serde::Deserialize;

/// Scopes requested from every user.
pub const SCOPES: &[&str] = &[
    "openid",
    "https://www.googleapis.com/auth/userinfo.profile",
    "https://www.googleapis.com/auth/userinfo.email",
    "https://www.googleapis.com/auth/classroom.courses.readonly",
    "https://www.googleapis.com/auth/classroom.addons.teacher",
    "https://www.googleapis.com/auth/classroom.addons.student",
    "https://www.googleapis.com/auth/classroom.coursework.students",
    "https://www.googleapis.com/auth/classroom.coursework.me",
];

/// Parameters of one authorization redirect.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationRequest<'a> {
    pub redirect_uri: &'a str,
    pub state: &'a str,
    pub login_hint: Option<&'a str>,
    pub hd: Option<&'a str>,
    /// Ask Google to show the consent screen so a refresh token is issued
    pub force_consent: bool,
}

/// Google OAuth client.
#[derive(Clone)]
pub struct GoogleClient {
    http: reqwest::Client,
    endpoints: GoogleEndpoints,
    client_id: String,
    client_secret: String,
}

impl GoogleClient {
    pub fn new(
        http: reqwest::Client,
        endpoints: GoogleEndpoints,
        client_id: String,
        client_secret: String,
    ) -> Self {
        Self {
            http,
            endpoints,
            client_id,
            client_secret,
        }
    }

    /// URL of Google's consent page for this request.
    pub fn authorization_url(&self, request: &AuthorizationRequest<'_>) -> Result<String, AppError> {
        let scope = SCOPES.join(" ");
        let mut params = vec![
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", request.redirect_uri),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("state", request.state),
            ("access_type", "offline"),
            ("include_granted_scopes", "true"),
        ];
        if let Some(hint) = request.login_hint {
            params.push(("login_hint", hint));
        }
        if let Some(hd) = request.hd {
            params.push(("hd", hd));
        }
        if request.force_consent {
            params.push(("prompt", "consent"));
        }

        let url = reqwest::Url::parse_with_params(&self.endpoints.auth_url, &params)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid auth URL: {}", e)))?;
        Ok(url.into())
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, AppError> {
        let response = self
            .http
            .post(&self.endpoints.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AppError::GoogleApi(format!("Token exchange request failed: {}", e)))?;

        self.check_response_json(response).await
    }

    /// Mint a new access token from a refresh token.
    ///
    /// A rejected refresh token (revoked, expired, or unknown) maps to
    /// `AppError::Unauthorized` so the user is sent back through sign-in.
    /// Other 400 responses stay `GoogleApi` errors.
    pub async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenResponse, AppError> {
        let response = self
            .http
            .post(&self.endpoints.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AppError::GoogleApi(format!("Token refresh request failed: {}", e)))?;

        let status = response.status().as_u16();
        if status == 400 || status == 401 {
            let body = response.text().await.unwrap_or_default();
            if status == 401 || is_invalid_grant(&body) {
                tracing::warn!(status, "Refresh token rejected by Google");
                return Err(AppError::unauthorized());
            }
            return Err(AppError::GoogleApi(format!("HTTP {}: {}", status, body)));
        }

        self.check_response_json(response).await
    }

    /// Revoke a token (and the grant behind it).
    pub async fn revoke(&self, token: &str) -> Result<(), AppError> {
        let response = self
            .http
            .post(&self.endpoints.revoke_url)
            .form(&[("token", token)])
            .send()
            .await
            .map_err(|e| AppError::GoogleApi(format!("Revocation request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::GoogleApi(format!("HTTP {}: {}", status, body)));
        }

        tracing::info!("Google token revocation successful");
        Ok(())
    }

    /// Fetch the signed-in user's profile.
    pub async fn user_info(&self, access_token: &str) -> Result<GoogleUserInfo, AppError> {
        let response = self
            .http
            .get(&self.endpoints.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::GoogleApi(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 401 {
                return Err(AppError::GoogleApi(AppError::GOOGLE_TOKEN_ERROR.to_string()));
            }

            return Err(AppError::GoogleApi(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::GoogleApi(format!("JSON parse error: {}", e)))
    }
}

/// Token endpoint response (both grants).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Only issued on the first consent, or when `prompt=consent` was sent
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Space-separated granted scopes
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Session-side credential bundle for this token, given the current time.
    pub fn bundle(&self, now: i64) -> CredentialBundle {
        CredentialBundle {
            access_token: self.access_token.clone(),
            expires_at: self.expires_in.map(|secs| now + secs),
            scopes: self
                .scope
                .as_deref()
                .map(|s| s.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
        }
    }
}

/// OAuth2 v2 userinfo response.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleUserInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

impl GoogleUserInfo {
    pub fn profile(&self) -> ProfileFields {
        ProfileFields {
            display_name: self.name.clone(),
            email: self.email.clone(),
            portrait_url: self.picture.clone(),
        }
    }
}

/// OAuth 2.0 error body (RFC 6749 section 5.2).
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
}

/// Whether a token endpoint error body reports `invalid_grant`.
fn is_invalid_grant(body: &str) -> bool {
    serde_json::from_str::<TokenErrorResponse>(body)
        .map(|response| response.error == "invalid_grant")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GoogleClient {
        GoogleClient::new(
            reqwest::Client::new(),
            GoogleEndpoints::default(),
            "client-123".to_string(),
            "secret".to_string(),
        )
    }

    fn query(url: &str) -> Vec<(String, String)> {
        reqwest::Url::parse(url)
            .unwrap()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    fn param<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_authorization_url_offline_access() {
        let url = client()
            .authorization_url(&AuthorizationRequest {
                redirect_uri: "https://addon.example.com/callback",
                state: "abc",
                login_hint: Some("42"),
                ..Default::default()
            })
            .unwrap();

        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        let pairs = query(&url);
        assert_eq!(param(&pairs, "client_id"), Some("client-123"));
        assert_eq!(param(&pairs, "access_type"), Some("offline"));
        assert_eq!(param(&pairs, "include_granted_scopes"), Some("true"));
        assert_eq!(param(&pairs, "response_type"), Some("code"));
        assert_eq!(param(&pairs, "state"), Some("abc"));
        assert_eq!(param(&pairs, "login_hint"), Some("42"));
        assert_eq!(param(&pairs, "hd"), None);
        assert_eq!(param(&pairs, "prompt"), None);
        assert!(param(&pairs, "scope")
            .unwrap()
            .contains("https://www.googleapis.com/auth/classroom.addons.teacher"));
    }

    #[test]
    fn test_authorization_url_forced_consent() {
        let url = client()
            .authorization_url(&AuthorizationRequest {
                redirect_uri: "https://addon.example.com/callback",
                state: "abc",
                hd: Some("school.edu"),
                force_consent: true,
                ..Default::default()
            })
            .unwrap();

        let pairs = query(&url);
        assert_eq!(param(&pairs, "prompt"), Some("consent"));
        assert_eq!(param(&pairs, "hd"), Some("school.edu"));
    }

    #[test]
    fn test_token_response_bundle() {
        let token: TokenResponse = serde_json::from_value(serde_json::json!({
            "access_token": "ya29.token",
            "expires_in": 3599,
            "scope": "openid https://www.googleapis.com/auth/userinfo.email",
            "token_type": "Bearer"
        }))
        .unwrap();

        assert_eq!(token.refresh_token, None);
        let bundle = token.bundle(1_000);
        assert_eq!(bundle.access_token, "ya29.token");
        assert_eq!(bundle.expires_at, Some(4_599));
        assert_eq!(bundle.scopes.len(), 2);
    }

    #[test]
    fn test_is_invalid_grant_reads_error_field() {
        assert!(is_invalid_grant(
            r#"{"error": "invalid_grant", "error_description": "Token has been expired or revoked."}"#
        ));
        assert!(!is_invalid_grant(
            r#"{"error": "invalid_request", "error_description": "Missing invalid_grant hint"}"#
        ));
        assert!(!is_invalid_grant("invalid_grant"));
        assert!(!is_invalid_grant(""));
    }
}
