// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Add-on session carried in a signed JWT cookie.
//!
//! Classroom loads the add-on in a third-party iframe, so the cookie is
//! `SameSite=None; Secure`. The refresh token never goes in the cookie; it
//! lives only in the credential store.

use crate::error::AppError;
use crate::services::classroom::{ItemRef, ItemType};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

/// Session cookie name.
pub const SESSION_COOKIE: &str = "addon_session";

/// Session lifetime (24 hours).
const SESSION_TTL_SECS: i64 = 24 * 60 * 60;

/// Access tokens this close to expiry are refreshed before use.
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 5 * 60;

/// Access token held in the session between requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialBundle {
    pub access_token: String,
    /// Unix timestamp; `None` means unknown and is treated as expired
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl CredentialBundle {
    /// The access token if it is still good for at least five minutes.
    pub fn fresh_access_token(&self, now: i64) -> Option<&str> {
        match self.expires_at {
            Some(expires_at)
                if !self.access_token.is_empty()
                    && expires_at - TOKEN_EXPIRY_MARGIN_SECS > now =>
            {
                Some(&self.access_token)
            }
            _ => None,
        }
    }
}

/// Per-browser add-on state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddonSession {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<CredentialBundle>,
    /// Display name of the signed-in user
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Google user id (Classroom's `login_hint`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_hint: Option<String>,
    /// Hosted domain; set when Classroom has no `login_hint` for the user
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hd: Option<String>,
    /// Signed OAuth state of the authorization in flight
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csrf_token: Option<String>,

    // Iframe context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_type: Option<ItemType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub add_on_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<String>,
}

/// JWT claims wrapping the session.
#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    #[serde(flatten)]
    session: AddonSession,
    iat: i64,
    exp: i64,
}

/// Query parameters Classroom passes to add-on iframes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IframeParams {
    #[serde(rename = "login_hint")]
    pub login_hint: Option<String>,
    pub hd: Option<String>,
    pub post_id: Option<String>,
    pub item_id: Option<String>,
    pub item_type: Option<String>,
    pub course_id: Option<String>,
    pub add_on_token: Option<String>,
    pub attachment_id: Option<String>,
    pub submission_id: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

impl AddonSession {
    /// Read the session from the request cookies.
    ///
    /// A missing, expired, or tampered cookie yields an empty session.
    pub fn from_cookies(jar: &CookieJar, key: &[u8]) -> Self {
        jar.get(SESSION_COOKIE)
            .and_then(|cookie| Self::decode(cookie.value(), key))
            .unwrap_or_default()
    }

    fn decode(token: &str, key: &[u8]) -> Option<Self> {
        let validation = Validation::new(Algorithm::HS256);
        match decode::<SessionClaims>(token, &DecodingKey::from_secret(key), &validation) {
            Ok(data) => Some(data.claims.session),
            Err(e) => {
                tracing::debug!(error = %e, "Discarding invalid session cookie");
                None
            }
        }
    }

    /// Sign the session as a JWT.
    pub fn encode(&self, key: &[u8]) -> anyhow::Result<String> {
        let now = chrono::Utc::now().timestamp();
        let claims = SessionClaims {
            session: self.clone(),
            iat: now,
            exp: now + SESSION_TTL_SECS,
        };

        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(key),
        )?)
    }

    /// Write the session cookie into the jar.
    pub fn store(&self, jar: CookieJar, key: &[u8]) -> Result<CookieJar, AppError> {
        let token = self
            .encode(key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Session signing failed: {}", e)))?;

        let cookie = Cookie::build((SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .secure(true)
            .same_site(SameSite::None)
            .max_age(time::Duration::seconds(SESSION_TTL_SECS));

        Ok(jar.add(cookie))
    }

    /// Copy the iframe context ids from the query into the session.
    ///
    /// Empty parameters are ignored. `postId` is accepted in place of
    /// `itemId`. `login_hint` and `hd` are handled by the sign-in check.
    pub fn absorb(&mut self, params: &IframeParams) {
        if let Some(item_id) = non_empty(&params.item_id) {
            self.item_id = Some(item_id);
            self.item_type = Some(ItemType::CourseWork);
        } else if let Some(post_id) = non_empty(&params.post_id) {
            self.item_id = Some(post_id);
            self.item_type = Some(ItemType::Posts);
        }
        if let Some(item_type) = params.item_type.as_deref().and_then(ItemType::from_param) {
            self.item_type = Some(item_type);
        }
        if let Some(course_id) = non_empty(&params.course_id) {
            self.course_id = Some(course_id);
        }
        if let Some(token) = non_empty(&params.add_on_token) {
            self.add_on_token = Some(token);
        }
        if let Some(attachment_id) = non_empty(&params.attachment_id) {
            self.attachment_id = Some(attachment_id);
        }
        if let Some(submission_id) = non_empty(&params.submission_id) {
            self.submission_id = Some(submission_id);
        }
    }

    /// Sign the user out of this browser.
    pub fn clear_credentials(&mut self) {
        self.credentials = None;
        self.username = None;
    }

    /// The Classroom item the iframe was opened for.
    pub fn item(&self) -> Result<ItemRef, AppError> {
        match (&self.course_id, &self.item_id) {
            (Some(course_id), Some(item_id)) => Ok(ItemRef {
                course_id: course_id.clone(),
                item_id: item_id.clone(),
                item_type: self.item_type.unwrap_or_default(),
            }),
            _ => Err(AppError::BadRequest(
                "Missing courseId or itemId iframe parameter".to_string(),
            )),
        }
    }

    pub fn require_attachment_id(&self) -> Result<&str, AppError> {
        self.attachment_id
            .as_deref()
            .ok_or_else(|| AppError::BadRequest("Missing attachmentId".to_string()))
    }

    pub fn require_submission_id(&self) -> Result<&str, AppError> {
        self.submission_id
            .as_deref()
            .ok_or_else(|| AppError::BadRequest("Missing submissionId".to_string()))
    }

    /// CSRF token for forms, created on first use.
    pub fn ensure_csrf_token(&mut self) -> Result<String, AppError> {
        if let Some(token) = &self.csrf_token {
            return Ok(token.clone());
        }
        let token = random_token()?;
        self.csrf_token = Some(token.clone());
        Ok(token)
    }

    /// Constant-time check of a submitted CSRF token.
    pub fn verify_csrf(&self, submitted: &str) -> bool {
        match &self.csrf_token {
            Some(expected) => expected.as_bytes().ct_eq(submitted.as_bytes()).into(),
            None => false,
        }
    }
}

/// 128 random bits, hex encoded.
pub fn random_token() -> Result<String, AppError> {
    let mut bytes = [0u8; 16];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("System RNG failure")))?;
    Ok(hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"0123456789abcdef0123456789abcdef";

    #[test]
    fn test_session_roundtrip_through_cookie() {
        let session = AddonSession {
            username: Some("Ada".to_string()),
            login_hint: Some("42".to_string()),
            credentials: Some(CredentialBundle {
                access_token: "ya29.token".to_string(),
                expires_at: Some(1_900_000_000),
                scopes: vec!["openid".to_string()],
            }),
            ..Default::default()
        };

        let jar = session.store(CookieJar::new(), KEY).unwrap();
        assert_eq!(AddonSession::from_cookies(&jar, KEY), session);
    }

    #[test]
    fn test_tampered_or_foreign_cookie_is_empty_session() {
        let session = AddonSession {
            login_hint: Some("42".to_string()),
            ..Default::default()
        };
        let jar = session.store(CookieJar::new(), KEY).unwrap();

        let other_key = b"ffffffffffffffffffffffffffffffff";
        assert_eq!(
            AddonSession::from_cookies(&jar, other_key),
            AddonSession::default()
        );

        let garbage = CookieJar::new().add(Cookie::new(SESSION_COOKIE, "not-a-jwt"));
        assert_eq!(
            AddonSession::from_cookies(&garbage, KEY),
            AddonSession::default()
        );
    }

    #[test]
    fn test_cookie_attributes() {
        let jar = AddonSession::default()
            .store(CookieJar::new(), KEY)
            .unwrap();
        let cookie = jar.get(SESSION_COOKIE).unwrap();

        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::None));
        assert_eq!(
            cookie.max_age(),
            Some(time::Duration::seconds(SESSION_TTL_SECS))
        );
    }

    #[test]
    fn test_absorb_ignores_empty_and_maps_post_id() {
        let mut session = AddonSession {
            course_id: Some("old-course".to_string()),
            ..Default::default()
        };

        session.absorb(&IframeParams {
            course_id: Some(String::new()),
            post_id: Some("post-7".to_string()),
            add_on_token: Some("token-1".to_string()),
            ..Default::default()
        });

        assert_eq!(session.course_id.as_deref(), Some("old-course"));
        assert_eq!(session.item_id.as_deref(), Some("post-7"));
        assert_eq!(session.item_type, Some(ItemType::Posts));
        assert_eq!(session.add_on_token.as_deref(), Some("token-1"));
    }

    #[test]
    fn test_absorb_item_type() {
        let mut session = AddonSession::default();
        session.absorb(&IframeParams {
            course_id: Some("c1".to_string()),
            item_id: Some("i1".to_string()),
            item_type: Some("courseWorkMaterials".to_string()),
            ..Default::default()
        });

        let item = session.item().unwrap();
        assert_eq!(item.item_type, ItemType::CourseWorkMaterials);
        assert_eq!(item.course_id, "c1");
    }

    #[test]
    fn test_item_requires_ids() {
        let session = AddonSession {
            course_id: Some("c1".to_string()),
            ..Default::default()
        };
        assert!(matches!(session.item(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_fresh_access_token_margin() {
        let bundle = CredentialBundle {
            access_token: "ya29.token".to_string(),
            expires_at: Some(10_000),
            scopes: vec![],
        };

        assert_eq!(bundle.fresh_access_token(9_000), Some("ya29.token"));
        assert_eq!(bundle.fresh_access_token(9_700), None);
        assert_eq!(bundle.fresh_access_token(11_000), None);

        let unknown_expiry = CredentialBundle {
            expires_at: None,
            ..bundle
        };
        assert_eq!(unknown_expiry.fresh_access_token(0), None);
    }

    #[test]
    fn test_csrf_token() {
        let mut session = AddonSession::default();
        assert!(!session.verify_csrf(""));

        let token = session.ensure_csrf_token().unwrap();
        assert_eq!(token.len(), 32);
        assert_eq!(session.ensure_csrf_token().unwrap(), token);
        assert!(session.verify_csrf(&token));
        assert!(!session.verify_csrf("forged"));
    }

    #[test]
    fn test_clear_credentials_keeps_context() {
        let mut session = AddonSession {
            credentials: Some(CredentialBundle::default()),
            username: Some("Ada".to_string()),
            login_hint: Some("42".to_string()),
            course_id: Some("c1".to_string()),
            ..Default::default()
        };

        session.clear_credentials();
        assert_eq!(session.credentials, None);
        assert_eq!(session.username, None);
        assert_eq!(session.login_hint.as_deref(), Some("42"));
        assert_eq!(session.course_id.as_deref(), Some("c1"));
    }
}
