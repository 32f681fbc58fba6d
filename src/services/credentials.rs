// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential lifecycle on top of the credential store.
//!
//! This service encapsulates:
//! - Deciding whether a user is authorized (stored refresh token present)
//! - Reusing the session's access token while it has 5+ minutes left
//! - Refreshing access tokens and writing them back to the store
//! - Completing the OAuth callback and revocation

use crate::db::SqliteDb;
use crate::error::AppError;
use crate::middleware::session::AddonSession;
use crate::models::{CredentialUpdate, UpsertOutcome, UserCredential};
use crate::services::google::{GoogleClient, GoogleUserInfo, TokenResponse};
use chrono::Utc;

/// A user with a usable stored refresh token.
#[derive(Debug, Clone)]
pub struct AuthorizedUser {
    pub user_id: String,
    refresh_token: String,
}

impl AuthorizedUser {
    fn from_stored(stored: UserCredential) -> Option<Self> {
        if !stored.has_refresh_token() {
            return None;
        }
        Some(Self {
            user_id: stored.user_id,
            refresh_token: stored.refresh_token.unwrap_or_default(),
        })
    }
}

#[derive(Clone)]
pub struct CredentialService {
    google: GoogleClient,
    db: SqliteDb,
}

impl CredentialService {
    pub fn new(google: GoogleClient, db: SqliteDb) -> Self {
        Self { google, db }
    }

    pub fn google(&self) -> &GoogleClient {
        &self.google
    }

    // ─── Authorization Check ─────────────────────────────────────────────────

    /// Resolve the signed-in user.
    ///
    /// With an explicit `user_id` (Classroom's `login_hint`) the store is
    /// consulted directly. Without one, the session must already hold
    /// credentials, and its `login_hint` names the stored row. Returns
    /// `None` when the user has to (re-)authorize.
    pub fn authorized(
        &self,
        session: &mut AddonSession,
        user_id: Option<&str>,
    ) -> Result<Option<AuthorizedUser>, AppError> {
        let user_id = match user_id {
            Some(id) => id.to_string(),
            None => {
                if session.credentials.is_none() {
                    return Ok(None);
                }
                match &session.login_hint {
                    Some(hint) => hint.clone(),
                    None => return Ok(None),
                }
            }
        };

        let Some(stored) = self.db.get_credential(&user_id)? else {
            tracing::debug!(user_id = %user_id, "No stored credentials");
            return Ok(None);
        };

        let display_name = stored.display_name.clone();
        let Some(user) = AuthorizedUser::from_stored(stored) else {
            tracing::debug!(user_id = %user_id, "Stored row has no refresh token");
            return Ok(None);
        };

        if display_name.is_some() {
            session.username = display_name;
        }

        Ok(Some(user))
    }

    // ─── Token Management ────────────────────────────────────────────────────

    /// Access token for the session user, refreshing it if needed.
    pub async fn access_token(
        &self,
        session: &mut AddonSession,
        user: &AuthorizedUser,
    ) -> Result<String, AppError> {
        let now = Utc::now().timestamp();

        let same_user = session.login_hint.as_deref() == Some(user.user_id.as_str());
        if same_user {
            if let Some(token) = session
                .credentials
                .as_ref()
                .and_then(|bundle| bundle.fresh_access_token(now))
            {
                return Ok(token.to_string());
            }
        }

        let token = self.refresh(user).await?;
        session.credentials = Some(token.bundle(now));
        session.login_hint = Some(user.user_id.clone());
        Ok(token.access_token)
    }

    /// Access token for a user other than the session user.
    ///
    /// Used to act as the teacher who created an attachment while a
    /// student is signed in. Returns `NotFound` when the user has no usable
    /// stored token and `Unauthorized` when Google rejects it; both concern
    /// the other user, not the session.
    pub async fn access_token_for_user(&self, user_id: &str) -> Result<String, AppError> {
        let user = self
            .db
            .get_credential(user_id)?
            .and_then(AuthorizedUser::from_stored)
            .ok_or_else(|| AppError::NotFound(format!("Credentials for user {}", user_id)))?;

        Ok(self.refresh(&user).await?.access_token)
    }

    /// One refresh-token round trip, written back to the store.
    async fn refresh(&self, user: &AuthorizedUser) -> Result<TokenResponse, AppError> {
        tracing::info!(user_id = %user.user_id, "Refreshing access token");

        let token = match self.google.refresh_access_token(&user.refresh_token).await {
            Ok(token) => token,
            Err(e @ AppError::Unauthorized(_)) => {
                // Forces the consent screen on the next sign-in so Google
                // issues a replacement refresh token.
                self.db.delete_credential(&user.user_id)?;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        self.db.upsert_credential(
            &user.user_id,
            &CredentialUpdate {
                profile: None,
                refresh_token: token.refresh_token.clone(),
                access_token: Some(token.access_token.clone()),
            },
        )?;

        Ok(token)
    }

    // ─── OAuth Callback Handling ─────────────────────────────────────────────

    /// Exchange the authorization code, sign the user into the session, and
    /// store their credentials.
    pub async fn complete_authorization(
        &self,
        session: &mut AddonSession,
        code: &str,
        redirect_uri: &str,
    ) -> Result<UpsertOutcome, AppError> {
        let now = Utc::now().timestamp();
        let token = self.google.exchange_code(code, redirect_uri).await?;
        let user_info = self.google.user_info(&token.access_token).await?;

        session.username = user_info.name.clone();
        session.login_hint = Some(user_info.id.clone());
        session.credentials = Some(token.bundle(now));

        let outcome = self.db.upsert_credential(
            &user_info.id,
            &CredentialUpdate {
                profile: Some(user_info.profile()),
                refresh_token: token.refresh_token,
                access_token: Some(token.access_token),
            },
        )?;

        match outcome {
            UpsertOutcome::Skipped => tracing::warn!(
                user_id = %user_info.id,
                "Google returned no refresh token for a new user; nothing stored"
            ),
            _ => tracing::info!(
                user_id = %user_info.id,
                outcome = ?outcome,
                "OAuth callback handled, credentials stored"
            ),
        }

        Ok(outcome)
    }

    /// Re-fetch the user's profile and refresh the stored copy.
    pub async fn refresh_profile(
        &self,
        session: &mut AddonSession,
        user: &AuthorizedUser,
    ) -> Result<GoogleUserInfo, AppError> {
        let access_token = self.access_token(session, user).await?;
        let user_info = self.google.user_info(&access_token).await?;
        session.username = user_info.name.clone();

        self.db.upsert_credential(
            &user.user_id,
            &CredentialUpdate {
                profile: Some(user_info.profile()),
                refresh_token: None,
                access_token: Some(access_token),
            },
        )?;

        Ok(user_info)
    }

    // ─── Revocation ──────────────────────────────────────────────────────────

    /// Revoke the session user's grant with Google.
    ///
    /// Session credentials are cleared either way. Returns whether Google
    /// accepted the revocation; only then is the stored row deleted.
    pub async fn revoke(&self, session: &mut AddonSession) -> Result<bool, AppError> {
        let Some(bundle) = session.credentials.clone() else {
            return Ok(false);
        };

        // Revoking the refresh token revokes the whole grant.
        let stored_refresh = match &session.login_hint {
            Some(hint) => self
                .db
                .get_credential(hint)?
                .and_then(|stored| stored.refresh_token)
                .filter(|token| !token.is_empty()),
            None => None,
        };
        let token = stored_refresh.unwrap_or(bundle.access_token);

        let revoked = match self.google.revoke(&token).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Token revocation failed");
                false
            }
        };

        session.clear_credentials();

        if revoked {
            if let Some(hint) = &session.login_hint {
                self.db.delete_credential(hint)?;
                tracing::info!(user_id = %hint, "Credentials revoked and removed");
            }
        }

        Ok(revoked)
    }
}
