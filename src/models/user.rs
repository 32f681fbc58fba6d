//! Cached user credentials.

use serde::{Deserialize, Serialize};

/// One row of the credential cache, keyed by the Google user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCredential {
    /// Google account id (matches the `login_hint` Classroom passes back)
    pub user_id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub portrait_url: Option<String>,
    /// Long-lived token used to mint access tokens.
    ///
    /// Google invalidates it when unused for six months, when the user
    /// revokes access or changes their password, or under organization
    /// session-control policies.
    pub refresh_token: Option<String>,
    /// Last access token seen. Never required; access tokens always expire.
    pub access_token: Option<String>,
}

impl UserCredential {
    /// A stored credential is usable iff it carries a non-empty refresh token.
    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token
            .as_deref()
            .is_some_and(|token| !token.is_empty())
    }
}

/// Profile fields denormalized from the userinfo endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileFields {
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub portrait_url: Option<String>,
}

/// A write against the credential cache.
#[derive(Debug, Clone, Default)]
pub struct CredentialUpdate {
    /// Replaces all profile fields when present.
    pub profile: Option<ProfileFields>,
    /// Replaces the stored refresh token only when present and non-empty.
    pub refresh_token: Option<String>,
    /// Replaces the stored access token only when present and non-empty.
    pub access_token: Option<String>,
}

/// What an upsert did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// No row existed and the update lacked a profile or a refresh token.
    Skipped,
}
