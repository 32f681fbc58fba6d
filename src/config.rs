//! Application configuration loaded from environment variables.
//!
//! A single `SESSION_SECRET` is expanded with HKDF into the keys that sign
//! session cookies and OAuth `state` parameters.

use hkdf::Hkdf;
use sha2::Sha256;
use std::env;
use std::path::PathBuf;

/// Minimum length of `SESSION_SECRET` in bytes.
const MIN_SECRET_LEN: usize = 32;

/// Google endpoints used by the add-on.
///
/// Overridable so tests can point every call at a mock server.
#[derive(Debug, Clone)]
pub struct GoogleEndpoints {
    /// OAuth 2.0 authorization endpoint (browser redirect target)
    pub auth_url: String,
    /// OAuth 2.0 token endpoint (code and refresh-token grants)
    pub token_url: String,
    /// OAuth 2.0 revocation endpoint
    pub revoke_url: String,
    /// OAuth2 v2 userinfo endpoint
    pub userinfo_url: String,
    /// Classroom API root (without the `/v1` suffix)
    pub classroom_api_url: String,
}

impl Default for GoogleEndpoints {
    fn default() -> Self {
        Self {
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            revoke_url: "https://oauth2.googleapis.com/revoke".to_string(),
            userinfo_url: "https://www.googleapis.com/oauth2/v2/userinfo".to_string(),
            classroom_api_url: "https://classroom.googleapis.com".to_string(),
        }
    }
}

impl GoogleEndpoints {
    /// All endpoints served from one base URL (mock servers).
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            auth_url: format!("{}/o/oauth2/v2/auth", base),
            token_url: format!("{}/token", base),
            revoke_url: format!("{}/revoke", base),
            userinfo_url: format!("{}/oauth2/v2/userinfo", base),
            classroom_api_url: base.to_string(),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Google OAuth client ID (public)
    pub google_client_id: String,
    /// Externally visible base URL; used for the OAuth redirect URI and
    /// the attachment URIs handed to Classroom
    pub public_base_url: String,
    /// Server port
    pub port: u16,
    /// SQLite file holding the credential cache
    pub database_path: PathBuf,
    /// Directory served under `/static` (attachment images live in `images/`)
    pub static_dir: PathBuf,
    /// Pass grades back when the teacher opens the Student Work Review
    /// iframe instead of when the student submits
    pub grade_on_review: bool,
    /// Course used by the external CourseWork routes
    pub course_id: String,
    /// CourseWork item patched by `/modify-coursework-assignment`
    pub coursework_id: String,
    pub endpoints: GoogleEndpoints,

    // --- Secrets ---
    /// Google OAuth client secret
    pub google_client_secret: String,
    /// Optional API key appended to Classroom requests
    pub google_api_key: Option<String>,
    /// HS256 key for the session cookie
    pub session_signing_key: Vec<u8>,
    /// HMAC key for the OAuth state parameter
    pub oauth_state_key: Vec<u8>,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        let secret = b"test_session_secret_32_bytes_min!!";
        Self {
            google_client_id: "test_client_id".to_string(),
            public_base_url: "https://localhost:8080".to_string(),
            port: 8080,
            database_path: PathBuf::from("data/test.db"),
            static_dir: PathBuf::from("static"),
            grade_on_review: false,
            course_id: "1234567890".to_string(),
            coursework_id: "1234567890".to_string(),
            endpoints: GoogleEndpoints::default(),
            google_client_secret: "test_secret".to_string(),
            google_api_key: None,
            session_signing_key: derive_key(secret, b"session").unwrap_or_default(),
            oauth_state_key: derive_key(secret, b"oauth-state").unwrap_or_default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is read first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let secret = env::var("SESSION_SECRET")
            .map(|v| v.trim().to_string())
            .map_err(|_| ConfigError::Missing("SESSION_SECRET"))?;
        if secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid(
                "SESSION_SECRET",
                format!("must be at least {} bytes", MIN_SECRET_LEN),
            ));
        }

        let defaults = GoogleEndpoints::default();
        let endpoints = GoogleEndpoints {
            auth_url: env::var("GOOGLE_AUTH_URL").unwrap_or(defaults.auth_url),
            token_url: env::var("GOOGLE_TOKEN_URL").unwrap_or(defaults.token_url),
            revoke_url: env::var("GOOGLE_REVOKE_URL").unwrap_or(defaults.revoke_url),
            userinfo_url: env::var("GOOGLE_USERINFO_URL").unwrap_or(defaults.userinfo_url),
            classroom_api_url: env::var("CLASSROOM_API_URL")
                .unwrap_or(defaults.classroom_api_url),
        };

        Ok(Self {
            google_client_id: env::var("GOOGLE_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("GOOGLE_CLIENT_ID"))?,
            public_base_url: env::var("PUBLIC_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "https://localhost:8080".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            database_path: env::var("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/addon.db")),
            static_dir: env::var("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("static")),
            grade_on_review: env::var("GRADE_ON_REVIEW")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
            course_id: env::var("COURSE_ID").unwrap_or_else(|_| "1234567890".to_string()),
            coursework_id: env::var("COURSEWORK_ID")
                .unwrap_or_else(|_| "1234567890".to_string()),
            endpoints,

            google_client_secret: env::var("GOOGLE_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("GOOGLE_CLIENT_SECRET"))?,
            google_api_key: env::var("GOOGLE_API_KEY")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            session_signing_key: derive_key(secret.as_bytes(), b"session")?,
            oauth_state_key: derive_key(secret.as_bytes(), b"oauth-state")?,
        })
    }

    /// OAuth redirect URI registered with Google.
    pub fn callback_url(&self) -> String {
        format!("{}/callback", self.public_base_url)
    }

    /// Absolute URL for a path on this server.
    pub fn external_url(&self, path: &str) -> String {
        format!("{}{}", self.public_base_url, path)
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Expand the shared secret into a purpose-specific 32-byte key.
fn derive_key(secret: &[u8], info: &[u8]) -> Result<Vec<u8>, ConfigError> {
    let hk = Hkdf::<Sha256>::new(None, secret);
    let mut okm = [0u8; 32];
    hk.expand(info, &mut okm)
        .map_err(|e| ConfigError::Invalid("SESSION_SECRET", e.to_string()))?;
    Ok(okm.to_vec())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
