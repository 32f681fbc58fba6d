// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use axum_extra::extract::cookie::{Cookie, CookieJar};
use classroom_addon::config::{Config, GoogleEndpoints};
use classroom_addon::middleware::session::{AddonSession, CredentialBundle, SESSION_COOKIE};
use classroom_addon::models::{CredentialUpdate, ProfileFields};
use classroom_addon::routes::create_router;
use classroom_addon::AppState;
use std::path::PathBuf;
use std::sync::Arc;
use wiremock::MockServer;

/// Router wired to a temporary database and a mock Google server.
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub google: MockServer,
    // Keeps the database directory alive for the test.
    _dir: tempfile::TempDir,
}

#[allow(dead_code)]
impl TestApp {
    pub async fn request(&self, request: Request<Body>) -> Response {
        use tower::ServiceExt;
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// `Cookie` header value carrying `session`.
    pub fn cookie(&self, session: &AddonSession) -> String {
        let token = session
            .encode(&self.state.config.session_signing_key)
            .unwrap();
        format!("{}={}", SESSION_COOKIE, token)
    }

    /// Session set by a response, if any.
    pub fn session_from(&self, response: &Response) -> Option<AddonSession> {
        let value = session_cookie_header(response)?;
        let token = value
            .trim_start_matches(&format!("{}=", SESSION_COOKIE))
            .split(';')
            .next()?
            .to_string();
        let jar = CookieJar::new().add(Cookie::new(SESSION_COOKIE, token));
        Some(AddonSession::from_cookies(
            &jar,
            &self.state.config.session_signing_key,
        ))
    }

    /// Store a user with a refresh token.
    pub fn seed_user(&self, user_id: &str, name: &str, refresh_token: &str) {
        self.state
            .db
            .upsert_credential(
                user_id,
                &CredentialUpdate {
                    profile: Some(ProfileFields {
                        display_name: Some(name.to_string()),
                        email: Some(format!("{}@example.com", user_id)),
                        portrait_url: None,
                    }),
                    refresh_token: Some(refresh_token.to_string()),
                    access_token: None,
                },
            )
            .unwrap();
    }

    /// Store a profile row that has no refresh token. The store itself never
    /// inserts such rows, so this writes to the file directly.
    pub fn seed_user_without_refresh_token(&self, user_id: &str, name: &str) {
        let conn = rusqlite::Connection::open(&self.state.config.database_path).unwrap();
        conn.execute(
            "INSERT INTO user_credentials (user_id, display_name) VALUES (?1, ?2)",
            rusqlite::params![user_id, name],
        )
        .unwrap();
    }

    /// Number of rows in the credential table, read straight from the file.
    pub fn credential_rows(&self) -> i64 {
        let conn = rusqlite::Connection::open(&self.state.config.database_path).unwrap();
        conn.query_row("SELECT COUNT(*) FROM user_credentials", [], |row| {
            row.get(0)
        })
        .unwrap()
    }
}

/// Create a test app with a fresh database and mock Google endpoints.
#[allow(dead_code)]
pub async fn create_test_app() -> TestApp {
    create_test_app_with(|_| {}).await
}

/// Create a test app, adjusting the config first.
#[allow(dead_code)]
pub async fn create_test_app_with(customize: impl FnOnce(&mut Config)) -> TestApp {
    let google = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    let mut config = Config {
        database_path: dir.path().join("addon.db"),
        static_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("static"),
        endpoints: GoogleEndpoints::with_base(&google.uri()),
        ..Config::default()
    };
    customize(&mut config);

    let state = Arc::new(AppState::new(config).unwrap());

    TestApp {
        router: create_router(state.clone()),
        state,
        google,
        _dir: dir,
    }
}

/// Session for a signed-in user whose access token is still fresh.
#[allow(dead_code)]
pub fn signed_in_session(user_id: &str, access_token: &str) -> AddonSession {
    AddonSession {
        login_hint: Some(user_id.to_string()),
        credentials: Some(CredentialBundle {
            access_token: access_token.to_string(),
            expires_at: Some(chrono::Utc::now().timestamp() + 3600),
            scopes: vec![],
        }),
        ..Default::default()
    }
}

#[allow(dead_code)]
pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

#[allow(dead_code)]
pub fn post_form(uri: &str, cookie: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::COOKIE, cookie)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[allow(dead_code)]
pub fn location(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("missing Location header")
        .to_str()
        .unwrap()
        .to_string()
}

#[allow(dead_code)]
pub fn session_cookie_header(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with(&format!("{}=", SESSION_COOKIE)))
        .map(str::to_string)
}

#[allow(dead_code)]
pub async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
