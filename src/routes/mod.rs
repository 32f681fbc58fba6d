// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP route handlers.

pub mod attachments;
pub mod auth;
pub mod coursework;
pub mod discovery;

use crate::error::Result;
use crate::middleware::session::{AddonSession, IframeParams};
use crate::services::AuthorizedUser;
use crate::AppState;
use auth::AuthDestination;
use axum::response::{IntoResponse, Redirect, Response};
use axum::{middleware, routing::get, Json, Router};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub build_id: String,
}

/// Health check response
async fn health_check() -> Json<HealthResponse> {
    let build_id = option_env!("BUILD_ID").unwrap_or("unknown").to_string();
    Json(HealthResponse {
        status: "ok".to_string(),
        build_id,
    })
}

/// Build the complete router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    let static_files = ServeDir::new(&state.config.static_dir);

    Router::new()
        .route("/health", get(health_check))
        .merge(discovery::routes())
        .merge(auth::routes())
        .merge(attachments::routes())
        .merge(coursework::routes())
        .nest_service("/static", static_files)
        .layer(middleware::from_fn(
            crate::middleware::security::add_security_headers,
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

/// Session for this request (empty if the cookie is missing or invalid).
pub(crate) fn load_session(state: &AppState, jar: &CookieJar) -> AddonSession {
    AddonSession::from_cookies(jar, &state.config.session_signing_key)
}

/// Attach the updated session cookie to a response.
pub(crate) fn respond(
    state: &AppState,
    jar: CookieJar,
    session: &AddonSession,
    response: impl IntoResponse,
) -> Result<Response> {
    let jar = session.store(jar, &state.config.session_signing_key)?;
    Ok((jar, response).into_response())
}

/// Send the iframe to the sign-in page for `destination`.
pub(crate) fn start_auth_flow(destination: AuthDestination) -> Redirect {
    Redirect::to(&format!("/start-auth-flow/{}", destination.as_str()))
}

/// Decide who is signed in from the iframe's `login_hint`/`hd` parameters.
///
/// - neither present: fall back to the session's `login_hint`
/// - `hd` present: Classroom does not know the user; always sign in
/// - `login_hint` present: remember it and look up its stored credentials
pub(crate) fn resolve_login(
    state: &AppState,
    session: &mut AddonSession,
    params: &IframeParams,
) -> Result<Option<AuthorizedUser>> {
    let login_hint = params.login_hint.clone().filter(|v| !v.is_empty());
    let hd = params.hd.clone().filter(|v| !v.is_empty());

    match (login_hint, hd) {
        (None, None) => {
            let hint = session.login_hint.clone();
            state.credentials.authorized(session, hint.as_deref())
        }
        (_, Some(hd)) => {
            session.hd = Some(hd);
            Ok(None)
        }
        (Some(hint), None) => {
            session.login_hint = Some(hint.clone());
            state.credentials.authorized(session, Some(&hint))
        }
    }
}
