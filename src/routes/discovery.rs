// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Landing pages and the add-on discovery iframe.

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use minijinja::context;
use std::sync::Arc;

use super::auth::AuthDestination;
use super::{load_session, resolve_login, respond, start_auth_flow};
use crate::error::{AppError, Result};
use crate::middleware::session::IframeParams;
use crate::services::classroom::pretty;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(index))
        .route("/index", get(index))
        .route("/classroom-addon", get(classroom_addon))
        .route("/addon-discovery", get(classroom_addon))
        .route("/test/{request_type}", get(test_api_request))
}

/// Stand-in for the provider's own home page.
async fn index(State(state): State<Arc<AppState>>) -> Result<Response> {
    let page = state.templates.render(
        "index.html",
        context! { message => "You've reached the index page." },
    )?;
    Ok(page.into_response())
}

/// Landing page of the attachment discovery iframe.
///
/// Signed-in users see the discovery page; everyone else is sent to the
/// authorization page.
async fn classroom_addon(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<IframeParams>,
) -> Result<Response> {
    let mut session = load_session(&state, &jar);
    session.absorb(&params);

    if resolve_login(&state, &mut session, &params)?.is_none() {
        return respond(
            &state,
            jar,
            &session,
            start_auth_flow(AuthDestination::Discovery),
        );
    }

    let page = state.templates.render(
        "addon-discovery.html",
        context! {
            message => "You've reached the addon discovery page.",
            username => session.username.clone(),
        },
    )?;
    respond(&state, jar, &session, page)
}

/// Call an API with the signed-in user's credentials and show the result.
///
/// `username` re-fetches the user's profile (and refreshes the stored
/// copy); `courses` lists their Classroom courses.
async fn test_api_request(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(request_type): Path<String>,
) -> Result<Response> {
    let mut session = load_session(&state, &jar);

    let Some(user) = state.credentials.authorized(&mut session, None)? else {
        return respond(
            &state,
            jar,
            &session,
            start_auth_flow(AuthDestination::Discovery),
        );
    };

    let data = match request_type.as_str() {
        "username" => {
            let user_info = state
                .credentials
                .refresh_profile(&mut session, &user)
                .await?;
            pretty(&serde_json::json!(user_info.name))
        }
        "courses" => {
            let access_token = state.credentials.access_token(&mut session, &user).await?;
            pretty(&state.classroom.list_courses(&access_token).await?)
        }
        other => {
            return Err(AppError::BadRequest(format!(
                "Unknown request type: {}",
                other
            )))
        }
    };

    let page = state.templates.render(
        "show-api-query-result.html",
        context! { data => data, data_title => request_type },
    )?;
    respond(&state, jar, &session, page)
}
