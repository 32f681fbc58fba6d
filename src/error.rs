// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types rendered as HTML error pages.

use crate::routes::auth::AuthDestination;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Stored credentials were rejected by Google; the user must sign in
    /// again and then return to the given iframe.
    #[error("Authorization required")]
    Unauthorized(AuthDestination),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Google API error: {0}")]
    GoogleApi(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Message used when Google answers 401 for an access token.
    pub const GOOGLE_TOKEN_ERROR: &'static str = "Google rejected the access token (401)";

    /// Rejected credentials, landing on the discovery iframe after sign-in.
    ///
    /// Routes serving other iframes re-target it with [`AppError::reauthorize_at`].
    pub fn unauthorized() -> Self {
        AppError::Unauthorized(AuthDestination::Discovery)
    }

    /// Send a rejected-credentials error to `destination` after sign-in.
    /// Other errors pass through unchanged.
    pub fn reauthorize_at(self, destination: AuthDestination) -> Self {
        match self {
            AppError::Unauthorized(_) => AppError::Unauthorized(destination),
            other => other,
        }
    }

    /// Map a storage error, keeping the message for the logs.
    pub fn database(err: impl std::fmt::Display) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::database(err)
    }
}

impl From<minijinja::Error> for AppError {
    fn from(err: minijinja::Error) -> Self {
        AppError::Template(err.to_string())
    }
}

/// Generic error page. Details stay in the logs.
fn error_page(code: &str) -> String {
    format!(
        "<!doctype html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\">\
         <title>Error</title><link rel=\"stylesheet\" href=\"/static/style.css\"></head>\n\
         <body>\n<h1>An error occurred</h1>\n<p>Something went wrong while handling \
         your request ({}).</p>\n<p><a href=\"/\">Return to the home page</a></p>\n\
         </body>\n</html>\n",
        code
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::Unauthorized(destination) => {
                tracing::info!(
                    destination = destination.as_str(),
                    "Stored credentials rejected, restarting authorization"
                );
                return Redirect::to(&format!("/start-auth-flow/{}", destination.as_str()))
                    .into_response();
            }
            AppError::NotFound(msg) => {
                tracing::warn!(error = %msg, "Not found");
                (StatusCode::NOT_FOUND, "not_found")
            }
            AppError::BadRequest(msg) => {
                tracing::warn!(error = %msg, "Bad request");
                (StatusCode::BAD_REQUEST, "bad_request")
            }
            AppError::GoogleApi(msg) => {
                tracing::warn!(error = %msg, "Google API error");
                (StatusCode::BAD_GATEWAY, "google_api_error")
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error")
            }
            AppError::Template(msg) => {
                tracing::error!(error = %msg, "Template error");
                (StatusCode::INTERNAL_SERVER_ERROR, "template_error")
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        };

        (status, Html(error_page(code))).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
