// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Classroom Add-on Server
//!
//! Serves the add-on iframes Google Classroom loads, backed by a SQLite
//! credential cache.

use classroom_addon::{config::Config, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        public_base_url = %config.public_base_url,
        grade_on_review = config.grade_on_review,
        "Starting Classroom add-on server"
    );

    // Open the credential store and build clients
    let state = Arc::new(AppState::new(config.clone())?);
    tracing::info!(path = %config.database_path.display(), "Credential store ready");

    // Build router
    let app = classroom_addon::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("classroom_addon=debug,info"));

    tracing_subscriber::registry().with(filter).with(format).init();
}
