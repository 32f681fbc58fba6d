// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Classroom Add-on: a Google Classroom add-on server
//!
//! This crate signs users in with Google OAuth 2.0, caches their refresh
//! tokens in SQLite, and calls the Classroom API on their behalf to create
//! attachments, record student responses, and pass grades back.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod templates;

use config::Config;
use db::SqliteDb;
use error::AppError;
use services::{ClassroomClient, CredentialService, GoogleClient};
use std::time::Duration;
use templates::Templates;

/// Timeout for every outbound call to Google.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: SqliteDb,
    pub credentials: CredentialService,
    pub classroom: ClassroomClient,
    pub templates: Templates,
}

impl AppState {
    /// Open the credential store and build the API clients.
    pub fn new(config: Config) -> Result<Self, AppError> {
        let db = SqliteDb::open(&config.database_path)?;
        Self::with_db(config, db)
    }

    /// Build state around an already-open store.
    pub fn with_db(config: Config, db: SqliteDb) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HTTP client: {}", e)))?;

        let google = GoogleClient::new(
            http.clone(),
            config.endpoints.clone(),
            config.google_client_id.clone(),
            config.google_client_secret.clone(),
        );
        let classroom = ClassroomClient::new(
            http,
            &config.endpoints.classroom_api_url,
            config.google_api_key.clone(),
        );
        let templates = Templates::load()?;

        Ok(Self {
            credentials: CredentialService::new(google, db.clone()),
            classroom,
            templates,
            db,
            config,
        })
    }
}
