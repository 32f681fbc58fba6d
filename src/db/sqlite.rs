// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! SQLite-backed credential cache with typed operations.
//!
//! Provides high-level operations for:
//! - User credentials (refresh token plus cached profile)
//! - Attachments (images attached to Classroom items)
//! - Submissions (student responses, keyed by submission and attachment)

use crate::error::AppError;
use crate::models::{Attachment, CredentialUpdate, Submission, UpsertOutcome, UserCredential};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Embedded migrations, applied in order on open.
const MIGRATIONS: &[(&str, &str)] = &[("0001_init", include_str!("../../migrations/0001_init.sql"))];

/// SQLite database handle shared across requests.
#[derive(Clone)]
pub struct SqliteDb {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDb {
    /// Open (and create if missing) the database file.
    pub fn open(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(AppError::database)?;
        }

        let conn = Connection::open(path)?;
        // WAL for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        let db = Self::from_connection(conn)?;
        tracing::info!(path = %path.display(), "Opened credential store");
        Ok(db)
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self, AppError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, AppError> {
        run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.conn
            .lock()
            .map_err(|_| AppError::Database("database mutex poisoned".to_string()))
    }

    // ─── Credential Operations ───────────────────────────────────

    /// Get the cached credential for a user. `None` means "must authorize".
    pub fn get_credential(&self, user_id: &str) -> Result<Option<UserCredential>, AppError> {
        let conn = self.conn()?;
        let credential = conn
            .query_row(
                "SELECT user_id, display_name, email, portrait_url, refresh_token, access_token
                 FROM user_credentials WHERE user_id = ?1",
                params![user_id],
                map_credential,
            )
            .optional()?;
        Ok(credential)
    }

    /// Create or update a user's cached credential.
    ///
    /// Existing rows get the supplied profile and any non-empty token; a
    /// stored refresh token is never replaced by an empty one. A new row is
    /// only inserted when both a profile and a refresh token are supplied.
    pub fn upsert_credential(
        &self,
        user_id: &str,
        update: &CredentialUpdate,
    ) -> Result<UpsertOutcome, AppError> {
        let refresh_token = non_empty(update.refresh_token.as_deref());
        let access_token = non_empty(update.access_token.as_deref());

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM user_credentials WHERE user_id = ?1)",
            params![user_id],
            |row| row.get(0),
        )?;

        let outcome = if exists {
            if let Some(profile) = &update.profile {
                tx.execute(
                    "UPDATE user_credentials
                     SET display_name = ?2, email = ?3, portrait_url = ?4
                     WHERE user_id = ?1",
                    params![
                        user_id,
                        profile.display_name,
                        profile.email,
                        profile.portrait_url
                    ],
                )?;
            }
            if let Some(token) = refresh_token {
                tx.execute(
                    "UPDATE user_credentials SET refresh_token = ?2 WHERE user_id = ?1",
                    params![user_id, token],
                )?;
            }
            if let Some(token) = access_token {
                tx.execute(
                    "UPDATE user_credentials SET access_token = ?2 WHERE user_id = ?1",
                    params![user_id, token],
                )?;
            }
            UpsertOutcome::Updated
        } else {
            match (&update.profile, refresh_token) {
                (Some(profile), Some(token)) => {
                    tx.execute(
                        "INSERT INTO user_credentials
                         (user_id, display_name, email, portrait_url, refresh_token, access_token)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        params![
                            user_id,
                            profile.display_name,
                            profile.email,
                            profile.portrait_url,
                            token,
                            access_token
                        ],
                    )?;
                    UpsertOutcome::Inserted
                }
                _ => UpsertOutcome::Skipped,
            }
        };

        tx.commit()?;
        Ok(outcome)
    }

    /// Delete a user's cached credential. Returns whether a row existed.
    pub fn delete_credential(&self, user_id: &str) -> Result<bool, AppError> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM user_credentials WHERE user_id = ?1",
            params![user_id],
        )?;
        Ok(deleted > 0)
    }

    // ─── Attachment Operations ───────────────────────────────────

    /// Get an attachment by its Classroom id.
    pub fn get_attachment(&self, attachment_id: &str) -> Result<Option<Attachment>, AppError> {
        let conn = self.conn()?;
        let attachment = conn
            .query_row(
                "SELECT attachment_id, image_filename, image_caption, max_points, teacher_id
                 FROM attachments WHERE attachment_id = ?1",
                params![attachment_id],
                |row| {
                    Ok(Attachment {
                        attachment_id: row.get(0)?,
                        image_filename: row.get(1)?,
                        image_caption: row.get(2)?,
                        max_points: row.get(3)?,
                        teacher_id: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(attachment)
    }

    /// Store a newly created attachment.
    pub fn insert_attachment(&self, attachment: &Attachment) -> Result<(), AppError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO attachments
             (attachment_id, image_filename, image_caption, max_points, teacher_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                attachment.attachment_id,
                attachment.image_filename,
                attachment.image_caption,
                attachment.max_points,
                attachment.teacher_id
            ],
        )?;
        Ok(())
    }

    // ─── Submission Operations ───────────────────────────────────

    /// Get a student's submission for an attachment.
    pub fn get_submission(
        &self,
        submission_id: &str,
        attachment_id: &str,
    ) -> Result<Option<Submission>, AppError> {
        let conn = self.conn()?;
        let submission = conn
            .query_row(
                "SELECT submission_id, attachment_id, student_response
                 FROM submissions WHERE submission_id = ?1 AND attachment_id = ?2",
                params![submission_id, attachment_id],
                |row| {
                    Ok(Submission {
                        submission_id: row.get(0)?,
                        attachment_id: row.get(1)?,
                        student_response: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(submission)
    }

    /// Record a student's response, replacing any earlier one.
    pub fn upsert_submission(&self, submission: &Submission) -> Result<(), AppError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO submissions (submission_id, attachment_id, student_response)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(submission_id, attachment_id)
             DO UPDATE SET student_response = excluded.student_response",
            params![
                submission.submission_id,
                submission.attachment_id,
                submission.student_response
            ],
        )?;
        Ok(())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn map_credential(row: &Row<'_>) -> rusqlite::Result<UserCredential> {
    Ok(UserCredential {
        user_id: row.get(0)?,
        display_name: row.get(1)?,
        email: row.get(2)?,
        portrait_url: row.get(3)?,
        refresh_token: row.get(4)?,
        access_token: row.get(5)?,
    })
}

fn run_migrations(conn: &Connection) -> Result<(), AppError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM _migrations WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;

        if !already_applied {
            conn.execute_batch(sql)?;
            conn.execute("INSERT INTO _migrations (name) VALUES (?1)", params![name])?;
            tracing::info!(migration = name, "Applied migration");
        }
    }

    Ok(())
}
