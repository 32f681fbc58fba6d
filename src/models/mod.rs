// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod attachment;
pub mod user;

pub use attachment::{Attachment, Submission, ACTIVITY_MAX_POINTS};
pub use user::{CredentialUpdate, ProfileFields, UpsertOutcome, UserCredential};
