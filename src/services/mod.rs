// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Service layer modules.

pub mod classroom;
pub mod credentials;
pub mod google;
pub mod images;

pub use classroom::ClassroomClient;
pub use credentials::{AuthorizedUser, CredentialService};
pub use google::GoogleClient;
