// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Add-on attachment and student submission records.

use serde::{Deserialize, Serialize};

/// Maximum points offered for every activity attachment.
pub const ACTIVITY_MAX_POINTS: i64 = 50;

/// An image attachment created through the add-on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Attachment id returned by Classroom on creation
    pub attachment_id: String,
    pub image_filename: String,
    /// Caption shown with the image; also the expected student answer
    pub image_caption: String,
    pub max_points: Option<i64>,
    /// Google id of the teacher who created the attachment
    pub teacher_id: Option<String>,
}

impl Attachment {
    /// Grade a student response: full marks for the image caption
    /// (case-insensitive), otherwise zero.
    pub fn grade_for(&self, response: &str) -> i64 {
        if response.to_lowercase() == self.image_caption.to_lowercase() {
            self.max_points.unwrap_or(0)
        } else {
            0
        }
    }
}

/// A student's response to an activity attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub submission_id: String,
    pub attachment_id: String,
    pub student_response: String,
}
