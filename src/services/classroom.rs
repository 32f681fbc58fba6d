// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google Classroom API client.
//!
//! Handles:
//! - Add-on context lookups for the iframe the user opened
//! - Add-on attachment creation and lookup
//! - Student submission lookup and grade passback
//! - CourseWork creation and modification from outside Classroom

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The kind of Classroom item an add-on is attached to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemType {
    #[default]
    CourseWork,
    CourseWorkMaterials,
    Announcements,
    /// Legacy `postId` parameter
    Posts,
}

impl ItemType {
    /// Parse the `itemType` iframe parameter.
    pub fn from_param(value: &str) -> Option<Self> {
        match value {
            "courseWork" => Some(Self::CourseWork),
            "courseWorkMaterials" => Some(Self::CourseWorkMaterials),
            "announcements" | "announcement" => Some(Self::Announcements),
            "posts" => Some(Self::Posts),
            _ => None,
        }
    }

    /// REST collection that owns items of this type.
    pub fn collection(self) -> &'static str {
        match self {
            Self::CourseWork => "courseWork",
            Self::CourseWorkMaterials => "courseWorkMaterials",
            Self::Announcements => "announcements",
            Self::Posts => "posts",
        }
    }
}

/// A Classroom item the add-on is loaded against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRef {
    pub course_id: String,
    pub item_id: String,
    pub item_type: ItemType,
}

impl ItemRef {
    fn path(&self) -> String {
        format!(
            "/v1/courses/{}/{}/{}",
            urlencoding::encode(&self.course_id),
            self.item_type.collection(),
            urlencoding::encode(&self.item_id)
        )
    }
}

/// Response of `getAddOnContext`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddOnContext {
    #[serde(default)]
    pub student_context: Option<StudentContext>,
    #[serde(default)]
    pub teacher_context: Option<Value>,
    #[serde(skip)]
    pub raw: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentContext {
    #[serde(default)]
    pub submission_id: Option<String>,
}

impl AddOnContext {
    pub fn is_student(&self) -> bool {
        self.student_context.is_some()
    }

    pub fn submission_id(&self) -> Option<&str> {
        self.student_context
            .as_ref()
            .and_then(|ctx| ctx.submission_id.as_deref())
    }
}

/// Classroom REST client. Every call takes the caller's access token.
#[derive(Clone)]
pub struct ClassroomClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl ClassroomClient {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Context of the current user on an item (teacher or student).
    pub async fn get_add_on_context(
        &self,
        access_token: &str,
        item: &ItemRef,
    ) -> Result<AddOnContext, AppError> {
        let url = format!("{}{}/addOnContext", self.base_url, item.path());
        let raw: Value = self.send(self.http.get(&url), access_token).await?;
        let mut context: AddOnContext = serde_json::from_value(raw.clone())
            .map_err(|e| AppError::GoogleApi(format!("JSON parse error: {}", e)))?;
        context.raw = raw;
        Ok(context)
    }

    /// Create an add-on attachment on an item.
    ///
    /// `add_on_token` is required when called from the discovery iframe and
    /// absent when attaching to an item created through the API.
    pub async fn create_add_on_attachment(
        &self,
        access_token: &str,
        item: &ItemRef,
        add_on_token: Option<&str>,
        body: &Value,
    ) -> Result<Value, AppError> {
        let url = format!("{}{}/addOnAttachments", self.base_url, item.path());
        let mut request = self.http.post(&url).json(body);
        if let Some(token) = add_on_token {
            request = request.query(&[("addOnToken", token)]);
        }
        self.send(request, access_token).await
    }

    pub async fn get_add_on_attachment(
        &self,
        access_token: &str,
        item: &ItemRef,
        attachment_id: &str,
    ) -> Result<Value, AppError> {
        let url = format!(
            "{}{}/addOnAttachments/{}",
            self.base_url,
            item.path(),
            urlencoding::encode(attachment_id)
        );
        self.send(self.http.get(&url), access_token).await
    }

    pub async fn get_student_submission(
        &self,
        access_token: &str,
        item: &ItemRef,
        attachment_id: &str,
        submission_id: &str,
    ) -> Result<Value, AppError> {
        let url = self.submission_url(item, attachment_id, submission_id);
        self.send(self.http.get(&url), access_token).await
    }

    /// Set the grade numerator on a student's attachment submission.
    pub async fn patch_points_earned(
        &self,
        access_token: &str,
        item: &ItemRef,
        attachment_id: &str,
        submission_id: &str,
        points_earned: i64,
    ) -> Result<Value, AppError> {
        let url = self.submission_url(item, attachment_id, submission_id);
        let body = serde_json::json!({ "pointsEarned": points_earned });
        let request = self
            .http
            .patch(&url)
            .query(&[("updateMask", "pointsEarned")])
            .json(&body);
        self.send(request, access_token).await
    }

    pub async fn check_add_on_creation_eligibility(
        &self,
        access_token: &str,
        course_id: &str,
    ) -> Result<Value, AppError> {
        let url = format!(
            "{}/v1/courses/{}:checkAddOnCreationEligibility",
            self.base_url,
            urlencoding::encode(course_id)
        );
        self.send(self.http.get(&url), access_token).await
    }

    pub async fn create_course_work(
        &self,
        access_token: &str,
        course_id: &str,
        body: &Value,
    ) -> Result<Value, AppError> {
        let url = format!(
            "{}/v1/courses/{}/courseWork",
            self.base_url,
            urlencoding::encode(course_id)
        );
        self.send(self.http.post(&url).json(body), access_token).await
    }

    pub async fn get_course_work(
        &self,
        access_token: &str,
        course_id: &str,
        coursework_id: &str,
    ) -> Result<Value, AppError> {
        let url = self.course_work_url(course_id, coursework_id);
        self.send(self.http.get(&url), access_token).await
    }

    pub async fn patch_course_work_title(
        &self,
        access_token: &str,
        course_id: &str,
        coursework_id: &str,
        title: &str,
    ) -> Result<Value, AppError> {
        let url = self.course_work_url(course_id, coursework_id);
        let body = serde_json::json!({ "title": title });
        let request = self
            .http
            .patch(&url)
            .query(&[("updateMask", "title")])
            .json(&body);
        self.send(request, access_token).await
    }

    /// List the courses visible to the user.
    pub async fn list_courses(&self, access_token: &str) -> Result<Value, AppError> {
        let url = format!("{}/v1/courses", self.base_url);
        self.send(self.http.get(&url), access_token).await
    }

    fn course_work_url(&self, course_id: &str, coursework_id: &str) -> String {
        format!(
            "{}/v1/courses/{}/courseWork/{}",
            self.base_url,
            urlencoding::encode(course_id),
            urlencoding::encode(coursework_id)
        )
    }

    fn submission_url(&self, item: &ItemRef, attachment_id: &str, submission_id: &str) -> String {
        format!(
            "{}{}/addOnAttachments/{}/studentSubmissions/{}",
            self.base_url,
            item.path(),
            urlencoding::encode(attachment_id),
            urlencoding::encode(submission_id)
        )
    }

    /// Authenticate, send, and parse a JSON response.
    async fn send(
        &self,
        mut request: reqwest::RequestBuilder,
        access_token: &str,
    ) -> Result<Value, AppError> {
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key.as_str())]);
        }

        let response = request
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::GoogleApi(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 401 {
                return Err(AppError::GoogleApi(AppError::GOOGLE_TOKEN_ERROR.to_string()));
            }

            return Err(AppError::GoogleApi(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::GoogleApi(format!("JSON parse error: {}", e)))
    }
}

/// Pretty-printed JSON for the request/response panels on result pages.
pub fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
