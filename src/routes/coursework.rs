// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! CourseWork created and modified from outside Classroom.

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use minijinja::context;
use std::sync::Arc;

use super::auth::AuthDestination;
use super::{load_session, respond, start_auth_flow};
use crate::error::{AppError, Result};
use crate::services::classroom::{pretty, ItemRef, ItemType};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/create-coursework-assignment",
            get(create_coursework_assignment),
        )
        .route(
            "/modify-coursework-assignment",
            get(modify_coursework_assignment),
        )
        .route(
            "/example-coursework-assignment/{assignment_type}",
            get(example_coursework_assignment),
        )
}

/// Create a draft assignment in the configured course.
///
/// Users who may create add-on attachments get an assignment carrying an
/// add-on attachment; everyone else gets a link material.
async fn create_coursework_assignment(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Response> {
    let mut session = load_session(&state, &jar);

    let Some(user) = state.credentials.authorized(&mut session, None)? else {
        return respond(
            &state,
            jar,
            &session,
            start_auth_flow(AuthDestination::Coursework),
        );
    };
    let access_token = state
        .credentials
        .access_token(&mut session, &user)
        .await
        .map_err(|e| e.reauthorize_at(AuthDestination::Coursework))?;

    let course_id = state.config.course_id.as_str();
    let mut requests = vec![format!("checkAddOnCreationEligibility courseId:{}", course_id)];
    let mut responses = Vec::new();

    let eligibility = state
        .classroom
        .check_add_on_creation_eligibility(&access_token, course_id)
        .await?;
    responses.push(pretty(&eligibility));

    let eligible = eligibility
        .get("isCreateAttachmentEligible")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let assignment_type = if !eligible {
        let coursework = serde_json::json!({
            "title": "My CourseWork Assignment with Link Material",
            "description": "Created using the Classroom CourseWork API.",
            "workType": "ASSIGNMENT",
            "state": "DRAFT",
            "materials": [{
                "link": {
                    "url": state.config.external_url("/example-coursework-assignment/link-material")
                }
            }],
        });
        let assignment = state
            .classroom
            .create_course_work(&access_token, course_id, &coursework)
            .await?;
        requests.push(pretty(&coursework));
        responses.push(pretty(&assignment));

        "link material"
    } else {
        let coursework = serde_json::json!({
            "title": "My CourseWork Assignment with Add-on Attachment",
            "description": "Created using the Classroom CourseWork API.",
            "workType": "ASSIGNMENT",
            "state": "DRAFT",
        });
        let assignment = state
            .classroom
            .create_course_work(&access_token, course_id, &coursework)
            .await?;
        requests.push(pretty(&coursework));
        responses.push(pretty(&assignment));

        let assignment_id = assignment
            .get("id")
            .and_then(|id| id.as_str())
            .ok_or_else(|| AppError::GoogleApi("CourseWork response missing id".to_string()))?;

        let content_url =
            state.config.external_url("/example-coursework-assignment/add-on-attachment");
        let attachment = serde_json::json!({
            "teacherViewUri": { "uri": content_url },
            "studentViewUri": { "uri": content_url },
            "title": format!("Test Attachment for Assignment {}", assignment_id),
        });
        let item = ItemRef {
            course_id: course_id.to_string(),
            item_id: assignment_id.to_string(),
            item_type: ItemType::CourseWork,
        };
        let response = state
            .classroom
            .create_add_on_attachment(&access_token, &item, None, &attachment)
            .await?;
        requests.push(pretty(&attachment));
        responses.push(pretty(&response));

        "add-on attachment"
    };

    tracing::info!(course_id, assignment_type, "Created CourseWork assignment");

    let page = state.templates.render(
        "coursework-assignment-created.html",
        context! {
            assignment_type => assignment_type,
            requests => requests,
            responses => responses,
        },
    )?;
    respond(&state, jar, &session, page)
}

/// Prefix the configured assignment's title.
async fn modify_coursework_assignment(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Response> {
    let mut session = load_session(&state, &jar);

    let Some(user) = state.credentials.authorized(&mut session, None)? else {
        return respond(
            &state,
            jar,
            &session,
            start_auth_flow(AuthDestination::Coursework),
        );
    };
    let access_token = state
        .credentials
        .access_token(&mut session, &user)
        .await
        .map_err(|e| e.reauthorize_at(AuthDestination::Coursework))?;

    let course_id = state.config.course_id.as_str();
    let coursework_id = state.config.coursework_id.as_str();

    let current = state
        .classroom
        .get_course_work(&access_token, course_id, coursework_id)
        .await?;
    let title = current
        .get("title")
        .and_then(|t| t.as_str())
        .unwrap_or_default();

    let modified = state
        .classroom
        .patch_course_work_title(
            &access_token,
            course_id,
            coursework_id,
            &format!("(Modified by API request) {}", title),
        )
        .await?;

    let assignment_title = modified
        .get("title")
        .and_then(|t| t.as_str())
        .unwrap_or_default()
        .to_string();

    let page = state.templates.render(
        "coursework-modified.html",
        context! {
            assignment_title => assignment_title,
            responses => vec![pretty(&current), pretty(&modified)],
        },
    )?;
    respond(&state, jar, &session, page)
}

/// Content page the created assignments link to.
async fn example_coursework_assignment(
    State(state): State<Arc<AppState>>,
    Path(assignment_type): Path<String>,
) -> Result<Response> {
    let page = state.templates.render(
        "example-coursework-assignment.html",
        context! { assignment_type => assignment_type.replace('-', " ") },
    )?;
    Ok(page.into_response())
}
