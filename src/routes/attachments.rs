// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Attachment routes: image selection, the activity iframe, and the
//! Student Work Review iframe with grade passback.

use axum::{
    extract::{Form, Query, State},
    response::Response,
    routing::get,
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use minijinja::context;
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use super::auth::AuthDestination;
use super::{load_session, resolve_login, respond, start_auth_flow};
use crate::error::{AppError, Result};
use crate::middleware::session::{AddonSession, IframeParams};
use crate::models::{Attachment, Submission, ACTIVITY_MAX_POINTS};
use crate::services::classroom::{pretty, ItemRef};
use crate::services::images::{list_image_options, selected_options, ImageOption};
use crate::AppState;

const OPTIONS_MESSAGE: &str =
    "You've reached the attachment options page. Select one or more images and click 'Create Attachment'.";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/attachment-options",
            get(attachment_options).post(create_attachments),
        )
        .route(
            "/load-attachment",
            get(load_activity_attachment).post(submit_activity_response),
        )
        .route(
            "/load-activity-attachment",
            get(load_activity_attachment).post(submit_activity_response),
        )
        .route("/view-submission", get(view_submission))
}

/// Student response to an activity.
#[derive(Debug, Deserialize, Validate)]
pub struct ActivityForm {
    #[validate(length(min = 1, max = 200))]
    pub student_response: String,
    pub csrf_token: String,
}

fn image_options(state: &AppState) -> Result<Vec<ImageOption>> {
    list_image_options(&state.config.static_dir.join("images"))
}

fn render_options(
    state: &AppState,
    session: &mut AddonSession,
    options: &[ImageOption],
    message: &str,
) -> Result<axum::response::Html<String>> {
    let csrf_token = session.ensure_csrf_token()?;
    state.templates.render(
        "attachment-options.html",
        context! {
            message => message,
            options => options,
            csrf_token => csrf_token,
        },
    )
}

/// Image selection form shown in the discovery iframe.
async fn attachment_options(
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

    let options = image_options(&state)?;
    let page = render_options(&state, &mut session, &options, OPTIONS_MESSAGE)?;
    respond(&state, jar, &session, page)
}

/// Create one add-on attachment per selected image.
async fn create_attachments(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<Vec<(String, String)>>,
) -> Result<Response> {
    let mut session = load_session(&state, &jar);

    let submitted_csrf = form
        .iter()
        .find(|(key, _)| key == "csrf_token")
        .map(|(_, value)| value.as_str())
        .unwrap_or_default();
    if !session.verify_csrf(submitted_csrf) {
        return Err(AppError::BadRequest("Invalid CSRF token".to_string()));
    }

    let Some(user) = state.credentials.authorized(&mut session, None)? else {
        return respond(
            &state,
            jar,
            &session,
            start_auth_flow(AuthDestination::Discovery),
        );
    };

    let options = image_options(&state)?;
    let selected = selected_options(&options, &form);
    if selected.is_empty() {
        let page = render_options(
            &state,
            &mut session,
            &options,
            "You didn't select any images.",
        )?;
        return respond(&state, jar, &session, page);
    }

    let item = session.item()?;
    let access_token = state.credentials.access_token(&mut session, &user).await?;

    let mut requests = Vec::new();
    let mut responses = Vec::new();

    for (index, option) in selected.iter().enumerate() {
        let body = serde_json::json!({
            "teacherViewUri": { "uri": state.config.external_url("/load-attachment") },
            "studentViewUri": { "uri": state.config.external_url("/load-attachment") },
            "studentWorkReviewUri": { "uri": state.config.external_url("/view-submission") },
            "maxPoints": ACTIVITY_MAX_POINTS,
            "title": format!("Attachment {}", index + 1),
        });
        requests.push(pretty(&body));

        let response = state
            .classroom
            .create_add_on_attachment(&access_token, &item, session.add_on_token.as_deref(), &body)
            .await?;
        responses.push(pretty(&response));

        let attachment_id = response
            .get("id")
            .and_then(|id| id.as_str())
            .ok_or_else(|| AppError::GoogleApi("Attachment response missing id".to_string()))?;

        state.db.insert_attachment(&Attachment {
            attachment_id: attachment_id.to_string(),
            image_filename: option.filename.clone(),
            image_caption: option.caption.clone(),
            max_points: response
                .get("maxPoints")
                .and_then(|points| points.as_f64())
                .map(|points| points as i64),
            teacher_id: session.login_hint.clone(),
        })?;

        tracing::info!(
            attachment_id,
            image = %option.filename,
            course_id = %item.course_id,
            "Created add-on attachment"
        );
    }

    let page = state.templates.render(
        "create-attachment.html",
        context! {
            message => format!(
                "You've reached the create attachment page.\n\nI created {} attachments.",
                selected.len()
            ),
            requests => requests,
            responses => responses,
        },
    )?;
    respond(&state, jar, &session, page)
}

fn lookup_attachment(state: &AppState, session: &AddonSession) -> Result<Attachment> {
    let attachment_id = session.require_attachment_id()?;
    state
        .db
        .get_attachment(attachment_id)?
        .ok_or_else(|| AppError::NotFound(format!("Attachment {}", attachment_id)))
}

/// Activity iframe, shown to both teachers and students.
async fn load_activity_attachment(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<IframeParams>,
) -> Result<Response> {
    let mut session = load_session(&state, &jar);
    session.absorb(&params);

    let Some(user) = resolve_login(&state, &mut session, &params)? else {
        return respond(
            &state,
            jar,
            &session,
            start_auth_flow(AuthDestination::Attachment),
        );
    };

    let attachment = lookup_attachment(&state, &session)?;
    let item = session.item()?;
    let access_token = state
        .credentials
        .access_token(&mut session, &user)
        .await
        .map_err(|e| e.reauthorize_at(AuthDestination::Attachment))?;

    let context = state
        .classroom
        .get_add_on_context(&access_token, &item)
        .await?;
    let mut responses = vec![pretty(&context.raw)];

    let user_context = if context.is_student() {
        "student"
    } else {
        "teacher"
    };
    let mut message = format!("I see that you are a {}! ", user_context);

    if context.is_student() {
        if let Some(submission_id) = context.submission_id() {
            session.submission_id = Some(submission_id.to_string());
        }
        let submission_id = session.require_submission_id()?;

        let submission = state
            .classroom
            .get_student_submission(
                &access_token,
                &item,
                &attachment.attachment_id,
                submission_id,
            )
            .await?;
        responses.push(pretty(&submission));

        let turned_in = submission
            .get("postSubmissionState")
            .and_then(|s| s.as_str())
            == Some("TURNED_IN");
        message.push_str(if turned_in {
            "You have already turned in this activity."
        } else {
            "Please complete the activity below."
        });
    } else {
        let response = state
            .classroom
            .get_add_on_attachment(&access_token, &item, &attachment.attachment_id)
            .await?;
        responses.push(pretty(&response));

        message.push_str(&format!(
            "I've loaded the attachment with ID {}.",
            attachment.attachment_id
        ));
    }

    let csrf_token = session.ensure_csrf_token()?;
    let page = state.templates.render(
        "show-activity-attachment.html",
        context! {
            message => message,
            image_filename => attachment.image_filename,
            image_caption => attachment.image_caption,
            user_context => user_context,
            csrf_token => csrf_token,
            responses => responses,
        },
    )?;
    respond(&state, jar, &session, page)
}

/// Record a student's response and, unless grading happens on review,
/// pass the grade back with the creating teacher's credentials.
async fn submit_activity_response(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<ActivityForm>,
) -> Result<Response> {
    let mut session = load_session(&state, &jar);

    if !session.verify_csrf(&form.csrf_token) {
        return Err(AppError::BadRequest("Invalid CSRF token".to_string()));
    }
    form.validate()
        .map_err(|e| AppError::BadRequest(format!("Invalid response: {}", e)))?;

    if resolve_login(&state, &mut session, &IframeParams::default())?.is_none() {
        return respond(
            &state,
            jar,
            &session,
            start_auth_flow(AuthDestination::Attachment),
        );
    }

    let attachment = lookup_attachment(&state, &session)?;
    let submission = Submission {
        submission_id: session.require_submission_id()?.to_string(),
        attachment_id: attachment.attachment_id.clone(),
        student_response: form.student_response,
    };
    state.db.upsert_submission(&submission)?;
    tracing::info!(
        submission_id = %submission.submission_id,
        attachment_id = %submission.attachment_id,
        "Recorded student response"
    );

    if !state.config.grade_on_review {
        match &attachment.teacher_id {
            // Only a teacher may set the grade, so act as the teacher who
            // created the attachment.
            Some(teacher_id) => match state.credentials.access_token_for_user(teacher_id).await {
                Ok(access_token) => {
                    pass_back_grade(&state, &session.item()?, &attachment, &submission, &access_token)
                        .await?;
                }
                Err(AppError::Unauthorized(_) | AppError::NotFound(_)) => tracing::warn!(
                    attachment_id = %attachment.attachment_id,
                    teacher_id = %teacher_id,
                    "Teacher must re-authorize; grade not passed back"
                ),
                Err(e) => return Err(e),
            },
            None => tracing::warn!(
                attachment_id = %attachment.attachment_id,
                "Attachment has no teacher; grade not passed back"
            ),
        }
    }

    let page = state.templates.render(
        "acknowledge-submission.html",
        context! {
            message => "Your response has been recorded. You can close the iframe now.",
            instructions => "Please Turn In your assignment if you have completed all tasks.",
        },
    )?;
    respond(&state, jar, &session, page)
}

/// PATCH `pointsEarned` for a submission. Returns the request and
/// response bodies for display.
async fn pass_back_grade(
    state: &AppState,
    item: &ItemRef,
    attachment: &Attachment,
    submission: &Submission,
    access_token: &str,
) -> Result<(String, String)> {
    let grade = attachment.grade_for(&submission.student_response);
    let request = pretty(&serde_json::json!({ "pointsEarned": grade }));

    let response = state
        .classroom
        .patch_points_earned(
            access_token,
            item,
            &attachment.attachment_id,
            &submission.submission_id,
            grade,
        )
        .await?;

    tracing::info!(
        submission_id = %submission.submission_id,
        attachment_id = %attachment.attachment_id,
        grade,
        "Grade passed back to Classroom"
    );

    Ok((request, pretty(&response)))
}

/// Student Work Review iframe: the teacher sees the response next to the
/// correct answer.
async fn view_submission(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<IframeParams>,
) -> Result<Response> {
    let mut session = load_session(&state, &jar);
    session.absorb(&params);

    let Some(user) = resolve_login(&state, &mut session, &params)? else {
        return respond(
            &state,
            jar,
            &session,
            start_auth_flow(AuthDestination::Attachment),
        );
    };

    let attachment = lookup_attachment(&state, &session)?;
    let submission_id = session.require_submission_id()?.to_string();

    let Some(submission) = state
        .db
        .get_submission(&submission_id, &attachment.attachment_id)?
    else {
        let page = state.templates.render(
            "acknowledge-submission.html",
            context! {
                message => "This student has not yet submitted a response.",
                correct_answer => attachment.image_caption,
            },
        )?;
        return respond(&state, jar, &session, page);
    };

    let (requests, responses) = if state.config.grade_on_review {
        let access_token = state
            .credentials
            .access_token(&mut session, &user)
            .await
            .map_err(|e| e.reauthorize_at(AuthDestination::Attachment))?;
        let (request, response) =
            pass_back_grade(&state, &session.item()?, &attachment, &submission, &access_token)
                .await?;
        (vec![request], vec![response])
    } else {
        (Vec::new(), Vec::new())
    };

    let page = state.templates.render(
        "show-student-submission.html",
        context! {
            message => format!(
                "Loaded submission {} for attachment {}.",
                submission.submission_id, attachment.attachment_id
            ),
            student_response => submission.student_response,
            correct_answer => attachment.image_caption,
            requests => requests,
            responses => responses,
        },
    )?;
    respond(&state, jar, &session, page)
}
