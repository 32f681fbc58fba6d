// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::http::{header, StatusCode};
use classroom_addon::middleware::session::AddonSession;

mod common;
use common::{get, location, session_cookie_header};

#[tokio::test]
async fn test_session_cookie_attributes_allow_third_party_iframe() {
    let app = common::create_test_app().await;

    let response = app
        .request(get("/classroom-addon?courseId=c1&itemId=i1", None))
        .await;

    let cookie = session_cookie_header(&response).expect("session cookie set");
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Secure"));
    assert!(cookie.contains("SameSite=None"));
    assert!(cookie.contains("Path=/"));
    assert!(cookie.contains("Max-Age=86400"));
}

#[tokio::test]
async fn test_iframe_context_survives_in_session() {
    let app = common::create_test_app().await;

    let response = app
        .request(get(
            "/classroom-addon?courseId=c1&postId=p1&addOnToken=tok&attachmentId=a1",
            None,
        ))
        .await;

    let session = app.session_from(&response).unwrap();
    assert_eq!(session.course_id.as_deref(), Some("c1"));
    assert_eq!(session.item_id.as_deref(), Some("p1"));
    assert_eq!(session.add_on_token.as_deref(), Some("tok"));
    assert_eq!(session.attachment_id.as_deref(), Some("a1"));
    assert!(session.credentials.is_none());
}

#[tokio::test]
async fn test_session_cookie_never_holds_refresh_token() {
    let app = common::create_test_app().await;
    app.seed_user("1234", "Ada Lovelace", "1//secret-refresh");

    let response = app
        .request(get("/classroom-addon?login_hint=1234", None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = session_cookie_header(&response).unwrap();
    let token = cookie.split(';').next().unwrap();
    let payload = token.split('.').nth(1).unwrap();
    let decoded = String::from_utf8(
        base64::Engine::decode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, payload)
            .unwrap(),
    )
    .unwrap();

    assert!(decoded.contains("\"login_hint\":\"1234\""));
    assert!(!decoded.contains("1//secret-refresh"));
}

#[tokio::test]
async fn test_tampered_cookie_is_treated_as_signed_out() {
    let app = common::create_test_app().await;

    let session = common::signed_in_session("1234", "ya29.session");
    let mut cookie = app.cookie(&session);
    cookie.push_str("tampered");

    let response = app.request(get("/classroom-addon", Some(&cookie))).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/start-auth-flow/discovery");
}

#[tokio::test]
async fn test_cookie_signed_with_other_key_is_ignored() {
    let app = common::create_test_app().await;

    let session = AddonSession {
        login_hint: Some("1234".to_string()),
        ..Default::default()
    };
    let foreign = session.encode(b"some-other-signing-key").unwrap();

    let response = app
        .request(get(
            "/start-auth-flow/discovery",
            Some(&format!("addon_session={}", foreign)),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request(get(
            "/authorize/discovery",
            Some(&format!("addon_session={}", foreign)),
        ))
        .await;
    let auth_url = location(&response);
    assert!(!auth_url.contains("login_hint=1234"));
    assert!(auth_url.contains("prompt=consent"));
}

#[tokio::test]
async fn test_clear_signs_out_but_keeps_stored_credentials() {
    let app = common::create_test_app().await;
    app.seed_user("1234", "Ada Lovelace", "1//stored-refresh");

    let mut session = common::signed_in_session("1234", "ya29.session");
    session.username = Some("Ada Lovelace".to_string());

    let response = app.request(get("/clear", Some(&app.cookie(&session)))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let session = app.session_from(&response).unwrap();
    assert!(session.credentials.is_none());
    assert!(session.username.is_none());
    assert_eq!(app.credential_rows(), 1);
}

#[tokio::test]
async fn test_pages_carry_iframe_security_headers() {
    let app = common::create_test_app().await;

    let response = app.request(get("/", None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();
    assert_eq!(
        headers.get(header::CONTENT_SECURITY_POLICY).unwrap(),
        "frame-ancestors 'self' https://classroom.google.com"
    );
    assert_eq!(headers.get(header::X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff");
    assert!(headers.get(header::X_FRAME_OPTIONS).is_none());
}

#[tokio::test]
async fn test_health_and_static_files() {
    let app = common::create_test_app().await;

    let response = app.request(get("/health", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = common::body_string(response).await;
    assert!(body.contains("\"status\":\"ok\""));

    let response = app
        .request(get("/static/images/taj-mahal.svg", None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_auth_destination_is_rejected() {
    let app = common::create_test_app().await;

    let response = app.request(get("/start-auth-flow/elsewhere", None)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = common::body_string(response).await;
    assert!(body.contains("An error occurred"));
    assert!(!body.contains("elsewhere"));
}
