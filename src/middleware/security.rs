// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Security headers middleware.
//!
//! Pages are rendered inside Classroom iframes, so framing is restricted to
//! this origin and Classroom rather than denied outright.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};

/// Allowed framing origins.
pub const FRAME_ANCESTORS_POLICY: &str = "frame-ancestors 'self' https://classroom.google.com";

/// Add security headers to all responses.
pub async fn add_security_headers(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(
        "X-Content-Type-Options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        "Strict-Transport-Security",
        HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );
    headers.insert(
        "Content-Security-Policy",
        HeaderValue::from_static(FRAME_ANCESTORS_POLICY),
    );
    headers.insert(
        "Referrer-Policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    response
}
