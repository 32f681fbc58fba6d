//! HTML templates, embedded in the binary.

use crate::error::AppError;
use axum::response::Html;
use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;
use std::sync::Arc;

/// Every template the routes render, by name.
const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../templates/base.html")),
    ("_exchanges.html", include_str!("../templates/_exchanges.html")),
    ("index.html", include_str!("../templates/index.html")),
    (
        "addon-discovery.html",
        include_str!("../templates/addon-discovery.html"),
    ),
    (
        "authorization.html",
        include_str!("../templates/authorization.html"),
    ),
    ("close-me.html", include_str!("../templates/close-me.html")),
    ("signed-out.html", include_str!("../templates/signed-out.html")),
    (
        "show-api-query-result.html",
        include_str!("../templates/show-api-query-result.html"),
    ),
    (
        "attachment-options.html",
        include_str!("../templates/attachment-options.html"),
    ),
    (
        "create-attachment.html",
        include_str!("../templates/create-attachment.html"),
    ),
    (
        "show-activity-attachment.html",
        include_str!("../templates/show-activity-attachment.html"),
    ),
    (
        "acknowledge-submission.html",
        include_str!("../templates/acknowledge-submission.html"),
    ),
    (
        "show-student-submission.html",
        include_str!("../templates/show-student-submission.html"),
    ),
    (
        "coursework-assignment-created.html",
        include_str!("../templates/coursework-assignment-created.html"),
    ),
    (
        "coursework-modified.html",
        include_str!("../templates/coursework-modified.html"),
    ),
    (
        "example-coursework-assignment.html",
        include_str!("../templates/example-coursework-assignment.html"),
    ),
];

/// Wrapper around [`minijinja::Environment`] holding the compiled pages.
#[derive(Clone)]
pub struct Templates {
    env: Arc<Environment<'static>>,
}

impl Templates {
    /// Compile all embedded templates.
    ///
    /// # Errors
    ///
    /// Returns an error if a template fails to parse.
    pub fn load() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        // Printing an undefined variable is an error; testing one is not.
        env.set_undefined_behavior(UndefinedBehavior::SemiStrict);

        for (name, source) in TEMPLATES {
            env.add_template(*name, *source)?;
        }
        tracing::debug!(count = TEMPLATES.len(), "Templates loaded");

        Ok(Self { env: Arc::new(env) })
    }

    /// Render a page.
    pub fn render<S: Serialize>(&self, name: &str, context: S) -> Result<Html<String>, AppError> {
        let template = self.env.get_template(name)?;
        Ok(Html(template.render(context)?))
    }
}
