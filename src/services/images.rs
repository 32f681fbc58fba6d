//! Image choices offered on the attachment options page.

use crate::error::AppError;
use serde::Serialize;
use std::path::Path;

/// One selectable image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageOption {
    /// Form field name of the image's checkbox
    pub field_id: String,
    pub filename: String,
    pub caption: String,
}

/// Caption from a filename: stem, dashes to spaces, title case.
///
/// `great-wall-of-china.svg` becomes `Great Wall Of China`.
pub fn caption_for(filename: &str) -> String {
    let stem = filename.split('.').next().unwrap_or(filename);
    stem.split('-')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// List the images in `dir`, sorted by filename. Hidden files and
/// subdirectories are skipped.
pub fn list_image_options(dir: &Path) -> Result<Vec<ImageOption>, AppError> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        AppError::Internal(anyhow::anyhow!(
            "Failed to read image directory {}: {}",
            dir.display(),
            e
        ))
    })?;

    let mut filenames = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| AppError::Internal(e.into()))?;
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if !name.starts_with('.') {
                filenames.push(name.to_string());
            }
        }
    }
    filenames.sort();

    Ok(filenames
        .into_iter()
        .enumerate()
        .map(|(i, filename)| ImageOption {
            field_id: format!("selected_{}", i),
            caption: caption_for(&filename),
            filename,
        })
        .collect())
}

/// Options whose checkbox was ticked in a submitted form.
pub fn selected_options<'a>(
    options: &'a [ImageOption],
    form: &[(String, String)],
) -> Vec<&'a ImageOption> {
    options
        .iter()
        .filter(|option| {
            form.iter()
                .any(|(key, value)| key == &option.field_id && !value.is_empty())
        })
        .collect()
}
