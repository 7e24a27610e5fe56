//! Подготовка текста перед синтезом

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::{AppError, AppResult};

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("static regex"));

/// Strip markup, decode the common entities and collapse whitespace.
pub fn prepare_text_for_tts(text: &str) -> String {
    let text = HTML_TAG.replace_all(text, "");

    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&");

    text.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// Non-empty and at most `max_chars` characters.
pub fn validate_text(text: &str, max_chars: usize) -> AppResult<()> {
    if text.trim().is_empty() {
        return Err(AppError::Validation("Text is required".to_string()));
    }
    if text.chars().count() > max_chars {
        return Err(AppError::Validation(format!(
            "Text length exceeds limit of {} characters.",
            max_chars
        )));
    }
    Ok(())
}
