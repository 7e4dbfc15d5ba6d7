use url::Url;

use crate::{HarvestError, Result};

/// Extract a video id from user input: a raw id, a `watch?v=` URL, or a
/// `youtu.be` short link.
pub fn extract_video_id(input: &str) -> Result<String> {
    let trimmed = input.trim();

    if looks_like_video_id(trimmed) {
        return Ok(trimmed.to_string());
    }

    if let Ok(parsed) = Url::parse(trimmed) {
        // watch URLs carry the id in the v query parameter
        if let Some((_, id)) = parsed.query_pairs().find(|(name, _)| name == "v") {
            if looks_like_video_id(&id) {
                return Ok(id.into_owned());
            }
        }
        // short links carry it as the path
        if let Some(host) = parsed.host_str() {
            if host.ends_with("youtu.be") {
                let id = parsed.path().trim_start_matches('/');
                if looks_like_video_id(id) {
                    return Ok(id.to_string());
                }
            }
        }
    }

    Err(HarvestError::InvalidVideoId(input.to_string()).into())
}

/// Video ids are 11 characters of letters, digits, `-` and `_`.
fn looks_like_video_id(candidate: &str) -> bool {
    candidate.len() == 11
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Human display name for a language code; falls back to title-casing the
/// code when it is not a common one.
pub fn display_language(code: &str) -> String {
    match code.to_lowercase().as_str() {
        "en" => "English",
        "es" => "Spanish",
        "fr" => "French",
        "de" => "German",
        "it" => "Italian",
        "pt" => "Portuguese",
        "ja" => "Japanese",
        "ko" => "Korean",
        "zh" => "Chinese",
        "ar" => "Arabic",
        "hi" => "Hindi",
        "ru" => "Russian",
        other => return title_case(other),
    }
    .to_string()
}

fn title_case(code: &str) -> String {
    let mut chars = code.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Format duration in human-readable form
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else if total_seconds > 0 {
        format!("{}s", secs)
    } else {
        format!("{:.2}s", seconds)
    }
}
