use super::{
    FetchResult, SourceError, TranscriptDescriptor, TranscriptEntry, TranscriptSource,
};
use crate::utils::display_language;

/// Resolve a transcript for `video_id` in `target_language`, walking the
/// fallback ladder: direct fetch, then enumerate and prefer an exact
/// language match, then a translatable track (translated to the target,
/// falling back to the untranslated original), then whatever track comes
/// first.
///
/// Blocking; meant to run inside the worker pool. Never panics and never
/// returns a source fault as-is: every outcome is folded into a
/// [`FetchResult`].
pub fn resolve_transcript(
    source: &dyn TranscriptSource,
    video_id: &str,
    target_language: &str,
) -> FetchResult {
    // Direct fetch first for speed
    match source.fetch_direct(video_id, target_language) {
        Ok(entries) => {
            return match validate_entries(entries) {
                Ok(entries) => FetchResult::success(
                    video_id,
                    display_language(target_language),
                    target_language,
                    entries,
                ),
                Err(e) => FetchResult::error(
                    video_id,
                    format!("Error fetching {} transcript: {}", target_language, e),
                ),
            };
        }
        Err(SourceError::NotFound(_)) => {} // fall through to the catalog
        Err(SourceError::Disabled) => {
            return FetchResult::error(video_id, SourceError::Disabled.to_string());
        }
        Err(e) => {
            return FetchResult::error(video_id, format!("An error occurred: {}", e));
        }
    }

    let tracks = match source.list_available(video_id) {
        Ok(tracks) => tracks,
        Err(SourceError::Disabled) => {
            return FetchResult::error(video_id, SourceError::Disabled.to_string());
        }
        Err(e) => {
            return FetchResult::error(video_id, format!("An error occurred: {}", e));
        }
    };

    if tracks.is_empty() {
        return FetchResult::no_transcript(
            video_id,
            "No transcripts found for this video in any language.",
        );
    }

    // Exact language match
    if let Some(track) = tracks.iter().find(|t| t.language_code == target_language) {
        return match fetch_validated(source, video_id, track) {
            Ok(entries) => success_from_track(video_id, track, entries),
            Err(e) => FetchResult::error(
                video_id,
                format!("Error fetching {} transcript: {}", target_language, e),
            ),
        };
    }

    // No exact match: try a translatable track
    if let Some(track) = tracks.iter().find(|t| t.is_translatable) {
        // Fetch the original up front so translation failure can fall back
        let original = match fetch_validated(source, video_id, track) {
            Ok(entries) => entries,
            Err(e) => {
                return FetchResult::error(
                    video_id,
                    format!("Error fetching transcript: {}", e),
                );
            }
        };

        match source
            .translate_track(video_id, track, target_language)
            .and_then(validate_entries)
        {
            Ok(translated) => {
                let mut result = FetchResult::success(
                    video_id,
                    format!("{} (Translated)", display_language(target_language)),
                    target_language,
                    translated,
                );
                result.is_generated = track.is_generated;
                result.is_translatable = true;
                return result;
            }
            Err(e) => {
                // Translation failed, deliver the original with a note
                let mut result = success_from_track(video_id, track, original);
                result.error = Some(format!(
                    "Translation failed: {}. Using original transcript.",
                    e
                ));
                return result;
            }
        }
    }

    // Last resort: first available track in any language
    let track = &tracks[0];
    match fetch_validated(source, video_id, track) {
        Ok(entries) => success_from_track(video_id, track, entries),
        Err(e) => FetchResult::error(video_id, format!("Error fetching transcript: {}", e)),
    }
}

fn fetch_validated(
    source: &dyn TranscriptSource,
    video_id: &str,
    track: &TranscriptDescriptor,
) -> Result<Vec<TranscriptEntry>, SourceError> {
    source
        .fetch_track(video_id, track)
        .and_then(validate_entries)
}

fn success_from_track(
    video_id: &str,
    track: &TranscriptDescriptor,
    entries: Vec<TranscriptEntry>,
) -> FetchResult {
    let mut result = FetchResult::success(
        video_id,
        track.language.clone(),
        track.language_code.clone(),
        entries,
    );
    result.is_generated = track.is_generated;
    result.is_translatable = track.is_translatable;
    result
}

/// Reject empty or malformed entry sequences instead of defaulting fields
/// silently. A rejected payload surfaces as a transient-pattern error the
/// orchestrator may retry.
fn validate_entries(entries: Vec<TranscriptEntry>) -> Result<Vec<TranscriptEntry>, SourceError> {
    if entries.is_empty() {
        return Err(SourceError::Malformed("empty transcript".to_string()));
    }
    for (index, entry) in entries.iter().enumerate() {
        if !entry.start.is_finite() || entry.start < 0.0 {
            return Err(SourceError::Malformed(format!(
                "entry {} has invalid start {}",
                index, entry.start
            )));
        }
        if !entry.duration.is_finite() || entry.duration < 0.0 {
            return Err(SourceError::Malformed(format!(
                "entry {} has invalid duration {}",
                index, entry.duration
            )));
        }
    }
    Ok(entries)
}
