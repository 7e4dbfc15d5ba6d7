use anyhow::Result;
use console::style;
use std::fmt::Write as _;
use std::path::Path;

use crate::cli::OutputFormat;
use crate::service::BatchOutcome;
use crate::source::{FetchResult, FetchStatus};

/// How many transcript lines a console preview shows before eliding.
const PREVIEW_LINES: usize = 10;

/// Render a single result in the requested format.
pub fn format_result(result: &FetchResult, format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(format_result_text(result)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
    }
}

/// Render a batch outcome in the requested format.
pub fn format_batch(outcome: &BatchOutcome, format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => {
            let mut text = String::new();
            for result in &outcome.results {
                text.push_str(&format_result_text(result));
                text.push('\n');
            }
            let summary = &outcome.summary;
            let _ = writeln!(text, "{}", "=".repeat(60));
            let _ = writeln!(text, "Total videos processed: {}", summary.total);
            let _ = writeln!(text, "Successful: {}", summary.successful);
            let _ = writeln!(text, "Failed: {}", summary.failed);
            if summary.successful > 0 {
                let _ = writeln!(
                    text,
                    "Average processing time: {:.2}s",
                    summary.average_processing_time
                );
            }
            let _ = writeln!(text, "Completed in {:.2}s", summary.total_elapsed);
            Ok(text)
        }
        OutputFormat::Json => Ok(serde_json::to_string_pretty(outcome)?),
    }
}

fn format_result_text(result: &FetchResult) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "{}", "=".repeat(60));
    let _ = writeln!(text, "Video ID: {}", result.video_id);
    let _ = writeln!(text, "Status: {}", status_label(result.status));
    let _ = writeln!(text, "Processing time: {:.2}s", result.processing_time);

    match result.status {
        FetchStatus::Success => {
            if let Some(language) = &result.language {
                let _ = writeln!(text, "Language: {}", language);
            }
            if result.is_generated {
                let _ = writeln!(text, "Type: Auto-generated");
            }
            if result.is_translatable {
                let _ = writeln!(text, "Translatable: Yes");
            }
            if let Some(note) = &result.error {
                let _ = writeln!(text, "Note: {}", note);
            }
            if let Some(entries) = &result.entries {
                let _ = writeln!(text, "\nTranscript:");
                let _ = writeln!(text, "{}", "-".repeat(50));
                for entry in entries.iter().take(PREVIEW_LINES) {
                    let _ = writeln!(text, "[{:.2}s] {}", entry.start, entry.text);
                }
                if entries.len() > PREVIEW_LINES {
                    let _ = writeln!(
                        text,
                        "... and {} more entries",
                        entries.len() - PREVIEW_LINES
                    );
                }
                let _ = writeln!(text, "\nTotal entries: {}", entries.len());
            }
        }
        FetchStatus::NoTranscript | FetchStatus::Error => {
            if let Some(error) = &result.error {
                let _ = writeln!(text, "Error: {}", error);
            }
        }
    }
    text
}

fn status_label(status: FetchStatus) -> &'static str {
    match status {
        FetchStatus::Success => "SUCCESS",
        FetchStatus::NoTranscript => "NO TRANSCRIPT",
        FetchStatus::Error => "ERROR",
    }
}

/// Print a single result to the console with status coloring.
pub fn print_result(result: &FetchResult, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", format_result(result, format)?),
        OutputFormat::Text => {
            let body = format_result_text(result);
            match result.status {
                FetchStatus::Success => print!("{}", body),
                FetchStatus::NoTranscript => print!("{}", style(body).yellow()),
                FetchStatus::Error => print!("{}", style(body).red()),
            }
        }
    }
    Ok(())
}

/// Print a batch outcome to the console.
pub fn print_batch(outcome: &BatchOutcome, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", format_batch(outcome, format)?),
        OutputFormat::Text => {
            for result in &outcome.results {
                print_result(result, format)?;
                println!();
            }
            let summary = &outcome.summary;
            println!("{}", "=".repeat(60));
            println!("{}", style("BATCH PROCESSING SUMMARY").bold());
            println!("Total videos processed: {}", summary.total);
            println!("Successful: {}", style(summary.successful).green());
            println!("Failed: {}", style(summary.failed).red());
            if summary.successful > 0 {
                println!(
                    "Average processing time: {:.2}s",
                    summary.average_processing_time
                );
            }
            println!("Completed in {:.2}s", summary.total_elapsed);
        }
    }
    Ok(())
}

/// Save rendered output to a file
pub async fn save_to_file(content: &str, path: &Path) -> Result<()> {
    fs_err::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::TranscriptEntry;

    fn success_result(lines: usize) -> FetchResult {
        let entries = (0..lines)
            .map(|i| TranscriptEntry {
                text: format!("line {}", i),
                start: i as f64,
                duration: 1.0,
            })
            .collect();
        FetchResult::success("vid", "English", "en", entries)
    }

    #[test]
    fn text_format_previews_at_most_ten_entries() {
        let text = format_result(&success_result(14), &OutputFormat::Text).unwrap();
        assert!(text.contains("Video ID: vid"));
        assert!(text.contains("[0.00s] line 0"));
        assert!(text.contains("[9.00s] line 9"));
        assert!(!text.contains("line 10"));
        assert!(text.contains("... and 4 more entries"));
        assert!(text.contains("Total entries: 14"));
    }

    #[test]
    fn json_format_round_trips() {
        let json = format_result(&success_result(2), &OutputFormat::Json).unwrap();
        let parsed: FetchResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.video_id, "vid");
        assert_eq!(parsed.entries.unwrap().len(), 2);
    }

    #[test]
    fn error_results_show_the_message() {
        let result = FetchResult::error("vid", "timeout after 10.0s waiting for transcript fetch");
        let text = format_result(&result, &OutputFormat::Text).unwrap();
        assert!(text.contains("Status: ERROR"));
        assert!(text.contains("Error: timeout after"));
    }
}
