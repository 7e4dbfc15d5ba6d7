use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "harvester",
    about = "Transcript Harvester - bulk transcript fetching with adaptive rate control",
    version,
    long_about = "Fetches transcripts for externally hosted videos through an adaptive \
pipeline: sliding-window rate limiting tuned by success feedback, a bounded worker pool, \
result caching and per-item retry. The bundled binary drives the pipeline against a \
simulated source; real sources implement the TranscriptSource trait."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch the transcript for a single video
    Fetch {
        /// Video id or URL (watch?v=... and youtu.be links accepted)
        #[arg(value_name = "VIDEO")]
        video: String,

        /// Target language code
        #[arg(short, long, value_name = "LANG", env = "HARVESTER_LANGUAGE")]
        language: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Fetch transcripts for many videos concurrently
    Batch {
        /// Video ids or URLs
        #[arg(value_name = "VIDEOS", required = true)]
        videos: Vec<String>,

        /// Target language code
        #[arg(short, long, value_name = "LANG", env = "HARVESTER_LANGUAGE")]
        language: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Print limiter statistics after the run
        #[arg(long)]
        stats: bool,
    },

    /// Show or initialize the configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}

#[derive(ValueEnum, Clone, Debug)]
pub enum OutputFormat {
    /// Plain text with a transcript preview
    Text,
    /// JSON with full entries
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
