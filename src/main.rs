use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use transcript_harvester::cli::{Cli, Commands};
use transcript_harvester::config::Config;
use transcript_harvester::service::TranscriptService;
use transcript_harvester::source::{simulated::SimulatedSource, SourceFetcher};
use transcript_harvester::{output, utils};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose {
        "transcript_harvester=debug,harvester=debug"
    } else {
        "transcript_harvester=info,harvester=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().await?;

    match cli.command {
        Commands::Fetch {
            video,
            language,
            format,
            output,
        } => {
            let language = language.unwrap_or_else(|| config.app.default_language.clone());
            let video_id = utils::extract_video_id(&video)?;
            let service = build_service(&config);

            tracing::info!("Fetching transcript for {} ({})", video_id, language);
            let result = service.fetch_transcript(&video_id, &language).await;

            match output {
                Some(path) => {
                    let content = output::format_result(&result, &format)?;
                    output::save_to_file(&content, &path).await?;
                    println!("Result saved to: {}", path.display());
                }
                None => output::print_result(&result, &format)?,
            }
            service.shutdown().await;
        }
        Commands::Batch {
            videos,
            language,
            format,
            output,
            stats,
        } => {
            let language = language.unwrap_or_else(|| config.app.default_language.clone());
            let video_ids = videos
                .iter()
                .map(|v| utils::extract_video_id(v))
                .collect::<Result<Vec<_>>>()?;
            let service = build_service(&config);

            let progress = if cli.quiet {
                ProgressBar::hidden()
            } else {
                let spinner = ProgressBar::new_spinner();
                spinner.set_style(
                    ProgressStyle::default_spinner()
                        .template("{spinner:.green} [{elapsed_precise}] {msg}")
                        .unwrap(),
                );
                spinner.set_message(format!(
                    "Processing {} videos concurrently...",
                    video_ids.len()
                ));
                spinner
            };

            let outcome = service.fetch_batch(&video_ids, &language).await?;
            progress.finish_with_message(format!(
                "Processed {} videos in {:.2}s",
                outcome.summary.total, outcome.summary.total_elapsed
            ));

            match output {
                Some(path) => {
                    let content = output::format_batch(&outcome, &format)?;
                    output::save_to_file(&content, &path).await?;
                    println!("Results saved to: {}", path.display());
                }
                None => output::print_batch(&outcome, &format)?,
            }

            if stats {
                let snapshot = service.stats().await;
                println!("\nLimiter statistics:");
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            }
            service.shutdown().await;
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                config.save().await?;
                println!("Configuration written with current values.");
            }
        }
    }

    Ok(())
}

/// Wire the pipeline over the bundled simulated source.
fn build_service(config: &Config) -> TranscriptService {
    let source = Arc::new(SimulatedSource::new(&config.simulation));
    let fetcher = Arc::new(SourceFetcher::new(source));
    TranscriptService::new(config, fetcher)
}
