use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::Instrument;
use uuid::Uuid;

use crate::config::Config;
use crate::source::{FetchResult, TranscriptFetcher};
use crate::HarvestError;

pub mod cache;
pub mod limiter;
pub mod pool;

pub use cache::{CacheKey, ResultCache};
pub use limiter::{AdaptiveRateLimiter, LimiterStats};
pub use pool::{DispatchError, WorkerPool};

/// Aggregate view of one batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,

    /// Mean processing time over successful results, in seconds
    pub average_processing_time: f64,

    /// Wall-clock seconds for the whole batch
    pub total_elapsed: f64,

    pub completed_at: DateTime<Utc>,
}

impl BatchSummary {
    fn from_results(results: &[FetchResult], elapsed: Duration) -> Self {
        let successful: Vec<&FetchResult> = results.iter().filter(|r| r.is_success()).collect();
        let average_processing_time = if successful.is_empty() {
            0.0
        } else {
            successful.iter().map(|r| r.processing_time).sum::<f64>() / successful.len() as f64
        };
        Self {
            total: results.len(),
            successful: successful.len(),
            failed: results.len() - successful.len(),
            average_processing_time,
            total_elapsed: elapsed.as_secs_f64(),
            completed_at: Utc::now(),
        }
    }
}

/// Results of a batch run, in the exact order the ids were given.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub results: Vec<FetchResult>,
    pub summary: BatchSummary,
}

/// The boundary contract an external façade consumes: single fetch, batch
/// fetch, stats snapshot.
#[async_trait]
pub trait TranscriptProvider: Send + Sync {
    async fn fetch_transcript(&self, video_id: &str, language: &str) -> FetchResult;
    async fn fetch_batch(&self, video_ids: &[String], language: &str)
        -> crate::Result<BatchOutcome>;
    async fn stats(&self) -> LimiterStats;
}

/// Orchestrates transcript fetches: cache lookup, rate-limited admission,
/// bounded dispatch with timeout, feedback bookkeeping and bounded retry.
///
/// All shared state (limiter, cache, pool slots) lives in this context
/// object; cloning is cheap and clones share it.
#[derive(Clone)]
pub struct TranscriptService {
    fetcher: Arc<dyn TranscriptFetcher>,
    limiter: Arc<AdaptiveRateLimiter>,
    cache: Arc<ResultCache>,
    pool: Arc<WorkerPool>,
    retry_budget: u32,
    retry_delay_cap: Duration,
    dispatch_timeout: Duration,
    max_batch_size: usize,
}

impl TranscriptService {
    pub fn new(config: &Config, fetcher: Arc<dyn TranscriptFetcher>) -> Self {
        Self {
            fetcher,
            limiter: Arc::new(AdaptiveRateLimiter::new(config.limiter.clone())),
            cache: Arc::new(ResultCache::new(config.cache.clone())),
            pool: Arc::new(WorkerPool::new(&config.pool)),
            retry_budget: config.fetch.retry_budget,
            retry_delay_cap: Duration::from_secs_f64(config.fetch.retry_delay_cap_secs),
            dispatch_timeout: config.dispatch_timeout(),
            max_batch_size: config.fetch.max_batch_size,
        }
    }

    /// Fetch one transcript through the full pipeline.
    ///
    /// Never returns an `Err`: every failure mode is folded into the
    /// returned result. `processing_time` covers the whole call, cache
    /// hits included.
    pub async fn fetch_transcript(&self, video_id: &str, language: &str) -> FetchResult {
        let started = Instant::now();
        let key = CacheKey::new(video_id, language);

        if let Some(mut hit) = self.cache.get(&key).await {
            hit.processing_time = started.elapsed().as_secs_f64();
            return hit;
        }

        let mut retries_left = self.retry_budget;
        loop {
            self.limiter.acquire().await;

            let fetcher = Arc::clone(&self.fetcher);
            let id = video_id.to_string();
            let lang = language.to_string();
            let dispatched = self
                .pool
                .dispatch(move || fetcher.fetch(&id, &lang), self.dispatch_timeout)
                .await;

            let mut result = match dispatched {
                Ok(result) => {
                    // Dispatch completing counts as transport-level success
                    // even when the content outcome is an error; only the
                    // transport feeds the admission loop.
                    self.limiter.record_success().await;
                    result
                }
                Err(DispatchError::Timeout(deadline)) => {
                    self.limiter.record_failure().await;
                    tracing::warn!("fetch for {} timed out after {:?}", video_id, deadline);
                    let mut result = FetchResult::error(
                        video_id,
                        format!(
                            "timeout after {:.1}s waiting for transcript fetch",
                            deadline.as_secs_f64()
                        ),
                    );
                    result.processing_time = started.elapsed().as_secs_f64();
                    return result;
                }
                Err(fault) => {
                    self.limiter.record_failure().await;
                    tracing::error!("dispatch fault for {}: {}", video_id, fault);
                    let mut result =
                        FetchResult::error(video_id, format!("unexpected: {}", fault));
                    result.processing_time = started.elapsed().as_secs_f64();
                    return result;
                }
            };

            if result.is_transient_error() && retries_left > 0 {
                let delay = self.limiter.backoff_delay().await.min(self.retry_delay_cap);
                tracing::debug!(
                    "transient error for {} ({:?}), retrying in {:?}, {} attempts left",
                    video_id,
                    result.error,
                    delay,
                    retries_left
                );
                retries_left -= 1;
                sleep(delay).await;
                continue;
            }

            if result.is_success() {
                self.cache.put(key, &result).await;
            }
            result.processing_time = started.elapsed().as_secs_f64();
            return result;
        }
    }

    /// Fetch many transcripts concurrently.
    ///
    /// Results come back in input order. A fault in one run is converted to
    /// an `Error` result keyed to that id; it never aborts or delays the
    /// others.
    pub async fn fetch_batch(
        &self,
        video_ids: &[String],
        language: &str,
    ) -> crate::Result<BatchOutcome> {
        if video_ids.len() > self.max_batch_size {
            return Err(
                HarvestError::BatchTooLarge(video_ids.len(), self.max_batch_size).into(),
            );
        }

        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("batch", run = %run_id, videos = video_ids.len());
        async {
            let started = Instant::now();
            let handles: Vec<_> = video_ids
                .iter()
                .map(|video_id| {
                    let service = self.clone();
                    let video_id = video_id.clone();
                    let language = language.to_string();
                    tokio::spawn(async move {
                        service.fetch_transcript(&video_id, &language).await
                    })
                })
                .collect();

            let results: Vec<FetchResult> = join_all(handles)
                .await
                .into_iter()
                .zip(video_ids)
                .map(|(joined, video_id)| {
                    joined.unwrap_or_else(|fault| {
                        FetchResult::error(video_id.clone(), format!("unexpected: {}", fault))
                    })
                })
                .collect();

            let summary = BatchSummary::from_results(&results, started.elapsed());
            tracing::info!(
                successful = summary.successful,
                failed = summary.failed,
                "batch finished in {:.2}s",
                summary.total_elapsed
            );
            Ok(BatchOutcome { results, summary })
        }
        .instrument(span)
        .await
    }

    /// Snapshot of the admission controller's counters.
    pub async fn stats(&self) -> LimiterStats {
        self.limiter.stats().await
    }

    /// Wait (bounded) for in-flight dispatches to finish. Returns false if
    /// the grace period expired with work still running.
    pub async fn shutdown(&self) -> bool {
        let drained = self.pool.drain().await;
        if !drained {
            tracing::warn!("worker pool still busy after drain grace period");
        }
        drained
    }
}

#[async_trait]
impl TranscriptProvider for TranscriptService {
    async fn fetch_transcript(&self, video_id: &str, language: &str) -> FetchResult {
        TranscriptService::fetch_transcript(self, video_id, language).await
    }

    async fn fetch_batch(
        &self,
        video_ids: &[String],
        language: &str,
    ) -> crate::Result<BatchOutcome> {
        TranscriptService::fetch_batch(self, video_ids, language).await
    }

    async fn stats(&self) -> LimiterStats {
        TranscriptService::stats(self).await
    }
}
