use rand::Rng;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use super::{SourceError, TranscriptDescriptor, TranscriptEntry, TranscriptSource};
use crate::config::SimulationConfig;

/// In-process stand-in for the remote transcript service.
///
/// Deterministic per video id: the id's hash picks one of a few catalog
/// profiles, and special markers in the id force specific outcomes
/// ("disabled", "missing"). Latency is real blocking sleep so the worker
/// pool has something to offload; transient failures are injected at the
/// configured rate to exercise the retry path.
pub struct SimulatedSource {
    latency: Duration,
    transient_failure_rate: f64,
    entries_per_video: usize,
}

impl SimulatedSource {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            latency: Duration::from_millis(config.latency_ms),
            transient_failure_rate: config.transient_failure_rate,
            entries_per_video: config.entries_per_video,
        }
    }

    fn simulate_call(&self) -> Result<(), SourceError> {
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        if self.transient_failure_rate > 0.0
            && rand::thread_rng().gen_bool(self.transient_failure_rate.clamp(0.0, 1.0))
        {
            return Err(SourceError::Malformed(
                "no element found: line 1, column 0".to_string(),
            ));
        }
        Ok(())
    }

    fn profile(video_id: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        video_id.hash(&mut hasher);
        hasher.finish() % 3
    }

    fn synthesize(&self, video_id: &str, language_code: &str) -> Vec<TranscriptEntry> {
        (0..self.entries_per_video)
            .map(|i| TranscriptEntry {
                text: format!("[{}] {} line {}", language_code, video_id, i + 1),
                start: i as f64 * 4.0,
                duration: 4.0,
            })
            .collect()
    }

    fn catalog(&self, video_id: &str) -> Vec<TranscriptDescriptor> {
        if video_id.contains("missing") {
            return Vec::new();
        }
        match Self::profile(video_id) {
            // English captions, translatable
            0 => vec![TranscriptDescriptor {
                language: "English".to_string(),
                language_code: "en".to_string(),
                is_generated: false,
                is_translatable: true,
            }],
            // Auto-generated German, translatable
            1 => vec![TranscriptDescriptor {
                language: "German".to_string(),
                language_code: "de".to_string(),
                is_generated: true,
                is_translatable: true,
            }],
            // Japanese only, no translation offered
            _ => vec![TranscriptDescriptor {
                language: "Japanese".to_string(),
                language_code: "ja".to_string(),
                is_generated: false,
                is_translatable: false,
            }],
        }
    }
}

impl TranscriptSource for SimulatedSource {
    fn fetch_direct(
        &self,
        video_id: &str,
        language_code: &str,
    ) -> Result<Vec<TranscriptEntry>, SourceError> {
        if video_id.contains("disabled") {
            return Err(SourceError::Disabled);
        }
        self.simulate_call()?;
        let has_direct = self
            .catalog(video_id)
            .iter()
            .any(|t| t.language_code == language_code);
        if has_direct {
            Ok(self.synthesize(video_id, language_code))
        } else {
            Err(SourceError::NotFound(language_code.to_string()))
        }
    }

    fn list_available(&self, video_id: &str) -> Result<Vec<TranscriptDescriptor>, SourceError> {
        if video_id.contains("disabled") {
            return Err(SourceError::Disabled);
        }
        self.simulate_call()?;
        Ok(self.catalog(video_id))
    }

    fn fetch_track(
        &self,
        video_id: &str,
        descriptor: &TranscriptDescriptor,
    ) -> Result<Vec<TranscriptEntry>, SourceError> {
        self.simulate_call()?;
        Ok(self.synthesize(video_id, &descriptor.language_code))
    }

    fn translate_track(
        &self,
        video_id: &str,
        descriptor: &TranscriptDescriptor,
        target_language: &str,
    ) -> Result<Vec<TranscriptEntry>, SourceError> {
        if !descriptor.is_translatable {
            return Err(SourceError::Unavailable(
                "track does not offer translation".to_string(),
            ));
        }
        self.simulate_call()?;
        Ok(self.synthesize(video_id, target_language))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_source() -> SimulatedSource {
        SimulatedSource::new(&SimulationConfig {
            latency_ms: 0,
            transient_failure_rate: 0.0,
            entries_per_video: 3,
        })
    }

    #[test]
    fn disabled_marker_wins() {
        let source = quiet_source();
        assert!(matches!(
            source.fetch_direct("disabled-video", "en"),
            Err(SourceError::Disabled)
        ));
        assert!(matches!(
            source.list_available("disabled-video"),
            Err(SourceError::Disabled)
        ));
    }

    #[test]
    fn missing_marker_yields_empty_catalog() {
        let source = quiet_source();
        assert!(source.list_available("missing-video").unwrap().is_empty());
    }

    #[test]
    fn catalog_is_deterministic() {
        let source = quiet_source();
        let first = source.list_available("stable-id").unwrap();
        let second = source.list_available("stable-id").unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
    }

    #[test]
    fn synthesized_entries_are_well_formed() {
        let source = quiet_source();
        let catalog = source.list_available("stable-id").unwrap();
        let entries = source.fetch_track("stable-id", &catalog[0]).unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|e| e.start >= 0.0 && e.duration > 0.0));
    }
}
