use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Admission controller settings
    pub limiter: LimiterConfig,

    /// Result cache settings
    pub cache: CacheConfig,

    /// Worker pool settings
    pub pool: PoolConfig,

    /// Per-call pipeline settings
    pub fetch: FetchConfig,

    /// Simulated source settings (used by the CLI harness)
    pub simulation: SimulationConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Requests per window at startup
    pub initial_rate: u32,

    /// Floor the rate never drops below
    pub min_rate: u32,

    /// Ceiling the rate never exceeds
    pub max_rate: u32,

    /// Sliding window length in seconds
    pub window_secs: u64,

    /// Base of the exponential backoff applied after consecutive failures
    pub backoff_factor: f64,

    /// Damping divisor (< 1) that nudges the rate toward the ceiling on
    /// success streaks
    pub recovery_factor: f64,

    /// Consecutive failures that trigger a rate halving
    pub max_consecutive_failures: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Seconds a cached result stays servable
    pub ttl_secs: u64,

    /// Entry count the cache is pruned back to
    pub max_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Concurrent blocking fetches
    pub max_workers: usize,

    /// Per-dispatch deadline in seconds
    pub dispatch_timeout_secs: u64,

    /// Bounded wait for in-flight work at shutdown, in seconds
    pub drain_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Extra attempts after the first for transient content errors
    pub retry_budget: u32,

    /// Ceiling on the backoff wait between retries, in seconds
    pub retry_delay_cap_secs: f64,

    /// Largest batch accepted in one call
    pub max_batch_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Blocking latency per simulated remote call, in milliseconds
    pub latency_ms: u64,

    /// Probability in [0, 1] that a call returns a malformed payload
    pub transient_failure_rate: f64,

    /// Lines synthesized per transcript
    pub entries_per_video: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Language requested when the CLI gives none
    pub default_language: String,

    /// Default output format
    pub default_output_format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            limiter: LimiterConfig {
                initial_rate: 30,
                min_rate: 5,
                max_rate: 50,
                window_secs: 60,
                backoff_factor: 1.5,
                recovery_factor: 0.8,
                max_consecutive_failures: 5,
            },
            cache: CacheConfig {
                ttl_secs: 300,
                max_entries: 1000,
            },
            pool: PoolConfig {
                max_workers: 20,
                dispatch_timeout_secs: 10,
                drain_timeout_secs: 30,
            },
            fetch: FetchConfig {
                retry_budget: 2,
                retry_delay_cap_secs: 2.0,
                max_batch_size: 50,
            },
            simulation: SimulationConfig {
                latency_ms: 150,
                transient_failure_rate: 0.0,
                entries_per_video: 12,
            },
            app: AppConfig {
                default_language: "en".to_string(),
                default_output_format: "text".to_string(),
            },
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            let config: Config = serde_yaml::from_str(&content)
                .context("Failed to parse config file")?;

            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save().await?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("transcript-harvester").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.limiter.min_rate == 0 {
            anyhow::bail!("limiter.min_rate must be at least 1");
        }
        if self.limiter.min_rate > self.limiter.max_rate {
            anyhow::bail!(
                "limiter.min_rate ({}) must not exceed limiter.max_rate ({})",
                self.limiter.min_rate,
                self.limiter.max_rate
            );
        }
        if !(self.limiter.min_rate..=self.limiter.max_rate).contains(&self.limiter.initial_rate) {
            anyhow::bail!(
                "limiter.initial_rate ({}) must lie within [{}, {}]",
                self.limiter.initial_rate,
                self.limiter.min_rate,
                self.limiter.max_rate
            );
        }
        if self.limiter.window_secs == 0 {
            anyhow::bail!("limiter.window_secs must be positive");
        }
        if self.limiter.backoff_factor < 1.0 {
            anyhow::bail!("limiter.backoff_factor must be at least 1.0");
        }
        if self.limiter.recovery_factor <= 0.0 || self.limiter.recovery_factor > 1.0 {
            anyhow::bail!("limiter.recovery_factor must lie in (0, 1]");
        }
        if self.pool.max_workers == 0 {
            anyhow::bail!("pool.max_workers must be at least 1");
        }
        if self.cache.max_entries == 0 {
            anyhow::bail!("cache.max_entries must be at least 1");
        }
        if self.fetch.max_batch_size == 0 {
            anyhow::bail!("fetch.max_batch_size must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.simulation.transient_failure_rate) {
            anyhow::bail!("simulation.transient_failure_rate must lie in [0, 1]");
        }
        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!(
            "  Rate: {} req/{}s (bounds {}..{})",
            self.limiter.initial_rate,
            self.limiter.window_secs,
            self.limiter.min_rate,
            self.limiter.max_rate
        );
        println!(
            "  Cache: {} entries, TTL {}s",
            self.cache.max_entries, self.cache.ttl_secs
        );
        println!(
            "  Workers: {} (dispatch timeout {}s)",
            self.pool.max_workers, self.pool.dispatch_timeout_secs
        );
        println!(
            "  Retries: {} (delay cap {}s)",
            self.fetch.retry_budget, self.fetch.retry_delay_cap_secs
        );
        println!("  Default language: {}", self.app.default_language);
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.limiter.window_secs)
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs(self.pool.dispatch_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_inverted_rate_bounds() {
        let mut config = Config::default();
        config.limiter.min_rate = 60;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_workers() {
        let mut config = Config::default();
        config.pool.max_workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_failure_rate() {
        let mut config = Config::default();
        config.simulation.transient_failure_rate = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn yaml_round_trip() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.limiter.initial_rate, config.limiter.initial_rate);
        assert_eq!(parsed.cache.ttl_secs, config.cache.ttl_secs);
    }
}
