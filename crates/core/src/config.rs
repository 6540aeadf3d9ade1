use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `SPOTLIFT__` and an optional TOML config file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub prediction: PredictionConfig,
}

/// Batch orchestration knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_event_timeout_ms")]
    pub event_timeout_ms: u64,
    #[serde(default = "default_fetch_retries")]
    pub fetch_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// How far back comparable periods are searched for.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

/// Anomaly validation gate calibration.
#[derive(Debug, Clone, Deserialize)]
pub struct GateConfig {
    #[serde(default = "default_gate_enabled")]
    pub enabled: bool,
    /// Values observed as fabricated placeholder output; matched after rounding.
    #[serde(default = "default_canned_values")]
    pub canned_values: Vec<i64>,
    /// Largest plausible magnitude for a signed percentage change.
    #[serde(default = "default_max_change_pct")]
    pub max_change_pct: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictionConfig {
    #[serde(default = "default_average_order_value")]
    pub default_average_order_value: f64,
    #[serde(default = "default_cost_per_second")]
    pub default_cost_per_second: f64,
}

// Default functions
fn default_workers() -> usize {
    8
}
fn default_event_timeout_ms() -> u64 {
    30_000
}
fn default_fetch_retries() -> u32 {
    2
}
fn default_retry_backoff_ms() -> u64 {
    200
}
fn default_lookback_days() -> i64 {
    90
}
fn default_cache_enabled() -> bool {
    true
}
fn default_ttl_secs() -> u64 {
    3600
}
fn default_max_entries() -> usize {
    10_000
}
fn default_gate_enabled() -> bool {
    true
}
fn default_canned_values() -> Vec<i64> {
    vec![35, 45, 65, 87, 95]
}
fn default_max_change_pct() -> f64 {
    1000.0
}
fn default_average_order_value() -> f64 {
    50.0
}
fn default_cost_per_second() -> f64 {
    100.0
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            event_timeout_ms: default_event_timeout_ms(),
            fetch_retries: default_fetch_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            lookback_days: default_lookback_days(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            ttl_secs: default_ttl_secs(),
            max_entries: default_max_entries(),
        }
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            enabled: default_gate_enabled(),
            canned_values: default_canned_values(),
            max_change_pct: default_max_change_pct(),
        }
    }
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            default_average_order_value: default_average_order_value(),
            default_cost_per_second: default_cost_per_second(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            cache: CacheConfig::default(),
            gate: GateConfig::default(),
            prediction: PredictionConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional TOML file, then environment variables.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        let builder = builder.add_source(
            config::Environment::with_prefix("SPOTLIFT")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.engine.workers, 8);
        assert_eq!(config.gate.canned_values, vec![35, 45, 65, 87, 95]);
        assert!(config.cache.enabled);
    }

    #[test]
    fn test_load_without_sources_uses_defaults() {
        let config = AppConfig::load(None).unwrap();
        assert!(config.engine.event_timeout_ms > 0);
        assert!(config.gate.max_change_pct > 100.0);
    }
}
