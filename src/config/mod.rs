//! Configuration types for the route clustering pipeline.
//!
//! Every heuristic constant used by the pipeline lives here with its default,
//! so a YAML file can retune corridor width, sampling and clustering without
//! touching code.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Width of the band around the route in which records are kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorridorConfig {
    /// Fraction of the route length used as corridor half-width
    #[serde(default = "default_width_factor")]
    pub width_factor: f64,

    /// Lower bound for the corridor half-width in meters
    #[serde(default = "default_min_width_m")]
    pub min_width_m: f64,

    /// Upper bound for the corridor half-width in meters
    #[serde(default = "default_max_width_m")]
    pub max_width_m: f64,
}

fn default_width_factor() -> f64 {
    0.15
}

fn default_min_width_m() -> f64 {
    500.0
}

fn default_max_width_m() -> f64 {
    20_000.0
}

impl Default for CorridorConfig {
    fn default() -> Self {
        Self {
            width_factor: default_width_factor(),
            min_width_m: default_min_width_m(),
            max_width_m: default_max_width_m(),
        }
    }
}

/// Settings for capping the corridor set before clustering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Default cap applied when a request does not carry its own
    #[serde(default = "default_max_points")]
    pub max_points: usize,

    /// Seed for the sampling RNG
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_max_points() -> usize {
    2000
}

fn default_seed() -> u64 {
    42
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            max_points: default_max_points(),
            seed: default_seed(),
        }
    }
}

/// Configuration for k-means clustering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// Divisor `d` in the automatic cluster count `round(sqrt(n / d))`
    #[serde(default = "default_points_per_cluster")]
    pub points_per_cluster: f64,

    /// Upper bound on the automatically chosen cluster count
    #[serde(default = "default_max_auto_k")]
    pub max_auto_k: usize,

    /// Number of seeded restarts; the lowest-inertia run wins
    #[serde(default = "default_n_init")]
    pub n_init: usize,

    /// Maximum Lloyd iterations per restart
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Centroid shift (standardized units) below which a run has converged
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Base seed for centroid initialization
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_points_per_cluster() -> f64 {
    2.0
}

fn default_max_auto_k() -> usize {
    12
}

fn default_n_init() -> usize {
    10
}

fn default_max_iterations() -> usize {
    300
}

fn default_tolerance() -> f64 {
    1e-4
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            points_per_cluster: default_points_per_cluster(),
            max_auto_k: default_max_auto_k(),
            n_init: default_n_init(),
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
            seed: default_seed(),
        }
    }
}

/// Settings for the chat-completions pincode advisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorConfig {
    /// Consult the advisor at all (it is still skipped when no API key is set)
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model name sent with each request
    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Completion token budget
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum pincode lines included in a prompt
    #[serde(default = "default_max_listing")]
    pub max_listing: usize,
}

fn default_enabled() -> bool {
    true
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_max_tokens() -> u32 {
    512
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_listing() -> usize {
    200
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            max_listing: default_max_listing(),
        }
    }
}

/// Report shaping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Member records echoed back per cluster
    #[serde(default = "default_samples_per_cluster")]
    pub samples_per_cluster: usize,
}

fn default_samples_per_cluster() -> usize {
    5
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            samples_per_cluster: default_samples_per_cluster(),
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub corridor: CorridorConfig,

    #[serde(default)]
    pub sampling: SamplingConfig,

    #[serde(default)]
    pub clustering: ClusteringConfig,

    #[serde(default)]
    pub advisor: AdvisorConfig,

    #[serde(default)]
    pub report: ReportConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let c = &self.corridor;
        if !(c.width_factor.is_finite() && c.width_factor >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "corridor.width_factor must be a non-negative number, got {}",
                c.width_factor
            )));
        }
        if !(c.min_width_m.is_finite() && c.min_width_m >= 0.0) || !c.max_width_m.is_finite() {
            return Err(ConfigError::Invalid(
                "corridor widths must be finite and non-negative".to_string(),
            ));
        }
        if c.min_width_m > c.max_width_m {
            return Err(ConfigError::Invalid(format!(
                "corridor.min_width_m ({}) exceeds corridor.max_width_m ({})",
                c.min_width_m, c.max_width_m
            )));
        }

        let k = &self.clustering;
        if !(k.points_per_cluster.is_finite() && k.points_per_cluster > 0.0) {
            return Err(ConfigError::Invalid(
                "clustering.points_per_cluster must be positive".to_string(),
            ));
        }
        if k.max_auto_k == 0 {
            return Err(ConfigError::Invalid("clustering.max_auto_k must be at least 1".to_string()));
        }
        if k.n_init == 0 || k.max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "clustering.n_init and clustering.max_iterations must be at least 1".to_string(),
            ));
        }
        if self.sampling.max_points == 0 {
            return Err(ConfigError::Invalid("sampling.max_points must be at least 1".to_string()));
        }

        let a = &self.advisor;
        if a.timeout_secs == 0 {
            return Err(ConfigError::Invalid("advisor.timeout_secs must be at least 1".to_string()));
        }
        if a.max_listing == 0 {
            return Err(ConfigError::Invalid("advisor.max_listing must be at least 1".to_string()));
        }

        Ok(())
    }
}
