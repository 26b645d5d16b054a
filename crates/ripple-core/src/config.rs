//! Process-wide configuration.
//!
//! Loaded from (in priority order):
//! 1. Environment variables (`RIPPLE__` prefix, `__` separator)
//! 2. Config file (`ripple.toml`)
//! 3. Defaults

use serde::Deserialize;

use crate::impact::TraversalStrategy;

/// Top-level engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Hours before an unresolved approval expires.
    #[serde(default = "default_approval_timeout_hours")]
    pub approval_timeout_hours: u64,

    /// Maximum sync retry attempts before a connector surfaces `error`.
    #[serde(default = "default_sync_retry_max")]
    pub sync_retry_max: u32,

    /// Initial sync retry backoff in seconds.
    #[serde(default = "default_sync_retry_base_seconds")]
    pub sync_retry_base_seconds: u64,

    /// Backoff ceiling in seconds.
    #[serde(default = "default_sync_retry_cap_seconds")]
    pub sync_retry_cap_seconds: u64,

    /// Per-sync-job timeout in seconds.
    #[serde(default = "default_sync_job_timeout_seconds")]
    pub sync_job_timeout_seconds: u64,

    /// Ceiling on the sync worker pool width.
    #[serde(default = "default_sync_pool_cap")]
    pub sync_pool_cap: usize,

    /// BFS depth bound for the device blast strategy.
    #[serde(default = "default_device_blast_depth")]
    pub device_blast_depth: usize,

    /// BFS depth bound for every other strategy.
    #[serde(default = "default_impact_depth")]
    pub impact_default_depth: usize,

    #[serde(default = "default_risk_clip_min")]
    pub risk_clip_min: f64,

    #[serde(default = "default_risk_clip_max")]
    pub risk_clip_max: f64,

    /// The K used when recomputing device `is_core` flags.
    #[serde(default = "default_core_device_k")]
    pub core_device_k: usize,

    /// Tolerance on the maintenance window check at execute time.
    #[serde(default = "default_maintenance_grace_minutes")]
    pub maintenance_window_grace_minutes: i64,

    /// Display offset (hours) applied to policy blocked-hour checks. The
    /// engine clock is UTC.
    #[serde(default)]
    pub policy_hour_offset: i32,
}

impl Settings {
    /// Depth bound for a traversal strategy.
    pub fn max_depth(&self, strategy: TraversalStrategy) -> usize {
        match strategy {
            TraversalStrategy::DeviceBlast => self.device_blast_depth,
            _ => self.impact_default_depth,
        }
    }

    /// Load settings from `{prefix}.toml` and `RIPPLE__`-prefixed
    /// environment variables. Missing sources fall back to defaults.
    pub fn load(file_prefix: &str) -> Result<Self, config::ConfigError> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("RIPPLE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        match cfg.try_deserialize::<Settings>() {
            Ok(s) => Ok(s),
            Err(_) => Ok(Settings::default()),
        }
    }
}

fn default_approval_timeout_hours() -> u64 {
    24
}

fn default_sync_retry_max() -> u32 {
    8
}

fn default_sync_retry_base_seconds() -> u64 {
    30
}

fn default_sync_retry_cap_seconds() -> u64 {
    900
}

fn default_sync_job_timeout_seconds() -> u64 {
    300
}

fn default_sync_pool_cap() -> usize {
    16
}

fn default_device_blast_depth() -> usize {
    3
}

fn default_impact_depth() -> usize {
    2
}

fn default_risk_clip_min() -> f64 {
    0.0
}

fn default_risk_clip_max() -> f64 {
    100.0
}

fn default_core_device_k() -> usize {
    2
}

fn default_maintenance_grace_minutes() -> i64 {
    5
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            approval_timeout_hours: default_approval_timeout_hours(),
            sync_retry_max: default_sync_retry_max(),
            sync_retry_base_seconds: default_sync_retry_base_seconds(),
            sync_retry_cap_seconds: default_sync_retry_cap_seconds(),
            sync_job_timeout_seconds: default_sync_job_timeout_seconds(),
            sync_pool_cap: default_sync_pool_cap(),
            device_blast_depth: default_device_blast_depth(),
            impact_default_depth: default_impact_depth(),
            risk_clip_min: default_risk_clip_min(),
            risk_clip_max: default_risk_clip_max(),
            core_device_k: default_core_device_k(),
            maintenance_window_grace_minutes: default_maintenance_grace_minutes(),
            policy_hour_offset: 0,
        }
    }
}
