//! Engine tuning configuration.
//!
//! Every tunable the sync engine consumes lives here with its default.
//! Values load from an optional TOML file; absent keys keep their
//! defaults, so a config file only needs the values it overrides.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Cue lookup tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Slack around a cue's exact boundaries within which a playback time
    /// still counts as inside that cue (seconds).
    pub boundary_tolerance_secs: f64,
    /// Looser slack used while binary-searching for a best-effort
    /// candidate across gaps between cues (seconds).
    pub search_tolerance_secs: f64,
    /// Cues scanned behind the previously active index before falling
    /// back to binary search.
    pub locality_behind: usize,
    /// Cues scanned ahead of the previously active index.
    pub locality_ahead: usize,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            boundary_tolerance_secs: 0.15,
            search_tolerance_secs: 1.0,
            locality_behind: 2,
            locality_ahead: 3,
        }
    }
}

/// Update scheduling tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Minimum wall-clock spacing between processed time updates (ms).
    pub throttle_ms: u64,
    /// Minimum change in adjusted playback time before an update is
    /// worth processing (seconds).
    pub jitter_secs: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            throttle_ms: 20,
            jitter_secs: 0.05,
        }
    }
}

/// Highlight rendering and scrolling tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Delay before a removed highlight's classes are cleared (ms).
    pub fade_delay_ms: u64,
    /// Safety margin inside the container within which a node counts as
    /// visible (px per edge).
    pub scroll_margin_px: f64,
    /// Whether the active cue is kept in view automatically.
    pub autoscroll: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            fade_delay_ms: 150,
            scroll_margin_px: 30.0,
            autoscroll: true,
        }
    }
}

/// Cache and loader bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum distinct timestamp literals memoized during parsing.
    pub timestamp_memo_entries: usize,
    /// Deadline for the off-thread transcript parse before falling back
    /// to a synchronous parse (ms).
    pub parse_deadline_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            timestamp_memo_entries: 256,
            parse_deadline_ms: 2000,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub timing: TimingConfig,
    pub scheduler: SchedulerConfig,
    pub render: RenderConfig,
    pub limits: LimitsConfig,
}

impl EngineConfig {
    /// Loads configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        Self::from_toml_str(&raw)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("Failed to parse engine config")
    }

    pub fn throttle_interval(&self) -> Duration {
        Duration::from_millis(self.scheduler.throttle_ms)
    }

    pub fn fade_delay(&self) -> Duration {
        Duration::from_millis(self.render.fade_delay_ms)
    }

    pub fn parse_deadline(&self) -> Duration {
        Duration::from_millis(self.limits.parse_deadline_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = EngineConfig::default();
        assert!((config.timing.boundary_tolerance_secs - 0.15).abs() < f64::EPSILON);
        assert!((config.timing.search_tolerance_secs - 1.0).abs() < f64::EPSILON);
        assert_eq!(config.scheduler.throttle_ms, 20);
        assert!((config.scheduler.jitter_secs - 0.05).abs() < f64::EPSILON);
        assert_eq!(config.render.fade_delay_ms, 150);
        assert!((config.render.scroll_margin_px - 30.0).abs() < f64::EPSILON);
        assert!(config.render.autoscroll);
        assert_eq!(config.limits.timestamp_memo_entries, 256);
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = EngineConfig::from_toml_str(
            "[scheduler]\nthrottle_ms = 50\n\n[render]\nautoscroll = false\n",
        )
        .unwrap();
        assert_eq!(config.scheduler.throttle_ms, 50);
        assert!(!config.render.autoscroll);
        assert_eq!(config.render.fade_delay_ms, 150);
        assert_eq!(config.timing.locality_ahead, 3);
    }

    #[test]
    fn test_empty_toml_is_all_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config.limits.timestamp_memo_entries, 256);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(EngineConfig::from_toml_str("scheduler = 3").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        fs::write(&path, "[timing]\nboundary_tolerance_secs = 0.3\n").unwrap();
        let config = EngineConfig::load(&path).unwrap();
        assert!((config.timing.boundary_tolerance_secs - 0.3).abs() < f64::EPSILON);

        let missing = EngineConfig::load(&dir.path().join("absent.toml"));
        assert!(missing.is_err());
    }
}
