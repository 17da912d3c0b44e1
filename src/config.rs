//! Persistent settings.
//!
//! Stored as JSON in the config directory (see `paths`). Every field has a
//! default, so a partial file only overrides what it names.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::core::carousel::PlaybackTiming;
use crate::core::image_cache::CacheLimits;
use crate::core::workers::Workers;

/// Settings file name inside the config directory
pub const SETTINGS_FILE: &str = "bannerloop.json";

/// Carousel timing, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarouselSettings {
    pub autoscroll_interval_ms: u64,
    pub settle_delay_ms: u64,
    pub resume_grace_ms: u64,
    /// Duration of an animated move on the simulated surface
    pub animation_ms: u64,
}

impl Default for CarouselSettings {
    fn default() -> Self {
        Self {
            autoscroll_interval_ms: 5000,
            settle_delay_ms: 500,
            resume_grace_ms: 100,
            animation_ms: 300,
        }
    }
}

impl CarouselSettings {
    pub fn timing(&self) -> PlaybackTiming {
        PlaybackTiming {
            // A zero period would fire on every tick
            autoscroll_interval: Duration::from_millis(self.autoscroll_interval_ms.max(1)),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            resume_grace: Duration::from_millis(self.resume_grace_ms),
        }
    }

    pub fn animation(&self) -> Duration {
        Duration::from_millis(self.animation_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub carousel: CarouselSettings,
    pub cache: CacheLimits,
    /// Fetch worker threads (0 = auto)
    pub workers: usize,
}

impl Settings {
    /// Read settings from `path`; a missing file yields defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse settings: {}", path.display()))?;
        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, text).with_context(|| format!("Failed to write settings: {}", path.display()))?;
        Ok(())
    }

    /// Worker thread count with 0 resolved to the platform default
    pub fn worker_threads(&self) -> usize {
        if self.workers == 0 {
            Workers::default_threads()
        } else {
            self.workers
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.carousel.autoscroll_interval_ms, 5000);
        assert_eq!(s.carousel.settle_delay_ms, 500);
        assert_eq!(s.carousel.resume_grace_ms, 100);
        assert_eq!(s.cache.max_count, 50);
        assert_eq!(s.cache.max_cost, 50 * 1024 * 1024);
        assert!(s.worker_threads() >= 1);
        assert_eq!(s.carousel.timing(), PlaybackTiming::default());
    }

    #[test]
    fn test_missing_file_is_default() {
        let tmp = tempfile::tempdir().unwrap();
        let s = Settings::load_or_default(&tmp.path().join("absent.json")).unwrap();
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn test_partial_file_overrides_named_fields() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(SETTINGS_FILE);
        std::fs::write(
            &path,
            r#"{ "carousel": { "autoscroll_interval_ms": 2000 }, "cache": { "max_cost_bytes": 1024 }, "workers": 3 }"#,
        )
        .unwrap();

        let s = Settings::load_or_default(&path).unwrap();
        assert_eq!(s.carousel.autoscroll_interval_ms, 2000);
        assert_eq!(s.carousel.settle_delay_ms, 500);
        assert_eq!(s.cache.max_cost, 1024);
        assert_eq!(s.cache.max_count, 50);
        assert_eq!(s.worker_threads(), 3);
    }

    #[test]
    fn test_malformed_file_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(SETTINGS_FILE);
        std::fs::write(&path, "{ not json").unwrap();

        let err = Settings::load_or_default(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse settings"));
    }

    #[test]
    fn test_save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(SETTINGS_FILE);
        let mut s = Settings::default();
        s.carousel.animation_ms = 120;
        s.save(&path).unwrap();
        assert_eq!(Settings::load_or_default(&path).unwrap(), s);
    }

    #[test]
    fn test_zero_interval_clamped() {
        let c = CarouselSettings {
            autoscroll_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(c.timing().autoscroll_interval, Duration::from_millis(1));
    }
}
