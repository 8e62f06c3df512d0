use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

/// Knobs for the comment-collection loop. Every field can be overridden
/// through an `XHS_*` environment variable; the defaults match the pacing
/// the site tolerates without tripping its rate limiting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Run Chrome without a visible window.
    pub headless: bool,
    /// Timeout for required containers to appear (seconds).
    pub structural_wait_secs: u64,
    /// Settle delay after load-triggering actions (milliseconds).
    pub settle_ms: u64,
    /// Pause between reply-expansion clicks (milliseconds).
    pub sweep_pause_ms: u64,
    /// Scroll offset advance per reveal step (CSS pixels).
    pub scroll_step: u32,
    /// Hard ceiling on poll/reveal iterations; exceeding it ends the
    /// collection as a partial result, never a crash.
    pub max_iterations: usize,
    /// Consecutive no-progress reveals tolerated before giving up.
    pub max_stalls: usize,
    /// Override for the persistent Chrome profile directory.
    pub profile_dir: Option<String>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            headless: std::env::var("XHS_HEADLESS")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            structural_wait_secs: std::env::var("XHS_STRUCTURAL_WAIT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
            settle_ms: std::env::var("XHS_SETTLE_MS")
                .unwrap_or_else(|_| "2000".to_string())
                .parse()
                .unwrap_or(2000),
            sweep_pause_ms: std::env::var("XHS_SWEEP_PAUSE_MS")
                .unwrap_or_else(|_| "500".to_string())
                .parse()
                .unwrap_or(500),
            scroll_step: std::env::var("XHS_SCROLL_STEP")
                .unwrap_or_else(|_| "500".to_string())
                .parse()
                .unwrap_or(500),
            max_iterations: std::env::var("XHS_MAX_ITERATIONS")
                .unwrap_or_else(|_| "120".to_string())
                .parse()
                .unwrap_or(120),
            max_stalls: std::env::var("XHS_MAX_STALLS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .unwrap_or(3),
            profile_dir: std::env::var("XHS_PROFILE_DIR").ok(),
        }
    }
}

impl ScrapeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.structural_wait_secs == 0 {
            return Err(AppError::Configuration(
                "structural_wait_secs must be greater than 0".to_string(),
            ));
        }
        if self.scroll_step == 0 {
            return Err(AppError::Configuration(
                "scroll_step must be greater than 0".to_string(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(AppError::Configuration(
                "max_iterations must be greater than 0".to_string(),
            ));
        }
        if self.max_stalls == 0 {
            return Err(AppError::Configuration(
                "max_stalls must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ScrapeConfig::default();
        assert_eq!(config.structural_wait_secs, 30);
        assert_eq!(config.settle_ms, 2000);
        assert_eq!(config.sweep_pause_ms, 500);
        assert_eq!(config.scroll_step, 500);
        assert_eq!(config.max_iterations, 120);
    }

    #[test]
    fn test_config_validation() {
        let mut config = ScrapeConfig::default();
        assert!(config.validate().is_ok());

        config.scroll_step = 0;
        assert!(config.validate().is_err());

        config = ScrapeConfig::default();
        config.max_iterations = 0;
        assert!(config.validate().is_err());
    }
}
