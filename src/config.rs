//! # Step manager configuration.
//!
//! Provides [`Config`] centralized settings for a [`StepManager`](crate::StepManager).
//!
//! ## Sentinel values
//! - `outstanding_warn_at = 0` → no watermark warning

/// Configuration for the step manager.
///
/// ## Field semantics
/// - `outstanding_warn_at`: registry size at which a warning is logged
///   (`0` = disabled). Open steps are never evicted.
/// - `log_events`: emit a `trace!` record for every delivered event.
#[derive(Clone, Debug)]
pub struct Config {
    /// Number of outstanding steps that triggers a warning.
    ///
    /// - `0` = never warn
    /// - `n > 0` = warn every time the registry reaches a multiple of `n`
    pub outstanding_warn_at: usize,
    /// Log every emitted event at `trace` level.
    pub log_events: bool,
}

impl Config {
    /// Returns the outstanding-step watermark as an `Option`.
    ///
    /// - `None` → disabled
    /// - `Some(n)` → warn at `n`, `2n`, ...
    #[inline]
    pub fn outstanding_watermark(&self) -> Option<usize> {
        if self.outstanding_warn_at == 0 {
            None
        } else {
            Some(self.outstanding_warn_at)
        }
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `outstanding_warn_at = 0` (disabled)
    /// - `log_events = false`
    fn default() -> Self {
        Self {
            outstanding_warn_at: 0,
            log_events: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert!(cfg.outstanding_watermark().is_none());
        assert!(!cfg.log_events);
    }

    #[test]
    fn test_watermark_sentinel() {
        let cfg = Config {
            outstanding_warn_at: 64,
            ..Config::default()
        };
        assert_eq!(cfg.outstanding_watermark(), Some(64));
    }
}
