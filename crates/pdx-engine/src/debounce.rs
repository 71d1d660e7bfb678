//! Size-tiered debounce delays.

use std::time::Duration;

use serde::Deserialize;

/// One size tier: documents up to `max_bytes` wait `delay_ms` after an edit.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DebounceTier {
    pub max_bytes: usize,
    pub delay_ms: u64,
}

/// Debounce settings as configured.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct DebounceConfig {
    pub min_ms: u64,
    pub max_ms: u64,
    /// Documents larger than every tier wait `max_ms`.
    pub tiers: Vec<DebounceTier>,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            min_ms: 80,
            max_ms: 400,
            tiers: vec![
                DebounceTier {
                    max_bytes: 16 * 1024,
                    delay_ms: 80,
                },
                DebounceTier {
                    max_bytes: 128 * 1024,
                    delay_ms: 140,
                },
                DebounceTier {
                    max_bytes: 1024 * 1024,
                    delay_ms: 250,
                },
            ],
        }
    }
}

/// Maps a document's byte length to how long to wait after its last edit.
///
/// The delay never decreases as documents grow and always lies within
/// `[min, max]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebouncePolicy {
    min: Duration,
    max: Duration,
    /// Sorted by size; delays already clamped and made non-decreasing.
    tiers: Vec<(usize, Duration)>,
}

impl DebouncePolicy {
    pub fn new(config: &DebounceConfig) -> Self {
        let min = Duration::from_millis(config.min_ms);
        let max = Duration::from_millis(config.max_ms.max(config.min_ms));

        let mut tiers: Vec<(usize, Duration)> = config
            .tiers
            .iter()
            .map(|t| (t.max_bytes, Duration::from_millis(t.delay_ms).clamp(min, max)))
            .collect();
        tiers.sort_by_key(|&(bytes, _)| bytes);

        // A misordered tier must not make a larger document wait less.
        let mut floor = min;
        for (_, delay) in &mut tiers {
            floor = floor.max(*delay);
            *delay = floor;
        }

        Self { min, max, tiers }
    }

    pub fn delay_for(&self, bytes: usize) -> Duration {
        self.tiers
            .iter()
            .find(|&&(max_bytes, _)| bytes <= max_bytes)
            .map_or(self.max, |&(_, delay)| delay)
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }
}

impl Default for DebouncePolicy {
    fn default() -> Self {
        Self::new(&DebounceConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(lines: usize) -> String {
        "character_event = { id = test.1 is_triggered_only = yes }\n".repeat(lines)
    }

    #[test]
    fn test_small_document_waits_no_longer_than_large() {
        let policy = DebouncePolicy::default();
        let small = policy.delay_for(document(10).len());
        let large = policy.delay_for(document(5_000).len());

        assert!(small <= large);
        for delay in [small, large] {
            assert!(delay >= Duration::from_millis(80), "{delay:?}");
            assert!(delay <= Duration::from_millis(400), "{delay:?}");
        }
        assert_eq!(small, Duration::from_millis(80));
        assert_eq!(large, Duration::from_millis(250));
    }

    #[test]
    fn test_beyond_last_tier_uses_max() {
        let policy = DebouncePolicy::default();
        assert_eq!(policy.delay_for(50 * 1024 * 1024), policy.max());
        assert_eq!(policy.delay_for(0), policy.min());
    }

    #[test]
    fn test_misconfigured_tiers_stay_monotonic_and_clamped() {
        let policy = DebouncePolicy::new(&DebounceConfig {
            min_ms: 100,
            max_ms: 300,
            tiers: vec![
                DebounceTier {
                    max_bytes: 1000,
                    delay_ms: 900,
                },
                DebounceTier {
                    max_bytes: 10,
                    delay_ms: 5,
                },
                DebounceTier {
                    max_bytes: 100,
                    delay_ms: 50,
                },
            ],
        });
        let mut last = Duration::ZERO;
        for bytes in [0, 10, 11, 100, 101, 1000, 1001, 1_000_000] {
            let delay = policy.delay_for(bytes);
            assert!(delay >= last, "{bytes}: {delay:?} < {last:?}");
            assert!(delay >= Duration::from_millis(100) && delay <= Duration::from_millis(300));
            last = delay;
        }
    }
}
