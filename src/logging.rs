//! Sampled logging of soft failures.
//!
//! High-volume inputs that trip the same soft failure on every record would
//! otherwise produce one warning per record. The sampler counts failures per
//! function name and logs the first `burst`, then one in every `every`.

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::config::SoftErrorLogConfig;

#[derive(Debug, Default)]
pub struct SoftErrorSampler {
    config: SoftErrorLogConfig,
    counters: RwLock<HashMap<String, AtomicU64>>,
    suppressed: AtomicU64,
}

impl SoftErrorSampler {
    pub fn new(config: SoftErrorLogConfig) -> Self {
        Self {
            config,
            counters: RwLock::new(HashMap::new()),
            suppressed: AtomicU64::new(0),
        }
    }

    /// Count one failure of `kind` and decide whether it gets logged.
    pub fn should_log(&self, kind: &str) -> bool {
        let n = {
            let counters = self.counters.read();
            counters.get(kind).map(|c| c.fetch_add(1, Ordering::Relaxed) + 1)
        };
        let n = match n {
            Some(n) => n,
            None => {
                let mut counters = self.counters.write();
                counters
                    .entry(kind.to_string())
                    .or_insert_with(|| AtomicU64::new(0))
                    .fetch_add(1, Ordering::Relaxed)
                    + 1
            }
        };

        let SoftErrorLogConfig { burst, every } = self.config;
        let log = n <= burst || (every > 0 && (n - burst) % every == 0);
        if !log {
            self.suppressed.fetch_add(1, Ordering::Relaxed);
        }
        log
    }

    /// Record a soft failure of `function` at script line `line`.
    pub fn report(&self, function: &str, line: usize, error: &dyn Display) {
        if self.should_log(function) {
            tracing::warn!(function, line, %error, "statement skipped");
        }
    }

    /// Failures counted but not logged so far.
    pub fn suppressed(&self) -> u64 {
        self.suppressed.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_then_sampled() {
        let sampler = SoftErrorSampler::new(SoftErrorLogConfig { burst: 2, every: 3 });
        let logged: Vec<bool> = (0..8).map(|_| sampler.should_log("rename")).collect();
        assert_eq!(logged, vec![true, true, false, false, true, false, false, true]);
        assert_eq!(sampler.suppressed(), 4);

        // counters are per kind
        assert!(sampler.should_log("cast"));
    }
}
