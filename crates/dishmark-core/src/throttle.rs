//! Fixed-delay throttling for analyzer calls.
//!
//! Wraps any [`Analyzer`] so consecutive calls are spaced by at least a
//! configured delay. Vendor workflows rate-limit per API key, not per
//! photo host, so there is a single clock shared by all calls.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use dishmark_core::throttle::{ThrottleConfig, ThrottledAnalyzer};
//!
//! # use dishmark_core::traits::Analyzer;
//! # #[derive(Clone)] struct MyAnalyzer;
//! # impl Analyzer for MyAnalyzer {
//! #     async fn analyze(&self, _: &str) -> Result<serde_json::Value, dishmark_core::AppError> { todo!() }
//! # }
//! let analyzer = ThrottledAnalyzer::new(
//!     MyAnalyzer,
//!     ThrottleConfig::new(Duration::from_millis(800)),
//! );
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::error::AppError;
use crate::traits::Analyzer;

/// Configuration for the throttled analyzer.
#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    /// Minimum delay between the end of one call and the start of the next.
    pub delay: Duration,

    /// Maximum random jitter added on top of `delay` (uniform [0, jitter]).
    /// Set to `Duration::ZERO` to disable.
    pub jitter: Duration,
}

impl ThrottleConfig {
    /// Create a new config with the given delay and no jitter.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            jitter: Duration::ZERO,
        }
    }

    /// No throttling at all. Used by tests.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Add random jitter (uniform [0, jitter]) on top of the base delay.
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Compute the effective delay for a single wait (delay + random jitter).
    fn effective_delay(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.delay;
        }
        let jitter_ms = rand_jitter_ms(self.jitter.as_millis() as u64);
        self.delay + Duration::from_millis(jitter_ms)
    }

    fn is_disabled(&self) -> bool {
        self.delay.is_zero() && self.jitter.is_zero()
    }
}

impl Default for ThrottleConfig {
    /// 800ms, no jitter.
    fn default() -> Self {
        Self::new(Duration::from_millis(800))
    }
}

/// An [`Analyzer`] wrapper that enforces a minimum spacing between calls.
#[derive(Clone)]
pub struct ThrottledAnalyzer<A> {
    inner: A,
    config: ThrottleConfig,
    /// When the previous call finished.
    last_call: Arc<Mutex<Option<Instant>>>,
}

impl<A: Analyzer> ThrottledAnalyzer<A> {
    pub fn new(inner: A, config: ThrottleConfig) -> Self {
        Self {
            inner,
            config,
            last_call: Arc::new(Mutex::new(None)),
        }
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }
}

impl<A: Analyzer> Analyzer for ThrottledAnalyzer<A> {
    async fn analyze(&self, reference: &str) -> Result<serde_json::Value, AppError> {
        if self.config.is_disabled() {
            return self.inner.analyze(reference).await;
        }

        // Held across the call so concurrent callers are serialised too.
        let mut last = self.last_call.lock().await;
        if let Some(prev) = *last {
            let required = self.config.effective_delay();
            let elapsed = prev.elapsed();
            if elapsed < required {
                let sleep_duration = required - elapsed;
                tracing::debug!(sleep_ms = %sleep_duration.as_millis(), "Throttling analyzer call");
                tokio::time::sleep(sleep_duration).await;
            }
        }
        let result = self.inner.analyze(reference).await;
        *last = Some(Instant::now());
        result
    }
}

// ---------------------------------------------------------------------------
// Jitter without the `rand` crate: xorshift seeded from the clock.
// ---------------------------------------------------------------------------

fn rand_jitter_ms(max_ms: u64) -> u64 {
    if max_ms == 0 {
        return 0;
    }
    let mut x = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    x % max_ms
}
