//! Sliding-window rate limiting
//!
//! Process-local counters keyed by an arbitrary identity (user id, tx_ref).
//! In a multi-instance deployment these should be backed by a shared expiring
//! store; settlement correctness does not depend on them.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Fixed-window counter with per-key expiry.
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    counts: RwLock<HashMap<String, (u32, Instant)>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            counts: RwLock::new(HashMap::new()),
        }
    }

    /// Record an attempt for `key`; Err(()) when the window is exhausted.
    pub fn check(&self, key: &str) -> Result<(), ()> {
        let mut counts = self.counts.write().unwrap();
        let now = Instant::now();

        // Opportunistic cleanup to bound memory on hot maps.
        if counts.len() > 4096 {
            let window = self.window;
            counts.retain(|_, (_, started)| now.duration_since(*started) < window);
        }

        let entry = counts.entry(key.to_string()).or_insert((0, now));

        if now.duration_since(entry.1) >= self.window {
            *entry = (0, now);
        }

        if entry.0 >= self.max_requests {
            return Err(());
        }

        entry.0 += 1;
        Ok(())
    }

    /// Remaining attempts in the current window for `key`.
    pub fn remaining(&self, key: &str) -> u32 {
        let counts = self.counts.read().unwrap();
        let now = Instant::now();

        match counts.get(key) {
            Some((count, started)) => {
                if now.duration_since(*started) >= self.window {
                    self.max_requests
                } else {
                    self.max_requests.saturating_sub(*count)
                }
            }
            None => self.max_requests,
        }
    }

    /// Window length in seconds, for Retry-After hints.
    pub fn window_secs(&self) -> u64 {
        self.window.as_secs()
    }
}
