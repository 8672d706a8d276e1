//! Rate-limit quota mirror.
//!
//! # Design
//! The tracker mirrors the server's advertised quota from the
//! `X-RateLimit-*` response headers. State is overwritten wholesale from a
//! single response under a mutex — never merged field-by-field — so a
//! snapshot always reflects exactly one response. When requests complete
//! out of order the tracker keeps whichever response was processed last;
//! callers must treat snapshots as recent, not authoritative.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::warn;

use crate::http::header_value;

const LIMIT_HEADER: &str = "X-RateLimit-Limit";
const REMAINING_HEADER: &str = "X-RateLimit-Remaining";
const RESET_HEADER: &str = "X-RateLimit-Reset";

#[derive(Debug, Clone, Copy, Default)]
struct RateLimitState {
    limit: u64,
    remaining: u64,
    reset: u64,
}

/// Immutable view of the quota as of the last processed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitSnapshot {
    pub limit: u64,
    pub remaining: u64,
    /// Unix timestamp at which the window resets, 0 when unknown.
    pub reset: u64,
    /// `reset` as a `SystemTime`, absent when `reset` is 0.
    pub reset_time: Option<SystemTime>,
}

/// Thread-safe mirror of the server's rate-limit headers.
#[derive(Debug, Default)]
pub struct RateLimitTracker {
    state: Mutex<RateLimitState>,
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the tracked state from one response's headers. Missing or
    /// non-numeric headers count as 0. Logs an advisory warning when less
    /// than 10% of the quota remains; never blocks or fails.
    pub fn update(&self, headers: &[(String, String)]) {
        let next = RateLimitState {
            limit: header_u64(headers, LIMIT_HEADER),
            remaining: header_u64(headers, REMAINING_HEADER),
            reset: header_u64(headers, RESET_HEADER),
        };

        if next.limit > 0 && next.remaining.saturating_mul(10) < next.limit {
            warn!(
                remaining = next.remaining,
                limit = next.limit,
                "rate limit low"
            );
        }

        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }

    pub fn snapshot(&self) -> RateLimitSnapshot {
        let state = *self.state.lock().unwrap_or_else(PoisonError::into_inner);
        RateLimitSnapshot {
            limit: state.limit,
            remaining: state.remaining,
            reset: state.reset,
            reset_time: (state.reset > 0)
                .then(|| UNIX_EPOCH + Duration::from_secs(state.reset)),
        }
    }
}

fn header_u64(headers: &[(String, String)], name: &str) -> u64 {
    header_value(headers, name)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}
