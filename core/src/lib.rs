//! Synchronous client for the LLM Config Manager HTTP API.
//!
//! # Overview
//! Provides namespaced, versioned key/value configuration retrieval and
//! mutation over HTTP, with automatic retry, rate-limit awareness, and a
//! typed error taxonomy. One `ConfigClient` instance is safe to share
//! across threads.
//!
//! # Design
//! - `ConfigClient` operations are thin path/verb/payload templates; all
//!   retry and error handling lives in `executor::RequestExecutor`.
//! - Transport I/O and sleeping sit behind the `Transport` and `Sleep`
//!   traits so the retry pipeline is deterministic under test. The default
//!   transport is a pooled `ureq` agent.
//! - Every response updates a shared `RateLimitTracker`; callers read it
//!   via immutable snapshots.
//! - `ConfigCache` offers optional time-bucketed memoization of reads with
//!   bounded LRU storage.

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod http;
pub mod rate_limit;
pub mod transport;
pub mod types;

pub use cache::ConfigCache;
pub use client::ConfigClient;
pub use config::ClientConfig;
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse, RequestSpec};
pub use rate_limit::{RateLimitSnapshot, RateLimitTracker};
pub use transport::{
    Clock, Sleep, SystemClock, ThreadSleep, Transport, TransportError, UreqTransport,
};
pub use types::{ConfigEntry, ConfigMetadata, ConfigVersion, HealthStatus};
