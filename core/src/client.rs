//! Namespaced configuration operations.
//!
//! # Design
//! `ConfigClient` methods are path/verb/payload templates over the
//! executor; none of them carry retry or error-translation logic beyond
//! return-value shaping. Reads treat "missing config" as a normal outcome:
//! `get_config` maps `NotFound` to `None`, `delete_config` to `false`, and
//! `get_history` to an empty list. Writes (`set_config`, `rollback`) and
//! `list_configs` propagate every error unmodified.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::executor::RequestExecutor;
use crate::http::{HttpMethod, RequestSpec};
use crate::rate_limit::RateLimitSnapshot;
use crate::transport::{Sleep, ThreadSleep, Transport, UreqTransport};
use crate::types::{ConfigEntry, ConfigVersion, HealthStatus};

/// Synchronous client for the config API.
///
/// Safe to share across threads; every operation blocks its calling thread
/// until completion.
pub struct ConfigClient {
    executor: RequestExecutor,
}

impl ConfigClient {
    /// Build a client with the default pooled transport.
    pub fn new(config: ClientConfig) -> Self {
        let transport = Arc::new(UreqTransport::new(&config));
        Self::with_transport(config, transport, Arc::new(ThreadSleep))
    }

    /// Build a client over a caller-supplied transport and sleeper.
    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        sleep: Arc<dyn Sleep>,
    ) -> Self {
        Self {
            executor: RequestExecutor::new(config, transport, sleep),
        }
    }

    /// Fetch a configuration value, `None` when it does not exist.
    pub fn get_config(
        &self,
        namespace: &str,
        key: &str,
        env: &str,
        with_overrides: bool,
    ) -> Result<Option<ConfigEntry>, ApiError> {
        let mut spec = RequestSpec::new(HttpMethod::Get, format!("/configs/{namespace}/{key}"));
        spec.query.push(("env".to_string(), env.to_string()));
        if with_overrides {
            spec.query
                .push(("with_overrides".to_string(), "true".to_string()));
        }

        match self.executor.execute(&spec) {
            Ok(value) => decode(value).map(Some),
            Err(ApiError::NotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Create or update a configuration value (versioned upsert).
    pub fn set_config(
        &self,
        namespace: &str,
        key: &str,
        value: Value,
        env: &str,
        user: &str,
        secret: bool,
    ) -> Result<ConfigEntry, ApiError> {
        let mut spec = RequestSpec::new(HttpMethod::Post, format!("/configs/{namespace}/{key}"));
        spec.body = Some(json!({
            "value": value,
            "env": env,
            "user": user,
            "secret": secret,
        }));

        decode(self.executor.execute(&spec)?)
    }

    /// Delete a configuration. `false` when it did not exist.
    pub fn delete_config(&self, namespace: &str, key: &str, env: &str) -> Result<bool, ApiError> {
        let mut spec =
            RequestSpec::new(HttpMethod::Delete, format!("/configs/{namespace}/{key}"));
        spec.query.push(("env".to_string(), env.to_string()));

        match self.executor.execute(&spec) {
            Ok(_) => Ok(true),
            Err(ApiError::NotFound { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// List all configurations in a namespace, in service order.
    pub fn list_configs(&self, namespace: &str, env: &str) -> Result<Vec<ConfigEntry>, ApiError> {
        let mut spec = RequestSpec::new(HttpMethod::Get, format!("/configs/{namespace}"));
        spec.query.push(("env".to_string(), env.to_string()));

        decode(self.executor.execute(&spec)?)
    }

    /// Version history for a key, newest first as supplied by the service.
    /// Empty when the key does not exist.
    pub fn get_history(
        &self,
        namespace: &str,
        key: &str,
        env: &str,
    ) -> Result<Vec<ConfigVersion>, ApiError> {
        let mut spec = RequestSpec::new(
            HttpMethod::Get,
            format!("/configs/{namespace}/{key}/history"),
        );
        spec.query.push(("env".to_string(), env.to_string()));

        match self.executor.execute(&spec) {
            Ok(value) => decode(value),
            Err(ApiError::NotFound { .. }) => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }

    /// Roll a configuration back to a historical version. The rollback
    /// itself creates a new version.
    pub fn rollback(
        &self,
        namespace: &str,
        key: &str,
        version: u64,
        env: &str,
    ) -> Result<ConfigEntry, ApiError> {
        let mut spec = RequestSpec::new(
            HttpMethod::Post,
            format!("/configs/{namespace}/{key}/rollback/{version}"),
        );
        spec.query.push(("env".to_string(), env.to_string()));

        decode(self.executor.execute(&spec)?)
    }

    /// Check API health.
    pub fn health_check(&self) -> Result<HealthStatus, ApiError> {
        let spec = RequestSpec::new(HttpMethod::Get, "/health".to_string());
        decode(self.executor.execute(&spec)?)
    }

    /// Quota as of the last processed response. Recent, not authoritative:
    /// concurrent requests may overwrite each other's updates out of order.
    pub fn rate_limit_status(&self) -> RateLimitSnapshot {
        self.executor.rate_limits().snapshot()
    }
}

/// Decode a success payload into a typed DTO. A payload that does not match
/// the expected shape is a contract violation of the service.
fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::Api {
        error_type: "Invalid Response".to_string(),
        message: format!("unexpected response shape: {e}"),
        status: None,
    })
}
