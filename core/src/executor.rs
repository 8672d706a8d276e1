//! Retrying request executor.
//!
//! # Design
//! Turns one `RequestSpec` into a correctly-retried HTTP exchange. Two
//! retry layers are deliberately distinct:
//!
//! - **Transient retry**: transport failures and 5xx statuses in
//!   {500, 502, 503, 504} are retried up to `max_retries` extra attempts
//!   with exponential backoff (`backoff_factor * 2^n`). GET, POST, and
//!   DELETE are all retried; the service treats writes as versioned
//!   upserts, so a replayed POST lands on the same version.
//! - **Rate-limit retry**: a 429 waits for `Retry-After` seconds (60 when
//!   the header is missing or malformed) and reissues the request with a
//!   fresh transient budget. `rate_limit_retries = None` waits as long as
//!   the server keeps throttling; a configured cap surfaces
//!   `ApiError::RateLimited` instead.
//!
//! Every received response updates the rate-limit tracker before its status
//! is inspected, so even responses that are about to be retried refresh the
//! quota mirror. Sleeping goes through the `Sleep` trait, which keeps the
//! whole pipeline testable with scripted fakes and no real waits.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{classify, ApiError};
use crate::http::{encode_query, HttpRequest, HttpResponse, RequestSpec};
use crate::rate_limit::RateLimitTracker;
use crate::transport::{Sleep, Transport};

/// Statuses retried by the transient layer.
const TRANSIENT_STATUSES: [u16; 4] = [500, 502, 503, 504];

/// Wait applied on 429 when `Retry-After` is absent or unparsable.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Issues logical requests over a `Transport`, applying retry policy,
/// rate-limit accounting, and error classification.
pub struct RequestExecutor {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    sleep: Arc<dyn Sleep>,
    rate_limits: RateLimitTracker,
}

impl RequestExecutor {
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        sleep: Arc<dyn Sleep>,
    ) -> Self {
        Self {
            config,
            transport,
            sleep,
            rate_limits: RateLimitTracker::new(),
        }
    }

    pub fn rate_limits(&self) -> &RateLimitTracker {
        &self.rate_limits
    }

    /// Execute one logical request and return the parsed JSON success value.
    ///
    /// A 204 yields `Value::Null`. Any classified failure is returned as
    /// `Err`; a non-JSON body on a success status is a contract violation
    /// of the service and surfaces as an `Api` error.
    pub fn execute(&self, spec: &RequestSpec) -> Result<Value, ApiError> {
        let request = self.build_request(spec)?;
        let mut waits: u32 = 0;

        loop {
            let response = self.send_with_retries(&request)?;

            if response.status == 429 {
                if let Some(cap) = self.config.rate_limit_retries {
                    if waits >= cap {
                        return Err(classify(&response));
                    }
                }
                let delay = retry_after(&response);
                warn!(
                    method = request.method.as_str(),
                    url = %request.url,
                    delay_secs = delay.as_secs(),
                    "rate limited, waiting before retry"
                );
                self.sleep.sleep(delay);
                waits += 1;
                continue;
            }

            if !(200..300).contains(&response.status) {
                return Err(classify(&response));
            }

            if response.status == 204 {
                return Ok(Value::Null);
            }

            return serde_json::from_str(&response.body).map_err(|e| ApiError::Api {
                error_type: "Invalid Response".to_string(),
                message: format!("response body is not valid JSON: {e}"),
                status: Some(response.status),
            });
        }
    }

    /// One request with the transient retry policy applied. Returns the
    /// final response, retryable or not, once the budget is spent; only
    /// transport failures that outlive the budget become errors here.
    fn send_with_retries(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        let mut attempt: u32 = 0;

        loop {
            match self.transport.send(request) {
                Ok(response) => {
                    self.rate_limits.update(&response.headers);

                    if TRANSIENT_STATUSES.contains(&response.status)
                        && attempt < self.config.max_retries
                    {
                        let delay = self.backoff_delay(attempt);
                        debug!(
                            method = request.method.as_str(),
                            url = %request.url,
                            status = response.status,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "transient status, retrying"
                        );
                        self.sleep.sleep(delay);
                        attempt += 1;
                        continue;
                    }

                    return Ok(response);
                }
                Err(err) if attempt < self.config.max_retries => {
                    let delay = self.backoff_delay(attempt);
                    debug!(
                        method = request.method.as_str(),
                        url = %request.url,
                        error = %err,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "transport error, retrying"
                    );
                    self.sleep.sleep(delay);
                    attempt += 1;
                }
                Err(err) => {
                    return Err(ApiError::Network {
                        message: err.to_string(),
                    })
                }
            }
        }
    }

    /// Assemble the full URL and merge default headers with caller
    /// overrides (overrides win on case-insensitive name conflicts).
    fn build_request(&self, spec: &RequestSpec) -> Result<HttpRequest, ApiError> {
        let mut url = format!("{}{}", self.config.base_url, spec.path);
        if !spec.query.is_empty() {
            url.push('?');
            url.push_str(&encode_query(&spec.query));
        }

        let mut headers = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("User-Agent".to_string(), self.config.user_agent.clone()),
        ];
        if let Some(token) = &self.config.auth_token {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }
        for (name, value) in &spec.headers {
            if let Some(existing) = headers
                .iter_mut()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
            {
                existing.1 = value.clone();
            } else {
                headers.push((name.clone(), value.clone()));
            }
        }

        let body = match &spec.body {
            Some(value) => Some(serde_json::to_string(value).map_err(|e| ApiError::Api {
                error_type: "Serialization Error".to_string(),
                message: e.to_string(),
                status: None,
            })?),
            None => None,
        };

        Ok(HttpRequest {
            method: spec.method,
            url,
            headers,
            body,
        })
    }

    fn backoff_delay(&self, completed_retries: u32) -> Duration {
        self.config
            .backoff_factor
            .saturating_mul(2u32.saturating_pow(completed_retries))
    }
}

/// Parse `Retry-After` as whole seconds, falling back to the default.
fn retry_after(response: &HttpResponse) -> Duration {
    response
        .header("Retry-After")
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;
    use crate::transport::fakes::{ok_response, FakeSleep, FakeTransport};

    fn config() -> ClientConfig {
        ClientConfig::new("http://localhost:8080/api/v1")
    }

    fn executor_with(
        config: ClientConfig,
        transport: Arc<FakeTransport>,
        sleep: Arc<FakeSleep>,
    ) -> RequestExecutor {
        RequestExecutor::new(config, transport, sleep)
    }

    fn get_spec(path: &str) -> RequestSpec {
        RequestSpec::new(HttpMethod::Get, path.to_string())
    }

    fn error_response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            reason: String::new(),
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    #[test]
    fn success_body_is_parsed_as_json() {
        let transport = Arc::new(FakeTransport::new([Ok(ok_response(200, r#"{"a":1}"#))]));
        let exec = executor_with(config(), transport.clone(), Arc::new(FakeSleep::default()));

        let value = exec.execute(&get_spec("/health")).unwrap();
        assert_eq!(value["a"], 1);
        assert_eq!(transport.request_count(), 1);
    }

    #[test]
    fn no_content_yields_null() {
        let transport = Arc::new(FakeTransport::new([Ok(ok_response(204, ""))]));
        let exec = executor_with(config(), transport, Arc::new(FakeSleep::default()));

        let value = exec.execute(&get_spec("/configs/app/old")).unwrap();
        assert!(value.is_null());
    }

    #[test]
    fn non_json_success_body_is_an_api_error() {
        let transport = Arc::new(FakeTransport::new([Ok(ok_response(200, "not json"))]));
        let exec = executor_with(config(), transport, Arc::new(FakeSleep::default()));

        let err = exec.execute(&get_spec("/health")).unwrap_err();
        match err {
            ApiError::Api { error_type, .. } => assert_eq!(error_type, "Invalid Response"),
            other => panic!("expected Api, got {other:?}"),
        }
    }

    #[test]
    fn transient_500_is_retried_until_success() {
        let transport = Arc::new(FakeTransport::new([
            Ok(error_response(500, "")),
            Ok(error_response(502, "")),
            Ok(ok_response(200, r#"{"ok":true}"#)),
        ]));
        let sleep = Arc::new(FakeSleep::default());
        let exec = executor_with(config(), transport.clone(), sleep.clone());

        let value = exec.execute(&get_spec("/health")).unwrap();
        assert_eq!(value["ok"], true);
        assert_eq!(transport.request_count(), 3);
        // Exponential backoff from the 1s base factor.
        assert_eq!(
            *sleep.naps.lock().unwrap(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[test]
    fn retries_stop_after_max_and_surface_classified_error() {
        let transport = Arc::new(FakeTransport::new([
            Ok(error_response(503, "")),
            Ok(error_response(503, "")),
            Ok(error_response(503, r#"{"error":"Storage Error","message":"down"}"#)),
        ]));
        let exec = executor_with(
            config().max_retries(2),
            transport.clone(),
            Arc::new(FakeSleep::default()),
        );

        let err = exec.execute(&get_spec("/health")).unwrap_err();
        // max_retries + 1 total attempts.
        assert_eq!(transport.request_count(), 3);
        match err {
            ApiError::Api {
                error_type, status, ..
            } => {
                assert_eq!(error_type, "Storage Error");
                assert_eq!(status, Some(503));
            }
            other => panic!("expected Api, got {other:?}"),
        }
    }

    #[test]
    fn transport_errors_are_retried_then_surface_as_network() {
        let transport = Arc::new(FakeTransport::new([
            Err(crate::transport::TransportError("connection refused".to_string())),
            Err(crate::transport::TransportError("connection refused".to_string())),
        ]));
        let exec = executor_with(
            config().max_retries(1),
            transport.clone(),
            Arc::new(FakeSleep::default()),
        );

        let err = exec.execute(&get_spec("/health")).unwrap_err();
        assert_eq!(transport.request_count(), 2);
        match err {
            ApiError::Network { message } => assert!(message.contains("connection refused")),
            other => panic!("expected Network, got {other:?}"),
        }
    }

    #[test]
    fn transport_error_then_success_recovers() {
        let transport = Arc::new(FakeTransport::new([
            Err(crate::transport::TransportError("timed out".to_string())),
            Ok(ok_response(200, r#"{"ok":true}"#)),
        ]));
        let exec = executor_with(config(), transport, Arc::new(FakeSleep::default()));

        assert!(exec.execute(&get_spec("/health")).is_ok());
    }

    #[test]
    fn rate_limited_waits_retry_after_then_retries() {
        let mut limited = error_response(429, "");
        limited
            .headers
            .push(("Retry-After".to_string(), "7".to_string()));
        let transport = Arc::new(FakeTransport::new([
            Ok(limited),
            Ok(ok_response(200, r#"{"ok":true}"#)),
        ]));
        let sleep = Arc::new(FakeSleep::default());
        let exec = executor_with(config(), transport.clone(), sleep.clone());

        let value = exec.execute(&get_spec("/health")).unwrap();
        assert_eq!(value["ok"], true);
        assert_eq!(transport.request_count(), 2);
        assert_eq!(*sleep.naps.lock().unwrap(), vec![Duration::from_secs(7)]);
    }

    #[test]
    fn rate_limited_without_header_waits_default_60s() {
        let transport = Arc::new(FakeTransport::new([
            Ok(error_response(429, "")),
            Ok(ok_response(200, "{}")),
        ]));
        let sleep = Arc::new(FakeSleep::default());
        let exec = executor_with(config(), transport, sleep.clone());

        exec.execute(&get_spec("/health")).unwrap();
        assert_eq!(*sleep.naps.lock().unwrap(), vec![Duration::from_secs(60)]);
    }

    #[test]
    fn malformed_retry_after_falls_back_to_default() {
        let mut limited = error_response(429, "");
        limited
            .headers
            .push(("Retry-After".to_string(), "tomorrow".to_string()));
        let transport = Arc::new(FakeTransport::new([
            Ok(limited),
            Ok(ok_response(200, "{}")),
        ]));
        let sleep = Arc::new(FakeSleep::default());
        let exec = executor_with(config(), transport, sleep.clone());

        exec.execute(&get_spec("/health")).unwrap();
        assert_eq!(*sleep.naps.lock().unwrap(), vec![Duration::from_secs(60)]);
    }

    #[test]
    fn rate_limit_cap_surfaces_rate_limited_error() {
        let transport = Arc::new(FakeTransport::new([
            Ok(error_response(429, r#"{"message":"slow down"}"#)),
            Ok(error_response(429, r#"{"message":"slow down"}"#)),
        ]));
        let sleep = Arc::new(FakeSleep::default());
        let exec = executor_with(
            config().rate_limit_retries(Some(1)),
            transport.clone(),
            sleep.clone(),
        );

        let err = exec.execute(&get_spec("/health")).unwrap_err();
        assert_eq!(transport.request_count(), 2);
        assert_eq!(sleep.naps.lock().unwrap().len(), 1);
        match err {
            ApiError::RateLimited { message } => assert_eq!(message, "slow down"),
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[test]
    fn rate_limit_cap_zero_never_waits() {
        let transport = Arc::new(FakeTransport::new([Ok(error_response(429, ""))]));
        let sleep = Arc::new(FakeSleep::default());
        let exec = executor_with(
            config().rate_limit_retries(Some(0)),
            transport,
            sleep.clone(),
        );

        let err = exec.execute(&get_spec("/health")).unwrap_err();
        assert!(matches!(err, ApiError::RateLimited { .. }));
        assert!(sleep.naps.lock().unwrap().is_empty());
    }

    #[test]
    fn rate_limit_retry_resets_transient_budget() {
        // 429 followed by a 500 must still get the full transient budget.
        let transport = Arc::new(FakeTransport::new([
            Ok(error_response(429, "")),
            Ok(error_response(500, "")),
            Ok(ok_response(200, "{}")),
        ]));
        let exec = executor_with(
            config().max_retries(1),
            transport.clone(),
            Arc::new(FakeSleep::default()),
        );

        assert!(exec.execute(&get_spec("/health")).is_ok());
        assert_eq!(transport.request_count(), 3);
    }

    #[test]
    fn default_headers_are_attached() {
        let transport = Arc::new(FakeTransport::new([Ok(ok_response(200, "{}"))]));
        let exec = executor_with(
            config().auth_token("secret-token"),
            transport.clone(),
            Arc::new(FakeSleep::default()),
        );

        exec.execute(&get_spec("/health")).unwrap();
        let requests = transport.requests.lock().unwrap();
        let headers = &requests[0].headers;
        assert!(headers.contains(&("Content-Type".to_string(), "application/json".to_string())));
        assert!(headers.contains(&(
            "Authorization".to_string(),
            "Bearer secret-token".to_string()
        )));
        assert!(headers
            .iter()
            .any(|(n, v)| n == "User-Agent" && v.starts_with("llm-config-client/")));
    }

    #[test]
    fn caller_header_overrides_win() {
        let transport = Arc::new(FakeTransport::new([Ok(ok_response(200, "{}"))]));
        let exec = executor_with(config(), transport.clone(), Arc::new(FakeSleep::default()));

        let mut spec = get_spec("/health");
        spec.headers
            .push(("content-type".to_string(), "text/plain".to_string()));
        exec.execute(&spec).unwrap();

        let requests = transport.requests.lock().unwrap();
        let content_types: Vec<_> = requests[0]
            .headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case("content-type"))
            .collect();
        assert_eq!(content_types.len(), 1);
        assert_eq!(content_types[0].1, "text/plain");
    }

    #[test]
    fn query_parameters_are_appended() {
        let transport = Arc::new(FakeTransport::new([Ok(ok_response(200, "{}"))]));
        let exec = executor_with(config(), transport.clone(), Arc::new(FakeSleep::default()));

        let mut spec = get_spec("/configs/app/model");
        spec.query
            .push(("env".to_string(), "production".to_string()));
        exec.execute(&spec).unwrap();

        let requests = transport.requests.lock().unwrap();
        assert_eq!(
            requests[0].url,
            "http://localhost:8080/api/v1/configs/app/model?env=production"
        );
    }

    #[test]
    fn error_responses_update_the_rate_limit_tracker() {
        let mut failing = error_response(500, "");
        failing
            .headers
            .push(("X-RateLimit-Limit".to_string(), "100".to_string()));
        failing
            .headers
            .push(("X-RateLimit-Remaining".to_string(), "42".to_string()));
        let transport = Arc::new(FakeTransport::new([Ok(failing)]));
        let exec = executor_with(
            config().max_retries(0),
            transport,
            Arc::new(FakeSleep::default()),
        );

        assert!(exec.execute(&get_spec("/health")).is_err());
        // Headers were consumed before the status was classified.
        let snapshot = exec.rate_limits().snapshot();
        assert_eq!(snapshot.limit, 100);
        assert_eq!(snapshot.remaining, 42);
    }

    #[test]
    fn last_processed_response_wins_in_the_tracker() {
        let mut first = ok_response(200, "{}");
        first
            .headers
            .push(("X-RateLimit-Limit".to_string(), "100".to_string()));
        first
            .headers
            .push(("X-RateLimit-Remaining".to_string(), "42".to_string()));
        let transport = Arc::new(FakeTransport::new([
            Ok(first),
            Ok(ok_response(200, "{}")),
        ]));
        let exec = executor_with(config(), transport, Arc::new(FakeSleep::default()));

        exec.execute(&get_spec("/health")).unwrap();
        exec.execute(&get_spec("/health")).unwrap();
        // The second (headerless) response overwrote the snapshot wholesale.
        let snapshot = exec.rate_limits().snapshot();
        assert_eq!(snapshot.limit, 0);
        assert_eq!(snapshot.remaining, 0);
    }
}
