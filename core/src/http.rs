//! Plain-data HTTP request and response types.
//!
//! # Design
//! These types describe one HTTP exchange as data. `RequestSpec` is the
//! logical request a `ConfigClient` operation constructs (path, query, JSON
//! body); the executor expands it into a ready-to-send `HttpRequest` with
//! the full URL and default headers attached. `HttpResponse` is what every
//! `Transport` implementation returns, including the status reason phrase
//! and headers so the classifier and rate-limit tracker can inspect them.
//!
//! All fields are owned so values can move freely between threads.

use serde_json::Value;

/// HTTP method for a request. Only the verbs the config API uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// One logical API request, before URL assembly and default headers.
///
/// Constructed fresh per call by `ConfigClient` and consumed by the
/// executor; never retained after the call completes.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: HttpMethod,
    /// Path relative to the configured base URL, e.g. `/configs/app/model`.
    pub path: String,
    /// Query parameters, appended URL-encoded.
    pub query: Vec<(String, String)>,
    /// JSON body for POST requests.
    pub body: Option<Value>,
    /// Caller header overrides; they win over defaults on name conflict.
    pub headers: Vec<(String, String)>,
}

impl RequestSpec {
    pub fn new(method: HttpMethod, path: String) -> Self {
        Self {
            method,
            path,
            query: Vec::new(),
            body: None,
            headers: Vec::new(),
        }
    }
}

/// A fully-assembled HTTP request, ready for a `Transport` to send.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// Status reason phrase, empty when the transport has none.
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    /// Look up a header by name, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        header_value(&self.headers, name)
    }
}

/// Case-insensitive header lookup over a plain header list.
pub fn header_value<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Encode query parameters as `k=v&k=v` with percent-encoding.
pub(crate) fn encode_query(query: &[(String, String)]) -> String {
    let mut out = String::new();
    for (i, (name, value)) in query.iter().enumerate() {
        if i > 0 {
            out.push('&');
        }
        encode_component(name, &mut out);
        out.push('=');
        encode_component(value, &mut out);
    }
    out
}

/// Percent-encode everything outside the RFC 3986 unreserved set.
fn encode_component(s: &str, out: &mut String) {
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
}
