//! Loopback same-origin trust check for state-changing and file-serving
//! routes.
//!
//! A request passes only when both `Host` and `Origin` are present, both
//! name a loopback host, they name the *same* host, and their effective
//! ports agree (origin scheme default when a port is omitted).

use axum::extract::Request;
use axum::http::header::{HOST, ORIGIN};
use axum::http::{HeaderMap, HeaderName};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use url::Url;

use crate::error::ApiError;

pub const FORBIDDEN_MESSAGE: &str = "Forbidden: local same-origin requests only";

const LOOPBACK_HOSTS: [&str; 3] = ["localhost", "127.0.0.1", "::1"];

/// `axum::middleware::from_fn` entry point.
pub async fn require_local_request(request: Request, next: Next) -> Response {
    if is_trusted_local(request.headers()) {
        return next.run(request).await;
    }
    tracing::warn!(
        host = ?request.headers().get(HOST),
        origin = ?request.headers().get(ORIGIN),
        path = %request.uri().path(),
        "rejected non-local request"
    );
    ApiError::Forbidden.into_response()
}

pub fn is_trusted_local(headers: &HeaderMap) -> bool {
    let header = |name: HeaderName| headers.get(name).and_then(|v| v.to_str().ok());
    let (Some(host), Some(origin)) = (header(HOST), header(ORIGIN)) else {
        return false;
    };
    check(host, origin).is_some()
}

fn check(host_header: &str, origin_header: &str) -> Option<()> {
    let (host, host_port) = parse_host(host_header)?;
    if !is_loopback(host) {
        return None;
    }

    let origin = Url::parse(origin_header).ok()?;
    let default_port = match origin.scheme() {
        "http" => 80,
        "https" => 443,
        _ => return None,
    };
    let origin_host = origin.host_str()?;
    if !is_loopback(origin_host) {
        return None;
    }

    // Both ports fall back to the origin scheme's default.
    let request_port = match host_port {
        Some(port) => port.parse::<u16>().ok()?,
        None => default_port,
    };
    let origin_port = origin.port().unwrap_or(default_port);

    (normalize(host) == normalize(origin_host) && request_port == origin_port).then_some(())
}

/// Split a `Host` header into hostname and optional port text. Bracketed
/// IPv6 is supported; a bare address with several colons is all host.
fn parse_host(value: &str) -> Option<(&str, Option<&str>)> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Some(rest) = value.strip_prefix('[') {
        let closing = rest.find(']')?;
        let host = &rest[..closing];
        let tail = &rest[closing + 1..];
        if tail.is_empty() {
            return Some((host, None));
        }
        let port = tail.strip_prefix(':')?;
        return Some((host, (!port.is_empty()).then_some(port)));
    }

    match (value.find(':'), value.rfind(':')) {
        (Some(first), Some(last)) if first == last => {
            let port = &value[first + 1..];
            Some((&value[..first], (!port.is_empty()).then_some(port)))
        }
        _ => Some((value, None)),
    }
}

fn normalize(host: &str) -> String {
    host.trim_start_matches('[')
        .trim_end_matches(']')
        .to_ascii_lowercase()
}

fn is_loopback(host: &str) -> bool {
    let host = normalize(host);
    LOOPBACK_HOSTS.contains(&host.as_str())
}
