use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::decision::DenyReason;

pub(crate) const ERROR_CODE_FORBIDDEN: &str = "forbidden";

#[derive(Debug, Serialize)]
struct RejectionBody {
    error: &'static str,
    error_description: String,
}

/// Human-readable text for each deny reason. `NotInAllowlist` embeds the
/// literal client address so callers can see what the gateway saw.
pub fn reason_text(reason: &DenyReason, client: Option<&str>) -> String {
    match reason {
        DenyReason::NoClientIp => "Unable to determine client IP address".to_string(),
        DenyReason::InvalidFormat => "Invalid client IP address format".to_string(),
        DenyReason::NotInAllowlist => format!(
            "Access denied: IP address {} is not in the allowlist",
            client.unwrap_or("unknown")
        ),
    }
}

/// The standard rejection: HTTP 403 with a machine-readable JSON error
/// body. The deny path must stay reachable from browsers on other origins
/// so they can see why they were blocked, hence the permissive CORS
/// headers set directly on the response instead of relying on an outer
/// CORS layer that never runs for short-circuited requests.
pub fn forbidden_response(reason: &DenyReason, client: Option<&str>) -> Response {
    let body = RejectionBody {
        error: ERROR_CODE_FORBIDDEN,
        error_description: reason_text(reason, client),
    };
    let mut response = (StatusCode::FORBIDDEN, Json(body)).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Authorization, Content-Type"),
    );
    response
}
