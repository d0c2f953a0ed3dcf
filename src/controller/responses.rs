//! JSON responses, rejection and error bodies, session cookie

use failure::Error as FailureError;
use hyper::header::{ContentLength, ContentType, SetCookie};
use hyper::server::Response;
use hyper::StatusCode;
use serde::Serialize;
use serde_json;

use config::Claims;
use errors::Error;
use models::Rejection;
use types::SessionMarker;

/// Body of every non-2xx response
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMessage {
    pub code: u16,
    pub reason: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

pub fn response_with_body(status: StatusCode, body: String) -> Response {
    Response::new()
        .with_status(status)
        .with_header(ContentLength(body.len() as u64))
        .with_header(ContentType::json())
        .with_body(body)
}

pub fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Result<Response, FailureError> {
    let body = serde_json::to_string(value)?;
    Ok(response_with_body(status, body))
}

pub fn rejection_status(rejection: &Rejection) -> StatusCode {
    match *rejection {
        Rejection::NotFound | Rejection::AlreadyClaimed => StatusCode::NotFound,
        Rejection::Inactive | Rejection::Expired => StatusCode::BadRequest,
        Rejection::RateLimited { .. } => StatusCode::TooManyRequests,
    }
}

/// Rate limited rejections also carry a `Retry-After` header
pub fn rejection_response(rejection: &Rejection) -> Result<Response, FailureError> {
    let status = rejection_status(rejection);
    let message = ErrorMessage {
        code: status.as_u16(),
        reason: rejection.reason().to_string(),
        description: rejection.message(),
        retry_after: rejection.retry_after_secs(),
    };

    let mut response = json_response(status, &message)?;
    if let Some(secs) = message.retry_after {
        response.headers_mut().set_raw("Retry-After", secs.to_string());
    }
    Ok(response)
}

/// Error kind found in the chain decides the status, anything else is a 500
pub fn error_response(e: &FailureError) -> Response {
    let (status, message) = match Error::find_in(e) {
        Some(kind) => (
            kind.code(),
            ErrorMessage {
                code: kind.code().as_u16(),
                reason: kind.reason().to_string(),
                description: kind.description(),
                retry_after: None,
            },
        ),
        None => (
            StatusCode::InternalServerError,
            ErrorMessage {
                code: StatusCode::InternalServerError.as_u16(),
                reason: "internal_error".to_string(),
                description: "Internal server error".to_string(),
                retry_after: None,
            },
        ),
    };

    let body = serde_json::to_string(&message).unwrap_or_default();
    response_with_body(status, body)
}

pub fn session_cookie(marker: &SessionMarker, config: &Claims) -> String {
    format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Strict",
        config.session_cookie, marker, config.session_max_age_secs
    )
}

/// Hands a freshly minted session marker back to the client
pub fn with_session_cookie(mut response: Response, minted: Option<&SessionMarker>, config: &Claims) -> Response {
    if let Some(marker) = minted {
        response.headers_mut().set(SetCookie(vec![session_cookie(marker, config)]));
    }
    response
}
