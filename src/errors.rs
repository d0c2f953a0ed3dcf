use failure::{Context, Error as FailureError};
use hyper::StatusCode;
use serde_json;
use validator::ValidationErrors;

/// Error kinds attached as context to `failure::Error` chains.
/// The application looks the first one up in the chain to pick a status code;
/// anything without a kind becomes a 500.
#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "Not found")]
    NotFound,
    #[fail(display = "Parse error")]
    Parse,
    #[fail(display = "Validation error")]
    Validate(ValidationErrors),
    #[fail(display = "Unauthorized")]
    Unauthorized,
    #[fail(display = "Server is refusing to fullfil the request")]
    Forbidden,
    #[fail(display = "R2D2 connection error")]
    Connection,
}

impl Error {
    /// First error kind attached anywhere in the chain of `e`
    pub fn find_in(e: &FailureError) -> Option<&Error> {
        e.iter_chain()
            .filter_map(|cause| {
                cause
                    .downcast_ref::<Error>()
                    .or_else(|| cause.downcast_ref::<Context<Error>>().map(|context| context.get_context()))
            }).next()
    }

    pub fn code(&self) -> StatusCode {
        match *self {
            Error::NotFound => StatusCode::NotFound,
            Error::Parse => StatusCode::UnprocessableEntity,
            Error::Validate(_) => StatusCode::BadRequest,
            Error::Unauthorized => StatusCode::Unauthorized,
            Error::Forbidden => StatusCode::Forbidden,
            Error::Connection => StatusCode::InternalServerError,
        }
    }

    /// Machine readable reason sent alongside the status code
    pub fn reason(&self) -> &'static str {
        match *self {
            Error::NotFound => "not_found",
            Error::Parse => "parse_error",
            Error::Validate(_) => "validation_error",
            Error::Unauthorized => "unauthorized",
            Error::Forbidden => "forbidden",
            Error::Connection => "storage_unavailable",
        }
    }

    pub fn description(&self) -> String {
        match *self {
            Error::Validate(ref errors) => serde_json::to_string(errors).unwrap_or_else(|_| "Bad request".to_string()),
            Error::Connection => "Internal server error".to_string(),
            ref other => other.to_string(),
        }
    }
}
