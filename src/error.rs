/*!
 * Errors that can be returned by the scoring operations and their HTTP handlers
 */

use std::error::Error as StdError;
use std::fmt::{Display, Formatter, Result as FmtResult};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use diesel_async::pooled_connection::deadpool::PoolError;
use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// The caller did not pass the admin gate, or is not identified at all
    Unauthorized,
    InvalidInput(String),
    NotFound(String),
    /// A mutation was rejected by the store
    WriteFailure(Box<Error>),
    /// The schedule feed is unreachable or returned garbage
    UpstreamFailure(String),
    Feed(reqwest::Error),
    Db(diesel::result::Error),
    Pool(PoolError),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::InvalidInput(s) => write!(f, "invalid input: {s}"),
            Self::NotFound(s) => write!(f, "not found: {s}"),
            Self::WriteFailure(e) => write!(f, "write failed: {e}"),
            Self::UpstreamFailure(s) => write!(f, "schedule feed failure: {s}"),
            Self::Feed(e) => write!(f, "schedule feed failure: {e}"),
            Self::Db(e) => write!(f, "{e}"),
            Self::Pool(e) => write!(f, "{e}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::WriteFailure(e) => Some(e.as_ref()),
            Self::Feed(e) => Some(e),
            Self::Db(e) => Some(e),
            Self::Pool(e) => Some(e),
            _ => None,
        }
    }
}

impl Error {
    /// Wraps a store error raised while mutating state
    pub fn write(e: impl Into<Error>) -> Error {
        match e.into() {
            e @ Error::WriteFailure(_) => e,
            e => Error::WriteFailure(Box::new(e)),
        }
    }

    /// Machine-readable kind, stable across releases
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::InvalidInput(_) => "invalid_input",
            Self::NotFound(_) => "not_found",
            Self::WriteFailure(_) => "write_failure",
            Self::UpstreamFailure(_) | Self::Feed(_) => "upstream_failure",
            Self::Db(_) | Self::Pool(_) => "store_failure",
        }
    }

    /// Message safe to show to the caller. Driver errors stay in the logs.
    pub fn as_message(&self) -> String {
        match self {
            Self::Unauthorized => "Unauthorized".to_owned(),
            Self::InvalidInput(s) => s.clone(),
            Self::NotFound(s) => format!("{s} not found"),
            Self::WriteFailure(_) => "Failed to save changes".to_owned(),
            Self::UpstreamFailure(_) | Self::Feed(_) => "Schedule feed unavailable".to_owned(),
            Self::Db(_) | Self::Pool(_) => "Internal error".to_owned(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::UpstreamFailure(_) | Self::Feed(_) => StatusCode::BAD_GATEWAY,
            Self::WriteFailure(_) | Self::Db(_) | Self::Pool(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<diesel::result::Error> for Error {
    fn from(e: diesel::result::Error) -> Error {
        Error::Db(e)
    }
}

impl From<PoolError> for Error {
    fn from(e: PoolError) -> Error {
        Error::Pool(e)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Error {
        Error::Feed(e)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if self.status().is_server_error() {
            tracing::error!(kind = self.kind(), "{self}");
        }
        let body = json!({ "error": { "kind": self.kind(), "message": self.as_message() } });
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_wraps_once() {
        let e = Error::write(diesel::result::Error::NotFound);
        assert_eq!(e.kind(), "write_failure");
        let e = Error::write(e);
        match e {
            Error::WriteFailure(inner) => assert_eq!(inner.kind(), "store_failure"),
            e => panic!("unexpected {e:?}"),
        }
    }

    #[test]
    fn internal_details_are_not_shown() {
        let e = Error::Db(diesel::result::Error::NotFound);
        assert_eq!(e.as_message(), "Internal error");
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(Error::NotFound("Game G1".into()).as_message(), "Game G1 not found");
        assert_eq!(Error::Unauthorized.status(), StatusCode::UNAUTHORIZED);
    }
}
