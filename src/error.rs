//! Error kinds surfaced by every credkeeper function.

use axum::http::StatusCode;
use connectors::ConnectorError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The credential record object does not exist in the store.
    #[error("credential record {bucket}/{key} not found")]
    NotFound { bucket: String, key: String },

    /// The blob store could not be reached or refused the request.
    #[error("credential store access failed: {0}")]
    StoreAccess(String),

    /// The stored document is not a credential record, or lacks the platform entry.
    #[error("malformed credential record: {0}")]
    MalformedRecord(String),

    /// The authorization code could not be obtained.
    #[error("authorization flow failed: {0}")]
    Automation(String),

    /// A token endpoint returned an error, an unparseable body, or no token.
    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    /// A catalog endpoint returned an error or a malformed payload.
    #[error("upstream API error: {0}")]
    UpstreamApi(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Stable machine-readable name, used in logs and error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound { .. } => "not_found",
            Error::StoreAccess(_) => "store_access",
            Error::MalformedRecord(_) => "malformed_record",
            Error::Automation(_) => "automation",
            Error::TokenExchange(_) => "token_exchange",
            Error::UpstreamApi(_) => "upstream_api",
            Error::Config(_) => "config",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::StoreAccess(_) | Error::MalformedRecord(_) | Error::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Error::Automation(_) | Error::TokenExchange(_) | Error::UpstreamApi(_) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }
}

impl From<ConnectorError> for Error {
    fn from(err: ConnectorError) -> Self {
        match err {
            ConnectorError::TokenExchange(msg) => Error::TokenExchange(msg),
            ConnectorError::UpstreamApi(msg) => Error::UpstreamApi(msg),
            ConnectorError::Client(e) => Error::Config(format!("HTTP client: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_errors_keep_their_kind() {
        let err: Error = ConnectorError::TokenExchange("no refresh_token".to_string()).into();
        assert_eq!(err.kind(), "token_exchange");
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);

        let err: Error = ConnectorError::UpstreamApi("status 500".to_string()).into();
        assert_eq!(err.kind(), "upstream_api");
    }

    #[test]
    fn test_not_found_message() {
        let err = Error::NotFound {
            bucket: "tokens".to_string(),
            key: "credentials.json".to_string(),
        };
        assert_eq!(err.to_string(), "credential record tokens/credentials.json not found");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
