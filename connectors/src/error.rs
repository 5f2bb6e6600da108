use thiserror::Error;

/// Failures talking to a platform.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// The token endpoint answered with an error status, a body that is not
    /// JSON, or JSON without the expected token field.
    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    /// A catalog endpoint answered with an error status or a malformed payload.
    #[error("upstream API error: {0}")]
    UpstreamApi(String),

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}
