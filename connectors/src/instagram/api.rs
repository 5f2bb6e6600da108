use reqwest::Client;

use super::{GRANT_TYPE, REFRESH_PATH};
use crate::{oauth, ConnectorError, Result, USER_AGENT};

/// Token returned by the refresh endpoint.
#[derive(Debug)]
pub struct RenewedToken {
    pub access_token: String,
    /// Seconds until expiry as reported upstream; not tracked.
    pub expires_in: Option<i64>,
}

/// HTTP client for the Instagram Graph token endpoint.
pub struct InstagramClient {
    http_client: Client,
    base_url: String,
}

impl InstagramClient {
    /// Create a client against `base_url` (`GRAPH_BASE_URL` in production).
    pub fn with_base_url(base_url: String) -> Result<Self> {
        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(ConnectorError::Client)?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Renew a long-lived access token.
    ///
    /// The response looks like:
    /// `{"access_token": "...", "token_type": "bearer", "expires_in": 5183944}`
    pub async fn refresh_long_lived_token(&self, access_token: &str) -> Result<RenewedToken> {
        let url = format!("{}{}", self.base_url, REFRESH_PATH);
        let token = oauth::get_query(
            &self.http_client,
            &url,
            &[("grant_type", GRANT_TYPE), ("access_token", access_token)],
        )
        .await?;

        let expires_in = token.expires_in;
        Ok(RenewedToken {
            access_token: token.require_access_token()?,
            expires_in,
        })
    }
}
