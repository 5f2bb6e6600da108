//! Token endpoint I/O shared by the platform clients.

use crate::{ConnectorError, Result};
use reqwest::{Client, Response};
use serde::Deserialize;

/// Upper bound on how much of an error body ends up in an error message.
const MAX_ERROR_BODY: usize = 512;

/// Token endpoint response.
///
/// Every field is optional; each grant decides which one it requires.
#[derive(Debug, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Seconds until the token expires. Parsed for logging only.
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenResponse {
    /// Take `refresh_token`, failing if the endpoint omitted it.
    pub fn require_refresh_token(self) -> Result<String> {
        self.refresh_token.ok_or_else(|| {
            ConnectorError::TokenExchange("response has no refresh_token".to_string())
        })
    }

    /// Take `access_token`, failing if the endpoint omitted it.
    pub fn require_access_token(self) -> Result<String> {
        self.access_token.ok_or_else(|| {
            ConnectorError::TokenExchange("response has no access_token".to_string())
        })
    }
}

/// POST a form-encoded grant to a token endpoint.
pub async fn post_form(
    client: &Client,
    token_url: &str,
    form: &[(&str, &str)],
) -> Result<TokenResponse> {
    tracing::debug!("Requesting token from {}", token_url);

    let response = client
        .post(token_url)
        .header("Accept", "application/json")
        .form(form)
        .send()
        .await
        .map_err(|e| ConnectorError::TokenExchange(format!("request failed: {}", e)))?;

    read_token_response(response).await
}

/// GET a token endpoint with the grant in the query string.
pub async fn get_query(
    client: &Client,
    token_url: &str,
    query: &[(&str, &str)],
) -> Result<TokenResponse> {
    tracing::debug!("Requesting token from {}", token_url);

    let response = client
        .get(token_url)
        .query(query)
        .send()
        .await
        .map_err(|e| ConnectorError::TokenExchange(format!("request failed: {}", e)))?;

    read_token_response(response).await
}

async fn read_token_response(response: Response) -> Result<TokenResponse> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ConnectorError::TokenExchange(format!("failed to read body: {}", e)))?;

    if !status.is_success() {
        return Err(ConnectorError::TokenExchange(format!(
            "status {}: {}",
            status,
            truncate(&body)
        )));
    }

    let token: TokenResponse = serde_json::from_str(&body)
        .map_err(|e| ConnectorError::TokenExchange(format!("unparseable response: {}", e)))?;

    tracing::debug!(
        has_access_token = token.access_token.is_some(),
        has_refresh_token = token.refresh_token.is_some(),
        expires_in = ?token.expires_in,
        "Token endpoint responded"
    );

    Ok(token)
}

/// Cut `body` to at most `MAX_ERROR_BODY` bytes on a char boundary.
pub(crate) fn truncate(body: &str) -> &str {
    if body.len() <= MAX_ERROR_BODY {
        return body;
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    #[test]
    fn test_token_response_deserialization() {
        let json = r#"{
            "access_token": "acc_123",
            "refresh_token": "ref_456",
            "expires_in": 3600,
            "token_type": "bearer"
        }"#;

        let response: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.access_token.as_deref(), Some("acc_123"));
        assert_eq!(response.refresh_token.as_deref(), Some("ref_456"));
        assert_eq!(response.expires_in, Some(3600));
        assert_eq!(response.token_type.as_deref(), Some("bearer"));
    }

    #[test]
    fn test_missing_fields_are_errors_only_when_required() {
        let response: TokenResponse = serde_json::from_str(r#"{"access_token":"a"}"#).unwrap();
        let err = response.require_refresh_token().unwrap_err();
        assert!(matches!(err, ConnectorError::TokenExchange(_)));

        let response: TokenResponse = serde_json::from_str(r#"{"refresh_token":"r"}"#).unwrap();
        assert_eq!(response.require_refresh_token().unwrap(), "r");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let long = "é".repeat(MAX_ERROR_BODY);
        let cut = truncate(&long);
        assert!(cut.len() <= MAX_ERROR_BODY);
        assert!(cut.chars().all(|c| c == 'é'));
        assert_eq!(truncate("short"), "short");
    }

    #[tokio::test]
    async fn test_post_form_sends_grant() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                Matcher::UrlEncoded("refresh_token".into(), "r1".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"a1","expires_in":3600}"#)
            .create_async()
            .await;

        let client = Client::new();
        let url = format!("{}/token", server.url());
        let token = post_form(
            &client,
            &url,
            &[("grant_type", "refresh_token"), ("refresh_token", "r1")],
        )
        .await
        .unwrap();

        assert_eq!(token.access_token.as_deref(), Some("a1"));
        assert_eq!(token.expires_in, Some(3600));
    }

    #[tokio::test]
    async fn test_error_status_is_token_exchange_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/token")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;

        let client = Client::new();
        let url = format!("{}/token", server.url());
        let err = post_form(&client, &url, &[("grant_type", "refresh_token")])
            .await
            .unwrap_err();

        assert!(matches!(err, ConnectorError::TokenExchange(_)));
        assert!(err.to_string().contains("400"));
        assert!(err.to_string().contains("invalid_grant"));
    }

    #[tokio::test]
    async fn test_html_body_is_token_exchange_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/token")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let client = Client::new();
        let url = format!("{}/token", server.url());
        let err = get_query(&client, &url, &[("grant_type", "x")])
            .await
            .unwrap_err();

        assert!(err.to_string().contains("unparseable response"));
    }
}
