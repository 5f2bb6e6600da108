use std::collections::BTreeMap;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use super::config::{BaseApp, CATEGORIES_PATH, ITEMS_PATH, MAX_IMAGE_NO, TOKEN_PATH};
use crate::oauth::{self, truncate};
use crate::{ConnectorError, Result, USER_AGENT};

/// Items per category, keyed by category id.
pub type Catalog = BTreeMap<u64, Vec<Value>>;

/// BASE category.
#[derive(Debug, Deserialize)]
pub struct Category {
    pub category_id: u64,
}

#[derive(Deserialize)]
struct CategoriesResponse {
    categories: Vec<Category>,
}

#[derive(Deserialize)]
struct ItemsResponse {
    items: Vec<Value>,
}

/// HTTP client for the BASE OAuth and catalog API.
pub struct BaseClient {
    app: BaseApp,
    http_client: Client,
    base_url: String,
}

impl BaseClient {
    /// Create a client against `base_url` (`API_BASE_URL` in production).
    pub fn with_base_url(app: BaseApp, base_url: String) -> Result<Self> {
        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(ConnectorError::Client)?;
        Ok(Self {
            app,
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Consent page URL an authorization code is obtained from.
    pub fn authorize_url(&self) -> String {
        self.app.authorize_url(&self.base_url)
    }

    /// Exchange an authorization code for a refresh token.
    pub async fn exchange_authorization_code(&self, code: &str) -> Result<String> {
        let token = oauth::post_form(
            &self.http_client,
            &self.token_url(),
            &[
                ("grant_type", "authorization_code"),
                ("client_id", &self.app.client_id),
                ("client_secret", &self.app.client_secret),
                ("code", code),
                ("redirect_uri", &self.app.redirect_uri),
            ],
        )
        .await?;

        token.require_refresh_token()
    }

    /// Exchange a refresh token for a short-lived access token.
    ///
    /// A rotated refresh token in the response is ignored.
    pub async fn exchange_refresh_token(&self, refresh_token: &str) -> Result<String> {
        let token = oauth::post_form(
            &self.http_client,
            &self.token_url(),
            &[
                ("grant_type", "refresh_token"),
                ("client_id", &self.app.client_id),
                ("client_secret", &self.app.client_secret),
                ("refresh_token", refresh_token),
                ("redirect_uri", &self.app.redirect_uri),
            ],
        )
        .await?;

        if let Some(expires_in) = token.expires_in {
            tracing::debug!(expires_in, "Issued BASE access token");
        }
        token.require_access_token()
    }

    /// Fetch every category of the shop.
    pub async fn fetch_categories(&self, access_token: &str) -> Result<Vec<Category>> {
        let url = format!("{}{}", self.base_url, CATEGORIES_PATH);
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| ConnectorError::UpstreamApi(format!("categories request failed: {}", e)))?;

        let body: CategoriesResponse = read_json(response, "categories").await?;
        Ok(body.categories)
    }

    /// Fetch the items of one category, newest first.
    pub async fn fetch_items(&self, access_token: &str, category_id: u64) -> Result<Vec<Value>> {
        let url = format!("{}{}", self.base_url, ITEMS_PATH);
        let max_image_no = MAX_IMAGE_NO.to_string();
        let category = category_id.to_string();
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(access_token)
            .query(&[
                ("max_image_no", max_image_no.as_str()),
                ("order", "created"),
                ("sort", "desc"),
                ("category_id", category.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ConnectorError::UpstreamApi(format!("items request failed: {}", e)))?;

        let body: ItemsResponse = read_json(response, "items").await?;
        Ok(body.items)
    }

    /// Fetch the categories, then the items of each one.
    pub async fn fetch_catalog(&self, access_token: &str) -> Result<Catalog> {
        let categories = self.fetch_categories(access_token).await?;
        tracing::debug!(count = categories.len(), "Fetched BASE categories");

        let mut catalog = Catalog::new();
        for category in &categories {
            let items = self.fetch_items(access_token, category.category_id).await?;
            tracing::debug!(
                category_id = category.category_id,
                count = items.len(),
                "Fetched BASE items"
            );
            catalog.insert(category.category_id, items);
        }

        Ok(catalog)
    }

    fn token_url(&self) -> String {
        format!("{}{}", self.base_url, TOKEN_PATH)
    }
}

/// Map error statuses to descriptive errors, then decode the JSON body.
///
/// - 401 → access token expired or invalid
/// - Other non-2xx → generic API error with the body
async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    what: &str,
) -> Result<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ConnectorError::UpstreamApi(format!("failed to read {} body: {}", what, e)))?;

    match status {
        StatusCode::UNAUTHORIZED => {
            return Err(ConnectorError::UpstreamApi(format!(
                "BASE rejected the {} request: access token expired or invalid",
                what
            )))
        }
        s if !s.is_success() => {
            return Err(ConnectorError::UpstreamApi(format!(
                "BASE {} request failed with status {}: {}",
                what,
                s,
                truncate(&body)
            )))
        }
        _ => {}
    }

    serde_json::from_str(&body)
        .map_err(|e| ConnectorError::UpstreamApi(format!("malformed {} response: {}", what, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::config::{DEFAULT_REDIRECT_URI, DEFAULT_SCOPE};
    use mockito::{Matcher, Server};

    fn app() -> BaseApp {
        BaseApp {
            client_id: "cid".to_string(),
            client_secret: "csecret".to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
        }
    }

    fn items_query(category_id: &str) -> Matcher {
        Matcher::AllOf(vec![
            Matcher::UrlEncoded("max_image_no".into(), "10".into()),
            Matcher::UrlEncoded("order".into(), "created".into()),
            Matcher::UrlEncoded("sort".into(), "desc".into()),
            Matcher::UrlEncoded("category_id".into(), category_id.into()),
        ])
    }

    #[tokio::test]
    async fn test_exchange_authorization_code() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/1/oauth/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                Matcher::UrlEncoded("client_id".into(), "cid".into()),
                Matcher::UrlEncoded("client_secret".into(), "csecret".into()),
                Matcher::UrlEncoded("code".into(), "code123".into()),
                Matcher::UrlEncoded("redirect_uri".into(), DEFAULT_REDIRECT_URI.into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"acc","refresh_token":"ref","expires_in":3600}"#)
            .create_async()
            .await;

        let client = BaseClient::with_base_url(app(), server.url()).unwrap();
        let refresh_token = client.exchange_authorization_code("code123").await.unwrap();

        assert_eq!(refresh_token, "ref");
    }

    #[tokio::test]
    async fn test_exchange_authorization_code_without_refresh_token() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/1/oauth/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"acc"}"#)
            .create_async()
            .await;

        let client = BaseClient::with_base_url(app(), server.url()).unwrap();
        let err = client.exchange_authorization_code("code123").await.unwrap_err();

        assert!(matches!(err, ConnectorError::TokenExchange(_)));
        assert!(err.to_string().contains("refresh_token"));
    }

    #[tokio::test]
    async fn test_exchange_refresh_token() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/1/oauth/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                Matcher::UrlEncoded("refresh_token".into(), "stored".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"short-lived","refresh_token":"rotated","expires_in":3600}"#)
            .create_async()
            .await;

        let client = BaseClient::with_base_url(app(), server.url()).unwrap();
        let access_token = client.exchange_refresh_token("stored").await.unwrap();

        assert_eq!(access_token, "short-lived");
    }

    #[tokio::test]
    async fn test_fetch_catalog_aggregates_by_category() {
        let mut server = Server::new_async().await;
        let _categories = server
            .mock("GET", "/1/categories")
            .match_header("authorization", "Bearer acc")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"categories":[{"category_id":1,"name":"Tops"},{"category_id":2}]}"#)
            .create_async()
            .await;
        let _items_1 = server
            .mock("GET", "/1/items")
            .match_query(items_query("1"))
            .match_header("authorization", "Bearer acc")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"items":[{"item_id":11},{"item_id":10}]}"#)
            .create_async()
            .await;
        let _items_2 = server
            .mock("GET", "/1/items")
            .match_query(items_query("2"))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"items":[{"item_id":23},{"item_id":21},{"item_id":22}]}"#)
            .create_async()
            .await;

        let client = BaseClient::with_base_url(app(), server.url()).unwrap();
        let catalog = client.fetch_catalog("acc").await.unwrap();

        assert_eq!(catalog.len(), 2);
        let ids = |category: u64| -> Vec<u64> {
            catalog[&category]
                .iter()
                .map(|item| item["item_id"].as_u64().unwrap())
                .collect()
        };
        assert_eq!(ids(1), vec![11, 10]);
        assert_eq!(ids(2), vec![23, 21, 22]);

        let json = serde_json::to_value(&catalog).unwrap();
        assert_eq!(json["2"][0]["item_id"], 23);
    }

    #[tokio::test]
    async fn test_401_auth_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/1/categories")
            .with_status(401)
            .with_body(r#"{"error":"invalid_token"}"#)
            .create_async()
            .await;

        let client = BaseClient::with_base_url(app(), server.url()).unwrap();
        let err = client.fetch_categories("expired").await.unwrap_err();

        assert!(matches!(err, ConnectorError::UpstreamApi(_)));
        assert!(err.to_string().contains("expired or invalid"));
    }

    #[tokio::test]
    async fn test_malformed_items_payload() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/1/items")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"no items key"}"#)
            .create_async()
            .await;

        let client = BaseClient::with_base_url(app(), server.url()).unwrap();
        let err = client.fetch_items("acc", 7).await.unwrap_err();

        assert!(matches!(err, ConnectorError::UpstreamApi(_)));
        assert!(err.to_string().contains("malformed items response"));
    }

    #[test]
    fn test_authorize_url_uses_client_base_url() {
        let client = BaseClient::with_base_url(app(), "http://127.0.0.1:9/".to_string()).unwrap();
        assert!(client
            .authorize_url()
            .starts_with("http://127.0.0.1:9/1/oauth/authorize?response_type=code"));
    }
}
