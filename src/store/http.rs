use super::BlobStore;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};

/// Objects behind a path-style HTTP endpoint: `GET`/`PUT {endpoint}/{bucket}/{key}`.
///
/// Works with any object server that speaks plain whole-object GET and PUT
/// (MinIO or S3 with anonymous or pre-authorized access, static file servers
/// with upload support).
pub struct HttpBlobStore {
    http_client: Client,
    endpoint: String,
    bearer_token: Option<String>,
}

impl HttpBlobStore {
    pub fn new(endpoint: String, bearer_token: Option<String>) -> Result<Self> {
        let http_client = Client::builder()
            .user_agent(connectors::USER_AGENT)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http_client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bearer_token,
        })
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        let key = key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/{}/{}", self.endpoint, urlencoding::encode(bucket), key)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let url = self.object_url(bucket, key);
        let response = self
            .authorize(self.http_client.get(&url))
            .send()
            .await
            .map_err(|e| Error::StoreAccess(format!("GET {} failed: {}", url, e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(Error::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            s if !s.is_success() => Err(Error::StoreAccess(format!("GET {} returned {}", url, s))),
            _ => {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| Error::StoreAccess(format!("failed to read {}: {}", url, e)))?;
                Ok(bytes.to_vec())
            }
        }
    }

    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        let url = self.object_url(bucket, key);
        let response = self
            .authorize(self.http_client.put(&url))
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| Error::StoreAccess(format!("PUT {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::StoreAccess(format!("PUT {} returned {}", url, status)));
        }
        Ok(())
    }
}
