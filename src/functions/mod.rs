//! The four credkeeper functions.
//!
//! Each one is a straight line: read the credential record, call one or two
//! upstream endpoints, and (for refreshes) write the record back. Nothing is
//! retried and nothing is cached between invocations; every call builds its
//! own HTTP clients.

use crate::authorize::{self, AuthorizationCodeSource, UnavailableCodeSource};
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::record::{CredentialRecord, Platform};
use crate::store::{self, CredentialStore};
use chrono::Utc;
use connectors::base::{BaseApp, BaseClient, Catalog};
use connectors::instagram::InstagramClient;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, info_span, warn, Instrument, Span};
use uuid::Uuid;


/// A function that can be invoked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Function {
    /// Return the whole credential record.
    ReadTokens,
    /// Renew the BASE refresh token through the authorization-code grant.
    RefreshBaseToken,
    /// Renew the long-lived Instagram token.
    RefreshInstagramToken,
    /// List BASE items grouped by category.
    FetchBaseItems,
}

impl Function {
    pub fn name(&self) -> &'static str {
        match self {
            Function::ReadTokens => "read_tokens",
            Function::RefreshBaseToken => "refresh_base_token",
            Function::RefreshInstagramToken => "refresh_instagram_token",
            Function::FetchBaseItems => "fetch_base_items",
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-invocation logging context.
///
/// Everything a function logs happens inside this span, so concurrent
/// invocations can be told apart by `invocation_id`.
pub struct Invocation {
    id: Uuid,
    function: Function,
    span: Span,
}

impl Invocation {
    pub fn new(function: Function) -> Self {
        let id = Uuid::new_v4();
        let span = info_span!("invocation", function = function.name(), invocation_id = %id);
        Self { id, function, span }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn function(&self) -> Function {
        self.function
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}

/// Shared, read-only dependencies of every function.
#[derive(Clone)]
pub struct Functions {
    config: Arc<AppConfig>,
    store: CredentialStore,
    code_source: Arc<dyn AuthorizationCodeSource>,
}

impl Functions {
    pub fn new(
        config: Arc<AppConfig>,
        store: CredentialStore,
        code_source: Arc<dyn AuthorizationCodeSource>,
    ) -> Self {
        Self {
            config,
            store,
            code_source,
        }
    }

    /// Wire up the configured store backend and code source.
    ///
    /// A code source that cannot be built only disables the BASE refresh: the
    /// other functions do not need one, so the error is reported when that
    /// function runs.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let blobs = store::from_config(&config.store)?;
        let store = CredentialStore::new(blobs, &config.store.bucket, &config.store.object);
        let code_source = match authorize::from_config(&config.authorization, &config.base.redirect_uri) {
            Ok(source) => source,
            Err(e) => {
                warn!(error = %e, "BASE token refresh unavailable");
                let reason = match e {
                    Error::Config(reason) => reason,
                    other => other.to_string(),
                };
                Arc::new(UnavailableCodeSource::new(reason))
            }
        };
        Ok(Self::new(Arc::new(config), store, code_source))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run `function` and return its JSON body, if it has one.
    pub async fn invoke(&self, invocation: &Invocation) -> Result<Option<Value>> {
        match invocation.function() {
            Function::ReadTokens => {
                let record = self.read_tokens(invocation).await?;
                Ok(Some(Value::Object(record.as_map().clone())))
            }
            Function::RefreshBaseToken => {
                self.refresh_base_token(invocation).await?;
                Ok(None)
            }
            Function::RefreshInstagramToken => {
                self.refresh_instagram_token(invocation).await?;
                Ok(None)
            }
            Function::FetchBaseItems => {
                let catalog = self.fetch_base_items(invocation).await?;
                let body = serde_json::to_value(&catalog)
                    .map_err(|e| Error::UpstreamApi(format!("failed to encode items: {}", e)))?;
                Ok(Some(body))
            }
        }
    }

    /// Return the record exactly as stored, tokens included.
    pub async fn read_tokens(&self, invocation: &Invocation) -> Result<CredentialRecord> {
        traced(invocation, self.store.fetch()).await
    }

    /// Log in to BASE, exchange the authorization code for a refresh token,
    /// and rotate it into the record.
    pub async fn refresh_base_token(&self, invocation: &Invocation) -> Result<()> {
        traced(invocation, async {
            // Checked before any upstream call so a missing record costs no code.
            let mut record = self.store.fetch().await?;
            record.platform(Platform::Base)?;

            let client = self.base_client()?;
            let code = self
                .code_source
                .authorization_code(&client.authorize_url())
                .await?;
            let refresh_token = client.exchange_authorization_code(&code).await?;

            record.rotate(Platform::Base, &refresh_token, Utc::now())?;
            self.store.persist(&record).await?;
            info!(platform = %Platform::Base, "Stored new refresh token");
            Ok::<(), Error>(())
        })
        .await
    }

    /// Renew the long-lived Instagram token and rotate it into the record.
    pub async fn refresh_instagram_token(&self, invocation: &Invocation) -> Result<()> {
        traced(invocation, async {
            let mut record = self.store.fetch().await?;
            let current = record.current_token(Platform::Instagram)?;

            let client = InstagramClient::with_base_url(self.config.instagram.api_url.clone())?;
            let renewed = client.refresh_long_lived_token(&current).await?;
            // Expiry is reported upstream but not tracked.
            info!(expires_in = ?renewed.expires_in, "Instagram token renewed");

            record.rotate(Platform::Instagram, &renewed.access_token, Utc::now())?;
            self.store.persist(&record).await?;
            info!(platform = %Platform::Instagram, "Stored new access token");
            Ok::<(), Error>(())
        })
        .await
    }

    /// Trade the stored refresh token for an access token, then list every
    /// category's items. The record is not written.
    pub async fn fetch_base_items(&self, invocation: &Invocation) -> Result<Catalog> {
        traced(invocation, async {
            let record = self.store.fetch().await?;
            let refresh_token = record.current_token(Platform::Base)?;

            let client = self.base_client()?;
            let access_token = client.exchange_refresh_token(&refresh_token).await?;
            let catalog = client.fetch_catalog(&access_token).await?;

            info!(
                categories = catalog.len(),
                items = catalog.values().map(Vec::len).sum::<usize>(),
                "Fetched BASE catalog"
            );
            Ok::<Catalog, Error>(catalog)
        })
        .await
    }

    fn base_client(&self) -> Result<BaseClient> {
        let base = &self.config.base;
        for (name, value) in [
            ("base.client_id", &base.client_id),
            ("base.client_secret", &base.client_secret),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{} is not configured", name)));
            }
        }
        let app = BaseApp {
            client_id: base.client_id.clone(),
            client_secret: base.client_secret.clone(),
            redirect_uri: base.redirect_uri.clone(),
            scope: base.scope.clone(),
        };
        Ok(BaseClient::with_base_url(app, base.api_url.clone())?)
    }
}

/// Run `work` inside the invocation span, logging start, finish, and the
/// error (once) if it fails.
async fn traced<T, F>(invocation: &Invocation, work: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    async move {
        let started = Instant::now();
        info!("Invocation started");
        let result = work.await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => info!(elapsed_ms, "Invocation finished"),
            Err(e) => error!(elapsed_ms, kind = e.kind(), error = %e, "Invocation failed"),
        }
        result
    }
    .instrument(invocation.span().clone())
    .await
}
