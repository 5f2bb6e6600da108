//! Obtaining a BASE authorization code.
//!
//! The refresh flow only needs "a code for this consent URL"; how the consent
//! page is walked is up to the [`AuthorizationCodeSource`]. The headless
//! browser source is DOM-coupled and fragile, so a manual source (code pasted
//! into the configuration) can stand in for it without touching the flow.

#[cfg(feature = "browser")]
mod browser;

#[cfg(feature = "browser")]
pub use browser::BrowserCodeSource;

use crate::config::{AuthorizationConfig, CodeSourceKind};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::info;

/// Produces an authorization code for a consent page.
#[async_trait]
pub trait AuthorizationCodeSource: Send + Sync {
    /// Walk the consent flow at `authorize_url` and return the code from the
    /// redirect. Fails with `Error::Automation`.
    async fn authorization_code(&self, authorize_url: &str) -> Result<String>;
}

/// Build the configured source.
pub fn from_config(
    config: &AuthorizationConfig,
    redirect_uri: &str,
) -> Result<Arc<dyn AuthorizationCodeSource>> {
    match config.source {
        CodeSourceKind::Manual => {
            let code = config.code.clone().ok_or_else(|| {
                Error::Config("the manual authorization source needs a code".to_string())
            })?;
            Ok(Arc::new(ManualCodeSource::new(code)))
        }
        #[cfg(feature = "browser")]
        CodeSourceKind::Browser => Ok(Arc::new(BrowserCodeSource::from_config(config, redirect_uri)?)),
        #[cfg(not(feature = "browser"))]
        CodeSourceKind::Browser => {
            let _ = redirect_uri;
            Err(Error::Config(
                "the browser authorization source needs the `browser` feature".to_string(),
            ))
        }
    }
}

/// A code obtained out of band, e.g. by an operator completing the consent
/// page by hand.
pub struct ManualCodeSource {
    code: String,
}

impl ManualCodeSource {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }
}

#[async_trait]
impl AuthorizationCodeSource for ManualCodeSource {
    async fn authorization_code(&self, authorize_url: &str) -> Result<String> {
        info!(authorize_url, "Using configured authorization code");
        if self.code.trim().is_empty() {
            return Err(Error::Automation("configured authorization code is empty".to_string()));
        }
        Ok(self.code.clone())
    }
}

/// Stands in for a source whose configuration is incomplete. Every request
/// fails with the reason it could not be built.
pub struct UnavailableCodeSource {
    reason: String,
}

impl UnavailableCodeSource {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl AuthorizationCodeSource for UnavailableCodeSource {
    async fn authorization_code(&self, _authorize_url: &str) -> Result<String> {
        Err(Error::Config(self.reason.clone()))
    }
}

/// Check that the browser landed on `redirect_uri`, then extract the code.
pub fn redirect_code(current_url: &str, redirect_uri: &str) -> Result<String> {
    if !current_url.starts_with(redirect_uri) {
        return Err(Error::Automation(format!(
            "expected a redirect to {}, browser is at {}",
            redirect_uri, current_url
        )));
    }
    extract_code(current_url)
}

/// Await `step`, failing with `Error::Automation` if it errors or takes
/// longer than `limit`.
pub async fn within<T, E, F>(limit: Duration, what: &str, step: F) -> Result<T>
where
    E: fmt::Display,
    F: Future<Output = std::result::Result<T, E>>,
{
    match timeout(limit, step).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(Error::Automation(format!("{} failed: {}", what, e))),
        Err(_) => Err(Error::Automation(format!("{} did not finish within {:?}", what, limit))),
    }
}

/// Pull the code out of a redirect URL: the text between the first `=` and
/// the `&` that follows it (or the end of the URL).
pub fn extract_code(redirect_url: &str) -> Result<String> {
    let (_, rest) = redirect_url.split_once('=').ok_or_else(|| {
        Error::Automation(format!("redirect URL carries no code: {}", redirect_url))
    })?;
    let code = rest.split('&').next().unwrap_or_default();
    if code.is_empty() {
        return Err(Error::Automation(format!(
            "redirect URL has an empty code: {}",
            redirect_url
        )));
    }
    Ok(code.to_string())
}
