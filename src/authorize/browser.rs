//! Headless Chrome walk through the BASE login and consent page.

use super::{redirect_code, within, AuthorizationCodeSource};
use crate::config::AuthorizationConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::{Element, Page};
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

const MAIL_FIELD: &str = r#"[name="data[User][mail_address]"]"#;
const PASSWORD_FIELD: &str = r#"[name="data[User][password]"]"#;
const CONSENT_BUTTON: &str = r#"[name="auth_yes"]"#;

const CHROME_ARGS: [&str; 4] = [
    "--disable-gpu",
    "--hide-scrollbars",
    "--ignore-certificate-errors",
    "--single-process",
];

/// Logs into BASE with stored credentials and accepts the consent prompt.
pub struct BrowserCodeSource {
    email: String,
    password: String,
    redirect_uri: String,
    chrome_executable: Option<PathBuf>,
    page_load_timeout: Duration,
}

impl BrowserCodeSource {
    pub fn from_config(config: &AuthorizationConfig, redirect_uri: &str) -> Result<Self> {
        let (Some(email), Some(password)) = (config.email.clone(), config.password.clone()) else {
            return Err(Error::Config(
                "the browser authorization source needs the BASE login email and password"
                    .to_string(),
            ));
        };
        Ok(Self {
            email,
            password,
            redirect_uri: redirect_uri.to_string(),
            chrome_executable: config.chrome_executable.clone(),
            page_load_timeout: Duration::from_secs(config.page_load_timeout_secs),
        })
    }

    async fn walk_consent_page(&self, browser: &Browser, authorize_url: &str) -> Result<String> {
        let page = within(
            self.page_load_timeout,
            "consent page load",
            browser.new_page(authorize_url),
        )
        .await?;

        fill(&page, MAIL_FIELD, &self.email).await?;
        fill(&page, PASSWORD_FIELD, &self.password).await?;

        debug!("Submitting BASE consent form");
        find(&page, CONSENT_BUTTON)
            .await?
            .click()
            .await
            .map_err(|e| Error::Automation(format!("failed to click consent button: {}", e)))?;

        within(
            self.page_load_timeout,
            "redirect after consent",
            page.wait_for_navigation(),
        )
        .await?;

        let current_url = page
            .url()
            .await
            .map_err(|e| Error::Automation(format!("failed to read page URL: {}", e)))?
            .ok_or_else(|| Error::Automation("page has no URL after consent".to_string()))?;

        redirect_code(&current_url, &self.redirect_uri)
    }
}

async fn find(page: &Page, selector: &str) -> Result<Element> {
    page.find_element(selector)
        .await
        .map_err(|e| Error::Automation(format!("form element {} not found: {}", selector, e)))
}

async fn fill(page: &Page, selector: &str, value: &str) -> Result<()> {
    let field = find(page, selector).await?;
    field
        .click()
        .await
        .map_err(|e| Error::Automation(format!("failed to focus {}: {}", selector, e)))?;
    field
        .type_str(value)
        .await
        .map_err(|e| Error::Automation(format!("failed to type into {}: {}", selector, e)))?;
    Ok(())
}

#[async_trait]
impl AuthorizationCodeSource for BrowserCodeSource {
    async fn authorization_code(&self, authorize_url: &str) -> Result<String> {
        info!("Launching headless browser for BASE consent");

        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(880, 996)
            .request_timeout(self.page_load_timeout)
            .args(CHROME_ARGS);
        if let Some(path) = &self.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder
            .build()
            .map_err(|e| Error::Automation(format!("invalid browser configuration: {}", e)))?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| Error::Automation(format!("failed to launch browser: {}", e)))?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let result = self.walk_consent_page(&browser, authorize_url).await;

        if let Err(e) = browser.close().await {
            warn!(error = %e, "Failed to close browser");
        }
        if let Err(e) = browser.wait().await {
            warn!(error = %e, "Failed to reap browser process");
        }
        handler_task.abort();

        if result.is_ok() {
            info!("Obtained BASE authorization code");
        }
        result
    }
}
