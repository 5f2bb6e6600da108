//! Process configuration.
//!
//! Loaded once at startup, either from `CREDKEEPER_*` environment variables or
//! from a TOML file, validated, then shared read-only with every function.

use anyhow::{bail, Context, Result};
use connectors::base::config::{API_BASE_URL, DEFAULT_REDIRECT_URI, DEFAULT_SCOPE};
use connectors::instagram::GRAPH_BASE_URL;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Complete credkeeper configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    pub store: StoreConfig,
    #[serde(default)]
    pub base: BaseConfig,
    #[serde(default)]
    pub instagram: InstagramConfig,
    #[serde(default)]
    pub authorization: AuthorizationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

/// Where the credential record lives.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Root directory for the `file` backend.
    #[serde(default = "default_store_root")]
    pub root: PathBuf,
    /// Object endpoint for the `http` backend; custom S3 endpoint (MinIO,
    /// LocalStack) for the `s3` backend.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Bearer token sent to the `http` backend.
    #[serde(default)]
    pub bearer_token: Option<String>,
    /// S3 region. Falls back to `AWS_DEFAULT_REGION`/`AWS_REGION`.
    #[serde(default)]
    pub region: Option<String>,
    /// S3 credentials. Fall back to `AWS_ACCESS_KEY_ID`/`AWS_SECRET_ACCESS_KEY`.
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    pub bucket: String,
    pub object: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    File,
    Http,
    S3,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "http" => Ok(Self::Http),
            "s3" => Ok(Self::S3),
            "memory" => Ok(Self::Memory),
            other => bail!("unknown store backend '{}' (expected file, http, s3 or memory)", other),
        }
    }
}

/// BASE application registration.
///
/// Only the BASE functions need the client credentials; they are checked
/// when one of those runs, not at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct BaseConfig {
    #[serde(default = "default_base_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    #[serde(default = "default_scope")]
    pub scope: String,
}

impl Default for BaseConfig {
    fn default() -> Self {
        Self {
            api_url: default_base_api_url(),
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: default_redirect_uri(),
            scope: default_scope(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstagramConfig {
    #[serde(default = "default_instagram_api_url")]
    pub api_url: String,
}

impl Default for InstagramConfig {
    fn default() -> Self {
        Self {
            api_url: default_instagram_api_url(),
        }
    }
}

/// How the BASE authorization code is obtained.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizationConfig {
    #[serde(default)]
    pub source: CodeSourceKind,
    /// BASE login e-mail (browser source)
    #[serde(default)]
    pub email: Option<String>,
    /// BASE login password (browser source)
    #[serde(default)]
    pub password: Option<String>,
    /// Pre-obtained authorization code (manual source)
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub chrome_executable: Option<PathBuf>,
    #[serde(default = "default_page_load_timeout")]
    pub page_load_timeout_secs: u64,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            source: CodeSourceKind::default(),
            email: None,
            password: None,
            code: None,
            chrome_executable: None,
            page_load_timeout_secs: default_page_load_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeSourceKind {
    #[default]
    Browser,
    Manual,
}

impl std::str::FromStr for CodeSourceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "browser" => Ok(Self::Browser),
            "manual" => Ok(Self::Manual),
            other => bail!("unknown authorization code source '{}' (expected browser or manual)", other),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_listen_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_store_root() -> PathBuf {
    PathBuf::from("data")
}

fn default_base_api_url() -> String {
    API_BASE_URL.to_string()
}

fn default_redirect_uri() -> String {
    DEFAULT_REDIRECT_URI.to_string()
}

fn default_scope() -> String {
    DEFAULT_SCOPE.to_string()
}

fn default_instagram_api_url() -> String {
    GRAPH_BASE_URL.to_string()
}

fn default_page_load_timeout() -> u64 {
    5
}

impl AppConfig {
    /// Build from `CREDKEEPER_*` environment variables and validate.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source (the process environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let require = |name: &str| get(name).with_context(|| format!("{} is required", name));

        let mut authorization = AuthorizationConfig::default();
        if let Some(v) = get("CREDKEEPER_AUTH_CODE_SOURCE") {
            authorization.source = v.parse()?;
        }
        authorization.email = get("CREDKEEPER_BASE_EMAIL");
        authorization.password = get("CREDKEEPER_BASE_PASSWORD");
        authorization.code = get("CREDKEEPER_BASE_AUTH_CODE");
        authorization.chrome_executable = get("CREDKEEPER_CHROME_EXECUTABLE").map(PathBuf::from);
        if let Some(v) = get("CREDKEEPER_PAGE_LOAD_TIMEOUT_SECS") {
            authorization.page_load_timeout_secs = v
                .parse()
                .context("CREDKEEPER_PAGE_LOAD_TIMEOUT_SECS must be a whole number of seconds")?;
        }

        let config = Self {
            server: ServerConfig {
                listen_addr: get("CREDKEEPER_LISTEN_ADDR").unwrap_or_else(default_listen_addr),
            },
            log_level: get("CREDKEEPER_LOG_LEVEL").unwrap_or_else(default_log_level),
            store: StoreConfig {
                backend: match get("CREDKEEPER_STORE_BACKEND") {
                    Some(v) => v.parse()?,
                    None => StoreBackend::default(),
                },
                root: get("CREDKEEPER_STORE_ROOT")
                    .map(PathBuf::from)
                    .unwrap_or_else(default_store_root),
                endpoint: get("CREDKEEPER_STORE_ENDPOINT"),
                bearer_token: get("CREDKEEPER_STORE_TOKEN"),
                region: get("CREDKEEPER_STORE_REGION"),
                access_key_id: get("CREDKEEPER_STORE_ACCESS_KEY_ID"),
                secret_access_key: get("CREDKEEPER_STORE_SECRET_ACCESS_KEY"),
                bucket: require("CREDKEEPER_STORE_BUCKET")?,
                object: require("CREDKEEPER_STORE_OBJECT")?,
            },
            base: BaseConfig {
                api_url: get("CREDKEEPER_BASE_API_URL").unwrap_or_else(default_base_api_url),
                client_id: get("CREDKEEPER_BASE_CLIENT_ID").unwrap_or_default(),
                client_secret: get("CREDKEEPER_BASE_CLIENT_SECRET").unwrap_or_default(),
                redirect_uri: get("CREDKEEPER_BASE_REDIRECT_URI").unwrap_or_else(default_redirect_uri),
                scope: get("CREDKEEPER_BASE_SCOPE").unwrap_or_else(default_scope),
            },
            instagram: InstagramConfig {
                api_url: get("CREDKEEPER_INSTAGRAM_API_URL")
                    .unwrap_or_else(default_instagram_api_url),
            },
            authorization,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file and validate.
    pub fn load_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the cross-field requirements serde cannot express.
    ///
    /// Only what every function needs is checked here. BASE client
    /// credentials and the authorization code source are checked when a BASE
    /// function runs, so a deployment that only reads tokens or refreshes
    /// Instagram does not have to configure them.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("store.bucket", &self.store.bucket),
            ("store.object", &self.store.object),
        ] {
            if value.trim().is_empty() {
                bail!("{} must not be empty", name);
            }
        }

        for (name, url) in [
            ("base.api_url", &self.base.api_url),
            ("instagram.api_url", &self.instagram.api_url),
        ] {
            reqwest::Url::parse(url).with_context(|| format!("{} is not a valid URL", name))?;
        }

        if self.store.backend == StoreBackend::Http {
            let endpoint = self
                .store
                .endpoint
                .as_deref()
                .context("store.endpoint is required for the http store backend")?;
            reqwest::Url::parse(endpoint).context("store.endpoint is not a valid URL")?;
        }

        if self.store.backend == StoreBackend::S3 {
            if let Some(endpoint) = self.store.endpoint.as_deref() {
                reqwest::Url::parse(endpoint).context("store.endpoint is not a valid URL")?;
            }
            if self.store.access_key_id.is_some() != self.store.secret_access_key.is_some() {
                bail!("store.access_key_id and store.secret_access_key must be set together");
            }
        }

        if self.authorization.page_load_timeout_secs == 0 {
            bail!("authorization.page_load_timeout_secs must be positive");
        }

        Ok(())
    }
}
