use std::fmt;

pub const API_BASE_URL: &str = "https://api.thebase.in";
pub const DEFAULT_REDIRECT_URI: &str = "https://musu.official.ec";
pub const DEFAULT_SCOPE: &str = "read_items";

pub const AUTHORIZE_PATH: &str = "/1/oauth/authorize";
pub const TOKEN_PATH: &str = "/1/oauth/token";
pub const CATEGORIES_PATH: &str = "/1/categories";
pub const ITEMS_PATH: &str = "/1/items";

/// Images returned per item by the items listing.
pub const MAX_IMAGE_NO: u32 = 10;

/// Registered BASE application.
#[derive(Clone)]
pub struct BaseApp {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scope: String,
}

impl BaseApp {
    /// Build the consent page URL for this application under `api_base`.
    pub fn authorize_url(&self, api_base: &str) -> String {
        format!(
            "{}{}?response_type=code&client_id={}&redirect_uri={}&scope={}",
            api_base.trim_end_matches('/'),
            AUTHORIZE_PATH,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&self.scope),
        )
    }
}

impl fmt::Debug for BaseApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseApp")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("scope", &self.scope)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> BaseApp {
        BaseApp {
            client_id: "client 1".to_string(),
            client_secret: "s3cret".to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
        }
    }

    #[test]
    fn test_authorize_url() {
        let url = app().authorize_url("https://api.thebase.in/");

        assert!(url.starts_with("https://api.thebase.in/1/oauth/authorize?"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("client_id=client%201"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fmusu.official.ec"));
        assert!(url.contains("scope=read_items"));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", app());
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("<redacted>"));
    }
}
