//! Instagram: long-lived access token renewal.

pub mod api;

pub use api::{InstagramClient, RenewedToken};

pub const GRAPH_BASE_URL: &str = "https://graph.instagram.com";
pub const REFRESH_PATH: &str = "/refresh_access_token";
pub const GRANT_TYPE: &str = "ig_refresh_token";
