//! HTTP clients for the platforms whose credentials credkeeper maintains.
//!
//! Each platform hardcodes its own flow; there is no generic OAuth client.
//!
//! ```text
//! ┌──────────────────────────────┐   ┌──────────────────────────────┐
//! │  base::BaseClient            │   │  instagram::InstagramClient  │
//! │  - authorization_code grant  │   │  - ig_refresh_token          │
//! │  - refresh_token grant       │   └──────────────────────────────┘
//! │  - categories / items        │
//! └──────────────────────────────┘
//!              ↓
//! ┌──────────────────────────────┐
//! │  oauth (token endpoint I/O)  │
//! └──────────────────────────────┘
//! ```
//!
//! Every client takes its base URL explicitly so tests can point it at a
//! mock server.

pub mod base;
mod error;
pub mod instagram;
pub mod oauth;

pub use error::ConnectorError;

/// User agent sent on every upstream request.
pub const USER_AGENT: &str = concat!("credkeeper/", env!("CARGO_PKG_VERSION"));

pub type Result<T> = std::result::Result<T, ConnectorError>;
