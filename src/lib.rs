//! credkeeper keeps third-party API credentials fresh.
//!
//! A single JSON credential record in a blob store holds one
//! `{currentToken, oldToken}` pair per platform. Four functions operate on it:
//!
//! ```text
//!   read_tokens ─────────────► store.fetch ──► record (verbatim)
//!   refresh_base_token ──────► store.fetch ──► consent page ──► /1/oauth/token ──► store.persist
//!   refresh_instagram_token ─► store.fetch ──► /refresh_access_token ───────────► store.persist
//!   fetch_base_items ────────► store.fetch ──► /1/oauth/token ──► /1/categories ──► /1/items × N
//! ```
//!
//! Upstream HTTP clients live in the `connectors` crate.

// HTTP gateway
pub mod api;

// Authorization-code acquisition
pub mod authorize;

pub mod config;
pub mod error;

// The four invocable functions
pub mod functions;

// Credential record model and rotation
pub mod record;

// Blob store backends
pub mod store;

pub mod telemetry;

pub use error::{Error, Result};
