//! BASE e-commerce platform: OAuth grants and catalog listing.

pub mod api;
pub mod config;

pub use api::{BaseClient, Catalog, Category};
pub use config::BaseApp;
