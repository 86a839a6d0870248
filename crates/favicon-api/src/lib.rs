pub mod cache;
pub mod config;
pub mod discovery;
pub mod errors;
pub mod fetch;
pub mod normalize;
pub mod services;
pub mod sniff;
pub mod store;
pub mod utils;
pub mod web;

/// Process-wide service version, embedded in cache keys and object metadata.
/// Bumping the crate version forces every cached favicon to be recomputed.
pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");
