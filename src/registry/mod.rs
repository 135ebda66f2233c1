//! Rate-limited fetchers for registry and package-metadata endpoints.

pub mod error;
pub mod files;
pub mod limiter;
pub mod npm;
pub mod types;
