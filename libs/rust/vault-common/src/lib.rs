//! Shared plumbing for the Vault client crates.
//!
//! This crate provides:
//! - HTTP client configuration and building, including TLS material
//! - The error raised while building a client
//! - `tracing` subscriber setup

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod http;
pub mod tracing_config;

pub use error::HttpBuildError;
pub use http::{HttpConfig, TlsConfig, build_http_client};
pub use tracing_config::{TracingConfig, init_tracing};
