//! Shared test utilities for the Vault client crates.
//!
//! This crate provides:
//! - An in-memory Vault server served over HTTP ([`FakeVault`])
//! - Canned response envelopes for single-route mocks
//! - Proptest generators for paths, shares and JSON bodies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod mocks;

pub use generators::*;
pub use mocks::FakeVault;

use vault_common::{TracingConfig, init_tracing};

/// Install a test-captured `tracing` subscriber once per test binary.
pub fn init_test_tracing() {
    let _ = init_tracing(&TracingConfig::default().with_log_level("debug").with_test_writer());
}
