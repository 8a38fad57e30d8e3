//! Canned response bodies.
//!
//! Each function returns the JSON a real server sends for one route, for
//! tests that mock a single request with `wiremock`.

use serde_json::{Value, json};

/// `GET /sys/seal-status`.
#[must_use]
pub fn seal_status(sealed: bool, threshold: u32, shares: u32, progress: u32) -> Value {
    json!({
        "sealed": sealed,
        "t": threshold,
        "n": shares,
        "progress": progress,
    })
}

/// `PUT /sys/init`.
#[must_use]
pub fn init_response(keys: &[&str], root_token: &str) -> Value {
    json!({
        "keys": keys,
        "root_token": root_token,
    })
}

/// A secret read envelope.
#[must_use]
pub fn secret(data: Value) -> Value {
    json!({
        "lease_id": "",
        "lease_duration": 2_592_000,
        "renewable": false,
        "auth": null,
        "data": data,
    })
}

/// A leased secret, e.g. dynamic credentials.
#[must_use]
pub fn leased_secret(lease_id: &str, lease_duration: u64, data: Value) -> Value {
    json!({
        "lease_id": lease_id,
        "lease_duration": lease_duration,
        "renewable": true,
        "data": data,
    })
}

/// An `auth` envelope from a login or token creation.
#[must_use]
pub fn login(client_token: &str, policies: &[&str]) -> Value {
    json!({
        "lease_id": "",
        "lease_duration": 0,
        "renewable": false,
        "auth": {
            "client_token": client_token,
            "policies": policies,
            "metadata": {},
            "lease_duration": 3600,
            "renewable": true,
        },
    })
}

/// A `data` envelope from a token lookup.
#[must_use]
pub fn token_lookup(id: &str, policies: &[&str]) -> Value {
    json!({
        "lease_id": "",
        "lease_duration": 0,
        "renewable": false,
        "data": {
            "id": id,
            "policies": policies,
            "path": "auth/token/create",
            "meta": null,
            "display_name": "token",
            "num_uses": 0,
        },
    })
}

/// `GET /sys/mounts` with the mounts every server starts with.
#[must_use]
pub fn default_mounts() -> Value {
    json!({
        "secret/": {"type": "generic", "description": "generic secret storage", "config": {}},
        "cubbyhole/": {"type": "cubbyhole", "description": "per-token private secret storage", "config": {}},
        "sys/": {"type": "system", "description": "system endpoints used for control, policy and debugging", "config": {}},
    })
}

/// `GET /sys/auth` with the token backend only.
#[must_use]
pub fn default_auth() -> Value {
    json!({
        "token/": {"type": "token", "description": "token based credentials"},
    })
}

/// A policy read.
#[must_use]
pub fn policy(name: &str, rules: &str) -> Value {
    json!({ "name": name, "rules": rules })
}

/// A `LIST` answer.
#[must_use]
pub fn key_list(keys: &[&str]) -> Value {
    json!({ "data": { "keys": keys } })
}

/// An error envelope.
#[must_use]
pub fn errors(messages: &[&str]) -> Value {
    json!({ "errors": messages })
}
