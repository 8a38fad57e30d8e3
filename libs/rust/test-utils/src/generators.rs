//! Shared proptest generators.

use proptest::prelude::*;
use serde_json::{Map, Value};

/// Mount names: lowercase segments, no slashes.
pub fn mount_name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{1,15}"
}

/// Secret keys of one to three segments.
pub fn secret_key_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z][a-z0-9_]{0,10}", 1..4).prop_map(|segments| segments.join("/"))
}

/// Paths as callers write them, with or without a leading slash.
pub fn api_path_strategy() -> impl Strategy<Value = String> {
    (any::<bool>(), secret_key_strategy()).prop_map(|(slash, key)| if slash { format!("/{key}") } else { key })
}

/// Hex-encoded key shares as produced by initialization.
pub fn key_share_strategy() -> impl Strategy<Value = String> {
    "[0-9a-f]{64}"
}

/// Credential ids.
pub fn token_strategy() -> impl Strategy<Value = String> {
    "[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}"
}

/// Policy names.
pub fn policy_name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,12}"
}

/// Scalar JSON leaves, `null` included.
pub fn json_leaf_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        "[ -~]{0,16}".prop_map(Value::String),
    ]
}

/// JSON values nested up to three levels.
pub fn json_value_strategy() -> impl Strategy<Value = Value> {
    json_leaf_strategy().prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

/// Request bodies: objects whose values may be `null` or nested.
pub fn json_object_strategy() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map("[a-z_]{1,10}", json_value_strategy(), 0..8)
        .prop_map(|map| map.into_iter().collect())
}

/// Threshold and share counts with `1 <= threshold <= shares <= 10`.
pub fn shamir_strategy() -> impl Strategy<Value = (u32, u32)> {
    (1u32..=10).prop_flat_map(|shares| (1u32..=shares, Just(shares)))
}
