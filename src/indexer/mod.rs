//! Indexer service: normalize raw lines into structured documents.
//!
//! Each named profile is one normalization strategy. The engine is
//! deliberately small; the interesting contract is the HTTP surface in
//! [`api`], which the agents' indexed processor calls one line at a time.

pub mod api;
mod profiles;

pub use profiles::{json_auto, kv_pairs, passthrough};

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("unknown profile: {0}")]
    UnknownProfile(String),
}

/// Normalize one raw line with the named profile.
pub fn normalize(profile: &str, raw: &str) -> Result<Map<String, Value>, IndexerError> {
    match profile {
        "passthrough" => Ok(passthrough(raw)),
        "json_auto" => Ok(json_auto(raw)),
        "kv_pairs" => Ok(kv_pairs(raw)),
        other => Err(IndexerError::UnknownProfile(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_profiles_resolve() {
        for profile in ["passthrough", "json_auto", "kv_pairs"] {
            assert!(normalize(profile, "x").is_ok(), "{profile}");
        }
    }

    #[test]
    fn test_unknown_profile_is_error() {
        let err = normalize("grok", "x").unwrap_err();
        assert!(matches!(err, IndexerError::UnknownProfile(p) if p == "grok"));
    }
}
