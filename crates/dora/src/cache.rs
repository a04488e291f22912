//! Deterministic cache keys for computed results.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use cadence_common::error::{CadenceError, CadenceResult};

use crate::request::SortSpec;
use crate::source::OrgScopeToken;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything a cached result depends on.
#[derive(Debug)]
pub struct CacheKeyInputs<'a, F: Serialize> {
    pub tenant: &'a str,
    pub endpoint: &'a str,
    pub page: u32,
    pub page_size: u32,
    pub sort: &'a [SortSpec],
    pub filters: &'a F,
    pub scope: Option<&'a OrgScopeToken>,
    pub profile_id: Uuid,
    pub profile_updated_at: DateTime<Utc>,
}

/// Build the key. Keys are prefixed with the tenant. The profile's
/// `updated_at` is part of the key, so editing a profile orphans its old
/// entries without an explicit eviction.
pub fn cache_key<F: Serialize>(inputs: &CacheKeyInputs<'_, F>) -> CadenceResult<CacheKey> {
    let filter_hash = hash_json(inputs.filters)?;
    let scope_hash = match inputs.scope {
        Some(token) => hash_json(token)?,
        None => "none".to_owned(),
    };
    let sort = inputs
        .sort
        .iter()
        .map(|s| format!("{}:{}", s.id, if s.desc { "desc" } else { "asc" }))
        .collect::<Vec<_>>()
        .join(",");

    Ok(CacheKey(format!(
        "{}:{}_{}_{}_{}_{}_{}_{}_{}",
        inputs.tenant,
        inputs.endpoint,
        inputs.page,
        inputs.page_size,
        sort,
        filter_hash,
        scope_hash,
        inputs.profile_id,
        inputs.profile_updated_at.timestamp_millis()
    )))
}

/// SHA-256 of the JSON encoding. Maps serialize with sorted keys, so equal
/// inputs always hash equal.
fn hash_json<T: Serialize + ?Sized>(value: &T) -> CadenceResult<String> {
    let bytes = serde_json::to_vec(value)
        .map_err(|e| CadenceError::Internal(format!("cache key serialization failed: {e}")))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}
