//! Key-value cache contract (§6). Not implemented by this crate — a
//! real cache (Redis, an in-process LRU, whatever the deployment
//! wants) is an external collaborator, consistent with §1's scope line
//! — but the trait shape is defined here so a caller can plug one in
//! without this crate needing to depend on a concrete cache crate.
//! Grounded in the indexer pack's `CachePort` (`core/traits.rs`),
//! renamed to the `get`/`put`/`list`/`delete` verbs this spec names and
//! with TTL moved to a backend-level setting rather than a per-call
//! argument, per "TTL as configuration".

use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// How long a `put` entry stays valid. A backend-level setting
    /// (e.g. read once from its own config at construction), not a
    /// per-call parameter.
    fn ttl_secs(&self) -> u64;

    async fn get(&self, key: &str) -> anyhow::Result<Option<Value>>;

    async fn put(&self, key: &str, value: Value) -> anyhow::Result<()>;

    /// Keys currently stored under `prefix`.
    async fn list(&self, prefix: &str) -> anyhow::Result<Vec<String>>;

    async fn delete(&self, key: &str) -> anyhow::Result<()>;
}
