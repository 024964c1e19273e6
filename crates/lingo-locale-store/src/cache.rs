// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Short-TTL in-memory cache for derived reads.
//!
//! Keyed by logical operation name and used for aggregated statistics,
//! never for the authoritative preference/override/history records;
//! those always go through the persistence adapter. Eviction is lazy
//! (checked on read) plus an explicit sweep.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default entry lifetime.
pub const DEFAULT_TTL_MINUTES: i64 = 5;

/// One cached value with its write time.
#[derive(Debug, Clone)]
struct CacheEntry {
	value: Value,
	stored_at: DateTime<Utc>,
}

/// Cache observability counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
	pub total_entries: usize,
	pub valid_entries: usize,
	pub expired_entries: usize,
	/// hits / (hits + misses), 0 when never read
	pub hit_rate: f64,
	/// Rough bytes held by keys and serialized values
	pub memory_usage_estimate: u64,
}

#[derive(Debug, Default)]
struct CacheInner {
	entries: HashMap<String, CacheEntry>,
	hits: u64,
	misses: u64,
}

/// TTL cache shared by clone, mirroring the engine's single-instance
/// lifecycle: created at engine initialization, dropped at shutdown.
#[derive(Debug)]
pub struct TtlCache {
	inner: Arc<RwLock<CacheInner>>,
	ttl: Duration,
}

impl TtlCache {
	/// Creates a cache with the default 5 minute TTL.
	#[must_use]
	pub fn new() -> Self {
		Self::with_ttl(Duration::minutes(DEFAULT_TTL_MINUTES))
	}

	/// Creates a cache with an explicit TTL. Tests use a zero TTL to
	/// exercise expiry without sleeping.
	#[must_use]
	pub fn with_ttl(ttl: Duration) -> Self {
		Self {
			inner: Arc::new(RwLock::new(CacheInner::default())),
			ttl,
		}
	}

	fn is_expired(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
		now - entry.stored_at > self.ttl
	}

	/// Reads a value; expired entries count as misses and are evicted.
	pub fn get(&self, key: &str) -> Option<Value> {
		let now = Utc::now();
		let mut inner = self.inner.write().expect("cache lock poisoned");
		match inner.entries.get(key) {
			Some(entry) if !self.is_expired(entry, now) => {
				let value = entry.value.clone();
				inner.hits += 1;
				Some(value)
			}
			Some(_) => {
				inner.entries.remove(key);
				inner.misses += 1;
				None
			}
			None => {
				inner.misses += 1;
				None
			}
		}
	}

	/// Stores a value under a logical operation name.
	pub fn set(&self, key: impl Into<String>, value: Value) {
		let mut inner = self.inner.write().expect("cache lock poisoned");
		inner.entries.insert(
			key.into(),
			CacheEntry {
				value,
				stored_at: Utc::now(),
			},
		);
	}

	/// Drops one key, or everything when no key is given.
	pub fn invalidate(&self, key: Option<&str>) {
		let mut inner = self.inner.write().expect("cache lock poisoned");
		match key {
			Some(key) => {
				inner.entries.remove(key);
			}
			None => inner.entries.clear(),
		}
	}

	/// Removes every expired entry, returning how many were dropped.
	pub fn sweep_expired(&self) -> usize {
		let now = Utc::now();
		let mut inner = self.inner.write().expect("cache lock poisoned");
		let before = inner.entries.len();
		let ttl = self.ttl;
		inner.entries.retain(|_, entry| now - entry.stored_at <= ttl);
		before - inner.entries.len()
	}

	/// Point-in-time statistics including hit/miss accounting.
	#[must_use]
	pub fn stats(&self) -> CacheStats {
		let now = Utc::now();
		let inner = self.inner.read().expect("cache lock poisoned");
		let total_entries = inner.entries.len();
		let expired_entries = inner
			.entries
			.values()
			.filter(|e| self.is_expired(e, now))
			.count();
		let reads = inner.hits + inner.misses;
		let hit_rate = if reads > 0 {
			inner.hits as f64 / reads as f64
		} else {
			0.0
		};
		let memory_usage_estimate = inner
			.entries
			.iter()
			.map(|(k, e)| (k.len() + e.value.to_string().len()) as u64)
			.sum();

		CacheStats {
			total_entries,
			valid_entries: total_entries - expired_entries,
			expired_entries,
			hit_rate,
			memory_usage_estimate,
		}
	}
}

impl Default for TtlCache {
	fn default() -> Self {
		Self::new()
	}
}

impl Clone for TtlCache {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
			ttl: self.ttl,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_set_get_roundtrip() {
		let cache = TtlCache::new();
		cache.set("stats", json!({"count": 3}));
		assert_eq!(cache.get("stats"), Some(json!({"count": 3})));
	}

	#[test]
	fn test_miss_on_absent_key() {
		let cache = TtlCache::new();
		assert_eq!(cache.get("nothing"), None);
	}

	#[test]
	fn test_expired_entry_is_a_miss() {
		let cache = TtlCache::with_ttl(Duration::milliseconds(-1));
		cache.set("stats", json!(1));
		assert_eq!(cache.get("stats"), None);

		// lazy eviction removed it
		let stats = cache.stats();
		assert_eq!(stats.total_entries, 0);
	}

	#[test]
	fn test_invalidate_single_key() {
		let cache = TtlCache::new();
		cache.set("a", json!(1));
		cache.set("b", json!(2));
		cache.invalidate(Some("a"));
		assert_eq!(cache.get("a"), None);
		assert_eq!(cache.get("b"), Some(json!(2)));
	}

	#[test]
	fn test_invalidate_all() {
		let cache = TtlCache::new();
		cache.set("a", json!(1));
		cache.set("b", json!(2));
		cache.invalidate(None);
		assert_eq!(cache.stats().total_entries, 0);
	}

	#[test]
	fn test_sweep_expired() {
		let expired = TtlCache::with_ttl(Duration::milliseconds(-1));
		expired.set("a", json!(1));
		expired.set("b", json!(2));
		assert_eq!(expired.sweep_expired(), 2);
		assert_eq!(expired.stats().total_entries, 0);

		let fresh = TtlCache::new();
		fresh.set("a", json!(1));
		assert_eq!(fresh.sweep_expired(), 0);
	}

	#[test]
	fn test_hit_rate_accounting() {
		let cache = TtlCache::new();
		cache.set("a", json!(1));
		cache.get("a"); // hit
		cache.get("a"); // hit
		cache.get("missing"); // miss

		let stats = cache.stats();
		assert!((stats.hit_rate - 2.0 / 3.0).abs() < 1e-9);
	}

	#[test]
	fn test_hit_rate_zero_when_never_read() {
		let cache = TtlCache::new();
		assert_eq!(cache.stats().hit_rate, 0.0);
	}

	#[test]
	fn test_memory_estimate_nonzero() {
		let cache = TtlCache::new();
		cache.set("key", json!("value"));
		assert!(cache.stats().memory_usage_estimate > 0);
	}

	#[test]
	fn test_clone_shares_state() {
		let cache = TtlCache::new();
		let clone = cache.clone();
		cache.set("a", json!(1));
		assert_eq!(clone.get("a"), Some(json!(1)));
	}
}
