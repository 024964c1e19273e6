// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Storage backends.
//!
//! A backend is a flat string-keyed store of UTF-8 JSON text. The two
//! production roles differ only in capacity: the primary has a
//! per-origin quota in the megabytes, the secondary caps each value at
//! a few KiB. Both are modeled by the same trait so the adapter and the
//! consistency engine can treat them uniformly.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::{debug, warn};

use crate::keys::entry_size_estimate;

/// Errors a backend can surface. Never propagated as panics.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
	/// Write would exceed the backend's quota
	#[error("quota exceeded on {backend}: {needed} bytes needed, {available} available")]
	QuotaExceeded {
		backend: BackendKind,
		needed: u64,
		available: u64,
	},

	/// Value too large for this backend's per-value limit
	#[error("value too large for {backend}: {size} bytes, limit {limit}")]
	ValueTooLarge {
		backend: BackendKind,
		size: u64,
		limit: u64,
	},

	/// Backend is switched off (host disabled it, or test injection)
	#[error("backend {0} is disabled")]
	Disabled(BackendKind),

	/// Underlying I/O failure
	#[error("io error on {backend}: {message}")]
	Io {
		backend: BackendKind,
		message: String,
	},

	/// Stored document failed to parse
	#[error("corrupt store on {backend}: {message}")]
	Corrupt {
		backend: BackendKind,
		message: String,
	},
}

/// Which of the two storage roles a backend plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
	/// Backend A: the quota-bound key-value local store
	Local,
	/// Backend B: the cookie-style store with small per-value limits
	Cookie,
}

impl std::fmt::Display for BackendKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			BackendKind::Local => write!(f, "local"),
			BackendKind::Cookie => write!(f, "cookie"),
		}
	}
}

/// Trait for flat string storage backends.
pub trait StorageBackend: Send + Sync + std::fmt::Debug {
	/// Which role this backend plays.
	fn kind(&self) -> BackendKind;

	/// Read a value. `Ok(None)` on miss.
	fn get(&self, key: &str) -> Result<Option<String>, BackendError>;

	/// Write a value, replacing any existing one.
	fn set(&self, key: &str, value: &str) -> Result<(), BackendError>;

	/// Remove a value. Removing an absent key is not an error.
	fn remove(&self, key: &str) -> Result<(), BackendError>;

	/// All keys currently present.
	fn keys(&self) -> Result<Vec<String>, BackendError>;

	/// Total bytes of stored keys and values.
	fn used_bytes(&self) -> Result<u64, BackendError>;

	/// Quota in bytes, if this backend enforces one.
	fn quota_bytes(&self) -> Option<u64> {
		None
	}

	/// Whether the backend currently accepts operations.
	fn is_available(&self) -> bool {
		self.get("__lingo_probe__").is_ok()
	}
}

/// Capacity limits for a backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackendLimits {
	/// Total store quota in bytes, unlimited if `None`
	pub quota_bytes: Option<u64>,
	/// Per-value size limit in bytes, unlimited if `None`
	pub value_limit_bytes: Option<u64>,
}

impl BackendLimits {
	/// Limits matching a browser local store: ~5 MiB origin quota.
	#[must_use]
	pub fn local_default() -> Self {
		Self {
			quota_bytes: Some(5 * 1024 * 1024),
			value_limit_bytes: None,
		}
	}

	/// Limits matching a cookie store: 4 KiB per value.
	#[must_use]
	pub fn cookie_default() -> Self {
		Self {
			quota_bytes: None,
			value_limit_bytes: Some(4 * 1024),
		}
	}

	fn check_value(&self, kind: BackendKind, value: &str) -> Result<(), BackendError> {
		if let Some(limit) = self.value_limit_bytes {
			let size = value.len() as u64;
			if size > limit {
				return Err(BackendError::ValueTooLarge {
					backend: kind,
					size,
					limit,
				});
			}
		}
		Ok(())
	}

	fn check_quota(
		&self,
		kind: BackendKind,
		used: u64,
		replaced: u64,
		incoming: u64,
	) -> Result<(), BackendError> {
		if let Some(quota) = self.quota_bytes {
			let projected = used.saturating_sub(replaced) + incoming;
			if projected > quota {
				return Err(BackendError::QuotaExceeded {
					backend: kind,
					needed: incoming,
					available: quota.saturating_sub(used.saturating_sub(replaced)),
				});
			}
		}
		Ok(())
	}
}

/// In-memory backend with failure injection, used in tests and as the
/// degraded-mode stand-in when the host store is unusable.
#[derive(Debug)]
pub struct MemoryBackend {
	kind: BackendKind,
	limits: BackendLimits,
	inner: RwLock<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
	entries: HashMap<String, String>,
	disabled: bool,
	read_only: bool,
}

impl MemoryBackend {
	#[must_use]
	pub fn new(kind: BackendKind) -> Self {
		Self::with_limits(kind, BackendLimits::default())
	}

	#[must_use]
	pub fn with_limits(kind: BackendKind, limits: BackendLimits) -> Self {
		Self {
			kind,
			limits,
			inner: RwLock::new(MemoryInner::default()),
		}
	}

	/// Failure injection: make every operation fail with `Disabled`.
	pub fn set_disabled(&self, disabled: bool) {
		self.inner.write().expect("backend lock poisoned").disabled = disabled;
	}

	/// Failure injection: accept reads but fail every write, the way a
	/// private-mode host store behaves.
	pub fn set_read_only(&self, read_only: bool) {
		self.inner.write().expect("backend lock poisoned").read_only = read_only;
	}

	fn guard_write(&self, inner: &MemoryInner) -> Result<(), BackendError> {
		if inner.disabled {
			return Err(BackendError::Disabled(self.kind));
		}
		if inner.read_only {
			return Err(BackendError::Io {
				backend: self.kind,
				message: "store is read-only".to_string(),
			});
		}
		Ok(())
	}

	fn guard(&self, inner: &MemoryInner) -> Result<(), BackendError> {
		if inner.disabled {
			Err(BackendError::Disabled(self.kind))
		} else {
			Ok(())
		}
	}
}

impl StorageBackend for MemoryBackend {
	fn kind(&self) -> BackendKind {
		self.kind
	}

	fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
		let inner = self.inner.read().expect("backend lock poisoned");
		self.guard(&inner)?;
		Ok(inner.entries.get(key).cloned())
	}

	fn set(&self, key: &str, value: &str) -> Result<(), BackendError> {
		let mut inner = self.inner.write().expect("backend lock poisoned");
		self.guard_write(&inner)?;
		self.limits.check_value(self.kind, value)?;
		let used: u64 = inner
			.entries
			.iter()
			.map(|(k, v)| entry_size_estimate(k, v))
			.sum();
		let replaced = inner
			.entries
			.get(key)
			.map(|v| entry_size_estimate(key, v))
			.unwrap_or(0);
		self
			.limits
			.check_quota(self.kind, used, replaced, entry_size_estimate(key, value))?;
		inner.entries.insert(key.to_string(), value.to_string());
		Ok(())
	}

	fn remove(&self, key: &str) -> Result<(), BackendError> {
		let mut inner = self.inner.write().expect("backend lock poisoned");
		self.guard_write(&inner)?;
		inner.entries.remove(key);
		Ok(())
	}

	fn keys(&self) -> Result<Vec<String>, BackendError> {
		let inner = self.inner.read().expect("backend lock poisoned");
		self.guard(&inner)?;
		Ok(inner.entries.keys().cloned().collect())
	}

	fn used_bytes(&self) -> Result<u64, BackendError> {
		let inner = self.inner.read().expect("backend lock poisoned");
		self.guard(&inner)?;
		Ok(inner
			.entries
			.iter()
			.map(|(k, v)| entry_size_estimate(k, v))
			.sum())
	}

	fn quota_bytes(&self) -> Option<u64> {
		self.limits.quota_bytes
	}
}

/// File-backed backend holding all entries in one JSON document.
///
/// Writes go through a temp file and rename so a crash mid-write never
/// leaves a torn document.
#[derive(Debug)]
pub struct FileBackend {
	kind: BackendKind,
	path: PathBuf,
	limits: BackendLimits,
	lock: RwLock<()>,
}

impl FileBackend {
	#[must_use]
	pub fn new(kind: BackendKind, path: impl Into<PathBuf>, limits: BackendLimits) -> Self {
		Self {
			kind,
			path: path.into(),
			limits,
			lock: RwLock::new(()),
		}
	}

	/// Path of the backing document.
	#[must_use]
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn io_err(&self, err: std::io::Error) -> BackendError {
		BackendError::Io {
			backend: self.kind,
			message: err.to_string(),
		}
	}

	fn read_document(&self) -> Result<HashMap<String, String>, BackendError> {
		if !self.path.exists() {
			return Ok(HashMap::new());
		}
		let contents = std::fs::read_to_string(&self.path).map_err(|e| self.io_err(e))?;
		serde_json::from_str(&contents).map_err(|e| BackendError::Corrupt {
			backend: self.kind,
			message: e.to_string(),
		})
	}

	fn write_document(&self, entries: &HashMap<String, String>) -> Result<(), BackendError> {
		if let Some(parent) = self.path.parent() {
			std::fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
		}
		let contents = serde_json::to_string_pretty(entries).map_err(|e| BackendError::Io {
			backend: self.kind,
			message: e.to_string(),
		})?;

		let temp_path = self.path.with_extension("tmp");
		std::fs::write(&temp_path, contents.as_bytes()).map_err(|e| self.io_err(e))?;
		std::fs::rename(&temp_path, &self.path).map_err(|e| self.io_err(e))?;

		debug!(path = ?self.path, backend = %self.kind, "store document written");
		Ok(())
	}
}

impl StorageBackend for FileBackend {
	fn kind(&self) -> BackendKind {
		self.kind
	}

	fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
		let _guard = self.lock.read().expect("backend lock poisoned");
		Ok(self.read_document()?.get(key).cloned())
	}

	fn set(&self, key: &str, value: &str) -> Result<(), BackendError> {
		let _guard = self.lock.write().expect("backend lock poisoned");
		self.limits.check_value(self.kind, value)?;
		let mut entries = self.read_document()?;
		let used: u64 = entries.iter().map(|(k, v)| entry_size_estimate(k, v)).sum();
		let replaced = entries
			.get(key)
			.map(|v| entry_size_estimate(key, v))
			.unwrap_or(0);
		self
			.limits
			.check_quota(self.kind, used, replaced, entry_size_estimate(key, value))?;
		entries.insert(key.to_string(), value.to_string());
		self.write_document(&entries)
	}

	fn remove(&self, key: &str) -> Result<(), BackendError> {
		let _guard = self.lock.write().expect("backend lock poisoned");
		let mut entries = self.read_document()?;
		if entries.remove(key).is_some() {
			self.write_document(&entries)?;
		}
		Ok(())
	}

	fn keys(&self) -> Result<Vec<String>, BackendError> {
		let _guard = self.lock.read().expect("backend lock poisoned");
		Ok(self.read_document()?.keys().cloned().collect())
	}

	fn used_bytes(&self) -> Result<u64, BackendError> {
		let _guard = self.lock.read().expect("backend lock poisoned");
		Ok(self
			.read_document()?
			.iter()
			.map(|(k, v)| entry_size_estimate(k, v))
			.sum())
	}

	fn quota_bytes(&self) -> Option<u64> {
		self.limits.quota_bytes
	}
}

impl Drop for FileBackend {
	fn drop(&mut self) {
		let temp_path = self.path.with_extension("tmp");
		if temp_path.exists() {
			if let Err(e) = std::fs::remove_file(&temp_path) {
				warn!(path = ?temp_path, error = %e, "failed to remove stale temp file");
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_memory_roundtrip() {
		let backend = MemoryBackend::new(BackendKind::Local);
		backend.set("k", "v").unwrap();
		assert_eq!(backend.get("k").unwrap(), Some("v".to_string()));
		backend.remove("k").unwrap();
		assert_eq!(backend.get("k").unwrap(), None);
	}

	#[test]
	fn test_memory_remove_absent_key_ok() {
		let backend = MemoryBackend::new(BackendKind::Local);
		assert!(backend.remove("nothing").is_ok());
	}

	#[test]
	fn test_memory_disabled() {
		let backend = MemoryBackend::new(BackendKind::Local);
		backend.set_disabled(true);
		assert!(matches!(
			backend.get("k"),
			Err(BackendError::Disabled(BackendKind::Local))
		));
		assert!(backend.set("k", "v").is_err());
		assert!(!backend.is_available());

		backend.set_disabled(false);
		assert!(backend.set("k", "v").is_ok());
	}

	#[test]
	fn test_memory_read_only() {
		let backend = MemoryBackend::new(BackendKind::Local);
		backend.set("k", "v").unwrap();
		backend.set_read_only(true);

		assert_eq!(backend.get("k").unwrap(), Some("v".to_string()));
		assert!(matches!(
			backend.set("k", "v2"),
			Err(BackendError::Io { .. })
		));
		assert!(backend.remove("k").is_err());
		assert_eq!(backend.get("k").unwrap(), Some("v".to_string()));

		backend.set_read_only(false);
		assert!(backend.remove("k").is_ok());
	}

	#[test]
	fn test_memory_quota() {
		let limits = BackendLimits {
			quota_bytes: Some(10),
			value_limit_bytes: None,
		};
		let backend = MemoryBackend::with_limits(BackendKind::Local, limits);
		backend.set("ab", "cdefgh").unwrap(); // 8 bytes
		let err = backend.set("xy", "z").unwrap_err(); // would be 11
		assert!(matches!(err, BackendError::QuotaExceeded { .. }));

		// replacing an existing entry accounts for the freed bytes
		backend.set("ab", "cdefghij").unwrap(); // 10 bytes total
	}

	#[test]
	fn test_cookie_value_limit() {
		let backend =
			MemoryBackend::with_limits(BackendKind::Cookie, BackendLimits::cookie_default());
		let big = "x".repeat(5 * 1024);
		let err = backend.set("k", &big).unwrap_err();
		assert!(matches!(err, BackendError::ValueTooLarge { .. }));

		let small = "x".repeat(1024);
		assert!(backend.set("k", &small).is_ok());
	}

	#[test]
	fn test_file_roundtrip() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("store.json");
		let backend = FileBackend::new(BackendKind::Local, &path, BackendLimits::default());

		backend.set("pref", r#"{"locale":"en"}"#).unwrap();
		assert!(path.exists());
		assert_eq!(
			backend.get("pref").unwrap(),
			Some(r#"{"locale":"en"}"#.to_string())
		);

		backend.remove("pref").unwrap();
		assert_eq!(backend.get("pref").unwrap(), None);
	}

	#[test]
	fn test_file_missing_document_is_empty() {
		let dir = tempfile::tempdir().unwrap();
		let backend = FileBackend::new(
			BackendKind::Local,
			dir.path().join("absent.json"),
			BackendLimits::default(),
		);
		assert_eq!(backend.get("k").unwrap(), None);
		assert!(backend.keys().unwrap().is_empty());
		assert_eq!(backend.used_bytes().unwrap(), 0);
	}

	#[test]
	fn test_file_corrupt_document_reported() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("store.json");
		std::fs::write(&path, "not json").unwrap();
		let backend = FileBackend::new(BackendKind::Local, &path, BackendLimits::default());
		assert!(matches!(
			backend.get("k"),
			Err(BackendError::Corrupt { .. })
		));
	}

	#[test]
	fn test_used_bytes_tracks_entries() {
		let backend = MemoryBackend::new(BackendKind::Local);
		assert_eq!(backend.used_bytes().unwrap(), 0);
		backend.set("ab", "cd").unwrap();
		assert_eq!(backend.used_bytes().unwrap(), 4);
	}
}
