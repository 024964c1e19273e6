// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Dual-backend persistence adapter.
//!
//! Reads prefer the primary (local) backend and fall back to the
//! secondary (cookie) backend, writing a found value back into the
//! primary. Writes go to both backends unless a single target is
//! requested. Backend failures are caught here and surfaced as typed
//! outcomes; nothing above this layer sees a backend panic.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::backend::{BackendError, BackendKind, StorageBackend};

/// Outcome of a dual write, reported per backend.
#[derive(Debug)]
pub struct WriteOutcome {
	pub primary: Result<(), BackendError>,
	pub secondary: Result<(), BackendError>,
}

impl WriteOutcome {
	/// A write succeeded if at least one backend accepted it.
	#[must_use]
	pub fn succeeded(&self) -> bool {
		self.primary.is_ok() || self.secondary.is_ok()
	}

	/// First error, for reporting when both sides failed.
	#[must_use]
	pub fn first_error(&self) -> Option<&BackendError> {
		self
			.primary
			.as_ref()
			.err()
			.or(self.secondary.as_ref().err())
	}
}

/// Uniform get/set/remove over the two storage backends.
#[derive(Clone)]
pub struct DualBackend {
	primary: Arc<dyn StorageBackend>,
	secondary: Arc<dyn StorageBackend>,
}

impl std::fmt::Debug for DualBackend {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DualBackend")
			.field("primary", &self.primary.kind())
			.field("secondary", &self.secondary.kind())
			.finish()
	}
}

impl DualBackend {
	#[must_use]
	pub fn new(primary: Arc<dyn StorageBackend>, secondary: Arc<dyn StorageBackend>) -> Self {
		Self { primary, secondary }
	}

	/// Read with fallback: primary first, then secondary with
	/// write-back sync into the primary.
	pub fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
		match self.primary.get(key) {
			Ok(Some(value)) => {
				debug!(key, backend = %self.primary.kind(), "hit");
				return Ok(Some(value));
			}
			Ok(None) => {}
			Err(e) => {
				warn!(key, error = %e, "primary read failed, trying secondary");
			}
		}

		match self.secondary.get(key)? {
			Some(value) => {
				debug!(key, backend = %self.secondary.kind(), "hit, syncing back to primary");
				if let Err(e) = self.primary.set(key, &value) {
					warn!(key, error = %e, "write-back into primary failed");
				}
				Ok(Some(value))
			}
			None => Ok(None),
		}
	}

	/// Write to both backends; each failure is caught and reported.
	pub fn set(&self, key: &str, value: &str) -> WriteOutcome {
		let primary = self.primary.set(key, value);
		if let Err(e) = &primary {
			warn!(key, backend = %self.primary.kind(), error = %e, "write failed");
		}
		let secondary = self.secondary.set(key, value);
		if let Err(e) = &secondary {
			warn!(key, backend = %self.secondary.kind(), error = %e, "write failed");
		}
		WriteOutcome { primary, secondary }
	}

	/// Write to a single backend, leaving the other untouched.
	pub fn set_single(
		&self,
		target: BackendKind,
		key: &str,
		value: &str,
	) -> Result<(), BackendError> {
		self.backend(target).set(key, value)
	}

	/// Remove from both backends.
	pub fn remove(&self, key: &str) -> WriteOutcome {
		let primary = self.primary.remove(key);
		let secondary = self.secondary.remove(key);
		WriteOutcome { primary, secondary }
	}

	/// Direct read from one backend, no fallback. Used by the
	/// consistency engine to observe divergence.
	pub fn get_from(&self, target: BackendKind, key: &str) -> Result<Option<String>, BackendError> {
		self.backend(target).get(key)
	}

	/// The backend playing the given role.
	#[must_use]
	pub fn backend(&self, target: BackendKind) -> &dyn StorageBackend {
		if self.primary.kind() == target {
			self.primary.as_ref()
		} else {
			self.secondary.as_ref()
		}
	}

	#[must_use]
	pub fn primary(&self) -> &dyn StorageBackend {
		self.primary.as_ref()
	}

	#[must_use]
	pub fn secondary(&self) -> &dyn StorageBackend {
		self.secondary.as_ref()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::backend::{BackendLimits, MemoryBackend};

	fn memory_pair() -> (Arc<MemoryBackend>, Arc<MemoryBackend>, DualBackend) {
		let primary = Arc::new(MemoryBackend::new(BackendKind::Local));
		let secondary = Arc::new(MemoryBackend::with_limits(
			BackendKind::Cookie,
			BackendLimits::cookie_default(),
		));
		let dual = DualBackend::new(primary.clone(), secondary.clone());
		(primary, secondary, dual)
	}

	#[test]
	fn test_set_writes_both() {
		let (primary, secondary, dual) = memory_pair();
		let outcome = dual.set("k", "v");
		assert!(outcome.succeeded());
		assert_eq!(primary.get("k").unwrap(), Some("v".to_string()));
		assert_eq!(secondary.get("k").unwrap(), Some("v".to_string()));
	}

	#[test]
	fn test_get_prefers_primary() {
		let (primary, secondary, dual) = memory_pair();
		primary.set("k", "from-primary").unwrap();
		secondary.set("k", "from-secondary").unwrap();
		assert_eq!(dual.get("k").unwrap(), Some("from-primary".to_string()));
	}

	#[test]
	fn test_get_falls_back_and_syncs() {
		let (primary, secondary, dual) = memory_pair();
		secondary.set("k", "v").unwrap();

		assert_eq!(dual.get("k").unwrap(), Some("v".to_string()));
		// write-back sync restored the primary copy
		assert_eq!(primary.get("k").unwrap(), Some("v".to_string()));
	}

	#[test]
	fn test_get_survives_primary_outage() {
		let (primary, secondary, dual) = memory_pair();
		secondary.set("k", "v").unwrap();
		primary.set_disabled(true);

		assert_eq!(dual.get("k").unwrap(), Some("v".to_string()));
	}

	#[test]
	fn test_partial_write_still_succeeds() {
		let (primary, secondary, dual) = memory_pair();
		secondary.set_disabled(true);

		let outcome = dual.set("k", "v");
		assert!(outcome.succeeded());
		assert!(outcome.secondary.is_err());
		assert_eq!(primary.get("k").unwrap(), Some("v".to_string()));
	}

	#[test]
	fn test_both_backends_failing_reported() {
		let (primary, secondary, dual) = memory_pair();
		primary.set_disabled(true);
		secondary.set_disabled(true);

		let outcome = dual.set("k", "v");
		assert!(!outcome.succeeded());
		assert!(outcome.first_error().is_some());
	}

	#[test]
	fn test_set_single_leaves_other_untouched() {
		let (primary, secondary, dual) = memory_pair();
		dual.set_single(BackendKind::Local, "k", "v").unwrap();
		assert_eq!(primary.get("k").unwrap(), Some("v".to_string()));
		assert_eq!(secondary.get("k").unwrap(), None);
	}

	#[test]
	fn test_remove_clears_both() {
		let (primary, secondary, dual) = memory_pair();
		dual.set("k", "v");
		let outcome = dual.remove("k");
		assert!(outcome.succeeded());
		assert_eq!(primary.get("k").unwrap(), None);
		assert_eq!(secondary.get("k").unwrap(), None);
	}
}
