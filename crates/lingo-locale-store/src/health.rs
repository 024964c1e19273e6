// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Derived usage statistics and the storage health report.

use serde::{Deserialize, Serialize};

use crate::backend::StorageBackend;
use crate::bus::ListenerStats;
use crate::cache::CacheStats;
use crate::consistency::ConsistencyReport;

/// Usage and capacity snapshot for one backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendStats {
	pub kind: String,
	pub available: bool,
	pub used_bytes: u64,
	pub quota_bytes: Option<u64>,
	/// used / quota, when a quota exists
	pub quota_used_ratio: Option<f64>,
}

impl BackendStats {
	/// Probes one backend; an unreadable backend reports zero usage.
	#[must_use]
	pub fn probe(backend: &dyn StorageBackend) -> Self {
		let available = backend.is_available();
		let used_bytes = backend.used_bytes().unwrap_or(0);
		let quota_bytes = backend.quota_bytes();
		let quota_used_ratio = quota_bytes
			.filter(|q| *q > 0)
			.map(|q| used_bytes as f64 / q as f64);
		Self {
			kind: backend.kind().to_string(),
			available,
			used_bytes,
			quota_bytes,
			quota_used_ratio,
		}
	}
}

/// Full derived statistics over the engine, cached behind the TTL
/// cache by the manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageStats {
	pub has_preference: bool,
	pub has_override: bool,
	pub detection_count: usize,
	pub override_log_count: usize,
	pub backup_count: usize,
	pub backends: Vec<BackendStats>,
	pub cache: CacheStats,
	pub listeners: ListenerStats,
	pub event_history_len: usize,
}

/// Outcome of a storage integrity pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegrityReport {
	pub healthy: bool,
	pub backends_available: bool,
	/// False when a stored preference fails shape validation
	pub preference_valid: bool,
	pub consistency: ConsistencyReport,
	pub issues: Vec<String>,
}

impl IntegrityReport {
	/// Folds the individual findings into one verdict.
	#[must_use]
	pub fn evaluate(
		backends_available: bool,
		preference_valid: bool,
		consistency: ConsistencyReport,
		mut issues: Vec<String>,
	) -> Self {
		if !backends_available {
			issues.push("one or more backends are unavailable".to_string());
		}
		if !preference_valid {
			issues.push("stored preference fails validation".to_string());
		}
		let healthy = backends_available && preference_valid && consistency.is_consistent;
		Self {
			healthy,
			backends_available,
			preference_valid,
			consistency,
			issues,
		}
	}
}
