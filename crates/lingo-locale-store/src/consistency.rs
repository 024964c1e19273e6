// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cross-backend consistency checking and repair.
//!
//! The two backends are eventually consistent at best: one can miss a
//! write the other took, or hold a stale value after a partial
//! failure. Divergence is reported as findings, not errors, and
//! auto-repair picks a winner by the source-priority rule and rewrites
//! both sides to match.

use serde_json::{json, Value};
use tracing::{debug, warn};

use lingo_locale_core::{deep_equal, diff_paths, Locale, LocalePreference};

use crate::adapter::{DualBackend, WriteOutcome};
use crate::backend::BackendKind;
use crate::error::{Result, StoreError};
use crate::keys::{OVERRIDE_KEY, PREFERENCE_KEY};

/// Findings of a consistency check.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ConsistencyReport {
	pub is_consistent: bool,
	pub issues: Vec<String>,
	pub recommendations: Vec<String>,
}

/// What auto-repair did.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RepairReport {
	pub fixed: bool,
	pub actions: Vec<String>,
}

/// Before/after snapshots of a one-shot reconciliation.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SyncReport {
	pub before: Value,
	pub after: Value,
	pub actions: Vec<String>,
	pub changed: bool,
}

/// Compares and reconciles the mirrored logical records.
#[derive(Debug, Clone)]
pub struct ConsistencyChecker {
	adapter: DualBackend,
}

impl ConsistencyChecker {
	#[must_use]
	pub fn new(adapter: DualBackend) -> Self {
		Self { adapter }
	}

	/// Compares preference and override across both backends.
	///
	/// Unreadable backends are reported as issues rather than errors;
	/// a check never throws past this layer.
	pub fn check(&self) -> ConsistencyReport {
		let mut issues = Vec::new();
		let mut recommendations = Vec::new();

		for key in [PREFERENCE_KEY, OVERRIDE_KEY] {
			self.check_key(key, &mut issues, &mut recommendations);
		}

		ConsistencyReport {
			is_consistent: issues.is_empty(),
			issues,
			recommendations,
		}
	}

	fn check_key(&self, key: &str, issues: &mut Vec<String>, recommendations: &mut Vec<String>) {
		let local = self.read_side(BackendKind::Local, key, issues);
		let cookie = self.read_side(BackendKind::Cookie, key, issues);

		match (local, cookie) {
			(Some(a), Some(b)) if a != b => {
				let paths = match (
					serde_json::from_str::<Value>(&a),
					serde_json::from_str::<Value>(&b),
				) {
					(Ok(av), Ok(bv)) => diff_paths(&av, &bv).join(", "),
					_ => "unparseable value".to_string(),
				};
				issues.push(format!("{key}: backends disagree at [{paths}]"));
				recommendations.push(format!(
					"{key}: run repair to rewrite both backends from the winning value"
				));
			}
			(Some(_), None) => {
				issues.push(format!("{key}: present in local store, missing in cookie store"));
				recommendations.push(format!("{key}: mirror the local value into the cookie store"));
			}
			(None, Some(_)) => {
				issues.push(format!("{key}: present in cookie store, missing in local store"));
				recommendations.push(format!("{key}: sync the cookie value back into the local store"));
			}
			_ => {}
		}
	}

	/// A winner that cannot be persisted anywhere leaves the divergence
	/// standing, which the caller must hear about.
	fn check_rewrite(record: &str, outcome: WriteOutcome) -> Result<()> {
		if outcome.succeeded() {
			Ok(())
		} else {
			warn!(record, "repair could not rewrite either backend");
			Err(StoreError::Consistency(format!(
				"{record} winner rejected by both backends{}",
				outcome
					.first_error()
					.map(|e| format!(" ({e})"))
					.unwrap_or_default()
			)))
		}
	}

	fn read_side(&self, side: BackendKind, key: &str, issues: &mut Vec<String>) -> Option<String> {
		match self.adapter.get_from(side, key) {
			Ok(value) => value,
			Err(e) => {
				issues.push(format!("{key}: {side} store unreadable ({e})"));
				None
			}
		}
	}

	/// Applies the source-priority rule to reconcile divergent records
	/// and rewrites both backends to the winner.
	pub fn repair(&self) -> Result<RepairReport> {
		let mut actions = Vec::new();

		if let Some(winner) = self.preference_winner(&mut actions)? {
			let json = serde_json::to_string(&winner)?;
			Self::check_rewrite("preference", self.adapter.set(PREFERENCE_KEY, &json))?;
		}

		if let Some(value) = self.override_winner(&mut actions)? {
			let json = serde_json::to_string(&value)?;
			Self::check_rewrite("override", self.adapter.set(OVERRIDE_KEY, &json))?;
		}

		let fixed = !actions.is_empty();
		if fixed {
			debug!(actions = actions.len(), "consistency repair applied");
		}
		Ok(RepairReport { fixed, actions })
	}

	/// One-shot reconciliation with before/after snapshots.
	pub fn sync(&self) -> Result<SyncReport> {
		let before = self.snapshot();
		let repair = self.repair()?;
		let after = self.snapshot();
		let changed = !deep_equal(&before, &after);
		Ok(SyncReport {
			before,
			after,
			actions: repair.actions,
			changed,
		})
	}

	/// Raw per-backend view of the mirrored records.
	fn snapshot(&self) -> Value {
		let mut sides = serde_json::Map::new();
		for side in [BackendKind::Local, BackendKind::Cookie] {
			let mut entries = serde_json::Map::new();
			for key in [PREFERENCE_KEY, OVERRIDE_KEY] {
				let value = self
					.adapter
					.get_from(side, key)
					.ok()
					.flatten()
					.and_then(|s| serde_json::from_str(&s).ok())
					.unwrap_or(Value::Null);
				entries.insert(key.to_string(), value);
			}
			sides.insert(side.to_string(), Value::Object(entries));
		}
		json!(sides)
	}

	/// Picks the preference both backends should agree on.
	fn preference_winner(&self, actions: &mut Vec<String>) -> Result<Option<LocalePreference>> {
		let local = self.parse_side::<LocalePreference>(BackendKind::Local, PREFERENCE_KEY);
		let cookie = self.parse_side::<LocalePreference>(BackendKind::Cookie, PREFERENCE_KEY);

		Ok(match (local, cookie) {
			(Some(a), Some(b)) => {
				if a == b {
					None
				} else {
					let winner = if a.outranks(&b) { a } else { b };
					actions.push(format!(
						"preference: kept {} ({}, confidence {:.2}) by source priority",
						winner.locale, winner.source, winner.confidence
					));
					Some(winner)
				}
			}
			(Some(only), None) | (None, Some(only)) => {
				actions.push(format!(
					"preference: restored missing copy of {} ({})",
					only.locale, only.source
				));
				Some(only)
			}
			(None, None) => None,
		})
	}

	/// Picks the override value both backends should agree on.
	///
	/// When the sides disagree outright the local store wins; it is the
	/// primary and holds the fresher write in every partial-failure
	/// sequence the adapter can produce.
	fn override_winner(&self, actions: &mut Vec<String>) -> Result<Option<Locale>> {
		let local = self.parse_side::<Locale>(BackendKind::Local, OVERRIDE_KEY);
		let cookie = self.parse_side::<Locale>(BackendKind::Cookie, OVERRIDE_KEY);

		Ok(match (local, cookie) {
			(Some(a), Some(b)) => {
				if a == b {
					None
				} else {
					actions.push(format!("override: kept {a} from the local store"));
					Some(a)
				}
			}
			(Some(only), None) | (None, Some(only)) => {
				actions.push(format!("override: restored missing copy of {only}"));
				Some(only)
			}
			(None, None) => None,
		})
	}

	fn parse_side<T: serde::de::DeserializeOwned>(
		&self,
		side: BackendKind,
		key: &str,
	) -> Option<T> {
		self
			.adapter
			.get_from(side, key)
			.ok()
			.flatten()
			.and_then(|s| serde_json::from_str(&s).ok())
	}
}
