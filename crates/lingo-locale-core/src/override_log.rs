// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Audit log of manual override actions.
//!
//! The log is never the source of truth for the current override; it
//! only feeds audit trails and statistics.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::locale::Locale;
use crate::metadata::Metadata;

/// Maximum number of override records retained; oldest dropped first.
pub const OVERRIDE_HISTORY_CAP: usize = 50;

/// What an override action did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideAction {
	Set,
	Clear,
}

impl std::fmt::Display for OverrideAction {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			OverrideAction::Set => write!(f, "set"),
			OverrideAction::Clear => write!(f, "clear"),
		}
	}
}

/// One manual override action, appended to the audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideRecord {
	pub locale: Locale,
	pub timestamp: DateTime<Utc>,
	pub action: OverrideAction,
	#[serde(default)]
	pub metadata: Metadata,
}

impl OverrideRecord {
	#[must_use]
	pub fn new(locale: Locale, action: OverrideAction) -> Self {
		Self {
			locale,
			timestamp: Utc::now(),
			action,
			metadata: Metadata::new(),
		}
	}
}

/// Aggregate statistics over the override audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideStats {
	/// Count of "set" actions in the retained log
	pub total_overrides: u64,
	/// The currently live override, if any
	pub current_override: Option<Locale>,
	pub last_override_time: Option<DateTime<Utc>>,
	/// Most frequently set locale, ties broken by locale order
	pub most_used_locale: Option<Locale>,
	/// Set-action counts per locale
	pub override_frequency: HashMap<Locale, u64>,
}

impl OverrideStats {
	/// Derives statistics from a retained log plus the live override.
	#[must_use]
	pub fn from_log(log: &[OverrideRecord], current_override: Option<Locale>) -> Self {
		let mut override_frequency: HashMap<Locale, u64> = HashMap::new();
		let mut last_override_time = None;
		for record in log {
			if record.action == OverrideAction::Set {
				*override_frequency.entry(record.locale).or_default() += 1;
			}
			if last_override_time < Some(record.timestamp) {
				last_override_time = Some(record.timestamp);
			}
		}

		let total_overrides = override_frequency.values().sum();
		let mut by_count: Vec<(Locale, u64)> = override_frequency
			.iter()
			.map(|(l, c)| (*l, *c))
			.collect();
		// Descending by count, locale code breaking ties for determinism
		by_count.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

		Self {
			total_overrides,
			current_override,
			last_override_time,
			most_used_locale: by_count.first().map(|(l, _)| *l),
			override_frequency,
		}
	}
}
