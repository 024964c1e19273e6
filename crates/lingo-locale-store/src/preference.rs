// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Preference store: the current preference, the manual override, and
//! the override audit log.
//!
//! The preference and the override value are each a single record,
//! replaced wholesale on every save. The audit log is append-only and
//! capped; it feeds statistics, never current state.

use tracing::{debug, warn};

use lingo_locale_core::{
	Locale, LocaleError, LocalePreference, Metadata, MetadataValue, OverrideAction, OverrideRecord,
	OverrideStats, PreferenceSource, OVERRIDE_HISTORY_CAP,
};

use crate::adapter::DualBackend;
use crate::error::{Result, StoreError};
use crate::keys::{DETECTION_HISTORY_KEY, OVERRIDE_HISTORY_KEY, OVERRIDE_KEY, PREFERENCE_KEY};

/// CRUD and override handling for the current locale preference.
#[derive(Debug, Clone)]
pub struct PreferenceStore {
	adapter: DualBackend,
}

impl PreferenceStore {
	#[must_use]
	pub fn new(adapter: DualBackend) -> Self {
		Self { adapter }
	}

	/// Validates and persists a preference, replacing the current one.
	///
	/// Invalid input is rejected before any write.
	pub fn save(&self, preference: &LocalePreference) -> Result<()> {
		preference.validate()?;
		let json = serde_json::to_string(preference)?;
		self.write_both(PREFERENCE_KEY, &json)?;
		debug!(locale = %preference.locale, source = %preference.source, "preference saved");
		Ok(())
	}

	/// Dual write that fails only when both backends refuse it.
	fn write_both(&self, key: &str, json: &str) -> Result<()> {
		let outcome = self.adapter.set(key, json);
		if outcome.succeeded() {
			Ok(())
		} else {
			Err(StoreError::Unavailable(
				outcome
					.first_error()
					.map(ToString::to_string)
					.unwrap_or_else(|| "both backends rejected the write".to_string()),
			))
		}
	}

	/// The current preference, if any.
	pub fn get(&self) -> Result<Option<LocalePreference>> {
		match self.adapter.get(PREFERENCE_KEY)? {
			Some(json) => Ok(Some(serde_json::from_str(&json)?)),
			None => Ok(None),
		}
	}

	/// Replaces the stored confidence, keeping everything else.
	pub fn update_confidence(&self, confidence: f64) -> Result<LocalePreference> {
		let mut preference = self
			.get()?
			.ok_or_else(|| StoreError::NotFound("no preference to update".to_string()))?;
		preference.confidence = confidence;
		self.save(&preference)?;
		Ok(preference)
	}

	pub fn has_preference(&self) -> Result<bool> {
		Ok(self.get()?.is_some())
	}

	/// Shape validation without persistence.
	pub fn validate(&self, preference: &LocalePreference) -> std::result::Result<(), LocaleError> {
		preference.validate()
	}

	/// Sets a manual override.
	///
	/// Caller metadata is sanitized at this boundary; only plain
	/// scalars with safe, non-empty names survive. The resulting
	/// preference carries `source = user_override`, full confidence,
	/// and the `isOverride` marker, and the action is appended to the
	/// audit log.
	pub fn set_override(&self, locale: Locale, metadata: Option<Metadata>) -> Result<()> {
		let sanitized = metadata.map(|m| m.sanitize()).unwrap_or_default();

		let override_json = serde_json::to_string(&locale)?;
		self.write_both(OVERRIDE_KEY, &override_json)?;

		let mut preference = LocalePreference::new(locale, PreferenceSource::UserOverride, 1.0);
		for (key, value) in sanitized.iter() {
			preference.metadata.insert(key.clone(), value.clone());
		}
		preference
			.metadata
			.insert("isOverride", MetadataValue::Bool(true));
		self.save(&preference)?;

		let mut record = OverrideRecord::new(locale, OverrideAction::Set);
		record.metadata = sanitized;
		self.append_override_record(record)
	}

	/// The live override value, if any.
	pub fn get_override(&self) -> Result<Option<Locale>> {
		match self.adapter.get(OVERRIDE_KEY)? {
			Some(json) => Ok(Some(serde_json::from_str(&json)?)),
			None => Ok(None),
		}
	}

	pub fn has_override(&self) -> Result<bool> {
		Ok(self.get_override()?.is_some())
	}

	/// Clears the manual override.
	///
	/// Removes the override key from both backends. When the current
	/// preference was override-sourced, the most recent automatic
	/// detection is restored; with no detection history the default
	/// preference takes its place.
	pub fn clear_override(&self) -> Result<()> {
		let cleared = self.get_override()?;
		let outcome = self.adapter.remove(OVERRIDE_KEY);
		if !outcome.succeeded() {
			warn!(key = OVERRIDE_KEY, "remove failed on both backends");
		}

		let current = self.get()?;
		let record_locale = cleared
			.or(current.as_ref().map(|p| p.locale))
			.unwrap_or(lingo_locale_core::DEFAULT_LOCALE);

		if current
			.as_ref()
			.is_some_and(|p| p.source == PreferenceSource::UserOverride)
		{
			let restored = self
				.latest_detection_preference()?
				.unwrap_or_else(LocalePreference::default_preference);
			debug!(locale = %restored.locale, source = %restored.source, "override cleared, preference restored");
			self.save(&restored)?;
		}

		self.append_override_record(OverrideRecord::new(record_locale, OverrideAction::Clear))
	}

	/// Override audit log, oldest first, capped at 50.
	pub fn get_override_history(&self) -> Result<Vec<OverrideRecord>> {
		match self.adapter.get(OVERRIDE_HISTORY_KEY)? {
			Some(json) => Ok(serde_json::from_str(&json)?),
			None => Ok(Vec::new()),
		}
	}

	/// Aggregated statistics over the audit log.
	pub fn get_override_stats(&self) -> Result<OverrideStats> {
		let log = self.get_override_history()?;
		let current = self.get_override()?;
		Ok(OverrideStats::from_log(&log, current))
	}

	fn append_override_record(&self, record: OverrideRecord) -> Result<()> {
		let mut log = self.get_override_history()?;
		log.push(record);
		if log.len() > OVERRIDE_HISTORY_CAP {
			let excess = log.len() - OVERRIDE_HISTORY_CAP;
			log.drain(..excess);
		}
		let json = serde_json::to_string(&log)?;
		self.write_both(OVERRIDE_HISTORY_KEY, &json)
	}

	/// Newest detection-history entry mapped back to a preference.
	fn latest_detection_preference(&self) -> Result<Option<LocalePreference>> {
		let records: Vec<lingo_locale_core::DetectionRecord> =
			match self.adapter.get(DETECTION_HISTORY_KEY)? {
				Some(json) => serde_json::from_str(&json)?,
				None => return Ok(None),
			};
		Ok(records.iter().max_by_key(|r| r.timestamp).map(|r| {
			let mut preference =
				LocalePreference::new(r.locale, PreferenceSource::Auto, r.confidence);
			preference.timestamp = r.timestamp;
			preference
		}))
	}
}
