// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The current locale preference record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LocaleError;
use crate::locale::{Locale, DEFAULT_LOCALE};
use crate::metadata::Metadata;

/// How a preference value came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferenceSource {
	/// Guessed by an automatic detector
	Auto,
	/// Chosen by the user
	User,
	/// Manually forced by the user, wins over everything
	UserOverride,
	/// Engine fallback
	Default,
}

impl PreferenceSource {
	/// Conflict-resolution tier: `user_override > user > auto > default`.
	#[must_use]
	pub fn priority(&self) -> u8 {
		match self {
			PreferenceSource::UserOverride => 3,
			PreferenceSource::User => 2,
			PreferenceSource::Auto => 1,
			PreferenceSource::Default => 0,
		}
	}
}

impl std::fmt::Display for PreferenceSource {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			PreferenceSource::Auto => write!(f, "auto"),
			PreferenceSource::User => write!(f, "user"),
			PreferenceSource::UserOverride => write!(f, "user_override"),
			PreferenceSource::Default => write!(f, "default"),
		}
	}
}

impl std::str::FromStr for PreferenceSource {
	type Err = LocaleError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"auto" => Ok(PreferenceSource::Auto),
			"user" => Ok(PreferenceSource::User),
			"user_override" => Ok(PreferenceSource::UserOverride),
			"default" => Ok(PreferenceSource::Default),
			_ => Err(LocaleError::Validation(format!(
				"invalid preference source: {s}"
			))),
		}
	}
}

/// The single current locale preference.
///
/// Exactly one of these is live at a time; saves replace it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalePreference {
	pub locale: Locale,
	pub source: PreferenceSource,
	/// Detector confidence in [0, 1]
	pub confidence: f64,
	pub timestamp: DateTime<Utc>,
	#[serde(default)]
	pub metadata: Metadata,
}

impl LocalePreference {
	/// Creates a preference stamped with the current time.
	#[must_use]
	pub fn new(locale: Locale, source: PreferenceSource, confidence: f64) -> Self {
		Self {
			locale,
			source,
			confidence,
			timestamp: Utc::now(),
			metadata: Metadata::new(),
		}
	}

	/// The fallback preference used when nothing was ever stored.
	#[must_use]
	pub fn default_preference() -> Self {
		Self::new(DEFAULT_LOCALE, PreferenceSource::Default, 0.5)
	}

	/// Whether `metadata.isOverride` marks this as a manual override.
	#[must_use]
	pub fn is_override(&self) -> bool {
		self
			.metadata
			.get("isOverride")
			.and_then(|v| v.as_bool())
			.unwrap_or(false)
	}

	/// Validates the record shape.
	///
	/// The locale is already typed, so this checks the numeric range of
	/// `confidence`, a plausible timestamp, metadata sanitization, and
	/// agreement between `source` and `metadata.isOverride`.
	pub fn validate(&self) -> Result<(), LocaleError> {
		if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
			return Err(LocaleError::Validation(format!(
				"confidence out of range: {}",
				self.confidence
			)));
		}
		if self.timestamp.timestamp_millis() <= 0 {
			return Err(LocaleError::Validation(format!(
				"timestamp not plausible: {}",
				self.timestamp
			)));
		}
		if !self.metadata.is_sanitized() {
			return Err(LocaleError::Validation(
				"metadata contains unsafe entries".to_string(),
			));
		}
		let marked = self.is_override();
		let sourced = self.source == PreferenceSource::UserOverride;
		if marked != sourced && (sourced || self.metadata.get("isOverride").is_some()) {
			return Err(LocaleError::Validation(format!(
				"metadata.isOverride = {marked} disagrees with source = {}",
				self.source
			)));
		}
		Ok(())
	}

	/// Ranks two preferences for conflict resolution.
	///
	/// Higher source tier wins; confidence breaks ties within a tier.
	#[must_use]
	pub fn outranks(&self, other: &LocalePreference) -> bool {
		match self.source.priority().cmp(&other.source.priority()) {
			std::cmp::Ordering::Greater => true,
			std::cmp::Ordering::Less => false,
			std::cmp::Ordering::Equal => self.confidence > other.confidence,
		}
	}
}
