// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Automatic locale-detection events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LocaleError;
use crate::locale::Locale;
use crate::metadata::Metadata;

/// Maximum number of detection records retained; oldest dropped first.
pub const DETECTION_HISTORY_CAP: usize = 100;

/// One automatic locale-guess event from some detector.
///
/// Immutable once written; the history store only appends and truncates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
	pub locale: Locale,
	/// Free-form detector id, e.g. "browser", "geo"
	pub source: String,
	/// Detector confidence in [0, 1]
	pub confidence: f64,
	pub timestamp: DateTime<Utc>,
	#[serde(default)]
	pub metadata: Metadata,
}

impl DetectionRecord {
	/// Creates a record stamped with the current time.
	#[must_use]
	pub fn new(locale: Locale, source: impl Into<String>, confidence: f64) -> Self {
		Self {
			locale,
			source: source.into(),
			confidence,
			timestamp: Utc::now(),
			metadata: Metadata::new(),
		}
	}

	/// Validates the record shape before it enters the log.
	pub fn validate(&self) -> Result<(), LocaleError> {
		if self.source.trim().is_empty() {
			return Err(LocaleError::Validation(
				"detection source must not be empty".to_string(),
			));
		}
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
		Ok(())
	}
}
