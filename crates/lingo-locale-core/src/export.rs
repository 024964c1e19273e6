// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The versioned, portable export package schema.
//!
//! This is the only on-disk/portable format. Forward-incompatible
//! versions are rejected outright; there is no partial upgrade path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::detection::DetectionRecord;
use crate::error::LocaleError;
use crate::locale::Locale;
use crate::preference::LocalePreference;

/// Schema version this engine writes and accepts.
pub const EXPORT_VERSION: &str = "1.0.0";

/// Export package metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportMetadata {
	/// Environment string of the exporting host
	pub user_agent: String,
	/// Component that produced the export
	pub exported_by: String,
	/// Hex SHA-256 over the serialized payload sections
	pub data_integrity: String,
}

/// A complete portable snapshot of persisted engine state.
///
/// Absent sections were simply not present in the store at export time;
/// import treats each present section independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportPackage {
	pub version: String,
	pub timestamp: DateTime<Utc>,
	pub metadata: ExportMetadata,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub preference: Option<LocalePreference>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub r#override: Option<Locale>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub history: Option<Vec<DetectionRecord>>,
}

impl ExportPackage {
	/// Rejects packages whose schema version this engine cannot read.
	pub fn check_version(&self) -> Result<(), LocaleError> {
		if self.version == EXPORT_VERSION {
			Ok(())
		} else {
			Err(LocaleError::VersionMismatch {
				found: self.version.clone(),
				expected: EXPORT_VERSION.to_string(),
			})
		}
	}

	/// Number of data sections present in this package.
	#[must_use]
	pub fn section_count(&self) -> usize {
		usize::from(self.preference.is_some())
			+ usize::from(self.r#override.is_some())
			+ usize::from(self.history.is_some())
	}

	/// Canonical JSON of the payload sections, the checksum input.
	///
	/// Only the data sections participate; the envelope (version,
	/// timestamp, metadata) is excluded so the checksum survives
	/// re-stamping.
	pub fn payload_json(&self) -> Result<String, LocaleError> {
		let payload = serde_json::json!({
			"preference": self.preference,
			"override": self.r#override,
			"history": self.history,
		});
		Ok(serde_json::to_string(&payload)?)
	}
}
