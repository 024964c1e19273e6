// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Storage events emitted on every mutating engine operation.
//!
//! # Events
//!
//! - `preference.saved` - Preference replaced
//! - `override.set` / `override.cleared` - Manual override changed
//! - `detection.recorded` - Detection appended to history
//! - `history.trimmed` - Expired detections removed
//! - `storage.cleared` - All engine data removed
//! - `storage.synced` - Cross-backend reconciliation ran
//! - `data.exported` / `data.imported` - Portable snapshot moved
//! - `backup.created` / `backup.restored` - Backup rotation
//! - `storage.error` - A mutating operation failed

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of events retained in the bus history, newest first.
pub const EVENT_HISTORY_CAP: usize = 100;

/// Discriminant for a storage event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageEventType {
	#[serde(rename = "preference.saved")]
	PreferenceSaved,
	#[serde(rename = "override.set")]
	OverrideSet,
	#[serde(rename = "override.cleared")]
	OverrideCleared,
	#[serde(rename = "detection.recorded")]
	DetectionRecorded,
	#[serde(rename = "history.trimmed")]
	HistoryTrimmed,
	#[serde(rename = "storage.cleared")]
	StorageCleared,
	#[serde(rename = "storage.synced")]
	StorageSynced,
	#[serde(rename = "data.exported")]
	DataExported,
	#[serde(rename = "data.imported")]
	DataImported,
	#[serde(rename = "backup.created")]
	BackupCreated,
	#[serde(rename = "backup.restored")]
	BackupRestored,
	#[serde(rename = "storage.error")]
	StorageError,
}

impl StorageEventType {
	/// Returns the event type name as a string.
	#[must_use]
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageEventType::PreferenceSaved => "preference.saved",
			StorageEventType::OverrideSet => "override.set",
			StorageEventType::OverrideCleared => "override.cleared",
			StorageEventType::DetectionRecorded => "detection.recorded",
			StorageEventType::HistoryTrimmed => "history.trimmed",
			StorageEventType::StorageCleared => "storage.cleared",
			StorageEventType::StorageSynced => "storage.synced",
			StorageEventType::DataExported => "data.exported",
			StorageEventType::DataImported => "data.imported",
			StorageEventType::BackupCreated => "backup.created",
			StorageEventType::BackupRestored => "backup.restored",
			StorageEventType::StorageError => "storage.error",
		}
	}
}

impl std::fmt::Display for StorageEventType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

/// One emitted storage event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageEvent {
	#[serde(rename = "type")]
	pub event_type: StorageEventType,
	pub timestamp: DateTime<Utc>,
	/// Component that emitted the event, e.g. "manager", "maintenance"
	pub source: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<serde_json::Value>,
}

impl StorageEvent {
	/// Creates an event stamped with the current time.
	#[must_use]
	pub fn new(event_type: StorageEventType, source: impl Into<String>) -> Self {
		Self {
			event_type,
			timestamp: Utc::now(),
			source: source.into(),
			data: None,
		}
	}

	/// Attaches a JSON payload.
	#[must_use]
	pub fn with_data(mut self, data: serde_json::Value) -> Self {
		self.data = Some(data);
		self
	}

	/// Creates an error event describing a failed mutating operation.
	#[must_use]
	pub fn error(source: impl Into<String>, operation: &str, message: &str) -> Self {
		Self::new(StorageEventType::StorageError, source).with_data(serde_json::json!({
			"operation": operation,
			"message": message,
		}))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_event_type_serde_uses_dotted_names() {
		let json = serde_json::to_string(&StorageEventType::OverrideSet).unwrap();
		assert_eq!(json, "\"override.set\"");

		let back: StorageEventType = serde_json::from_str("\"storage.synced\"").unwrap();
		assert_eq!(back, StorageEventType::StorageSynced);
	}

	#[test]
	fn test_as_str_matches_serde() {
		let all = [
			StorageEventType::PreferenceSaved,
			StorageEventType::OverrideSet,
			StorageEventType::OverrideCleared,
			StorageEventType::DetectionRecorded,
			StorageEventType::HistoryTrimmed,
			StorageEventType::StorageCleared,
			StorageEventType::StorageSynced,
			StorageEventType::DataExported,
			StorageEventType::DataImported,
			StorageEventType::BackupCreated,
			StorageEventType::BackupRestored,
			StorageEventType::StorageError,
		];
		for t in all {
			let json = serde_json::to_string(&t).unwrap();
			assert_eq!(json, format!("\"{}\"", t.as_str()));
		}
	}

	#[test]
	fn test_error_event_payload() {
		let event = StorageEvent::error("manager", "save_user_preference", "quota exceeded");
		assert_eq!(event.event_type, StorageEventType::StorageError);
		let data = event.data.unwrap();
		assert_eq!(data["operation"], "save_user_preference");
		assert_eq!(data["message"], "quota exceeded");
	}
}
