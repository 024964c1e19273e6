// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Export, import, and backup rotation.
//!
//! The export package is the only portable format. Imports run each
//! present section through the same validators the stores use and
//! accumulate per-section outcomes instead of failing fast; only a
//! version mismatch rejects the package outright.

use chrono::Utc;
use tracing::{debug, warn};

use lingo_locale_core::{
	DetectionRecord, ExportMetadata, ExportPackage, LocaleError, EXPORT_VERSION,
};

use crate::adapter::DualBackend;
use crate::backend::BackendKind;
use crate::error::{Result, StoreError};
use crate::history::DetectionHistoryStore;
use crate::keys::{backup_key, backup_key_timestamp, checksum, is_backup_key, OVERRIDE_KEY};
use crate::preference::PreferenceStore;

/// Default number of backups kept by rotation.
pub const DEFAULT_MAX_BACKUPS: usize = 5;

/// Accumulated outcome of an import.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ImportReport {
	pub success: bool,
	/// Sections written
	pub imported_items: usize,
	pub errors: Vec<String>,
}

/// One entry of a backup listing.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct BackupInfo {
	pub key: String,
	pub timestamp: Option<chrono::DateTime<Utc>>,
	/// False when the stored package no longer parses
	pub is_valid: bool,
	pub section_count: usize,
}

/// Export/import/backup operations over the persisted data set.
#[derive(Debug, Clone)]
pub struct Maintenance {
	adapter: DualBackend,
	preference: PreferenceStore,
	history: DetectionHistoryStore,
}

impl Maintenance {
	#[must_use]
	pub fn new(
		adapter: DualBackend,
		preference: PreferenceStore,
		history: DetectionHistoryStore,
	) -> Self {
		Self {
			adapter,
			preference,
			history,
		}
	}

	/// Builds a version-stamped, checksummed snapshot of all state.
	pub fn export(&self) -> Result<ExportPackage> {
		let preference = self.preference.get()?;
		let r#override = self.preference.get_override()?;
		let history = self.history.get_history()?;
		let history = if history.is_empty() {
			None
		} else {
			Some(history)
		};

		let mut package = ExportPackage {
			version: EXPORT_VERSION.to_string(),
			timestamp: Utc::now(),
			metadata: ExportMetadata {
				user_agent: format!(
					"{}/{}",
					env!("CARGO_PKG_NAME"),
					env!("CARGO_PKG_VERSION")
				),
				exported_by: "maintenance".to_string(),
				data_integrity: String::new(),
			},
			preference,
			r#override,
			history,
		};
		package.metadata.data_integrity = checksum(&package.payload_json()?);
		Ok(package)
	}

	/// Export serialized to a JSON string.
	pub fn export_json(&self) -> Result<String> {
		Ok(serde_json::to_string_pretty(&self.export()?)?)
	}

	/// Imports a package section by section.
	///
	/// An unsupported version is rejected before any write. A checksum
	/// mismatch is likewise rejected: the payload cannot be trusted.
	/// Individual invalid sections are recorded and skipped; valid
	/// sections still land.
	pub fn import(&self, package: &ExportPackage) -> Result<ImportReport> {
		package.check_version()?;

		if !package.metadata.data_integrity.is_empty() {
			let expected = checksum(&package.payload_json()?);
			if package.metadata.data_integrity != expected {
				return Ok(ImportReport {
					success: false,
					imported_items: 0,
					errors: vec!["data integrity checksum mismatch".to_string()],
				});
			}
		}

		let mut imported_items = 0;
		let mut errors = Vec::new();

		if let Some(preference) = &package.preference {
			match self.preference.save(preference) {
				Ok(()) => imported_items += 1,
				Err(e) => errors.push(format!("preference: {e}")),
			}
		}

		if let Some(locale) = package.r#override {
			match serde_json::to_string(&locale) {
				Ok(json) => {
					let outcome = self.adapter.set(OVERRIDE_KEY, &json);
					if outcome.succeeded() {
						imported_items += 1;
					} else {
						errors.push(format!(
							"override: both backends rejected the write{}",
							outcome
								.first_error()
								.map(|e| format!(" ({e})"))
								.unwrap_or_default()
						));
					}
				}
				Err(e) => errors.push(format!("override: {e}")),
			}
		}

		if let Some(history) = &package.history {
			match self.import_history(history) {
				Ok(()) => imported_items += 1,
				Err(e) => errors.push(format!("history: {e}")),
			}
		}

		let report = ImportReport {
			success: errors.is_empty(),
			imported_items,
			errors,
		};
		debug!(
			imported = report.imported_items,
			errors = report.errors.len(),
			"import finished"
		);
		Ok(report)
	}

	/// Imports from a JSON string.
	pub fn import_json(&self, json: &str) -> Result<ImportReport> {
		let package: ExportPackage = serde_json::from_str(json)
			.map_err(|e| StoreError::Locale(LocaleError::Serialization(e.to_string())))?;
		self.import(&package)
	}

	fn import_history(&self, records: &[DetectionRecord]) -> Result<()> {
		for record in records {
			record.validate()?;
		}
		self.history.clear()?;
		for record in records {
			self.history.add_record(record.clone())?;
		}
		Ok(())
	}

	/// Writes a backup under `locale_backup_<ms>` and returns its key.
	///
	/// Backups live only in the local store; a full package does not
	/// fit the cookie store's per-value limit.
	pub fn create_backup(&self) -> Result<String> {
		let package = self.export()?;
		let key = backup_key(package.timestamp);
		let json = serde_json::to_string(&package)?;
		self
			.adapter
			.set_single(BackendKind::Local, &key, &json)?;
		debug!(key = %key, bytes = json.len(), "backup created");
		Ok(key)
	}

	/// Enumerates backups, newest first. Malformed entries are marked
	/// invalid rather than dropped or thrown.
	pub fn list_backups(&self) -> Result<Vec<BackupInfo>> {
		let keys = self.adapter.backend(BackendKind::Local).keys()?;
		let mut backups: Vec<BackupInfo> = keys
			.into_iter()
			.filter(|k| is_backup_key(k))
			.map(|key| self.describe_backup(key))
			.collect();
		backups.sort_by_key(|b| std::cmp::Reverse(b.timestamp));
		Ok(backups)
	}

	fn describe_backup(&self, key: String) -> BackupInfo {
		let timestamp =
			backup_key_timestamp(&key).and_then(chrono::DateTime::from_timestamp_millis);
		let stored = self
			.adapter
			.get_from(BackendKind::Local, &key)
			.ok()
			.flatten();
		let package = stored.and_then(|json| serde_json::from_str::<ExportPackage>(&json).ok());

		match package {
			Some(pkg) => BackupInfo {
				key,
				timestamp,
				is_valid: pkg.check_version().is_ok(),
				section_count: pkg.section_count(),
			},
			None => {
				warn!(key = %key, "malformed backup entry");
				BackupInfo {
					key,
					timestamp,
					is_valid: false,
					section_count: 0,
				}
			}
		}
	}

	/// Re-imports the package stored under a backup key.
	pub fn restore_backup(&self, key: &str) -> Result<ImportReport> {
		if !is_backup_key(key) {
			return Err(StoreError::Locale(LocaleError::Validation(format!(
				"not a backup key: {key}"
			))));
		}
		let json = self
			.adapter
			.get_from(BackendKind::Local, key)?
			.ok_or_else(|| StoreError::NotFound(key.to_string()))?;
		let package: ExportPackage = serde_json::from_str(&json)?;
		self.import(&package)
	}

	/// Deletes one backup after validating the key pattern.
	pub fn delete_backup(&self, key: &str) -> Result<()> {
		if !is_backup_key(key) {
			return Err(StoreError::Locale(LocaleError::Validation(format!(
				"not a backup key: {key}"
			))));
		}
		self
			.adapter
			.backend(BackendKind::Local)
			.remove(key)
			.map_err(StoreError::from)
	}

	/// Deletes the oldest backups beyond `max_count`, returning how
	/// many were removed.
	pub fn cleanup_old_backups(&self, max_count: Option<usize>) -> Result<usize> {
		let max_count = max_count.unwrap_or(DEFAULT_MAX_BACKUPS);
		let backups = self.list_backups()?;
		if backups.len() <= max_count {
			return Ok(0);
		}

		let mut deleted = 0;
		// listing is newest first; everything past max_count is excess
		for backup in &backups[max_count..] {
			match self.delete_backup(&backup.key) {
				Ok(()) => deleted += 1,
				Err(e) => warn!(key = %backup.key, error = %e, "backup cleanup failed"),
			}
		}
		debug!(deleted, kept = max_count, "backup rotation finished");
		Ok(deleted)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc;

	use lingo_locale_core::{Locale, LocalePreference, PreferenceSource};

	use crate::backend::{BackendLimits, MemoryBackend, StorageBackend};

	struct Fixture {
		primary: Arc<MemoryBackend>,
		maintenance: Maintenance,
		preference: PreferenceStore,
		history: DetectionHistoryStore,
	}

	fn fixture() -> Fixture {
		let primary = Arc::new(MemoryBackend::new(BackendKind::Local));
		let secondary = Arc::new(MemoryBackend::with_limits(
			BackendKind::Cookie,
			BackendLimits::cookie_default(),
		));
		let adapter = DualBackend::new(primary.clone(), secondary);
		let preference = PreferenceStore::new(adapter.clone());
		let history = DetectionHistoryStore::new(adapter.clone());
		let maintenance = Maintenance::new(adapter, preference.clone(), history.clone());
		Fixture {
			primary,
			maintenance,
			preference,
			history,
		}
	}

	fn populate(f: &Fixture) {
		f.preference
			.save(&LocalePreference::new(Locale::Zh, PreferenceSource::User, 0.9))
			.unwrap();
		f.preference.set_override(Locale::Zh, None).unwrap();
		f.history
			.add_record(DetectionRecord::new(Locale::En, "browser", 0.6))
			.unwrap();
	}

	#[test]
	fn test_export_import_roundtrip_empty_store() {
		let f = fixture();
		let package = f.maintenance.export().unwrap();
		assert_eq!(package.section_count(), 0);

		let report = f.maintenance.import(&package).unwrap();
		assert!(report.success);
		assert_eq!(report.imported_items, 0);
	}

	#[test]
	fn test_export_import_roundtrip_preference_only() {
		let f = fixture();
		f.preference
			.save(&LocalePreference::new(Locale::Ja, PreferenceSource::Auto, 0.7))
			.unwrap();

		let package = f.maintenance.export().unwrap();
		assert_eq!(package.section_count(), 1);

		let g = fixture();
		let report = g.maintenance.import(&package).unwrap();
		assert!(report.success);
		assert_eq!(report.imported_items, 1);
		assert_eq!(g.preference.get().unwrap().unwrap().locale, Locale::Ja);
	}

	#[test]
	fn test_export_import_roundtrip_full_store() {
		let f = fixture();
		populate(&f);

		let package = f.maintenance.export().unwrap();
		assert_eq!(package.section_count(), 3);
		assert_eq!(package.metadata.data_integrity.len(), 64);

		let g = fixture();
		let report = g.maintenance.import(&package).unwrap();
		assert!(report.success);
		assert_eq!(report.imported_items, 3);
		assert_eq!(g.preference.get_override().unwrap(), Some(Locale::Zh));
		assert_eq!(g.history.get_history().unwrap().len(), 1);
	}

	#[test]
	fn test_import_rejects_wrong_version_without_writes() {
		let f = fixture();
		populate(&f);
		let mut package = f.maintenance.export().unwrap();
		package.version = "2.0.0".to_string();

		let g = fixture();
		let err = g.maintenance.import(&package).unwrap_err();
		assert!(matches!(
			err,
			StoreError::Locale(LocaleError::VersionMismatch { .. })
		));
		assert!(g.preference.get().unwrap().is_none());
		assert!(g.history.get_history().unwrap().is_empty());
	}

	#[test]
	fn test_import_rejects_tampered_payload() {
		let f = fixture();
		populate(&f);
		let mut package = f.maintenance.export().unwrap();
		package.r#override = Some(Locale::Ru);

		let g = fixture();
		let report = g.maintenance.import(&package).unwrap();
		assert!(!report.success);
		assert_eq!(report.imported_items, 0);
		assert!(report.errors[0].contains("checksum"));
	}

	#[test]
	fn test_import_accumulates_section_errors() {
		let f = fixture();
		populate(&f);
		let mut package = f.maintenance.export().unwrap();
		// break one section, leave the rest valid
		if let Some(pref) = &mut package.preference {
			pref.confidence = 42.0;
		}
		package.metadata.data_integrity = checksum(&package.payload_json().unwrap());

		let g = fixture();
		let report = g.maintenance.import(&package).unwrap();
		assert!(!report.success);
		assert_eq!(report.imported_items, 2);
		assert_eq!(report.errors.len(), 1);
		assert!(report.errors[0].starts_with("preference:"));
		// the valid sections still landed
		assert_eq!(g.preference.get_override().unwrap(), Some(Locale::Zh));
	}

	#[test]
	fn test_import_json_parse_failure() {
		let f = fixture();
		assert!(f.maintenance.import_json("{not json").is_err());
	}

	#[test]
	fn test_export_json_import_json_roundtrip() {
		let f = fixture();
		populate(&f);
		let json = f.maintenance.export_json().unwrap();

		let g = fixture();
		let report = g.maintenance.import_json(&json).unwrap();
		assert!(report.success);
		assert_eq!(report.imported_items, 3);
	}

	#[test]
	fn test_backup_create_list_restore() {
		let f = fixture();
		populate(&f);
		let key = f.maintenance.create_backup().unwrap();
		assert!(is_backup_key(&key));

		let listed = f.maintenance.list_backups().unwrap();
		assert_eq!(listed.len(), 1);
		assert!(listed[0].is_valid);
		assert_eq!(listed[0].section_count, 3);

		let report = f.maintenance.restore_backup(&key).unwrap();
		assert!(report.success);
		assert_eq!(report.imported_items, 3);
	}

	#[test]
	fn test_backup_only_in_local_store() {
		let f = fixture();
		populate(&f);
		let key = f.maintenance.create_backup().unwrap();
		assert!(f.primary.get(&key).unwrap().is_some());
	}

	#[test]
	fn test_malformed_backup_marked_invalid() {
		let f = fixture();
		f.primary.set("locale_backup_123", "not json").unwrap();

		let listed = f.maintenance.list_backups().unwrap();
		assert_eq!(listed.len(), 1);
		assert!(!listed[0].is_valid);
	}

	#[test]
	fn test_restore_missing_backup_not_found() {
		let f = fixture();
		assert!(matches!(
			f.maintenance.restore_backup("locale_backup_42"),
			Err(StoreError::NotFound(_))
		));
	}

	#[test]
	fn test_delete_backup_validates_pattern() {
		let f = fixture();
		assert!(f.maintenance.delete_backup("some_other_key").is_err());
		assert!(f
			.maintenance
			.delete_backup(crate::keys::PREFERENCE_KEY)
			.is_err());
	}

	#[test]
	fn test_cleanup_old_backups() {
		let f = fixture();
		for i in 0..6 {
			let package = f.maintenance.export().unwrap();
			let key = format!("locale_backup_{}", 1000 + i);
			let json = serde_json::to_string(&package).unwrap();
			f.primary.set(&key, &json).unwrap();
		}

		let deleted = f.maintenance.cleanup_old_backups(Some(3)).unwrap();
		assert_eq!(deleted, 3);

		let remaining = f.maintenance.list_backups().unwrap();
		assert_eq!(remaining.len(), 3);
		// the newest three survived
		let keys: Vec<&str> = remaining.iter().map(|b| b.key.as_str()).collect();
		assert_eq!(
			keys,
			vec!["locale_backup_1005", "locale_backup_1004", "locale_backup_1003"]
		);
	}

	#[test]
	fn test_cleanup_under_limit_is_noop() {
		let f = fixture();
		f.maintenance.create_backup().unwrap();
		assert_eq!(f.maintenance.cleanup_old_backups(None).unwrap(), 0);
	}
}
