// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! End-to-end scenarios exercised through the [`LocaleManager`] facade.

use std::sync::Arc;

use chrono::Duration;

use lingo_locale_core::{
	DetectionRecord, Locale, LocalePreference, Metadata, PreferenceSource, StorageEventType,
};
use lingo_locale_store::{
	BackendKind, BackendLimits, DualBackend, EventFilter, FileBackend, LocaleManager,
	MaintenanceOptions, MemoryBackend, StorageBackend,
};

fn in_memory_manager() -> LocaleManager {
	LocaleManager::in_memory()
}

#[test]
fn test_detect_override_clear_restores_detection() {
	let manager = in_memory_manager();

	// Browser detection lands first.
	manager
		.add_detection_record(DetectionRecord::new(Locale::Zh, "navigator", 0.95))
		.unwrap();
	manager
		.save_user_preference(&LocalePreference::new(
			Locale::Zh,
			PreferenceSource::Auto,
			0.95,
		))
		.unwrap();

	// The user picks French by hand.
	let mut metadata = Metadata::new();
	metadata.insert("ui", "settings_panel");
	manager
		.set_user_override(Locale::Fr, Some(metadata))
		.unwrap();

	let preference = manager.get_user_preference().unwrap().unwrap();
	assert_eq!(preference.locale, Locale::Fr);
	assert_eq!(preference.source, PreferenceSource::UserOverride);
	assert!(preference.is_override());

	// Clearing the override falls back to the newest detection.
	manager.clear_user_override().unwrap();
	let restored = manager.get_user_preference().unwrap().unwrap();
	assert_eq!(restored.locale, Locale::Zh);
	assert_eq!(restored.source, PreferenceSource::Auto);
	assert!(!restored.is_override());

	// The audit log saw both the set and the clear.
	let log = manager.get_override_history().unwrap();
	assert_eq!(log.len(), 2);
}

#[test]
fn test_clear_override_without_detections_uses_default() {
	let manager = in_memory_manager();
	manager.set_user_override(Locale::Ko, None).unwrap();
	manager.clear_user_override().unwrap();

	let preference = manager.get_user_preference().unwrap().unwrap();
	assert_eq!(preference.locale, manager.fallback_locale());
	assert_eq!(preference.source, PreferenceSource::Default);
}

#[test]
fn test_every_mutation_emits_exactly_one_event() {
	let manager = in_memory_manager();

	manager
		.save_user_preference(&LocalePreference::new(
			Locale::De,
			PreferenceSource::User,
			0.9,
		))
		.unwrap();
	manager
		.add_detection_record(DetectionRecord::new(Locale::De, "navigator", 0.9))
		.unwrap();
	manager.set_user_override(Locale::Ja, None).unwrap();
	manager.clear_user_override().unwrap();
	manager.clear_all().unwrap();

	let history = manager.event_history();
	let types: Vec<StorageEventType> = history.iter().map(|e| e.event_type).collect();
	// Newest first.
	assert_eq!(
		types,
		vec![
			StorageEventType::StorageCleared,
			StorageEventType::OverrideCleared,
			StorageEventType::OverrideSet,
			StorageEventType::DetectionRecorded,
			StorageEventType::PreferenceSaved,
		]
	);
}

#[test]
fn test_wildcard_listener_and_failure_isolation() {
	use std::sync::atomic::{AtomicUsize, Ordering};

	let manager = in_memory_manager();

	// A listener that always fails must not starve the one after it.
	manager.subscribe(EventFilter::All, Box::new(|_| Err("boom".into())));
	let seen = Arc::new(AtomicUsize::new(0));
	let seen_clone = Arc::clone(&seen);
	manager.subscribe(
		EventFilter::All,
		Box::new(move |_| {
			seen_clone.fetch_add(1, Ordering::SeqCst);
			Ok(())
		}),
	);

	manager.set_user_override(Locale::Es, None).unwrap();
	manager.clear_user_override().unwrap();

	assert_eq!(seen.load(Ordering::SeqCst), 2);
}

#[test]
fn test_export_import_round_trip() {
	let source = in_memory_manager();
	source
		.save_user_preference(&LocalePreference::new(
			Locale::Pt,
			PreferenceSource::User,
			0.85,
		))
		.unwrap();
	source
		.add_detection_record(DetectionRecord::new(Locale::Pt, "geolocation", 0.7))
		.unwrap();
	source
		.add_detection_record(DetectionRecord::new(Locale::Es, "navigator", 0.6))
		.unwrap();

	let package = source.export_data().unwrap();

	let target = in_memory_manager();
	let report = target.import_data(&package).unwrap();
	assert!(report.success);
	assert_eq!(report.imported_items, 2); // preference + history

	assert_eq!(
		target.get_user_preference().unwrap().unwrap().locale,
		Locale::Pt
	);
	assert_eq!(target.get_detection_history().unwrap().len(), 2);
}

#[test]
fn test_import_rejects_tampered_payload() {
	let source = in_memory_manager();
	source
		.save_user_preference(&LocalePreference::new(
			Locale::Ar,
			PreferenceSource::User,
			0.9,
		))
		.unwrap();

	let mut package = source.export_data().unwrap();
	if let Some(preference) = package.preference.as_mut() {
		preference.locale = Locale::Ru;
	}

	let target = in_memory_manager();
	let report = target.import_data(&package).unwrap();
	assert!(!report.success);
	assert!(report.errors[0].contains("integrity"));
	assert!(target.get_user_preference().unwrap().is_none());
}

#[test]
fn test_import_rejects_unknown_version() {
	let source = in_memory_manager();
	let mut package = source.export_data().unwrap();
	package.version = "2.0.0".to_string();

	let target = in_memory_manager();
	assert!(target.import_data(&package).is_err());
}

#[test]
fn test_backup_restore_after_wipe() {
	let manager = in_memory_manager();
	manager
		.save_user_preference(&LocalePreference::new(
			Locale::Ja,
			PreferenceSource::User,
			0.95,
		))
		.unwrap();
	manager.set_user_override(Locale::Ja, None).unwrap();

	let key = manager.create_backup().unwrap();
	assert!(key.starts_with("locale_backup_"));

	manager.clear_all().unwrap();
	assert!(manager.get_user_preference().unwrap().is_none());
	assert!(manager.get_user_override().unwrap().is_none());

	let report = manager.restore_backup(&key).unwrap();
	assert!(report.success);
	assert_eq!(manager.get_user_override().unwrap(), Some(Locale::Ja));
}

#[test]
fn test_repair_prefers_higher_priority_source() {
	let primary = Arc::new(MemoryBackend::new(BackendKind::Local));
	let secondary = Arc::new(MemoryBackend::new(BackendKind::Cookie));
	let adapter = DualBackend::new(primary.clone(), secondary.clone());
	let manager = LocaleManager::new(adapter);

	// Seed the backends with disagreeing preferences directly.
	let user = LocalePreference::new(Locale::Fr, PreferenceSource::User, 0.8);
	let auto = LocalePreference::new(Locale::En, PreferenceSource::Auto, 1.0);
	primary
		.set(
			"lingo_locale__preference",
			&serde_json::to_string(&auto).unwrap(),
		)
		.unwrap();
	secondary
		.set(
			"lingo_locale__preference",
			&serde_json::to_string(&user).unwrap(),
		)
		.unwrap();

	assert!(!manager.check_data_consistency().is_consistent);

	let report = manager.fix_data_inconsistency().unwrap();
	assert!(report.fixed);

	// User beats auto regardless of confidence.
	let resolved = manager.get_user_preference().unwrap().unwrap();
	assert_eq!(resolved.locale, Locale::Fr);
	assert!(manager.check_data_consistency().is_consistent);
}

#[test]
fn test_secondary_fallback_with_write_back() {
	let primary = Arc::new(MemoryBackend::new(BackendKind::Local));
	let secondary = Arc::new(MemoryBackend::new(BackendKind::Cookie));
	let manager = LocaleManager::new(DualBackend::new(primary.clone(), secondary.clone()));

	manager
		.save_user_preference(&LocalePreference::new(
			Locale::Ru,
			PreferenceSource::User,
			0.9,
		))
		.unwrap();

	// Simulate the primary store losing its copy.
	primary.remove("lingo_locale__preference").unwrap();
	let preference = manager.get_user_preference().unwrap().unwrap();
	assert_eq!(preference.locale, Locale::Ru);

	// The read healed the primary.
	assert!(primary
		.get("lingo_locale__preference")
		.unwrap()
		.is_some());
}

#[test]
fn test_survives_primary_outage() {
	let primary = Arc::new(MemoryBackend::new(BackendKind::Local));
	let secondary = Arc::new(MemoryBackend::new(BackendKind::Cookie));
	let manager = LocaleManager::new(DualBackend::new(primary.clone(), secondary));

	primary.set_disabled(true);

	// Writes still succeed through the secondary.
	manager.set_user_override(Locale::Zh, None).unwrap();
	assert_eq!(manager.get_user_override().unwrap(), Some(Locale::Zh));

	let history = manager.event_history();
	assert_eq!(history[0].event_type, StorageEventType::OverrideSet);
}

#[test]
fn test_maintenance_trims_stale_detections_and_backups() {
	let manager = in_memory_manager();

	// One stale record, one fresh.
	let mut stale = DetectionRecord::new(Locale::De, "navigator", 0.9);
	stale.timestamp = chrono::Utc::now() - Duration::days(60);
	manager.add_detection_record(stale).unwrap();
	manager
		.add_detection_record(DetectionRecord::new(Locale::De, "navigator", 0.9))
		.unwrap();

	for _ in 0..7 {
		manager.create_backup().unwrap();
		// Backup keys have millisecond resolution.
		std::thread::sleep(std::time::Duration::from_millis(2));
	}

	let report = manager
		.perform_maintenance(&MaintenanceOptions {
			max_backups: Some(3),
			..MaintenanceOptions::default()
		})
		.unwrap();

	assert_eq!(report.detections_removed, 1);
	assert_eq!(report.backups_deleted, 4);
	assert_eq!(manager.get_detection_history().unwrap().len(), 1);
	assert_eq!(manager.maintenance().list_backups().unwrap().len(), 3);
}

#[test]
fn test_file_backend_persists_across_managers() {
	let dir = tempfile::tempdir().unwrap();
	let local_path = dir.path().join("local.json");
	let cookie_path = dir.path().join("cookie.json");

	let build = |local: &std::path::Path, cookie: &std::path::Path| {
		LocaleManager::new(DualBackend::new(
			Arc::new(FileBackend::new(
				BackendKind::Local,
				local,
				BackendLimits::local_default(),
			)),
			Arc::new(FileBackend::new(
				BackendKind::Cookie,
				cookie,
				BackendLimits::cookie_default(),
			)),
		))
	};

	{
		let manager = build(&local_path, &cookie_path);
		manager
			.save_user_preference(&LocalePreference::new(
				Locale::Es,
				PreferenceSource::User,
				0.9,
			))
			.unwrap();
		manager
			.add_detection_record(DetectionRecord::new(Locale::Es, "navigator", 0.9))
			.unwrap();
	}

	let manager = build(&local_path, &cookie_path);
	let preference = manager.get_user_preference().unwrap().unwrap();
	assert_eq!(preference.locale, Locale::Es);
	assert_eq!(manager.get_detection_history().unwrap().len(), 1);

	let stats = manager.get_storage_stats().unwrap();
	assert!(stats.has_preference);
	assert_eq!(stats.detection_count, 1);
}

#[test]
fn test_detection_history_is_capped() {
	let manager = in_memory_manager();
	for i in 0..120 {
		manager
			.add_detection_record(DetectionRecord::new(
				Locale::En,
				format!("probe_{i}"),
				0.5,
			))
			.unwrap();
	}

	let history = manager.get_detection_history().unwrap();
	assert_eq!(history.len(), 100);
	// Oldest entries were dropped.
	assert_eq!(history[0].source, "probe_20");

	let recent = manager.get_recent_detections(None).unwrap();
	assert_eq!(recent.len(), 5);
	assert_eq!(recent[0].source, "probe_119");
}
