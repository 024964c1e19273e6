// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Facade over the locale storage engine.
//!
//! [`LocaleManager`] owns the dual backend, the preference and history
//! stores, the TTL cache, the event bus, the consistency checker and
//! the maintenance layer, and is the only surface callers need. Every
//! mutating call emits exactly one [`StorageEvent`]: the matching
//! success event, or `storage.error` when the call fails.

use chrono::Duration;
use serde::Serialize;
use tracing::{debug, warn};

use lingo_locale_core::{
	DetectionRecord, ExportPackage, Locale, LocaleError, LocalePreference, Metadata,
	OverrideRecord, OverrideStats, StorageEvent, StorageEventType, DEFAULT_LOCALE,
};

use crate::adapter::DualBackend;
use crate::backend::{BackendKind, MemoryBackend};
use crate::bus::{EventBus, EventFilter, EventListener, ListenerId};
use crate::cache::{TtlCache, DEFAULT_TTL_MINUTES};
use crate::consistency::{ConsistencyChecker, ConsistencyReport, RepairReport, SyncReport};
use crate::error::{Result, StoreError};
use crate::health::{BackendStats, IntegrityReport, StorageStats};
use crate::history::DetectionHistoryStore;
use crate::keys::{self, LOGICAL_KEYS, PREFERENCE_KEY};
use crate::maintenance::{ImportReport, Maintenance};
use crate::preference::PreferenceStore;

/// Detections older than this are dropped by the default maintenance
/// pass.
pub const DEFAULT_DETECTION_MAX_AGE_DAYS: i64 = 30;

/// Event source tag for events emitted by the facade.
const EVENT_SOURCE: &str = "manager";

/// Cache key under which derived storage statistics are memoized.
const STATS_CACHE_KEY: &str = "storage_stats";

/// Knobs for [`LocaleManager::perform_maintenance`].
#[derive(Debug, Clone)]
pub struct MaintenanceOptions {
	/// Drop expired cache entries
	pub sweep_cache: bool,
	/// Run the cross-backend consistency check
	pub check_consistency: bool,
	/// Repair inconsistencies found by the check
	pub auto_repair: bool,
	/// Drop detections older than this; `None` skips the cleanup
	pub cleanup_detections_max_age: Option<Duration>,
	/// Rotate backups down to this many; `None` skips rotation
	pub max_backups: Option<usize>,
}

impl Default for MaintenanceOptions {
	fn default() -> Self {
		Self {
			sweep_cache: true,
			check_consistency: true,
			auto_repair: false,
			cleanup_detections_max_age: Some(Duration::days(DEFAULT_DETECTION_MAX_AGE_DAYS)),
			max_backups: Some(crate::maintenance::DEFAULT_MAX_BACKUPS),
		}
	}
}

/// What one maintenance pass did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MaintenanceReport {
	pub cache_entries_swept: usize,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub consistency: Option<ConsistencyReport>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub repair: Option<RepairReport>,
	pub detections_removed: usize,
	pub backups_deleted: usize,
}

/// Single entry point for locale preference storage.
///
/// Constructed explicitly from two backends; there is no process-wide
/// singleton. Cloning is cheap and every clone shares the same
/// backends, cache and event bus.
#[derive(Clone)]
pub struct LocaleManager {
	adapter: DualBackend,
	preference: PreferenceStore,
	history: DetectionHistoryStore,
	checker: ConsistencyChecker,
	maintenance: Maintenance,
	cache: TtlCache,
	bus: EventBus,
}

impl LocaleManager {
	/// Builds a manager over the given backend pair with the default
	/// five-minute stats cache.
	#[must_use]
	pub fn new(adapter: DualBackend) -> Self {
		Self::with_cache_ttl(adapter, Duration::minutes(DEFAULT_TTL_MINUTES))
	}

	/// Builds a manager with an explicit stats cache TTL.
	#[must_use]
	pub fn with_cache_ttl(adapter: DualBackend, ttl: Duration) -> Self {
		let preference = PreferenceStore::new(adapter.clone());
		let history = DetectionHistoryStore::new(adapter.clone());
		let checker = ConsistencyChecker::new(adapter.clone());
		let maintenance = Maintenance::new(adapter.clone(), preference.clone(), history.clone());
		Self {
			adapter,
			preference,
			history,
			checker,
			maintenance,
			cache: TtlCache::with_ttl(ttl),
			bus: EventBus::new(),
		}
	}

	/// Manager over two in-memory backends, for tests and ephemeral
	/// sessions.
	#[must_use]
	pub fn in_memory() -> Self {
		Self::new(DualBackend::new(
			std::sync::Arc::new(MemoryBackend::new(BackendKind::Local)),
			std::sync::Arc::new(MemoryBackend::new(BackendKind::Cookie)),
		))
	}

	/// Locale used when nothing is stored and detection is silent.
	#[must_use]
	pub fn fallback_locale(&self) -> Locale {
		DEFAULT_LOCALE
	}

	// ---- preference ----

	/// Validates and persists a preference to both backends.
	pub fn save_user_preference(&self, preference: &LocalePreference) -> Result<()> {
		match self.preference.save(preference) {
			Ok(()) => {
				self.cache.invalidate(Some(STATS_CACHE_KEY));
				self.emit(
					StorageEvent::new(StorageEventType::PreferenceSaved, EVENT_SOURCE).with_data(
						serde_json::json!({
							"locale": preference.locale,
							"source": preference.source,
						}),
					),
				);
				Ok(())
			}
			Err(err) => self.fail("save_user_preference", err),
		}
	}

	/// Currently persisted preference, if any.
	pub fn get_user_preference(&self) -> Result<Option<LocalePreference>> {
		self.preference.get()
	}

	/// Shape-validates a preference without persisting it.
	pub fn validate_preference(
		&self,
		preference: &LocalePreference,
	) -> std::result::Result<(), LocaleError> {
		self.preference.validate(preference)
	}

	/// Adjusts the confidence of the stored preference in place.
	pub fn update_preference_confidence(&self, confidence: f64) -> Result<LocalePreference> {
		match self.preference.update_confidence(confidence) {
			Ok(updated) => {
				self.cache.invalidate(Some(STATS_CACHE_KEY));
				self.emit(
					StorageEvent::new(StorageEventType::PreferenceSaved, EVENT_SOURCE).with_data(
						serde_json::json!({
							"locale": updated.locale,
							"source": updated.source,
							"confidence": updated.confidence,
						}),
					),
				);
				Ok(updated)
			}
			Err(err) => self.fail("update_preference_confidence", err),
		}
	}

	// ---- override ----

	/// Sets a manual override and records it in the audit log.
	pub fn set_user_override(&self, locale: Locale, metadata: Option<Metadata>) -> Result<()> {
		match self.preference.set_override(locale, metadata) {
			Ok(()) => {
				self.cache.invalidate(Some(STATS_CACHE_KEY));
				self.emit(
					StorageEvent::new(StorageEventType::OverrideSet, EVENT_SOURCE)
						.with_data(serde_json::json!({ "locale": locale })),
				);
				Ok(())
			}
			Err(err) => self.fail("set_user_override", err),
		}
	}

	/// Active manual override, if any.
	pub fn get_user_override(&self) -> Result<Option<Locale>> {
		self.preference.get_override()
	}

	/// Removes the manual override and restores the best non-override
	/// preference.
	pub fn clear_user_override(&self) -> Result<()> {
		let cleared = self.preference.get_override().unwrap_or(None);
		match self.preference.clear_override() {
			Ok(()) => {
				self.cache.invalidate(Some(STATS_CACHE_KEY));
				self.emit(
					StorageEvent::new(StorageEventType::OverrideCleared, EVENT_SOURCE)
						.with_data(serde_json::json!({ "cleared": cleared })),
				);
				Ok(())
			}
			Err(err) => self.fail("clear_user_override", err),
		}
	}

	/// Override audit log, oldest first.
	pub fn get_override_history(&self) -> Result<Vec<OverrideRecord>> {
		self.preference.get_override_history()
	}

	/// Aggregate statistics over the override audit log.
	pub fn get_override_stats(&self) -> Result<OverrideStats> {
		self.preference.get_override_stats()
	}

	// ---- detection history ----

	/// Appends a detection record, trimming the history to its cap.
	pub fn add_detection_record(&self, record: DetectionRecord) -> Result<()> {
		let summary = serde_json::json!({
			"locale": record.locale,
			"source": record.source,
			"confidence": record.confidence,
		});
		match self.history.add_record(record) {
			Ok(()) => {
				self.cache.invalidate(Some(STATS_CACHE_KEY));
				self.emit(
					StorageEvent::new(StorageEventType::DetectionRecorded, EVENT_SOURCE)
						.with_data(summary),
				);
				Ok(())
			}
			Err(err) => self.fail("add_detection_record", err),
		}
	}

	/// Full detection history, oldest first.
	pub fn get_detection_history(&self) -> Result<Vec<DetectionRecord>> {
		self.history.get_history()
	}

	/// Most recent detections, newest first.
	pub fn get_recent_detections(&self, limit: Option<usize>) -> Result<Vec<DetectionRecord>> {
		self.history.get_recent(limit)
	}

	/// Drops detections older than `max_age` (default 30 days).
	pub fn cleanup_expired_detections(&self, max_age: Option<Duration>) -> Result<usize> {
		let max_age = max_age.unwrap_or_else(|| Duration::days(DEFAULT_DETECTION_MAX_AGE_DAYS));
		match self.history.cleanup_expired(max_age) {
			Ok(removed) => {
				self.cache.invalidate(Some(STATS_CACHE_KEY));
				self.emit(
					StorageEvent::new(StorageEventType::HistoryTrimmed, EVENT_SOURCE)
						.with_data(serde_json::json!({ "removed": removed })),
				);
				Ok(removed)
			}
			Err(err) => self.fail("cleanup_expired_detections", err),
		}
	}

	/// Query layer over the detection history.
	#[must_use]
	pub fn history(&self) -> &DetectionHistoryStore {
		&self.history
	}

	// ---- wipe ----

	/// Removes preference, override and both history logs from both
	/// backends. Backups are left in place so a restore stays possible.
	pub fn clear_all(&self) -> Result<()> {
		let mut first_error = None;
		for key in LOGICAL_KEYS {
			let outcome = self.adapter.remove(key);
			if !outcome.succeeded() && first_error.is_none() {
				first_error = outcome.first_error().map(|e| e.to_string());
			}
		}
		self.cache.invalidate(None);
		match first_error {
			None => {
				self.emit(StorageEvent::new(
					StorageEventType::StorageCleared,
					EVENT_SOURCE,
				));
				Ok(())
			}
			Some(message) => {
				warn!(%message, "clear_all failed on both backends for at least one key");
				self.fail("clear_all", StoreError::Unavailable(message))
			}
		}
	}

	// ---- consistency ----

	/// Non-destructive cross-backend consistency check.
	#[must_use]
	pub fn check_data_consistency(&self) -> ConsistencyReport {
		self.checker.check()
	}

	/// Repairs cross-backend inconsistencies using source-priority
	/// resolution.
	pub fn fix_data_inconsistency(&self) -> Result<RepairReport> {
		match self.checker.repair() {
			Ok(report) => {
				self.cache.invalidate(None);
				self.emit(
					StorageEvent::new(StorageEventType::StorageSynced, EVENT_SOURCE).with_data(
						serde_json::json!({
							"operation": "repair",
							"fixed": report.fixed,
							"actions": report.actions,
						}),
					),
				);
				Ok(report)
			}
			Err(err) => self.fail("fix_data_inconsistency", err),
		}
	}

	/// Full reconciliation pass; the report carries before and after
	/// snapshots of both backends.
	pub fn sync_preference_data(&self) -> Result<SyncReport> {
		match self.checker.sync() {
			Ok(report) => {
				self.cache.invalidate(None);
				self.emit(
					StorageEvent::new(StorageEventType::StorageSynced, EVENT_SOURCE).with_data(
						serde_json::json!({
							"changed": report.changed,
							"actions": report.actions,
						}),
					),
				);
				Ok(report)
			}
			Err(err) => self.fail("sync_preference_data", err),
		}
	}

	// ---- export / import / backup ----

	/// Version-stamped, checksummed snapshot of all stored state.
	pub fn export_data(&self) -> Result<ExportPackage> {
		match self.maintenance.export() {
			Ok(package) => {
				self.emit(
					StorageEvent::new(StorageEventType::DataExported, EVENT_SOURCE).with_data(
						serde_json::json!({ "sections": package.section_count() }),
					),
				);
				Ok(package)
			}
			Err(err) => self.fail("export_data", err),
		}
	}

	/// Imports a snapshot; partial failures are reported, not raised.
	pub fn import_data(&self, package: &ExportPackage) -> Result<ImportReport> {
		match self.maintenance.import(package) {
			Ok(report) => {
				self.cache.invalidate(None);
				self.emit(
					StorageEvent::new(StorageEventType::DataImported, EVENT_SOURCE).with_data(
						serde_json::json!({
							"success": report.success,
							"imported_items": report.imported_items,
						}),
					),
				);
				Ok(report)
			}
			Err(err) => self.fail("import_data", err),
		}
	}

	/// Writes a timestamped backup to the primary backend.
	pub fn create_backup(&self) -> Result<String> {
		match self.maintenance.create_backup() {
			Ok(key) => {
				self.emit(
					StorageEvent::new(StorageEventType::BackupCreated, EVENT_SOURCE)
						.with_data(serde_json::json!({ "key": key })),
				);
				Ok(key)
			}
			Err(err) => self.fail("create_backup", err),
		}
	}

	/// Restores a previously created backup by key.
	pub fn restore_backup(&self, key: &str) -> Result<ImportReport> {
		match self.maintenance.restore_backup(key) {
			Ok(report) => {
				self.cache.invalidate(None);
				self.emit(
					StorageEvent::new(StorageEventType::BackupRestored, EVENT_SOURCE).with_data(
						serde_json::json!({
							"key": key,
							"imported_items": report.imported_items,
						}),
					),
				);
				Ok(report)
			}
			Err(err) => self.fail("restore_backup", err),
		}
	}

	/// Listing, deletion and JSON-level export/import live here.
	#[must_use]
	pub fn maintenance(&self) -> &Maintenance {
		&self.maintenance
	}

	/// Runs the configured maintenance steps and emits one summary
	/// event.
	pub fn perform_maintenance(&self, options: &MaintenanceOptions) -> Result<MaintenanceReport> {
		let mut report = MaintenanceReport::default();

		if options.sweep_cache {
			report.cache_entries_swept = self.cache.sweep_expired();
		}
		if options.check_consistency {
			let check = self.checker.check();
			if !check.is_consistent && options.auto_repair {
				match self.checker.repair() {
					Ok(repair) => report.repair = Some(repair),
					Err(err) => return self.fail("perform_maintenance", err),
				}
			}
			report.consistency = Some(check);
		}
		if let Some(max_age) = options.cleanup_detections_max_age {
			match self.history.cleanup_expired(max_age) {
				Ok(removed) => report.detections_removed = removed,
				Err(err) => return self.fail("perform_maintenance", err),
			}
		}
		if let Some(max_backups) = options.max_backups {
			match self.maintenance.cleanup_old_backups(Some(max_backups)) {
				Ok(deleted) => report.backups_deleted = deleted,
				Err(err) => return self.fail("perform_maintenance", err),
			}
		}

		self.cache.invalidate(Some(STATS_CACHE_KEY));
		debug!(
			swept = report.cache_entries_swept,
			detections_removed = report.detections_removed,
			backups_deleted = report.backups_deleted,
			"maintenance pass finished"
		);
		self.emit(
			StorageEvent::new(StorageEventType::StorageSynced, EVENT_SOURCE).with_data(
				serde_json::json!({
					"operation": "maintenance",
					"detections_removed": report.detections_removed,
					"backups_deleted": report.backups_deleted,
				}),
			),
		);
		Ok(report)
	}

	// ---- health ----

	/// Derived statistics over the whole engine, memoized behind the
	/// TTL cache.
	pub fn get_storage_stats(&self) -> Result<StorageStats> {
		if let Some(cached) = self.cache.get(STATS_CACHE_KEY) {
			if let Ok(stats) = serde_json::from_value::<StorageStats>(cached) {
				return Ok(stats);
			}
		}

		let backup_count = self
			.adapter
			.primary()
			.keys()?
			.iter()
			.filter(|k| keys::is_backup_key(k))
			.count();
		let stats = StorageStats {
			has_preference: self.preference.has_preference()?,
			has_override: self.preference.has_override()?,
			detection_count: self.history.get_history()?.len(),
			override_log_count: self.preference.get_override_history()?.len(),
			backup_count,
			backends: vec![
				BackendStats::probe(self.adapter.primary()),
				BackendStats::probe(self.adapter.secondary()),
			],
			cache: self.cache.stats(),
			listeners: self.bus.listener_stats(),
			event_history_len: self.bus.history().len(),
		};
		self.cache
			.set(STATS_CACHE_KEY, serde_json::to_value(&stats)?);
		Ok(stats)
	}

	/// Checks backend availability, stored shape validity and
	/// cross-backend agreement in one pass.
	pub fn validate_storage_integrity(&self) -> IntegrityReport {
		let backends_available =
			self.adapter.primary().is_available() && self.adapter.secondary().is_available();

		let mut issues = Vec::new();
		let preference_valid = match self.adapter.get(PREFERENCE_KEY) {
			Ok(None) => true,
			Ok(Some(raw)) => match serde_json::from_str::<LocalePreference>(&raw) {
				Ok(preference) => match preference.validate() {
					Ok(()) => true,
					Err(err) => {
						issues.push(format!("stored preference invalid: {err}"));
						false
					}
				},
				Err(err) => {
					issues.push(format!("stored preference unparseable: {err}"));
					false
				}
			},
			Err(err) => {
				issues.push(format!("preference unreadable: {err}"));
				false
			}
		};

		IntegrityReport::evaluate(
			backends_available,
			preference_valid,
			self.checker.check(),
			issues,
		)
	}

	// ---- events ----

	/// Registers a listener for one event type or for all events.
	pub fn subscribe(&self, filter: EventFilter, listener: EventListener) -> ListenerId {
		self.bus.subscribe(filter, listener)
	}

	/// Removes a previously registered listener.
	pub fn unsubscribe(&self, id: ListenerId) {
		self.bus.unsubscribe(id)
	}

	/// Emitted events, newest first.
	#[must_use]
	pub fn event_history(&self) -> Vec<StorageEvent> {
		self.bus.history()
	}

	/// The underlying bus, for listener statistics and bulk removal.
	#[must_use]
	pub fn bus(&self) -> &EventBus {
		&self.bus
	}

	/// The stats cache, for hit-rate inspection.
	#[must_use]
	pub fn cache(&self) -> &TtlCache {
		&self.cache
	}

	fn emit(&self, event: StorageEvent) {
		self.bus.emit(event);
	}

	fn fail<T>(&self, operation: &str, err: StoreError) -> Result<T> {
		warn!(operation, error = %err, "storage operation failed");
		self.bus
			.emit(StorageEvent::error(EVENT_SOURCE, operation, &err.to_string()));
		Err(err)
	}
}

impl std::fmt::Debug for LocaleManager {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("LocaleManager")
			.field("adapter", &self.adapter)
			.finish_non_exhaustive()
	}
}
