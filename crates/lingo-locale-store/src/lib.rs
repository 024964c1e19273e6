// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Dual-backend storage engine for locale preferences.
//!
//! The engine persists a user's locale preference, manual override,
//! detection history and override audit log across two backends: a
//! quota-bound primary store and a size-limited secondary store.
//! Reads prefer the primary and fall back to the secondary with
//! write-back; writes go to both and succeed when at least one backend
//! accepts. On top of the stores sit a TTL cache for derived
//! statistics, a bounded pub/sub event bus, cross-backend consistency
//! checking with source-priority repair, and versioned checksummed
//! export/import/backup.
//!
//! [`LocaleManager`] is the facade: one entry point owning all of the
//! above, emitting exactly one event per mutating call.
//!
//! # Example
//!
//! ```
//! use lingo_locale_core::{DetectionRecord, Locale};
//! use lingo_locale_store::LocaleManager;
//!
//! let manager = LocaleManager::in_memory();
//! manager
//! 	.add_detection_record(DetectionRecord::new(Locale::Zh, "navigator", 0.9))
//! 	.unwrap();
//! manager.set_user_override(Locale::Fr, None).unwrap();
//! assert_eq!(manager.get_user_override().unwrap(), Some(Locale::Fr));
//! ```

pub mod adapter;
pub mod backend;
pub mod bus;
pub mod cache;
pub mod consistency;
pub mod error;
pub mod health;
pub mod history;
pub mod keys;
pub mod maintenance;
pub mod manager;
pub mod preference;

pub use adapter::{DualBackend, WriteOutcome};
pub use backend::{BackendError, BackendKind, BackendLimits, FileBackend, MemoryBackend, StorageBackend};
pub use bus::{EventBus, EventFilter, EventListener, ListenerId, ListenerStats};
pub use cache::{CacheStats, TtlCache, DEFAULT_TTL_MINUTES};
pub use consistency::{ConsistencyChecker, ConsistencyReport, RepairReport, SyncReport};
pub use error::{Result, StoreError};
pub use health::{BackendStats, IntegrityReport, StorageStats};
pub use history::{
	DetectionHistoryStore, GroupStats, HistoryQuery, QueryResult, SortBy, SortOrder, TimeBucket,
	DEFAULT_RECENT_LIMIT,
};
pub use maintenance::{BackupInfo, ImportReport, Maintenance, DEFAULT_MAX_BACKUPS};
pub use manager::{
	LocaleManager, MaintenanceOptions, MaintenanceReport, DEFAULT_DETECTION_MAX_AGE_DAYS,
};
pub use preference::PreferenceStore;
