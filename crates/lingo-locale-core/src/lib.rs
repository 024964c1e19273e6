// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the Lingo locale preference storage engine.
//!
//! This crate provides the shared data model for locale persistence:
//! the supported-locale table, preference and detection records,
//! override audit entries, storage events, and the versioned export
//! package schema. It is used by the storage engine
//! (`lingo-locale-store`) and by anything that consumes its events.
//!
//! # Overview
//!
//! The data model supports:
//! - A single current preference with a source-priority conflict rule
//! - Append-only, capped detection and override audit logs
//! - Scalar metadata maps sanitized at the boundary
//! - Typed storage events with dotted string names
//! - A checksummed, versioned export/import format
//!
//! # Example
//!
//! ```
//! use lingo_locale_core::{Locale, LocalePreference, PreferenceSource};
//!
//! let mut pref = LocalePreference::new(Locale::Zh, PreferenceSource::User, 0.9);
//! pref.metadata.insert("detector", "navigator");
//! assert!(pref.validate().is_ok());
//!
//! // user choices outrank automatic detection
//! let auto = LocalePreference::new(Locale::En, PreferenceSource::Auto, 1.0);
//! assert!(pref.outranks(&auto));
//! ```

pub mod detection;
pub mod error;
pub mod event;
pub mod export;
pub mod locale;
pub mod metadata;
pub mod override_log;
pub mod preference;
pub mod value;

pub use detection::{DetectionRecord, DETECTION_HISTORY_CAP};
pub use error::LocaleError;
pub use event::{StorageEvent, StorageEventType, EVENT_HISTORY_CAP};
pub use export::{ExportMetadata, ExportPackage, EXPORT_VERSION};
pub use locale::{Direction, Locale, LocaleInfo, DEFAULT_LOCALE};
pub use metadata::{Metadata, MetadataValue};
pub use override_log::{OverrideAction, OverrideRecord, OverrideStats, OVERRIDE_HISTORY_CAP};
pub use preference::{LocalePreference, PreferenceSource};
pub use value::{deep_equal, deep_merge, diff_paths};
