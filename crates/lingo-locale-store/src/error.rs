// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the storage engine.

use thiserror::Error;

use crate::backend::BackendError;

/// Errors a storage engine operation can report.
///
/// Expected failure modes are returned, never panicked; report-style
/// operations (consistency check, import) accumulate instead of
/// returning `Err` for routine findings.
#[derive(Debug, Error)]
pub enum StoreError {
	/// A backend refused or failed the operation
	#[error(transparent)]
	Backend(#[from] BackendError),

	/// Both backends refused a write
	#[error("storage unavailable: {0}")]
	Unavailable(String),

	/// Data model validation or versioning failure
	#[error(transparent)]
	Locale(#[from] lingo_locale_core::LocaleError),

	/// Requested record or backup key does not exist
	#[error("not found: {0}")]
	NotFound(String),

	/// Backends disagree in a way auto-repair did not resolve
	#[error("consistency error: {0}")]
	Consistency(String),

	/// Stored JSON failed to parse
	#[error("serialization error: {0}")]
	Serialization(String),
}

impl From<serde_json::Error> for StoreError {
	fn from(err: serde_json::Error) -> Self {
		StoreError::Serialization(err.to_string())
	}
}

/// Convenience alias used across the engine.
pub type Result<T> = std::result::Result<T, StoreError>;
