// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the locale data model.

use thiserror::Error;

/// Errors that can occur while validating or serializing locale data.
#[derive(Debug, Error)]
pub enum LocaleError {
	/// Locale code outside the supported set
	#[error("unknown locale: {0}")]
	UnknownLocale(String),

	/// Malformed preference/history/export shape, rejected before any write
	#[error("validation failed: {0}")]
	Validation(String),

	/// Export package version the engine does not understand
	#[error("unsupported export version: found {found}, expected {expected}")]
	VersionMismatch { found: String, expected: String },

	/// Serialization error
	#[error("serialization error: {0}")]
	Serialization(String),
}

impl From<serde_json::Error> for LocaleError {
	fn from(err: serde_json::Error) -> Self {
		LocaleError::Serialization(err.to_string())
	}
}
