// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Storage key namespace, size estimation, and checksums.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Prefix shared by every key the engine owns.
pub const KEY_PREFIX: &str = "lingo_locale";

/// Current preference record.
pub const PREFERENCE_KEY: &str = "lingo_locale__preference";
/// Live manual override value.
pub const OVERRIDE_KEY: &str = "lingo_locale__override";
/// Append-only detection history log.
pub const DETECTION_HISTORY_KEY: &str = "lingo_locale__detection_history";
/// Append-only override audit log.
pub const OVERRIDE_HISTORY_KEY: &str = "lingo_locale__override_history";

/// Prefix of generated backup keys.
pub const BACKUP_KEY_PREFIX: &str = "locale_backup_";

/// The mirrored logical keys, in consistency-check order.
pub const LOGICAL_KEYS: &[&str] = &[
	PREFERENCE_KEY,
	OVERRIDE_KEY,
	DETECTION_HISTORY_KEY,
	OVERRIDE_HISTORY_KEY,
];

/// Generates a backup key for the given moment: `locale_backup_<ms>`.
#[must_use]
pub fn backup_key(at: DateTime<Utc>) -> String {
	format!("{BACKUP_KEY_PREFIX}{}", at.timestamp_millis())
}

/// Whether a key matches the backup pattern `^locale_backup_\d+$`.
#[must_use]
pub fn is_backup_key(key: &str) -> bool {
	key
		.strip_prefix(BACKUP_KEY_PREFIX)
		.is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}

/// Parses the timestamp out of a backup key.
#[must_use]
pub fn backup_key_timestamp(key: &str) -> Option<i64> {
	key.strip_prefix(BACKUP_KEY_PREFIX)?.parse().ok()
}

/// Estimated stored size of a key/value pair in bytes.
#[must_use]
pub fn entry_size_estimate(key: &str, value: &str) -> u64 {
	(key.len() + value.len()) as u64
}

/// Hex SHA-256 of a serialized payload.
#[must_use]
pub fn checksum(payload: &str) -> String {
	let mut hasher = Sha256::new();
	hasher.update(payload.as_bytes());
	hex::encode(hasher.finalize())
}
