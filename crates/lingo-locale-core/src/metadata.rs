// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Scalar metadata maps with boundary sanitization.
//!
//! Metadata arrives from callers as open-shaped key/value pairs. Only
//! plain string/number/boolean entries with non-empty, non-reserved
//! names are persisted; everything else is dropped at the boundary
//! rather than rejected wholesale.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Key names that are never persisted.
///
/// These are the names used by prototype-pollution style payloads in
/// the hosting environment; a metadata map must not round-trip them.
const RESERVED_KEYS: &[&str] = &["__proto__", "constructor", "prototype"];

/// A single scalar metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
	Bool(bool),
	Number(f64),
	String(String),
}

impl MetadataValue {
	/// Whether this value survives sanitization.
	///
	/// Non-finite numbers do not: they have no JSON representation.
	#[must_use]
	pub fn is_safe(&self) -> bool {
		match self {
			MetadataValue::Number(n) => n.is_finite(),
			_ => true,
		}
	}

	#[must_use]
	pub fn as_bool(&self) -> Option<bool> {
		match self {
			MetadataValue::Bool(b) => Some(*b),
			_ => None,
		}
	}
}

impl From<bool> for MetadataValue {
	fn from(v: bool) -> Self {
		MetadataValue::Bool(v)
	}
}

impl From<f64> for MetadataValue {
	fn from(v: f64) -> Self {
		MetadataValue::Number(v)
	}
}

impl From<&str> for MetadataValue {
	fn from(v: &str) -> Self {
		MetadataValue::String(v.to_string())
	}
}

impl From<String> for MetadataValue {
	fn from(v: String) -> Self {
		MetadataValue::String(v)
	}
}

/// An ordered map of sanitized scalar metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, MetadataValue>);

impl Metadata {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Whether a key name is allowed through sanitization.
	#[must_use]
	pub fn is_safe_key(key: &str) -> bool {
		!key.is_empty() && !RESERVED_KEYS.contains(&key)
	}

	/// Builds a metadata map keeping only safe keys and finite scalars.
	#[must_use]
	pub fn sanitized<I, K>(entries: I) -> Self
	where
		I: IntoIterator<Item = (K, MetadataValue)>,
		K: Into<String>,
	{
		let mut map = BTreeMap::new();
		for (key, value) in entries {
			let key = key.into();
			if Self::is_safe_key(&key) && value.is_safe() {
				map.insert(key, value);
			}
		}
		Self(map)
	}

	/// Re-applies sanitization to an existing map.
	///
	/// Deserialized maps may carry unsafe entries; sanitize before
	/// persisting them again.
	#[must_use]
	pub fn sanitize(&self) -> Self {
		Self::sanitized(self.0.clone())
	}

	/// Inserts a value, silently dropping unsafe keys and values.
	pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetadataValue>) {
		let key = key.into();
		let value = value.into();
		if Self::is_safe_key(&key) && value.is_safe() {
			self.0.insert(key, value);
		}
	}

	#[must_use]
	pub fn get(&self, key: &str) -> Option<&MetadataValue> {
		self.0.get(key)
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&String, &MetadataValue)> {
		self.0.iter()
	}

	/// Whether every entry would survive sanitization unchanged.
	#[must_use]
	pub fn is_sanitized(&self) -> bool {
		self
			.0
			.iter()
			.all(|(k, v)| Self::is_safe_key(k) && v.is_safe())
	}
}

impl<K: Into<String>, V: Into<MetadataValue>> FromIterator<(K, V)> for Metadata {
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		Self::sanitized(iter.into_iter().map(|(k, v)| (k, v.into())))
	}
}
