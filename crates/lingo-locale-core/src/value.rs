// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Deep operations over JSON values.
//!
//! Foundation for cache snapshots and cross-backend consistency
//! diffing: merge, structural equality, and path-level diffs.

use serde_json::{Map, Value};

/// Recursively merges `patch` into `base`, returning the result.
///
/// Objects merge key-by-key; any other value in `patch` (including
/// arrays and null) replaces the value in `base`.
#[must_use]
pub fn deep_merge(base: &Value, patch: &Value) -> Value {
	match (base, patch) {
		(Value::Object(base_map), Value::Object(patch_map)) => {
			let mut merged = base_map.clone();
			for (key, patch_value) in patch_map {
				let entry = merged
					.get(key)
					.map(|base_value| deep_merge(base_value, patch_value))
					.unwrap_or_else(|| patch_value.clone());
				merged.insert(key.clone(), entry);
			}
			Value::Object(merged)
		}
		(_, patch) => patch.clone(),
	}
}

/// Structural equality.
///
/// `serde_json::Value` equality is already deep; this exists so the
/// consistency engine names the operation it means.
#[must_use]
pub fn deep_equal(a: &Value, b: &Value) -> bool {
	a == b
}

/// Lists dotted paths at which two values disagree.
///
/// Array mismatches report the array's own path rather than diffing
/// element-by-element; the consistency engine only needs to know that
/// the logical record diverged.
#[must_use]
pub fn diff_paths(a: &Value, b: &Value) -> Vec<String> {
	let mut paths = Vec::new();
	collect_diffs(a, b, String::new(), &mut paths);
	paths
}

fn collect_diffs(a: &Value, b: &Value, path: String, out: &mut Vec<String>) {
	match (a, b) {
		(Value::Object(a_map), Value::Object(b_map)) => {
			for key in object_keys(a_map, b_map) {
				let child = if path.is_empty() {
					key.clone()
				} else {
					format!("{path}.{key}")
				};
				match (a_map.get(&key), b_map.get(&key)) {
					(Some(av), Some(bv)) => collect_diffs(av, bv, child, out),
					_ => out.push(child),
				}
			}
		}
		_ => {
			if a != b {
				out.push(if path.is_empty() {
					"$".to_string()
				} else {
					path
				});
			}
		}
	}
}

fn object_keys(a: &Map<String, Value>, b: &Map<String, Value>) -> Vec<String> {
	let mut keys: Vec<String> = a.keys().chain(b.keys()).cloned().collect();
	keys.sort();
	keys.dedup();
	keys
}
