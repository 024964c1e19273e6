// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Detection history store.
//!
//! An append-only, capped log of automatic locale detections with a
//! read-only query layer. Empty or absent history yields empty
//! results, never an error.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use lingo_locale_core::{DetectionRecord, Locale, DETECTION_HISTORY_CAP};

use crate::adapter::DualBackend;
use crate::error::{Result, StoreError};
use crate::keys::DETECTION_HISTORY_KEY;

/// Default number of records returned by [`DetectionHistoryStore::get_recent`].
pub const DEFAULT_RECENT_LIMIT: usize = 5;

/// Sort key for combined queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
	Timestamp,
	Confidence,
	Locale,
	Source,
}

/// Sort direction for combined queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
	Asc,
	Desc,
}

/// Parameters of a combined filter/sort/paginate query.
#[derive(Debug, Clone)]
pub struct HistoryQuery {
	pub locale: Option<Locale>,
	pub source: Option<String>,
	pub sort_by: SortBy,
	pub sort_order: SortOrder,
	pub offset: usize,
	pub limit: usize,
}

impl Default for HistoryQuery {
	fn default() -> Self {
		Self {
			locale: None,
			source: None,
			sort_by: SortBy::Timestamp,
			sort_order: SortOrder::Desc,
			offset: 0,
			limit: DETECTION_HISTORY_CAP,
		}
	}
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
	pub records: Vec<DetectionRecord>,
	/// Matching records before pagination
	pub total_count: usize,
	pub has_more: bool,
}

/// Aggregate over one locale or source group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupStats {
	pub key: String,
	pub count: usize,
	/// Share of all records, in percent
	pub percentage: f64,
	pub average_confidence: f64,
}

/// One fixed-width time bucket of detection counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeBucket {
	pub start: DateTime<Utc>,
	pub count: usize,
}

/// Append-only bounded log of detection events.
#[derive(Debug, Clone)]
pub struct DetectionHistoryStore {
	adapter: DualBackend,
}

impl DetectionHistoryStore {
	#[must_use]
	pub fn new(adapter: DualBackend) -> Self {
		Self { adapter }
	}

	/// Appends a record, dropping the oldest beyond the cap of 100.
	pub fn add_record(&self, record: DetectionRecord) -> Result<()> {
		record.validate()?;
		let mut records = self.get_history()?;
		records.push(record);
		if records.len() > DETECTION_HISTORY_CAP {
			let excess = records.len() - DETECTION_HISTORY_CAP;
			records.drain(..excess);
		}
		self.write(&records)
	}

	/// Full retained history, oldest first.
	pub fn get_history(&self) -> Result<Vec<DetectionRecord>> {
		match self.adapter.get(DETECTION_HISTORY_KEY)? {
			Some(json) => Ok(serde_json::from_str(&json)?),
			None => Ok(Vec::new()),
		}
	}

	/// The most recent records, newest first.
	pub fn get_recent(&self, limit: Option<usize>) -> Result<Vec<DetectionRecord>> {
		let limit = limit.unwrap_or(DEFAULT_RECENT_LIMIT);
		let mut records = self.get_history()?;
		records.sort_by_key(|r| std::cmp::Reverse(r.timestamp));
		records.truncate(limit);
		Ok(records)
	}

	/// Records produced by one detector id.
	pub fn query_by_source(&self, source: &str) -> Result<Vec<DetectionRecord>> {
		Ok(self
			.get_history()?
			.into_iter()
			.filter(|r| r.source == source)
			.collect())
	}

	/// Records that detected one locale.
	pub fn query_by_locale(&self, locale: Locale) -> Result<Vec<DetectionRecord>> {
		Ok(self
			.get_history()?
			.into_iter()
			.filter(|r| r.locale == locale)
			.collect())
	}

	/// Records with `from <= timestamp <= to`.
	pub fn query_by_time_range(
		&self,
		from: DateTime<Utc>,
		to: DateTime<Utc>,
	) -> Result<Vec<DetectionRecord>> {
		Ok(self
			.get_history()?
			.into_iter()
			.filter(|r| r.timestamp >= from && r.timestamp <= to)
			.collect())
	}

	/// Records with confidence in `[min, max]`; `max` defaults to 1.
	pub fn query_by_confidence(
		&self,
		min: f64,
		max: Option<f64>,
	) -> Result<Vec<DetectionRecord>> {
		let max = max.unwrap_or(1.0);
		Ok(self
			.get_history()?
			.into_iter()
			.filter(|r| r.confidence >= min && r.confidence <= max)
			.collect())
	}

	/// Combined filter, sort, and pagination.
	pub fn query(&self, query: &HistoryQuery) -> Result<QueryResult> {
		let mut records: Vec<DetectionRecord> = self
			.get_history()?
			.into_iter()
			.filter(|r| query.locale.map_or(true, |l| r.locale == l))
			.filter(|r| query.source.as_deref().map_or(true, |s| r.source == s))
			.collect();

		records.sort_by(|a, b| {
			let ordering = match query.sort_by {
				SortBy::Timestamp => a.timestamp.cmp(&b.timestamp),
				SortBy::Confidence => a
					.confidence
					.partial_cmp(&b.confidence)
					.unwrap_or(std::cmp::Ordering::Equal),
				SortBy::Locale => a.locale.cmp(&b.locale),
				SortBy::Source => a.source.cmp(&b.source),
			};
			match query.sort_order {
				SortOrder::Asc => ordering,
				SortOrder::Desc => ordering.reverse(),
			}
		});

		let total_count = records.len();
		let page: Vec<DetectionRecord> = records
			.into_iter()
			.skip(query.offset)
			.take(query.limit)
			.collect();
		let has_more = query.offset + page.len() < total_count;

		Ok(QueryResult {
			records: page,
			total_count,
			has_more,
		})
	}

	/// Case-insensitive full-text search over locale, source, and
	/// metadata keys and values.
	pub fn search(&self, term: &str) -> Result<Vec<DetectionRecord>> {
		let needle = term.to_lowercase();
		Ok(self
			.get_history()?
			.into_iter()
			.filter(|r| {
				r.locale.code().contains(&needle)
					|| r.source.to_lowercase().contains(&needle)
					|| r.metadata.iter().any(|(k, v)| {
						k.to_lowercase().contains(&needle)
							|| metadata_text(v).to_lowercase().contains(&needle)
					})
			})
			.collect())
	}

	/// Distinct locales present in the history, sorted.
	pub fn unique_locales(&self) -> Result<Vec<Locale>> {
		let mut locales: Vec<Locale> = self.get_history()?.iter().map(|r| r.locale).collect();
		locales.sort();
		locales.dedup();
		Ok(locales)
	}

	/// Distinct detector ids present in the history, sorted.
	pub fn unique_sources(&self) -> Result<Vec<String>> {
		let mut sources: Vec<String> = self
			.get_history()?
			.into_iter()
			.map(|r| r.source)
			.collect();
		sources.sort();
		sources.dedup();
		Ok(sources)
	}

	/// Count, share, and average confidence per locale, most frequent
	/// first.
	pub fn locale_group_stats(&self) -> Result<Vec<GroupStats>> {
		let records = self.get_history()?;
		Ok(group_stats(&records, |r| r.locale.code().to_string()))
	}

	/// Count, share, and average confidence per detector id, most
	/// frequent first.
	pub fn source_group_stats(&self) -> Result<Vec<GroupStats>> {
		let records = self.get_history()?;
		Ok(group_stats(&records, |r| r.source.clone()))
	}

	/// Histogram of detection counts per fixed-width time bucket.
	pub fn time_distribution(&self, bucket: Duration) -> Result<Vec<TimeBucket>> {
		let bucket_ms = bucket.num_milliseconds();
		if bucket_ms <= 0 {
			return Err(StoreError::Serialization(format!(
				"bucket width must be positive, got {bucket_ms}ms"
			)));
		}

		let mut buckets: BTreeMap<i64, usize> = BTreeMap::new();
		for record in self.get_history()? {
			let ms = record.timestamp.timestamp_millis();
			let start = ms.div_euclid(bucket_ms) * bucket_ms;
			*buckets.entry(start).or_default() += 1;
		}

		Ok(buckets
			.into_iter()
			.filter_map(|(start_ms, count)| {
				DateTime::from_timestamp_millis(start_ms).map(|start| TimeBucket { start, count })
			})
			.collect())
	}

	/// Drops records older than `max_age`, returning how many went.
	pub fn cleanup_expired(&self, max_age: Duration) -> Result<usize> {
		let cutoff = Utc::now() - max_age;
		let records = self.get_history()?;
		let before = records.len();
		let kept: Vec<DetectionRecord> = records
			.into_iter()
			.filter(|r| r.timestamp >= cutoff)
			.collect();
		let removed = before - kept.len();
		if removed > 0 {
			self.write(&kept)?;
			debug!(removed, "expired detection records removed");
		}
		Ok(removed)
	}

	/// Removes the entire history from both backends.
	pub fn clear(&self) -> Result<()> {
		let outcome = self.adapter.remove(DETECTION_HISTORY_KEY);
		if !outcome.succeeded() {
			warn!(key = DETECTION_HISTORY_KEY, "remove failed on both backends");
		}
		Ok(())
	}

	fn write(&self, records: &[DetectionRecord]) -> Result<()> {
		let json = serde_json::to_string(records)?;
		let outcome = self.adapter.set(DETECTION_HISTORY_KEY, &json);
		if outcome.succeeded() {
			Ok(())
		} else {
			Err(StoreError::Unavailable(
				outcome
					.first_error()
					.map(ToString::to_string)
					.unwrap_or_else(|| "both backends rejected the write".to_string()),
			))
		}
	}
}

fn metadata_text(value: &lingo_locale_core::MetadataValue) -> String {
	match value {
		lingo_locale_core::MetadataValue::String(s) => s.clone(),
		lingo_locale_core::MetadataValue::Number(n) => n.to_string(),
		lingo_locale_core::MetadataValue::Bool(b) => b.to_string(),
	}
}

fn group_stats<F>(records: &[DetectionRecord], key_of: F) -> Vec<GroupStats>
where
	F: Fn(&DetectionRecord) -> String,
{
	let total = records.len();
	let mut groups: BTreeMap<String, (usize, f64)> = BTreeMap::new();
	for record in records {
		let entry = groups.entry(key_of(record)).or_insert((0, 0.0));
		entry.0 += 1;
		entry.1 += record.confidence;
	}

	let mut stats: Vec<GroupStats> = groups
		.into_iter()
		.map(|(key, (count, confidence_sum))| GroupStats {
			key,
			count,
			percentage: (count as f64 / total as f64) * 100.0,
			average_confidence: confidence_sum / count as f64,
		})
		.collect();
	// Descending by count, key order breaking ties
	stats.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
	stats
}
