// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Typed pub/sub event bus with bounded history.
//!
//! Emission invokes type-specific listeners, then wildcard listeners.
//! A listener returning an error is logged and never prevents the
//! remaining listeners from running. Every emitted event is prepended
//! to a bounded history buffer (newest first).

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::warn;

use lingo_locale_core::{StorageEvent, StorageEventType, EVENT_HISTORY_CAP};

/// What a listener subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventFilter {
	/// One event type
	Type(StorageEventType),
	/// Every event (`"*"`)
	All,
}

/// Listener callback. Errors are isolated per listener.
pub type EventListener =
	Box<dyn Fn(&StorageEvent) -> Result<(), Box<dyn std::error::Error>> + Send + Sync>;

/// Handle for unsubscribing a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Listener observability counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenerStats {
	pub total_listeners: usize,
	pub wildcard_listeners: usize,
	/// Listener counts keyed by dotted event type name
	pub by_type: HashMap<String, usize>,
}

struct Registration {
	id: ListenerId,
	filter: EventFilter,
	listener: EventListener,
}

#[derive(Default)]
struct BusInner {
	registrations: Vec<Registration>,
	history: VecDeque<StorageEvent>,
	next_id: u64,
}

/// Bounded-history pub/sub bus, shared by clone.
#[derive(Clone)]
pub struct EventBus {
	inner: Arc<RwLock<BusInner>>,
}

impl std::fmt::Debug for EventBus {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let inner = self.inner.read().expect("bus lock poisoned");
		f.debug_struct("EventBus")
			.field("listeners", &inner.registrations.len())
			.field("history_len", &inner.history.len())
			.finish()
	}
}

impl EventBus {
	#[must_use]
	pub fn new() -> Self {
		Self {
			inner: Arc::new(RwLock::new(BusInner::default())),
		}
	}

	/// Subscribes a listener for one event type or all of them.
	pub fn subscribe(&self, filter: EventFilter, listener: EventListener) -> ListenerId {
		let mut inner = self.inner.write().expect("bus lock poisoned");
		inner.next_id += 1;
		let id = ListenerId(inner.next_id);
		inner.registrations.push(Registration {
			id,
			filter,
			listener,
		});
		id
	}

	/// Removes one listener. Unknown ids are ignored.
	pub fn unsubscribe(&self, id: ListenerId) {
		let mut inner = self.inner.write().expect("bus lock poisoned");
		inner.registrations.retain(|r| r.id != id);
	}

	/// Removes every listener for a type, or all listeners.
	pub fn remove_all(&self, filter: Option<StorageEventType>) {
		let mut inner = self.inner.write().expect("bus lock poisoned");
		match filter {
			Some(event_type) => inner
				.registrations
				.retain(|r| r.filter != EventFilter::Type(event_type)),
			None => inner.registrations.clear(),
		}
	}

	/// Emits an event to listeners and records it in the history.
	///
	/// The registration lock is held while listeners run; listeners
	/// must not subscribe or emit from inside a callback.
	pub fn emit(&self, event: StorageEvent) {
		let inner = self.inner.read().expect("bus lock poisoned");

		// typed listeners first, wildcard after
		for registration in inner
			.registrations
			.iter()
			.filter(|r| r.filter == EventFilter::Type(event.event_type))
			.chain(
				inner
					.registrations
					.iter()
					.filter(|r| r.filter == EventFilter::All),
			) {
			if let Err(e) = (registration.listener)(&event) {
				warn!(
					event_type = %event.event_type,
					listener = registration.id.0,
					error = %e,
					"event listener failed"
				);
			}
		}
		drop(inner);

		let mut inner = self.inner.write().expect("bus lock poisoned");
		inner.history.push_front(event);
		inner.history.truncate(EVENT_HISTORY_CAP);
	}

	/// Event history, newest first, capped at 100.
	#[must_use]
	pub fn history(&self) -> Vec<StorageEvent> {
		let inner = self.inner.read().expect("bus lock poisoned");
		inner.history.iter().cloned().collect()
	}

	/// Drops the recorded history.
	pub fn clear_history(&self) {
		let mut inner = self.inner.write().expect("bus lock poisoned");
		inner.history.clear();
	}

	/// Listener counts for observability.
	#[must_use]
	pub fn listener_stats(&self) -> ListenerStats {
		let inner = self.inner.read().expect("bus lock poisoned");
		let mut by_type: HashMap<String, usize> = HashMap::new();
		let mut wildcard_listeners = 0;
		for registration in &inner.registrations {
			match registration.filter {
				EventFilter::Type(t) => *by_type.entry(t.as_str().to_string()).or_default() += 1,
				EventFilter::All => wildcard_listeners += 1,
			}
		}
		ListenerStats {
			total_listeners: inner.registrations.len(),
			wildcard_listeners,
			by_type,
		}
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new()
	}
}
