// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Event names, queued track calls and event payload assembly.

use chrono::{DateTime, Utc};

use crate::attributes::Attributes;

/// Event emitted for screen views. Never carries `flow_context`.
pub const VIEW_PAGE_EVENT: &str = "VIEW_PAGE";
/// Key under which the current screen is attached to events.
pub const FLOW_CONTEXT_KEY: &str = "flow_context";

/// Normalises an event name for the wire: trimmed, uppercased, with every
/// run of whitespace replaced by a single `_`.
///
/// `"button click"` becomes `"BUTTON_CLICK"`.
pub fn normalize_event_name(name: &str) -> String {
	name.split_whitespace()
		.map(str::to_uppercase)
		.collect::<Vec<_>>()
		.join("_")
}

/// A track call that could not be delivered when it was made.
///
/// Holds the call exactly as the caller made it so a replay goes through the
/// same path.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCall {
	pub event_name: String,
	pub attributes: Option<Attributes>,
	pub metadata: Option<Attributes>,
	pub enqueued_at: DateTime<Utc>,
}

impl PendingCall {
	pub fn new(
		event_name: impl Into<String>,
		attributes: Option<Attributes>,
		metadata: Option<Attributes>,
	) -> Self {
		Self {
			event_name: event_name.into(),
			attributes,
			metadata,
			enqueued_at: Utc::now(),
		}
	}
}

/// Builds the flat data map sent with an event.
///
/// Attributes are merged first and metadata second, so metadata wins on key
/// collisions. `flow_context` is added for everything except `VIEW_PAGE`
/// unless the caller already supplied that key. Returns `None` when nothing
/// is left to send.
pub fn build_event_data(
	normalized_name: &str,
	attributes: Option<Attributes>,
	metadata: Option<Attributes>,
	flow_context: Option<&str>,
) -> Option<Attributes> {
	let mut data = attributes
		.unwrap_or_default()
		.merge(metadata.unwrap_or_default());

	if normalized_name != VIEW_PAGE_EVENT && !data.contains_key(FLOW_CONTEXT_KEY) {
		if let Some(screen) = flow_context {
			data.set(FLOW_CONTEXT_KEY, screen);
		}
	}

	(!data.is_empty()).then_some(data)
}
