// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Flat key/value payloads for events and profiles.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A builder for event attributes, event metadata and profile data.
///
/// # Example
///
/// ```
/// use loom_tracker_core::Attributes;
///
/// let attrs = Attributes::new()
///     .insert("button", "checkout")
///     .insert("price", 99.99)
///     .insert("is_premium", true);
/// assert_eq!(attrs.len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes {
	inner: Map<String, Value>,
}

impl Attributes {
	pub fn new() -> Self {
		Self { inner: Map::new() }
	}

	/// Inserts a key-value pair (builder style).
	pub fn insert<K, V>(mut self, key: K, value: V) -> Self
	where
		K: Into<String>,
		V: Into<Value>,
	{
		self.inner.insert(key.into(), value.into());
		self
	}

	/// Inserts a key-value pair in place, returning the previous value.
	pub fn set<K, V>(&mut self, key: K, value: V) -> Option<Value>
	where
		K: Into<String>,
		V: Into<Value>,
	{
		self.inner.insert(key.into(), value.into())
	}

	/// Merges `other` into `self`. On key collision `other` wins.
	pub fn merge(mut self, other: Attributes) -> Self {
		self.inner.extend(other.inner);
		self
	}

	pub fn contains_key(&self, key: &str) -> bool {
		self.inner.contains_key(key)
	}

	pub fn get(&self, key: &str) -> Option<&Value> {
		self.inner.get(key)
	}

	/// Returns the value under `key` if it is a non-empty string.
	pub fn get_str(&self, key: &str) -> Option<&str> {
		self.inner
			.get(key)
			.and_then(Value::as_str)
			.filter(|s| !s.is_empty())
	}

	pub fn remove(&mut self, key: &str) -> Option<Value> {
		self.inner.remove(key)
	}

	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}

	pub fn len(&self) -> usize {
		self.inner.len()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
		self.inner.iter()
	}

	pub fn into_map(self) -> Map<String, Value> {
		self.inner
	}

	pub fn into_value(self) -> Value {
		Value::Object(self.inner)
	}
}

impl From<Attributes> for Value {
	fn from(attrs: Attributes) -> Self {
		attrs.into_value()
	}
}

impl From<Value> for Attributes {
	fn from(value: Value) -> Self {
		match value {
			Value::Object(map) => Self { inner: map },
			_ => Self::new(),
		}
	}
}

impl From<Map<String, Value>> for Attributes {
	fn from(map: Map<String, Value>) -> Self {
		Self { inner: map }
	}
}

impl IntoIterator for Attributes {
	type Item = (String, Value);
	type IntoIter = serde_json::map::IntoIter;

	fn into_iter(self) -> Self::IntoIter {
		self.inner.into_iter()
	}
}
