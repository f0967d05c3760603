// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Profile payloads for `identify` and `set`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::attributes::Attributes;
use crate::ids::UserId;

pub const USER_ID_KEY: &str = "user_id";
pub const EMAIL_KEY: &str = "email";

/// Profile keys the backend stores as first-class fields. Anything else is
/// sent in the `extra` bag.
pub const RECOGNIZED_PROFILE_FIELDS: &[&str] = &[
	USER_ID_KEY,
	EMAIL_KEY,
	"name",
	"first_name",
	"last_name",
	"phone",
	"gender",
	"birthday",
	"city",
	"country",
	"language",
];

/// Profile data split into recognised fields and an `extra` bag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
	#[serde(flatten)]
	pub fields: Map<String, Value>,
	#[serde(default, skip_serializing_if = "Map::is_empty")]
	pub extra: Map<String, Value>,
}

impl ProfileUpdate {
	pub fn from_attributes(data: Attributes) -> Self {
		let mut update = Self::default();
		for (key, value) in data {
			if RECOGNIZED_PROFILE_FIELDS.contains(&key.as_str()) {
				update.fields.insert(key, value);
			} else {
				update.extra.insert(key, value);
			}
		}
		update
	}

	/// Removes the `user_id` field. Numeric ids are taken in decimal form;
	/// empty strings and other JSON types yield `None`.
	pub fn take_user_id(&mut self) -> Option<UserId> {
		match self.fields.remove(USER_ID_KEY)? {
			Value::String(id) if !id.trim().is_empty() => Some(UserId::new(id)),
			Value::Number(id) => Some(UserId::new(id.to_string())),
			_ => None,
		}
	}

	pub fn email(&self) -> Option<&str> {
		self.fields
			.get(EMAIL_KEY)
			.and_then(Value::as_str)
			.filter(|s| !s.is_empty())
	}

	pub fn is_empty(&self) -> bool {
		self.fields.is_empty() && self.extra.is_empty()
	}
}
