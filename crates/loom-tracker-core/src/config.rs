// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tracker configuration.
//!
//! Callers hand [`TrackerConfigOverrides`] to `initialize`. Overrides can be
//! layered from a TOML file, from `LOOM_TRACKER_*` environment variables and
//! from code; [`TrackerConfigOverrides::resolve`] merges the result with the
//! built-in defaults and validates it into a [`TrackerConfiguration`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigurationError;

/// Default API base URL.
pub const DEFAULT_API_BASE_URL: &str = "https://api.loom.dev";
/// Default lifetime of the persisted session id.
pub const DEFAULT_COOKIE_EXPIRATION_DAYS: u32 = 365;
/// Upper bound accepted for `cookie_expiration_days`.
pub const MAX_COOKIE_EXPIRATION_DAYS: u32 = 3650;

pub const ENV_DEBUG: &str = "LOOM_TRACKER_DEBUG";
pub const ENV_API_URL: &str = "LOOM_TRACKER_API_URL";
pub const ENV_API_KEY: &str = "LOOM_TRACKER_API_KEY";
pub const ENV_COOKIE_EXPIRATION_DAYS: &str = "LOOM_TRACKER_COOKIE_EXPIRATION_DAYS";

/// Validated tracker configuration.
///
/// An initialization attempt owns its own copy; nothing mutates it after the
/// attempt has started.
#[derive(Clone, PartialEq, Eq)]
pub struct TrackerConfiguration {
	/// Surfaces dropped events and transport failures at `warn` level.
	pub debug: bool,
	/// Base URL of the tracking API, without a trailing slash.
	pub api_base_url: String,
	/// API key sent as a bearer token. Empty means unauthenticated.
	pub api_key: String,
	/// Lifetime of the persisted session id.
	pub cookie_expiration_days: u32,
}

impl Default for TrackerConfiguration {
	fn default() -> Self {
		Self {
			debug: false,
			api_base_url: DEFAULT_API_BASE_URL.to_string(),
			api_key: String::new(),
			cookie_expiration_days: DEFAULT_COOKIE_EXPIRATION_DAYS,
		}
	}
}

impl std::fmt::Debug for TrackerConfiguration {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TrackerConfiguration")
			.field("debug", &self.debug)
			.field("api_base_url", &self.api_base_url)
			.field("api_key", &redact(&self.api_key))
			.field("cookie_expiration_days", &self.cookie_expiration_days)
			.finish()
	}
}

impl TrackerConfiguration {
	/// Checks URL shape and numeric bounds, normalising the base URL.
	pub fn validate(mut self) -> Result<Self, ConfigurationError> {
		let trimmed = self.api_base_url.trim().trim_end_matches('/').to_string();
		let parsed = Url::parse(&trimmed)
			.map_err(|e| ConfigurationError::InvalidBaseUrl(format!("{trimmed}: {e}")))?;
		if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
			return Err(ConfigurationError::InvalidBaseUrl(trimmed));
		}
		self.api_base_url = trimmed;

		if self.cookie_expiration_days == 0
			|| self.cookie_expiration_days > MAX_COOKIE_EXPIRATION_DAYS
		{
			return Err(ConfigurationError::CookieExpirationOutOfRange(
				self.cookie_expiration_days,
			));
		}

		Ok(self)
	}
}

/// Partial configuration. Unset fields fall back to lower layers and then to
/// [`TrackerConfiguration::default`].
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrackerConfigOverrides {
	pub debug: Option<bool>,
	pub api_base_url: Option<String>,
	pub api_key: Option<String>,
	pub cookie_expiration_days: Option<u32>,
}

impl std::fmt::Debug for TrackerConfigOverrides {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TrackerConfigOverrides")
			.field("debug", &self.debug)
			.field("api_base_url", &self.api_base_url)
			.field("api_key", &self.api_key.as_deref().map(redact))
			.field("cookie_expiration_days", &self.cookie_expiration_days)
			.finish()
	}
}

impl TrackerConfigOverrides {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn debug(mut self, debug: bool) -> Self {
		self.debug = Some(debug);
		self
	}

	pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
		self.api_base_url = Some(url.into());
		self
	}

	pub fn api_key(mut self, key: impl Into<String>) -> Self {
		self.api_key = Some(key.into());
		self
	}

	pub fn cookie_expiration_days(mut self, days: u32) -> Self {
		self.cookie_expiration_days = Some(days);
		self
	}

	/// Parses overrides from TOML.
	///
	/// ```toml
	/// debug = true
	/// api_base_url = "https://track.example.com"
	/// api_key = "k"
	/// cookie_expiration_days = 30
	/// ```
	pub fn from_toml_str(raw: &str) -> Result<Self, ConfigurationError> {
		toml::from_str(raw).map_err(|e| ConfigurationError::InvalidToml(e.to_string()))
	}

	pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
		let path = path.as_ref();
		let raw = std::fs::read_to_string(path).map_err(|e| ConfigurationError::Unreadable {
			path: path.display().to_string(),
			message: e.to_string(),
		})?;
		Self::from_toml_str(&raw)
	}

	/// Reads `LOOM_TRACKER_*` variables from the process environment.
	pub fn from_env() -> Result<Self, ConfigurationError> {
		Self::from_env_with(|name| std::env::var(name).ok())
	}

	/// Reads overrides through `lookup`, which maps a variable name to its
	/// value.
	pub fn from_env_with<F>(lookup: F) -> Result<Self, ConfigurationError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let mut overrides = Self::default();

		if let Some(raw) = lookup(ENV_DEBUG) {
			overrides.debug = Some(parse_bool(ENV_DEBUG, &raw)?);
		}
		if let Some(raw) = lookup(ENV_API_URL).filter(|v| !v.is_empty()) {
			overrides.api_base_url = Some(raw);
		}
		if let Some(raw) = lookup(ENV_API_KEY) {
			overrides.api_key = Some(raw);
		}
		if let Some(raw) = lookup(ENV_COOKIE_EXPIRATION_DAYS) {
			let days = raw
				.trim()
				.parse::<u32>()
				.map_err(|_| ConfigurationError::InvalidEnv {
					var: ENV_COOKIE_EXPIRATION_DAYS.to_string(),
					value: raw.clone(),
				})?;
			overrides.cookie_expiration_days = Some(days);
		}

		Ok(overrides)
	}

	/// Layers `upper` on top of `self`; fields set in `upper` win.
	pub fn layer(self, upper: TrackerConfigOverrides) -> Self {
		Self {
			debug: upper.debug.or(self.debug),
			api_base_url: upper.api_base_url.or(self.api_base_url),
			api_key: upper.api_key.or(self.api_key),
			cookie_expiration_days: upper.cookie_expiration_days.or(self.cookie_expiration_days),
		}
	}

	/// Merges with defaults and validates.
	pub fn resolve(self) -> Result<TrackerConfiguration, ConfigurationError> {
		let defaults = TrackerConfiguration::default();
		TrackerConfiguration {
			debug: self.debug.unwrap_or(defaults.debug),
			api_base_url: self.api_base_url.unwrap_or(defaults.api_base_url),
			api_key: self.api_key.unwrap_or(defaults.api_key),
			cookie_expiration_days: self
				.cookie_expiration_days
				.unwrap_or(defaults.cookie_expiration_days),
		}
		.validate()
	}
}

fn parse_bool(var: &str, raw: &str) -> Result<bool, ConfigurationError> {
	match raw.trim().to_ascii_lowercase().as_str() {
		"1" | "true" | "yes" | "on" => Ok(true),
		"0" | "false" | "no" | "off" | "" => Ok(false),
		_ => Err(ConfigurationError::InvalidEnv {
			var: var.to_string(),
			value: raw.to_string(),
		}),
	}
}

fn redact(secret: &str) -> &'static str {
	if secret.is_empty() {
		""
	} else {
		"[REDACTED]"
	}
}
