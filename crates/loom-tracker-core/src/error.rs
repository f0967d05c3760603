// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration errors for the tracker.

use thiserror::Error;

/// Errors raised while validating a brand id or tracker configuration.
///
/// Any of these is fatal to an initialization attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
	/// Brand id was empty.
	#[error("brand id must not be empty")]
	EmptyBrandId,

	/// Brand id was not a positive integer.
	#[error("brand id must be numeric, got {0:?}")]
	NonNumericBrandId(String),

	/// API base URL is not an absolute http(s) URL.
	#[error("invalid API base URL: {0}")]
	InvalidBaseUrl(String),

	/// Cookie expiration is outside the accepted range.
	#[error("cookie expiration must be between 1 and 3650 days, got {0}")]
	CookieExpirationOutOfRange(u32),

	/// TOML configuration could not be parsed.
	#[error("invalid tracker config: {0}")]
	InvalidToml(String),

	/// Config file could not be read.
	#[error("failed to read tracker config {path}: {message}")]
	Unreadable { path: String, message: String },

	/// An environment variable held an unusable value.
	#[error("invalid value for {var}: {value:?}")]
	InvalidEnv { var: String, value: String },
}
