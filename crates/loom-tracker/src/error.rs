// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the tracker SDK.
//!
//! None of these reach the host application: every public tracker method
//! logs and swallows them. They exist so internal paths can use `?` and so
//! tests can assert on what went wrong.

use loom_tracker_core::ConfigurationError;
use thiserror::Error;

/// Errors raised by the local key-value store.
#[derive(Debug, Error)]
pub enum StoreError {
	#[error("store I/O failed: {0}")]
	Io(#[from] std::io::Error),

	#[error("store contents are corrupt: {0}")]
	Serialization(#[from] serde_json::Error),
}

/// Tracker SDK errors.
#[derive(Debug, Error)]
pub enum TrackerError {
	/// Brand id or configuration is invalid. Fatal to an initialization
	/// attempt.
	#[error("configuration error: {0}")]
	Configuration(#[from] ConfigurationError),

	/// Session bootstrap failed. The tracker stays ready without a session.
	#[error("session creation failed: {0}")]
	SessionCreation(String),

	/// HTTP request failed.
	#[error("HTTP request failed: {0}")]
	RequestFailed(#[from] reqwest::Error),

	/// Server returned an error response.
	#[error("server error ({status}): {message}")]
	ServerError { status: u16, message: String },

	/// Rate limited by the server.
	#[error("rate limited, retry after {retry_after_secs:?} seconds")]
	RateLimited { retry_after_secs: Option<u64> },

	/// Local store failed.
	#[error(transparent)]
	Store(#[from] StoreError),

	/// Initialization did not settle before the watchdog fired.
	#[error("initialization timed out")]
	WatchdogTimeout,

	/// The operation was cancelled before it finished.
	#[error("operation cancelled")]
	Cancelled,

	/// Serialization error.
	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

/// Result type alias for tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;
