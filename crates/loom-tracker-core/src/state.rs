// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tracker lifecycle states.

use serde::{Deserialize, Serialize};

/// Lifecycle of a tracker instance.
///
/// ```text
/// Uninitialized --initialize--> Pending --success--> Ready
///                               Pending --config error--> Failed
///                               Pending --watchdog/reset--> Uninitialized
/// Ready | Failed --re_initialize--> Pending
/// Failed --reset--> Uninitialized
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitializationState {
	#[default]
	Uninitialized,
	Pending,
	Ready,
	Failed,
}

impl InitializationState {
	/// Returns true if the lifecycle allows moving from `self` to `next`.
	pub fn can_transition_to(self, next: InitializationState) -> bool {
		use InitializationState::*;
		matches!(
			(self, next),
			(Uninitialized, Pending)
				| (Ready, Pending)
				| (Failed, Pending)
				| (Pending, Ready)
				| (Pending, Failed)
				| (Pending, Uninitialized)
				| (Failed, Uninitialized)
		)
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Uninitialized => "uninitialized",
			Self::Pending => "pending",
			Self::Ready => "ready",
			Self::Failed => "failed",
		}
	}
}

impl std::fmt::Display for InitializationState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}
