// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Consent gate consulted before any event leaves the device.
//!
//! The default [`AllowAllConsent`] permits everything. Hosts that collect
//! consent install their own gate on the tracker builder:
//!
//! ```ignore
//! use loom_tracker::{ConsentGate, Tracker};
//!
//! struct UserPrefs { /* ... */ }
//!
//! impl ConsentGate for UserPrefs {
//!     fn is_tracking_allowed(&self) -> bool {
//!         self.analytics_opt_in()
//!     }
//! }
//!
//! let tracker = Tracker::builder().consent_gate(UserPrefs::load()).build();
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Decides whether tracking calls may execute.
///
/// Called on the delivery path of every event, so keep it cheap.
pub trait ConsentGate: Send + Sync + 'static {
	fn is_tracking_allowed(&self) -> bool;
}

/// Type alias for a shared consent gate.
pub type SharedConsentGate = Arc<dyn ConsentGate>;

/// Gate that allows all tracking.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllConsent;

impl ConsentGate for AllowAllConsent {
	fn is_tracking_allowed(&self) -> bool {
		true
	}
}

/// Gate backed by a flag the host can flip at runtime.
#[derive(Debug, Clone)]
pub struct ToggleConsent {
	allowed: Arc<AtomicBool>,
}

impl ToggleConsent {
	pub fn new(allowed: bool) -> Self {
		Self {
			allowed: Arc::new(AtomicBool::new(allowed)),
		}
	}

	pub fn set_allowed(&self, allowed: bool) {
		self.allowed.store(allowed, Ordering::SeqCst);
	}
}

impl ConsentGate for ToggleConsent {
	fn is_tracking_allowed(&self) -> bool {
		self.allowed.load(Ordering::SeqCst)
	}
}
