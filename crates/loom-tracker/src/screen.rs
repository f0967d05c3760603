// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Screen lifecycle hook.
//!
//! Hosts forward screen changes from their navigation layer to a
//! [`ScreenObserver`]. The tracker implements it: each new screen becomes the
//! `flow_context` of later events and is tracked once as `VIEW_PAGE`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::tracker::Tracker;

/// Receives screen changes from the host.
#[async_trait]
pub trait ScreenObserver: Send + Sync + 'static {
	async fn on_screen_changed(&self, screen: &str);
}

/// Type alias for a shared screen observer.
pub type SharedScreenObserver = Arc<dyn ScreenObserver>;

#[async_trait]
impl ScreenObserver for Tracker {
	async fn on_screen_changed(&self, screen: &str) {
		self.screen_changed(screen).await;
	}
}
