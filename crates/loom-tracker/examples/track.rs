// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Example: Track events using the loom-tracker SDK.
//!
//! Run with:
//!   RUST_LOG=loom_tracker=debug cargo run --example track -p loom-tracker
//!
//! The API endpoint and key are read from `LOOM_TRACKER_API_URL` and
//! `LOOM_TRACKER_API_KEY`.

use loom_tracker::{Attributes, HostInfo, InitializationState, Tracker, TrackerConfigOverrides};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::from_default_env())
		.init();

	let brand_id = std::env::var("LOOM_TRACKER_BRAND_ID").unwrap_or_else(|_| "925".to_string());

	let tracker = Tracker::builder()
		.in_memory()
		.host_info(HostInfo {
			app_version: Some("0.1.0-example".to_string()),
			..Default::default()
		})
		.build();

	// Tracked before initialization, so this one is dropped.
	tracker.track("app open", None, None).await;

	println!("Initializing tracker for brand {brand_id}...");
	let state = tracker
		.initialize(&brand_id, Some(TrackerConfigOverrides::new().debug(true)))
		.await;
	println!("  State: {state}");
	if state != InitializationState::Ready {
		return Err(format!("tracker did not become ready: {state}").into());
	}

	tracker.screen_changed("Home").await;
	tracker
		.track(
			"button click",
			Some(Attributes::new().insert("button", "subscribe")),
			Some(Attributes::new().insert("experiment", "b")),
		)
		.await;

	tracker
		.identify(
			"user_example_123",
			Some(Attributes::new().insert("email", "example@example.com")),
		)
		.await;

	// Give the background session bootstrap a moment before printing.
	tokio::time::sleep(std::time::Duration::from_secs(1)).await;
	println!("  Session: {:?}", tracker.session().await);
	println!("  Pending: {}", tracker.pending_len().await);

	tracker.reset(false).await;
	println!("Done!");
	Ok(())
}
