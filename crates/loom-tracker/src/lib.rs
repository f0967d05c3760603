// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Event Tracker Rust SDK for Loom.
//!
//! This crate embeds event tracking into a host application. Calls made
//! before the tracker is ready are buffered and replayed once a session
//! exists; failures never surface to the host.
//!
//! # Features
//!
//! - **Lazy Initialization**: `initialize` is idempotent and concurrent callers share one attempt
//! - **Watchdog**: Attempts that hang are cancelled and can be retried
//! - **Pending Buffer**: Up to 100 track calls held until delivery is possible
//! - **Persistent Identity**: Device, session and user ids survive restarts
//! - **Pluggable Seams**: Store, backend, consent gate and location provider are traits
//!
//! # Example
//!
//! ```ignore
//! use loom_tracker::{Attributes, Tracker, TrackerConfigOverrides};
//!
//! #[tokio::main]
//! async fn main() {
//!     let tracker = Tracker::builder().build();
//!
//!     let config = TrackerConfigOverrides::new().api_key("loom_tracker_xxx");
//!     tracker.initialize("925", Some(config)).await;
//!
//!     tracker.screen_changed("Home").await;
//!     tracker
//!         .track("button click", Some(Attributes::new().insert("x", 1)), None)
//!         .await;
//!
//!     tracker.identify("user-42", Some(Attributes::new().insert("email", "a@b.c"))).await;
//! }
//! ```

mod backend;
mod buffer;
mod consent;
mod device;
mod error;
mod lifecycle;
mod screen;
mod store;
mod tracker;

pub use backend::{
	BackendClient, BackendFactory, HttpBackendClient, HttpBackendFactory, MetadataRequest,
	ProfileRequest, SharedBackend, REQUEST_TIMEOUT,
};
pub use buffer::{Enqueued, PendingCallBuffer, MAX_PENDING_CALLS};
pub use consent::{AllowAllConsent, ConsentGate, SharedConsentGate, ToggleConsent};
pub use device::{
	DeviceInfo, FixedLocation, HostInfo, Location, LocationProvider, NoLocation,
	SharedLocationProvider, SDK_NAME, SDK_VERSION,
};
pub use error::{Result, StoreError, TrackerError};
pub use screen::{ScreenObserver, SharedScreenObserver};
pub use store::{
	FileStore, KeyValueStore, MemoryStore, StorageKey, StorageKeys, DEFAULT_KEY_PREFIX,
};
pub use tracker::{Tracker, TrackerBuilder, DEFAULT_INIT_TIMEOUT};

// Re-export core types for convenience
pub use loom_tracker_core::{
	Attributes, BrandId, ConfigurationError, DeviceId, InitializationState, PendingCall,
	ProfileUpdate, SessionId, TrackerConfigOverrides, TrackerConfiguration, TrackerSession,
	UserId,
};
