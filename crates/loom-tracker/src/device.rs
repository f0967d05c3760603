// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Device description and location bridge.

use std::sync::Arc;

use async_trait::async_trait;
use loom_tracker_core::DeviceId;
use serde::{Deserialize, Serialize};

/// SDK version for identification.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");
/// SDK name for identification.
pub const SDK_NAME: &str = "loom-tracker-rust";

/// Host-supplied facts about the app and device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostInfo {
	pub app_version: Option<String>,
	pub os_version: Option<String>,
	pub locale: Option<String>,
}

/// Device description sent with session creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
	pub device_id: DeviceId,
	pub platform: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub os_version: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub app_version: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub locale: Option<String>,
	pub sdk_name: String,
	pub sdk_version: String,
}

impl DeviceInfo {
	pub fn new(device_id: DeviceId, host: &HostInfo) -> Self {
		Self {
			device_id,
			platform: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
			os_version: host.os_version.clone(),
			app_version: host.app_version.clone(),
			locale: host.locale.clone(),
			sdk_name: SDK_NAME.to_string(),
			sdk_version: SDK_VERSION.to_string(),
		}
	}
}

/// A location fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
	pub latitude: f64,
	pub longitude: f64,
	/// Horizontal accuracy in metres.
	pub accuracy: f64,
}

/// Bridge to the host's location permission and provider.
///
/// Consulted once after a session is created. Returning `None` skips the
/// location update.
#[async_trait]
pub trait LocationProvider: Send + Sync + 'static {
	async fn current_location(&self) -> Option<Location>;
}

/// Type alias for a shared location provider.
pub type SharedLocationProvider = Arc<dyn LocationProvider>;

/// Location provider for hosts without location access.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocation;

#[async_trait]
impl LocationProvider for NoLocation {
	async fn current_location(&self) -> Option<Location> {
		None
	}
}

/// Location provider that always reports the same fix.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation(pub Location);

#[async_trait]
impl LocationProvider for FixedLocation {
	async fn current_location(&self) -> Option<Location> {
		Some(self.0)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_device_info_carries_host_fields() {
		let host = HostInfo {
			app_version: Some("2.1.0".to_string()),
			os_version: None,
			locale: Some("en-AU".to_string()),
		};

		let info = DeviceInfo::new(DeviceId::new("d1"), &host);

		assert_eq!(info.device_id.as_str(), "d1");
		assert_eq!(info.app_version.as_deref(), Some("2.1.0"));
		assert_eq!(info.sdk_name, SDK_NAME);
		assert!(info.platform.contains(std::env::consts::OS));
	}

	#[test]
	fn test_device_info_skips_absent_fields() {
		let info = DeviceInfo::new(DeviceId::new("d1"), &HostInfo::default());
		let json = serde_json::to_value(&info).unwrap();
		assert!(json.get("app_version").is_none());
		assert_eq!(json["device_id"], "d1");
	}

	#[tokio::test]
	async fn test_location_providers() {
		assert!(NoLocation.current_location().await.is_none());

		let fix = Location {
			latitude: -33.86,
			longitude: 151.2,
			accuracy: 12.0,
		};
		assert_eq!(FixedLocation(fix).current_location().await, Some(fix));
	}
}
