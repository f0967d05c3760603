// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Backend session client.
//!
//! [`BackendClient`] is the seam between the tracker and the tracking API.
//! [`HttpBackendClient`] talks JSON over HTTPS; tests and hosts with their own
//! transport provide another implementation through a [`BackendFactory`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use loom_tracker_core::{
	Attributes, BrandId, ConfigurationError, ProfileUpdate, SessionId, TrackerConfiguration,
	UserId,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::device::{DeviceInfo, Location, SDK_VERSION};
use crate::error::{Result, TrackerError};

/// Timeout applied to every backend request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Operations the tracker performs against the tracking API.
///
/// Every method reports failure through `Err`; the tracker logs and drops.
#[async_trait]
pub trait BackendClient: Send + Sync + 'static {
	/// Creates a session for this device. 200 and 201 both count as success.
	async fn create_session(&self, brand_id: BrandId, device: &DeviceInfo) -> Result<SessionId>;

	async fn send_event(
		&self,
		brand_id: BrandId,
		session_id: &SessionId,
		event_name: &str,
		data: Option<&Attributes>,
	) -> Result<()>;

	async fn update_profile(&self, request: &ProfileRequest, brand_id: BrandId) -> Result<()>;

	async fn set_metadata(&self, request: &MetadataRequest, brand_id: BrandId) -> Result<()>;

	/// Binds the anonymous session to `user_id`. The server may answer with a
	/// replacement session id.
	async fn identify_by_id(
		&self,
		session_id: &SessionId,
		user_id: &UserId,
	) -> Result<Option<SessionId>>;

	/// Best-effort location update for the session.
	async fn update_session_location(
		&self,
		session_id: &SessionId,
		location: Location,
	) -> Result<()>;
}

/// Type alias for a shared backend client.
pub type SharedBackend = Arc<dyn BackendClient>;

/// Builds a backend client bound to a resolved configuration and brand.
pub trait BackendFactory: Send + Sync + 'static {
	fn connect(&self, config: &TrackerConfiguration, brand_id: BrandId) -> Result<SharedBackend>;
}

/// A pre-built client is its own factory.
impl BackendFactory for SharedBackend {
	fn connect(&self, _config: &TrackerConfiguration, _brand_id: BrandId) -> Result<SharedBackend> {
		Ok(Arc::clone(self))
	}
}

/// Factory producing [`HttpBackendClient`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpBackendFactory;

impl BackendFactory for HttpBackendFactory {
	fn connect(&self, config: &TrackerConfiguration, _brand_id: BrandId) -> Result<SharedBackend> {
		Ok(Arc::new(HttpBackendClient::new(config)?))
	}
}

/// Body of a profile update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRequest {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub session_id: Option<SessionId>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub user_id: Option<UserId>,
	#[serde(flatten)]
	pub profile: ProfileUpdate,
}

/// Body of a metadata update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRequest {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub session_id: Option<SessionId>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub user_id: Option<UserId>,
	pub metadata: Attributes,
}

#[derive(Debug, Serialize)]
struct CreateSessionBody<'a> {
	brand_id: BrandId,
	device: &'a DeviceInfo,
}

#[derive(Debug, Deserialize)]
struct CreateSessionResponse {
	session_id: Option<SessionId>,
}

#[derive(Debug, Serialize)]
struct SendEventBody<'a> {
	brand_id: BrandId,
	session_id: &'a SessionId,
	event_name: &'a str,
	#[serde(skip_serializing_if = "Option::is_none")]
	data: Option<&'a Attributes>,
	timestamp: String,
}

#[derive(Debug, Serialize)]
struct BrandScoped<'a, T: Serialize> {
	brand_id: BrandId,
	#[serde(flatten)]
	body: &'a T,
}

#[derive(Debug, Serialize)]
struct IdentifyBody<'a> {
	user_id: &'a UserId,
}

#[derive(Debug, Default, Deserialize)]
struct IdentifyResponse {
	#[serde(default)]
	session_id: Option<SessionId>,
}

/// JSON-over-HTTP backend client.
pub struct HttpBackendClient {
	base_url: String,
	base: Url,
	api_key: String,
	http_client: Client,
}

impl std::fmt::Debug for HttpBackendClient {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("HttpBackendClient")
			.field("base_url", &self.base_url)
			.finish_non_exhaustive()
	}
}

impl HttpBackendClient {
	pub fn new(config: &TrackerConfiguration) -> Result<Self> {
		let http_client = Client::builder()
			.user_agent(format!("loom-tracker/{SDK_VERSION}"))
			.timeout(REQUEST_TIMEOUT)
			.build()
			.map_err(TrackerError::RequestFailed)?;

		let base_url = config.api_base_url.trim_end_matches('/').to_string();
		let base = Url::parse(&base_url)
			.ok()
			.filter(|url| !url.cannot_be_a_base())
			.ok_or_else(|| ConfigurationError::InvalidBaseUrl(base_url.clone()))?;

		Ok(Self {
			base_url,
			base,
			api_key: config.api_key.clone(),
			http_client,
		})
	}

	pub fn base_url(&self) -> &str {
		&self.base_url
	}

	/// Builds the URL for `segments` under the base path. Each segment is
	/// percent-encoded, so ids cannot alter the route.
	fn endpoint(&self, segments: &[&str]) -> Result<Url> {
		let mut url = self.base.clone();
		url.path_segments_mut()
			.map_err(|()| ConfigurationError::InvalidBaseUrl(self.base_url.clone()))?
			.pop_if_empty()
			.extend(segments);
		Ok(url)
	}

	async fn post<B: Serialize + ?Sized>(
		&self,
		segments: &[&str],
		body: &B,
	) -> Result<reqwest::Response> {
		let url = self.endpoint(segments)?;
		debug!(url = %url, "Sending tracker request");

		let mut request = self.http_client.post(url).json(body);
		if !self.api_key.is_empty() {
			request = request.header("Authorization", format!("Bearer {}", self.api_key));
		}
		let response = request.send().await?;

		if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
			let retry_after = response
				.headers()
				.get("Retry-After")
				.and_then(|v| v.to_str().ok())
				.and_then(|s| s.parse().ok());
			return Err(TrackerError::RateLimited {
				retry_after_secs: retry_after,
			});
		}

		if !response.status().is_success() {
			let status = response.status().as_u16();
			let message = response.text().await.unwrap_or_default();
			return Err(TrackerError::ServerError { status, message });
		}

		Ok(response)
	}
}

#[async_trait]
impl BackendClient for HttpBackendClient {
	async fn create_session(&self, brand_id: BrandId, device: &DeviceInfo) -> Result<SessionId> {
		let response = self
			.post(&["v1", "sessions"], &CreateSessionBody { brand_id, device })
			.await?;
		let body: CreateSessionResponse = response.json().await?;
		body.session_id
			.ok_or_else(|| TrackerError::SessionCreation("response had no session_id".to_string()))
	}

	async fn send_event(
		&self,
		brand_id: BrandId,
		session_id: &SessionId,
		event_name: &str,
		data: Option<&Attributes>,
	) -> Result<()> {
		let body = SendEventBody {
			brand_id,
			session_id,
			event_name,
			data,
			timestamp: Utc::now().to_rfc3339(),
		};
		self.post(&["v1", "events"], &body).await?;
		Ok(())
	}

	async fn update_profile(&self, request: &ProfileRequest, brand_id: BrandId) -> Result<()> {
		self.post(
			&["v1", "profiles"],
			&BrandScoped {
				brand_id,
				body: request,
			},
		)
		.await?;
		Ok(())
	}

	async fn set_metadata(&self, request: &MetadataRequest, brand_id: BrandId) -> Result<()> {
		self.post(
			&["v1", "profiles", "metadata"],
			&BrandScoped {
				brand_id,
				body: request,
			},
		)
		.await?;
		Ok(())
	}

	async fn identify_by_id(
		&self,
		session_id: &SessionId,
		user_id: &UserId,
	) -> Result<Option<SessionId>> {
		let response = self
			.post(
				&["v1", "sessions", session_id.as_str(), "identify"],
				&IdentifyBody { user_id },
			)
			.await?;
		let bytes = response.bytes().await?;
		if bytes.is_empty() {
			return Ok(None);
		}
		let body: IdentifyResponse = serde_json::from_slice(&bytes)?;
		Ok(body.session_id)
	}

	async fn update_session_location(
		&self,
		session_id: &SessionId,
		location: Location,
	) -> Result<()> {
		self.post(
			&["v1", "sessions", session_id.as_str(), "location"],
			&location,
		)
		.await?;
		Ok(())
	}
}
