// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The tracker facade.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use loom_tracker_core::{
	build_event_data, normalize_event_name, Attributes, BrandId, DeviceId, InitializationState,
	PendingCall, ProfileUpdate, SessionId, TrackerConfigOverrides, TrackerConfiguration,
	TrackerSession, UserId, USER_ID_KEY, VIEW_PAGE_EVENT,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::backend::{BackendFactory, HttpBackendFactory, MetadataRequest, ProfileRequest};
use crate::buffer::{Enqueued, PendingCallBuffer, MAX_PENDING_CALLS};
use crate::consent::{AllowAllConsent, ConsentGate, SharedConsentGate};
use crate::device::{HostInfo, LocationProvider, NoLocation, SharedLocationProvider};
use crate::error::TrackerError;
use crate::lifecycle::{ActiveClient, CoreState};
use crate::store::{FileStore, KeyValueStore, MemoryStore, StorageKey, StorageKeys};

/// How long an initialization attempt may stay pending before the watchdog
/// abandons it.
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Builder for constructing a [`Tracker`].
pub struct TrackerBuilder {
	store: Option<Arc<dyn KeyValueStore>>,
	backend_factory: Option<Arc<dyn BackendFactory>>,
	consent: SharedConsentGate,
	location: SharedLocationProvider,
	host: HostInfo,
	storage_keys: StorageKeys,
	init_timeout: Duration,
	buffer_capacity: usize,
}

impl TrackerBuilder {
	pub fn new() -> Self {
		Self {
			store: None,
			backend_factory: None,
			consent: Arc::new(AllowAllConsent),
			location: Arc::new(NoLocation),
			host: HostInfo::default(),
			storage_keys: StorageKeys::default(),
			init_timeout: DEFAULT_INIT_TIMEOUT,
			buffer_capacity: MAX_PENDING_CALLS,
		}
	}

	/// Sets the local key-value store. Defaults to a [`FileStore`] in the
	/// platform data directory.
	pub fn store(mut self, store: impl KeyValueStore) -> Self {
		self.store = Some(Arc::new(store));
		self
	}

	/// Sets a shared store, e.g. one the host also inspects.
	pub fn shared_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
		self.store = Some(store);
		self
	}

	/// Uses a non-persistent in-memory store.
	pub fn in_memory(self) -> Self {
		self.store(MemoryStore::new())
	}

	/// Sets how backend clients are built. Defaults to [`HttpBackendFactory`].
	pub fn backend_factory(mut self, factory: impl BackendFactory) -> Self {
		self.backend_factory = Some(Arc::new(factory));
		self
	}

	/// Installs the consent gate consulted before events leave the device.
	pub fn consent_gate(mut self, gate: impl ConsentGate) -> Self {
		self.consent = Arc::new(gate);
		self
	}

	/// Installs the location bridge used after session creation.
	pub fn location_provider(mut self, provider: impl LocationProvider) -> Self {
		self.location = Arc::new(provider);
		self
	}

	/// Sets host facts sent with session creation.
	pub fn host_info(mut self, host: HostInfo) -> Self {
		self.host = host;
		self
	}

	/// Sets the prefix for persisted keys.
	pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.storage_keys = StorageKeys::new(prefix);
		self
	}

	/// Sets the watchdog timeout for initialization attempts.
	pub fn init_timeout(mut self, timeout: Duration) -> Self {
		self.init_timeout = timeout;
		self
	}

	/// Sets the pending call buffer capacity.
	pub fn buffer_capacity(mut self, capacity: usize) -> Self {
		self.buffer_capacity = capacity;
		self
	}

	pub fn build(self) -> Tracker {
		let store = self
			.store
			.unwrap_or_else(|| Arc::new(FileStore::default_location()));
		let backend_factory = self
			.backend_factory
			.unwrap_or_else(|| Arc::new(HttpBackendFactory));

		Tracker {
			inner: Arc::new(TrackerInner {
				store,
				backend_factory,
				consent: self.consent,
				location: self.location,
				host: self.host,
				keys: self.storage_keys,
				init_timeout: self.init_timeout,
				debug: AtomicBool::new(false),
				core: Mutex::new(CoreState::new(PendingCallBuffer::with_capacity(
					self.buffer_capacity,
				))),
				drain_lock: Mutex::new(()),
			}),
		}
	}
}

impl Default for TrackerBuilder {
	fn default() -> Self {
		Self::new()
	}
}

pub(crate) struct TrackerInner {
	pub(crate) store: Arc<dyn KeyValueStore>,
	pub(crate) backend_factory: Arc<dyn BackendFactory>,
	pub(crate) consent: SharedConsentGate,
	pub(crate) location: SharedLocationProvider,
	pub(crate) host: HostInfo,
	pub(crate) keys: StorageKeys,
	pub(crate) init_timeout: Duration,
	pub(crate) debug: AtomicBool,
	pub(crate) core: Mutex<CoreState>,
	pub(crate) drain_lock: Mutex<()>,
}

/// Event tracker.
///
/// One instance per process, created by the host and shared by cloning.
/// Every method is infallible from the caller's point of view: failures are
/// logged through `tracing` and the call degrades to a no-op.
///
/// # Example
///
/// ```ignore
/// use loom_tracker::{Attributes, Tracker, TrackerConfigOverrides};
///
/// let tracker = Tracker::builder().build();
///
/// // Events tracked before initialization settles are buffered.
/// tracker.track("app open", None, None).await;
///
/// tracker
///     .initialize("925", Some(TrackerConfigOverrides::new().api_key("k")))
///     .await;
///
/// tracker
///     .track("button click", Some(Attributes::new().insert("x", 1)), None)
///     .await;
///
/// tracker.identify("user-42", None).await;
/// tracker.reset(false).await;
/// ```
#[derive(Clone)]
pub struct Tracker {
	pub(crate) inner: Arc<TrackerInner>,
}

impl Tracker {
	pub fn builder() -> TrackerBuilder {
		TrackerBuilder::new()
	}

	/// Current lifecycle state.
	pub async fn state(&self) -> InitializationState {
		self.inner.core.lock().await.state
	}

	/// Number of track calls waiting in the pending buffer.
	pub async fn pending_len(&self) -> usize {
		self.inner.core.lock().await.buffer.len()
	}

	/// Snapshot of the persisted identity.
	pub async fn session(&self) -> TrackerSession {
		TrackerSession {
			session_id: self.persisted_session_id().await,
			device_id: self.stored(StorageKey::DeviceId).await.map(DeviceId::new),
			brand_id: self.persisted_brand_id().await,
			identified_user_id: self.persisted_user_id().await,
		}
	}

	/// Initializes the tracker for `brand_id`.
	///
	/// Returns the state the attempt settled in. A ready tracker returns
	/// immediately; a pending one joins the attempt already in flight.
	pub async fn initialize(
		&self,
		brand_id: &str,
		config: Option<TrackerConfigOverrides>,
	) -> InitializationState {
		self.start_or_join(brand_id, config.unwrap_or_default(), false)
			.await
	}

	/// Starts a fresh initialization attempt even if the tracker is ready or
	/// failed. Joins the in-flight attempt if one is pending.
	pub async fn re_initialize(
		&self,
		brand_id: &str,
		config: Option<TrackerConfigOverrides>,
	) -> InitializationState {
		self.start_or_join(brand_id, config.unwrap_or_default(), true)
			.await
	}

	/// Tracks an event.
	///
	/// Buffered while initialization is pending or no session exists yet,
	/// delivered once the tracker is ready, dropped after a failed
	/// initialization.
	pub async fn track(
		&self,
		event_name: &str,
		attributes: Option<Attributes>,
		metadata: Option<Attributes>,
	) {
		if event_name.trim().is_empty() {
			self.log_drop(event_name, "empty event name");
			return;
		}
		self.track_call(PendingCall::new(event_name, attributes, metadata))
			.await;
	}

	/// Associates the device with a host user id and optional traits.
	pub async fn identify(&self, user_id: &str, traits: Option<Attributes>) {
		if user_id.trim().is_empty() {
			debug!("identify called with an empty user id, ignoring");
			return;
		}
		let data = traits.unwrap_or_default().insert(USER_ID_KEY, user_id);
		self.update_profile(data).await;
	}

	/// Sets profile fields. Alias of [`Tracker::update_profile`].
	pub async fn set(&self, profile: Attributes) {
		self.update_profile(profile).await;
	}

	/// Sends profile data.
	///
	/// A `user_id` that differs from the identified user is bound to the
	/// session first; the profile is only written once that binding
	/// succeeded. Numeric user ids are sent as text. Without a session the
	/// user is stored and bound when the session is created.
	pub async fn update_profile(&self, data: Attributes) {
		let Some((active, brand_id)) = self.ready_client("update_profile").await else {
			return;
		};
		if !self.inner.consent.is_tracking_allowed() {
			debug!("Profile update blocked by consent gate");
			return;
		}

		let mut profile = ProfileUpdate::from_attributes(data);
		let had_user_field = profile.fields.contains_key(USER_ID_KEY);
		let requested_user = profile.take_user_id();
		if had_user_field && requested_user.is_none() {
			debug!("Ignoring user_id that is neither a non-empty string nor a number");
		}
		if requested_user.is_none() && profile.is_empty() {
			debug!("Nothing to send, ignoring update_profile");
			return;
		}
		let persisted_user = self.persisted_user_id().await;
		let mut session_id = self.persisted_session_id().await;

		if let Some(user) = requested_user.as_ref() {
			if persisted_user.as_ref() != Some(user) {
				match self.bind_user(&active, session_id.as_ref(), user).await {
					Ok(Some(replacement)) => session_id = Some(replacement),
					Ok(None) => {}
					Err(e) => {
						self.log_failure("identify_by_id", &e);
						return;
					}
				}
			}
		}

		if let Some(email) = profile.email() {
			self.persist(StorageKey::SessionEmail, email, None).await;
		}

		let request = ProfileRequest {
			session_id,
			user_id: requested_user.or(persisted_user),
			profile,
		};
		match active.backend.update_profile(&request, brand_id).await {
			Ok(()) => debug!(brand_id = %brand_id, "Profile updated"),
			Err(e) => self.log_failure("update_profile", &e),
		}
	}

	/// Attaches metadata to the current session or identified user.
	pub async fn set_metadata(&self, metadata: Attributes) {
		let Some((active, brand_id)) = self.ready_client("set_metadata").await else {
			return;
		};
		if !self.inner.consent.is_tracking_allowed() {
			debug!("Metadata update blocked by consent gate");
			return;
		}

		let session_id = self.persisted_session_id().await;
		let user_id = self.persisted_user_id().await;
		if session_id.is_none() && user_id.is_none() {
			debug!("No session or identified user yet, ignoring set_metadata");
			return;
		}

		let request = MetadataRequest {
			session_id,
			user_id,
			metadata,
		};
		match active.backend.set_metadata(&request, brand_id).await {
			Ok(()) => debug!(brand_id = %brand_id, "Metadata updated"),
			Err(e) => self.log_failure("set_metadata", &e),
		}
	}

	/// Forgets the current session and identity.
	///
	/// Cancels any pending initialization, empties the pending buffer and
	/// clears persisted ids (the brand too when `clear_brand_id` is set). A
	/// ready tracker stays ready and starts creating a new session in the
	/// background.
	pub async fn reset(&self, clear_brand_id: bool) {
		let active = self.reset_in_memory().await;

		let retained_brand = if clear_brand_id {
			None
		} else {
			self.stored(StorageKey::BrandId).await
		};

		for key in [
			StorageKey::SessionId,
			StorageKey::DeviceId,
			StorageKey::SessionEmail,
			StorageKey::IdentifiedUserId,
			StorageKey::BrandId,
		] {
			self.forget(key).await;
		}
		if let Err(e) = self.inner.store.clear_all(self.inner.keys.prefix()).await {
			debug!(error = %e, "Failed to clear tracker store entries");
		}
		if let Some(brand) = retained_brand.as_deref() {
			self.persist(StorageKey::BrandId, brand, None).await;
		}

		info!(clear_brand_id, "Tracker reset");

		if let (Some((active, cancel)), Some(brand_id)) = (active, self.persisted_brand_id().await)
		{
			let tracker = self.clone();
			tokio::spawn(async move {
				tracker.bootstrap_session(&active, brand_id, &cancel).await;
			});
		}
	}

	/// Records the screen now shown by the host and tracks `VIEW_PAGE` when it
	/// differs from the last tracked screen.
	pub async fn screen_changed(&self, screen: &str) {
		if screen.trim().is_empty() {
			return;
		}
		let should_track = {
			let mut core = self.inner.core.lock().await;
			core.current_screen = Some(screen.to_string());
			let accepting = matches!(
				core.state,
				InitializationState::Pending | InitializationState::Ready
			);
			if accepting && core.last_tracked_screen.as_deref() != Some(screen) {
				core.last_tracked_screen = Some(screen.to_string());
				true
			} else {
				false
			}
		};

		if should_track {
			self.track(
				VIEW_PAGE_EVENT,
				Some(Attributes::new().insert("screen", screen)),
				None,
			)
			.await;
		}
	}

	/// Replays buffered track calls.
	///
	/// The buffer is emptied before replay; calls that still cannot be
	/// delivered are buffered again and wait for the next drain.
	pub(crate) async fn flush_pending_calls(&self) {
		let _drain = self.inner.drain_lock.lock().await;
		let calls = self.inner.core.lock().await.buffer.take_all();
		if calls.is_empty() {
			return;
		}

		debug!(count = calls.len(), "Replaying pending track calls");
		for call in calls {
			self.track_call(call).await;
		}
	}

	async fn track_call(&self, call: PendingCall) {
		let (active, screen) = {
			let mut core = self.inner.core.lock().await;
			match (core.state, core.active.clone()) {
				(InitializationState::Uninitialized, _) => {
					drop(core);
					self.log_drop(&call.event_name, "tracker not initialized");
					return;
				}
				(InitializationState::Failed, _) => {
					drop(core);
					self.log_drop(&call.event_name, "initialization failed");
					return;
				}
				(InitializationState::Pending, _) | (InitializationState::Ready, None) => {
					let _ = self.enqueue(&mut core, call);
					return;
				}
				(InitializationState::Ready, Some(active)) => (active, core.current_screen.clone()),
			}
		};

		let session_id = self.persisted_session_id().await;
		let brand_id = self.persisted_brand_id().await;
		let (Some(session_id), Some(brand_id)) = (session_id, brand_id) else {
			let queued_while_ready = {
				let mut core = self.inner.core.lock().await;
				match core.state {
					InitializationState::Pending => {
						self.enqueue(&mut core, call);
						false
					}
					InitializationState::Ready => self.enqueue(&mut core, call),
					_ => {
						drop(core);
						self.log_drop(&call.event_name, "tracker no longer initialized");
						false
					}
				}
			};

			// The session may have been persisted after it was read above, in
			// which case its drain has already run without this call.
			if queued_while_ready
				&& self.persisted_session_id().await.is_some()
				&& self.persisted_brand_id().await.is_some()
			{
				self.spawn_flush();
			}
			return;
		};

		if !self.inner.consent.is_tracking_allowed() {
			self.log_drop(&call.event_name, "blocked by consent gate");
			return;
		}

		let event_name = normalize_event_name(&call.event_name);
		let data = build_event_data(
			&event_name,
			call.attributes,
			call.metadata,
			screen.as_deref(),
		);

		match active
			.backend
			.send_event(brand_id, &session_id, &event_name, data.as_ref())
			.await
		{
			Ok(()) => debug!(event_name = %event_name, session_id = %session_id, "Event sent"),
			Err(e) => self.log_failure("send_event", &e),
		}
	}

	fn spawn_flush(&self) {
		let tracker = self.clone();
		tokio::spawn(async move { tracker.flush_pending_calls().await });
	}

	/// Buffers `call`, returning whether it was queued.
	fn enqueue(&self, core: &mut CoreState, call: PendingCall) -> bool {
		let event_name = call.event_name.clone();
		match core.buffer.push(call) {
			Enqueued::Queued(len) => {
				debug!(event_name = %event_name, queued = len, "Buffered track call");
				true
			}
			Enqueued::Full => {
				self.log_drop(&event_name, "queue full");
				false
			}
		}
	}

	/// Binds `user` to the session, persisting the identified user and any
	/// replacement session id. Without a session only the user is persisted;
	/// session bootstrap binds it once a session is created.
	async fn bind_user(
		&self,
		active: &ActiveClient,
		session_id: Option<&SessionId>,
		user: &UserId,
	) -> Result<Option<SessionId>, TrackerError> {
		let replacement = match session_id {
			Some(current) => {
				let returned = active.backend.identify_by_id(current, user).await?;
				returned.filter(|new_id| new_id != current)
			}
			None => {
				debug!(user_id = %user, "No session yet, storing identified user locally");
				None
			}
		};

		if let Some(new_id) = replacement.as_ref() {
			self.persist(
				StorageKey::SessionId,
				new_id.as_str(),
				Some(active.config.cookie_expiration_days),
			)
			.await;
		}
		self.persist(StorageKey::IdentifiedUserId, user.as_str(), None)
			.await;
		info!(user_id = %user, "User identified");
		Ok(replacement)
	}

	/// Returns the active client and brand if the tracker is ready.
	async fn ready_client(&self, operation: &'static str) -> Option<(ActiveClient, BrandId)> {
		let active = {
			let core = self.inner.core.lock().await;
			match (core.state, core.active.clone()) {
				(InitializationState::Ready, Some(active)) => active,
				(state, _) => {
					debug!(operation, state = %state, "Tracker not ready, ignoring call");
					return None;
				}
			}
		};
		match self.persisted_brand_id().await {
			Some(brand_id) => Some((active, brand_id)),
			None => {
				debug!(operation, "No brand id persisted, ignoring call");
				None
			}
		}
	}

	pub(crate) async fn stored(&self, key: StorageKey) -> Option<String> {
		match self.inner.store.get(&self.inner.keys.key(key)).await {
			Ok(value) => value.filter(|v| !v.is_empty()),
			Err(e) => {
				debug!(key = key.name(), error = %e, "Failed to read tracker store");
				None
			}
		}
	}

	pub(crate) async fn persist(&self, key: StorageKey, value: &str, expires_in_days: Option<u32>) {
		if let Err(e) = self
			.inner
			.store
			.set(&self.inner.keys.key(key), value, expires_in_days)
			.await
		{
			debug!(key = key.name(), error = %e, "Failed to write tracker store");
		}
	}

	pub(crate) async fn forget(&self, key: StorageKey) {
		if let Err(e) = self.inner.store.remove(&self.inner.keys.key(key)).await {
			debug!(key = key.name(), error = %e, "Failed to remove tracker store entry");
		}
	}

	pub(crate) async fn persisted_session_id(&self) -> Option<SessionId> {
		self.stored(StorageKey::SessionId).await.map(SessionId::new)
	}

	pub(crate) async fn persisted_brand_id(&self) -> Option<BrandId> {
		self.stored(StorageKey::BrandId)
			.await
			.and_then(|raw| BrandId::parse(&raw).ok())
	}

	pub(crate) async fn persisted_user_id(&self) -> Option<UserId> {
		self.stored(StorageKey::IdentifiedUserId)
			.await
			.map(UserId::new)
	}

	pub(crate) fn set_debug(&self, config: &TrackerConfiguration) {
		self.inner.debug.store(config.debug, Ordering::Relaxed);
	}

	pub(crate) fn log_drop(&self, event_name: &str, reason: &'static str) {
		if self.inner.debug.load(Ordering::Relaxed) {
			warn!(event_name = %event_name, reason, "Dropped track call");
		} else {
			debug!(event_name = %event_name, reason, "Dropped track call");
		}
	}

	pub(crate) fn log_failure(&self, operation: &'static str, error: &TrackerError) {
		if self.inner.debug.load(Ordering::Relaxed) {
			warn!(operation, error = %error, "Tracker request failed");
		} else {
			debug!(operation, error = %error, "Tracker request failed");
		}
	}
}
