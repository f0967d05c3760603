// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Initialization lifecycle.
//!
//! At most one initialization attempt is in flight. Each attempt gets a
//! generation number and a [`CancellationToken`]; the init task and the
//! watchdog race to settle it, and whichever arrives second finds the attempt
//! gone and discards its result. Callers that arrive while an attempt is
//! pending subscribe to its outcome channel instead of starting another.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use loom_tracker_core::{
	BrandId, DeviceId, InitializationState, SessionId, TrackerConfigOverrides,
	TrackerConfiguration,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::SharedBackend;
use crate::buffer::PendingCallBuffer;
use crate::device::DeviceInfo;
use crate::error::{Result, TrackerError};
use crate::store::StorageKey;
use crate::tracker::Tracker;

/// Backend client and configuration of a settled attempt.
#[derive(Clone)]
pub(crate) struct ActiveClient {
	pub(crate) backend: SharedBackend,
	pub(crate) config: TrackerConfiguration,
}

struct Attempt {
	generation: u64,
	cancel: CancellationToken,
	outcome: watch::Sender<InitializationState>,
	watchdog: JoinHandle<()>,
}

/// Mutable tracker state guarded by the tracker's core mutex.
pub(crate) struct CoreState {
	pub(crate) state: InitializationState,
	pub(crate) active: Option<ActiveClient>,
	pub(crate) buffer: PendingCallBuffer,
	pub(crate) current_screen: Option<String>,
	pub(crate) last_tracked_screen: Option<String>,
	attempt: Option<Attempt>,
	generation: u64,
	/// Cancels the session bootstrap started by the last settled attempt or
	/// reset.
	bootstrap: Option<CancellationToken>,
}

impl CoreState {
	pub(crate) fn new(buffer: PendingCallBuffer) -> Self {
		Self {
			state: InitializationState::Uninitialized,
			active: None,
			buffer,
			current_screen: None,
			last_tracked_screen: None,
			attempt: None,
			generation: 0,
			bootstrap: None,
		}
	}

	fn transition(&mut self, next: InitializationState) {
		if self.state == next {
			return;
		}
		debug_assert!(
			self.state.can_transition_to(next),
			"illegal transition {} -> {}",
			self.state,
			next
		);
		debug!(from = %self.state, to = %next, "Tracker state changed");
		self.state = next;
	}

	/// Takes the in-flight attempt if it still belongs to `generation`.
	fn take_attempt(&mut self, generation: u64) -> Option<Attempt> {
		match self.attempt.as_ref() {
			Some(attempt) if attempt.generation == generation => self.attempt.take(),
			_ => None,
		}
	}
}

impl Tracker {
	pub(crate) async fn start_or_join(
		&self,
		brand_id: &str,
		overrides: TrackerConfigOverrides,
		force: bool,
	) -> InitializationState {
		let mut outcome = {
			let mut core = self.inner.core.lock().await;
			let joined = match (core.state, core.attempt.as_ref()) {
				(InitializationState::Ready, _) if !force => {
					return InitializationState::Ready;
				}
				(InitializationState::Pending, Some(attempt)) => {
					debug!(
						generation = attempt.generation,
						"Initialization already in progress, joining"
					);
					Some(attempt.outcome.subscribe())
				}
				_ => None,
			};
			match joined {
				Some(receiver) => receiver,
				None => self.begin_attempt(&mut core, brand_id, overrides),
			}
		};

		let settled = outcome
			.wait_for(|state| *state != InitializationState::Pending)
			.await
			.map(|state| *state);
		settled.unwrap_or_else(|_| *outcome.borrow())
	}

	fn begin_attempt(
		&self,
		core: &mut CoreState,
		brand_id: &str,
		overrides: TrackerConfigOverrides,
	) -> watch::Receiver<InitializationState> {
		if let Some(previous) = core.bootstrap.take() {
			previous.cancel();
		}
		if let Some(debug) = overrides.debug {
			self.inner.debug.store(debug, Ordering::Relaxed);
		}

		core.generation += 1;
		let generation = core.generation;
		let cancel = CancellationToken::new();
		let (outcome, receiver) = watch::channel(InitializationState::Pending);
		core.transition(InitializationState::Pending);
		info!(generation, brand_id, "Tracker initialization started");

		// Both tasks block on the core lock until the attempt is recorded below.
		let watchdog = tokio::spawn(self.clone().run_watchdog(generation));
		tokio::spawn(self.clone().run_initialization(
			generation,
			brand_id.to_string(),
			overrides,
			cancel.clone(),
		));

		core.attempt = Some(Attempt {
			generation,
			cancel,
			outcome,
			watchdog,
		});
		receiver
	}

	async fn run_watchdog(self, generation: u64) {
		tokio::time::sleep(self.inner.init_timeout).await;

		let mut core = self.inner.core.lock().await;
		let Some(attempt) = core.take_attempt(generation) else {
			return;
		};
		attempt.cancel.cancel();
		core.transition(InitializationState::Uninitialized);
		warn!(
			generation,
			timeout_secs = self.inner.init_timeout.as_secs_f64(),
			buffered = core.buffer.len(),
			error = %TrackerError::WatchdogTimeout,
			"Abandoning tracker initialization"
		);
		attempt.outcome.send_replace(InitializationState::Uninitialized);
	}

	async fn run_initialization(
		self,
		generation: u64,
		brand_id: String,
		overrides: TrackerConfigOverrides,
		cancel: CancellationToken,
	) {
		let prepared = tokio::select! {
			_ = cancel.cancelled() => Err(TrackerError::Cancelled),
			prepared = self.prepare_client(&brand_id, overrides) => prepared,
		};

		let Some((active, brand_id, bootstrap)) = self.settle(generation, prepared).await else {
			return;
		};

		self.flush_pending_calls().await;
		self.bootstrap_session(&active, brand_id, &bootstrap).await;
	}

	/// Validates input, builds the backend client and persists the brand.
	async fn prepare_client(
		&self,
		brand_id: &str,
		overrides: TrackerConfigOverrides,
	) -> Result<(ActiveClient, BrandId)> {
		let brand_id = BrandId::parse(brand_id)?;
		let config = TrackerConfigOverrides::from_env()?
			.layer(overrides)
			.resolve()?;
		let backend = self.inner.backend_factory.connect(&config, brand_id)?;

		self.inner
			.store
			.set(
				&self.inner.keys.key(StorageKey::BrandId),
				&brand_id.to_string(),
				None,
			)
			.await?;

		Ok((ActiveClient { backend, config }, brand_id))
	}

	/// Publishes the outcome of attempt `generation`. Returns the client to
	/// bootstrap a session with when the attempt became ready.
	async fn settle(
		&self,
		generation: u64,
		prepared: Result<(ActiveClient, BrandId)>,
	) -> Option<(ActiveClient, BrandId, CancellationToken)> {
		let mut core = self.inner.core.lock().await;
		let Some(attempt) = core.take_attempt(generation) else {
			debug!(generation, "Discarding result of abandoned initialization attempt");
			return None;
		};
		attempt.watchdog.abort();

		match prepared {
			Ok((active, brand_id)) => {
				self.set_debug(&active.config);
				core.transition(InitializationState::Ready);
				core.active = Some(active.clone());
				core.bootstrap = Some(attempt.cancel.clone());
				info!(generation, brand_id = %brand_id, "Tracker initialized");
				attempt.outcome.send_replace(InitializationState::Ready);
				Some((active, brand_id, attempt.cancel))
			}
			Err(e) => {
				core.transition(InitializationState::Failed);
				core.active = None;
				let discarded = core.buffer.clear();
				warn!(generation, error = %e, discarded, "Tracker initialization failed");
				attempt.outcome.send_replace(InitializationState::Failed);
				None
			}
		}
	}

	/// Ensures a session exists, then drains the buffer.
	pub(crate) async fn bootstrap_session(
		&self,
		active: &ActiveClient,
		brand_id: BrandId,
		cancel: &CancellationToken,
	) {
		match self.ensure_session(active, brand_id, cancel).await {
			Ok(()) => self.flush_pending_calls().await,
			Err(TrackerError::Cancelled) => debug!("Session bootstrap cancelled"),
			Err(e) => warn!(brand_id = %brand_id, error = %e, "Tracker session bootstrap failed"),
		}
	}

	async fn ensure_session(
		&self,
		active: &ActiveClient,
		brand_id: BrandId,
		cancel: &CancellationToken,
	) -> Result<()> {
		let device_id = self.ensure_device_id().await?;
		if let Some(session_id) = self.persisted_session_id().await {
			debug!(session_id = %session_id, "Reusing persisted session");
			return Ok(());
		}

		let device = DeviceInfo::new(device_id, &self.inner.host);
		let session_id = tokio::select! {
			_ = cancel.cancelled() => return Err(TrackerError::Cancelled),
			created = active.backend.create_session(brand_id, &device) => {
				created.map_err(|e| TrackerError::SessionCreation(e.to_string()))?
			}
		};
		self.persist_session(active, &session_id, cancel).await?;
		info!(session_id = %session_id, brand_id = %brand_id, "Tracker session created");

		let session_id = self.bind_identified_user(active, session_id, cancel).await?;
		self.spawn_location_update(active, session_id);
		Ok(())
	}

	/// Persists `session_id` unless `cancel` fired. A reset that raced the
	/// write has already forgotten the key, so the write is undone.
	async fn persist_session(
		&self,
		active: &ActiveClient,
		session_id: &SessionId,
		cancel: &CancellationToken,
	) -> Result<()> {
		if cancel.is_cancelled() {
			return Err(TrackerError::Cancelled);
		}
		self.inner
			.store
			.set(
				&self.inner.keys.key(StorageKey::SessionId),
				session_id.as_str(),
				Some(active.config.cookie_expiration_days),
			)
			.await?;
		if cancel.is_cancelled() {
			self.forget(StorageKey::SessionId).await;
			return Err(TrackerError::Cancelled);
		}
		Ok(())
	}

	/// Binds a user identified before this session existed.
	///
	/// On failure the identified user is forgotten so the next `identify`
	/// binds again.
	async fn bind_identified_user(
		&self,
		active: &ActiveClient,
		session_id: SessionId,
		cancel: &CancellationToken,
	) -> Result<SessionId> {
		let Some(user) = self.persisted_user_id().await else {
			return Ok(session_id);
		};

		let bound = tokio::select! {
			_ = cancel.cancelled() => return Err(TrackerError::Cancelled),
			bound = active.backend.identify_by_id(&session_id, &user) => bound,
		};
		match bound {
			Ok(Some(replacement)) if replacement != session_id => {
				self.persist_session(active, &replacement, cancel).await?;
				info!(
					user_id = %user,
					session_id = %replacement,
					"Identified user bound to replacement session"
				);
				Ok(replacement)
			}
			Ok(_) => {
				info!(user_id = %user, session_id = %session_id, "Identified user bound to session");
				Ok(session_id)
			}
			Err(e) => {
				self.log_failure("identify_by_id", &e);
				self.forget(StorageKey::IdentifiedUserId).await;
				Ok(session_id)
			}
		}
	}

	async fn ensure_device_id(&self) -> Result<DeviceId> {
		let key = self.inner.keys.key(StorageKey::DeviceId);
		if let Some(existing) = self.inner.store.get(&key).await?.filter(|v| !v.is_empty()) {
			return Ok(DeviceId::new(existing));
		}

		let device_id = DeviceId::generate();
		self.inner.store.set(&key, device_id.as_str(), None).await?;
		debug!(device_id = %device_id, "Generated device id");
		Ok(device_id)
	}

	fn spawn_location_update(&self, active: &ActiveClient, session_id: SessionId) {
		let location = Arc::clone(&self.inner.location);
		let backend = Arc::clone(&active.backend);
		let tracker = self.clone();
		tokio::spawn(async move {
			let Some(fix) = location.current_location().await else {
				return;
			};
			if let Err(e) = backend.update_session_location(&session_id, fix).await {
				tracker.log_failure("update_session_location", &e);
			}
		});
	}

	/// Cancels in-flight work and clears in-memory state for `reset`.
	///
	/// Returns the active client and a fresh bootstrap token when the tracker
	/// stays ready.
	pub(crate) async fn reset_in_memory(&self) -> Option<(ActiveClient, CancellationToken)> {
		let mut core = self.inner.core.lock().await;

		if let Some(attempt) = core.attempt.take() {
			attempt.cancel.cancel();
			attempt.watchdog.abort();
			attempt.outcome.send_replace(InitializationState::Uninitialized);
			debug!(generation = attempt.generation, "Cancelled pending initialization");
		}
		if let Some(bootstrap) = core.bootstrap.take() {
			bootstrap.cancel();
		}

		let discarded = core.buffer.clear();
		if discarded > 0 {
			debug!(discarded, "Discarded buffered track calls on reset");
		}
		core.current_screen = None;
		core.last_tracked_screen = None;

		if core.state != InitializationState::Ready {
			core.transition(InitializationState::Uninitialized);
			core.active = None;
			return None;
		}

		let active = core.active.clone()?;
		let token = CancellationToken::new();
		core.bootstrap = Some(token.clone());
		Some((active, token))
	}
}
