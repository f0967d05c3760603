// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared fixtures for tracker integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use loom_tracker::{
	Attributes, BackendClient, BackendFactory, BrandId, DeviceInfo, InitializationState,
	KeyValueStore, Location, MemoryStore, MetadataRequest, ProfileRequest, SessionId,
	SharedBackend, StorageKey, StorageKeys, StoreError, Tracker, TrackerBuilder,
	TrackerConfiguration, TrackerError, UserId,
};
use serde_json::Value;
use tokio::sync::Semaphore;

/// A backend call as observed by [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
	CreateSession {
		brand_id: u64,
	},
	SendEvent {
		brand_id: u64,
		session_id: String,
		event_name: String,
		data: Option<Value>,
	},
	UpdateProfile {
		brand_id: u64,
		request: ProfileRequest,
	},
	SetMetadata {
		brand_id: u64,
		request: MetadataRequest,
	},
	Identify {
		session_id: String,
		user_id: String,
	},
	Location(Location),
}

/// Scripted answer to a create-session call.
#[derive(Debug, Clone, Copy)]
pub enum SessionReply {
	Created(&'static str),
	Fail,
	Hang,
}

/// Scripted answer to an identify call.
#[derive(Debug, Clone, Copy)]
pub enum IdentifyReply {
	Keep,
	Replace(&'static str),
	Fail,
}

/// Backend stub that records every call and answers from a script.
///
/// Create-session calls beyond the script fail.
#[derive(Default)]
pub struct RecordingBackend {
	calls: Mutex<Vec<Call>>,
	sessions: Mutex<VecDeque<SessionReply>>,
	identify: Mutex<Option<IdentifyReply>>,
}

impl RecordingBackend {
	pub fn with_sessions(replies: impl IntoIterator<Item = SessionReply>) -> Self {
		Self {
			sessions: Mutex::new(replies.into_iter().collect()),
			..Self::default()
		}
	}

	pub fn script_identify(&self, reply: IdentifyReply) {
		*self.identify.lock().unwrap() = Some(reply);
	}

	pub fn calls(&self) -> Vec<Call> {
		self.calls.lock().unwrap().clone()
	}

	/// `(event_name, session_id, data)` of every sent event, in order.
	pub fn events(&self) -> Vec<(String, String, Option<Value>)> {
		self.calls()
			.into_iter()
			.filter_map(|call| match call {
				Call::SendEvent {
					session_id,
					event_name,
					data,
					..
				} => Some((event_name, session_id, data)),
				_ => None,
			})
			.collect()
	}

	pub fn event_names(&self) -> Vec<String> {
		self.events().into_iter().map(|(name, _, _)| name).collect()
	}

	pub fn session_creations(&self) -> usize {
		self.calls()
			.iter()
			.filter(|c| matches!(c, Call::CreateSession { .. }))
			.count()
	}

	fn record(&self, call: Call) {
		self.calls.lock().unwrap().push(call);
	}

	fn unavailable() -> TrackerError {
		TrackerError::ServerError {
			status: 503,
			message: "unavailable".to_string(),
		}
	}
}

#[async_trait]
impl BackendClient for RecordingBackend {
	async fn create_session(
		&self,
		brand_id: BrandId,
		_device: &DeviceInfo,
	) -> loom_tracker::Result<SessionId> {
		self.record(Call::CreateSession {
			brand_id: brand_id.as_u64(),
		});
		let reply = self
			.sessions
			.lock()
			.unwrap()
			.pop_front()
			.unwrap_or(SessionReply::Fail);
		match reply {
			SessionReply::Created(id) => Ok(SessionId::new(id)),
			SessionReply::Fail => Err(Self::unavailable()),
			SessionReply::Hang => std::future::pending().await,
		}
	}

	async fn send_event(
		&self,
		brand_id: BrandId,
		session_id: &SessionId,
		event_name: &str,
		data: Option<&Attributes>,
	) -> loom_tracker::Result<()> {
		self.record(Call::SendEvent {
			brand_id: brand_id.as_u64(),
			session_id: session_id.to_string(),
			event_name: event_name.to_string(),
			data: data.map(|d| d.clone().into_value()),
		});
		Ok(())
	}

	async fn update_profile(
		&self,
		request: &ProfileRequest,
		brand_id: BrandId,
	) -> loom_tracker::Result<()> {
		self.record(Call::UpdateProfile {
			brand_id: brand_id.as_u64(),
			request: request.clone(),
		});
		Ok(())
	}

	async fn set_metadata(
		&self,
		request: &MetadataRequest,
		brand_id: BrandId,
	) -> loom_tracker::Result<()> {
		self.record(Call::SetMetadata {
			brand_id: brand_id.as_u64(),
			request: request.clone(),
		});
		Ok(())
	}

	async fn identify_by_id(
		&self,
		session_id: &SessionId,
		user_id: &UserId,
	) -> loom_tracker::Result<Option<SessionId>> {
		self.record(Call::Identify {
			session_id: session_id.to_string(),
			user_id: user_id.to_string(),
		});
		let reply = (*self.identify.lock().unwrap()).unwrap_or(IdentifyReply::Keep);
		match reply {
			IdentifyReply::Keep => Ok(None),
			IdentifyReply::Replace(id) => Ok(Some(SessionId::new(id))),
			IdentifyReply::Fail => Err(Self::unavailable()),
		}
	}

	async fn update_session_location(
		&self,
		_session_id: &SessionId,
		location: Location,
	) -> loom_tracker::Result<()> {
		self.record(Call::Location(location));
		Ok(())
	}
}

/// Factory handing out the same [`RecordingBackend`] and counting connects.
#[derive(Clone)]
pub struct StubFactory {
	pub backend: Arc<RecordingBackend>,
	pub connects: Arc<AtomicUsize>,
}

impl BackendFactory for StubFactory {
	fn connect(
		&self,
		_config: &TrackerConfiguration,
		_brand_id: BrandId,
	) -> loom_tracker::Result<SharedBackend> {
		self.connects.fetch_add(1, Ordering::SeqCst);
		Ok(self.backend.clone())
	}
}

/// Store whose writes block until its [`Gate`] opens.
///
/// Counts reads per key so tests can tell when the tracker has gone quiet.
pub struct GatedStore {
	inner: MemoryStore,
	gate: Arc<Semaphore>,
	gated_key: Option<String>,
	reads: Mutex<HashMap<String, usize>>,
}

pub struct Gate(Arc<Semaphore>);

impl Gate {
	pub fn open(&self) {
		self.0.add_permits(1_000_000);
	}
}

impl GatedStore {
	/// Gates every write.
	pub fn closed() -> (Self, Gate) {
		Self::gating(None)
	}

	/// Gates only writes to `key`.
	pub fn closed_for(key: StorageKey) -> (Self, Gate) {
		Self::gating(Some(StorageKeys::default().key(key)))
	}

	fn gating(gated_key: Option<String>) -> (Self, Gate) {
		let gate = Arc::new(Semaphore::new(0));
		(
			Self {
				inner: MemoryStore::new(),
				gate: gate.clone(),
				gated_key,
				reads: Mutex::new(HashMap::new()),
			},
			Gate(gate),
		)
	}

	pub fn reads_of(&self, key: StorageKey) -> usize {
		let key = StorageKeys::default().key(key);
		self.reads.lock().unwrap().get(&key).copied().unwrap_or(0)
	}
}

#[async_trait]
impl KeyValueStore for GatedStore {
	async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
		*self.reads.lock().unwrap().entry(key.to_string()).or_default() += 1;
		self.inner.get(key).await
	}

	async fn set(
		&self,
		key: &str,
		value: &str,
		expires_in_days: Option<u32>,
	) -> Result<(), StoreError> {
		if self.gated_key.as_deref().map_or(true, |gated| gated == key) {
			let _permit = self
				.gate
				.acquire()
				.await
				.map_err(|_| StoreError::Io(std::io::Error::other("gate closed")))?;
		}
		self.inner.set(key, value, expires_in_days).await
	}

	async fn remove(&self, key: &str) -> Result<(), StoreError> {
		self.inner.remove(key).await
	}

	async fn clear_all(&self, prefix: &str) -> Result<(), StoreError> {
		self.inner.clear_all(prefix).await
	}
}

pub struct Harness {
	pub tracker: Tracker,
	pub backend: Arc<RecordingBackend>,
	pub connects: Arc<AtomicUsize>,
	pub store: Arc<dyn KeyValueStore>,
}

impl Harness {
	pub fn new(backend: RecordingBackend) -> Self {
		Self::with_store(backend, Arc::new(MemoryStore::new()))
	}

	pub fn with_store(backend: RecordingBackend, store: Arc<dyn KeyValueStore>) -> Self {
		Self::with_builder(backend, store, Tracker::builder())
	}

	pub fn with_builder(
		backend: RecordingBackend,
		store: Arc<dyn KeyValueStore>,
		builder: TrackerBuilder,
	) -> Self {
		let factory = StubFactory {
			backend: Arc::new(backend),
			connects: Arc::new(AtomicUsize::new(0)),
		};
		let tracker = builder
			.shared_store(store.clone())
			.backend_factory(factory.clone())
			.build();

		Self {
			tracker,
			backend: factory.backend,
			connects: factory.connects,
			store,
		}
	}

	pub fn connects(&self) -> usize {
		self.connects.load(Ordering::SeqCst)
	}

	/// Initializes for brand 925 and waits until a session is persisted.
	pub async fn ready_with_session(&self) {
		assert_eq!(
			self.tracker.initialize("925", None).await,
			InitializationState::Ready
		);
		let tracker = &self.tracker;
		eventually(|| async move { tracker.session().await.session_id.is_some() }).await;
	}

	/// Waits until the tracker reports `Pending`.
	pub async fn wait_for_pending(&self) {
		let tracker = &self.tracker;
		eventually(|| async move { tracker.state().await == InitializationState::Pending }).await;
	}
}

/// Polls `check` until it holds, panicking after a generous deadline.
pub async fn eventually<F, Fut>(mut check: F)
where
	F: FnMut() -> Fut,
	Fut: Future<Output = bool>,
{
	for _ in 0..500 {
		if check().await {
			return;
		}
		tokio::time::sleep(Duration::from_millis(10)).await;
	}
	panic!("condition not met in time");
}
