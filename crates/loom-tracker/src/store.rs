// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Local key-value persistence for tracker identity.
//!
//! The tracker keeps its device id, session id, identified user and brand in
//! a [`KeyValueStore`]. Hosts can plug in their own storage bridge; the SDK
//! ships an in-memory store and a JSON file store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::error::StoreError;

/// Default prefix for tracker keys.
pub const DEFAULT_KEY_PREFIX: &str = "loom_tracker_";

/// Namespaced persistence used by the tracker.
///
/// Implementations must make individual `set`/`remove` calls atomic per key;
/// the tracker reads and writes from concurrent tasks.
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
	/// Returns the value under `key`, or `None` if absent or expired.
	async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

	/// Stores `value` under `key`, optionally expiring after
	/// `expires_in_days`.
	async fn set(
		&self,
		key: &str,
		value: &str,
		expires_in_days: Option<u32>,
	) -> Result<(), StoreError>;

	async fn remove(&self, key: &str) -> Result<(), StoreError>;

	/// Removes every entry whose key starts with `prefix`.
	async fn clear_all(&self, prefix: &str) -> Result<(), StoreError>;
}

/// Logical keys the tracker persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	DeviceId,
	SessionId,
	SessionEmail,
	IdentifiedUserId,
	BrandId,
}

impl StorageKey {
	pub fn name(self) -> &'static str {
		match self {
			StorageKey::DeviceId => "device_id",
			StorageKey::SessionId => "session_id",
			StorageKey::SessionEmail => "session_email",
			StorageKey::IdentifiedUserId => "identify_id",
			StorageKey::BrandId => "brand_id",
		}
	}
}

/// Maps [`StorageKey`]s to namespaced store keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
	prefix: String,
}

impl StorageKeys {
	pub fn new(prefix: impl Into<String>) -> Self {
		Self {
			prefix: prefix.into(),
		}
	}

	pub fn prefix(&self) -> &str {
		&self.prefix
	}

	pub fn key(&self, key: StorageKey) -> String {
		format!("{}{}", self.prefix, key.name())
	}
}

impl Default for StorageKeys {
	fn default() -> Self {
		Self::new(DEFAULT_KEY_PREFIX)
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
	value: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	expires_at: Option<DateTime<Utc>>,
}

impl StoredEntry {
	/// An expiry past the representable range is stored as no expiry.
	fn new(value: &str, expires_in_days: Option<u32>) -> Self {
		let expires_at = expires_in_days.and_then(|days| {
			Duration::try_days(i64::from(days)).and_then(|ttl| Utc::now().checked_add_signed(ttl))
		});
		Self {
			value: value.to_string(),
			expires_at,
		}
	}

	fn is_expired(&self, now: DateTime<Utc>) -> bool {
		self.expires_at.is_some_and(|at| at <= now)
	}
}

/// In-memory store. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
	entries: RwLock<HashMap<String, StoredEntry>>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the number of live entries.
	pub async fn len(&self) -> usize {
		let now = Utc::now();
		self.entries
			.read()
			.await
			.values()
			.filter(|e| !e.is_expired(now))
			.count()
	}

	pub async fn is_empty(&self) -> bool {
		self.len().await == 0
	}
}

#[async_trait]
impl KeyValueStore for MemoryStore {
	async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
		let entries = self.entries.read().await;
		Ok(entries
			.get(key)
			.filter(|e| !e.is_expired(Utc::now()))
			.map(|e| e.value.clone()))
	}

	async fn set(
		&self,
		key: &str,
		value: &str,
		expires_in_days: Option<u32>,
	) -> Result<(), StoreError> {
		self.entries
			.write()
			.await
			.insert(key.to_string(), StoredEntry::new(value, expires_in_days));
		Ok(())
	}

	async fn remove(&self, key: &str) -> Result<(), StoreError> {
		self.entries.write().await.remove(key);
		Ok(())
	}

	async fn clear_all(&self, prefix: &str) -> Result<(), StoreError> {
		self.entries
			.write()
			.await
			.retain(|key, _| !key.starts_with(prefix));
		Ok(())
	}
}

/// Store backed by a single JSON file.
///
/// Every write rewrites the file through a temporary sibling and a rename.
/// Writers are serialised within the process.
#[derive(Debug)]
pub struct FileStore {
	path: PathBuf,
	lock: Mutex<()>,
}

impl FileStore {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			lock: Mutex::new(()),
		}
	}

	/// Store at `<data dir>/loom/tracker.json`, falling back to the current
	/// directory when the platform has no data dir.
	pub fn default_location() -> Self {
		let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
		Self::new(base.join("loom").join("tracker.json"))
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	async fn load(&self) -> Result<HashMap<String, StoredEntry>, StoreError> {
		match tokio::fs::read(&self.path).await {
			Ok(bytes) if bytes.is_empty() => Ok(HashMap::new()),
			Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
			Err(e) => Err(e.into()),
		}
	}

	async fn save(&self, entries: &HashMap<String, StoredEntry>) -> Result<(), StoreError> {
		if let Some(parent) = self.path.parent() {
			tokio::fs::create_dir_all(parent).await?;
		}
		let tmp = self.path.with_extension("json.tmp");
		tokio::fs::write(&tmp, serde_json::to_vec_pretty(entries)?).await?;
		tokio::fs::rename(&tmp, &self.path).await?;
		Ok(())
	}
}

#[async_trait]
impl KeyValueStore for FileStore {
	async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
		let _guard = self.lock.lock().await;
		let entries = self.load().await?;
		Ok(entries
			.get(key)
			.filter(|e| !e.is_expired(Utc::now()))
			.map(|e| e.value.clone()))
	}

	async fn set(
		&self,
		key: &str,
		value: &str,
		expires_in_days: Option<u32>,
	) -> Result<(), StoreError> {
		let _guard = self.lock.lock().await;
		let mut entries = self.load().await?;
		let now = Utc::now();
		entries.retain(|_, e| !e.is_expired(now));
		entries.insert(key.to_string(), StoredEntry::new(value, expires_in_days));
		self.save(&entries).await
	}

	async fn remove(&self, key: &str) -> Result<(), StoreError> {
		let _guard = self.lock.lock().await;
		let mut entries = self.load().await?;
		if entries.remove(key).is_some() {
			self.save(&entries).await?;
		}
		Ok(())
	}

	async fn clear_all(&self, prefix: &str) -> Result<(), StoreError> {
		let _guard = self.lock.lock().await;
		let mut entries = self.load().await?;
		let before = entries.len();
		entries.retain(|key, _| !key.starts_with(prefix));
		if entries.len() != before {
			debug!(
				path = %self.path.display(),
				removed = before - entries.len(),
				"Cleared tracker store entries"
			);
			self.save(&entries).await?;
		}
		Ok(())
	}
}
