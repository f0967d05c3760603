// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Bounded FIFO of track calls waiting for the tracker to become deliverable.

use loom_tracker_core::PendingCall;

/// Maximum number of calls held while waiting for initialization or a session.
pub const MAX_PENDING_CALLS: usize = 100;

/// Outcome of [`PendingCallBuffer::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
	/// Queued; carries the new buffer length.
	Queued(usize),
	/// Buffer full; the new call was dropped.
	Full,
}

/// Bounded FIFO of [`PendingCall`]s.
///
/// Unlike the batch queue, overflow drops the *incoming* call: events that
/// have waited longest are kept.
#[derive(Debug)]
pub struct PendingCallBuffer {
	calls: Vec<PendingCall>,
	capacity: usize,
}

impl PendingCallBuffer {
	pub fn new() -> Self {
		Self::with_capacity(MAX_PENDING_CALLS)
	}

	pub fn with_capacity(capacity: usize) -> Self {
		Self {
			calls: Vec::new(),
			capacity,
		}
	}

	pub fn push(&mut self, call: PendingCall) -> Enqueued {
		if self.calls.len() >= self.capacity {
			return Enqueued::Full;
		}
		self.calls.push(call);
		Enqueued::Queued(self.calls.len())
	}

	/// Removes and returns every queued call in FIFO order.
	///
	/// The buffer is empty afterwards, so calls re-queued while the snapshot
	/// is replayed land in a fresh buffer instead of the one being iterated.
	pub fn take_all(&mut self) -> Vec<PendingCall> {
		std::mem::take(&mut self.calls)
	}

	/// Drops every queued call, returning how many were discarded.
	pub fn clear(&mut self) -> usize {
		let discarded = self.calls.len();
		self.calls.clear();
		discarded
	}

	pub fn len(&self) -> usize {
		self.calls.len()
	}

	pub fn is_empty(&self) -> bool {
		self.calls.is_empty()
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}
}

impl Default for PendingCallBuffer {
	fn default() -> Self {
		Self::new()
	}
}
