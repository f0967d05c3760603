// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Snapshot of the persisted tracker identity.

use serde::{Deserialize, Serialize};

use crate::ids::{BrandId, DeviceId, SessionId, UserId};

/// Identity the tracker has persisted for this device.
///
/// `device_id` survives restarts until `reset`. `session_id` appears after
/// the first successful bootstrap. `identified_user_id` is set by
/// `identify`/`set`. Both are cleared on `reset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerSession {
	pub session_id: Option<SessionId>,
	pub device_id: Option<DeviceId>,
	pub brand_id: Option<BrandId>,
	pub identified_user_id: Option<UserId>,
}
