// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the Loom event tracker SDK.
//!
//! This crate holds everything the tracker needs that does not touch the
//! network or the disk:
//!
//! - Identifiers ([`BrandId`], [`SessionId`], [`DeviceId`], [`UserId`])
//! - [`TrackerConfiguration`] and its layered [`TrackerConfigOverrides`]
//! - [`PendingCall`] and event-name normalisation
//! - [`Attributes`] for event and profile payloads
//! - [`ProfileUpdate`] for splitting profile data into known fields and extras
//! - [`InitializationState`] and its transition table

pub mod attributes;
pub mod config;
pub mod error;
pub mod event;
pub mod ids;
pub mod profile;
pub mod session;
pub mod state;

pub use attributes::Attributes;
pub use config::{TrackerConfigOverrides, TrackerConfiguration};
pub use error::ConfigurationError;
pub use event::{
	build_event_data, normalize_event_name, PendingCall, FLOW_CONTEXT_KEY, VIEW_PAGE_EVENT,
};
pub use ids::{BrandId, DeviceId, SessionId, UserId};
pub use profile::{ProfileUpdate, EMAIL_KEY, RECOGNIZED_PROFILE_FIELDS, USER_ID_KEY};
pub use session::TrackerSession;
pub use state::InitializationState;
