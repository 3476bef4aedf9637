// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod credentials;
pub mod distance;
pub mod event;

pub use credentials::AthleteCredentials;
pub use distance::DistanceRecord;
pub use event::{ActivityEvent, AspectType, EventError, ObjectType};
