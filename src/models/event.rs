// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Strava webhook event model.

use serde_json::Value;

/// Kind of object a webhook event refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectType {
    Activity,
    Athlete,
    Other(String),
}

impl From<&str> for ObjectType {
    fn from(s: &str) -> Self {
        match s {
            "activity" => Self::Activity,
            "athlete" => Self::Athlete,
            other => Self::Other(other.to_string()),
        }
    }
}

/// What happened to the object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AspectType {
    Create,
    Update,
    Delete,
    Other(String),
}

impl From<&str> for AspectType {
    fn from(s: &str) -> Self {
        match s {
            "create" => Self::Create,
            "update" => Self::Update,
            "delete" => Self::Delete,
            other => Self::Other(other.to_string()),
        }
    }
}

/// A parsed webhook event. Lives only for the duration of one delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityEvent {
    pub object_type: ObjectType,
    pub aspect_type: AspectType,
    /// Activity ID for activity events
    pub object_id: u64,
    /// Athlete ID
    pub owner_id: u64,
    pub subscription_id: Option<u64>,
}

/// Reasons a payload is not a usable event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventError {
    #[error("Missing or invalid field: {0}")]
    Malformed(&'static str),
}

impl ActivityEvent {
    /// Parse an arbitrary JSON payload without trusting its shape.
    pub fn from_payload(payload: &Value) -> Result<Self, EventError> {
        let object_type = payload
            .get("object_type")
            .and_then(Value::as_str)
            .ok_or(EventError::Malformed("object_type"))?;
        let aspect_type = payload
            .get("aspect_type")
            .and_then(Value::as_str)
            .ok_or(EventError::Malformed("aspect_type"))?;
        let object_id =
            id_field(payload, "object_id").ok_or(EventError::Malformed("object_id"))?;
        let owner_id = id_field(payload, "owner_id").ok_or(EventError::Malformed("owner_id"))?;

        Ok(Self {
            object_type: object_type.into(),
            aspect_type: aspect_type.into(),
            object_id,
            owner_id,
            subscription_id: id_field(payload, "subscription_id"),
        })
    }

    /// True for the only event class this service acts on.
    pub fn is_activity_create(&self) -> bool {
        self.object_type == ObjectType::Activity && self.aspect_type == AspectType::Create
    }
}

/// Read an ID that may arrive as a JSON number or a numeric string.
fn id_field(payload: &Value, name: &str) -> Option<u64> {
    match payload.get(name)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
