// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Caller-supplied chat context.
//!
//! The context is an opaque mapping passed through to the prompt. The only
//! fields the gateway derives are numeric coordinates from a `"lat,lng"`
//! location string.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::mcp::InputSchema;

/// Context key holding the caller's last known location.
pub const LOCATION_KEY: &str = "location";

/// Free-form context for a conversation turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatContext(Map<String, Value>);

impl ChatContext {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Context from an arbitrary JSON value; non-objects give an empty context.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self(fields),
            _ => Self::default(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Coordinates parsed from the `location` string.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.get(LOCATION_KEY)
            .and_then(Value::as_str)
            .and_then(parse_lat_lng)
    }

    /// Add `latitude`/`longitude` fields derived from the location.
    pub fn with_derived_coordinates(mut self) -> Self {
        if let Some((lat, lng)) = self.coordinates() {
            self.0.insert("latitude".to_string(), Value::from(lat));
            self.0.insert("longitude".to_string(), Value::from(lng));
        }
        self
    }

    /// Fill coordinates into tool arguments unless the model supplied numeric ones.
    ///
    /// Only tools that take coordinates are touched: a known schema must declare
    /// `latitude` or `longitude`; without a schema the model must already have
    /// passed one of the two keys.
    pub fn merge_coordinates(&self, args: &mut Map<String, Value>, schema: Option<&InputSchema>) {
        let wants_coordinates = match schema {
            Some(schema) => schema.declares("latitude") || schema.declares("longitude"),
            None => args.contains_key("latitude") || args.contains_key("longitude"),
        };
        if !wants_coordinates {
            return;
        }

        let has_numeric = |key: &str| args.get(key).is_some_and(Value::is_number);
        if has_numeric("latitude") && has_numeric("longitude") {
            return;
        }
        if let Some((lat, lng)) = self.coordinates() {
            args.insert("latitude".to_string(), Value::from(lat));
            args.insert("longitude".to_string(), Value::from(lng));
        }
    }
}

/// Parse `"lat,lng"` into a coordinate pair within valid ranges.
pub fn parse_lat_lng(text: &str) -> Option<(f64, f64)> {
    let (lat, lng) = text.split_once(',')?;
    let lat: f64 = lat.trim().parse().ok()?;
    let lng: f64 = lng.trim().parse().ok()?;

    let valid = lat.is_finite()
        && lng.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lng);
    valid.then_some((lat, lng))
}
