// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CloudEvents 1.0 structured encoding for the wire envelope.
//!
//! Grounded on `cloudevents-sdk`, the crate `examples/other_examples/manifests/openobserve-openobserve/Cargo.toml`
//! uses for the same purpose. `sequence_id`, `channel` and `owner` ride as
//! CloudEvents extension attributes alongside the standard envelope, since
//! none of the core CloudEvents attributes carry them.

use cloudevents::event::Data;
use cloudevents::{Event, EventBuilder, EventBuilderV10};
use kernelci_core::delivery::EventEnvelope;
use kernelci_core::event_log::EventRecord;

use crate::error::ApiError;

const SOURCE: &str = "urn:kernelci:api";
const EVENT_TYPE: &str = "dev.kernelci.node";

pub fn envelope_to_cloudevent(envelope: &EventEnvelope) -> Result<Event, ApiError> {
    EventBuilderV10::new()
        .id(envelope.sequence_id.to_string())
        .source(SOURCE)
        .ty(EVENT_TYPE)
        .time(envelope.timestamp)
        .extension("sequenceid", envelope.sequence_id.to_string())
        .extension("channel", envelope.channel.clone())
        .extension("owner", envelope.owner.clone())
        .data("application/json", envelope.payload.clone())
        .build()
        .map_err(|e| ApiError::BadRequest(format!("failed to build cloudevent: {e}")))
}

/// Decode an inbound CloudEvent into the `(owner, payload)` pair the publish
/// handler appends to the event log. The caller supplies `channel`
/// explicitly (it comes from the route path, not the envelope) and `owner`
/// falls back to the authenticated principal when the event carries none.
pub fn cloudevent_to_payload(event: &Event, default_owner: &str) -> Result<(String, serde_json::Value), ApiError> {
    let owner = event
        .extension("owner")
        .map(|v| v.to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default_owner.to_owned());

    let payload = match event.data() {
        Some(Data::Json(v)) => v.clone(),
        Some(Data::String(s)) => serde_json::from_str(s).unwrap_or(serde_json::Value::String(s.clone())),
        Some(Data::Binary(b)) => {
            serde_json::from_slice(b).map_err(|e| ApiError::BadRequest(format!("invalid event data: {e}")))?
        }
        None => serde_json::Value::Null,
    };
    Ok((owner, payload))
}

pub fn record_to_cloudevent(record: &EventRecord) -> Result<Event, ApiError> {
    envelope_to_cloudevent(&EventEnvelope {
        sequence_id: record.sequence_id,
        channel: record.channel.clone(),
        owner: record.owner.clone(),
        timestamp: record.timestamp,
        payload: record.payload.clone(),
    })
}
