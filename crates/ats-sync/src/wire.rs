//! The wire protocol's message envelope and the attestation DTO carried in
//! `attestations` messages.

use std::collections::BTreeMap;

use ats_core::Attestation;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::error::ProtocolError;

/// One message on the wire. Internally tagged on `"type"`, so unknown
/// extra fields on a payload are ignored by serde's default behavior and
/// new tags can be added without breaking old readers (they fail to
/// deserialize only if asked to match a specific variant).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Envelope {
    #[serde(rename = "hello")]
    Hello { root_hash: String },

    #[serde(rename = "group_hashes")]
    GroupHashes {
        groups: BTreeMap<String, String>,
    },

    #[serde(rename = "need")]
    Need { groups: Vec<String> },

    #[serde(rename = "attestations")]
    Attestations {
        attestations: BTreeMap<String, Vec<AttestationWire>>,
    },

    #[serde(rename = "done")]
    Done { sent: u64, received: u64 },
}

impl Envelope {
    pub fn tag(&self) -> &'static str {
        match self {
            Envelope::Hello { .. } => "hello",
            Envelope::GroupHashes { .. } => "group_hashes",
            Envelope::Need { .. } => "need",
            Envelope::Attestations { .. } => "attestations",
            Envelope::Done { .. } => "done",
        }
    }
}

/// The over-the-wire attestation shape: same identity fields as
/// `ats_core::Attestation`, but `timestamp` is an RFC 3339 string
/// (nanosecond precision) rather than a raw `i64`, matching spec's native
/// same-language-peer encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestationWire {
    pub id: String,
    pub subjects: Vec<String>,
    pub predicates: Vec<String>,
    pub contexts: Vec<String>,
    pub actors: Vec<String>,
    pub timestamp: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, Value>,
}

impl AttestationWire {
    pub fn from_attestation(a: &Attestation) -> Self {
        Self {
            id: a.id.clone(),
            subjects: a.subjects.clone(),
            predicates: a.predicates.clone(),
            contexts: a.contexts.clone(),
            actors: a.actors.clone(),
            timestamp: nanos_to_rfc3339(a.timestamp),
            source: a.source.clone(),
            attributes: a.attributes.clone(),
        }
    }

    /// Convert back into an `Attestation`. `created_at` is not carried on
    /// the wire — it's set to the local receipt time by the caller.
    pub fn into_attestation(self, created_at: i64) -> Result<Attestation, ProtocolError> {
        let timestamp = rfc3339_to_nanos(&self.timestamp)?;
        Ok(Attestation {
            id: self.id,
            subjects: self.subjects,
            predicates: self.predicates,
            contexts: self.contexts,
            actors: self.actors,
            timestamp,
            source: self.source,
            attributes: self.attributes,
            created_at,
        })
    }
}

/// Lossy conversion for peers whose content hasher expects integer
/// milliseconds. Switching a running peer between encodings mid-session
/// breaks convergence — see spec's timestamp-encoding note.
pub fn to_wire_millis(timestamp_ns: i64) -> i64 {
    timestamp_ns.div_euclid(1_000_000)
}

pub fn from_wire_millis(timestamp_ms: i64) -> i64 {
    timestamp_ms * 1_000_000
}

fn nanos_to_rfc3339(timestamp_ns: i64) -> String {
    let secs = timestamp_ns.div_euclid(1_000_000_000);
    let nanos = timestamp_ns.rem_euclid(1_000_000_000) as u32;
    DateTime::<Utc>::from_timestamp(secs, nanos)
        .unwrap_or_else(|| DateTime::<Utc>::from_timestamp(0, 0).unwrap())
        .to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn rfc3339_to_nanos(s: &str) -> Result<i64, ProtocolError> {
    let dt = DateTime::parse_from_rfc3339(s)
        .map_err(|e| ProtocolError::Malformed(format!("invalid timestamp {s}: {e}")))?;
    dt.timestamp_nanos_opt()
        .ok_or_else(|| ProtocolError::Malformed(format!("timestamp out of range: {s}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ats_core::AttestationBuilder;
    use pretty_assertions::assert_eq;

    #[test]
    fn envelope_tag_roundtrips_through_json() {
        let msg = Envelope::Hello {
            root_hash: "ab".repeat(32),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"hello""#));

        let back: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back.tag(), "hello");
    }

    #[test]
    fn attestation_wire_roundtrips_timestamp() {
        let a = AttestationBuilder::new()
            .id("as-1")
            .subject("s")
            .actor("a")
            .context("c")
            .source("cli")
            .timestamp(1_718_452_800_123_456_789)
            .build();

        let wire = AttestationWire::from_attestation(&a);
        let back = wire.into_attestation(0).unwrap();
        assert_eq!(back.timestamp, a.timestamp);
        assert_eq!(back.id, a.id);
    }

    #[test]
    fn millis_conversion_is_lossy_but_monotonic() {
        let ns = 1_718_452_800_123_456_789;
        let ms = to_wire_millis(ns);
        assert_eq!(ms, 1_718_452_800_123);
        assert_eq!(from_wire_millis(ms), 1_718_452_800_123_000_000);
    }

    #[test]
    fn malformed_timestamp_is_a_protocol_error() {
        let wire = AttestationWire {
            id: "as-1".into(),
            subjects: vec!["s".into()],
            predicates: vec![],
            contexts: vec!["c".into()],
            actors: vec!["a".into()],
            timestamp: "not-a-timestamp".into(),
            source: "cli".into(),
            attributes: HashMap::new(),
        };
        assert!(wire.into_attestation(0).is_err());
    }

    #[test]
    fn done_message_roundtrips() {
        let msg = Envelope::Done {
            sent: 3,
            received: 5,
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: Envelope = serde_json::from_str(&json).unwrap();
        match back {
            Envelope::Done { sent, received } => {
                assert_eq!(sent, 3);
                assert_eq!(received, 5);
            }
            other => panic!("expected Done, got {other:?}"),
        }
    }
}
