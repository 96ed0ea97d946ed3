//! Deterministic content hashing for attestations.
//!
//! Produces a SHA-256 digest from an attestation's semantic fields:
//! subjects, predicates, contexts, actors, timestamp, and source. Field
//! order is canonicalized (sorted) so two nodes creating the same claim
//! independently get the same hash, regardless of `id`, `attributes`, or
//! `created_at`.

use sha2::{Digest, Sha256};

use crate::attestation::Attestation;

/// A 32-byte content-addressed digest.
pub type ContentHash = [u8; 32];

/// Compute a deterministic SHA-256 content hash from an attestation's
/// identity fields.
///
/// Excluded fields:
/// - `id` — storage identity, not content identity
/// - `attributes` — mutable metadata
/// - `created_at` — local insertion artifact
pub fn content_hash(attestation: &Attestation) -> ContentHash {
    let mut h = Sha256::new();

    // Domain separators prevent field-boundary collisions, e.g.
    // subjects=["a\0b"] colliding with subjects=["a","b"].
    h.update(b"s:");
    h.update(canonical(&attestation.subjects).as_bytes());
    h.update(b"\np:");
    h.update(canonical(&attestation.predicates).as_bytes());
    h.update(b"\nc:");
    h.update(canonical(&attestation.contexts).as_bytes());
    h.update(b"\na:");
    h.update(canonical(&attestation.actors).as_bytes());
    h.update(b"\nt:");
    h.update(attestation.timestamp.to_be_bytes());
    h.update(b"\nrc:");
    h.update(attestation.source.as_bytes());

    h.finalize().into()
}

/// Compute content hash and return as lowercase hex.
pub fn content_hash_hex(attestation: &Attestation) -> String {
    hex_encode(&content_hash(attestation))
}

/// Sort a string slice (without mutating the input) and join with NUL
/// separators for deterministic hashing.
fn canonical(ss: &[String]) -> String {
    let mut sorted: Vec<&str> = ss.iter().map(|s| s.as_str()).collect();
    sorted.sort_unstable();
    sorted.join("\0")
}

const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";

/// Encode bytes as lowercase hex. Inlined to avoid a `hex` crate dependency
/// in this WASM-portable crate.
pub fn hex_encode(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push(HEX_CHARS[(b >> 4) as usize] as char);
        s.push(HEX_CHARS[(b & 0x0f) as usize] as char);
    }
    s
}

/// Decode a hex string into a fixed-size 32-byte digest.
pub fn hex_decode_32(s: &str) -> Option<[u8; 32]> {
    if s.len() != 64 {
        return None;
    }
    let mut out = [0u8; 32];
    for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
        out[i] = (hex_val(chunk[0])? << 4) | hex_val(chunk[1])?;
    }
    Some(out)
}

fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attestation::AttestationBuilder;
    use pretty_assertions::assert_eq;

    fn test_attestation() -> Attestation {
        AttestationBuilder::new()
            .id("as-abc123")
            .subject("user-1")
            .predicate("member")
            .context("team-eng")
            .actor("hr-system")
            .timestamp(1_718_452_800_000_000_000)
            .source("cli")
            .build()
    }

    #[test]
    fn deterministic() {
        let a = test_attestation();
        assert_eq!(content_hash(&a), content_hash(&a));
    }

    #[test]
    fn order_independent_across_all_set_fields() {
        let a = AttestationBuilder::new()
            .subjects(["b", "a"])
            .predicates(["q", "p"])
            .contexts(["y", "x"])
            .actors(["z", "w"])
            .timestamp(1000)
            .source("cli")
            .build();

        let b = AttestationBuilder::new()
            .subjects(["a", "b"])
            .predicates(["p", "q"])
            .contexts(["x", "y"])
            .actors(["w", "z"])
            .timestamp(1000)
            .source("cli")
            .build();

        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn identity_sensitivity() {
        let base = test_attestation();

        let mut diff_subject = base.clone();
        diff_subject.subjects = vec!["user-2".into()];
        assert_ne!(content_hash(&base), content_hash(&diff_subject));

        let mut diff_predicate = base.clone();
        diff_predicate.predicates = vec!["admin".into()];
        assert_ne!(content_hash(&base), content_hash(&diff_predicate));

        let mut diff_context = base.clone();
        diff_context.contexts = vec!["team-sales".into()];
        assert_ne!(content_hash(&base), content_hash(&diff_context));

        let mut diff_actor = base.clone();
        diff_actor.actors = vec!["other-system".into()];
        assert_ne!(content_hash(&base), content_hash(&diff_actor));

        let mut diff_ts = base.clone();
        diff_ts.timestamp = 9999;
        assert_ne!(content_hash(&base), content_hash(&diff_ts));

        let mut diff_source = base.clone();
        diff_source.source = "api".into();
        assert_ne!(content_hash(&base), content_hash(&diff_source));
    }

    #[test]
    fn non_identity_fields_are_ignored() {
        let a = test_attestation();

        let mut diff_id = a.clone();
        diff_id.id = "as-different".into();
        assert_eq!(content_hash(&a), content_hash(&diff_id));

        let mut diff_attrs = a.clone();
        diff_attrs
            .attributes
            .insert("color".into(), serde_json::json!("red"));
        assert_eq!(content_hash(&a), content_hash(&diff_attrs));

        let mut diff_created = a.clone();
        diff_created.created_at = 123;
        assert_eq!(content_hash(&a), content_hash(&diff_created));
    }

    #[test]
    fn canon_does_not_mutate_input() {
        let original = vec!["b".to_string(), "a".to_string()];
        let _ = canonical(&original);
        assert_eq!(original, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn hex_roundtrip() {
        let hash = content_hash(&test_attestation());
        let encoded = hex_encode(&hash);
        assert_eq!(encoded.len(), 64);
        let decoded = hex_decode_32(&encoded).unwrap();
        assert_eq!(hash, decoded);
    }

    #[test]
    fn hex_decode_rejects_bad_length() {
        assert!(hex_decode_32("abcd").is_none());
    }
}
