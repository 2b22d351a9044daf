//! Canonical CBOR encoding for deterministic content ids.
//!
//! This module implements RFC 8949 Core Deterministic Encoding for POD
//! entries:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - No floats
//!
//! Each entry is encoded as `name => [type_tag, value]`. The canonical
//! encoding is what makes the content id stable: the same entries produce
//! identical bytes (and thus identical ids) on every platform.

use ciborium::value::Value;

use crate::pod::{PodEntries, PodValue};
use crate::types::ContentId;

/// Domain separator mixed into every content id.
pub const ID_DOMAIN: &[u8] = b"tensions.pod.v1";

/// Type tags for entry values.
///
/// Tags 0-23 encode as single bytes in CBOR.
mod tags {
    pub const STRING: u64 = 0;
    pub const INT: u64 = 1;
    pub const CRYPTOGRAPHIC: u64 = 2;
}

/// Encode POD entries to canonical CBOR bytes.
pub fn canonical_entries_bytes(entries: &PodEntries) -> Vec<u8> {
    let value = entries_to_cbor_value(entries);
    let mut buf = Vec::new();
    encode_value_to(&mut buf, &value);
    buf
}

/// Compute the content id of a set of entries.
pub fn content_id(entries: &PodEntries) -> ContentId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(ID_DOMAIN);
    hasher.update(&canonical_entries_bytes(entries));
    ContentId(*hasher.finalize().as_bytes())
}

fn entries_to_cbor_value(entries: &PodEntries) -> Value {
    let pairs = entries
        .iter()
        .map(|(name, value)| {
            let tagged = match value {
                PodValue::String(s) => vec![
                    Value::Integer(tags::STRING.into()),
                    Value::Text(s.clone()),
                ],
                PodValue::Int(n) => vec![
                    Value::Integer(tags::INT.into()),
                    Value::Integer((*n).into()),
                ],
                PodValue::Cryptographic(c) => vec![
                    Value::Integer(tags::CRYPTOGRAPHIC.into()),
                    Value::Bytes(c.0.to_vec()),
                ],
            };
            (Value::Text(name.to_string()), Value::Array(tagged))
        })
        .collect();

    Value::Map(pairs)
}

/// Recursively encode a CBOR value.
///
/// Only the value shapes produced by `entries_to_cbor_value` are reachable.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => encode_bytes(buf, b),
        Value::Text(s) => encode_text(buf, s),
        Value::Array(arr) => encode_array(buf, arr),
        Value::Map(entries) => encode_map_canonical(buf, entries),
        _ => unreachable!("unsupported CBOR value type in canonical encoding"),
    }
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, i: ciborium::value::Integer) {
    let n: i128 = i.into();

    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        let abs = (-1 - n) as u64;
        encode_uint(buf, 1, abs);
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffffffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

fn encode_array(buf: &mut Vec<u8>, arr: &[Value]) {
    encode_uint(buf, 4, arr.len() as u64);
    for item in arr {
        encode_value_to(buf, item);
    }
}

/// Encode a map canonically (major type 5).
///
/// Keys are sorted by their encoded byte comparison.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) {
    let mut key_value_pairs: Vec<(Vec<u8>, &Value)> = entries
        .iter()
        .map(|(k, v)| {
            let mut key_buf = Vec::new();
            encode_value_to(&mut key_buf, k);
            (key_buf, v)
        })
        .collect();

    key_value_pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, key_value_pairs.len() as u64);

    for (key_bytes, value) in key_value_pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value);
    }
}
