//! GA4GH digest primitives.
//!
//! `sha512t24u` is the truncated digest underlying both refget sequence
//! accessions and VRS object identifiers: SHA-512, truncated to 24 bytes,
//! base64url-encoded without padding (32 output characters).
//! `canonicalize_json` produces the canonical serialization digests are
//! computed over: object keys sorted, no insignificant whitespace.

use serde_json::Value;
use sha2::{Digest, Sha512};

/// SHA-512 truncated to 24 bytes, base64url-encoded without padding.
pub fn sha512t24u(data: &[u8]) -> String {
    let mut hasher = Sha512::new();
    hasher.update(data);
    let hash = hasher.finalize();
    base64_url::encode(&hash[..24])
}

/// Compute the refget accession (`SQ.<digest>`) for a sequence.
///
/// Sequence bytes are uppercased before hashing, per the refget standard.
pub fn sequence_accession(sequence: &[u8]) -> String {
    let upper = sequence.to_ascii_uppercase();
    format!("SQ.{}", sha512t24u(&upper))
}

/// Serialize a JSON value canonically: keys sorted, compact separators.
pub fn canonicalize_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_json_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_json_string(key, out);
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
    }
}

fn write_json_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sha512t24u_length_and_alphabet() {
        let d = sha512t24u(b"ACGT");
        assert_eq!(d.len(), 32);
        assert!(d
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert!(!d.contains('='));
    }

    #[test]
    fn test_sequence_accession_case_insensitive() {
        assert_eq!(sequence_accession(b"acgt"), sequence_accession(b"ACGT"));
        assert!(sequence_accession(b"ACGT").starts_with("SQ."));
    }

    #[test]
    fn test_canonicalize_sorts_keys() {
        let v = json!({"start": 10, "end": 20, "type": "SequenceLocation"});
        assert_eq!(
            canonicalize_json(&v),
            r#"{"end":20,"start":10,"type":"SequenceLocation"}"#
        );
    }

    #[test]
    fn test_canonicalize_nested() {
        let v = json!({"b": {"z": 1, "a": [1, 2]}, "a": "x"});
        assert_eq!(canonicalize_json(&v), r#"{"a":"x","b":{"a":[1,2],"z":1}}"#);
    }

    #[test]
    fn test_canonicalize_escapes() {
        let v = json!({"k": "a\"b\\c\nd"});
        assert_eq!(canonicalize_json(&v), r#"{"k":"a\"b\\c\nd"}"#);
    }
}
