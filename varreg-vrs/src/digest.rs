//! VRS digest computation.
//!
//! Identifiers are content-derived: canonical JSON of the object's
//! digest-relevant attributes, hashed with SHA-512/24u. Nested identifiable
//! objects contribute their digest string, not their full JSON, so an
//! Allele digest commits to its location digest.
//!
//! Two paths produce identical results: the generic path goes through
//! serde_json and is the correctness reference; [`DigestWriter`] writes
//! canonical bytes straight into a reusable buffer for the VCF hot loop.

use serde_json::json;

use varreg_refget::digest::{canonicalize_json, sha512t24u};

use crate::models::{Allele, SequenceLocation};

/// Compute the digest of a SequenceLocation.
pub fn location_digest(location: &SequenceLocation) -> String {
    let value = json!({
        "end": location.end,
        "sequenceReference": {
            "refgetAccession": location.sequence_reference.refget_accession,
            "type": "SequenceReference"
        },
        "start": location.start,
        "type": "SequenceLocation"
    });
    sha512t24u(canonicalize_json(&value).as_bytes())
}

/// Full identifier curie for a SequenceLocation.
pub fn location_identifier(location: &SequenceLocation) -> String {
    format!("ga4gh:SL.{}", location_digest(location))
}

/// Compute the digest of an Allele.
pub fn allele_digest(allele: &Allele) -> String {
    let value = json!({
        "location": location_digest(&allele.location),
        "state": {
            "sequence": allele.state.sequence,
            "type": "LiteralSequenceExpression"
        },
        "type": "Allele"
    });
    sha512t24u(canonicalize_json(&value).as_bytes())
}

/// Full identifier curie for an Allele.
pub fn allele_identifier(allele: &Allele) -> String {
    format!("ga4gh:VA.{}", allele_digest(allele))
}

/// Reusable digest writer for the VCF ingest hot loop.
///
/// Canonical JSON is written directly into a scratch buffer, skipping
/// serde_json entirely. Inputs are written unescaped, which is safe for
/// this call path: accessions are `SQ.` plus base64url characters and
/// states are plain sequence alphabets, neither of which contains
/// JSON-special bytes. `fast_path_matches_generic` pins the equivalence.
pub struct DigestWriter {
    buf: Vec<u8>,
}

impl DigestWriter {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(512),
        }
    }

    fn location_digest_into_buf(&mut self, accession: &str, start: u64, end: u64) -> String {
        let mut itoa = itoa::Buffer::new();
        self.buf.clear();
        self.buf.extend_from_slice(b"{\"end\":");
        self.buf.extend_from_slice(itoa.format(end).as_bytes());
        self.buf
            .extend_from_slice(b",\"sequenceReference\":{\"refgetAccession\":\"");
        self.buf.extend_from_slice(accession.as_bytes());
        self.buf
            .extend_from_slice(b"\",\"type\":\"SequenceReference\"},\"start\":");
        self.buf.extend_from_slice(itoa.format(start).as_bytes());
        self.buf.extend_from_slice(b",\"type\":\"SequenceLocation\"}");
        sha512t24u(&self.buf)
    }

    /// `ga4gh:SL.<digest>` without allocating intermediate JSON values.
    pub fn location_identifier(&mut self, accession: &str, start: u64, end: u64) -> String {
        format!("ga4gh:SL.{}", self.location_digest_into_buf(accession, start, end))
    }

    /// `ga4gh:VA.<digest>` for a literal-state allele, allocation-free on
    /// the JSON side.
    pub fn allele_identifier(
        &mut self,
        accession: &str,
        start: u64,
        end: u64,
        state: &str,
    ) -> String {
        let sl_digest = self.location_digest_into_buf(accession, start, end);

        self.buf.clear();
        self.buf.extend_from_slice(b"{\"location\":\"");
        self.buf.extend_from_slice(sl_digest.as_bytes());
        self.buf.extend_from_slice(b"\",\"state\":{\"sequence\":\"");
        self.buf.extend_from_slice(state.as_bytes());
        self.buf
            .extend_from_slice(b"\",\"type\":\"LiteralSequenceExpression\"},\"type\":\"Allele\"}");

        format!("ga4gh:VA.{}", sha512t24u(&self.buf))
    }
}

impl Default for DigestWriter {
    fn default() -> Self {
        Self::new()
    }
}
