//! Sequence repository contract and the in-memory implementation.
//!
//! A repository maps human-facing sequence names (RefSeq/GenBank accessions,
//! chromosome names) to refget accessions and serves sequence substrings.
//! Aliases live in namespaces (e.g. "refseq", "ucsc"); a bare alias is
//! searched across namespaces in deterministic order.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::digest::sequence_accession;
use crate::error::RefgetError;

/// Contract for resolving sequence identifiers and fetching sequence data.
///
/// Implementations may be backed by local storage or a remote refget
/// service; `Unavailable` errors are transient and callers may retry.
pub trait SequenceRepository: Send + Sync {
    /// Resolve an alias to a refget accession (`SQ.`-prefixed).
    ///
    /// Inputs that already look like accessions (`SQ.…` or `ga4gh:SQ.…`)
    /// pass through unchanged, normalized to the bare `SQ.` form.
    fn translate_identifier(&self, alias: &str) -> Result<String, RefgetError>;

    /// Fetch the substring `[start, end)` of a sequence.
    fn get_sequence(&self, accession: &str, start: u64, end: u64) -> Result<String, RefgetError>;

    /// Fetch a whole sequence.
    fn get_sequence_full(&self, accession: &str) -> Result<String, RefgetError>;

    /// Length of a sequence.
    fn sequence_length(&self, accession: &str) -> Result<u64, RefgetError>;

    /// Whether a sequence with this accession is present.
    fn contains_sequence(&self, accession: &str) -> bool;
}

/// Strip an optional `ga4gh:` curie prefix from an accession.
fn bare_accession(accession: &str) -> &str {
    accession.strip_prefix("ga4gh:").unwrap_or(accession)
}

/// Digest-keyed in-memory sequence store with namespaced aliases.
///
/// Sequences are keyed by their content-derived refget accession, so the
/// same bytes registered twice deduplicate naturally. Aliases map
/// namespace/name pairs to accessions and can be bulk-loaded from TSV
/// sidecar files (`alias<TAB>accession` per line, `#` comments).
#[derive(Debug, Default)]
pub struct InMemorySequenceRepository {
    /// accession (`SQ.…`) -> uppercase sequence
    sequences: HashMap<String, String>,
    /// namespace -> { alias -> accession }; BTreeMap for deterministic scans
    aliases: BTreeMap<String, HashMap<String, String>>,
}

impl InMemorySequenceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sequence, deriving its accession from content.
    ///
    /// Returns the `SQ.`-prefixed accession.
    pub fn add_sequence(&mut self, sequence: &str) -> String {
        let accession = sequence_accession(sequence.as_bytes());
        self.sequences
            .entry(accession.clone())
            .or_insert_with(|| sequence.to_ascii_uppercase());
        accession
    }

    /// Register a sequence under an externally-assigned accession.
    ///
    /// Mirrors remote repositories where accessions are reported, not
    /// recomputed. The caller owns accession/content agreement.
    pub fn add_sequence_with_accession(&mut self, accession: &str, sequence: &str) {
        self.sequences
            .insert(accession.to_string(), sequence.to_ascii_uppercase());
    }

    /// Add an alias in a namespace pointing to an accession.
    pub fn add_alias(&mut self, namespace: &str, alias: &str, accession: &str) {
        self.aliases
            .entry(namespace.to_string())
            .or_default()
            .insert(alias.to_string(), accession.to_string());
    }

    /// Load aliases from a TSV file into a namespace.
    ///
    /// Returns the number of aliases loaded.
    pub fn load_alias_tsv(&mut self, namespace: &str, path: &Path) -> Result<usize, RefgetError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut count = 0;
        for line in reader.lines() {
            let line = line?;
            if line.starts_with('#') || line.trim().is_empty() {
                continue;
            }
            if let Some((alias, accession)) = line.split_once('\t') {
                self.add_alias(namespace, alias, accession.trim());
                count += 1;
            }
        }
        Ok(count)
    }

    fn lookup_alias(&self, alias: &str) -> Option<&String> {
        // "namespace:alias" form first, then a cross-namespace scan
        if let Some((namespace, name)) = alias.split_once(':') {
            if let Some(acc) = self.aliases.get(namespace).and_then(|ns| ns.get(name)) {
                return Some(acc);
            }
        }
        self.aliases.values().find_map(|ns| ns.get(alias))
    }

    fn sequence(&self, accession: &str) -> Result<&String, RefgetError> {
        let key = bare_accession(accession);
        self.sequences
            .get(key)
            .ok_or_else(|| RefgetError::UnknownAccession(accession.to_string()))
    }
}

impl SequenceRepository for InMemorySequenceRepository {
    fn translate_identifier(&self, alias: &str) -> Result<String, RefgetError> {
        let bare = bare_accession(alias);
        if bare.starts_with("SQ.") {
            return Ok(bare.to_string());
        }
        self.lookup_alias(alias)
            .cloned()
            .ok_or_else(|| RefgetError::UnresolvedAlias(alias.to_string()))
    }

    fn get_sequence(&self, accession: &str, start: u64, end: u64) -> Result<String, RefgetError> {
        let seq = self.sequence(accession)?;
        let length = seq.len() as u64;
        if start > end || end > length {
            return Err(RefgetError::RangeOutOfBounds {
                accession: accession.to_string(),
                start,
                end,
                length,
            });
        }
        Ok(seq[start as usize..end as usize].to_string())
    }

    fn get_sequence_full(&self, accession: &str) -> Result<String, RefgetError> {
        Ok(self.sequence(accession)?.clone())
    }

    fn sequence_length(&self, accession: &str) -> Result<u64, RefgetError> {
        Ok(self.sequence(accession)?.len() as u64)
    }

    fn contains_sequence(&self, accession: &str) -> bool {
        self.sequences.contains_key(bare_accession(accession))
    }
}
