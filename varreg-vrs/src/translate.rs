//! Definition-string translation.
//!
//! [`Translator`] turns a variant definition in one of three nomenclatures
//! into a normalized, digested [`Allele`]:
//!
//! - HGVS genomic: `NC_000010.11:g.87894077C>T` (also del/ins/delins/dup/=)
//! - SPDI: `NC_000007.14:140753335:A:T` (0-based; deletion may be a length)
//! - gnomAD/VCF: `7-140753335-A-T` (1-based)
//!
//! Coordinates are emitted half-open, zero-based; indels are fully
//! justified. Transcript-relative HGVS axes (c., n., p.) are out of scope
//! and rejected as unsupported.

use std::sync::Arc;

use thiserror::Error;

use varreg_refget::{RefgetError, SequenceRepository};

use crate::models::{Allele, SequenceLocation, SequenceReference};
use crate::normalize::{normalize, NormalizeError};

#[derive(Error, Debug)]
pub enum TranslateError {
    #[error("Unrecognized variant nomenclature: {0}")]
    UnknownNomenclature(String),

    #[error("Unsupported nomenclature axis in {0} (only genomic HGVS, SPDI, gnomAD)")]
    UnsupportedNomenclature(String),

    #[error("Cannot translate {input}: {reason}")]
    Translation { input: String, reason: String },

    #[error("Reference disagreement in {input}: stated {stated}, sequence has {actual}")]
    ReferenceMismatch {
        input: String,
        stated: String,
        actual: String,
    },

    #[error(transparent)]
    Refget(#[from] RefgetError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

impl TranslateError {
    fn translation(input: &str, reason: impl Into<String>) -> Self {
        TranslateError::Translation {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// Translates definition strings into normalized VRS Alleles.
pub struct Translator {
    repo: Arc<dyn SequenceRepository>,
}

impl Translator {
    pub fn new(repo: Arc<dyn SequenceRepository>) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &Arc<dyn SequenceRepository> {
        &self.repo
    }

    /// Translate a definition in any supported nomenclature.
    pub fn translate_allele(&self, definition: &str) -> Result<Allele, TranslateError> {
        let definition = definition.trim();

        if let Some((_, rest)) = definition.split_once(':') {
            if rest.len() >= 2 && rest.as_bytes()[1] == b'.' {
                return match rest.as_bytes()[0] {
                    b'g' => self.from_hgvs_genomic(definition),
                    b'c' | b'n' | b'p' | b'm' | b'r' => Err(
                        TranslateError::UnsupportedNomenclature(definition.to_string()),
                    ),
                    _ => Err(TranslateError::UnknownNomenclature(definition.to_string())),
                };
            }
        }

        let dash_parts: Vec<&str> = definition.split('-').collect();
        if dash_parts.len() == 4 && dash_parts[1].bytes().all(|b| b.is_ascii_digit()) {
            return self.from_gnomad(definition, &dash_parts);
        }

        let colon_parts: Vec<&str> = definition.split(':').collect();
        if colon_parts.len() == 4 && colon_parts[1].bytes().all(|b| b.is_ascii_digit()) {
            return self.from_spdi(definition, &colon_parts);
        }

        Err(TranslateError::UnknownNomenclature(definition.to_string()))
    }

    /// Build a normalized Allele directly from VCF-style parts against an
    /// already-fetched reference sequence. This is the bulk-ingest entry
    /// point; the caller owns the per-chromosome sequence cache.
    pub fn allele_from_vcf_parts(
        &self,
        sequence: &[u8],
        accession: &str,
        start0: u64,
        ref_allele: &str,
        alt_allele: &str,
    ) -> Result<Allele, TranslateError> {
        let input = format!("{accession}:{start0}:{ref_allele}:{alt_allele}");
        let ref_upper = ref_allele.to_ascii_uppercase();
        let alt_upper = alt_allele.to_ascii_uppercase();
        check_alphabet(&input, &ref_upper)?;
        check_alphabet(&input, &alt_upper)?;

        let end0 = start0 + ref_upper.len() as u64;
        check_stated_reference(&input, sequence, start0, end0, &ref_upper)?;

        build_allele(&input, sequence, accession, start0, &ref_upper, &alt_upper)
    }

    fn from_spdi(&self, input: &str, parts: &[&str]) -> Result<Allele, TranslateError> {
        let accession = self.repo.translate_identifier(parts[0])?;
        let sequence = self.repo.get_sequence_full(&accession)?;
        let start0: u64 = parts[1]
            .parse()
            .map_err(|_| TranslateError::translation(input, "invalid position"))?;

        // The deletion field is either a literal sequence or a length.
        let ref_upper = if parts[2].bytes().all(|b| b.is_ascii_digit()) && !parts[2].is_empty() {
            let del_len: u64 = parts[2]
                .parse()
                .map_err(|_| TranslateError::translation(input, "invalid deletion length"))?;
            slice_sequence(input, &sequence, start0, start0 + del_len)?.to_string()
        } else {
            let stated = parts[2].to_ascii_uppercase();
            check_alphabet(input, &stated)?;
            let end0 = start0 + stated.len() as u64;
            check_stated_reference(input, sequence.as_bytes(), start0, end0, &stated)?;
            stated
        };

        let alt_upper = parts[3].to_ascii_uppercase();
        check_alphabet(input, &alt_upper)?;

        build_allele(
            input,
            sequence.as_bytes(),
            &accession,
            start0,
            &ref_upper,
            &alt_upper,
        )
    }

    fn from_gnomad(&self, input: &str, parts: &[&str]) -> Result<Allele, TranslateError> {
        let accession = self.resolve_chromosome(parts[0])?;
        let sequence = self.repo.get_sequence_full(&accession)?;

        let pos1: u64 = parts[1]
            .parse()
            .map_err(|_| TranslateError::translation(input, "invalid position"))?;
        if pos1 == 0 {
            return Err(TranslateError::translation(input, "positions are 1-based"));
        }
        let start0 = pos1 - 1;

        let ref_upper = parts[2].to_ascii_uppercase();
        let alt_upper = parts[3].to_ascii_uppercase();
        check_alphabet(input, &ref_upper)?;
        check_alphabet(input, &alt_upper)?;
        let end0 = start0 + ref_upper.len() as u64;
        check_stated_reference(input, sequence.as_bytes(), start0, end0, &ref_upper)?;

        build_allele(
            input,
            sequence.as_bytes(),
            &accession,
            start0,
            &ref_upper,
            &alt_upper,
        )
    }

    /// Resolve a VCF/gnomAD chromosome token to a refget accession,
    /// tolerating a missing or present `chr` prefix.
    pub fn resolve_chromosome(&self, chrom: &str) -> Result<String, TranslateError> {
        match self.repo.translate_identifier(chrom) {
            Ok(acc) => Ok(acc),
            Err(RefgetError::UnresolvedAlias(_)) => {
                let alternate = match chrom.strip_prefix("chr") {
                    Some(bare) => bare.to_string(),
                    None => format!("chr{chrom}"),
                };
                Ok(self.repo.translate_identifier(&alternate)?)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn from_hgvs_genomic(&self, input: &str) -> Result<Allele, TranslateError> {
        let (acc_part, change) = input
            .split_once(":g.")
            .ok_or_else(|| TranslateError::UnknownNomenclature(input.to_string()))?;
        let accession = self.repo.translate_identifier(acc_part)?;
        let sequence = self.repo.get_sequence_full(&accession)?;

        let (start1, rest) = take_number(change)
            .ok_or_else(|| TranslateError::translation(input, "expected position after g."))?;
        let (end1, op) = match rest.strip_prefix('_') {
            Some(r) => take_number(r)
                .ok_or_else(|| TranslateError::translation(input, "expected end position"))?,
            None => (start1, rest),
        };
        if start1 == 0 || end1 < start1 {
            return Err(TranslateError::translation(input, "invalid position range"));
        }

        // Interbase coordinates of the addressed bases.
        let start0 = start1 - 1;
        let end0 = end1;

        let (var_start, ref_upper, alt_upper) = if let Some((stated_ref, alt)) = op.split_once('>')
        {
            // Substitution: 5T>C
            let stated = stated_ref.to_ascii_uppercase();
            let alt = alt.to_ascii_uppercase();
            check_alphabet(input, &stated)?;
            check_alphabet(input, &alt)?;
            if alt.is_empty() || stated.len() as u64 != end0 - start0 {
                return Err(TranslateError::translation(input, "malformed substitution"));
            }
            check_stated_reference(input, sequence.as_bytes(), start0, end0, &stated)?;
            (start0, stated, alt)
        } else if let Some(alt) = op.strip_prefix("delins") {
            let alt = alt.to_ascii_uppercase();
            check_alphabet(input, &alt)?;
            if alt.is_empty() {
                return Err(TranslateError::translation(input, "delins requires a sequence"));
            }
            let r = slice_sequence(input, &sequence, start0, end0)?.to_string();
            (start0, r, alt)
        } else if let Some(stated) = op.strip_prefix("del") {
            let r = slice_sequence(input, &sequence, start0, end0)?.to_string();
            if !stated.is_empty() {
                let stated = stated.to_ascii_uppercase();
                check_alphabet(input, &stated)?;
                check_stated_reference(input, sequence.as_bytes(), start0, end0, &stated)?;
            }
            (start0, r, String::new())
        } else if let Some(stated) = op.strip_prefix("dup") {
            // Duplication: insertion of the addressed bases after them.
            let dup = slice_sequence(input, &sequence, start0, end0)?.to_string();
            if !stated.is_empty() {
                let stated = stated.to_ascii_uppercase();
                check_alphabet(input, &stated)?;
                check_stated_reference(input, sequence.as_bytes(), start0, end0, &stated)?;
            }
            (end0, String::new(), dup)
        } else if let Some(alt) = op.strip_prefix("ins") {
            if end1 != start1 + 1 {
                return Err(TranslateError::translation(
                    input,
                    "insertion requires adjacent flanking positions",
                ));
            }
            let alt = alt.to_ascii_uppercase();
            check_alphabet(input, &alt)?;
            if alt.is_empty() {
                return Err(TranslateError::translation(input, "ins requires a sequence"));
            }
            // Between the flanking bases: interbase position start1.
            (start1, String::new(), alt)
        } else if op == "=" {
            let r = slice_sequence(input, &sequence, start0, end0)?.to_string();
            (start0, r.clone(), r)
        } else {
            return Err(TranslateError::translation(
                input,
                format!("unrecognized change description: {op}"),
            ));
        };

        build_allele(
            input,
            sequence.as_bytes(),
            &accession,
            var_start,
            &ref_upper,
            &alt_upper,
        )
    }
}

/// Leading decimal number, returning the remainder.
fn take_number(s: &str) -> Option<(u64, &str)> {
    let digits = s.bytes().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let n: u64 = s[..digits].parse().ok()?;
    Some((n, &s[digits..]))
}

fn check_alphabet(input: &str, allele: &str) -> Result<(), TranslateError> {
    if allele.bytes().all(|b| b.is_ascii_uppercase()) {
        Ok(())
    } else {
        Err(TranslateError::translation(
            input,
            format!("invalid sequence characters in {allele:?}"),
        ))
    }
}

fn slice_sequence<'s>(
    input: &str,
    sequence: &'s str,
    start0: u64,
    end0: u64,
) -> Result<&'s str, TranslateError> {
    let len = sequence.len() as u64;
    if start0 > end0 || end0 > len {
        return Err(TranslateError::translation(
            input,
            format!("interval [{start0}, {end0}) out of range for sequence of length {len}"),
        ));
    }
    Ok(&sequence[start0 as usize..end0 as usize])
}

fn check_stated_reference(
    input: &str,
    sequence: &[u8],
    start0: u64,
    end0: u64,
    stated: &str,
) -> Result<(), TranslateError> {
    let len = sequence.len() as u64;
    if start0 > end0 || end0 > len {
        return Err(TranslateError::translation(
            input,
            format!("interval [{start0}, {end0}) out of range for sequence of length {len}"),
        ));
    }
    let actual = &sequence[start0 as usize..end0 as usize];
    if actual != stated.as_bytes() {
        return Err(TranslateError::ReferenceMismatch {
            input: input.to_string(),
            stated: stated.to_string(),
            actual: String::from_utf8_lossy(actual).to_string(),
        });
    }
    Ok(())
}

fn build_allele(
    input: &str,
    sequence: &[u8],
    accession: &str,
    start0: u64,
    ref_allele: &str,
    alt_allele: &str,
) -> Result<Allele, TranslateError> {
    let norm = normalize(sequence, start0, ref_allele.as_bytes(), alt_allele.as_bytes())?;
    let state = String::from_utf8(norm.allele)
        .map_err(|_| TranslateError::translation(input, "reference sequence is not ASCII"))?;
    Ok(Allele::new(
        SequenceLocation::new(SequenceReference::new(accession), norm.start, norm.end),
        state,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use varreg_refget::InMemorySequenceRepository;

    //            0123456789012345
    const SEQ: &str = "ACGGTTAAAAGGCATT";
    const ACC: &str = "SQ.PYKgZuOmAUL24PDiqBj4shWJdag8i7hl";

    fn translator() -> Translator {
        let mut repo = InMemorySequenceRepository::new();
        let acc = repo.add_sequence(SEQ);
        assert_eq!(acc, ACC);
        repo.add_alias("refseq", "NC_TEST.1", &acc);
        repo.add_alias("ucsc", "chrT", &acc);
        Translator::new(Arc::new(repo))
    }

    #[test]
    fn test_spdi_snv() {
        let a = translator().translate_allele(&format!("{ACC}:4:T:G")).unwrap();
        assert_eq!(a.location.start, 4);
        assert_eq!(a.location.end, 5);
        assert_eq!(a.state.sequence, "G");
        assert_eq!(a.id(), "ga4gh:VA.EoorUrKWM7RrXnqtKRieu3n51n6-dcC9");
    }

    #[test]
    fn test_spdi_alias_resolves() {
        let a = translator().translate_allele("NC_TEST.1:4:T:G").unwrap();
        assert_eq!(a.location.sequence_reference.refget_accession, ACC);
        assert_eq!(a.id(), "ga4gh:VA.EoorUrKWM7RrXnqtKRieu3n51n6-dcC9");
    }

    #[test]
    fn test_spdi_numeric_deletion() {
        // Delete 5 bases at 5 (TAAAA), keep T: normalizes to [6, 10) "".
        let a = translator().translate_allele("NC_TEST.1:5:5:T").unwrap();
        assert_eq!((a.location.start, a.location.end), (6, 10));
        assert_eq!(a.state.sequence, "");
        assert_eq!(a.id(), "ga4gh:VA.-Z8czyL7gBBs0wq5Q9TlAvDc1p209Zaz");
    }

    #[test]
    fn test_gnomad_deletion() {
        let a = translator().translate_allele("chrT-6-TAAAA-T").unwrap();
        assert_eq!((a.location.start, a.location.end), (6, 10));
        assert_eq!(a.id(), "ga4gh:VA.-Z8czyL7gBBs0wq5Q9TlAvDc1p209Zaz");
    }

    #[test]
    fn test_gnomad_chr_prefix_tolerated() {
        // "T" alone resolves through the chr-prefixed alias.
        let a = translator().translate_allele("T-6-TAAAA-T").unwrap();
        assert_eq!(a.id(), "ga4gh:VA.-Z8czyL7gBBs0wq5Q9TlAvDc1p209Zaz");
    }

    #[test]
    fn test_hgvs_substitution() {
        let a = translator().translate_allele("NC_TEST.1:g.5T>C").unwrap();
        assert_eq!((a.location.start, a.location.end), (4, 5));
        assert_eq!(a.state.sequence, "C");
        assert_eq!(a.id(), "ga4gh:VA.HNtqLbWP9FZnNzuVbXeuZ9gwY1WQbedG");
    }

    #[test]
    fn test_hgvs_deletion_range() {
        let a = translator().translate_allele("NC_TEST.1:g.7_10del").unwrap();
        assert_eq!((a.location.start, a.location.end), (6, 10));
        assert_eq!(a.state.sequence, "");
        assert_eq!(a.id(), "ga4gh:VA.-Z8czyL7gBBs0wq5Q9TlAvDc1p209Zaz");
    }

    #[test]
    fn test_hgvs_deletion_with_stated_sequence() {
        let a = translator()
            .translate_allele("NC_TEST.1:g.7_10delAAAA")
            .unwrap();
        assert_eq!(a.id(), "ga4gh:VA.-Z8czyL7gBBs0wq5Q9TlAvDc1p209Zaz");
    }

    #[test]
    fn test_hgvs_duplication_rolls() {
        let a = translator().translate_allele("NC_TEST.1:g.7_8dup").unwrap();
        assert_eq!((a.location.start, a.location.end), (6, 10));
        assert_eq!(a.state.sequence, "AAAAAA");
        assert_eq!(a.id(), "ga4gh:VA.A-VQM2LoSGIZXmfYEqufVs4vwbReFXFG");
    }

    #[test]
    fn test_hgvs_insertion_equivalent_to_dup() {
        let a = translator()
            .translate_allele("NC_TEST.1:g.8_9insAA")
            .unwrap();
        assert_eq!(a.id(), "ga4gh:VA.A-VQM2LoSGIZXmfYEqufVs4vwbReFXFG");
    }

    #[test]
    fn test_hgvs_delins() {
        let a = translator()
            .translate_allele("NC_TEST.1:g.5_6delinsGG")
            .unwrap();
        assert_eq!((a.location.start, a.location.end), (4, 6));
        assert_eq!(a.state.sequence, "GG");
    }

    #[test]
    fn test_hgvs_reference_mismatch() {
        let err = translator()
            .translate_allele("NC_TEST.1:g.5A>C")
            .unwrap_err();
        assert!(matches!(err, TranslateError::ReferenceMismatch { .. }));
    }

    #[test]
    fn test_hgvs_insertion_requires_adjacent_positions() {
        let err = translator()
            .translate_allele("NC_TEST.1:g.8_10insAA")
            .unwrap_err();
        assert!(matches!(err, TranslateError::Translation { .. }));
    }

    #[test]
    fn test_transcript_hgvs_unsupported() {
        let err = translator()
            .translate_allele("NM_004333.4:c.1799T>A")
            .unwrap_err();
        assert!(matches!(err, TranslateError::UnsupportedNomenclature(_)));
    }

    #[test]
    fn test_unknown_nomenclature() {
        let err = translator().translate_allele("rs12345").unwrap_err();
        assert!(matches!(err, TranslateError::UnknownNomenclature(_)));
    }

    #[test]
    fn test_unresolved_accession() {
        let err = translator()
            .translate_allele("NC_MISSING.9:g.5T>C")
            .unwrap_err();
        assert!(matches!(
            err,
            TranslateError::Refget(RefgetError::UnresolvedAlias(_))
        ));
    }

    #[test]
    fn test_determinism_across_nomenclatures() {
        let t = translator();
        let via_hgvs = t.translate_allele("NC_TEST.1:g.5T>G").unwrap();
        let via_spdi = t.translate_allele("NC_TEST.1:4:T:G").unwrap();
        let via_gnomad = t.translate_allele("chrT-5-T-G").unwrap();
        assert_eq!(via_hgvs.id(), via_spdi.id());
        assert_eq!(via_spdi.id(), via_gnomad.id());
    }

    #[test]
    fn test_vcf_parts_entry_point() {
        let t = translator();
        let a = t
            .allele_from_vcf_parts(SEQ.as_bytes(), ACC, 4, "T", "G")
            .unwrap();
        assert_eq!(a.id(), "ga4gh:VA.EoorUrKWM7RrXnqtKRieu3n51n6-dcC9");
    }

    #[test]
    fn test_vcf_parts_reference_mismatch() {
        let t = translator();
        let err = t
            .allele_from_vcf_parts(SEQ.as_bytes(), ACC, 4, "A", "G")
            .unwrap_err();
        assert!(matches!(err, TranslateError::ReferenceMismatch { .. }));
    }
}
