//! The row-at-a-time annotate-and-register pipeline.
//!
//! Stages per record: parse coordinates, resolve the chromosome to a
//! refget accession (cached per file, with the decoded sequence), build a
//! normalized allele for REF and each ALT, register it, and append the
//! identifiers to the record's INFO column. A definition that fails
//! translation contributes an empty identifier token and a warning; the
//! row is still written. Storage failures abort the file.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use flate2::read::MultiGzDecoder;

use varreg::{Registry, RegistryError};
use varreg_refget::SequenceRepository;
use varreg_vrs::{DigestWriter, VrsObject};

use crate::error::VcfError;

/// INFO key added to the header and every record.
pub const VRS_IDS_INFO_KEY: &str = "VRS_Allele_IDs";

const VRS_IDS_HEADER: &str = "##INFO=<ID=VRS_Allele_IDs,Number=.,Type=String,\
Description=\"The computed identifiers for the GA4GH VRS Alleles corresponding to the \
values in the REF and ALT fields\">";

/// Pipeline knobs.
#[derive(Debug, Clone)]
pub struct AnnotateOptions {
    /// Register and list identifiers for REF alleles.
    pub for_ref: bool,
    /// Flush the batch scope on exit; without it, buffered writes are
    /// discarded on completion (annotation-only mode).
    pub flush_on_exit: bool,
    /// Soft-limit deadline; exceeding it aborts between rows.
    pub deadline: Option<Instant>,
}

impl Default for AnnotateOptions {
    fn default() -> Self {
        Self {
            for_ref: true,
            flush_on_exit: true,
            deadline: None,
        }
    }
}

/// Counters reported after a file completes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct VcfStats {
    pub records: u64,
    pub registered: u64,
    pub failed_slots: u64,
}

/// Per-chromosome cache entry: accession plus decoded sequence, or a
/// remembered resolution failure.
enum ChromEntry {
    Resolved { accession: String, sequence: Vec<u8> },
    Unresolved,
}

/// Open a VCF, auto-detecting gzip/bgzf by extension.
fn open_vcf(path: &Path) -> Result<Box<dyn BufRead>, VcfError> {
    let file = File::open(path)?;
    let capacity = 256 * 1024;
    let name = path.to_string_lossy();
    if name.ends_with(".gz") || name.ends_with(".bgz") {
        Ok(Box::new(BufReader::with_capacity(
            capacity,
            MultiGzDecoder::new(file),
        )))
    } else {
        Ok(Box::new(BufReader::with_capacity(capacity, file)))
    }
}

/// Registers VCF alleles through a [`Registry`] and writes the annotated
/// output.
pub struct VcfRegistrar<'r> {
    registry: &'r Registry,
}

impl<'r> VcfRegistrar<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// Annotate `input` into `output`, registering every allele.
    ///
    /// Opens one batch scope around the whole file; on success the scope
    /// flushes (per `flush_on_exit`), on failure it discards.
    pub fn annotate(
        &self,
        input: &Path,
        output: &Path,
        options: &AnnotateOptions,
    ) -> Result<VcfStats, VcfError> {
        let reader = open_vcf(input)?;
        let mut writer = BufWriter::new(File::create(output)?);

        let batch = self
            .registry
            .batch_context(options.flush_on_exit)
            .map_err(VcfError::from)?;

        match self.annotate_stream(reader, &mut writer, options) {
            Ok(stats) => {
                batch.close().map_err(RegistryError::from)?;
                writer.flush()?;
                Ok(stats)
            }
            Err(e) => {
                if let Err(discard_err) = batch.discard() {
                    tracing::warn!(error = %discard_err, "batch discard after pipeline failure");
                }
                Err(e)
            }
        }
    }

    /// Core loop over an already-open reader/writer pair.
    pub fn annotate_stream(
        &self,
        mut reader: impl BufRead,
        writer: &mut impl Write,
        options: &AnnotateOptions,
    ) -> Result<VcfStats, VcfError> {
        let mut stats = VcfStats::default();
        let mut chroms: HashMap<String, ChromEntry> = HashMap::new();
        let mut digests = DigestWriter::new();
        let mut header_done = false;
        let mut line_buf = String::new();
        let mut line_no: u64 = 0;

        loop {
            line_buf.clear();
            if reader.read_line(&mut line_buf)? == 0 {
                break;
            }
            line_no += 1;
            let line = line_buf.trim_end_matches('\n').trim_end_matches('\r');

            if let Some(deadline) = options.deadline {
                if Instant::now() >= deadline {
                    return Err(VcfError::DeadlineExceeded);
                }
            }

            if line.starts_with("##") {
                writeln!(writer, "{line}")?;
                continue;
            }
            if line.starts_with('#') {
                // Declare the INFO field ahead of the column header.
                writeln!(writer, "{VRS_IDS_HEADER}")?;
                writeln!(writer, "{line}")?;
                header_done = true;
                continue;
            }
            if line.is_empty() {
                writeln!(writer)?;
                continue;
            }
            if !header_done {
                return Err(VcfError::Malformed {
                    line: line_no,
                    reason: "data record before #CHROM header".to_string(),
                });
            }

            let annotated =
                self.annotate_record(line, line_no, &mut chroms, &mut digests, options, &mut stats)?;
            writeln!(writer, "{annotated}")?;
            stats.records += 1;
        }

        Ok(stats)
    }

    fn annotate_record(
        &self,
        line: &str,
        line_no: u64,
        chroms: &mut HashMap<String, ChromEntry>,
        digests: &mut DigestWriter,
        options: &AnnotateOptions,
        stats: &mut VcfStats,
    ) -> Result<String, VcfError> {
        let mut fields: Vec<&str> = line.splitn(9, '\t').collect();
        if fields.len() < 8 {
            return Err(VcfError::Malformed {
                line: line_no,
                reason: format!("expected at least 8 columns, found {}", fields.len()),
            });
        }

        let chrom = fields[0];
        let pos1: u64 = fields[1].parse().map_err(|_| VcfError::Malformed {
            line: line_no,
            reason: format!("invalid POS: {}", fields[1]),
        })?;
        if pos1 == 0 {
            return Err(VcfError::Malformed {
                line: line_no,
                reason: "POS is 1-based".to_string(),
            });
        }
        let start0 = pos1 - 1;
        let ref_allele = fields[3];
        let alt_field = fields[4];

        if !chroms.contains_key(chrom) {
            let entry = match self.registry.translator().resolve_chromosome(chrom) {
                Ok(accession) => match self
                    .registry
                    .data_proxy()
                    .get_sequence_full(&accession)
                {
                    Ok(sequence) => ChromEntry::Resolved {
                        accession,
                        sequence: sequence.into_bytes(),
                    },
                    Err(e) => {
                        tracing::warn!(chrom, error = %e, "cannot fetch chromosome sequence");
                        ChromEntry::Unresolved
                    }
                },
                Err(e) => {
                    tracing::warn!(chrom, error = %e, "cannot resolve chromosome");
                    ChromEntry::Unresolved
                }
            };
            chroms.insert(chrom.to_string(), entry);
        }

        let alt_count = alt_field.split(',').count();
        let slot_count = alt_count + usize::from(options.for_ref);
        let mut ids: Vec<String> = Vec::with_capacity(slot_count);

        match &chroms[chrom] {
            ChromEntry::Unresolved => {
                stats.failed_slots += slot_count as u64;
                ids.resize(slot_count, String::new());
            }
            ChromEntry::Resolved {
                accession,
                sequence,
            } => {
                if options.for_ref {
                    ids.push(self.register_slot(
                        sequence, accession, start0, ref_allele, ref_allele, digests, stats,
                    )?);
                }
                for alt in alt_field.split(',') {
                    if alt.starts_with('<') || alt == "*" || alt == "." {
                        ids.push(String::new());
                        continue;
                    }
                    ids.push(self.register_slot(
                        sequence, accession, start0, ref_allele, alt, digests, stats,
                    )?);
                }
            }
        }

        let tag = format!("{VRS_IDS_INFO_KEY}={}", ids.join(","));
        let info = fields[7];
        let new_info = if info == "." || info.is_empty() {
            tag
        } else {
            format!("{info};{tag}")
        };
        fields[7] = &new_info;
        Ok(fields.join("\t"))
    }

    /// Translate and register one REF/ALT slot; a translation failure
    /// yields an empty identifier, a storage failure aborts the file.
    #[allow(clippy::too_many_arguments)]
    fn register_slot(
        &self,
        sequence: &[u8],
        accession: &str,
        start0: u64,
        ref_allele: &str,
        alt_allele: &str,
        digests: &mut DigestWriter,
        stats: &mut VcfStats,
    ) -> Result<String, VcfError> {
        let allele = match self.registry.translator().allele_from_vcf_parts(
            sequence, accession, start0, ref_allele, alt_allele,
        ) {
            Ok(allele) => allele,
            Err(e) => {
                tracing::warn!(
                    accession,
                    start0,
                    ref_allele,
                    alt_allele,
                    error = %e,
                    "allele translation failed"
                );
                stats.failed_slots += 1;
                return Ok(String::new());
            }
        };

        self.registry
            .put_object(&VrsObject::Allele(allele.clone()))?;
        stats.registered += 1;

        // Annotation identifier via the allocation-free fast path.
        Ok(digests.allele_identifier(
            &allele.location.sequence_reference.refget_accession,
            allele.location.start,
            allele.location.end,
            &allele.state.sequence,
        ))
    }
}
