//! End-to-end pipeline tests over small in-memory fixtures.

use std::io::Write as _;
use std::sync::Arc;
use std::time::{Duration, Instant};

use varreg::Registry;
use varreg_refget::InMemorySequenceRepository;
use varreg_storage::{NoObjectStore, SqliteStorage, Storage};
use varreg_vcf::{AnnotateOptions, VcfError, VcfRegistrar};
use varreg_vrs::Translator;

//                    0123456789012345
const SEQ: &str = "ACGGTTAAAAGGCATT";

const REF_SNV_ID: &str = "ga4gh:VA.lrnmJxkSON65sFs2J1-VXNI70XvTwe8z";
const ALT_G_ID: &str = "ga4gh:VA.EoorUrKWM7RrXnqtKRieu3n51n6-dcC9";
const ALT_A_ID: &str = "ga4gh:VA.o-6q6qQAJdDIcflkC2mTVN5mONdDRsrQ";
const REF_DEL_ID: &str = "ga4gh:VA.8B9MZiWE0cCcIp6K6l5EN33EfvhEoUEC";
const ALT_DEL_ID: &str = "ga4gh:VA.-Z8czyL7gBBs0wq5Q9TlAvDc1p209Zaz";

const INPUT: &str = "\
##fileformat=VCFv4.2
##source=varreg-test
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO
chrT\t5\t.\tT\tG\t50\tPASS\t.
chrT\t6\trs1\tTAAAA\tT\t99\tPASS\tDP=100
chrT\t5\t.\tT\tG,A\t50\tPASS\tAC=2
";

fn registry(storage: Arc<dyn Storage>) -> Registry {
    let mut repo = InMemorySequenceRepository::new();
    let acc = repo.add_sequence(SEQ);
    repo.add_alias("refseq", "NC_TEST.1", &acc);
    repo.add_alias("ucsc", "chrT", &acc);
    Registry::new(Translator::new(Arc::new(repo)), storage)
}

fn annotate_to_string(registry: &Registry, input: &str, options: &AnnotateOptions) -> String {
    let mut out = Vec::new();
    VcfRegistrar::new(registry)
        .annotate_stream(input.as_bytes(), &mut out, options)
        .unwrap();
    String::from_utf8(out).unwrap()
}

fn info_field(line: &str) -> &str {
    line.split('\t').nth(7).unwrap()
}

#[test]
fn test_rows_carry_ref_and_alt_ids() {
    let registry = registry(Arc::new(SqliteStorage::in_memory().unwrap()));
    let batch = registry.batch_context(true).unwrap();
    let output = annotate_to_string(&registry, INPUT, &AnnotateOptions::default());
    batch.close().unwrap();

    let data: Vec<&str> = output
        .lines()
        .filter(|l| !l.starts_with('#'))
        .collect();
    assert_eq!(data.len(), 3);

    assert_eq!(
        info_field(data[0]),
        format!("VRS_Allele_IDs={REF_SNV_ID},{ALT_G_ID}")
    );
    assert_eq!(
        info_field(data[1]),
        format!("DP=100;VRS_Allele_IDs={REF_DEL_ID},{ALT_DEL_ID}")
    );
    assert_eq!(
        info_field(data[2]),
        format!("AC=2;VRS_Allele_IDs={REF_SNV_ID},{ALT_G_ID},{ALT_A_ID}")
    );
}

#[test]
fn test_header_declares_info_field_once() {
    let registry = registry(Arc::new(NoObjectStore::new()));
    let output = annotate_to_string(&registry, INPUT, &AnnotateOptions::default());

    let info_headers: Vec<&str> = output
        .lines()
        .filter(|l| l.starts_with("##INFO=<ID=VRS_Allele_IDs"))
        .collect();
    assert_eq!(info_headers.len(), 1);

    // Declared before the column header.
    let lines: Vec<&str> = output.lines().collect();
    let info_pos = lines
        .iter()
        .position(|l| l.starts_with("##INFO=<ID=VRS_Allele_IDs"))
        .unwrap();
    let chrom_pos = lines.iter().position(|l| l.starts_with("#CHROM")).unwrap();
    assert_eq!(info_pos + 1, chrom_pos);
}

#[test]
fn test_output_invariance_after_stripping() {
    let registry = registry(Arc::new(NoObjectStore::new()));
    let output = annotate_to_string(&registry, INPUT, &AnnotateOptions::default());

    let stripped: Vec<String> = output
        .lines()
        .filter(|l| !l.starts_with("##INFO=<ID=VRS_Allele_IDs"))
        .map(|line| {
            if line.starts_with('#') {
                return line.to_string();
            }
            let mut fields: Vec<&str> = line.split('\t').collect();
            let info = fields[7];
            let restored = match info.split_once("VRS_Allele_IDs=") {
                Some((prefix, _)) => {
                    let trimmed = prefix.trim_end_matches(';');
                    if trimmed.is_empty() {
                        "."
                    } else {
                        trimmed
                    }
                }
                None => info,
            }
            .to_string();
            fields[7] = &restored;
            fields.join("\t")
        })
        .collect();

    let expected: Vec<String> = INPUT.lines().map(str::to_string).collect();
    assert_eq!(stripped, expected);
}

#[test]
fn test_registered_alleles_are_retrievable_and_searchable() {
    let storage: Arc<dyn Storage> = Arc::new(SqliteStorage::in_memory().unwrap());
    let registry = registry(Arc::clone(&storage));

    let batch = registry.batch_context(true).unwrap();
    let _ = annotate_to_string(&registry, INPUT, &AnnotateOptions::default());
    batch.close().unwrap();

    for id in [REF_SNV_ID, ALT_G_ID, ALT_A_ID, REF_DEL_ID, ALT_DEL_ID] {
        assert!(
            registry.get_object(id).unwrap().is_some(),
            "expected {id} registered"
        );
    }

    let acc = registry
        .translator()
        .resolve_chromosome("chrT")
        .unwrap();
    let hits = registry.search_variations(&acc, 0, 16).unwrap();
    assert_eq!(hits.len(), 5);
}

#[test]
fn test_for_ref_false_lists_only_alts() {
    let registry = registry(Arc::new(NoObjectStore::new()));
    let options = AnnotateOptions {
        for_ref: false,
        ..AnnotateOptions::default()
    };
    let output = annotate_to_string(&registry, INPUT, &options);
    let data: Vec<&str> = output.lines().filter(|l| !l.starts_with('#')).collect();
    assert_eq!(
        info_field(data[0]),
        format!("VRS_Allele_IDs={ALT_G_ID}")
    );
    assert_eq!(
        info_field(data[2]),
        format!("AC=2;VRS_Allele_IDs={ALT_G_ID},{ALT_A_ID}")
    );
}

#[test]
fn test_failed_translation_emits_empty_tokens() {
    let registry = registry(Arc::new(NoObjectStore::new()));
    // REF disagrees with the reference sequence; unknown chromosome.
    let input = "\
##fileformat=VCFv4.2
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO
chrT\t5\t.\tA\tG\t50\tPASS\t.
chr99\t5\t.\tT\tG\t50\tPASS\t.
";
    let output = annotate_to_string(&registry, input, &AnnotateOptions::default());
    let data: Vec<&str> = output.lines().filter(|l| !l.starts_with('#')).collect();
    assert_eq!(info_field(data[0]), "VRS_Allele_IDs=,");
    assert_eq!(info_field(data[1]), "VRS_Allele_IDs=,");
}

#[test]
fn test_symbolic_alts_skipped() {
    let registry = registry(Arc::new(NoObjectStore::new()));
    let input = "\
##fileformat=VCFv4.2
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO
chrT\t5\t.\tT\t<DEL>,G\t50\tPASS\t.
";
    let output = annotate_to_string(&registry, input, &AnnotateOptions::default());
    let data: Vec<&str> = output.lines().filter(|l| !l.starts_with('#')).collect();
    assert_eq!(
        info_field(data[0]),
        format!("VRS_Allele_IDs={REF_SNV_ID},,{ALT_G_ID}")
    );
}

#[test]
fn test_stateless_mode_still_annotates() {
    let storage: Arc<dyn Storage> = Arc::new(NoObjectStore::new());
    let registry = registry(Arc::clone(&storage));
    let output = annotate_to_string(&registry, INPUT, &AnnotateOptions::default());
    assert!(output.contains(ALT_G_ID));
    assert!(registry.get_object(ALT_G_ID).unwrap().is_none());
}

#[test]
fn test_gzip_input_via_file_path() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("input.vcf.gz");
    let output_path = dir.path().join("output.vcf");

    let file = std::fs::File::create(&input_path).unwrap();
    let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    encoder.write_all(INPUT.as_bytes()).unwrap();
    encoder.finish().unwrap();

    let registry = registry(Arc::new(SqliteStorage::in_memory().unwrap()));
    let stats = VcfRegistrar::new(&registry)
        .annotate(&input_path, &output_path, &AnnotateOptions::default())
        .unwrap();
    assert_eq!(stats.records, 3);
    assert_eq!(stats.registered, 7);

    let output = std::fs::read_to_string(&output_path).unwrap();
    assert!(output.contains(ALT_DEL_ID));
    // Flushed on exit: registered ids are immediately visible.
    assert!(registry.get_object(ALT_DEL_ID).unwrap().is_some());
}

#[test]
fn test_deadline_aborts() {
    let registry = registry(Arc::new(NoObjectStore::new()));
    let options = AnnotateOptions {
        deadline: Some(Instant::now() - Duration::from_secs(1)),
        ..AnnotateOptions::default()
    };
    let mut out = Vec::new();
    let err = VcfRegistrar::new(&registry)
        .annotate_stream(INPUT.as_bytes(), &mut out, &options)
        .unwrap_err();
    assert!(matches!(err, VcfError::DeadlineExceeded));
}

#[test]
fn test_record_before_header_rejected() {
    let registry = registry(Arc::new(NoObjectStore::new()));
    let input = "chrT\t5\t.\tT\tG\t50\tPASS\t.\n";
    let mut out = Vec::new();
    let err = VcfRegistrar::new(&registry)
        .annotate_stream(input.as_bytes(), &mut out, &AnnotateOptions::default())
        .unwrap_err();
    assert!(matches!(err, VcfError::Malformed { line: 1, .. }));
}
