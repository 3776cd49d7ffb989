//! `varreg vcf` - annotate and register a VCF file offline.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};

use varreg::{create_storage, Registry, RegistryConfig};
use varreg_vcf::{AnnotateOptions, VcfRegistrar};
use varreg_vrs::Translator;

pub const VCF_CMD: &str = "vcf";

pub fn create_vcf_cli() -> Command {
    crate::sequence_args(
        Command::new(VCF_CMD)
            .about("Register all alleles of a VCF and write an annotated copy.")
            .arg(
                Arg::new("input")
                    .long("input")
                    .short('i')
                    .required(true)
                    .help("Input VCF (.vcf, .vcf.gz)"),
            )
            .arg(
                Arg::new("output")
                    .long("output")
                    .short('o')
                    .required(true)
                    .help("Annotated output VCF"),
            )
            .arg(
                Arg::new("skip-ref")
                    .long("skip-ref")
                    .action(ArgAction::SetTrue)
                    .help("Do not compute identifiers for REF alleles"),
            ),
    )
}

pub fn run_vcf(matches: &ArgMatches) -> Result<()> {
    let input = matches.get_one::<String>("input").expect("required arg");
    let output = matches.get_one::<String>("output").expect("required arg");

    let config = RegistryConfig::from_env();
    let storage = create_storage(&config)?;
    let repo = Arc::new(crate::load_repository(matches)?);
    let registry = Registry::new(Translator::new(repo), storage);

    let options = AnnotateOptions {
        for_ref: !matches.get_flag("skip-ref"),
        flush_on_exit: config.flush_on_batchctx_exit,
        ..AnnotateOptions::default()
    };
    let stats =
        VcfRegistrar::new(&registry).annotate(Path::new(input), Path::new(output), &options)?;

    tracing::info!(
        records = stats.records,
        registered = stats.registered,
        failed_slots = stats.failed_slots,
        "annotation complete"
    );
    registry.close()?;
    Ok(())
}
