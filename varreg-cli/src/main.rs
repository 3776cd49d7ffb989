mod register;
mod serve;
mod vcf;

use anyhow::Result;
use clap::{Arg, ArgMatches, Command};

use varreg_refget::InMemorySequenceRepository;

pub mod consts {
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
    pub const BIN_NAME: &str = "varreg";
}

fn build_parser() -> Command {
    Command::new(consts::BIN_NAME)
        .bin_name(consts::BIN_NAME)
        .version(consts::VERSION)
        .about("Register, retrieve, and search GA4GH VRS variation.")
        .subcommand_required(true)
        .subcommand(serve::create_serve_cli())
        .subcommand(vcf::create_vcf_cli())
        .subcommand(register::create_register_cli())
}

/// Shared `--fasta` / `--aliases` arguments for seeding the sequence
/// repository.
pub fn sequence_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("fasta")
            .long("fasta")
            .value_name("PATH")
            .action(clap::ArgAction::Append)
            .help("FASTA file(s) to load into the sequence repository"),
    )
    .arg(
        Arg::new("aliases")
            .long("aliases")
            .value_name("NAMESPACE=TSV")
            .action(clap::ArgAction::Append)
            .help("Alias TSV file(s), one namespace per file"),
    )
}

/// Build the sequence repository from `--fasta` and `--aliases`.
pub fn load_repository(matches: &ArgMatches) -> Result<InMemorySequenceRepository> {
    let mut repo = InMemorySequenceRepository::new();
    if let Some(paths) = matches.get_many::<String>("fasta") {
        for path in paths {
            let n = repo.load_fasta("fasta", std::path::Path::new(path))?;
            tracing::info!(path = %path, records = n, "loaded FASTA");
        }
    }
    if let Some(entries) = matches.get_many::<String>("aliases") {
        for entry in entries {
            let (namespace, path) = entry
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("--aliases expects NAMESPACE=TSV, got {entry}"))?;
            let n = repo.load_alias_tsv(namespace, std::path::Path::new(path))?;
            tracing::info!(namespace, path, aliases = n, "loaded aliases");
        }
    }
    Ok(repo)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let app = build_parser();
    let matches = app.get_matches();

    match matches.subcommand() {
        Some((serve::SERVE_CMD, matches)) => serve::run_serve(matches),
        Some((vcf::VCF_CMD, matches)) => vcf::run_vcf(matches),
        Some((register::REGISTER_CMD, matches)) => register::run_register(matches),
        _ => unreachable!("Subcommand not found"),
    }
}
