//! `varreg register` - register a single variant definition.

use std::sync::Arc;

use anyhow::Result;
use clap::{Arg, ArgMatches, Command};

use varreg::{create_storage, Registry, RegistryConfig};
use varreg_vrs::Translator;

pub const REGISTER_CMD: &str = "register";

pub fn create_register_cli() -> Command {
    crate::sequence_args(
        Command::new(REGISTER_CMD)
            .about("Register one variant definition (HGVS, SPDI, or gnomAD) and print it.")
            .arg(
                Arg::new("definition")
                    .required(true)
                    .help("Variant definition, e.g. NC_000010.11:g.87894077C>T"),
            ),
    )
}

pub fn run_register(matches: &ArgMatches) -> Result<()> {
    let definition = matches
        .get_one::<String>("definition")
        .expect("required arg");

    let config = RegistryConfig::from_env();
    let storage = create_storage(&config)?;
    let repo = Arc::new(crate::load_repository(matches)?);
    let registry = Registry::new(Translator::new(repo), storage);

    let registered = registry.register_definition(definition)?;
    let rendered = serde_json::to_string_pretty(&serde_json::json!({
        "object_id": registered.object_id,
        "object": registered.object.to_wire_json(),
        "messages": registered.messages,
    }))?;
    println!("{rendered}");

    registry.close()?;
    Ok(())
}
