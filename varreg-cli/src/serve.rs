//! `varreg serve` - run the HTTP service.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};

use varreg::RegistryConfig;
use varreg_server::build_state;

pub const SERVE_CMD: &str = "serve";

pub fn create_serve_cli() -> Command {
    crate::sequence_args(
        Command::new(SERVE_CMD)
            .about("Serve the variation registry over HTTP.")
            .arg(
                Arg::new("host")
                    .long("host")
                    .default_value("127.0.0.1")
                    .help("Bind address"),
            )
            .arg(
                Arg::new("port")
                    .long("port")
                    .value_parser(clap::value_parser!(u16))
                    .default_value("8000")
                    .help("Bind port"),
            ),
    )
}

pub fn run_serve(matches: &ArgMatches) -> Result<()> {
    let host = matches
        .get_one::<String>("host")
        .map(String::as_str)
        .unwrap_or("127.0.0.1");
    let port = *matches.get_one::<u16>("port").unwrap_or(&8000);
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid bind address {host}:{port}"))?;

    let config = RegistryConfig::from_env();
    let repo = Arc::new(crate::load_repository(matches)?);
    let (state, worker) = build_state(config, repo)?;

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(varreg_server::serve(addr, state));

    if let Some(worker) = worker {
        worker.stop();
    }
    result
}
