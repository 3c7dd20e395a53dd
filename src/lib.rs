pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod export_cmd;
pub mod extract;
pub mod flatten;
pub mod io_utils;
pub mod locate;
pub mod map_cmd;
pub mod mapping;
pub mod preview;
pub mod rows;
pub mod source;
pub mod sync;
pub mod table;
pub mod value;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

use crate::cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("field_mapper", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Inspect(args) => preview::execute(&args),
        Commands::Map(args) => map_cmd::execute(&args),
        Commands::Export(args) => export_cmd::execute(&args),
        Commands::Rows(args) => rows::execute(&args),
    }
}
