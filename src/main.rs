//! Command-line tool generating OpenAPI documents from annotated Rust projects.
//!
//! # Usage
//!
//! ```bash
//! openapi-from-annotations generate [OPTIONS] <PROJECT_PATH>
//! openapi-from-annotations show <ARTIFACT>
//! ```
//!
//! # Examples
//!
//! Generate YAML into the configured output directory, or stdout:
//! ```bash
//! openapi-from-annotations generate ./my-api -c ./my-api/openapi.yaml
//! ```
//!
//! Generate JSON from a route manifest:
//! ```bash
//! openapi-from-annotations generate ./my-api -r ./my-api/routes.yaml -f json -o public/openapi.json
//! ```
//!
//! Print a generated document:
//! ```bash
//! openapi-from-annotations show public/openapi.json -v
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use openapi_from_annotations::cli;

fn main() -> Result<()> {
    // The verbose flag decides the log level, so parse before the logger exists
    let parsed = cli::CliArgs::parse();

    let log_level = if parsed.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("OpenAPI generator starting...");

    let args = cli::parse_args_from_parsed(parsed)?;
    cli::run(args)?;

    Ok(())
}
