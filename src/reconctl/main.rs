// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

//! `reconctl` runs the bundled recon tools, alone or as a pipeline, and
//! prints the results as JSON.

mod config;
mod error;

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use clap::{ArgAction, Parser, Subcommand};
use cyberedge::{
    models::{ProjectId, ScanConfig, ScanPipeline},
    scanner::{Error, ScanManager, ScannerRegistry, pipeline_names},
    utils::duration,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use config::Config;
pub use error::CliError;

#[derive(Parser)]
#[command(name = "reconctl", version, about = "Runs recon scanners and scan pipelines.")]
struct Cli {
    /// Print more details while running, twice for trace output
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Config file, defaults to the user and then the system config
    #[arg(short, long, env = "RECONCTL_CONFIG", global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Prints the available tools grouped by category.
    Tools,
    /// Prints the names of the predefined pipelines.
    Pipelines,
    /// Runs a predefined pipeline or a pipeline from a file.
    Pipeline {
        /// Name of a predefined pipeline
        #[arg(required_unless_present = "file")]
        name: Option<String>,
        /// TOML or JSON pipeline definition
        #[arg(short, long, conflicts_with = "name")]
        file: Option<PathBuf>,
        #[arg(short, long)]
        project: ProjectId,
        #[arg(short, long)]
        target: String,
    },
    /// Runs a single tool.
    Scan {
        tool: String,
        #[arg(short, long)]
        project: ProjectId,
        #[arg(short, long)]
        target: String,
        /// Tool option as key=value, may be repeated
        #[arg(short = 'o', long = "option", value_parser = parse_option)]
        options: Vec<(String, String)>,
        /// e.g. 30s or 5min, defaults to the timeout of the tool
        #[arg(long)]
        timeout: Option<String>,
    },
}

fn parse_option(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{s}'"))
}

fn parse_timeout(timeout: &str) -> Result<Duration, Error> {
    duration::parse(timeout).map_err(|reason| Error::InvalidTimeout(format!("{timeout}: {reason}")))
}

fn load_pipeline(path: &Path) -> Result<ScanPipeline, CliError> {
    let content = std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_owned(),
        source,
    })?;
    let parsed = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&content).map_err(|e| e.to_string()),
        _ => toml::from_str(&content).map_err(|e| e.to_string()),
    };
    parsed.map_err(|reason| CliError::PipelineFile {
        path: path.to_owned(),
        reason,
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling running scans");
            token.cancel();
        }
    });
    cancel
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref())?;
    config.log.init(cli.verbose);
    tracing::trace!("effective config:\n{config}");

    let registry = ScannerRegistry::new(
        ScanManager::new().with_stage_timeout(config.pipeline.stage_timeout()),
    );
    registry.register_default_tools(&config.tools).await?;

    match cli.command {
        Command::Tools => print_json(&registry.available_tools().await),
        Command::Pipelines => print_json(&pipeline_names()),
        Command::Pipeline {
            name,
            file,
            project,
            target,
        } => {
            let mut pipeline = match (file, name) {
                (Some(file), _) => load_pipeline(&file)?.for_target(project, target),
                (None, Some(name)) => registry.pipeline(&name, project, &target)?,
                (None, None) => {
                    return Err(Error::PipelineInvalid("no pipeline given".to_string()).into());
                }
            };
            if let Some(continue_on_error) = config.pipeline.continue_on_error {
                pipeline.continue_on_error = continue_on_error;
            }
            let cancel = cancel_on_ctrl_c();
            match registry.manager().execute_pipeline(&cancel, &pipeline).await {
                Ok(results) => print_json(&results),
                Err(error) => {
                    print_json(&error.results)?;
                    Err(error.into())
                }
            }
        }
        Command::Scan {
            tool,
            project,
            target,
            options,
            timeout,
        } => {
            let mut scan = ScanConfig::new(project, target).with_tool(tool);
            for (key, value) in options {
                scan = scan.with_option(key, value);
            }
            if let Some(timeout) = timeout {
                scan = scan.with_timeout(parse_timeout(&timeout)?);
            }
            let cancel = cancel_on_ctrl_c();
            match registry.manager().execute_scan(&cancel, scan).await {
                Ok(result) => print_json(&result),
                Err(error) => {
                    if let Some(result) = &error.result {
                        print_json(result)?;
                    }
                    Err(error.into())
                }
            }
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        tracing::error!("{e}");
        eprintln!("reconctl: {e}");
        std::process::exit(1);
    }
}
