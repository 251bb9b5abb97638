// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::path::PathBuf;

use cyberedge::scanner::{Error, ExecuteError, PipelineError};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("unable to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Config {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid pipeline file {path}: {reason}")]
    PipelineFile { path: PathBuf, reason: String },
    #[error("{0}")]
    Scanner(#[from] Error),
    #[error("{0}")]
    Execute(#[from] ExecuteError),
    #[error("{0}")]
    Pipeline(#[from] PipelineError),
    #[error("unable to write output: {0}")]
    Output(#[from] serde_json::Error),
}
