// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::time::Duration;

use crate::models::{ProjectId, ScanResult};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
/// Errors of the scan engine and the scanners
pub enum Error {
    #[error("invalid scan configuration: {0}")]
    /// The configuration is malformed
    InvalidConfig(String),
    #[error("invalid scan target: {0:?}")]
    /// The target is empty or has the wrong format for the scanner
    InvalidTarget(String),
    #[error("invalid project id: {0}")]
    /// The project id is zero
    InvalidProjectId(ProjectId),
    #[error("invalid timeout: {0}")]
    /// A timeout could not be parsed or is out of range
    InvalidTimeout(String),

    #[error("scanner '{0}' not found")]
    /// No scanner is registered under that name
    ScannerNotFound(String),
    #[error("scanner '{0}' is not available")]
    /// The scanner is registered but its tool cannot be used
    ScannerNotAvailable(String),
    #[error("scanner '{0}' is already registered")]
    /// A scanner with the same name is already registered
    ScannerAlreadyExists(String),
    #[error("no tool specified, the `tool` option selects the scanner")]
    /// The `tool` option is missing
    NoToolSpecified,

    #[error("{scanner} timed out after {timeout:?}")]
    /// The scan did not finish in time
    ScanTimeout { scanner: String, timeout: Duration },
    #[error("{scanner} was cancelled")]
    /// The scan was cancelled by the caller
    ScanCancelled { scanner: String },
    #[error("{scanner} failed: {reason}")]
    /// The scan failed, e.g. the tool exited with an error
    ScanFailed { scanner: String, reason: String },
    #[error("{scanner} returned unreadable output: {reason}")]
    /// The output of the tool could not be parsed
    InvalidResult { scanner: String, reason: String },

    #[error("invalid pipeline: {0}")]
    /// The pipeline is malformed
    PipelineInvalid(String),
    #[error("dependencies {missing:?} of stage '{stage}' are not met")]
    /// A stage depends on scanners that did not complete before it
    StageDependencyNotMet { stage: String, missing: Vec<String> },
    #[error("stage '{stage}' failed: {source}")]
    /// A stage failed and the pipeline does not continue on error
    StageExecutionFailed {
        stage: String,
        #[source]
        source: Box<Error>,
    },
    #[error("circular dependency between stages {0:?}")]
    /// Reserved for cycle detection, which is not performed
    CircularDependency(Vec<String>),

    #[error("expected {expected} data but found {found}")]
    /// The payload is of a different variant than requested
    DataConversionFailed {
        expected: &'static str,
        found: &'static str,
    },
    #[error("{scanner} produced invalid scan data: {reason}")]
    /// The payload does not fit the category of the scanner
    InvalidScanResult { scanner: String, reason: String },
}

/// Returned by `ScanManager::execute_scan`.
///
/// When the scanner itself failed the attempt is still recorded in
/// `result`. Lookup and validation errors happen before an attempt exists
/// and carry no result.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("{error}")]
pub struct ExecuteError {
    #[source]
    pub error: Error,
    pub result: Option<ScanResult>,
}

impl From<Error> for ExecuteError {
    fn from(error: Error) -> Self {
        Self {
            error,
            result: None,
        }
    }
}

/// Returned by `ScanManager::execute_pipeline`.
///
/// Contains the results accumulated until the pipeline stopped.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("pipeline '{pipeline}' stopped: {error}")]
pub struct PipelineError {
    pub pipeline: String,
    #[source]
    pub error: Error,
    pub results: Vec<ScanResult>,
}
