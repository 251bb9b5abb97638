// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

//! Executes a `ScanPipeline` stage by stage.
//!
//! Stages run in declaration order. Before a stage starts its dependencies
//! are checked against the results accumulated so far, a dependency is met
//! when a scanner of that name completed earlier. Every scanner invocation
//! gets the results of earlier stages as parent results.

use std::{collections::HashSet, time::Duration};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::models::{ScanConfig, ScanPipeline, ScanResult, ScanStage, TOOL_OPTION};

use super::{Error, ExecuteError, PipelineError, ScanManager};

/// Timeout of each scanner within a pipeline when nothing else is configured.
pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Decides which timeout is placed into the configs of pipeline scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageTimeout {
    /// Every scanner gets this timeout, `ScanPipeline::timeout` is ignored.
    Fixed(Duration),
    /// Uses `ScanPipeline::timeout`, absent means the scanner default.
    Pipeline,
}

impl Default for StageTimeout {
    fn default() -> Self {
        Self::Fixed(DEFAULT_STAGE_TIMEOUT)
    }
}

impl StageTimeout {
    pub fn resolve(&self, pipeline: &ScanPipeline) -> Duration {
        match self {
            StageTimeout::Fixed(timeout) => *timeout,
            StageTimeout::Pipeline => pipeline.timeout.unwrap_or_default(),
        }
    }
}

/// Returns true if every name in `depends_on` belongs to a completed
/// result.
pub fn are_dependencies_met(depends_on: &[String], results: &[ScanResult]) -> bool {
    missing_dependencies(depends_on, results).is_empty()
}

fn missing_dependencies(depends_on: &[String], results: &[ScanResult]) -> Vec<String> {
    depends_on
        .iter()
        .filter(|name| {
            !results
                .iter()
                .any(|r| r.is_completed() && &r.scanner_name == *name)
        })
        .cloned()
        .collect()
}

/// Rejects pipelines that can never succeed before anything is executed.
///
/// A dependency must name a scanner of an earlier stage. Stages without
/// scanners are accepted and produce no results.
fn check_pipeline(pipeline: &ScanPipeline) -> Result<(), Error> {
    // TODO: build the stage dependency graph and reject cycles with
    // `Error::CircularDependency` once stages may be reordered.
    let mut scheduled: HashSet<&str> = HashSet::new();
    for stage in &pipeline.stages {
        let missing: Vec<String> = stage
            .depends_on
            .iter()
            .filter(|name| !scheduled.contains(name.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(Error::StageDependencyNotMet {
                stage: stage.name.clone(),
                missing,
            });
        }
        scheduled.extend(stage.scanner_names.iter().map(String::as_str));
    }
    Ok(())
}

/// Outcome of a single stage: produced results and the first error.
type StageOutcome = (Vec<ScanResult>, Option<Error>);

struct StageContext<'a> {
    pipeline: &'a ScanPipeline,
    stage: &'a ScanStage,
    timeout: Duration,
}

impl StageContext<'_> {
    fn config(&self, scanner_name: &str, parent_results: Vec<ScanResult>) -> ScanConfig {
        let mut options = self.stage.options.clone();
        options.insert(TOOL_OPTION.to_string(), scanner_name.to_string());
        ScanConfig {
            project_id: self.pipeline.project_id,
            target: self.pipeline.target.clone(),
            options,
            timeout: self.timeout,
            parent_results,
        }
    }
}

impl ScanManager {
    /// Executes the pipeline.
    ///
    /// Returns all results in execution order. When the pipeline stops early
    /// the `PipelineError` carries the results accumulated so far.
    pub async fn execute_pipeline(
        &self,
        cancel: &CancellationToken,
        pipeline: &ScanPipeline,
    ) -> Result<Vec<ScanResult>, PipelineError> {
        let mut results: Vec<ScanResult> = Vec::new();
        let stop = |error: Error, results: Vec<ScanResult>| PipelineError {
            pipeline: pipeline.name.clone(),
            error,
            results,
        };
        if let Err(error) = check_pipeline(pipeline) {
            return Err(stop(error, results));
        }

        let timeout = self.stage_timeout.resolve(pipeline);
        tracing::info!(
            pipeline = %pipeline.name,
            target = %pipeline.target,
            stages = pipeline.stages.len(),
            "starting pipeline"
        );
        for stage in &pipeline.stages {
            let missing = missing_dependencies(&stage.depends_on, &results);
            if !missing.is_empty() {
                let error = Error::StageDependencyNotMet {
                    stage: stage.name.clone(),
                    missing,
                };
                return Err(stop(error, results));
            }

            let ctx = StageContext {
                pipeline,
                stage,
                timeout,
            };
            tracing::trace!(
                stage = %stage.name,
                scanners = ?stage.scanner_names,
                parallel = stage.parallel,
                "starting stage"
            );
            let (stage_results, stage_error) = if stage.parallel {
                self.run_parallel(cancel, &ctx, &results).await
            } else {
                self.run_serial(cancel, &ctx, &results).await
            };
            tracing::trace!(
                stage = %stage.name,
                results = stage_results.len(),
                "stage finished"
            );
            results.extend(stage_results);

            if let Some(error) = stage_error {
                if !pipeline.continue_on_error {
                    let error = Error::StageExecutionFailed {
                        stage: stage.name.clone(),
                        source: Box::new(error),
                    };
                    return Err(stop(error, results));
                }
                tracing::warn!(
                    pipeline = %pipeline.name,
                    stage = %stage.name,
                    %error,
                    "stage failed, continuing"
                );
            }
        }
        tracing::info!(
            pipeline = %pipeline.name,
            results = results.len(),
            "pipeline finished"
        );
        Ok(results)
    }

    /// Runs the scanners one after another, the first error stops the stage.
    ///
    /// Each scanner sees the results of the scanners before it in the same
    /// stage. The result of the failed attempt is not part of the outcome.
    async fn run_serial(
        &self,
        cancel: &CancellationToken,
        ctx: &StageContext<'_>,
        previous: &[ScanResult],
    ) -> StageOutcome {
        let mut stage_results: Vec<ScanResult> =
            Vec::with_capacity(ctx.stage.scanner_names.len());
        for name in &ctx.stage.scanner_names {
            let parents = previous.iter().chain(&stage_results).cloned().collect();
            match self.execute_scan(cancel, ctx.config(name, parents)).await {
                Ok(result) => stage_results.push(result),
                Err(ExecuteError { error, .. }) => return (stage_results, Some(error)),
            }
        }
        (stage_results, None)
    }

    /// Runs all scanners concurrently and waits for all of them.
    ///
    /// Results are collected in completion order, failed attempts included.
    /// The first error in completion order becomes the stage error.
    async fn run_parallel(
        &self,
        cancel: &CancellationToken,
        ctx: &StageContext<'_>,
        previous: &[ScanResult],
    ) -> StageOutcome {
        let mut tasks = JoinSet::new();
        for name in &ctx.stage.scanner_names {
            let manager = self.clone();
            let cancel = cancel.clone();
            let config = ctx.config(name, previous.to_vec());
            tasks.spawn(async move { manager.execute_scan(&cancel, config).await });
        }

        let mut stage_results = Vec::with_capacity(tasks.len());
        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(result)) => stage_results.push(result),
                Ok(Err(ExecuteError { error, result })) => {
                    stage_results.extend(result);
                    first_error.get_or_insert(error);
                }
                Err(e) => {
                    first_error.get_or_insert(Error::ScanFailed {
                        scanner: ctx.stage.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        (stage_results, first_error)
    }
}
