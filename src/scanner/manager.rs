// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::{collections::HashMap, panic::AssertUnwindSafe, sync::Arc, time::Instant};

use chrono::Utc;
use futures::FutureExt;
use itertools::Itertools;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::models::{ScanCategory, ScanConfig, ScanData, ScanResult, Timing};

use super::{Error, ExecuteError, Scanner, StageTimeout};

/// Keeps the registered scanners and dispatches scans to them.
///
/// Cloning is cheap, clones share the same scanners.
#[derive(Clone, Default)]
pub struct ScanManager {
    scanners: Arc<RwLock<HashMap<String, Arc<dyn Scanner>>>>,
    pub(super) stage_timeout: StageTimeout,
}

impl ScanManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per scanner timeout used within pipelines.
    pub fn with_stage_timeout(mut self, stage_timeout: StageTimeout) -> Self {
        self.stage_timeout = stage_timeout;
        self
    }

    /// Registers a scanner under its name.
    ///
    /// Unavailable scanners are registered as well, they are just not
    /// listed or dispatched to.
    pub async fn register_scanner(&self, scanner: Arc<dyn Scanner>) -> Result<(), Error> {
        let name = scanner.name().to_string();
        if name.is_empty() {
            return Err(Error::InvalidConfig(
                "scanner name must not be empty".to_string(),
            ));
        }
        let mut scanners = self.scanners.write().await;
        if scanners.contains_key(&name) {
            return Err(Error::ScannerAlreadyExists(name));
        }
        tracing::debug!(
            scanner = %name,
            category = %scanner.category(),
            available = scanner.is_available(),
            "registered scanner"
        );
        scanners.insert(name, scanner);
        Ok(())
    }

    /// Returns the scanner if it is registered and available.
    pub async fn get_scanner(&self, name: &str) -> Result<Arc<dyn Scanner>, Error> {
        let scanners = self.scanners.read().await;
        let scanner = scanners
            .get(name)
            .ok_or_else(|| Error::ScannerNotFound(name.to_string()))?;
        if !scanner.is_available() {
            return Err(Error::ScannerNotAvailable(name.to_string()));
        }
        Ok(scanner.clone())
    }

    /// Returns all available scanners ordered by name.
    pub async fn list_scanners(&self) -> Vec<Arc<dyn Scanner>> {
        self.scanners
            .read()
            .await
            .values()
            .filter(|s| s.is_available())
            .cloned()
            .sorted_by(|a, b| a.name().cmp(b.name()))
            .collect()
    }

    /// Returns the available scanners of a category ordered by name.
    pub async fn list_by_category(&self, category: ScanCategory) -> Vec<Arc<dyn Scanner>> {
        self.list_scanners()
            .await
            .into_iter()
            .filter(|s| s.category() == category)
            .collect()
    }

    /// Returns all registered scanners including unavailable ones, ordered
    /// by name.
    pub async fn registered_scanners(&self) -> Vec<Arc<dyn Scanner>> {
        self.scanners
            .read()
            .await
            .values()
            .cloned()
            .sorted_by(|a, b| a.name().cmp(b.name()))
            .collect()
    }

    /// Amount of registered scanners including unavailable ones.
    pub async fn len(&self) -> usize {
        self.scanners.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Runs the scanner selected by the `tool` option.
    ///
    /// Lookup and validation errors are returned without a result. Once the
    /// scanner has been invoked every outcome produces a `ScanResult`, on
    /// failure it is carried inside of the `ExecuteError`.
    ///
    /// A non zero `config.timeout` bounds the scan, an exceeded timeout
    /// results in `ScanStatus::Timeout`. Cancelling `cancel` stops the scan
    /// and results in `ScanStatus::Failed`.
    pub async fn execute_scan(
        &self,
        cancel: &CancellationToken,
        config: ScanConfig,
    ) -> Result<ScanResult, ExecuteError> {
        let name = config.tool().ok_or(Error::NoToolSpecified)?;
        let scanner = self.get_scanner(name).await?;
        scanner.validate_config(&config)?;

        let name = scanner.name();
        let category = scanner.category();
        tracing::debug!(scanner = name, target = %config.target, "starting scan");
        let started = Instant::now();
        let start_time = Utc::now();
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::ScanCancelled {
                scanner: name.to_string(),
            }),
            outcome = run_bounded(scanner.as_ref(), &config) => outcome,
        };
        let timing = Timing {
            start_time,
            end_time: Utc::now(),
            duration: started.elapsed(),
        };

        let outcome = outcome.and_then(|data| {
            if category.accepts(&data) {
                Ok(data)
            } else {
                Err(Error::InvalidScanResult {
                    scanner: name.to_string(),
                    reason: format!("{} data from a {category} scanner", data.kind()),
                })
            }
        });

        match outcome {
            Ok(data) => {
                tracing::info!(
                    scanner = name,
                    target = %config.target,
                    elapsed = ?timing.duration,
                    "scan completed"
                );
                Ok(ScanResult::completed(
                    name,
                    category,
                    config.target.clone(),
                    timing,
                    data,
                ))
            }
            Err(error) => {
                tracing::warn!(
                    scanner = name,
                    target = %config.target,
                    elapsed = ?timing.duration,
                    %error,
                    "scan unsuccessful"
                );
                let result =
                    ScanResult::unsuccessful(name, category, config.target.clone(), timing, &error);
                Err(ExecuteError {
                    error,
                    result: Some(result),
                })
            }
        }
    }
}

/// Invokes the scanner, bounded by the configured timeout.
///
/// A panicking scanner is reported as failed scan.
async fn run_bounded(scanner: &dyn Scanner, config: &ScanConfig) -> Result<ScanData, Error> {
    let scan = AssertUnwindSafe(scanner.scan(config)).catch_unwind();
    let outcome = if config.timeout.is_zero() {
        scan.await
    } else {
        tokio::time::timeout(config.timeout, scan)
            .await
            .map_err(|_| Error::ScanTimeout {
                scanner: scanner.name().to_string(),
                timeout: config.timeout,
            })?
    };
    outcome.map_err(|_| Error::ScanFailed {
        scanner: scanner.name().to_string(),
        reason: "scanner panicked".to_string(),
    })?
}
