// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

//! Overview of the structure of this module: A `Scanner` wraps a single
//! recon tool and turns a `ScanConfig` into typed `ScanData`. Scanners are
//! registered by name in the `ScanManager`, which is the single instance
//! dispatching scans during a run. The manager measures each attempt,
//! enforces timeouts and cancellation and wraps the outcome into a
//! `ScanResult`. On top of that it executes a `ScanPipeline` stage by stage
//! (see `pipeline`), feeding the results of earlier stages into later ones.
//! The `ScannerRegistry` is a facade bundling the manager with the
//! predefined pipelines.

mod error;
mod manager;
mod pipeline;
mod registry;
mod templates;

pub use error::{Error, ExecuteError, PipelineError};
pub use manager::ScanManager;
pub use pipeline::{DEFAULT_STAGE_TIMEOUT, StageTimeout, are_dependencies_met};
pub use registry::{ScannerInfo, ScannerRegistry};
pub use templates::{default_pipelines, pipeline, pipeline_names};

use async_trait::async_trait;

use crate::models::{ScanCategory, ScanConfig, ScanData};

/// A recon tool that can be invoked by the `ScanManager`.
///
/// Implementations must be safe to use from concurrent pipeline stages.
#[async_trait]
pub trait Scanner: Send + Sync {
    /// Unique name, used as the `tool` option and for stage dependencies.
    fn name(&self) -> &str;

    fn category(&self) -> ScanCategory;

    /// Returns false when the underlying tool cannot be used, e.g. because
    /// the binary is missing.
    fn is_available(&self) -> bool;

    /// Checks the configuration before a scan is started.
    fn validate_config(&self, config: &ScanConfig) -> Result<(), Error> {
        validate_base(config)
    }

    /// Runs the scan.
    ///
    /// The returned future is dropped on timeout or cancellation, any
    /// spawned process must not outlive it.
    async fn scan(&self, config: &ScanConfig) -> Result<ScanData, Error>;
}

/// Validation shared by all scanners.
pub fn validate_base(config: &ScanConfig) -> Result<(), Error> {
    if config.project_id == 0 {
        return Err(Error::InvalidProjectId(config.project_id));
    }
    if config.target.trim().is_empty() {
        return Err(Error::InvalidTarget(config.target.clone()));
    }
    Ok(())
}

// This is a fake implementation of the Scanner trait and is only used for testing purposes.
// Tests using it from outside of the crate must be gated on `debug_assertions` as well.
#[cfg(debug_assertions)]
pub mod fake {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use super::*;
    use crate::models::{PortData, SubdomainData, VulnerabilityData, WebPathData, WebTechData};

    type ScanFn = Arc<Box<dyn Fn(&ScanConfig) -> Result<ScanData, Error> + Send + Sync + 'static>>;
    type ValidateFn = Arc<Box<dyn Fn(&ScanConfig) -> Result<(), Error> + Send + Sync + 'static>>;

    /// Returns an empty payload fitting to the category.
    pub fn empty_data(category: ScanCategory) -> ScanData {
        match category {
            ScanCategory::Subdomain => SubdomainData::default().into(),
            ScanCategory::Port | ScanCategory::Service => PortData::default().into(),
            ScanCategory::WebTech => WebTechData::default().into(),
            ScanCategory::WebPath => WebPathData::default().into(),
            ScanCategory::Vulnerability => VulnerabilityData::default().into(),
        }
    }

    /// Builds a `LambdaScanner`.
    ///
    /// Without further configuration the scanner is available and returns an
    /// empty payload of its category.
    pub struct LambdaScannerBuilder {
        name: String,
        category: ScanCategory,
        available: bool,
        delay: Duration,
        scan: ScanFn,
        validate: ValidateFn,
    }

    impl LambdaScannerBuilder {
        pub fn new(name: impl Into<String>, category: ScanCategory) -> Self {
            Self {
                name: name.into(),
                category,
                available: true,
                delay: Duration::ZERO,
                scan: Arc::new(Box::new(move |_| Ok(empty_data(category)))),
                validate: Arc::new(Box::new(validate_base)),
            }
        }

        pub fn unavailable(mut self) -> Self {
            self.available = false;
            self
        }

        /// Sleeps before the scan function is called.
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn with_scan<F>(mut self, f: F) -> Self
        where
            F: Fn(&ScanConfig) -> Result<ScanData, Error> + Send + Sync + 'static,
        {
            self.scan = Arc::new(Box::new(f));
            self
        }

        pub fn with_validate<F>(mut self, f: F) -> Self
        where
            F: Fn(&ScanConfig) -> Result<(), Error> + Send + Sync + 'static,
        {
            self.validate = Arc::new(Box::new(f));
            self
        }

        pub fn build(self) -> Arc<LambdaScanner> {
            Arc::new(LambdaScanner {
                name: self.name,
                category: self.category,
                available: self.available,
                delay: self.delay,
                scan: self.scan,
                validate: self.validate,
                calls: AtomicUsize::new(0),
                seen: std::sync::Mutex::new(Vec::new()),
            })
        }
    }

    pub struct LambdaScanner {
        name: String,
        category: ScanCategory,
        available: bool,
        delay: Duration,
        scan: ScanFn,
        validate: ValidateFn,
        calls: AtomicUsize,
        seen: std::sync::Mutex<Vec<ScanConfig>>,
    }

    impl LambdaScanner {
        /// How often `scan` was entered.
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// The configurations `scan` was called with.
        pub fn seen_configs(&self) -> Vec<ScanConfig> {
            self.seen.lock().map(|x| x.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl Scanner for LambdaScanner {
        fn name(&self) -> &str {
            &self.name
        }

        fn category(&self) -> ScanCategory {
            self.category
        }

        fn is_available(&self) -> bool {
            self.available
        }

        fn validate_config(&self, config: &ScanConfig) -> Result<(), Error> {
            (self.validate)(config)
        }

        async fn scan(&self, config: &ScanConfig) -> Result<ScanData, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(config.clone());
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            (self.scan)(config)
        }
    }
}
