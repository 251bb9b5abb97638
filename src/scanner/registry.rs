// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::{collections::BTreeMap, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    models::{ProjectId, ScanCategory, ScanPipeline},
    tools::{ToolPaths, default_tools},
};

use super::{Error, ScanManager, Scanner, templates};

/// Description of a registered scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannerInfo {
    pub name: String,
    pub category: ScanCategory,
    pub available: bool,
}

impl From<&dyn Scanner> for ScannerInfo {
    fn from(scanner: &dyn Scanner) -> Self {
        Self {
            name: scanner.name().to_string(),
            category: scanner.category(),
            available: scanner.is_available(),
        }
    }
}

/// Facade bundling a `ScanManager` with the predefined pipelines.
#[derive(Clone, Default)]
pub struct ScannerRegistry {
    manager: ScanManager,
}

impl ScannerRegistry {
    pub fn new(manager: ScanManager) -> Self {
        Self { manager }
    }

    /// The shared manager, use it to execute scans and pipelines.
    pub fn manager(&self) -> &ScanManager {
        &self.manager
    }

    pub async fn register_scanner(&self, scanner: Arc<dyn Scanner>) -> Result<(), Error> {
        self.manager.register_scanner(scanner).await
    }

    /// Registers the bundled tool adapters.
    ///
    /// Tools whose binary is missing are registered as unavailable.
    pub async fn register_default_tools(&self, paths: &ToolPaths) -> Result<(), Error> {
        for tool in default_tools(paths) {
            self.manager.register_scanner(tool).await?;
        }
        Ok(())
    }

    /// Available scanners grouped by category.
    pub async fn available_tools(&self) -> BTreeMap<ScanCategory, Vec<ScannerInfo>> {
        let mut tools: BTreeMap<ScanCategory, Vec<ScannerInfo>> = BTreeMap::new();
        for scanner in self.manager.list_scanners().await {
            tools
                .entry(scanner.category())
                .or_default()
                .push(ScannerInfo::from(scanner.as_ref()));
        }
        tools
    }

    /// Creates a predefined pipeline for the target.
    pub fn pipeline(
        &self,
        name: &str,
        project_id: ProjectId,
        target: &str,
    ) -> Result<ScanPipeline, Error> {
        templates::pipeline(name)
            .map(|p| p.for_target(project_id, target))
            .ok_or_else(|| Error::PipelineInvalid(format!("unknown pipeline template '{name}'")))
    }
}
