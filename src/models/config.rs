// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::{collections::HashMap, time::Duration};

use serde::{Deserialize, Serialize};

use super::{ScanCategory, ScanResult};

/// Identifies the project a scan belongs to. Zero is never valid.
pub type ProjectId = u64;

/// Option key used to select the scanner in `ScanManager::execute_scan`.
pub const TOOL_OPTION: &str = "tool";

/// Input of a single scan invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    pub project_id: ProjectId,
    /// Tool specific target, e.g. a domain or an URL
    pub target: String,
    /// Free-form tool options, also carries the `tool` selector
    #[serde(default)]
    pub options: HashMap<String, String>,
    /// Zero means the scanner uses its own default
    #[serde(default, with = "crate::utils::duration")]
    pub timeout: Duration,
    /// Results of earlier pipeline stages
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parent_results: Vec<ScanResult>,
}

impl ScanConfig {
    pub fn new(project_id: ProjectId, target: impl Into<String>) -> Self {
        Self {
            project_id,
            target: target.into(),
            ..Default::default()
        }
    }

    /// Sets the scanner to run.
    pub fn with_tool(self, name: impl Into<String>) -> Self {
        self.with_option(TOOL_OPTION, name)
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_parent_results(mut self, parent_results: Vec<ScanResult>) -> Self {
        self.parent_results = parent_results;
        self
    }

    /// The scanner selected via the `tool` option.
    pub fn tool(&self) -> Option<&str> {
        self.options.get(TOOL_OPTION).map(|x| x as &str)
    }

    /// Returns the option value, `None` when absent or empty.
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options
            .get(key)
            .map(|x| x as &str)
            .filter(|x| !x.is_empty())
    }

    /// Returns true if the option is set to `true`.
    pub fn flag(&self, key: &str) -> bool {
        self.option(key) == Some("true")
    }

    /// Iterates over the parent results of the given category in order.
    pub fn parents_of(&self, category: ScanCategory) -> impl Iterator<Item = &ScanResult> {
        self.parent_results
            .iter()
            .filter(move |r| r.category == category)
    }
}
