// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

//! Adapters for the external recon binaries.
//!
//! Each adapter builds the command line from the `ScanConfig` options, runs
//! the binary via [`CommandTool`] and parses its output into the payload of
//! its category.

mod base;
mod gobuster;
mod httpx;
mod nmap;
mod nuclei;
mod subfinder;

use std::{collections::HashMap, path::PathBuf, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::scanner::Scanner;

pub use base::{CommandTool, comma_separated, parse_lines, sanitize_target, web_targets};
pub use gobuster::Gobuster;
pub use httpx::Httpx;
pub use nmap::Nmap;
pub use nuclei::Nuclei;
pub use subfinder::{Subfinder, is_valid_domain};

/// Names of the bundled tools.
pub const DEFAULT_TOOLS: [&str; 5] = [
    Subfinder::NAME,
    Nmap::NAME,
    Httpx::NAME,
    Gobuster::NAME,
    Nuclei::NAME,
];

/// Binary locations per tool name.
///
/// Tools without an entry are looked up in `PATH`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolPaths(HashMap<String, PathBuf>);

impl ToolPaths {
    pub fn with_program(mut self, name: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        self.0.insert(name.into(), program.into());
        self
    }

    pub fn program(&self, name: &str) -> PathBuf {
        self.0
            .get(name)
            .cloned()
            .unwrap_or_else(|| PathBuf::from(name))
    }
}

/// Creates all bundled adapters.
pub fn default_tools(paths: &ToolPaths) -> Vec<Arc<dyn Scanner>> {
    vec![
        Arc::new(Subfinder::with_program(paths.program(Subfinder::NAME))),
        Arc::new(Nmap::with_program(paths.program(Nmap::NAME))),
        Arc::new(Httpx::with_program(paths.program(Httpx::NAME))),
        Arc::new(Gobuster::with_program(paths.program(Gobuster::NAME))),
        Arc::new(Nuclei::with_program(paths.program(Nuclei::NAME))),
    ]
}

#[cfg(test)]
pub(crate) fn parent_result(
    scanner: &str,
    data: crate::models::ScanData,
) -> crate::models::ScanResult {
    use crate::models::{ScanCategory, ScanData, ScanResult, Timing};

    let category = match data {
        ScanData::Subdomain(_) => ScanCategory::Subdomain,
        ScanData::Port(_) => ScanCategory::Port,
        ScanData::WebTech(_) => ScanCategory::WebTech,
        ScanData::WebPath(_) => ScanCategory::WebPath,
        ScanData::Vulnerability(_) => ScanCategory::Vulnerability,
    };
    let now = chrono::Utc::now();
    let timing = Timing {
        start_time: now,
        end_time: now,
        duration: std::time::Duration::ZERO,
    };
    ScanResult::completed(scanner, category, "example.com", timing, data)
}
