// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::{collections::HashMap, time::Duration};

use serde::{Deserialize, Serialize};

use super::ProjectId;

/// A multi stage scan against a single target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanPipeline {
    pub name: String,
    #[serde(default)]
    pub project_id: ProjectId,
    #[serde(default)]
    pub target: String,
    /// Executed in declaration order
    #[serde(default)]
    pub stages: Vec<ScanStage>,
    /// When false the first failing stage aborts the pipeline
    #[serde(default)]
    pub continue_on_error: bool,
    /// Per scanner timeout, only used with `StageTimeout::Pipeline`
    #[serde(
        default,
        with = "crate::utils::duration::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout: Option<Duration>,
}

/// A group of scanners executed together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStage {
    /// Descriptive label, not used for dependency matching
    pub name: String,
    pub scanner_names: Vec<String>,
    /// Merged into the options of each scanner of this stage
    #[serde(default)]
    pub options: HashMap<String, String>,
    /// Run the scanners of this stage concurrently
    #[serde(default)]
    pub parallel: bool,
    /// Scanner names, not stage names, that must have completed earlier
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl ScanPipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Parameterizes the pipeline for a project and target.
    pub fn for_target(mut self, project_id: ProjectId, target: impl Into<String>) -> Self {
        self.project_id = project_id;
        self.target = target.into();
        self
    }

    pub fn with_stage(mut self, stage: ScanStage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl ScanStage {
    pub fn new<I, S>(name: impl Into<String>, scanner_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            scanner_names: scanner_names.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn parallel(mut self) -> Self {
        self.parallel = true;
        self
    }

    pub fn depends_on<I, S>(mut self, scanner_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on
            .extend(scanner_names.into_iter().map(Into::into));
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn with_options<I, K, V>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.options
            .extend(options.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_toml() {
        let pipeline: ScanPipeline = toml::from_str(
            r#"
name = "custom"
continue_on_error = true
timeout = "10min"

[[stages]]
name = "discovery"
scanner_names = ["subfinder"]

[[stages]]
name = "web"
scanner_names = ["httpx", "nmap"]
parallel = true
depends_on = ["subfinder"]
options = { detect_tech = "true" }
"#,
        )
        .unwrap();
        assert_eq!(pipeline.project_id, 0);
        assert_eq!(pipeline.timeout, Some(Duration::from_secs(600)));
        assert_eq!(pipeline.stages.len(), 2);
        assert!(pipeline.stages[1].parallel);
        assert_eq!(pipeline.stages[1].depends_on, vec!["subfinder"]);
        assert_eq!(
            pipeline.stages[1].options.get("detect_tech").map(|x| x as &str),
            Some("true")
        );
    }
}
