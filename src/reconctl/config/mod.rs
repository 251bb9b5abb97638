// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

pub mod logging;

use std::{
    fmt::{self, Display, Formatter},
    path::Path,
    time::Duration,
};

use cyberedge::{
    scanner::{DEFAULT_STAGE_TIMEOUT, StageTimeout},
    tools::ToolPaths,
};
use serde::{Deserialize, Serialize};

use crate::CliError;
use logging::Logging;

const ETC_CONFIG: &str = "/etc/cyberedge/reconctl.toml";

/// The `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Pipeline {
    /// Timeout of each scanner within a pipeline
    #[serde(with = "cyberedge::utils::duration")]
    pub stage_timeout: Duration,
    /// Use the timeout of the pipeline instead of `stage_timeout`
    pub honor_pipeline_timeout: bool,
    /// Overrides `continue_on_error` of the executed pipelines
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continue_on_error: Option<bool>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            stage_timeout: DEFAULT_STAGE_TIMEOUT,
            honor_pipeline_timeout: false,
            continue_on_error: None,
        }
    }
}

impl Pipeline {
    pub fn stage_timeout(&self) -> StageTimeout {
        if self.honor_pipeline_timeout {
            StageTimeout::Pipeline
        } else {
            StageTimeout::Fixed(self.stage_timeout)
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub log: Logging,
    pub pipeline: Pipeline,
    /// Program path per tool name
    pub tools: ToolPaths,
}

impl Display for Config {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", toml::to_string_pretty(self).unwrap_or_default())
    }
}

impl Config {
    fn load_etc() -> Option<Self> {
        let config = std::fs::read_to_string(ETC_CONFIG).ok()?;
        toml::from_str(&config).ok()
    }

    fn load_user() -> Option<Self> {
        let home = std::env::var("HOME").ok()?;
        let path = format!("{home}/.config/cyberedge/reconctl.toml");
        let config = std::fs::read_to_string(path).ok()?;
        toml::from_str(&config).ok()
    }

    /// Loads an explicitly given file, unlike the default locations a broken
    /// file is an error.
    pub fn from_file(path: &Path) -> Result<Self, CliError> {
        tracing::debug!("loading config from {}", path.display());
        let config = std::fs::read_to_string(path).map_err(|source| CliError::Read {
            path: path.to_owned(),
            source,
        })?;
        toml::from_str(&config).map_err(|source| CliError::Config {
            path: path.to_owned(),
            source,
        })
    }

    /// Uses `path` when given, otherwise the user config and then the system
    /// config. Without any file the defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self, CliError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::load_user()
                .or_else(Self::load_etc)
                .unwrap_or_default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use tracing::Level;

    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(
            config.pipeline.stage_timeout(),
            StageTimeout::Fixed(DEFAULT_STAGE_TIMEOUT)
        );
        assert_eq!(config.tools.program("nmap"), PathBuf::from("nmap"));
        let parsed: Config = toml::from_str("").unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn parses_all_sections() {
        let config: Config = toml::from_str(
            r#"
[log]
level = "DEBUG"

[log.additional]
"cyberedge::tools" = "TRACE"

[pipeline]
stage_timeout = "10min"
continue_on_error = true

[tools]
subfinder = "/opt/pd/subfinder"
"#,
        )
        .unwrap();
        assert_eq!(Level::from(config.log.level), Level::DEBUG);
        assert_eq!(
            config.pipeline.stage_timeout(),
            StageTimeout::Fixed(Duration::from_secs(600))
        );
        assert_eq!(config.pipeline.continue_on_error, Some(true));
        assert_eq!(
            config.tools.program("subfinder"),
            PathBuf::from("/opt/pd/subfinder")
        );
    }

    #[test]
    fn pipeline_timeout_policy() {
        let config: Config = toml::from_str("[pipeline]\nhonor_pipeline_timeout = true\n").unwrap();
        assert_eq!(config.pipeline.stage_timeout(), StageTimeout::Pipeline);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = Config::load(Some(Path::new("/nonexistent/reconctl.toml"))).unwrap_err();
        assert!(matches!(err, CliError::Read { .. }));
    }
}
