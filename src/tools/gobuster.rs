// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;
use itertools::Itertools;
use lazy_regex::{Lazy, lazy_regex};
use regex::Regex;

use crate::{
    models::{ScanCategory, ScanConfig, ScanData, WebPathData, WebPathInfo},
    scanner::{Error, Scanner, validate_base},
};

use super::{CommandTool, comma_separated, parse_lines, web_targets};

const DEFAULT_WORDLIST: &str = "/usr/share/wordlists/dirb/common.txt";
const DEFAULT_EXTENSIONS: &str = "php,html,js,txt,xml,json,bak,backup";
const DEFAULT_STATUS_CODES: &str = "200,204,301,302,307,403";

static RE_PATH: Lazy<Regex> = lazy_regex!(r"^(/\S*)");
static RE_STATUS: Lazy<Regex> = lazy_regex!(r"\(Status:\s*(\d+)\)");
static RE_SIZE: Lazy<Regex> = lazy_regex!(r"\[Size:\s*(\d+)\]");
static RE_REDIRECT: Lazy<Regex> = lazy_regex!(r"-{1,2}>\s*([^\s\[\]]+)");

/// Directory brute forcing via `gobuster dir`.
pub struct Gobuster {
    tool: CommandTool,
}

impl Gobuster {
    pub const NAME: &'static str = "gobuster";

    pub fn new() -> Self {
        Self::with_program(Self::NAME)
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            tool: CommandTool::new(
                Self::NAME,
                ScanCategory::WebPath,
                program,
                Duration::from_secs(10 * 60),
            ),
        }
    }
}

impl Default for Gobuster {
    fn default() -> Self {
        Self::new()
    }
}

/// Base URLs to scan.
///
/// Reachable URLs of the parent web technology results, without those the
/// target itself via `http` and `https`.
pub fn targets(config: &ScanConfig) -> Vec<String> {
    let targets: Vec<String> = config
        .parents_of(ScanCategory::WebTech)
        .filter_map(|r| r.webtech_data().ok())
        .filter(|d| !d.url.is_empty() && d.is_reachable())
        .map(|d| d.url.clone())
        .unique()
        .collect();
    if targets.is_empty() {
        web_targets(&config.target)
    } else {
        targets
    }
}

fn build_args(url: &str, config: &ScanConfig) -> Vec<String> {
    let mut args: Vec<String> = [
        "dir",
        "-u",
        url,
        "-q",
        "-r",
        "--timeout",
        "10s",
        "--wildcard",
        "-t",
        "50",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    let with_default = [
        ("wordlist", "-w", DEFAULT_WORDLIST),
        ("extensions", "-x", DEFAULT_EXTENSIONS),
        ("status_codes", "-s", DEFAULT_STATUS_CODES),
    ];
    for (option, flag, default) in with_default {
        args.extend([
            flag.to_string(),
            config.option(option).unwrap_or(default).to_string(),
        ]);
    }
    let optional = [
        ("exclude_status", "-b"),
        ("exclude_length", "--exclude-length"),
        ("user_agent", "-a"),
        ("proxy", "--proxy"),
        ("cookies", "-c"),
    ];
    for (option, flag) in optional {
        if let Some(value) = config.option(option) {
            args.extend([flag.to_string(), value.to_string()]);
        }
    }
    if let Some(headers) = config.option("headers") {
        for header in comma_separated(headers) {
            args.extend(["-H".to_string(), header.to_string()]);
        }
    }
    if config.flag("recursive") {
        args.push("-R".to_string());
        if let Some(depth) = config.option("depth") {
            args.extend(["--depth".to_string(), depth.to_string()]);
        }
    }
    args
}

fn number(re: &Regex, line: &str) -> u64 {
    re.captures(line)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or_default()
}

fn parse_line(line: &str, base_url: &str) -> Option<WebPathInfo> {
    let path = RE_PATH.captures(line)?[1].to_string();
    let title = RE_REDIRECT
        .captures(line)
        .map(|c| format!("Redirect to: {}", &c[1]))
        .unwrap_or_default();
    Some(WebPathInfo {
        url: format!("{}{path}", base_url.trim_end_matches('/')),
        status_code: u16::try_from(number(&RE_STATUS, line)).unwrap_or_default(),
        length: number(&RE_SIZE, line),
        path,
        title,
    })
}

/// Parses the found paths of a single `gobuster dir` run against `base_url`.
pub fn parse_output(output: &str, base_url: &str) -> Vec<WebPathInfo> {
    parse_lines(output)
        .filter_map(|line| parse_line(line, base_url))
        .collect()
}

#[async_trait]
impl Scanner for Gobuster {
    fn name(&self) -> &str {
        self.tool.name()
    }

    fn category(&self) -> ScanCategory {
        self.tool.category()
    }

    fn is_available(&self) -> bool {
        self.tool.is_available()
    }

    fn validate_config(&self, config: &ScanConfig) -> Result<(), Error> {
        validate_base(config)?;
        if targets(config).is_empty() {
            return Err(Error::InvalidTarget(config.target.clone()));
        }
        Ok(())
    }

    async fn scan(&self, config: &ScanConfig) -> Result<ScanData, Error> {
        let mut paths = Vec::new();
        for url in targets(config) {
            match self
                .tool
                .execute(&build_args(&url, config), None, config.timeout)
                .await
            {
                Ok(output) => paths.extend(parse_output(&output, &url)),
                // one unreachable base URL must not fail the others
                Err(error) => tracing::warn!(url = %url, %error, "skipping target"),
            }
        }
        Ok(WebPathData { paths }.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::WebTechData, tools::parent_result};

    fn webtech(url: &str, status_code: u16) -> crate::models::ScanResult {
        parent_result(
            "httpx",
            WebTechData {
                url: url.to_string(),
                status_code,
                ..Default::default()
            }
            .into(),
        )
    }

    #[test]
    fn targets_from_reachable_webtech() {
        let config = ScanConfig::new(1, "example.com").with_parent_results(vec![
            webtech("https://a.example.com", 200),
            webtech("https://b.example.com", 500),
            webtech("https://c.example.com", 302),
            webtech("", 200),
        ]);
        assert_eq!(
            targets(&config),
            vec!["https://a.example.com", "https://c.example.com"]
        );
        let unreachable = ScanConfig::new(1, "example.com")
            .with_parent_results(vec![webtech("https://b.example.com", 404)]);
        assert_eq!(
            targets(&unreachable),
            vec!["http://example.com", "https://example.com"]
        );
    }

    #[test]
    fn parses_found_paths() {
        let output = "\
/admin                (Status: 301) [Size: 178] [--> https://example.com/admin/]
/index.php            (Status: 200) [Size: 1234]
/old.php (Status: 302) -> /new.php [Size: 0]
Progress: 4614 / 4615 (99.98%)
";
        let paths = parse_output(output, "https://example.com/");
        assert_eq!(paths.len(), 3);
        assert_eq!(paths[0].path, "/admin");
        assert_eq!(paths[0].url, "https://example.com/admin");
        assert_eq!(paths[0].status_code, 301);
        assert_eq!(paths[0].length, 178);
        assert_eq!(paths[0].title, "Redirect to: https://example.com/admin/");
        assert_eq!(paths[1].status_code, 200);
        assert_eq!(paths[1].length, 1234);
        assert!(paths[1].title.is_empty());
        assert_eq!(paths[2].title, "Redirect to: /new.php");
    }

    #[test]
    fn builds_args_with_defaults() {
        let config = ScanConfig::new(1, "example.com")
            .with_option("extensions", "php")
            .with_option("recursive", "true")
            .with_option("depth", "3");
        let args = build_args("https://example.com", &config);
        assert_eq!(&args[..3], ["dir", "-u", "https://example.com"]);
        let value_of = |flag: &str| {
            let idx = args.iter().position(|a| a == flag).unwrap();
            args[idx + 1].clone()
        };
        assert_eq!(value_of("-w"), DEFAULT_WORDLIST);
        assert_eq!(value_of("-x"), "php");
        assert_eq!(value_of("-s"), DEFAULT_STATUS_CODES);
        assert_eq!(value_of("--depth"), "3");
        assert!(args.contains(&"-R".to_string()));
    }
}
