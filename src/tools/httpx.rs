// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;
use itertools::Itertools;
use lazy_regex::{Lazy, lazy_regex};
use regex::Regex;
use serde::Deserialize;

use crate::{
    models::{ScanCategory, ScanConfig, ScanData, TechnologyInfo, WebTechData},
    scanner::{Error, Scanner, validate_base},
};

use super::{CommandTool, comma_separated, parse_lines, web_targets};

static RE_URL: Lazy<Regex> = lazy_regex!(r"https?://\S+");
static RE_STATUS: Lazy<Regex> = lazy_regex!(r"\[(\d{3})\]");
static RE_BRACKET: Lazy<Regex> = lazy_regex!(r"\[([^\]]+)\]");

/// HTTP probing and technology detection via `httpx`.
pub struct Httpx {
    tool: CommandTool,
}

impl Httpx {
    pub const NAME: &'static str = "httpx";

    pub fn new() -> Self {
        Self::with_program(Self::NAME)
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            tool: CommandTool::new(
                Self::NAME,
                ScanCategory::WebTech,
                program,
                Duration::from_secs(3 * 60),
            ),
        }
    }
}

impl Default for Httpx {
    fn default() -> Self {
        Self::new()
    }
}

/// URLs to probe.
///
/// Each subdomain of the parent results is probed via `http` and `https`,
/// without subdomains the target itself is used.
pub fn targets(config: &ScanConfig) -> Vec<String> {
    let targets: Vec<String> = config
        .parents_of(ScanCategory::Subdomain)
        .filter_map(|r| r.subdomain_data().ok())
        .flat_map(|d| &d.subdomains)
        .flat_map(|s| {
            [
                format!("http://{}", s.subdomain),
                format!("https://{}", s.subdomain),
            ]
        })
        .unique()
        .collect();
    if targets.is_empty() {
        web_targets(&config.target)
    } else {
        targets
    }
}

fn build_args(config: &ScanConfig) -> Vec<String> {
    let mut args: Vec<String> = [
        "-json", "-silent", "-timeout", "10", "-retries", "2", "-threads", "100",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    let flags = [
        ("detect_tech", "-tech-detect"),
        ("extract_title", "-title"),
        ("show_status", "-status-code"),
        ("show_length", "-content-length"),
        ("show_server", "-web-server"),
        ("show_time", "-response-time"),
        ("follow_redirect", "-follow-redirects"),
    ];
    for (option, flag) in flags {
        if config.flag(option) {
            args.push(flag.to_string());
        }
    }
    if let Some(headers) = config.option("headers") {
        for header in comma_separated(headers) {
            args.extend(["-H".to_string(), header.to_string()]);
        }
    }
    args
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct JsonLine {
    url: String,
    #[serde(alias = "status-code")]
    status_code: u16,
    title: String,
    webserver: String,
    technologies: Vec<JsonTechnology>,
    /// `name:version` entries of `-tech-detect`
    tech: Vec<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct JsonTechnology {
    name: String,
    category: String,
    version: String,
}

impl From<JsonLine> for WebTechData {
    fn from(line: JsonLine) -> Self {
        let mut technologies: Vec<TechnologyInfo> = line
            .technologies
            .into_iter()
            .map(|t| TechnologyInfo {
                name: t.name,
                category: t.category,
                version: t.version,
            })
            .collect();
        technologies.extend(line.tech.iter().map(|t| {
            let (name, version) = t.split_once(':').unwrap_or((t.as_str(), ""));
            TechnologyInfo {
                name: name.to_string(),
                category: String::new(),
                version: version.to_string(),
            }
        }));
        if !line.webserver.is_empty() {
            technologies.push(TechnologyInfo {
                name: line.webserver,
                category: "Web Server".to_string(),
                version: String::new(),
            });
        }
        Self {
            url: line.url,
            status_code: line.status_code,
            title: line.title,
            technologies,
        }
    }
}

/// Parses a plain text line like `https://example.com [200] [Example]`.
fn parse_text_line(line: &str) -> Option<WebTechData> {
    let url = RE_URL.find(line)?.as_str().to_string();
    let status_code = RE_STATUS
        .captures(line)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or_default();
    let title = RE_BRACKET
        .captures_iter(line)
        .map(|c| c[1].to_string())
        .find(|x| !x.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or_default();
    Some(WebTechData {
        url,
        status_code,
        title,
        technologies: vec![],
    })
}

/// Parses JSON lines output, plain text lines are accepted as well.
///
/// Only the first probed URL is reported.
pub fn parse_output(output: &str) -> WebTechData {
    parse_lines(output)
        .filter_map(|line| match serde_json::from_str::<JsonLine>(line) {
            Ok(json) => Some(WebTechData::from(json)),
            Err(_) => parse_text_line(line),
        })
        .find(|d| !d.url.is_empty())
        .unwrap_or_default()
}

#[async_trait]
impl Scanner for Httpx {
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
        let targets = targets(config);
        tracing::debug!(targets = targets.len(), "probing web targets");
        let output = self
            .tool
            .execute(
                &build_args(config),
                Some(targets.join("\n") + "\n"),
                config.timeout,
            )
            .await?;
        Ok(parse_output(&output).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{ScanResult, SubdomainData, SubdomainInfo},
        tools::parent_result,
    };

    fn subdomains(names: &[&str]) -> ScanResult {
        parent_result(
            "subfinder",
            SubdomainData {
                subdomains: names
                    .iter()
                    .map(|n| SubdomainInfo {
                        domain: "example.com".into(),
                        subdomain: n.to_string(),
                        ips: vec![],
                        source: "subfinder".into(),
                    })
                    .collect(),
            }
            .into(),
        )
    }

    #[test]
    fn targets_from_subdomains() {
        let config = ScanConfig::new(1, "example.com")
            .with_parent_results(vec![subdomains(&["a.example.com", "b.example.com"])]);
        assert_eq!(
            targets(&config),
            vec![
                "http://a.example.com",
                "https://a.example.com",
                "http://b.example.com",
                "https://b.example.com"
            ]
        );
    }

    #[test]
    fn targets_fall_back_to_target() {
        let config = ScanConfig::new(1, "HTTPS://Example.com/index.html")
            .with_parent_results(vec![subdomains(&[])]);
        assert_eq!(
            targets(&config),
            vec!["http://example.com", "https://example.com"]
        );
    }

    #[test]
    fn parses_json_lines() {
        let output = r#"{"timestamp":"2024-05-01T10:00:00Z","url":"https://a.example.com","input":"a.example.com","title":"Welcome","webserver":"nginx/1.25.3","status_code":200,"content_length":612,"tech":["Nginx:1.25.3","HSTS"],"failed":false}
{"url":"http://a.example.com","status_code":301}
"#;
        let data = parse_output(output);
        assert_eq!(data.url, "https://a.example.com");
        assert_eq!(data.status_code, 200);
        assert_eq!(data.title, "Welcome");
        assert!(data.is_reachable());
        let names: Vec<_> = data.technologies.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Nginx", "HSTS", "nginx/1.25.3"]);
        assert_eq!(data.technologies[0].version, "1.25.3");
        assert_eq!(data.technologies[2].category, "Web Server");
    }

    #[test]
    fn parses_text_lines() {
        let data = parse_output("https://b.example.com [403] [Forbidden] [nginx]\n");
        assert_eq!(data.url, "https://b.example.com");
        assert_eq!(data.status_code, 403);
        assert_eq!(data.title, "Forbidden");
        assert!(!data.is_reachable());
    }

    #[test]
    fn empty_output_gives_empty_data() {
        assert_eq!(parse_output(""), WebTechData::default());
        assert_eq!(parse_output("no urls here"), WebTechData::default());
    }

    #[test]
    fn builds_args_from_options() {
        let config = ScanConfig::new(1, "example.com")
            .with_option("detect_tech", "true")
            .with_option("extract_title", "false")
            .with_option("headers", "X-A: 1,X-B: 2");
        let args = build_args(&config);
        assert!(args.contains(&"-tech-detect".to_string()));
        assert!(!args.contains(&"-title".to_string()));
        assert_eq!(&args[args.len() - 4..], ["-H", "X-A: 1", "-H", "X-B: 2"]);
    }
}
