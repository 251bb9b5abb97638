// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;
use itertools::Itertools;
use serde::Deserialize;

use crate::{
    models::{ScanCategory, ScanConfig, ScanData, VulnerabilityData, VulnerabilityInfo},
    scanner::{Error, Scanner, validate_base},
};

use super::{CommandTool, comma_separated, parse_lines, web_targets};

const SEVERITIES: [&str; 5] = ["critical", "high", "medium", "low", "info"];

/// Template based vulnerability scanning via `nuclei`.
pub struct Nuclei {
    tool: CommandTool,
}

impl Nuclei {
    pub const NAME: &'static str = "nuclei";

    pub fn new() -> Self {
        Self::with_program(Self::NAME)
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            tool: CommandTool::new(
                Self::NAME,
                ScanCategory::Vulnerability,
                program,
                Duration::from_secs(15 * 60),
            ),
        }
    }
}

impl Default for Nuclei {
    fn default() -> Self {
        Self::new()
    }
}

/// URLs to scan.
///
/// Web technology URLs of the parent results followed by `http` and `https`
/// for each parent subdomain. Without parents the target itself is used.
pub fn targets(config: &ScanConfig) -> Vec<String> {
    let webtech = config
        .parents_of(ScanCategory::WebTech)
        .filter_map(|r| r.webtech_data().ok())
        .filter(|d| !d.url.is_empty())
        .map(|d| d.url.clone());
    let subdomains = config
        .parents_of(ScanCategory::Subdomain)
        .filter_map(|r| r.subdomain_data().ok())
        .flat_map(|d| &d.subdomains)
        .flat_map(|s| {
            [
                format!("http://{}", s.subdomain),
                format!("https://{}", s.subdomain),
            ]
        });
    let targets: Vec<String> = webtech.chain(subdomains).unique().collect();
    if targets.is_empty() {
        web_targets(&config.target)
    } else {
        targets
    }
}

fn build_args(targets: &[String], config: &ScanConfig) -> Vec<String> {
    let mut args: Vec<String> = [
        "-jsonl",
        "-silent",
        "-timeout",
        "10",
        "-retries",
        "2",
        "-c",
        "50",
        "-rate-limit",
        "150",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    match config.option("templates") {
        Some(templates) => {
            for template in comma_separated(templates) {
                args.extend(["-t".to_string(), template.to_string()]);
            }
        }
        None if config.option("severity").is_none() => {
            args.extend(["-s".to_string(), "high,critical".to_string()]);
        }
        None => {}
    }
    let optional = [("severity", "-s"), ("tags", "-tags"), ("exclude_tags", "-etags")];
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
    if config.flag("follow_redirect") {
        args.push("-follow-redirects".to_string());
    }
    args.push("-duc".to_string());
    for target in targets {
        args.extend(["-u".to_string(), target.clone()]);
    }
    args
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct JsonLine {
    #[serde(rename = "template-id")]
    template_id: String,
    info: Info,
    host: String,
    #[serde(rename = "matched-at")]
    matched_at: String,
    #[serde(rename = "extracted-results")]
    extracted_results: Vec<String>,
    request: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Info {
    name: String,
    description: String,
    severity: String,
    classification: Classification,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Classification {
    #[serde(rename = "cve-id")]
    cve_id: Option<Vec<String>>,
    #[serde(rename = "cvss-score")]
    cvss_score: Option<f64>,
}

impl From<JsonLine> for VulnerabilityInfo {
    fn from(line: JsonLine) -> Self {
        let target = if line.matched_at.is_empty() {
            line.host
        } else {
            line.matched_at.clone()
        };
        let title = if line.info.name.is_empty() {
            line.template_id
        } else {
            line.info.name
        };
        Self {
            target,
            cve_id: line
                .info
                .classification
                .cve_id
                .and_then(|ids| ids.into_iter().next())
                .unwrap_or_default(),
            title,
            description: line.info.description,
            severity: line.info.severity.to_lowercase(),
            cvss: line.info.classification.cvss_score.unwrap_or_default(),
            location: line.matched_at,
            parameter: line.extracted_results.join(", "),
            payload: line.request,
        }
    }
}

/// Parses a plain line like `[template-id] [http] [high] Title https://example.com`.
fn parse_text_line(line: &str) -> Option<VulnerabilityInfo> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 3 {
        return None;
    }
    let target = parts[parts.len() - 1].to_string();
    let severity = SEVERITIES
        .into_iter()
        .find(|s| line.to_lowercase().contains(&format!("[{s}]")))
        .unwrap_or("unknown")
        .to_string();
    Some(VulnerabilityInfo {
        title: parts[2..parts.len() - 1].join(" "),
        location: target.clone(),
        target,
        severity,
        ..Default::default()
    })
}

/// Parses JSON lines output, plain text lines are accepted as well.
///
/// Findings without a target are skipped.
pub fn parse_output(output: &str) -> Vec<VulnerabilityInfo> {
    parse_lines(output)
        .filter_map(|line| match serde_json::from_str::<JsonLine>(line) {
            Ok(json) => Some(VulnerabilityInfo::from(json)),
            Err(_) if line.starts_with('{') => None,
            Err(_) => parse_text_line(line),
        })
        .filter(|v| !v.target.is_empty())
        .collect()
}

#[async_trait]
impl Scanner for Nuclei {
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
        tracing::debug!(targets = targets.len(), "scanning for vulnerabilities");
        let output = self
            .tool
            .execute(&build_args(&targets, config), None, config.timeout)
            .await?;
        let vulnerabilities = parse_output(&output);
        Ok(VulnerabilityData { vulnerabilities }.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{SubdomainData, SubdomainInfo, WebTechData},
        tools::parent_result,
    };

    #[test]
    fn targets_combine_webtech_and_subdomains() {
        let config = ScanConfig::new(1, "example.com").with_parent_results(vec![
            parent_result(
                "httpx",
                WebTechData {
                    url: "https://a.example.com".into(),
                    status_code: 200,
                    ..Default::default()
                }
                .into(),
            ),
            parent_result(
                "subfinder",
                SubdomainData {
                    subdomains: vec![SubdomainInfo {
                        domain: "example.com".into(),
                        subdomain: "a.example.com".into(),
                        ips: vec![],
                        source: "subfinder".into(),
                    }],
                }
                .into(),
            ),
        ]);
        assert_eq!(
            targets(&config),
            vec!["https://a.example.com", "http://a.example.com"]
        );
        assert_eq!(
            targets(&ScanConfig::new(1, "example.com")),
            vec!["http://example.com", "https://example.com"]
        );
    }

    #[test]
    fn builds_args_with_severity_default() {
        let urls = vec!["https://example.com".to_string()];
        let args = build_args(&urls, &ScanConfig::new(1, "example.com"));
        assert_eq!(&args[..2], ["-jsonl", "-silent"]);
        assert!(args.windows(2).any(|w| w == ["-s", "high,critical"]));
        assert_eq!(&args[args.len() - 2..], ["-u", "https://example.com"]);

        let config = ScanConfig::new(1, "example.com")
            .with_option("templates", "cves/,exposures/")
            .with_option("tags", "cve")
            .with_option("follow_redirect", "true");
        let args = build_args(&urls, &config);
        assert!(!args.contains(&"high,critical".to_string()));
        assert!(args.windows(2).any(|w| w == ["-t", "cves/"]));
        assert!(args.windows(2).any(|w| w == ["-t", "exposures/"]));
        assert!(args.windows(2).any(|w| w == ["-tags", "cve"]));
        assert!(args.contains(&"-duc".to_string()));
        assert!(args.contains(&"-follow-redirects".to_string()));

        let severity = ScanConfig::new(1, "example.com").with_option("severity", "medium");
        let args = build_args(&urls, &severity);
        assert!(args.windows(2).any(|w| w == ["-s", "medium"]));
        assert!(!args.contains(&"high,critical".to_string()));
    }

    #[test]
    fn parses_json_lines() {
        let output = r#"{"template-id":"CVE-2021-41773","info":{"name":"Apache 2.4.49 - Path Traversal","severity":"critical","description":"Path traversal in Apache 2.4.49.","classification":{"cve-id":["cve-2021-41773"],"cvss-metrics":"CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H","cvss-score":9.8}},"type":"http","host":"https://a.example.com","matched-at":"https://a.example.com/cgi-bin/.%2e/etc/passwd","extracted-results":["root:x:0:0"],"request":"GET /cgi-bin/.%2e/etc/passwd HTTP/1.1"}
{"template-id":"tech-detect","info":{"name":"","severity":"INFO","classification":{"cve-id":null}},"host":"https://b.example.com"}
{"template-id":"no-target","info":{"name":"Nothing"}}
"#;
        let found = parse_output(output);
        assert_eq!(found.len(), 2);
        let cve = &found[0];
        assert_eq!(cve.target, "https://a.example.com/cgi-bin/.%2e/etc/passwd");
        assert_eq!(cve.cve_id, "cve-2021-41773");
        assert_eq!(cve.title, "Apache 2.4.49 - Path Traversal");
        assert_eq!(cve.severity, "critical");
        assert_eq!(cve.cvss, 9.8);
        assert_eq!(cve.parameter, "root:x:0:0");
        assert_eq!(cve.payload, "GET /cgi-bin/.%2e/etc/passwd HTTP/1.1");
        assert_eq!(found[1].target, "https://b.example.com");
        assert_eq!(found[1].title, "tech-detect");
        assert_eq!(found[1].severity, "info");
        assert!(found[1].cve_id.is_empty());
    }

    #[test]
    fn parses_text_lines() {
        let found = parse_output(
            "[git-config] [http] [medium] Git Config Disclosure https://a.example.com/.git/config\nnoise\n",
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].target, "https://a.example.com/.git/config");
        assert_eq!(found[0].title, "[medium] Git Config Disclosure");
        assert_eq!(found[0].severity, "medium");
    }
}
