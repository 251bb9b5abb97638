// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;
use itertools::Itertools;
use serde::Deserialize;

use crate::{
    models::{ScanCategory, ScanConfig, ScanData, SubdomainData, SubdomainInfo},
    scanner::{Error, Scanner, validate_base},
};

use super::{CommandTool, parse_lines, sanitize_target};

/// Passive subdomain enumeration via `subfinder`.
pub struct Subfinder {
    tool: CommandTool,
}

/// Line of the `-oJ` output
#[derive(Deserialize)]
struct JsonLine {
    host: String,
    #[serde(default)]
    source: String,
}

impl Subfinder {
    pub const NAME: &'static str = "subfinder";

    pub fn new() -> Self {
        Self::with_program(Self::NAME)
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            tool: CommandTool::new(
                Self::NAME,
                ScanCategory::Subdomain,
                program,
                Duration::from_secs(10 * 60),
            ),
        }
    }
}

impl Default for Subfinder {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns true for a plausible DNS name with at least two labels.
pub fn is_valid_domain(domain: &str) -> bool {
    !domain.is_empty()
        && domain.len() <= 253
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && domain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
}

fn build_args(domain: &str, config: &ScanConfig) -> Vec<String> {
    let mut args = vec!["-d".to_string(), domain.to_string(), "-silent".to_string()];
    if let Some(sources) = config.option("sources") {
        args.extend(["-sources".to_string(), sources.to_string()]);
    }
    if config.flag("recursive") {
        args.push("-recursive".to_string());
    }
    if let Some(timeout) = config.option("timeout") {
        args.extend(["-timeout".to_string(), timeout.to_string()]);
    }
    if let Some(path) = config.option("config") {
        args.extend(["-config".to_string(), path.to_string()]);
    }
    args
}

/// Extracts the subdomains of `domain` from plain or JSON lines output.
///
/// Addresses are not resolved yet.
pub fn parse_output(output: &str, domain: &str) -> Vec<SubdomainInfo> {
    parse_lines(output)
        .filter_map(|line| match serde_json::from_str::<JsonLine>(line) {
            Ok(json) if json.source.is_empty() => Some((json.host, "subfinder".to_string())),
            Ok(json) => Some((json.host, format!("subfinder/{}", json.source))),
            Err(_) if line.starts_with('{') => None,
            Err(_) => Some((line.to_lowercase(), "subfinder".to_string())),
        })
        .filter(|(host, _)| host.contains(domain))
        .unique_by(|(host, _)| host.clone())
        .map(|(subdomain, source)| SubdomainInfo {
            domain: domain.to_string(),
            subdomain,
            ips: vec![],
            source,
        })
        .collect()
}

fn resolve_ips(host: &str) -> Vec<String> {
    dns_lookup::lookup_host(host)
        .map(|ips| ips.into_iter().map(|ip| ip.to_string()).unique().collect())
        .unwrap_or_default()
}

#[async_trait]
impl Scanner for Subfinder {
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
        if !is_valid_domain(&sanitize_target(&config.target)) {
            return Err(Error::InvalidTarget(config.target.clone()));
        }
        Ok(())
    }

    async fn scan(&self, config: &ScanConfig) -> Result<ScanData, Error> {
        let domain = sanitize_target(&config.target);
        let output = self
            .tool
            .execute(&build_args(&domain, config), None, config.timeout)
            .await?;
        let mut subdomains = parse_output(&output, &domain);
        tracing::debug!(domain = %domain, found = subdomains.len(), "resolving subdomains");
        // resolution failures leave the address list empty
        subdomains = tokio::task::spawn_blocking(move || {
            for s in subdomains.iter_mut() {
                s.ips = resolve_ips(&s.subdomain);
            }
            subdomains
        })
        .await
        .map_err(|e| self.tool.failed(e.to_string()))?;
        Ok(SubdomainData { subdomains }.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_domains() {
        assert!(is_valid_domain("example.com"));
        assert!(is_valid_domain("a-b.example.co.uk"));
        assert!(!is_valid_domain("localhost"));
        assert!(!is_valid_domain(".example.com"));
        assert!(!is_valid_domain("example.com."));
        assert!(!is_valid_domain("exa mple.com"));
        assert!(!is_valid_domain(&format!("{}.com", "a".repeat(250))));
    }

    #[test]
    fn rejects_invalid_target() {
        let subfinder = Subfinder::with_program("/nonexistent/subfinder");
        assert!(!subfinder.is_available());
        let ok = ScanConfig::new(1, "https://Example.com/");
        assert!(subfinder.validate_config(&ok).is_ok());
        let bad = ScanConfig::new(1, "not a domain");
        assert_eq!(
            subfinder.validate_config(&bad),
            Err(Error::InvalidTarget("not a domain".to_string()))
        );
        assert_eq!(
            subfinder.validate_config(&ScanConfig::new(0, "example.com")),
            Err(Error::InvalidProjectId(0))
        );
    }

    #[test]
    fn builds_args_from_options() {
        let config = ScanConfig::new(1, "example.com")
            .with_option("sources", "all")
            .with_option("recursive", "true")
            .with_option("timeout", "300s");
        assert_eq!(
            build_args("example.com", &config),
            vec![
                "-d",
                "example.com",
                "-silent",
                "-sources",
                "all",
                "-recursive",
                "-timeout",
                "300s"
            ]
        );
    }

    #[test]
    fn parses_plain_and_json_lines() {
        let output = r#"
api.example.com
www.example.com
# progress
unrelated.org
api.example.com
{"host":"mail.example.com","source":"crtsh"}
{"broken json"
"#;
        let found = parse_output(output, "example.com");
        let hosts: Vec<_> = found.iter().map(|s| s.subdomain.as_str()).collect();
        assert_eq!(
            hosts,
            vec!["api.example.com", "www.example.com", "mail.example.com"]
        );
        assert_eq!(found[0].domain, "example.com");
        assert_eq!(found[0].source, "subfinder");
        assert_eq!(found[2].source, "subfinder/crtsh");
        assert!(found.iter().all(|s| s.ips.is_empty()));
    }
}
