// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

//! Predefined pipelines.
//!
//! The templates are not bound to a target, use `ScanPipeline::for_target`
//! before executing them.

use crate::models::{ScanPipeline, ScanStage};

pub const QUICK: &str = "quick";
pub const COMPREHENSIVE: &str = "comprehensive";
pub const DEEP: &str = "deep";

fn quick() -> ScanPipeline {
    ScanPipeline::new(QUICK)
        .continue_on_error(true)
        .with_stage(
            ScanStage::new("quick_discovery", ["subfinder", "httpx"])
                .parallel()
                .with_option("timeout", "30s"),
        )
        .with_stage(
            ScanStage::new("critical_vuln_scan", ["nuclei"])
                .depends_on(["httpx"])
                .with_options([("severity", "critical"), ("tags", "rce,sqli,xss")]),
        )
}

fn comprehensive() -> ScanPipeline {
    ScanPipeline::new(COMPREHENSIVE)
        .continue_on_error(true)
        .with_stage(
            ScanStage::new("subdomain_discovery", ["subfinder"])
                .with_options([("recursive", "true"), ("sources", "all")]),
        )
        .with_stage(
            ScanStage::new("web_detection", ["httpx"])
                .depends_on(["subfinder"])
                .with_options([
                    ("detect_tech", "true"),
                    ("extract_title", "true"),
                    ("show_status", "true"),
                    ("show_length", "true"),
                    ("follow_redirect", "true"),
                ]),
        )
        .with_stage(
            ScanStage::new("port_scan", ["nmap"])
                .parallel()
                .depends_on(["subfinder"])
                .with_options([
                    ("scan_type", "syn"),
                    ("detect_service", "true"),
                    ("ports", "1-10000"),
                ]),
        )
        .with_stage(
            ScanStage::new("vulnerability_scan", ["nuclei"])
                .depends_on(["httpx"])
                .with_options([("severity", "high,critical"), ("follow_redirect", "true")]),
        )
        .with_stage(
            ScanStage::new("directory_scan", ["gobuster"])
                .depends_on(["httpx"])
                .with_options([
                    ("extensions", "php,html,js,txt,xml,json"),
                    ("status_codes", "200,204,301,302,307,403"),
                    ("recursive", "false"),
                ]),
        )
}

fn deep() -> ScanPipeline {
    ScanPipeline::new(DEEP)
        .continue_on_error(false)
        .with_stage(
            ScanStage::new("extensive_subdomain", ["subfinder"]).with_options([
                ("recursive", "true"),
                ("sources", "all"),
                ("timeout", "300s"),
            ]),
        )
        .with_stage(
            ScanStage::new("full_port_scan", ["nmap"])
                .depends_on(["subfinder"])
                .with_options([
                    ("scan_type", "syn"),
                    ("detect_service", "true"),
                    ("detect_os", "true"),
                    ("ports", "1-65535"),
                    ("scripts", "vuln,default"),
                ]),
        )
        .with_stage(
            ScanStage::new("comprehensive_web", ["httpx"])
                .depends_on(["subfinder"])
                .with_options([
                    ("detect_tech", "true"),
                    ("extract_title", "true"),
                    ("show_status", "true"),
                    ("show_server", "true"),
                    ("show_time", "true"),
                    ("follow_redirect", "true"),
                ]),
        )
        .with_stage(
            ScanStage::new("extensive_directory", ["gobuster"])
                .depends_on(["httpx"])
                .with_options([
                    ("extensions", "php,html,js,txt,xml,json,bak,backup,old,tmp"),
                    ("status_codes", "200,204,301,302,307,403,500"),
                    ("recursive", "true"),
                    ("depth", "3"),
                ]),
        )
        .with_stage(
            ScanStage::new("comprehensive_vuln", ["nuclei"])
                .depends_on(["httpx", "gobuster"])
                .with_options([
                    ("severity", "low,medium,high,critical"),
                    ("follow_redirect", "true"),
                ]),
        )
}

/// All predefined pipelines ordered by name.
pub fn default_pipelines() -> Vec<ScanPipeline> {
    vec![comprehensive(), deep(), quick()]
}

/// Returns the predefined pipeline with that name.
pub fn pipeline(name: &str) -> Option<ScanPipeline> {
    match name {
        QUICK => Some(quick()),
        COMPREHENSIVE => Some(comprehensive()),
        DEEP => Some(deep()),
        _ => None,
    }
}

pub fn pipeline_names() -> Vec<&'static str> {
    vec![COMPREHENSIVE, DEEP, QUICK]
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    const TOOLS: [&str; 5] = ["subfinder", "nmap", "httpx", "gobuster", "nuclei"];

    #[test]
    fn names_match_templates() {
        for name in pipeline_names() {
            let p = pipeline(name).unwrap();
            assert_eq!(p.name, name);
            assert_eq!(p.project_id, 0);
            assert!(p.target.is_empty());
        }
        assert!(pipeline("unknown").is_none());
        assert_eq!(default_pipelines().len(), pipeline_names().len());
    }

    #[test]
    fn dependencies_are_scheduled_earlier() {
        for p in default_pipelines() {
            let mut scheduled = HashSet::new();
            for stage in &p.stages {
                assert!(!stage.scanner_names.is_empty());
                for dep in &stage.depends_on {
                    assert!(
                        scheduled.contains(dep),
                        "{}: {dep} of {} not scheduled before",
                        p.name,
                        stage.name
                    );
                }
                for s in &stage.scanner_names {
                    assert!(TOOLS.contains(&s.as_str()), "unknown tool {s}");
                    scheduled.insert(s.clone());
                }
            }
        }
    }

    #[test]
    fn error_policy() {
        assert!(pipeline(QUICK).unwrap().continue_on_error);
        assert!(pipeline(COMPREHENSIVE).unwrap().continue_on_error);
        assert!(!pipeline(DEEP).unwrap().continue_on_error);
    }
}
