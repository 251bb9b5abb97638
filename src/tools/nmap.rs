// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;
use serde::Deserialize;

use crate::{
    models::{PortData, PortInfo, ScanCategory, ScanConfig, ScanData, ServiceInfo},
    scanner::{Error, Scanner, validate_base},
};

use super::{CommandTool, sanitize_target};

/// Port scanning via `nmap`.
pub struct Nmap {
    tool: CommandTool,
}

impl Nmap {
    pub const NAME: &'static str = "nmap";

    pub fn new() -> Self {
        Self::with_program(Self::NAME)
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            tool: CommandTool::new(
                Self::NAME,
                ScanCategory::Port,
                program,
                Duration::from_secs(5 * 60),
            ),
        }
    }
}

impl Default for Nmap {
    fn default() -> Self {
        Self::new()
    }
}

fn build_args(target: &str, config: &ScanConfig) -> Vec<String> {
    let mut args: Vec<String> = ["-oX", "-", "--max-rate", "1000", "-T4"]
        .into_iter()
        .map(String::from)
        .collect();
    let scan_type = match config.option("scan_type").unwrap_or("connect") {
        "udp" => "-sU",
        "connect" => "-sT",
        "version" => "-sV",
        _ => "-sS",
    };
    args.push(scan_type.to_string());
    match config.option("ports") {
        Some(ports) => args.extend(["-p".to_string(), ports.to_string()]),
        None => args.extend(["--top-ports".to_string(), "1000".to_string()]),
    }
    if config.flag("detect_service") {
        args.push("-sV".to_string());
    }
    if config.flag("detect_os") {
        args.push("-O".to_string());
    }
    if let Some(scripts) = config.option("scripts") {
        args.extend(["--script".to_string(), scripts.to_string()]);
    }
    if let Some(parallelism) = config.option("parallelism") {
        args.extend(["--min-parallelism".to_string(), parallelism.to_string()]);
    }
    args.push(target.to_string());
    args
}

#[derive(Deserialize)]
struct NmapRun {
    #[serde(rename = "host", default)]
    hosts: Vec<Host>,
}

#[derive(Deserialize)]
struct Host {
    #[serde(default)]
    ports: Option<Ports>,
}

#[derive(Deserialize)]
struct Ports {
    #[serde(rename = "port", default)]
    ports: Vec<Port>,
}

#[derive(Deserialize)]
struct Port {
    #[serde(rename = "@protocol")]
    protocol: String,
    #[serde(rename = "@portid")]
    portid: u16,
    state: State,
    #[serde(default)]
    service: Option<Service>,
}

#[derive(Deserialize)]
struct State {
    #[serde(rename = "@state")]
    state: String,
}

#[derive(Deserialize)]
struct Service {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@product", default)]
    product: String,
    #[serde(rename = "@version", default)]
    version: String,
    #[serde(rename = "@extrainfo", default)]
    extrainfo: String,
}

impl From<Port> for PortInfo {
    fn from(port: Port) -> Self {
        Self {
            port: port.portid,
            protocol: port.protocol,
            state: port.state.state,
            service: port.service.map(|s| ServiceInfo {
                name: s.name,
                version: s.version,
                fingerprint: s.product,
                banner: s.extrainfo,
            }),
        }
    }
}

/// Parses the XML report (`-oX`) into the ports of all hosts.
pub fn parse_output(xml: &str) -> Result<Vec<PortInfo>, quick_xml::DeError> {
    let run: NmapRun = quick_xml::de::from_str(xml)?;
    Ok(run
        .hosts
        .into_iter()
        .filter_map(|h| h.ports)
        .flat_map(|p| p.ports)
        .map(PortInfo::from)
        .collect())
}

#[async_trait]
impl Scanner for Nmap {
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
        if sanitize_target(&config.target).is_empty() {
            return Err(Error::InvalidTarget(config.target.clone()));
        }
        Ok(())
    }

    async fn scan(&self, config: &ScanConfig) -> Result<ScanData, Error> {
        let target = sanitize_target(&config.target);
        let output = self
            .tool
            .execute(&build_args(&target, config), None, config.timeout)
            .await?;
        let ports = parse_output(&output).map_err(|e| self.tool.invalid_output(e.to_string()))?;
        Ok(PortData { ports }.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE nmaprun>
<?xml-stylesheet href="file:///usr/bin/../share/nmap/nmap.xsl" type="text/xsl"?>
<nmaprun scanner="nmap" args="nmap -oX - -sT 10.0.0.1" start="1714557600" version="7.94" xmloutputversion="1.05">
<scaninfo type="connect" protocol="tcp" numservices="1000" services="1-1000"/>
<verbose level="0"/>
<debugging level="0"/>
<host starttime="1714557600" endtime="1714557605"><status state="up" reason="conn-refused" reason_ttl="0"/>
<address addr="10.0.0.1" addrtype="ipv4"/>
<hostnames>
</hostnames>
<ports><extraports state="closed" count="997">
<extrareasons reason="conn-refused" count="997" proto="tcp" ports="1-21,23-79,81-442,444-1000"/>
</extraports>
<port protocol="tcp" portid="22"><state state="open" reason="syn-ack" reason_ttl="0"/><service name="ssh" product="OpenSSH" version="9.6p1" extrainfo="Ubuntu Linux; protocol 2.0" method="probed" conf="10"/></port>
<port protocol="tcp" portid="80"><state state="open" reason="syn-ack" reason_ttl="0"/><service name="http" method="table" conf="3"/></port>
<port protocol="tcp" portid="443"><state state="filtered" reason="no-response" reason_ttl="0"/></port>
</ports>
<times srtt="91" rttvar="31" to="100000"/>
</host>
<host><status state="up" reason="user-set" reason_ttl="0"/>
<address addr="10.0.0.2" addrtype="ipv4"/>
</host>
<runstats><finished time="1714557605" timestr="Wed May  1 10:00:05 2024" summary="Nmap done; 2 IP addresses (2 hosts up) scanned in 5.02 seconds" elapsed="5.02" exit="success"/><hosts up="2" down="0" total="2"/>
</runstats>
</nmaprun>
"#;

    #[test]
    fn parses_xml_report() {
        let ports = parse_output(REPORT).unwrap();
        assert_eq!(ports.len(), 3);
        assert_eq!(ports[0].port, 22);
        assert_eq!(ports[0].protocol, "tcp");
        assert_eq!(ports[0].state, "open");
        let ssh = ports[0].service.as_ref().unwrap();
        assert_eq!(ssh.name, "ssh");
        assert_eq!(ssh.fingerprint, "OpenSSH");
        assert_eq!(ssh.version, "9.6p1");
        assert_eq!(ports[1].service.as_ref().unwrap().version, "");
        assert_eq!(ports[2].state, "filtered");
        assert!(ports[2].service.is_none());
    }

    #[test]
    fn report_without_hosts_is_empty() {
        let xml = r#"<?xml version="1.0"?><nmaprun scanner="nmap"><runstats><hosts up="0" down="1" total="1"/></runstats></nmaprun>"#;
        assert!(parse_output(xml).unwrap().is_empty());
    }

    #[test]
    fn builds_args_from_options() {
        let config = ScanConfig::new(1, "10.0.0.1")
            .with_option("scan_type", "syn")
            .with_option("detect_service", "true")
            .with_option("ports", "1-10000");
        assert_eq!(
            build_args("10.0.0.1", &config),
            vec![
                "-oX",
                "-",
                "--max-rate",
                "1000",
                "-T4",
                "-sS",
                "-p",
                "1-10000",
                "-sV",
                "10.0.0.1"
            ]
        );
        let defaults = build_args("10.0.0.1", &ScanConfig::new(1, "10.0.0.1"));
        assert!(defaults.contains(&"-sT".to_string()));
        assert!(defaults.contains(&"--top-ports".to_string()));
    }
}
