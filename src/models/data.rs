// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use serde::{Deserialize, Serialize};

use crate::scanner::Error;

/// A discovered subdomain
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubdomainInfo {
    /// The domain that was enumerated, e.g. `example.com`
    pub domain: String,
    /// The found subdomain, e.g. `api.example.com`
    pub subdomain: String,
    /// Resolved addresses, empty when resolution failed
    #[serde(default)]
    pub ips: Vec<String>,
    /// Which tool or source reported it
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubdomainData {
    pub subdomains: Vec<SubdomainInfo>,
}

/// Service identified behind a port
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub fingerprint: String,
    #[serde(default)]
    pub banner: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PortInfo {
    pub port: u16,
    /// tcp or udp
    pub protocol: String,
    /// open, closed or filtered
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PortData {
    pub ports: Vec<PortInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TechnologyInfo {
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WebTechData {
    pub url: String,
    pub status_code: u16,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub technologies: Vec<TechnologyInfo>,
}

impl WebTechData {
    /// Returns true for a non redirecting, non error response.
    pub fn is_reachable(&self) -> bool {
        (200..400).contains(&self.status_code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WebPathInfo {
    pub url: String,
    pub path: String,
    pub status_code: u16,
    pub length: u64,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WebPathData {
    pub paths: Vec<WebPathInfo>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VulnerabilityInfo {
    pub target: String,
    #[serde(default)]
    pub cve_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub severity: String,
    #[serde(default)]
    pub cvss: f64,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub parameter: String,
    #[serde(default)]
    pub payload: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VulnerabilityData {
    pub vulnerabilities: Vec<VulnerabilityInfo>,
}

/// Payload of a scan result.
///
/// The variant is determined by the category of the scanner that produced
/// it, see [`crate::models::ScanCategory::accepts`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanData {
    Subdomain(SubdomainData),
    Port(PortData),
    WebTech(WebTechData),
    WebPath(WebPathData),
    Vulnerability(VulnerabilityData),
}

impl ScanData {
    /// Name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            ScanData::Subdomain(_) => "subdomain",
            ScanData::Port(_) => "port",
            ScanData::WebTech(_) => "webtech",
            ScanData::WebPath(_) => "webpath",
            ScanData::Vulnerability(_) => "vulnerability",
        }
    }
}

macro_rules! data_accessor {
    ($name:ident, $variant:ident, $ty:ty, $kind:literal) => {
        impl ScanData {
            #[doc = concat!("Returns the ", $kind, " payload or `DataConversionFailed`.")]
            pub fn $name(&self) -> Result<&$ty, Error> {
                match self {
                    ScanData::$variant(x) => Ok(x),
                    other => Err(Error::DataConversionFailed {
                        expected: $kind,
                        found: other.kind(),
                    }),
                }
            }
        }

        impl From<$ty> for ScanData {
            fn from(value: $ty) -> Self {
                ScanData::$variant(value)
            }
        }
    };
}

data_accessor!(as_subdomain, Subdomain, SubdomainData, "subdomain");
data_accessor!(as_port, Port, PortData, "port");
data_accessor!(as_webtech, WebTech, WebTechData, "webtech");
data_accessor!(as_webpath, WebPath, WebPathData, "webpath");
data_accessor!(as_vulnerability, Vulnerability, VulnerabilityData, "vulnerability");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessor_matches_variant_only() {
        let data: ScanData = WebTechData {
            url: "https://example.com".into(),
            status_code: 200,
            ..Default::default()
        }
        .into();
        assert_eq!(data.as_webtech().unwrap().url, "https://example.com");
        assert!(matches!(
            data.as_subdomain(),
            Err(Error::DataConversionFailed {
                expected: "subdomain",
                found: "webtech"
            })
        ));
        assert!(data.as_port().is_err());
        assert!(data.as_webpath().is_err());
        assert!(data.as_vulnerability().is_err());
    }

    #[test]
    fn serializes_tagged_by_kind() {
        let data = ScanData::Port(PortData {
            ports: vec![PortInfo {
                port: 443,
                protocol: "tcp".into(),
                state: "open".into(),
                service: None,
            }],
        });
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["port"]["ports"][0]["port"], 443);
        let back: ScanData = serde_json::from_value(json).unwrap();
        assert_eq!(back, data);
    }
}
