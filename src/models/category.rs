// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use super::ScanData;

/// The kind of artifact a scanner produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanCategory {
    /// Subdomain discovery
    Subdomain,
    /// Port scanning
    Port,
    /// Service identification
    Service,
    /// Web technology fingerprinting
    WebTech,
    /// Web path discovery
    WebPath,
    /// Vulnerability probing
    Vulnerability,
}

impl ScanCategory {
    pub const ALL: [ScanCategory; 6] = [
        ScanCategory::Subdomain,
        ScanCategory::Port,
        ScanCategory::Service,
        ScanCategory::WebTech,
        ScanCategory::WebPath,
        ScanCategory::Vulnerability,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScanCategory::Subdomain => "subdomain",
            ScanCategory::Port => "port",
            ScanCategory::Service => "service",
            ScanCategory::WebTech => "webtech",
            ScanCategory::WebPath => "webpath",
            ScanCategory::Vulnerability => "vulnerability",
        }
    }

    /// Returns true when `data` is a payload a scanner of this category may
    /// produce.
    ///
    /// Service scanners report the ports they identified, so they share the
    /// port payload.
    pub fn accepts(&self, data: &ScanData) -> bool {
        matches!(
            (self, data),
            (ScanCategory::Subdomain, ScanData::Subdomain(_))
                | (ScanCategory::Port, ScanData::Port(_))
                | (ScanCategory::Service, ScanData::Port(_))
                | (ScanCategory::WebTech, ScanData::WebTech(_))
                | (ScanCategory::WebPath, ScanData::WebPath(_))
                | (ScanCategory::Vulnerability, ScanData::Vulnerability(_))
        )
    }
}

impl Display for ScanCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ScanCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown scan category: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PortData, SubdomainData};

    #[test]
    fn parses_and_prints() {
        for c in ScanCategory::ALL {
            assert_eq!(c.to_string().parse::<ScanCategory>(), Ok(c));
        }
        assert!("dns".parse::<ScanCategory>().is_err());
        assert_eq!(
            serde_json::to_string(&ScanCategory::WebTech).unwrap(),
            "\"webtech\""
        );
    }

    #[test]
    fn service_shares_port_payload() {
        let ports = ScanData::Port(PortData::default());
        assert!(ScanCategory::Port.accepts(&ports));
        assert!(ScanCategory::Service.accepts(&ports));
        assert!(!ScanCategory::Subdomain.accepts(&ports));
        assert!(
            !ScanCategory::Service.accepts(&ScanData::Subdomain(SubdomainData::default()))
        );
    }
}
