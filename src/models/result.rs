// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scanner::Error;

use super::{
    PortData, ScanCategory, ScanData, ScanStatus, SubdomainData, VulnerabilityData, WebPathData,
    WebTechData,
};

/// Output of a single scan attempt.
///
/// Results are created by the `ScanManager` once the attempt reached a
/// terminal status and are not changed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub scanner_name: String,
    pub category: ScanCategory,
    /// Echoed from the `ScanConfig`
    pub target: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(with = "crate::utils::duration")]
    pub duration: Duration,
    pub status: ScanStatus,
    /// Only set when the attempt did not complete
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Only set for completed attempts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ScanData>,
}

/// Timing of an attempt, measured by the manager.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: Duration,
}

impl ScanResult {
    pub fn completed(
        scanner_name: impl Into<String>,
        category: ScanCategory,
        target: impl Into<String>,
        timing: Timing,
        data: ScanData,
    ) -> Self {
        Self {
            scanner_name: scanner_name.into(),
            category,
            target: target.into(),
            start_time: timing.start_time,
            end_time: timing.end_time,
            duration: timing.duration,
            status: ScanStatus::Completed,
            error: None,
            data: Some(data),
        }
    }

    /// Creates a result for an attempt that ended in `Failed` or `Timeout`.
    pub fn unsuccessful(
        scanner_name: impl Into<String>,
        category: ScanCategory,
        target: impl Into<String>,
        timing: Timing,
        error: &Error,
    ) -> Self {
        let status = match error {
            Error::ScanTimeout { .. } => ScanStatus::Timeout,
            _ => ScanStatus::Failed,
        };
        Self {
            scanner_name: scanner_name.into(),
            category,
            target: target.into(),
            start_time: timing.start_time,
            end_time: timing.end_time,
            duration: timing.duration,
            status,
            error: Some(error.to_string()),
            data: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == ScanStatus::Completed
    }

    /// Returns the payload, `InvalidScanResult` if there is none.
    pub fn data(&self) -> Result<&ScanData, Error> {
        self.data.as_ref().ok_or_else(|| Error::InvalidScanResult {
            scanner: self.scanner_name.clone(),
            reason: format!("{} result without data", self.status),
        })
    }

    pub fn subdomain_data(&self) -> Result<&SubdomainData, Error> {
        self.data()?.as_subdomain()
    }

    pub fn port_data(&self) -> Result<&PortData, Error> {
        self.data()?.as_port()
    }

    pub fn webtech_data(&self) -> Result<&WebTechData, Error> {
        self.data()?.as_webtech()
    }

    pub fn webpath_data(&self) -> Result<&WebPathData, Error> {
        self.data()?.as_webpath()
    }

    pub fn vulnerability_data(&self) -> Result<&VulnerabilityData, Error> {
        self.data()?.as_vulnerability()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing() -> Timing {
        let now = Utc::now();
        Timing {
            start_time: now,
            end_time: now,
            duration: Duration::ZERO,
        }
    }

    #[test]
    fn category_decides_accessor() {
        let result = ScanResult::completed(
            "subfinder",
            ScanCategory::Subdomain,
            "example.com",
            timing(),
            SubdomainData::default().into(),
        );
        assert!(result.is_completed());
        assert!(result.subdomain_data().is_ok());
        assert!(matches!(
            result.port_data(),
            Err(Error::DataConversionFailed { .. })
        ));
        assert!(result.webtech_data().is_err());
        assert!(result.webpath_data().is_err());
        assert!(result.vulnerability_data().is_err());
    }

    #[test]
    fn unsuccessful_status_follows_error() {
        let timeout = Error::ScanTimeout {
            scanner: "nmap".into(),
            timeout: Duration::from_secs(1),
        };
        let result =
            ScanResult::unsuccessful("nmap", ScanCategory::Port, "10.0.0.1", timing(), &timeout);
        assert_eq!(result.status, ScanStatus::Timeout);
        assert!(matches!(
            result.port_data(),
            Err(Error::InvalidScanResult { .. })
        ));

        let failed = Error::ScanFailed {
            scanner: "nmap".into(),
            reason: "exit status 1".into(),
        };
        let result =
            ScanResult::unsuccessful("nmap", ScanCategory::Port, "10.0.0.1", timing(), &failed);
        assert_eq!(result.status, ScanStatus::Failed);
        assert!(!result.error.unwrap().is_empty());
    }
}
