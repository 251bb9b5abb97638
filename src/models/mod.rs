// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

//! Value types exchanged between callers, the scan engine and the scanners.

mod category;
mod config;
mod data;
mod pipeline;
mod result;
mod status;

pub use category::*;
pub use config::*;
pub use data::*;
pub use pipeline::*;
pub use result::*;
pub use status::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_result() {
        let json_str = r#"{
    "scanner_name": "subfinder",
    "category": "subdomain",
    "target": "example.com",
    "start_time": "2024-05-01T10:00:00Z",
    "end_time": "2024-05-01T10:00:03Z",
    "duration": "3s",
    "status": "completed",
    "data": {
        "subdomain": {
            "subdomains": [
                {
                    "domain": "example.com",
                    "subdomain": "api.example.com",
                    "ips": ["93.184.216.34"],
                    "source": "subfinder"
                }
            ]
        }
    }
}
"#;
        let result: ScanResult = serde_json::from_str(json_str).unwrap();
        assert_eq!(result.category, ScanCategory::Subdomain);
        assert_eq!(result.status, ScanStatus::Completed);
        assert_eq!(result.duration, std::time::Duration::from_secs(3));
        assert_eq!(
            result.subdomain_data().unwrap().subdomains[0].subdomain,
            "api.example.com"
        );
    }
}
