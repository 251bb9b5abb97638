// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Status of a single scan attempt.
///
/// An attempt moves from `Pending` over `Running` into exactly one of the
/// terminal states. There is no way back into `Pending`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    /// The scan has been created but not started yet
    #[default]
    Pending,
    /// The scanner is running
    Running,
    /// The scanner finished successfully
    Completed,
    /// The scanner returned an error
    Failed,
    /// The scanner did not finish within its timeout
    Timeout,
}

impl ScanStatus {
    /// Returns true for `Completed`, `Failed` and `Timeout`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanStatus::Completed | ScanStatus::Failed | ScanStatus::Timeout
        )
    }

    /// Returns true if a transition from `self` into `next` is allowed.
    pub fn can_transition_to(&self, next: ScanStatus) -> bool {
        match self {
            ScanStatus::Pending => next == ScanStatus::Running,
            ScanStatus::Running => next.is_terminal(),
            _ => false,
        }
    }
}

impl Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanStatus::Pending => write!(f, "pending"),
            ScanStatus::Running => write!(f, "running"),
            ScanStatus::Completed => write!(f, "completed"),
            ScanStatus::Failed => write!(f, "failed"),
            ScanStatus::Timeout => write!(f, "timeout"),
        }
    }
}
