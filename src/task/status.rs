//
// Copyright (c) 2020-2021 science+computing ag and other contributors
//
// This program and the accompanying materials are made
// available under the terms of the Eclipse Public License 2.0
// which is available at https://www.eclipse.org/legal/epl-2.0/
//
// SPDX-License-Identifier: EPL-2.0
//

//! Task status lifecycle.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum StatusKind {
    Pending,
    Started,
    Succeeded,
    Failed,
    Interrupted,
    Skipped,
    UpToDate,
}

impl StatusKind {
    pub fn name(&self) -> &'static str {
        match self {
            StatusKind::Pending => "PENDING",
            StatusKind::Started => "STARTED",
            StatusKind::Succeeded => "SUCCEEDED",
            StatusKind::Failed => "FAILED",
            StatusKind::Interrupted => "INTERRUPTED",
            StatusKind::Skipped => "SKIPPED",
            StatusKind::UpToDate => "UP_TO_DATE",
        }
    }
}

/// A tagged task status: `{type, message?}`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TaskStatus {
    pub kind: StatusKind,
    pub message: Option<String>,
}

impl TaskStatus {
    fn of(kind: StatusKind, message: Option<String>) -> Self {
        TaskStatus { kind, message }
    }

    pub fn pending() -> Self {
        Self::of(StatusKind::Pending, None)
    }

    pub fn started() -> Self {
        Self::of(StatusKind::Started, None)
    }

    pub fn succeeded() -> Self {
        Self::of(StatusKind::Succeeded, None)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::of(StatusKind::Failed, Some(message.into()))
    }

    pub fn interrupted() -> Self {
        Self::of(StatusKind::Interrupted, None)
    }

    pub fn skipped(message: impl Into<String>) -> Self {
        Self::of(StatusKind::Skipped, Some(message.into()))
    }

    pub fn up_to_date(message: Option<String>) -> Self {
        Self::of(StatusKind::UpToDate, message)
    }

    /// "ok" iff not in `{PENDING, FAILED, INTERRUPTED}`.
    pub fn is_ok(&self) -> bool {
        !matches!(self.kind, StatusKind::Pending | StatusKind::Failed | StatusKind::Interrupted)
    }

    pub fn is_not_ok(&self) -> bool {
        !self.is_ok()
    }

    pub fn is_pending(&self) -> bool {
        self.kind == StatusKind::Pending
    }

    pub fn is_started(&self) -> bool {
        self.kind == StatusKind::Started
    }

    pub fn is_failed(&self) -> bool {
        self.kind == StatusKind::Failed
    }

    pub fn is_interrupted(&self) -> bool {
        self.kind == StatusKind::Interrupted
    }

    pub fn is_skipped(&self) -> bool {
        self.kind == StatusKind::Skipped
    }

    pub fn is_up_to_date(&self) -> bool {
        self.kind == StatusKind::UpToDate
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(m) => write!(f, "{} ({m})", self.kind.name()),
            None => write!(f, "{}", self.kind.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_classification() {
        assert!(!TaskStatus::pending().is_ok());
        assert!(!TaskStatus::failed("x").is_ok());
        assert!(!TaskStatus::interrupted().is_ok());
        assert!(TaskStatus::succeeded().is_ok());
        assert!(TaskStatus::started().is_ok());
        assert!(TaskStatus::skipped("x").is_ok());
        assert!(TaskStatus::up_to_date(None).is_ok());
    }
}
