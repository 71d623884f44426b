//! Task checklist shown on the display client.
//!
//! The checklist is a fixed, ordered list of user actions. Entries are never
//! added or removed; only their status flips between pending and completed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DomainError;

/// One step of the checklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    OpenApp,
    AddDevice,
    SelectDevice,
    EnterDevice,
    ControlDevice,
    AdjustBrightness,
    ChangeColor,
}

impl TaskKind {
    /// All tasks in checklist order.
    pub const ALL: [TaskKind; 7] = [
        TaskKind::OpenApp,
        TaskKind::AddDevice,
        TaskKind::SelectDevice,
        TaskKind::EnterDevice,
        TaskKind::ControlDevice,
        TaskKind::AdjustBrightness,
        TaskKind::ChangeColor,
    ];

    /// Stable 1-based identifier shown to display clients.
    pub fn id(&self) -> u32 {
        match self {
            Self::OpenApp => 1,
            Self::AddDevice => 2,
            Self::SelectDevice => 3,
            Self::EnterDevice => 4,
            Self::ControlDevice => 5,
            Self::AdjustBrightness => 6,
            Self::ChangeColor => 7,
        }
    }

    /// Wire name of the task.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenApp => "open_app",
            Self::AddDevice => "add_device",
            Self::SelectDevice => "select_device",
            Self::EnterDevice => "enter_device",
            Self::ControlDevice => "control_device",
            Self::AdjustBrightness => "adjust_brightness",
            Self::ChangeColor => "change_color",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| DomainError::UnknownTask {
                name: s.to_string(),
            })
    }
}

/// Completion state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Completed,
}

impl TaskStatus {
    /// Maps a boolean check onto a status.
    pub fn from_check(passed: bool) -> Self {
        if passed {
            Self::Completed
        } else {
            Self::Pending
        }
    }
}

/// Checklist entry as sent to display clients: `{id, name, status}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: u32,
    pub name: TaskKind,
    pub status: TaskStatus,
}

impl TaskRecord {
    /// Creates a pending entry for the given task.
    pub fn pending(kind: TaskKind) -> Self {
        Self {
            id: kind.id(),
            name: kind,
            status: TaskStatus::Pending,
        }
    }
}

/// Returns the full checklist with every task pending.
pub fn default_checklist() -> Vec<TaskRecord> {
    TaskKind::ALL.iter().copied().map(TaskRecord::pending).collect()
}

/// A user action observed by the task policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAction {
    pub task: TaskKind,
    pub time: DateTime<Utc>,
    pub value: String,
}
