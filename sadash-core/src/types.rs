//! Core domain types for sadash
//!
//! These types describe the payloads exchanged with the Taskcluster index and
//! queue services. They are decoded at the HTTP boundary so the store never
//! handles untyped JSON.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Channel** | Deployment environment whose index is queried (production, staging, testing) |
//! | **Namespace** | Task source inside the index (`mozreview`, `phabricator`) |
//! | **Task** | One analysis run, as listed by the index service |
//! | **Report** | The `report.json` artifact produced by a task |
//! | **Issue** | A single finding inside a report |
//! | **Analyzer** | The tool that produced an issue (clang-tidy, clang-format, mozlint, infer) |
//!
//! Fields the dashboard does not use are kept in `extra` maps so payloads can
//! be re-serialized without loss.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Analyzer name used by the multi-linter aggregator
pub const MOZLINT: &str = "mozlint";

/// Analyzer name of the C++ static analyzer
pub const CLANG_TIDY: &str = "clang-tidy";

/// Analyzer name of the formatter; its issues carry no check identity
pub const CLANG_FORMAT: &str = "clang-format";

// ============================================
// Channel
// ============================================

/// Deployment environment whose data is queried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    #[default]
    Production,
    Staging,
    Testing,
}

impl Channel {
    /// All known channels, in display order
    pub const ALL: [Channel; 3] = [Channel::Production, Channel::Staging, Channel::Testing];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Production => "production",
            Channel::Staging => "staging",
            Channel::Testing => "testing",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Channel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "production" => Ok(Channel::Production),
            "staging" => Ok(Channel::Staging),
            "testing" => Ok(Channel::Testing),
            _ => Err(Error::InvalidChannel(s.to_string())),
        }
    }
}

// ============================================
// Tasks
// ============================================

/// An indexed analysis task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "taskId")]
    pub task_id: String,

    #[serde(default)]
    pub data: TaskData,

    /// Remaining index fields (namespace, rank, expires)
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Summary payload attached to a task when it was indexed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskData {
    /// Workflow state (`started`, `done`, `error`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Number of issues found by the task
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issues: Option<u64>,

    /// When the task was indexed; tasks without it are ignored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Task {
    /// True when the task finished and found something worth downloading
    pub fn is_analyzable(&self) -> bool {
        self.data.state.as_deref() == Some("done") && self.data.issues.unwrap_or(0) > 0
    }
}

/// Response body of the index `listTasks` endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct IndexPage {
    pub tasks: Vec<Task>,

    #[serde(rename = "continuationToken", default)]
    pub continuation_token: Option<String>,
}

// ============================================
// Reports
// ============================================

/// The `report.json` artifact of one task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Set by the store from the task the report was fetched for
    #[serde(rename = "taskId", default)]
    pub task_id: String,

    pub issues: Vec<Issue>,

    /// Revision description (source, rev, url, ...)
    #[serde(default)]
    pub revision: serde_json::Value,

    /// Report creation time, seconds since epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Report {
    /// Report creation time, if present and representable
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        let time = self.time?;
        if !time.is_finite() {
            return None;
        }
        Utc.timestamp_millis_opt((time * 1000.0) as i64).single()
    }

    /// Issues flagged for human review
    pub fn publishable_issues(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.publishable)
    }
}

/// A single finding inside a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub analyzer: String,

    /// Linter name, set by the multi-linter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linter: Option<String>,

    /// Rule name (mozlint, infer)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,

    /// Check name (clang-tidy)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default)]
    pub publishable: bool,

    /// Location, body, validation flags...
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Issue {
    /// Analyzer label used for grouping, `mozlint.<linter>` for the multi-linter
    pub fn analyzer_label(&self) -> String {
        if self.analyzer == MOZLINT {
            format!(
                "{}.{}",
                self.analyzer,
                self.linter.as_deref().unwrap_or("unknown")
            )
        } else {
            self.analyzer.clone()
        }
    }

    /// The check identity: `check` for clang-tidy, `rule` for everything else
    pub fn check_name(&self) -> &str {
        let name = if self.analyzer == CLANG_TIDY {
            self.check.as_deref()
        } else {
            self.rule.as_deref()
        };
        name.unwrap_or("unknown")
    }

    /// Key grouping this issue in the statistics, `None` when not groupable
    pub fn stats_key(&self) -> Option<String> {
        if self.analyzer == CLANG_FORMAT {
            return None;
        }
        Some(format!("{}.{}", self.analyzer_label(), self.check_name()))
    }
}
