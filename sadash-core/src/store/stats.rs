//! Per-check issue statistics folded from downloaded reports.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{Issue, Report};

/// Progress of a statistics computation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum StatsStatus {
    /// Reports are still being downloaded
    Running,
    /// Every report in the work list was folded
    Complete,
    /// A batch failed; the computation may be restarted
    Failed(String),
}

/// Aggregate of every report downloaded for the current work list
#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    /// Number of reports folded so far
    pub loaded: usize,
    /// Task ids whose reports make up this computation
    pub ids: Vec<String>,
    /// Check statistics keyed by `<analyzer>.<check>`
    pub checks: BTreeMap<String, CheckStat>,
    /// Earliest report time seen
    pub start_date: DateTime<Utc>,
    #[serde(flatten)]
    pub status: StatsStatus,
    /// Work-list ids not folded yet
    #[serde(skip)]
    pending: HashSet<String>,
}

/// Counters for one analyzer check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckStat {
    pub analyzer: String,
    pub key: String,
    pub check: String,
    /// Message of the first issue seen for this check
    pub message: Option<String>,
    pub publishable: usize,
    pub total: usize,
    pub issues: Vec<PublishableIssue>,
}

/// A publishable issue linked back to the report it came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishableIssue {
    #[serde(rename = "taskId")]
    pub task_id: String,
    pub revision: serde_json::Value,
    #[serde(flatten)]
    pub issue: Issue,
}

/// Summed counters across all checks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsTotals {
    pub checks: usize,
    pub publishable: usize,
    pub total: usize,
}

impl Stats {
    /// Start a computation over `ids`; `start_date` begins at `now`
    pub fn new(ids: Vec<String>, now: DateTime<Utc>) -> Self {
        Self {
            loaded: 0,
            pending: ids.iter().cloned().collect(),
            ids,
            checks: BTreeMap::new(),
            start_date: now,
            status: StatsStatus::Running,
        }
    }

    /// Fold one report into the statistics
    ///
    /// Only a running computation accepts reports, and each work-list task is
    /// counted once. Returns whether the report was folded.
    pub fn fold(&mut self, report: &Report) -> bool {
        if !self.is_running() || !self.pending.remove(&report.task_id) {
            return false;
        }

        for issue in &report.issues {
            let Some(key) = issue.stats_key() else {
                continue;
            };

            let stat = self.checks.entry(key.clone()).or_insert_with(|| CheckStat {
                analyzer: issue.analyzer_label(),
                key,
                check: issue.check_name().to_string(),
                message: issue.message.clone(),
                publishable: 0,
                issues: Vec::new(),
                total: 0,
            });

            stat.total += 1;
            if issue.publishable {
                stat.publishable += 1;
                stat.issues.push(PublishableIssue {
                    task_id: report.task_id.clone(),
                    revision: report.revision.clone(),
                    issue: issue.clone(),
                });
            }
        }

        if let Some(created) = report.created_at() {
            self.start_date = self.start_date.min(created);
        }

        self.loaded += 1;
        true
    }

    /// `(loaded, expected)` report counts
    pub fn progress(&self) -> (usize, usize) {
        (self.loaded, self.ids.len())
    }

    pub fn is_running(&self) -> bool {
        self.status == StatsStatus::Running
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, StatsStatus::Failed(_))
    }

    /// Checks ordered by publishable count, then total, then key
    pub fn sorted_checks(&self) -> Vec<&CheckStat> {
        let mut checks: Vec<&CheckStat> = self.checks.values().collect();
        checks.sort_by(|a, b| {
            b.publishable
                .cmp(&a.publishable)
                .then_with(|| b.total.cmp(&a.total))
                .then_with(|| a.key.cmp(&b.key))
        });
        checks
    }

    pub fn totals(&self) -> StatsTotals {
        self.checks.values().fold(
            StatsTotals {
                checks: self.checks.len(),
                ..Default::default()
            },
            |mut acc, stat| {
                acc.publishable += stat.publishable;
                acc.total += stat.total;
                acc
            },
        )
    }
}
