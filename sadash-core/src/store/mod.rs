//! Report aggregation store
//!
//! The [`Store`] owns all client-side dashboard state and mediates every
//! remote fetch. Front-ends read it through [`Store::subscribe`] (a
//! `tokio::sync::watch` receiver) and change it only through the actions
//! defined here.
//!
//! ## Flow
//!
//! ```text
//! front-end action ──▶ Store action ──▶ TaskclusterApi fetch(es)
//!                                              │
//!        watch::Receiver ◀── state mutation ◀──┘
//! ```
//!
//! Mutations are synchronous closures applied through the watch sender and
//! are never held across an await point.
//!
//! ## Channel epochs
//!
//! Every [`Store::switch_channel`] bumps `State::epoch`. Each fetch remembers
//! the epoch it started under and its result is dropped when the epoch has
//! moved on, so a statistics run started on one channel can never write into
//! the state of another.

mod navigation;
mod preferences;
mod stats;

pub use navigation::{LogNavigator, Navigator, RecordingNavigator, Route};
pub use preferences::{
    FilePreferenceStore, MemoryPreferenceStore, PreferenceStore, Preferences, PREFERENCES_KEY,
};
pub use stats::{CheckStat, PublishableIssue, Stats, StatsStatus, StatsTotals};

use std::collections::HashMap;

use chrono::Utc;
use futures::future::{join_all, try_join_all};
use tokio::sync::watch;

use crate::config::DashboardConfig;
use crate::error::{Error, Result};
use crate::taskcluster::TaskclusterApi;
use crate::types::{Channel, Report, Task};

/// Everything a front-end renders
#[derive(Debug, Clone, Default)]
pub struct State {
    pub channel: Channel,
    /// Indexed tasks, newest first
    pub tasks: Vec<Task>,
    /// The report currently viewed
    pub report: Option<Report>,
    pub stats: Option<Stats>,
    /// Incremented on every channel switch
    pub epoch: u64,
    /// Epoch of a statistics run still loading its indexes
    stats_requested: Option<u64>,
}

/// Result of [`Store::calc_stats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsOutcome {
    /// Every report of the work list was folded
    Completed { loaded: usize },
    /// Statistics already exist or are being computed
    AlreadyRunning,
    /// The channel changed while computing; results were discarded
    Superseded,
}

/// Result of a single [`Store::load_report_batch`] step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStep {
    /// `size` reports were loaded for `step`
    Loaded { step: usize, size: usize },
    /// No reports left past this step
    Finished,
    /// The channel changed; nothing was applied
    Superseded,
}

/// Client-side state container for the static-analysis dashboard
pub struct Store<A, P, N> {
    api: A,
    preferences: P,
    navigator: N,
    namespaces: Vec<String>,
    batch_size: usize,
    state: watch::Sender<State>,
}

impl<A, P, N> Store<A, P, N>
where
    A: TaskclusterApi,
    P: PreferenceStore,
    N: Navigator,
{
    pub fn new(api: A, preferences: P, navigator: N, config: &DashboardConfig) -> Self {
        let state = State {
            channel: config.default_channel,
            ..Default::default()
        };
        let (sender, _) = watch::channel(state);

        Self {
            api,
            preferences,
            navigator,
            namespaces: config.namespaces.clone(),
            batch_size: config.batch_size.max(1),
            state: sender,
        }
    }

    /// Receiver notified after every state mutation
    pub fn subscribe(&self) -> watch::Receiver<State> {
        self.state.subscribe()
    }

    /// Read the current state without cloning it
    pub fn read<R>(&self, f: impl FnOnce(&State) -> R) -> R {
        f(&self.state.borrow())
    }

    pub fn channel(&self) -> Channel {
        self.read(|state| state.channel)
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.read(|state| state.tasks.clone())
    }

    pub fn report(&self) -> Option<Report> {
        self.read(|state| state.report.clone())
    }

    pub fn stats(&self) -> Option<Stats> {
        self.read(|state| state.stats.clone())
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    /// Apply a mutation; the closure reports whether it changed anything
    fn commit<R: Default>(&self, mutation: impl FnOnce(&mut State) -> (R, bool)) -> R {
        let mut result = R::default();
        self.state.send_if_modified(|state| {
            let (value, modified) = mutation(state);
            result = value;
            modified
        });
        result
    }

    fn current(&self) -> (u64, Channel) {
        self.read(|state| (state.epoch, state.channel))
    }

    // ============================================
    // Preferences
    // ============================================

    /// Restore the persisted channel, ignoring absent or malformed data
    pub fn load_preferences(&self) {
        let raw = match self.preferences.get(PREFERENCES_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read preferences");
                return;
            }
        };

        if let Some(channel) = Preferences::parse(&raw).and_then(|prefs| prefs.channel) {
            tracing::debug!(channel = %channel, "Restored channel from preferences");
            self.commit(|state| {
                let modified = state.channel != channel;
                state.channel = channel;
                ((), modified)
            });
        }
    }

    /// Persist the active channel
    pub fn save_preferences(&self) -> Result<()> {
        let prefs = Preferences {
            channel: Some(self.channel()),
        };
        let raw = serde_json::to_string(&prefs)?;
        self.preferences.set(PREFERENCES_KEY, &raw)
    }

    // ============================================
    // Channel
    // ============================================

    /// Switch to `channel`, reload its indexes and show the task listing
    ///
    /// Statistics, the current report and the task collection are cleared
    /// before anything is awaited.
    pub async fn switch_channel(&self, channel: Channel) -> Result<()> {
        let epoch = self.commit(|state| {
            state.channel = channel;
            state.stats = None;
            state.report = None;
            state.tasks.clear();
            state.stats_requested = None;
            state.epoch += 1;
            (state.epoch, true)
        });
        tracing::info!(channel = %channel, epoch, "Switched channel");

        if let Err(e) = self.save_preferences() {
            tracing::warn!(error = %e, "Failed to save preferences");
        }

        self.navigator.navigate(Route::Tasks);

        self.load_all_indexes_at(epoch, channel).await
    }

    // ============================================
    // Indexes
    // ============================================

    /// Clear the task collection and reload every configured namespace
    pub async fn load_all_indexes(&self) -> Result<()> {
        let (epoch, channel) = self.current();
        self.load_all_indexes_at(epoch, channel).await
    }

    async fn load_all_indexes_at(&self, epoch: u64, channel: Channel) -> Result<()> {
        self.commit(|state| {
            if state.epoch != epoch || state.tasks.is_empty() {
                return ((), false);
            }
            state.tasks.clear();
            ((), true)
        });

        let loads = self
            .namespaces
            .iter()
            .map(|namespace| self.load_index_at(epoch, channel, namespace));
        let merged: Vec<usize> = try_join_all(loads).await?;

        tracing::info!(
            channel = %channel,
            namespaces = self.namespaces.len(),
            merged = merged.iter().sum::<usize>(),
            "Loaded all indexes"
        );
        Ok(())
    }

    /// Fetch one namespace and merge it into the task collection
    ///
    /// Returns the number of tasks merged.
    pub async fn load_index(&self, namespace: &str) -> Result<usize> {
        let (epoch, channel) = self.current();
        self.load_index_at(epoch, channel, namespace).await
    }

    async fn load_index_at(&self, epoch: u64, channel: Channel, namespace: &str) -> Result<usize> {
        let tasks = self.api.list_indexed_tasks(channel, namespace).await?;
        let fetched = tasks.len();

        let merged = self.commit(|state| {
            if state.epoch != epoch {
                return (None, false);
            }
            let merged = merge_tasks(&mut state.tasks, tasks);
            (Some(merged), true)
        });

        match merged {
            Some(merged) => {
                tracing::debug!(namespace = %namespace, fetched, merged, "Merged index");
                Ok(merged)
            }
            None => {
                tracing::debug!(namespace = %namespace, epoch, "Discarding stale index");
                Ok(0)
            }
        }
    }

    // ============================================
    // Reports
    // ============================================

    /// Download a task's report and make it the current report
    ///
    /// The current report is cleared while the download is outstanding.
    pub async fn load_report(&self, task_id: &str) -> Result<()> {
        let epoch = self.read(|state| state.epoch);
        self.load_report_at(epoch, task_id).await.map(|_| ())
    }

    async fn load_report_at(&self, epoch: u64, task_id: &str) -> Result<bool> {
        // Already empty: nothing to publish
        self.commit(|state| {
            if state.epoch != epoch || state.report.is_none() {
                return ((), false);
            }
            state.report = None;
            ((), true)
        });

        let mut report = self.api.fetch_report(task_id).await?;
        report.task_id = task_id.to_string();

        let applied = self.commit(|state| {
            if state.epoch != epoch {
                return (false, false);
            }
            apply_report(state, report);
            (true, true)
        });

        if !applied {
            tracing::debug!(task_id = %task_id, epoch, "Discarding stale report");
        }
        Ok(applied)
    }

    /// Make `report` the current report and fold it into running statistics
    pub fn apply_report(&self, report: Report) {
        self.commit(|state| {
            apply_report(state, report);
            ((), true)
        });
    }

    // ============================================
    // Statistics
    // ============================================

    /// Download every analyzable report and compute per-check statistics
    ///
    /// Does nothing while statistics exist or are being computed. A run that
    /// failed may be restarted by calling this again.
    pub async fn calc_stats(&self) -> Result<StatsOutcome> {
        let started = self.commit(|state| {
            let busy = state.stats.as_ref().is_some_and(|stats| !stats.is_failed())
                || state.stats_requested == Some(state.epoch);
            if busy {
                return (None, false);
            }
            state.stats_requested = Some(state.epoch);
            (Some((state.epoch, state.channel)), true)
        });

        let Some((epoch, channel)) = started else {
            tracing::debug!("Statistics already computed or running");
            return Ok(StatsOutcome::AlreadyRunning);
        };

        if let Err(e) = self.load_all_indexes_at(epoch, channel).await {
            self.commit(|state| {
                if state.stats_requested != Some(epoch) {
                    return ((), false);
                }
                state.stats_requested = None;
                ((), true)
            });
            return Err(e);
        }

        let reset = self.commit(|state| {
            if state.epoch != epoch {
                return (None, false);
            }
            let ids: Vec<String> = state
                .tasks
                .iter()
                .filter(|task| task.is_analyzable())
                .map(|task| task.task_id.clone())
                .collect();
            let count = ids.len();
            state.stats = Some(Stats::new(ids, Utc::now()));
            state.stats_requested = None;
            (Some(count), true)
        });

        let Some(count) = reset else {
            return Ok(StatsOutcome::Superseded);
        };
        tracing::info!(channel = %channel, reports = count, "Starting analysis");

        let mut step = 0;
        loop {
            match self.load_report_batch_at(epoch, step).await? {
                BatchStep::Loaded { .. } => step += 1,
                BatchStep::Superseded => return Ok(StatsOutcome::Superseded),
                BatchStep::Finished => break,
            }
        }

        let loaded = self.commit(|state| match state.stats.as_mut() {
            Some(stats) if state.epoch == epoch => {
                stats.status = StatsStatus::Complete;
                (Some(stats.loaded), true)
            }
            _ => (None, false),
        });

        match loaded {
            Some(loaded) => {
                tracing::info!(loaded, batches = step, "Analysis complete");
                Ok(StatsOutcome::Completed { loaded })
            }
            None => Ok(StatsOutcome::Superseded),
        }
    }

    /// Download the reports of batch `step` of the statistics work list
    ///
    /// All reports of the batch are fetched concurrently; the call returns
    /// once every one of them has completed.
    pub async fn load_report_batch(&self, step: usize) -> Result<BatchStep> {
        let epoch = self.read(|state| state.epoch);
        self.load_report_batch_at(epoch, step).await
    }

    async fn load_report_batch_at(&self, epoch: u64, step: usize) -> Result<BatchStep> {
        let slice = self.read(|state| {
            if state.epoch != epoch {
                return Err(BatchStep::Superseded);
            }
            let Some(stats) = state.stats.as_ref() else {
                return Err(BatchStep::Finished);
            };
            let start = step.saturating_mul(self.batch_size);
            if start >= stats.ids.len() {
                return Err(BatchStep::Finished);
            }
            let end = (start + self.batch_size).min(stats.ids.len());
            Ok(stats.ids[start..end].to_vec())
        });

        let slice = match slice {
            Ok(slice) => slice,
            Err(outcome) => return Ok(outcome),
        };

        let results = join_all(slice.iter().map(|id| self.load_report_at(epoch, id))).await;

        let mut failures = Vec::new();
        let mut stale = false;
        for (task_id, result) in slice.iter().zip(results) {
            match result {
                Ok(applied) => stale |= !applied,
                Err(e) => {
                    tracing::error!(task_id = %task_id, step, error = %e, "Failed to load report");
                    failures.push(e);
                }
            }
        }

        if !failures.is_empty() {
            let failed = failures.len();
            let source = failures.swap_remove(0);
            let error = Error::ReportBatch {
                step,
                failed,
                size: slice.len(),
                source: Box::new(source),
            };
            let message = error.to_string();
            self.commit(|state| match state.stats.as_mut() {
                Some(stats) if state.epoch == epoch => {
                    stats.status = StatsStatus::Failed(message);
                    ((), true)
                }
                _ => ((), false),
            });
            return Err(error);
        }

        if stale {
            return Ok(BatchStep::Superseded);
        }

        tracing::info!(step, size = slice.len(), "Loaded batch");
        Ok(BatchStep::Loaded {
            step,
            size: slice.len(),
        })
    }
}

/// Set the current report and fold it into running statistics
///
/// Reports outside the work list, already folded, or arriving after the
/// computation finished only become the current report.
fn apply_report(state: &mut State, report: Report) {
    if let Some(stats) = state.stats.as_mut() {
        if !stats.fold(&report) {
            tracing::trace!(task_id = %report.task_id, "Report not folded into statistics");
        }
    }
    state.report = Some(report);
}

/// Merge `incoming` into `tasks`
///
/// Tasks without an `indexed` date are dropped. A task already present is
/// replaced when the incoming copy is at least as recent. The collection is
/// left sorted newest first. Returns the number of tasks merged.
fn merge_tasks(tasks: &mut Vec<Task>, incoming: Vec<Task>) -> usize {
    let mut positions: HashMap<String, usize> = tasks
        .iter()
        .enumerate()
        .map(|(idx, task)| (task.task_id.clone(), idx))
        .collect();

    let mut merged = 0;
    for task in incoming {
        if task.data.indexed.is_none() {
            continue;
        }
        match positions.get(&task.task_id) {
            Some(&idx) => {
                if tasks[idx].data.indexed <= task.data.indexed {
                    tasks[idx] = task;
                    merged += 1;
                }
            }
            None => {
                positions.insert(task.task_id.clone(), tasks.len());
                tasks.push(task);
                merged += 1;
            }
        }
    }

    tasks.sort_by(|a, b| b.data.indexed.cmp(&a.data.indexed));
    merged
}
