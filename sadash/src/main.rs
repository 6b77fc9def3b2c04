//! sadash - command line front-end for the static-analysis dashboard
//!
//! Lists indexed analysis tasks, shows individual reports and computes
//! per-check issue statistics across every analyzed revision.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Config: $XDG_CONFIG_HOME/sadash/config.toml (~/.config/sadash/config.toml)
//! - Preferences: $XDG_DATA_HOME/sadash/mozilla-sa-dashboard.json
//! - Logs: $XDG_STATE_HOME/sadash/sadash.log.YYYY-MM-DD (~/.local/state/sadash/)

mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use sadash_core::logging;
use sadash_core::store::{FilePreferenceStore, LogNavigator};
use sadash_core::{Channel, Config, StatsOutcome, Store, TaskclusterClient};

type DashboardStore = Store<TaskclusterClient, FilePreferenceStore, LogNavigator>;

#[derive(Parser)]
#[command(name = "sadash")]
#[command(about = "Static analysis dashboard")]
#[command(version)]
struct Args {
    /// Write logs to the state directory
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the active channel, or switch to another one
    Channel {
        /// Channel to switch to (production, staging, testing)
        name: Option<String>,
    },

    /// List indexed analysis tasks
    Tasks {
        /// Maximum number of tasks to show
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Only show tasks in this state (done, error, ...)
        #[arg(short, long)]
        state: Option<String>,
    },

    /// Show the issues of one task's report
    Report {
        /// Task ID
        task_id: String,

        /// Include issues that are not publishable
        #[arg(short, long)]
        all: bool,
    },

    /// Compute per-check statistics over all analyzed tasks
    Stats {
        /// Number of checks to show
        #[arg(short, long, default_value = "25")]
        top: usize,

        /// Print the full statistics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show effective configuration and file locations
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load().context("failed to load configuration")?;

    let _log_guard = if args.verbose {
        Some(logging::init(&config.logging).context("failed to initialize logging")?)
    } else {
        None
    };

    if let Command::Config = args.command {
        return cmd_config(&config);
    }

    let client =
        TaskclusterClient::new(&config.taskcluster).context("failed to create HTTP client")?;
    let store = Store::new(
        client,
        FilePreferenceStore::new(Config::data_dir()),
        LogNavigator,
        &config.dashboard,
    );
    store.load_preferences();

    tracing::info!(channel = %store.channel(), "sadash starting");

    match args.command {
        Command::Channel { name } => cmd_channel(&store, name).await,
        Command::Tasks { limit, state } => cmd_tasks(&store, limit, state).await,
        Command::Report { task_id, all } => cmd_report(&store, &task_id, all).await,
        Command::Stats { top, json } => cmd_stats(&store, top, json).await,
        Command::Config => cmd_config(&config),
    }
}

async fn cmd_channel(store: &DashboardStore, name: Option<String>) -> Result<()> {
    let Some(name) = name else {
        println!("Channel: {}", store.channel());
        return Ok(());
    };

    let channel: Channel = name.parse()?;
    store
        .switch_channel(channel)
        .await
        .with_context(|| format!("failed to load indexes for {}", channel))?;

    println!("Switched to {}", channel);
    println!("Loaded {} task(s)", store.read(|state| state.tasks.len()));
    Ok(())
}

async fn cmd_tasks(store: &DashboardStore, limit: usize, state: Option<String>) -> Result<()> {
    store
        .load_all_indexes()
        .await
        .context("failed to load indexes")?;

    let tasks = store.tasks();
    let shown: Vec<_> = tasks
        .iter()
        .filter(|task| match &state {
            Some(wanted) => task.data.state.as_deref() == Some(wanted.as_str()),
            None => true,
        })
        .take(limit)
        .collect();

    println!("Channel: {}", store.channel());
    println!("Tasks:   {} indexed, showing {}", tasks.len(), shown.len());
    println!();

    if shown.is_empty() {
        println!("No tasks found.");
        return Ok(());
    }

    output::print_tasks(&shown);
    Ok(())
}

async fn cmd_report(store: &DashboardStore, task_id: &str, all: bool) -> Result<()> {
    store
        .load_report(task_id)
        .await
        .with_context(|| format!("failed to load report for {}", task_id))?;

    let Some(report) = store.report() else {
        anyhow::bail!("report for {} was discarded", task_id);
    };

    output::print_report(&report, all);
    Ok(())
}

async fn cmd_stats(store: &DashboardStore, top: usize, json: bool) -> Result<()> {
    let pb = if json {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(0)
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .context("invalid progress template")?
            .progress_chars("#>-"),
    );
    pb.set_message("reports");

    // Follow the store from a separate task; mutations notify the receiver
    let mut rx = store.subscribe();
    let progress = {
        let pb = pb.clone();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let progress = rx.borrow_and_update().stats.as_ref().map(|s| s.progress());
                if let Some((loaded, total)) = progress {
                    pb.set_length(total as u64);
                    pb.set_position(loaded as u64);
                }
            }
        })
    };

    let outcome = store.calc_stats().await;
    progress.abort();
    pb.finish_and_clear();

    match outcome.context("failed to compute statistics")? {
        StatsOutcome::Completed { loaded } => {
            tracing::info!(loaded, "Statistics computed");
        }
        StatsOutcome::AlreadyRunning => {}
        StatsOutcome::Superseded => anyhow::bail!("channel changed while computing statistics"),
    }

    let Some(stats) = store.stats() else {
        anyhow::bail!("no statistics available");
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        output::print_stats(store.channel(), &stats, top);
    }
    Ok(())
}

fn cmd_config(config: &Config) -> Result<()> {
    println!("sadash Configuration");
    println!("====================");
    println!();
    println!("Config file:     {}", Config::config_path().display());
    println!("Preferences:     {}", Config::data_dir().display());
    println!(
        "Log files:       {}",
        Config::state_dir()
            .join(format!("{}.YYYY-MM-DD", logging::LOG_FILE_PREFIX))
            .display()
    );
    println!();
    println!("Index URL:       {}", config.taskcluster.index_url);
    println!("Queue URL:       {}", config.taskcluster.queue_url);
    println!("Timeout:         {}s", config.taskcluster.timeout_secs);
    println!("Default channel: {}", config.dashboard.default_channel);
    println!("Namespaces:      {}", config.dashboard.namespaces.join(", "));
    println!("Batch size:      {}", config.dashboard.batch_size);
    println!("Log level:       {}", config.logging.level);
    Ok(())
}
