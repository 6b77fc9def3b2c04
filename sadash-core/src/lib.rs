//! # sadash-core
//!
//! Core library for sadash - a client for the static-analysis dashboard.
//!
//! This library provides:
//! - Typed payloads for Taskcluster index tasks and analysis reports
//! - An HTTP client for the index and queue services
//! - The report aggregation store (task collection, current report, per-check statistics)
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! Data flows in one direction:
//! - **Action:** a front-end calls a [`Store`] action (`load_all_indexes`, `calc_stats`, ...)
//! - **Fetch:** the store reads the index and queue services through [`TaskclusterApi`]
//! - **Mutation:** results are applied synchronously to the store state
//! - **Render:** subscribers are notified through a `tokio::sync::watch` channel
//!
//! ## Example
//!
//! ```rust,no_run
//! use sadash_core::store::{FilePreferenceStore, LogNavigator, Store};
//! use sadash_core::{Config, TaskclusterClient};
//!
//! # async fn run() -> sadash_core::Result<()> {
//! let config = Config::load()?;
//! let client = TaskclusterClient::new(&config.taskcluster)?;
//! let store = Store::new(
//!     client,
//!     FilePreferenceStore::new(Config::data_dir()),
//!     LogNavigator,
//!     &config.dashboard,
//! );
//!
//! store.load_preferences();
//! store.calc_stats().await?;
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use error::{Error, Result};
pub use store::{StatsOutcome, Store};
pub use taskcluster::{TaskclusterApi, TaskclusterClient};
pub use types::*;

// Public modules
pub mod config;
pub mod error;
pub mod logging;
pub mod store;
pub mod taskcluster;
pub mod types;
