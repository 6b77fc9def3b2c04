//! Taskcluster index and queue access
//!
//! The dashboard only ever reads from two services:
//!
//! - the **index**, listing the analysis tasks published under
//!   `project.releng.services.project.<channel>.shipit_static_analysis.<namespace>`
//! - the **queue**, serving each task's `public/results/report.json` artifact
//!
//! Both are plain unauthenticated `GET` endpoints returning JSON. The store
//! talks to them through the [`TaskclusterApi`] trait so tests can substitute
//! an in-memory implementation.

mod client;

pub use client::{index_namespace, report_artifact_path, TaskclusterApi, TaskclusterClient};
