//! # LCSC Task Manager
//!
//! Coordinates distributed, resumable processing of a backlog of
//! classification jobs (one job = one target light curve processed by one
//! classifier) against a single backlog file, and caches expensive
//! per-target feature computations so they are never recomputed across
//! classifiers or re-runs.
//!
//! Workers drive the loop: request a task with [`TaskManager::get_task`],
//! claim it with [`TaskManager::start_task`], run the classifier
//! externally, and commit the outcome with [`TaskManager::save_results`].
//! When one classifier's backlog is exhausted the selector falls back to
//! whichever classifier still has work, and once every primary classifier
//! is drained it hands out tasks for the `meta` ensemble stage.

pub mod manager;
pub mod moat;
pub mod results;
pub mod selector;
pub mod task;

pub use manager::{BacklogOptions, TaskManager, META_CLASSIFIER};
pub use task::Task;

pub use lcsc_common::{Error, Result, StellarClass, TaskStatus};
pub use lcsc_common::models::{ClassProbability, FeatureMap, TaskResult};
