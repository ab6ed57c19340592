//! Record types shared by the task manager and the review tool

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::classes::StellarClass;
use crate::status::TaskStatus;

/// Feature vector keyed by feature name
pub type FeatureMap = BTreeMap<String, f64>;

/// Completed-task record handed to the result writer by a worker.
///
/// This is the full payload one worker produces for one (target,
/// classifier) pair; everything it carries commits in one transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// Backlog priority of the target
    pub priority: i64,
    /// Classifier that produced the result
    pub classifier: String,
    /// Training set the classifier was trained on
    pub tset: String,
    /// Final outcome
    pub status: TaskStatus,
    /// Wall-clock processing time in seconds
    pub elaptime: Option<f64>,
    /// Time the worker spent waiting for the task in seconds
    pub worker_wait_time: Option<f64>,
    /// Error messages collected during processing
    pub errors: Vec<String>,
    /// Features shared by all classifiers, cached on first computation
    pub features_common: Option<FeatureMap>,
    /// Classifier-specific features, cached on first computation
    pub features: Option<FeatureMap>,
    /// Class probabilities assigned by the classifier
    pub results: BTreeMap<StellarClass, f64>,
}

impl TaskResult {
    /// Create a result record with no features or probabilities attached
    pub fn new(priority: i64, classifier: impl Into<String>, tset: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            priority,
            classifier: classifier.into(),
            tset: tset.into(),
            status,
            elaptime: None,
            worker_wait_time: None,
            errors: Vec::new(),
            features_common: None,
            features: None,
            results: BTreeMap::new(),
        }
    }
}

/// One ensemble-input row: a completed classifier's probability for one class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassProbability {
    pub classifier: String,
    pub class: StellarClass,
    pub prob: f64,
}
