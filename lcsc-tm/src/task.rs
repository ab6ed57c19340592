//! Task records handed to workers
//!
//! A task is never persisted as its own row; it is a view joining the
//! backlog, the correction diagnostics, and the feature cache, built on
//! demand by the selector.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use lcsc_common::models::{ClassProbability, FeatureMap};

/// One unit of work: a target paired with the classifier that should run it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Backlog priority (primary ordering key, unique per target)
    pub priority: i64,
    /// Stellar identifier of the target
    pub starid: i64,
    /// Apparent magnitude
    pub tmag: Option<f64>,
    /// Light-curve variance from the correction stage
    pub variance: Option<f64>,
    /// Hourly RMS noise metric
    pub rms_hour: Option<f64>,
    /// Point-to-point scatter
    pub ptp: Option<f64>,
    /// Absolute path of the corrected light-curve file
    pub lightcurve: PathBuf,
    /// Classifier this task was selected for (`None` when unconstrained)
    pub classifier: Option<String>,
    /// Cached features shared by all classifiers, when already computed
    pub features_common: Option<FeatureMap>,
    /// Cached classifier-specific features, when already computed
    pub features: Option<FeatureMap>,
    /// Completed results from every primary classifier; only attached for
    /// the meta stage, sorted by classifier then class
    pub other_classifiers: Option<Vec<ClassProbability>>,
}
