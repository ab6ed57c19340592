//! Task selection
//!
//! Hands out the single best-priority eligible task for a classifier. A
//! target is eligible when its correction status is OK or WARNING, it
//! passed data validation (when that table exists), and no diagnostics row
//! exists yet for the (priority, classifier) pair. When one classifier's
//! backlog is exhausted the selector probes every other primary classifier
//! and returns the globally most stalled task; when all primaries are
//! drained it probes the `meta` ensemble stage.

use std::str::FromStr;

use sqlx::Row;
use tracing::debug;

use lcsc_common::models::ClassProbability;
use lcsc_common::{Error, Result, StellarClass, TaskStatus};

use crate::manager::{TaskManager, META_CLASSIFIER};
use crate::moat::COMMON_FAMILY;
use crate::task::Task;

impl TaskManager {
    /// Get the next task to be processed.
    ///
    /// When no task is available for `classifier` and `change_classifier`
    /// is set, a task for another classifier is returned instead, and once
    /// every primary classifier is drained a `meta` task. `None` means the
    /// whole backlog is done.
    pub async fn get_task(
        &self,
        classifier: Option<&str>,
        priority: Option<i64>,
        change_classifier: bool,
    ) -> Result<Option<Task>> {
        if let Some(task) = self.query_task(classifier, priority).await? {
            return Ok(Some(task));
        }

        if !change_classifier {
            return Ok(None);
        }

        // Record the next task of every other primary classifier and pick
        // the one that has fallen furthest behind (lowest priority value).
        let mut best: Option<Task> = None;
        for other in self.classifiers.iter().map(String::as_str) {
            if Some(other) == classifier {
                continue;
            }
            if let Some(task) = self.query_task(Some(other), priority).await? {
                let better = best
                    .as_ref()
                    .map(|b| task.priority < b.priority)
                    .unwrap_or(true);
                if better {
                    best = Some(task);
                }
            }
        }
        if let Some(task) = best {
            debug!(
                "No tasks left for {:?}, switching to {:?}",
                classifier, task.classifier
            );
            return Ok(Some(task));
        }

        // All primary classifiers are done; the ensemble stage can begin.
        self.query_task(Some(META_CLASSIFIER), priority).await
    }

    /// Mark a task as started. The (priority, classifier) primary key makes
    /// a duplicate claim a hard error.
    pub async fn start_task(&self, task: &Task) -> Result<()> {
        self.ensure_writable()?;
        let classifier = task
            .classifier
            .as_deref()
            .ok_or_else(|| Error::InvalidInput("Cannot start a task without a classifier".to_string()))?;

        sqlx::query(
            "INSERT INTO lcsc_diagnostics (priority, classifier, status) VALUES (?, ?, ?)",
        )
        .bind(task.priority)
        .bind(classifier)
        .bind(TaskStatus::Started.code())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Count eligible, unclaimed tasks for one classifier
    pub async fn remaining_tasks(&self, classifier: &str) -> Result<i64> {
        let sql = self.build_search_sql("COUNT(*)", Some(classifier), None, false);
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(classifier)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Fetch the single best-priority eligible task for one classifier
    pub(crate) async fn query_task(
        &self,
        classifier: Option<&str>,
        priority: Option<i64>,
    ) -> Result<Option<Task>> {
        if classifier.is_none() && priority.is_none() {
            return Err(Error::InvalidInput(
                "Task query must constrain classifier or priority".to_string(),
            ));
        }

        let sql = self.build_search_sql(
            "todolist.priority, todolist.starid, todolist.tmag, \
             diagnostics_corr.lightcurve AS lightcurve, \
             diagnostics_corr.variance, diagnostics_corr.rms_hour, diagnostics_corr.ptp",
            classifier,
            priority,
            true,
        );

        let mut query = sqlx::query(&sql);
        if let Some(classifier) = classifier {
            query = query.bind(classifier.to_string());
        }
        if let Some(priority) = priority {
            query = query.bind(priority);
        }

        let Some(row) = query.fetch_optional(&self.pool).await? else {
            return Ok(None);
        };

        let lightcurve: String = row.try_get("lightcurve")?;
        let mut task = Task {
            priority: row.try_get("priority")?,
            starid: row.try_get("starid")?,
            tmag: row.try_get("tmag")?,
            variance: row.try_get("variance")?,
            rms_hour: row.try_get("rms_hour")?,
            ptp: row.try_get("ptp")?,
            lightcurve: self.input_folder.join(lightcurve),
            classifier: classifier.map(str::to_string),
            features_common: None,
            features: None,
            other_classifiers: None,
        };

        // Pre-fetch cached features; the meta classifier consumes the other
        // classifiers' results instead of features.
        if classifier != Some(META_CLASSIFIER) {
            task.features_common = self.moat_query(COMMON_FAMILY, task.priority).await?;
            if let Some(classifier) = classifier {
                task.features = self.moat_query(classifier, task.priority).await?;
            }
        }

        if classifier == Some(META_CLASSIFIER) || classifier.is_none() {
            task.other_classifiers = Some(self.completed_results(task.priority).await?);
        }

        Ok(Some(task))
    }

    /// Every primary classifier's completed OK result rows for one target,
    /// sorted by classifier then class label
    async fn completed_results(&self, priority: i64) -> Result<Vec<ClassProbability>> {
        let rows = sqlx::query(
            r#"
            SELECT lcsc_results.classifier, class, prob
            FROM lcsc_results
            INNER JOIN lcsc_diagnostics
                ON lcsc_results.priority = lcsc_diagnostics.priority
                AND lcsc_results.classifier = lcsc_diagnostics.classifier
            WHERE lcsc_results.priority = ?
              AND lcsc_diagnostics.status = ?
              AND lcsc_results.classifier != ?
            ORDER BY lcsc_results.classifier, class
            "#,
        )
        .bind(priority)
        .bind(TaskStatus::Ok.code())
        .bind(META_CLASSIFIER)
        .fetch_all(&self.pool)
        .await?;

        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let label: String = row.try_get("class")?;
            results.push(ClassProbability {
                classifier: row.try_get("classifier")?,
                class: StellarClass::from_str(&label)?,
                prob: row.try_get("prob")?,
            });
        }
        Ok(results)
    }

    /// Build the eligibility query. Bind order: classifier (when given),
    /// then priority (when given).
    fn build_search_sql(
        &self,
        select: &str,
        classifier: Option<&str>,
        priority: Option<i64>,
        order_and_limit: bool,
    ) -> String {
        let mut joins = String::new();
        let mut constraints = String::new();

        // Only include targets which passed data validation, when that
        // information is available at all.
        if self.datavalidation_exists {
            joins.push_str(
                " INNER JOIN datavalidation_corr ON datavalidation_corr.priority = todolist.priority",
            );
            constraints.push_str(" AND datavalidation_corr.approved = 1");
        }

        if classifier.is_some() {
            joins.push_str(
                " LEFT JOIN lcsc_diagnostics ON lcsc_diagnostics.priority = todolist.priority \
                 AND lcsc_diagnostics.classifier = ?",
            );
            constraints.push_str(" AND lcsc_diagnostics.status IS NULL");
        }
        if priority.is_some() {
            constraints.push_str(" AND todolist.priority = ?");
        }

        format!(
            "SELECT {select} FROM todolist \
             INNER JOIN diagnostics_corr ON todolist.priority = diagnostics_corr.priority\
             {joins} \
             WHERE todolist.corr_status IN ({ok}, {warning}){constraints}{tail}",
            select = select,
            joins = joins,
            ok = TaskStatus::Ok.code(),
            warning = TaskStatus::Warning.code(),
            constraints = constraints,
            tail = if order_and_limit {
                " ORDER BY todolist.priority LIMIT 1"
            } else {
                ""
            },
        )
    }
}
