//! Result writer
//!
//! Commits a completed task's diagnostics, class probabilities, and any
//! newly computed features as a single transaction. A failure anywhere
//! rolls the whole write back; no partial state is ever visible.

use tracing::{debug, info};

use lcsc_common::models::TaskResult;
use lcsc_common::{Error, Result};

use crate::manager::TaskManager;
use crate::moat::COMMON_FAMILY;

impl TaskManager {
    /// Save a completed task's results and diagnostics.
    ///
    /// The first write for the life of a backlog records the training-set
    /// identity; every later write must carry the same identity. Mixing
    /// training sets in one backlog is a hard error and nothing is
    /// persisted when it is detected.
    pub async fn save_results(&mut self, result: &TaskResult) -> Result<()> {
        self.ensure_writable()?;

        let first_write = match self.tset() {
            None => true,
            Some(previous) if previous == result.tset => false,
            Some(previous) => {
                return Err(Error::TrainingSetMismatch {
                    previous: previous.to_string(),
                    new: result.tset.clone(),
                });
            }
        };

        let error_msg = if result.errors.is_empty() {
            None
        } else {
            Some(result.errors.join("\n"))
        };

        let mut tx = self.pool.begin().await?;

        if first_write {
            sqlx::query("DELETE FROM lcsc_settings").execute(&mut *tx).await?;
            sqlx::query("INSERT INTO lcsc_settings (tset, version) VALUES (?, ?)")
                .bind(&result.tset)
                .bind(env!("CARGO_PKG_VERSION"))
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO lcsc_diagnostics
                (priority, classifier, status, elaptime, worker_wait_time, errors)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(result.priority)
        .bind(&result.classifier)
        .bind(result.status.code())
        .bind(result.elaptime)
        .bind(result.worker_wait_time)
        .bind(&error_msg)
        .execute(&mut *tx)
        .await?;

        // Replace the class probabilities as a set, never partially
        sqlx::query("DELETE FROM lcsc_results WHERE priority = ? AND classifier = ?")
            .bind(result.priority)
            .bind(&result.classifier)
            .execute(&mut *tx)
            .await?;
        for (class, prob) in &result.results {
            sqlx::query(
                "INSERT INTO lcsc_results (priority, classifier, class, prob) VALUES (?, ?, ?, ?)",
            )
            .bind(result.priority)
            .bind(&result.classifier)
            .bind(class.as_str())
            .bind(prob)
            .execute(&mut *tx)
            .await?;
        }

        let mut pending_common = None;
        let mut pending_own = None;
        if let Some(features) = &result.features_common {
            pending_common = self
                .moat_insert_in_tx(&mut tx, COMMON_FAMILY, result.priority, features)
                .await?;
        }
        if let Some(features) = &result.features {
            pending_own = self
                .moat_insert_in_tx(&mut tx, &result.classifier, result.priority, features)
                .await?;
        }

        tx.commit().await?;
        self.register_pending(pending_common)?;
        self.register_pending(pending_own)?;

        if first_write {
            self.set_tset(result.tset.clone());
            info!("Backlog training set recorded: {}", result.tset);
        }
        debug!(
            "Saved results for priority={} classifier={} status={}",
            result.priority,
            result.classifier,
            result.status.as_str()
        );
        Ok(())
    }
}
