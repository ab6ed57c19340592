//! Backlog progress report queries
//!
//! All queries here are aggregate reads over the scheduler-owned tables;
//! the review tool never writes to a backlog.

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use lcsc_common::db;
use lcsc_common::TaskStatus;

/// Per-classifier progress: status name to row count
#[derive(Debug, Clone, Serialize)]
pub struct ClassifierSummary {
    pub classifier: String,
    pub counts: BTreeMap<String, i64>,
}

/// One recent error diagnostic
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEntry {
    pub priority: i64,
    pub classifier: String,
    pub errors: String,
}

/// Full backlog review report
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    /// Training set recorded in the settings register, if any result has
    /// been written yet
    pub tset: Option<String>,
    /// Scheduler version that recorded the training set
    pub version: Option<String>,
    /// Total number of targets in the backlog
    pub targets: i64,
    /// Targets that finished the upstream correction stage successfully
    pub correction_ok: i64,
    pub classifiers: Vec<ClassifierSummary>,
    pub recent_errors: Vec<ErrorEntry>,
}

/// Build the full report from an open (read-only) backlog
pub async fn build_report(pool: &SqlitePool, max_errors: usize) -> Result<Report> {
    let (tset, version) = load_settings(pool).await?;

    let targets: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM todolist")
        .fetch_one(pool)
        .await?;
    let correction_ok: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM todolist WHERE corr_status IN ({}, {})",
        TaskStatus::Ok.code(),
        TaskStatus::Warning.code()
    ))
    .fetch_one(pool)
    .await?;

    Ok(Report {
        generated_at: Utc::now(),
        tset,
        version,
        targets,
        correction_ok,
        classifiers: classifier_summaries(pool).await?,
        recent_errors: recent_errors(pool, max_errors).await?,
    })
}

async fn load_settings(pool: &SqlitePool) -> Result<(Option<String>, Option<String>)> {
    if !db::table_exists(pool, "lcsc_settings").await? {
        return Ok((None, None));
    }
    let row: Option<(String, String)> =
        sqlx::query_as("SELECT tset, version FROM lcsc_settings LIMIT 1")
            .fetch_optional(pool)
            .await?;
    Ok(match row {
        Some((tset, version)) => (Some(tset), Some(version)),
        None => (None, None),
    })
}

/// Status counts per classifier, from the diagnostics table
async fn classifier_summaries(pool: &SqlitePool) -> Result<Vec<ClassifierSummary>> {
    if !db::table_exists(pool, "lcsc_diagnostics").await? {
        return Ok(Vec::new());
    }

    let rows = sqlx::query(
        "SELECT classifier, status, COUNT(*) AS n \
         FROM lcsc_diagnostics GROUP BY classifier, status ORDER BY classifier",
    )
    .fetch_all(pool)
    .await?;

    let mut summaries: BTreeMap<String, BTreeMap<String, i64>> = BTreeMap::new();
    for row in rows {
        let classifier: String = row.try_get("classifier")?;
        let code: i64 = row.try_get("status")?;
        let count: i64 = row.try_get("n")?;
        let status = TaskStatus::from_code(code)
            .map(TaskStatus::as_str)
            .unwrap_or("invalid");
        *summaries
            .entry(classifier)
            .or_default()
            .entry(status.to_string())
            .or_insert(0) += count;
    }

    Ok(summaries
        .into_iter()
        .map(|(classifier, counts)| ClassifierSummary { classifier, counts })
        .collect())
}

/// Most recent error diagnostics, newest priority first
async fn recent_errors(pool: &SqlitePool, limit: usize) -> Result<Vec<ErrorEntry>> {
    if !db::table_exists(pool, "lcsc_diagnostics").await? {
        return Ok(Vec::new());
    }

    let rows = sqlx::query(
        "SELECT priority, classifier, errors FROM lcsc_diagnostics \
         WHERE status = ? AND errors IS NOT NULL \
         ORDER BY priority DESC LIMIT ?",
    )
    .bind(TaskStatus::Error.code())
    .bind(limit as i64)
    .fetch_all(pool)
    .await?;

    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        entries.push(ErrorEntry {
            priority: row.try_get("priority")?,
            classifier: row.try_get("classifier")?,
            errors: row.try_get("errors")?,
        });
    }
    Ok(entries)
}

/// Render the report as plain text
pub fn render_text(report: &Report) -> String {
    let mut out = String::new();
    out.push_str(&format!("Backlog review ({})\n", report.generated_at.to_rfc3339()));
    match (&report.tset, &report.version) {
        (Some(tset), Some(version)) => {
            out.push_str(&format!("Training set: {} (scheduler v{})\n", tset, version));
        }
        _ => out.push_str("Training set: not recorded yet\n"),
    }
    out.push_str(&format!(
        "Targets: {} total, {} passed correction\n",
        report.targets, report.correction_ok
    ));

    if report.classifiers.is_empty() {
        out.push_str("No classification has started.\n");
    }
    for summary in &report.classifiers {
        out.push_str(&format!("  {}:", summary.classifier));
        for (status, count) in &summary.counts {
            out.push_str(&format!(" {}={}", status, count));
        }
        out.push('\n');
    }

    if !report.recent_errors.is_empty() {
        out.push_str("Recent errors:\n");
        for entry in &report.recent_errors {
            out.push_str(&format!(
                "  priority={} classifier={}: {}\n",
                entry.priority,
                entry.classifier,
                entry.errors.lines().next().unwrap_or("")
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::query(
            "CREATE TABLE todolist (priority INTEGER PRIMARY KEY, starid INTEGER, corr_status INTEGER)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO todolist VALUES (1, 101, 1), (2, 102, 1), (3, 103, 4)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            "CREATE TABLE lcsc_settings (tset TEXT NOT NULL, version TEXT NOT NULL)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO lcsc_settings VALUES ('keplerq9', '0.1.0')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            "CREATE TABLE lcsc_diagnostics (priority INTEGER, classifier TEXT, status INTEGER, \
             elaptime REAL, worker_wait_time REAL, errors TEXT, PRIMARY KEY (priority, classifier))",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO lcsc_diagnostics VALUES \
             (1, 'rfgc', 1, 1.5, 0.1, NULL), \
             (2, 'rfgc', 2, 0.5, 0.1, 'failed to converge'), \
             (1, 'xgb', 6, NULL, NULL, NULL)",
        )
        .execute(&pool)
        .await
        .unwrap();
        pool
    }

    #[tokio::test]
    async fn test_report_counts_and_settings() {
        let pool = seeded_pool().await;
        let report = build_report(&pool, 10).await.unwrap();

        assert_eq!(report.tset.as_deref(), Some("keplerq9"));
        assert_eq!(report.targets, 3);
        assert_eq!(report.correction_ok, 2);
        assert_eq!(report.classifiers.len(), 2);

        let rfgc = &report.classifiers[0];
        assert_eq!(rfgc.classifier, "rfgc");
        assert_eq!(rfgc.counts.get("ok"), Some(&1));
        assert_eq!(rfgc.counts.get("error"), Some(&1));

        let xgb = &report.classifiers[1];
        assert_eq!(xgb.counts.get("started"), Some(&1));

        assert_eq!(report.recent_errors.len(), 1);
        assert_eq!(report.recent_errors[0].classifier, "rfgc");
    }

    #[tokio::test]
    async fn test_report_before_any_scheduling() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::query("CREATE TABLE todolist (priority INTEGER PRIMARY KEY, corr_status INTEGER)")
            .execute(&pool)
            .await
            .unwrap();

        let report = build_report(&pool, 10).await.unwrap();
        assert!(report.tset.is_none());
        assert!(report.classifiers.is_empty());
        assert!(report.recent_errors.is_empty());

        let text = render_text(&report);
        assert!(text.contains("not recorded yet"));
    }
}
