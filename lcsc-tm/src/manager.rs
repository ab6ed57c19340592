//! Task manager lifecycle
//!
//! Owns the open backlog: connection, settings register, known classifier
//! set, feature cache registry, and maintenance. One `TaskManager` per
//! worker process; the backlog file's own locking serializes claims and
//! result writes across processes.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};

use lcsc_common::{config, db, Error, Result};

use crate::moat::{is_safe_identifier, MoatRegistry, TABLE_PREFIX};

/// Classifier key of the final ensemble stage
pub const META_CLASSIFIER: &str = "meta";

/// Primary classifiers known to a freshly opened backlog
pub const DEFAULT_CLASSIFIERS: [&str; 4] = ["rfgc", "slosh", "xgb", "sortinghat"];

/// Open-time options for a backlog
#[derive(Debug, Clone)]
pub struct BacklogOptions {
    /// Compact and re-analyze the backlog before use
    pub cleanup: bool,
    /// Open for inspection only; mutating operations are rejected
    pub readonly: bool,
    /// Drop all previously calculated results before use (the feature
    /// cache survives); forces a cleanup pass. This is also the only way
    /// a task left in Started state by a crashed worker becomes claimable
    /// again.
    pub overwrite: bool,
    /// Primary classifiers tasks will be scheduled for (`meta` excluded)
    pub classifiers: Vec<String>,
}

impl Default for BacklogOptions {
    fn default() -> Self {
        Self {
            cleanup: false,
            readonly: false,
            overwrite: false,
            classifiers: DEFAULT_CLASSIFIERS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Keeps track of which targets to process
#[derive(Debug)]
pub struct TaskManager {
    pub(crate) pool: SqlitePool,
    pub(crate) input_folder: PathBuf,
    pub(crate) classifiers: BTreeSet<String>,
    pub(crate) datavalidation_exists: bool,
    pub(crate) moat: MoatRegistry,
    tset: Option<String>,
    readonly: bool,
    closed: bool,
}

impl TaskManager {
    /// Open a backlog file for scheduling.
    ///
    /// The file must already exist and contain the upstream correction
    /// stage's `diagnostics_corr` table; anything else is a fatal error
    /// before any scheduling occurs. A directory path resolves to
    /// `todo.sqlite` inside it.
    pub async fn open(path: impl AsRef<Path>, options: BacklogOptions) -> Result<TaskManager> {
        let todo_file = config::dir_to_todo_file(path.as_ref());
        let pool = if options.readonly {
            db::connect_readonly(&todo_file).await?
        } else {
            db::connect(&todo_file).await?
        };

        if !db::table_exists(&pool, "diagnostics_corr").await? {
            return Err(Error::MissingTable("diagnostics_corr".to_string()));
        }

        let input_folder = todo_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut classifiers: BTreeSet<String> = options.classifiers.iter().cloned().collect();
        classifiers.remove(META_CLASSIFIER);

        let mut manager = TaskManager {
            pool,
            input_folder,
            classifiers,
            datavalidation_exists: false,
            moat: MoatRegistry::new(),
            tset: None,
            readonly: options.readonly,
            closed: false,
        };

        manager.discover_moat_tables().await?;

        let mut cleanup = options.cleanup;
        if options.overwrite && !options.readonly {
            info!("Resetting backlog: dropping previous results and diagnostics");
            db::drop_scheduler_tables(&manager.pool).await?;
            cleanup = true;
        }

        if !options.readonly {
            db::create_scheduler_tables(&manager.pool).await?;
        }

        manager.tset = manager.load_tset().await?;

        manager.datavalidation_exists = db::table_exists(&manager.pool, "datavalidation_corr").await?;
        if !manager.datavalidation_exists {
            warn!("Data-validation information is not available in this backlog. Assuming all targets are good.");
        }

        // Refresh statistics for the query planner
        if !options.readonly {
            sqlx::query("ANALYZE").execute(&manager.pool).await?;
        }

        if cleanup && !options.readonly {
            debug!("Compacting backlog before run");
            sqlx::query("VACUUM").execute(&manager.pool).await?;
        }

        Ok(manager)
    }

    /// Training set recorded for this backlog, once the first result has
    /// been written
    pub fn tset(&self) -> Option<&str> {
        self.tset.as_deref()
    }

    pub(crate) fn set_tset(&mut self, tset: String) {
        self.tset = Some(tset);
    }

    /// Known primary classifiers (`meta` is implicit and never listed)
    pub fn classifiers(&self) -> &BTreeSet<String> {
        &self.classifiers
    }

    /// Directory the backlog file lives in; light-curve paths resolve
    /// relative to it
    pub fn input_folder(&self) -> &Path {
        &self.input_folder
    }

    /// Close the backlog: restore the default journal mode and release the
    /// exclusive lock. Safe to call more than once.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if !self.readonly {
            sqlx::query("PRAGMA journal_mode = DELETE").execute(&self.pool).await?;
        }
        self.pool.close().await;
        self.closed = true;
        debug!("Backlog closed");
        Ok(())
    }

    pub(crate) fn ensure_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(Error::InvalidInput("Backlog was opened read-only".to_string()));
        }
        Ok(())
    }

    /// Re-register cache families already present in the backlog so their
    /// column schemas survive reopening
    async fn discover_moat_tables(&mut self) -> Result<()> {
        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name LIKE ?",
        )
        .bind(format!("{}%", TABLE_PREFIX))
        .fetch_all(&self.pool)
        .await?;

        for (table_name,) in tables {
            let family = table_name.trim_start_matches(TABLE_PREFIX).to_string();
            if !is_safe_identifier(&family) {
                warn!("Ignoring feature table with unusable name: {}", table_name);
                continue;
            }
            if family != crate::moat::COMMON_FAMILY && !self.classifiers.contains(&family) {
                warn!("Ignoring feature cache for unknown classifier: {}", family);
                continue;
            }

            let rows = sqlx::query(&format!("PRAGMA table_info({})", table_name))
                .fetch_all(&self.pool)
                .await?;
            let columns: Vec<String> = rows
                .iter()
                .map(|row| row.try_get::<String, _>("name"))
                .collect::<std::result::Result<Vec<_>, _>>()?
                .into_iter()
                .filter(|name| name != "priority")
                .collect();

            if columns.is_empty() {
                warn!("Ignoring feature table without feature columns: {}", table_name);
                continue;
            }
            self.moat.register(&family, &columns)?;
            debug!("Re-registered feature cache family '{}' ({} columns)", family, columns.len());
        }
        Ok(())
    }

    async fn load_tset(&self) -> Result<Option<String>> {
        if !db::table_exists(&self.pool, "lcsc_settings").await? {
            return Ok(None);
        }
        let row: Option<(String,)> = sqlx::query_as("SELECT tset FROM lcsc_settings LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(tset,)| tset))
    }
}
