//! Feature cache: the Mother Of All Tables (MOAT)
//!
//! One table per family (`common`, shared by all classifiers, plus one per
//! classifier), keyed by backlog priority, one REAL column per feature.
//! The column set of a family is fixed when the family is created and every
//! later insert must supply exactly those columns; columns with no stored
//! value read back as NaN. The registry holds the declared schema of every
//! family together with its pre-built insert and select statements.

use std::collections::HashMap;

use sqlx::{Column, Row};
use tracing::debug;

use lcsc_common::models::FeatureMap;
use lcsc_common::{Error, Result};

use crate::manager::{TaskManager, META_CLASSIFIER};

/// Family key for features shared by all classifiers
pub const COMMON_FAMILY: &str = "common";

/// Table name prefix for all feature cache tables
pub(crate) const TABLE_PREFIX: &str = "lcsc_features_";

/// Declared schema and prepared statements for one cache family
#[derive(Debug, Clone)]
pub(crate) struct MoatTable {
    pub table_name: String,
    /// Declared feature columns, sorted; fixed for the family's lifetime
    pub columns: Vec<String>,
    pub create_sql: String,
    pub insert_sql: String,
    pub select_sql: String,
}

impl MoatTable {
    fn build(family: &str, mut columns: Vec<String>) -> Self {
        columns.sort();
        columns.dedup();

        let table_name = format!("{}{}", TABLE_PREFIX, family);
        let quoted: Vec<String> = columns.iter().map(|c| format!("\"{}\"", c)).collect();

        let create_sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (\n\
             priority INTEGER NOT NULL PRIMARY KEY,\n\
             {} REAL,\n\
             FOREIGN KEY (priority) REFERENCES diagnostics_corr(priority) ON DELETE CASCADE ON UPDATE CASCADE\n\
             )",
            table_name,
            quoted.join(" REAL,\n")
        );
        let insert_sql = format!(
            "INSERT OR REPLACE INTO {} (priority,{}) VALUES (?{})",
            table_name,
            quoted.join(","),
            ",?".repeat(columns.len())
        );
        let select_sql = format!(
            "SELECT {} FROM {} WHERE priority = ?",
            quoted.join(","),
            table_name
        );

        Self {
            table_name,
            columns,
            create_sql,
            insert_sql,
            select_sql,
        }
    }

    /// Check an insert payload against the declared column set
    pub fn validate_features(&self, features: &FeatureMap) -> Result<()> {
        if features.len() != self.columns.len()
            || !self.columns.iter().all(|c| features.contains_key(c))
        {
            return Err(Error::InvalidInput(format!(
                "Feature columns do not match the declared schema of {}",
                self.table_name
            )));
        }
        Ok(())
    }
}

/// A family whose table was created inside a still-open transaction;
/// enters the registry only once that transaction has committed
#[derive(Debug)]
pub(crate) struct PendingFamily {
    family: String,
    columns: Vec<String>,
}

/// Schema registry mapping family key to its declared column set
#[derive(Debug, Default)]
pub(crate) struct MoatRegistry {
    tables: HashMap<String, MoatTable>,
}

impl MoatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, family: &str) -> Option<&MoatTable> {
        self.tables.get(family)
    }

    /// Register a family schema. No-op when the family is already known;
    /// the original column set stays authoritative.
    pub fn register(&mut self, family: &str, columns: &[String]) -> Result<&MoatTable> {
        if !self.tables.contains_key(family) {
            validate_columns(columns)?;
            self.tables
                .insert(family.to_string(), MoatTable::build(family, columns.to_vec()));
        }
        // Just inserted or already present
        self.tables
            .get(family)
            .ok_or_else(|| Error::NotFound(format!("MOAT family {}", family)))
    }

    pub fn family_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    pub fn forget_all(&mut self) {
        self.tables.clear();
    }
}

/// Reject empty or SQL-unsafe column sets before they reach a statement
pub(crate) fn validate_columns(columns: &[String]) -> Result<()> {
    if columns.is_empty() {
        return Err(Error::InvalidInput("Invalid column names provided".to_string()));
    }
    for column in columns {
        if !is_safe_identifier(column) {
            return Err(Error::InvalidInput(format!("Invalid column name: {:?}", column)));
        }
    }
    Ok(())
}

/// Feature and family names become SQL identifiers; keep them boring
pub(crate) fn is_safe_identifier(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl TaskManager {
    /// Validate a family key: `common` or one of the known primary classifiers
    fn check_family(&self, family: &str) -> Result<()> {
        if family != COMMON_FAMILY
            && (family == META_CLASSIFIER || !self.classifiers.contains(family))
        {
            return Err(Error::InvalidInput(format!("Invalid classifier: {}", family)));
        }
        Ok(())
    }

    /// Create a cache family with a fixed column set.
    ///
    /// Idempotent: a no-op when the family already exists, in the registry
    /// or on disk.
    pub async fn moat_create(&mut self, family: &str, columns: &[String]) -> Result<()> {
        self.ensure_writable()?;
        self.check_family(family)?;
        if self.moat.get(family).is_none() {
            validate_columns(columns)?;
            let table = MoatTable::build(family, columns.to_vec());
            sqlx::query(&table.create_sql).execute(&self.pool).await?;
            sqlx::query("ANALYZE").execute(&self.pool).await?;
            self.moat.register(family, columns)?;
        }
        Ok(())
    }

    /// Fetch cached features for one target.
    ///
    /// Returns every declared column, NaN where no value is stored; `None`
    /// when the family has no row for this priority or does not exist.
    pub async fn moat_query(&self, family: &str, priority: i64) -> Result<Option<FeatureMap>> {
        let Some(table) = self.moat.get(family) else {
            return Ok(None);
        };
        let row = sqlx::query(&table.select_sql)
            .bind(priority)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut features = FeatureMap::new();
        for (index, column) in row.columns().iter().enumerate() {
            let value: Option<f64> = row.try_get(index)?;
            features.insert(column.name().to_string(), value.unwrap_or(f64::NAN));
        }
        Ok(Some(features))
    }

    /// Upsert features for one target, creating the family on demand from
    /// the keys of the first feature map ever inserted for it.
    pub async fn moat_insert(&mut self, family: &str, priority: i64, features: &FeatureMap) -> Result<()> {
        self.ensure_writable()?;
        let mut tx = self.pool.begin().await?;
        let pending = self.moat_insert_in_tx(&mut tx, family, priority, features).await?;
        tx.commit().await?;
        self.register_pending(pending)?;
        Ok(())
    }

    /// Transactional form used by the result writer.
    ///
    /// A freshly created family is returned as a pending registration
    /// instead of entering the registry here: a rollback of the enclosing
    /// transaction undoes the CREATE TABLE, and the registry must not
    /// remember a table that no longer exists. The caller registers the
    /// pending family after commit via [`TaskManager::register_pending`].
    pub(crate) async fn moat_insert_in_tx(
        &self,
        tx: &mut sqlx::Transaction<'static, sqlx::Sqlite>,
        family: &str,
        priority: i64,
        features: &FeatureMap,
    ) -> Result<Option<PendingFamily>> {
        self.check_family(family)?;

        let (table, pending) = match self.moat.get(family) {
            Some(table) => (table.clone(), None),
            None => {
                let columns: Vec<String> = features.keys().cloned().collect();
                validate_columns(&columns)?;
                let table = MoatTable::build(family, columns.clone());
                sqlx::query(&table.create_sql).execute(&mut **tx).await?;
                let pending = PendingFamily {
                    family: family.to_string(),
                    columns,
                };
                (table, Some(pending))
            }
        };
        table.validate_features(features)?;

        let mut query = sqlx::query(&table.insert_sql).bind(priority);
        for column in &table.columns {
            let value = features
                .get(column)
                .copied()
                .ok_or_else(|| Error::InvalidInput(format!("Missing feature column: {}", column)))?;
            query = query.bind(value);
        }
        query.execute(&mut **tx).await?;
        Ok(pending)
    }

    /// Record a family created inside a now-committed transaction
    pub(crate) fn register_pending(&mut self, pending: Option<PendingFamily>) -> Result<()> {
        if let Some(pending) = pending {
            self.moat.register(&pending.family, &pending.columns)?;
        }
        Ok(())
    }

    /// Drop every cache family and forget all schemas.
    ///
    /// Used when features must be recomputed from scratch, e.g. after an
    /// extraction algorithm change. Compacts the backlog afterwards since
    /// the dropped tables can be large.
    pub async fn moat_clear(&mut self) -> Result<()> {
        self.ensure_writable()?;
        for family in self.moat.family_names() {
            if let Some(table) = self.moat.get(&family) {
                sqlx::query(&format!("DROP TABLE IF EXISTS {}", table.table_name))
                    .execute(&self.pool)
                    .await?;
            }
        }
        self.moat.forget_all();

        debug!("Compacting backlog after moat_clear");
        sqlx::query("VACUUM").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_identifiers() {
        assert!(is_safe_identifier("freq1_harmonic"));
        assert!(is_safe_identifier("ptp"));
        assert!(!is_safe_identifier(""));
        assert!(!is_safe_identifier("1freq"));
        assert!(!is_safe_identifier("a;DROP TABLE"));
        assert!(!is_safe_identifier("a b"));
    }

    #[test]
    fn test_registry_fixes_schema_at_creation() {
        let mut registry = MoatRegistry::new();
        let columns = vec!["b".to_string(), "a".to_string()];
        let table = registry.register("rfgc", &columns).unwrap();
        assert_eq!(table.columns, vec!["a".to_string(), "b".to_string()]);

        // Re-registering with a different column set is a no-op
        let other = vec!["c".to_string()];
        let table = registry.register("rfgc", &other).unwrap();
        assert_eq!(table.columns, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_registry_rejects_empty_or_bad_columns() {
        let mut registry = MoatRegistry::new();
        assert!(registry.register("rfgc", &[]).is_err());
        assert!(registry.register("rfgc", &["pri;ority".to_string()]).is_err());
    }

    #[test]
    fn test_validate_features_requires_exact_column_set() {
        let mut registry = MoatRegistry::new();
        let table = registry
            .register("rfgc", &["a".to_string(), "b".to_string()])
            .unwrap();

        let mut features = FeatureMap::new();
        features.insert("a".to_string(), 1.0);
        assert!(table.validate_features(&features).is_err());

        features.insert("b".to_string(), 2.0);
        assert!(table.validate_features(&features).is_ok());

        features.insert("c".to_string(), 3.0);
        assert!(table.validate_features(&features).is_err());
    }

    #[test]
    fn test_insert_sql_shape() {
        let mut registry = MoatRegistry::new();
        let table = registry
            .register("common", &["amp".to_string(), "freq".to_string()])
            .unwrap();
        assert_eq!(
            table.insert_sql,
            "INSERT OR REPLACE INTO lcsc_features_common (priority,\"amp\",\"freq\") VALUES (?,?,?)"
        );
        assert_eq!(
            table.select_sql,
            "SELECT \"amp\",\"freq\" FROM lcsc_features_common WHERE priority = ?"
        );
    }
}
