use std::collections::{HashMap, HashSet};

use sqlx::{Connection, Row, Sqlite, SqliteConnection, SqlitePool};
use tracing::{info, instrument, warn};

use super::CURRENT_SCHEMA;
use crate::error::AppError;

#[derive(Debug)]
pub struct TableInfo {
    pub sql: String,
}

#[derive(Debug)]
pub struct IndexInfo {
    pub sql: String,
}

#[derive(Debug, Clone)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub not_null: bool,
    pub default_value: Option<String>,
    pub primary_key: bool,
}

impl ColumnInfo {
    fn has_constant_default(&self) -> bool {
        match self.default_value.as_deref() {
            None => false,
            Some(value) => {
                let upper = value.trim().to_uppercase();
                !(upper.starts_with("CURRENT_") || upper.starts_with('('))
            }
        }
    }

    /// Statements that add this column to an existing `table`.
    ///
    /// SQLite refuses non-constant defaults on `ADD COLUMN`, so those columns
    /// are added nullable and backfilled.
    pub fn add_column_statements(&self, table: &str) -> Result<Vec<String>, AppError> {
        if self.primary_key {
            return Err(AppError::Internal(format!(
                "Cannot add primary key column {} to existing table {}",
                self.name, table
            )));
        }

        let mut clause = format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            table, self.name, self.data_type
        );

        match &self.default_value {
            Some(default) if self.has_constant_default() => {
                if self.not_null {
                    clause.push_str(" NOT NULL");
                }
                clause.push_str(&format!(" DEFAULT {}", default));
                Ok(vec![clause])
            }
            Some(default) => Ok(vec![
                clause,
                format!("UPDATE {} SET {} = {}", table, self.name, default),
            ]),
            None if self.not_null => Err(AppError::Internal(format!(
                "Cannot add required column {}.{} without a default",
                table, self.name
            ))),
            None => Ok(vec![clause]),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub created_tables: Vec<String>,
    pub added_columns: Vec<String>,
    pub created_indexes: Vec<String>,
}

impl MigrationReport {
    pub fn changed(&self) -> bool {
        !self.created_tables.is_empty()
            || !self.added_columns.is_empty()
            || !self.created_indexes.is_empty()
    }
}

/// Brings a live database up to a target schema without ever dropping
/// anything: missing tables are created, missing columns appended and
/// missing indexes built. The target is materialized in a scratch in-memory
/// database and compared through `sqlite_master` and `PRAGMA table_info`.
pub struct SchemaMigrator {
    pool: SqlitePool,
    target_schema: String,
}

impl SchemaMigrator {
    pub fn new(pool: SqlitePool, target_schema: &str) -> Self {
        Self {
            pool,
            target_schema: target_schema.to_string(),
        }
    }

    #[instrument(skip(self))]
    pub async fn migrate(&self) -> Result<MigrationReport, AppError> {
        info!("Checking database schema");

        let mut pristine = SqliteConnection::connect("sqlite::memory:").await?;
        sqlx::Executor::execute(&mut pristine, sqlx::raw_sql(&self.target_schema))
            .await
            .map_err(|e| AppError::Internal(format!("Failed to create pristine schema: {}", e)))?;

        let target_tables = get_tables(&mut pristine).await?;
        let target_indices = get_indices(&mut pristine).await?;

        let mut report = MigrationReport::default();
        let mut tx = self.pool.begin().await?;

        let current_tables = get_tables(&mut *tx).await?;

        let mut table_names: Vec<&String> = target_tables.keys().collect();
        table_names.sort();

        for table_name in table_names {
            if !current_tables.contains_key(table_name) {
                execute_schema_change(
                    &format!("Create table {}", table_name),
                    &target_tables[table_name].sql,
                    &mut tx,
                )
                .await?;
                report.created_tables.push(table_name.clone());
                continue;
            }

            let existing: HashSet<String> = get_table_columns(&mut *tx, table_name)
                .await?
                .into_iter()
                .map(|c| c.name)
                .collect();

            for column in get_table_columns(&mut pristine, table_name).await? {
                if existing.contains(&column.name) {
                    continue;
                }
                for statement in column.add_column_statements(table_name)? {
                    execute_schema_change(
                        &format!("Add column {}.{}", table_name, column.name),
                        &statement,
                        &mut tx,
                    )
                    .await?;
                }
                report
                    .added_columns
                    .push(format!("{}.{}", table_name, column.name));
            }
        }

        for table_name in current_tables.keys() {
            if !target_tables.contains_key(table_name) {
                warn!(table = %table_name, "Table is not part of the current schema; leaving it in place");
            }
        }

        let current_indices = get_indices(&mut *tx).await?;
        let mut index_names: Vec<&String> = target_indices.keys().collect();
        index_names.sort();

        for index_name in index_names {
            if current_indices.contains_key(index_name) {
                continue;
            }
            execute_schema_change(
                &format!("Create index {}", index_name),
                &target_indices[index_name].sql,
                &mut tx,
            )
            .await?;
            report.created_indexes.push(index_name.clone());
        }

        tx.commit().await?;

        if report.changed() {
            info!(
                tables = report.created_tables.len(),
                columns = report.added_columns.len(),
                indexes = report.created_indexes.len(),
                "Schema migration applied"
            );
        } else {
            info!("No schema changes needed");
        }

        Ok(report)
    }
}

#[instrument(skip(sql, tx))]
async fn execute_schema_change(
    description: &str,
    sql: &str,
    tx: &mut sqlx::Transaction<'_, Sqlite>,
) -> Result<(), AppError> {
    info!("{}", description);
    sqlx::query(sql)
        .execute(&mut **tx)
        .await
        .map_err(|e| AppError::Internal(format!("{} failed: {}", description, e)))?;
    Ok(())
}

#[instrument(skip_all)]
async fn get_tables(
    executor: impl sqlx::Executor<'_, Database = Sqlite>,
) -> Result<HashMap<String, TableInfo>, AppError> {
    let rows = sqlx::query(
        "SELECT name, sql FROM sqlite_master
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
    )
    .fetch_all(executor)
    .await?;

    let mut tables = HashMap::new();
    for row in rows {
        let name: String = row.get(0);
        let sql: String = row.get(1);
        tables.insert(name, TableInfo { sql });
    }
    Ok(tables)
}

#[instrument(skip_all)]
async fn get_indices(
    executor: impl sqlx::Executor<'_, Database = Sqlite>,
) -> Result<HashMap<String, IndexInfo>, AppError> {
    let rows = sqlx::query(
        "SELECT name, sql FROM sqlite_master
         WHERE type = 'index' AND sql IS NOT NULL",
    )
    .fetch_all(executor)
    .await?;

    let mut indices = HashMap::new();
    for row in rows {
        let name: String = row.get(0);
        let sql: String = row.get(1);
        indices.insert(name, IndexInfo { sql });
    }
    Ok(indices)
}

#[instrument(skip(executor))]
pub async fn get_table_columns(
    executor: impl sqlx::Executor<'_, Database = Sqlite>,
    table_name: &str,
) -> Result<Vec<ColumnInfo>, AppError> {
    let rows = sqlx::query(&format!("PRAGMA table_info({})", table_name))
        .fetch_all(executor)
        .await?;

    Ok(rows
        .into_iter()
        .map(|row| ColumnInfo {
            name: row.get(1),
            data_type: row.get(2),
            not_null: row.get::<i64, _>(3) != 0,
            default_value: row.get(4),
            primary_key: row.get::<i64, _>(5) != 0,
        })
        .collect())
}

/// Applies [`CURRENT_SCHEMA`] to `pool`. Safe to run on every start.
#[instrument(skip(pool))]
pub async fn ensure_schema(pool: &SqlitePool) -> Result<MigrationReport, AppError> {
    SchemaMigrator::new(pool.clone(), CURRENT_SCHEMA)
        .migrate()
        .await
}
