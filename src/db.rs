use color_eyre::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Row, Sqlite, Transaction};
use std::collections::HashSet;
use std::path::Path;
use tokio::runtime::Runtime;

/// A value bound into a dynamically built insert statement.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Int(i64),
    Real(f64),
    Text(String),
}

impl From<Option<i64>> for SqlValue {
    fn from(value: Option<i64>) -> Self {
        value.map_or(SqlValue::Null, SqlValue::Int)
    }
}
impl From<Option<f64>> for SqlValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(SqlValue::Null, SqlValue::Real)
    }
}
impl From<Option<String>> for SqlValue {
    fn from(value: Option<String>) -> Self {
        value.map_or(SqlValue::Null, SqlValue::Text)
    }
}

pub fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Serial access to the target database: a sqlx SQLite pool driven by a
/// blocking tokio runtime. The pipeline is the only writer, so the pool is
/// capped at one connection.
pub struct SqlStore {
    rt: Runtime,
    pool: SqlitePool,
}

impl SqlStore {
    /// Connects to an existing database file. The schema is pre-created, a
    /// missing file is a fatal connection error.
    pub fn connect<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_options(SqliteConnectOptions::new().filename(path))
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_options(
            SqliteConnectOptions::new()
                .filename(":memory:")
                .create_if_missing(true),
        )
    }

    fn with_options(options: SqliteConnectOptions) -> Result<Self> {
        let rt = Runtime::new()?;
        let pool = rt.block_on(
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options),
        )?;
        Ok(SqlStore { rt, pool })
    }

    /// Live column names of `table`, lowercased. Empty set if the table does
    /// not exist.
    pub fn table_columns(&self, table: &str) -> Result<HashSet<String>> {
        let rows = self.rt.block_on(
            sqlx::query("SELECT name FROM pragma_table_info(?1)")
                .bind(table)
                .fetch_all(&self.pool),
        )?;
        let mut columns = HashSet::with_capacity(rows.len());
        for row in rows {
            columns.insert(row.try_get::<String, _>(0)?.to_lowercase());
        }
        Ok(columns)
    }

    pub fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.rt.block_on(self.pool.begin())?)
    }

    pub fn commit(&self, tx: Transaction<'static, Sqlite>) -> Result<()> {
        Ok(self.rt.block_on(tx.commit())?)
    }

    /// Executes one statement inside an open transaction; returns the number
    /// of affected rows (0 for a conflict-ignored insert).
    pub fn execute_in(
        &self,
        tx: &mut Transaction<'static, Sqlite>,
        sql: &str,
        values: Vec<SqlValue>,
    ) -> Result<u64> {
        let mut query = sqlx::query(sql);
        for value in values {
            query = match value {
                SqlValue::Null => query.bind(None::<String>),
                SqlValue::Int(i) => query.bind(i),
                SqlValue::Real(f) => query.bind(f),
                SqlValue::Text(s) => query.bind(s),
            };
        }
        Ok(self.rt.block_on(query.execute(&mut *tx))?.rows_affected())
    }

    pub fn execute_sql(&self, sql: &str) -> Result<u64> {
        Ok(self
            .rt
            .block_on(sqlx::query(sql).execute(&self.pool))?
            .rows_affected())
    }

    /// `(id, key)` pairs of a master table, for the lookup maps.
    pub fn fetch_id_pairs(
        &self,
        table: &str,
        id_col: &str,
        key_col: &str,
    ) -> Result<Vec<(i64, Option<String>)>> {
        let sql = format!("SELECT {id_col}, {key_col} FROM {table}");
        let rows = self.rt.block_on(sqlx::query(&sql).fetch_all(&self.pool))?;
        let mut pairs = Vec::with_capacity(rows.len());
        for row in rows {
            pairs.push((row.try_get::<i64, _>(0)?, row.try_get::<Option<String>, _>(1)?));
        }
        Ok(pairs)
    }

    pub fn fetch_scalar(&self, sql: &str) -> Result<i64> {
        let row = self.rt.block_on(sqlx::query(sql).fetch_one(&self.pool))?;
        Ok(row.try_get::<i64, _>(0)?)
    }
}
