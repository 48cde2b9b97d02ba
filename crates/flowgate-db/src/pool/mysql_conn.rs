//! MySQL connection pool and `Connection` adapter, backed by `sqlx`.

use async_trait::async_trait;
use flowgate_config::DataSourceSpec;
use flowgate_error::{FlowgateError, Result};
use serde_json::Value;
use sqlx::{mysql::MySqlPoolOptions, pool::PoolConnection, Column, MySql, Row, TypeInfo};

use crate::{
    traits::Connection,
    types::{ExecResult, QueryParam, RowMap},
};

pub async fn build_pool(spec: &DataSourceSpec) -> Result<sqlx::MySqlPool> {
    MySqlPoolOptions::new()
        .max_connections(spec.pool.max)
        .min_connections(spec.pool.min_idle)
        .acquire_timeout(std::time::Duration::from_millis(spec.pool.connection_timeout_ms))
        .idle_timeout(std::time::Duration::from_millis(spec.pool.idle_timeout_ms))
        .connect(&spec.host)
        .await
        .map_err(|e| FlowgateError::driver(format!("mysql pool init failed: {e}")))
}

pub async fn checkout(pool: &sqlx::MySqlPool) -> Result<Box<dyn Connection>> {
    let conn = pool.acquire().await.map_err(|e| FlowgateError::driver(format!("mysql checkout failed: {e}")))?;
    Ok(Box::new(MySqlConnection { conn }))
}

struct MySqlConnection {
    conn: PoolConnection<MySql>,
}

fn bind<'q>(
    mut query: sqlx::query::Query<'q, MySql, sqlx::mysql::MySqlArguments>,
    args: &'q [QueryParam],
) -> sqlx::query::Query<'q, MySql, sqlx::mysql::MySqlArguments> {
    for arg in args {
        query = match arg {
            QueryParam::Null => query.bind(None::<String>),
            QueryParam::Bool(b) => query.bind(*b),
            QueryParam::Int(i) => query.bind(*i),
            QueryParam::Double(d) => query.bind(*d),
            QueryParam::Text(s) => query.bind(s),
        };
    }
    query
}

#[async_trait]
impl Connection for MySqlConnection {
    async fn query(&mut self, sql: &str, args: &[QueryParam]) -> Result<Vec<RowMap>> {
        let query = bind(sqlx::query(sql), args);
        let rows =
            query.fetch_all(&mut *self.conn).await.map_err(|e| FlowgateError::driver(format!("mysql query: {e}")))?;
        Ok(rows.into_iter().map(row_to_map).collect())
    }

    async fn execute(&mut self, sql: &str, args: &[QueryParam]) -> Result<ExecResult> {
        let query = bind(sqlx::query(sql), args);
        let result = query
            .execute(&mut *self.conn)
            .await
            .map_err(|e| FlowgateError::driver(format!("mysql execute: {e}")))?;
        Ok(ExecResult {
            affected_rows: result.rows_affected(),
            generated_key: i64::try_from(result.last_insert_id()).ok(),
        })
    }

    async fn begin(&mut self) -> Result<()> {
        sqlx::query("START TRANSACTION")
            .execute(&mut *self.conn)
            .await
            .map_err(|e| FlowgateError::driver(format!("mysql begin: {e}")))?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        sqlx::query("COMMIT")
            .execute(&mut *self.conn)
            .await
            .map_err(|e| FlowgateError::driver(format!("mysql commit: {e}")))?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        sqlx::query("ROLLBACK")
            .execute(&mut *self.conn)
            .await
            .map_err(|e| FlowgateError::driver(format!("mysql rollback: {e}")))?;
        Ok(())
    }

    async fn set_autocommit(&mut self, on: bool) -> Result<()> {
        let v = if on { 1 } else { 0 };
        sqlx::query(&format!("SET autocommit = {v}"))
            .execute(&mut *self.conn)
            .await
            .map_err(|e| FlowgateError::driver(format!("mysql set autocommit: {e}")))?;
        Ok(())
    }
}

fn row_to_map(row: sqlx::mysql::MySqlRow) -> RowMap {
    let mut map = RowMap::new();
    for col in row.columns() {
        let name = col.name().to_string();
        map.insert(name, decode_column(&row, col.ordinal(), col.type_info().name()));
    }
    map
}

/// Dispatch on MySQL's column type name so numeric and boolean columns
/// (including the windowed `TotalCount`) decode to their real JSON type
/// instead of always falling back to a string.
fn decode_column(row: &sqlx::mysql::MySqlRow, idx: usize, type_name: &str) -> Value {
    match type_name.to_ascii_uppercase().as_str() {
        "BOOLEAN" | "BOOL" => row.try_get::<Option<bool>, _>(idx).ok().flatten().map_or(Value::Null, Value::Bool),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "INTEGER" | "BIGINT" | "YEAR" => row
            .try_get::<Option<i64>, _>(idx)
            .ok()
            .flatten()
            .map_or(Value::Null, |i| Value::Number(i.into())),
        "FLOAT" | "DOUBLE" | "DECIMAL" | "NUMERIC" => row
            .try_get::<Option<f64>, _>(idx)
            .ok()
            .flatten()
            .and_then(serde_json::Number::from_f64)
            .map_or(Value::Null, Value::Number),
        _ => row.try_get::<Option<String>, _>(idx).ok().flatten().map_or(Value::Null, Value::String),
    }
}
