//! MSSQL connection pool and `Connection` adapter, backed by `tiberius`
//! and `bb8-tiberius`.

use async_trait::async_trait;
use bb8::PooledConnection;
use flowgate_config::DataSourceSpec;
use flowgate_error::{FlowgateError, Result};
use futures_util::TryStreamExt as _;
use serde_json::Value;
use tiberius::{Config, QueryItem};

use crate::{
    traits::Connection,
    types::{ExecResult, QueryParam, RowMap},
};

pub async fn build_pool(spec: &DataSourceSpec) -> Result<bb8::Pool<bb8_tiberius::ConnectionManager>> {
    let config = Config::from_ado_string(&spec.host)
        .map_err(|e| FlowgateError::driver(format!("invalid mssql connection string: {e}")))?;
    let manager = bb8_tiberius::ConnectionManager::new(config);
    bb8::Pool::builder()
        .max_size(spec.pool.max)
        .min_idle(Some(spec.pool.min_idle))
        .connection_timeout(std::time::Duration::from_millis(spec.pool.connection_timeout_ms))
        .idle_timeout(Some(std::time::Duration::from_millis(spec.pool.idle_timeout_ms)))
        .build(manager)
        .await
        .map_err(|e| FlowgateError::driver(format!("mssql pool init failed: {e}")))
}

pub async fn checkout(pool: &bb8::Pool<bb8_tiberius::ConnectionManager>) -> Result<Box<dyn Connection>> {
    let conn = pool.get_owned().await.map_err(|e| FlowgateError::driver(format!("mssql checkout failed: {e}")))?;
    Ok(Box::new(MssqlConnection { conn }))
}

struct MssqlConnection {
    conn: PooledConnection<'static, bb8_tiberius::ConnectionManager>,
}

fn bind_sql(sql: &str, args: &[QueryParam]) -> (String, Vec<tiberius::ColumnData<'static>>) {
    let values = args
        .iter()
        .map(|a| match a {
            QueryParam::Null => tiberius::ColumnData::Bit(None),
            QueryParam::Bool(b) => tiberius::ColumnData::Bit(Some(*b)),
            QueryParam::Int(i) => tiberius::ColumnData::I64(Some(*i)),
            QueryParam::Double(d) => tiberius::ColumnData::F64(Some(*d)),
            QueryParam::Text(s) => tiberius::ColumnData::String(Some(s.clone().into())),
        })
        .collect();
    (sql.to_string(), values)
}

#[async_trait]
impl Connection for MssqlConnection {
    async fn query(&mut self, sql: &str, args: &[QueryParam]) -> Result<Vec<RowMap>> {
        let (sql, values) = bind_sql(sql, args);
        let mut query = tiberius::Query::new(sql);
        for value in values {
            query.bind(value);
        }
        let mut stream =
            query.query(&mut self.conn).await.map_err(|e| FlowgateError::driver(format!("mssql query: {e}")))?;

        let mut out = Vec::new();
        while let Some(item) =
            stream.try_next().await.map_err(|e| FlowgateError::driver(format!("mssql row stream: {e}")))?
        {
            if let QueryItem::Row(row) = item {
                out.push(mssql_row_to_map(&row));
            }
        }
        Ok(out)
    }

    async fn execute(&mut self, sql: &str, args: &[QueryParam]) -> Result<ExecResult> {
        let (sql, values) = bind_sql(sql, args);
        let mut query = tiberius::Query::new(sql);
        for value in values {
            query.bind(value);
        }
        let result =
            query.execute(&mut self.conn).await.map_err(|e| FlowgateError::driver(format!("mssql execute: {e}")))?;
        let affected = result.rows_affected().iter().sum();
        Ok(ExecResult { affected_rows: affected, generated_key: None })
    }

    async fn begin(&mut self) -> Result<()> {
        self.conn
            .simple_query("BEGIN TRANSACTION")
            .await
            .map_err(|e| FlowgateError::driver(format!("mssql begin: {e}")))?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.conn
            .simple_query("COMMIT TRANSACTION")
            .await
            .map_err(|e| FlowgateError::driver(format!("mssql commit: {e}")))?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.conn
            .simple_query("ROLLBACK TRANSACTION")
            .await
            .map_err(|e| FlowgateError::driver(format!("mssql rollback: {e}")))?;
        Ok(())
    }

    async fn set_autocommit(&mut self, _on: bool) -> Result<()> {
        // Tiberius sessions default to autocommit; explicit
        // BEGIN/COMMIT/ROLLBACK already bracket the envelope.
        Ok(())
    }
}

fn mssql_row_to_map(row: &tiberius::Row) -> RowMap {
    let mut map = RowMap::new();
    for (idx, col) in row.columns().iter().enumerate() {
        map.insert(col.name().to_string(), decode_column(row, idx));
    }
    map
}

/// tiberius exposes no `type_info()` equivalent on the result row, so the
/// column's JSON type is found by trying narrower/likelier Rust types in
/// turn and keeping the first one the driver can decode — including the
/// windowed `TotalCount` column and integer PKs, never just text.
fn decode_column(row: &tiberius::Row, idx: usize) -> Value {
    if let Some(v) = row.try_get::<i32, _>(idx).ok().flatten() {
        Value::from(v)
    } else if let Some(v) = row.try_get::<i64, _>(idx).ok().flatten() {
        Value::from(v)
    } else if let Some(v) = row.try_get::<f64, _>(idx).ok().flatten() {
        serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number)
    } else if let Some(v) = row.try_get::<bool, _>(idx).ok().flatten() {
        Value::Bool(v)
    } else if let Some(v) = row.try_get::<&str, _>(idx).ok().flatten() {
        Value::String(v.to_string())
    } else {
        Value::Null
    }
}
