//! DEEP_PAGE: `ROW_NUMBER()`-windowed pagination, avoiding
//! the cost of a growing `OFFSET` at large page numbers.

use std::collections::HashMap;

use flowgate_config::EndpointDef;
use flowgate_error::{FlowgateError, Result};
use serde_json::Value;

use crate::{
    builder::{order_by, util, where_clause},
    dialect::Context,
    types::QueryParam,
};

pub fn build(endpoint: &EndpointDef, params: &HashMap<String, Value>, ctx: &mut Context) -> Result<(String, Vec<QueryParam>)> {
    let order = order_by::build(&endpoint.sort)
        .ok_or_else(|| FlowgateError::build("Deep pagination requires 'sort'"))?;

    let current_page = util::int_param(params, "current_page", 1);
    let page_size = util::int_param(params, "page_size", 10);
    let offset = util::shallow_offset(current_page, page_size);

    let fields = endpoint.field.join(", ");
    let mut inner = format!(
        "SELECT {fields}, ROW_NUMBER() OVER ({order}) AS rn, COUNT(*) OVER () AS TotalCount FROM {}",
        endpoint.table_name
    );

    let mut args = Vec::new();
    if let Some((clause, mut where_args)) = where_clause::build(&endpoint.condition_schema, params, ctx)? {
        inner.push_str(" WHERE ");
        inner.push_str(&clause);
        args.append(&mut where_args);
    }

    let lo = offset + 1;
    let hi = offset + page_size;
    let sql = format!("SELECT * FROM ({inner}) AS numbered_rows WHERE rn BETWEEN {lo} AND {hi}");

    Ok((sql, args))
}

/// Whether a request should be routed to [`build`] instead of the shallow
/// pager: explicit opt-in, or the configured threshold is exceeded.
#[must_use]
pub fn should_trigger(endpoint: &EndpointDef, current_page: i64, explicit: bool) -> bool {
    explicit || (endpoint.shallow_to_deep_threshold > 0 && current_page > i64::from(endpoint.shallow_to_deep_threshold))
}
