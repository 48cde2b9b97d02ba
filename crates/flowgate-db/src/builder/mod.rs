//! Dialect-aware SQL compilation: `conditionSchema` → WHERE, and the four
//! endpoint operations (LIST, PAGE, DEEP_PAGE, MODIFY).
//!
//! Every `build_*` function is a pure, allocation-heavy transform from an
//! [`EndpointDef`] plus a resolved parameter map to `(sql, args)`. The
//! builder itself holds no state; a fresh [`Context`] is created per call
//! so `paramIndex` bookkeeping never leaks across compilations.

mod deep_page;
mod modify;
mod order_by;
mod page;
mod select;
mod util;
mod where_clause;

use std::collections::HashMap;

use flowgate_config::{Drive, EndpointDef};
use flowgate_error::Result;
use serde_json::Value;

use crate::{dialect::Context, types::QueryParam};

pub use deep_page::should_trigger as should_deep_page;

pub fn build_list(endpoint: &EndpointDef, params: &HashMap<String, Value>, dialect: Drive) -> Result<(String, Vec<QueryParam>)> {
    let mut ctx = Context::new(dialect);
    select::build(endpoint, params, &mut ctx)
}

pub fn build_page(endpoint: &EndpointDef, params: &HashMap<String, Value>, dialect: Drive) -> Result<(String, Vec<QueryParam>)> {
    let mut ctx = Context::new(dialect);
    page::build(endpoint, params, &mut ctx)
}

pub fn build_deep_page(endpoint: &EndpointDef, params: &HashMap<String, Value>, dialect: Drive) -> Result<(String, Vec<QueryParam>)> {
    let mut ctx = Context::new(dialect);
    deep_page::build(endpoint, params, &mut ctx)
}

pub fn build_modify(endpoint: &EndpointDef, params: &HashMap<String, Value>, dialect: Drive) -> Result<(String, Vec<QueryParam>)> {
    let mut ctx = Context::new(dialect);
    modify::build(endpoint, params, &mut ctx)
}
