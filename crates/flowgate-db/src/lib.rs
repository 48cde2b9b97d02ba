//! Dialect-aware driver adapter and SQL builder.
//!
//! This crate owns everything that talks dialect: placeholder syntax,
//! pagination shape, and the lazily-initialised connection pools behind
//! the `mysql`/`mssql`/`sqlite` Cargo features. It depends on
//! `flowgate-config` for the declarative shapes it compiles
//! (`EndpointDef`, `DbConfig`) but knows nothing about auth, rate
//! limiting or job orchestration — those live in `flowgate-core`.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::must_use_candidate, clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod builder;
pub mod dialect;
pub mod pool;
pub mod traits;
pub mod types;

pub use builder::{build_deep_page, build_list, build_modify, build_page, should_deep_page};
pub use dialect::{placeholder, page_clause, Context as DialectContext};
pub use pool::DriverAdapter;
pub use traits::Connection;
pub use types::{ExecResult, QueryParam, RowMap};
