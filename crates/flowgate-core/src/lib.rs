//! Parameter resolution, signature/rate-limit policy, transaction
//! coordination, request orchestration and job-flow execution.
//!
//! This crate is the top of the dependency stack: it wires
//! `flowgate-config` (declarative endpoint/job documents) and
//! `flowgate-db` (dialect-aware SQL compilation and connections) into
//! the two end-to-end call paths the engine exposes — a single endpoint
//! request ([`orchestrator::Orchestrator`]) and a job-flow
//! ([`job::JobExecutor`]).

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::must_use_candidate, clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod audit;
pub mod job;
pub mod orchestrator;
pub mod rate_limit;
pub mod signature;
pub mod transaction;
pub mod validate;

pub use job::{Executor, JobExecutor, JobResult, NoopExecutor, StepRecord};
pub use orchestrator::{Orchestrator, ResultEnvelope};
pub use rate_limit::RateLimiter;
pub use transaction::{datasource_key, JobRunContext};
