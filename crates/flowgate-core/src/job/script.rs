//! The script-step plug point.
//!
//! The engine never embeds a Groovy/JavaScript/Python interpreter itself
//! — that stays an external collaborator. Each adapter owns
//! its own compile cache and sandboxing policy; the core only calls
//! [`Executor::execute`].

use async_trait::async_trait;
use flowgate_error::Result;
use serde_json::Value;

/// A pluggable script engine. `bindings` is a read-write snapshot of the
/// job's step context: implementations may read prior steps' results and
/// return a value to be published back under the current step's name.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run `source` with `bindings` available to it, returning whatever
    /// value the script produces.
    async fn execute(&self, source: &str, bindings: &serde_json::Map<String, Value>) -> Result<Value>;

    /// The `scriptType` this adapter answers to (`"js"`, `"groovy"`,
    /// `"python"`, ...), matched case-insensitively by the job executor.
    fn script_type(&self) -> &'static str;
}

/// A test double that always succeeds with a fixed value, ignoring the
/// script source and bindings. Useful for exercising job-context
/// threading without a real interpreter.
pub struct NoopExecutor {
    /// The `scriptType` this double answers to.
    pub script_type: &'static str,
    /// The fixed value returned from every [`Executor::execute`] call.
    pub result: Value,
}

#[async_trait]
impl Executor for NoopExecutor {
    async fn execute(&self, _source: &str, _bindings: &serde_json::Map<String, Value>) -> Result<Value> {
        Ok(self.result.clone())
    }

    fn script_type(&self) -> &'static str {
        self.script_type
    }
}
