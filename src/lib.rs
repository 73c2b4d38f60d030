//! # flowvar: set-variable resolution for conversational flows
//!
//! Computes the new value of a flow variable from a declarative source
//! ("now in Tokyo", "append to list", "custom expression", ...) and the
//! session's variable pool.
//!
//! ## Pipeline
//!
//! ```text
//! SetVariableOptions → Descriptor → Synthesizer → Router ─┬─ client script
//!                                                         └─ Evaluator → commit
//! ```
//!
//! - [`descriptor`]: persisted options and the closed [`VariableSourceDescriptor`]
//! - [`timestamp`]: ISO-8601 instants, optionally in an IANA zone
//! - [`synthesizer`]: descriptor to script text
//! - [`routing`]: server or client evaluation, client-side actions
//! - [`eval`]: sandboxed interpreter over the [`tokenizer`], [`preprocessor`]
//!   and [`analyzer`] stages
//! - [`variable`]: copy-on-write variable pool
//! - [`block`]: the executor tying the stages together
//!
//! ## Example
//!
//! ```ignore
//! use flowvar::{EngineConfig, SetVariableBlock, SetVariableExecutor, SessionState};
//!
//! let executor = SetVariableExecutor::new(&EngineConfig::default())?;
//! let response = executor.execute(&block, &session)?;
//! ```

pub mod analyzer;
pub mod ast;
pub mod block;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod eval;
pub mod id;
pub mod preprocessor;
pub mod routing;
pub mod session;
pub mod synthesizer;
pub mod template;
pub mod timestamp;
pub mod tokenizer;
pub mod variable;

// Re-exports
pub use block::{ExecuteBlockResponse, ExecuteRequest, SetVariableBlock, SetVariableExecutor};
pub use config::{ConfigError, EngineConfig, SandboxConfig};
pub use descriptor::{validate_options, SetVariableOptions, VariableSourceDescriptor};
pub use error::{Error, InternalResult};
pub use eval::Evaluator;
pub use routing::{build_client_script, route, ClientSideAction, ExecutionRoute, ScriptToExecute};
pub use session::{Channel, Contact, SessionState};
pub use synthesizer::{synthesize, SynthesisError, Synthesizer};
pub use timestamp::{resolve_instant, TimeError};
pub use variable::{Variable, VariablePool};

#[cfg(test)]
#[ctor::ctor]
fn init_tests() {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
