//! # Set-Variable Block Executor
//!
//! Drives one set-variable block through the pipeline:
//!
//! ```text
//! options → descriptor → synthesize → route ─┬─ client: emit script, keep pool
//!                                            └─ server: evaluate → commit
//! ```
//!
//! The executor never mutates the incoming session. A server-side
//! assignment returns a new session snapshot; every other outcome returns
//! the outgoing edge only.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::config::EngineConfig;
use crate::descriptor::{SetVariableOptions, VariableSourceDescriptor};
use crate::error::InternalResult;
use crate::eval::{Evaluator, Fetcher};
use crate::id::IdGenerator;
use crate::routing::{build_client_script, route, ClientSideAction, ExecutionRoute};
use crate::session::SessionState;
use crate::synthesizer::Synthesizer;
use crate::template::{PlaceholderTemplate, TemplateEngine};
use crate::timestamp::Clock;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetVariableBlock {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outgoing_edge_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<SetVariableOptions>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteBlockResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outgoing_edge_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_session_state: Option<SessionState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_side_actions: Option<Vec<ClientSideAction>>,
}

impl ExecuteBlockResponse {
    fn edge(outgoing_edge_id: Option<String>) -> Self {
        Self {
            outgoing_edge_id,
            ..Default::default()
        }
    }
}

/// Input of the command line runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub block: SetVariableBlock,
    #[serde(default)]
    pub session: SessionState,
}

pub struct SetVariableExecutor {
    synthesizer: Synthesizer,
    evaluator: Evaluator,
    templates: Arc<dyn TemplateEngine>,
}

impl SetVariableExecutor {
    pub fn new(config: &EngineConfig) -> InternalResult<Self> {
        config.validate()?;
        Ok(Self {
            synthesizer: Synthesizer::new(),
            evaluator: Evaluator::new(&config.sandbox)?,
            templates: Arc::new(PlaceholderTemplate),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.synthesizer = self.synthesizer.with_clock(clock.clone());
        self.evaluator = self.evaluator.with_clock(clock);
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.synthesizer = self.synthesizer.with_id_generator(ids);
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.evaluator = self.evaluator.with_fetcher(fetcher);
        self
    }

    pub fn with_templates(mut self, templates: Arc<dyn TemplateEngine>) -> Self {
        self.synthesizer = self.synthesizer.with_templates(templates.clone());
        self.evaluator = self.evaluator.with_templates(templates.clone());
        self.templates = templates;
        self
    }

    /// Executes `block` against `session`.
    ///
    /// Fails only on malformed options or an invalid time zone; everything
    /// else degrades to taking the outgoing edge.
    #[tracing::instrument(
        level = "debug",
        skip(self, block, session),
        fields(block_id = %block.id)
    )]
    pub fn execute(
        &self,
        block: &SetVariableBlock,
        session: &SessionState,
    ) -> InternalResult<ExecuteBlockResponse> {
        let pass = || ExecuteBlockResponse::edge(block.outgoing_edge_id.clone());

        let Some(options) = block.options.as_ref() else {
            debug!("block has no options");
            return Ok(pass());
        };
        let Some(variable_id) = options.variable_id.as_deref() else {
            debug!("block has no target variable");
            return Ok(pass());
        };

        let descriptor = VariableSourceDescriptor::try_from(options)?;
        let Some(expression) = self.synthesizer.synthesize(&descriptor, session)? else {
            return Ok(pass());
        };

        match route(&descriptor, Some(&expression), session) {
            ExecutionRoute::ClientEvaluate => {
                let script =
                    build_client_script(&session.variables, &expression, self.templates.as_ref());
                Ok(ExecuteBlockResponse {
                    client_side_actions: Some(vec![ClientSideAction::set_variable(script)]),
                    ..pass()
                })
            }
            ExecutionRoute::ServerEvaluate => {
                if !session.variables.contains(variable_id) {
                    debug!("Variable {} not in pool, skipping evaluation", variable_id);
                    return Ok(pass());
                }
                let value = self.evaluator.evaluate(&expression, &session.variables);
                Ok(ExecuteBlockResponse {
                    new_session_state: Some(self.apply_client_reply(session, variable_id, value)),
                    ..pass()
                })
            }
        }
    }

    /// Commits a value for `variable_id`, typically the reply of a client
    /// that ran a [`ClientSideAction`].
    pub fn apply_client_reply(
        &self,
        session: &SessionState,
        variable_id: &str,
        reply: JsonValue,
    ) -> SessionState {
        session.with_variables(session.variables.commit(variable_id, reply))
    }
}
