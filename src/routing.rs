//! Server/client routing of synthesized expressions and the client-side
//! action emitted when the client has to evaluate.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use strum_macros::Display;
use tracing::{debug, warn};

use crate::descriptor::VariableSourceDescriptor;
use crate::eval::evaluator::with_implicit_return;
use crate::session::SessionState;
use crate::template::{infer_value_type, SubstituteMode, TemplateEngine};
use crate::tokenizer::token::{Token, Tokenizer};
use crate::variable::VariablePool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ExecutionRoute {
    ServerEvaluate,
    ClientEvaluate,
}

/// Picks where `expression` runs.
///
/// Only web sessions can evaluate on the client, and only expressions that
/// depend on the client (flagged custom expressions and the moment of day).
#[tracing::instrument(level = "debug", skip_all, fields(kind = %descriptor.kind()))]
pub fn route(
    descriptor: &VariableSourceDescriptor,
    expression: Option<&str>,
    session: &SessionState,
) -> ExecutionRoute {
    let client_dependent = matches!(
        descriptor,
        VariableSourceDescriptor::Custom {
            executed_on_client: true,
            ..
        } | VariableSourceDescriptor::MomentOfDay
    );
    let route = if expression.is_some() && !session.is_messaging_channel() && client_dependent {
        ExecutionRoute::ClientEvaluate
    } else {
        ExecutionRoute::ServerEvaluate
    };
    debug!(%route, "routed");
    route
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptArg {
    pub id: String,
    pub value: JsonValue,
}

/// A standalone function body plus the variables it reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptToExecute {
    pub content: String,
    pub args: Vec<ScriptArg>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetVariableAction {
    pub script_to_execute: ScriptToExecute,
}

/// Instruction for the client runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientSideAction {
    #[serde(rename_all = "camelCase")]
    SetVariable {
        set_variable: SetVariableAction,
        expects_dedicated_reply: bool,
    },
}

impl ClientSideAction {
    pub fn set_variable(script_to_execute: ScriptToExecute) -> Self {
        ClientSideAction::SetVariable {
            set_variable: SetVariableAction { script_to_execute },
            expects_dedicated_reply: true,
        }
    }
}

/// Builds the script handed to the client.
///
/// Placeholders become variable ids, and every pool variable the script
/// names is passed along with its inferred value.
pub fn build_client_script(
    pool: &VariablePool,
    expression: &str,
    templates: &dyn TemplateEngine,
) -> ScriptToExecute {
    let content = templates.substitute(pool, &with_implicit_return(expression), SubstituteMode::Id);
    let referenced = referenced_identifiers(&content);
    let args = pool
        .iter()
        .filter(|variable| match &referenced {
            Some(names) => names.contains(variable.id.as_str()),
            None => true,
        })
        .map(|variable| ScriptArg {
            id: variable.id.clone(),
            value: variable
                .value
                .as_ref()
                .map(infer_value_type)
                .unwrap_or(JsonValue::Null),
        })
        .collect();
    ScriptToExecute { content, args }
}

// None when the script cannot be tokenized; the client then gets every variable
fn referenced_identifiers(content: &str) -> Option<HashSet<String>> {
    match Tokenizer::new().tokenize(content) {
        Ok(spans) => Some(
            spans
                .into_iter()
                .filter_map(|span| match span.token {
                    Token::Identifier(name) => Some(name),
                    _ => None,
                })
                .collect(),
        ),
        Err(e) => {
            warn!("could not tokenize client script: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::session::{Channel, Contact};
    use crate::template::PlaceholderTemplate;
    use crate::variable::Variable;

    fn whatsapp() -> SessionState {
        SessionState::default().with_channel(Channel::WhatsApp {
            contact: Contact::default(),
        })
    }

    fn custom(executed_on_client: bool) -> VariableSourceDescriptor {
        VariableSourceDescriptor::Custom {
            expression: Some("1".to_string()),
            executed_on_client,
        }
    }

    #[test]
    fn test_moment_of_day_routes_by_channel() {
        let descriptor = VariableSourceDescriptor::MomentOfDay;
        assert_eq!(
            route(&descriptor, Some("script"), &SessionState::default()),
            ExecutionRoute::ClientEvaluate
        );
        assert_eq!(route(&descriptor, Some("script"), &whatsapp()), ExecutionRoute::ServerEvaluate);
    }

    #[test]
    fn test_custom_routes_by_flag() {
        let web = SessionState::default();
        assert_eq!(route(&custom(true), Some("1"), &web), ExecutionRoute::ClientEvaluate);
        assert_eq!(route(&custom(false), Some("1"), &web), ExecutionRoute::ServerEvaluate);
        assert_eq!(route(&custom(true), None, &web), ExecutionRoute::ServerEvaluate);
        assert_eq!(route(&custom(true), Some("1"), &whatsapp()), ExecutionRoute::ServerEvaluate);
    }

    #[test]
    fn test_other_descriptors_stay_on_server() {
        let web = SessionState::default();
        for descriptor in [
            VariableSourceDescriptor::Now { time_zone: None },
            VariableSourceDescriptor::RandomId,
            VariableSourceDescriptor::EnvironmentName,
        ] {
            assert_eq!(route(&descriptor, Some("x"), &web), ExecutionRoute::ServerEvaluate);
        }
    }

    #[test]
    fn test_build_client_script_binds_referenced_variables() {
        let pool = VariablePool::new(vec![
            Variable::new("v1", "Count").with_value("41"),
            Variable::new("v2", "Unused").with_value("x"),
            Variable::new("v3", "Empty"),
        ])
        .unwrap();
        let script =
            build_client_script(&pool, "{{Count}} + ({{Empty}} ?? 1)", &PlaceholderTemplate);
        assert_eq!(script.content, "return v1 + (v3 ?? 1)");
        assert_eq!(
            script.args,
            vec![
                ScriptArg {
                    id: "v1".to_string(),
                    value: json!(41),
                },
                ScriptArg {
                    id: "v3".to_string(),
                    value: JsonValue::Null,
                },
            ]
        );
    }

    #[test]
    fn test_client_action_wire_shape() {
        let action = ClientSideAction::set_variable(ScriptToExecute {
            content: "return 1".to_string(),
            args: vec![],
        });
        assert_eq!(
            serde_json::to_value(&action).unwrap(),
            json!({
                "type": "setVariable",
                "setVariable": {"scriptToExecute": {"content": "return 1", "args": []}},
                "expectsDedicatedReply": true
            })
        );
    }
}
