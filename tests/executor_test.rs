mod common;

use flowvar::eval::fetch::MockFetcher;
use flowvar::routing::ScriptArg;
use flowvar::{
    ClientSideAction, EngineConfig, Error, ExecuteBlockResponse, ExecuteRequest, SessionState,
    Variable, VariablePool,
};
use mockall::predicate::function;
use pretty_assertions::assert_eq;
use serde_json::json;

use common::{block, executor, executor_with, quiet_fetcher};

fn session() -> SessionState {
    SessionState::new(
        VariablePool::new(vec![
            Variable::new("v_name", "Name").with_value("Ada"),
            Variable::new("v_count", "Count").with_value("41"),
            Variable::new("v_out", "Output"),
        ])
        .unwrap(),
    )
}

#[test]
fn test_client_evaluated_custom_expression() {
    let options = json!({
        "variableId": "v_out",
        "expressionToEvaluate": "{{Count}} * 2",
        "isExecutedOnClient": true
    });
    let response = executor().execute(&block(options), &session()).unwrap();
    assert_eq!(response.outgoing_edge_id.as_deref(), Some("edge-1"));
    assert!(response.new_session_state.is_none());

    let actions = response.client_side_actions.unwrap();
    let ClientSideAction::SetVariable { set_variable, .. } = &actions[0];
    assert_eq!(set_variable.script_to_execute.content, "return v_count * 2");
    assert_eq!(
        set_variable.script_to_execute.args,
        vec![ScriptArg {
            id: "v_count".to_string(),
            value: json!(41),
        }]
    );
}

#[test]
fn test_client_reply_is_committed() {
    let session = session();
    let executor = executor();
    let updated = executor.apply_client_reply(&session, "v_out", json!(82));
    assert_eq!(updated.variables.get("v_out").unwrap().value, Some(json!(82)));
    assert_eq!(session.variables.get("v_out").unwrap().value, None);
}

#[test]
fn test_malformed_options_abort_the_block() {
    let options = json!({
        "variableId": "v_out",
        "type": "Map item with same index",
        "mapListItemParams": {"baseListVariableId": "a"}
    });
    let result = executor().execute(&block(options), &session());
    assert!(matches!(result, Err(Error::Descriptor(_))));
}

#[test]
fn test_invalid_time_zone_surfaces() {
    let options = json!({
        "variableId": "v_out",
        "type": "Yesterday",
        "timeZone": "Atlantis/Capital"
    });
    let result = executor().execute(&block(options), &session());
    assert!(matches!(result, Err(Error::Synthesis(_))));
}

#[test]
fn test_templated_time_zone() {
    let session = SessionState::new(
        VariablePool::new(vec![
            Variable::new("v_zone", "Zone").with_value("Asia/Kolkata"),
            Variable::new("v_out", "Output"),
        ])
        .unwrap(),
    );
    let options = json!({"variableId": "v_out", "type": "Tomorrow", "timeZone": "{{Zone}}"});
    let state = executor().execute(&block(options), &session).unwrap().new_session_state.unwrap();
    assert_eq!(
        state.variables.get("v_out").unwrap().value,
        Some(json!("2024-03-03T04:45:00+05:30"))
    );
}

fn evaluated(config: &EngineConfig, expression: &str) -> Option<serde_json::Value> {
    let options = json!({"variableId": "v_out", "expressionToEvaluate": expression});
    let state = executor_with(config, quiet_fetcher())
        .execute(&block(options), &session())
        .unwrap()
        .new_session_state
        .unwrap();
    state.variables.get("v_out").unwrap().value.clone()
}

#[test]
fn test_runaway_loop_falls_back_to_text() {
    let config = EngineConfig::from_str(r#"{"sandbox": {"max_steps": 5000}}"#).unwrap();
    let expression = "let i = 0; while (true) { i += 1 } return i";
    assert_eq!(evaluated(&config, expression), Some(json!(expression)));
}

#[test]
fn test_deep_parentheses_fall_back_to_text() {
    let expression = format!("{}1{}", "(".repeat(500), ")".repeat(500));
    assert_eq!(evaluated(&EngineConfig::default(), &expression), Some(json!(expression)));

    let expression = format!("{}1{}", "(".repeat(20), ")".repeat(20));
    assert_eq!(evaluated(&EngineConfig::default(), &expression), Some(json!(1)));
}

#[test]
fn test_long_chains_fall_back_to_text() {
    let config = EngineConfig::default();
    assert_eq!(evaluated(&config, &vec!["1"; 100].join("+")), Some(json!(100)));

    for length in [200, 5000] {
        let expression = vec!["1"; length].join("+");
        assert_eq!(evaluated(&config, &expression), Some(json!(expression)));
    }
}

#[test]
fn test_oversized_values_fall_back_to_text() {
    let config = EngineConfig::default();
    for expression in [
        "let s = 'x'; let i = 0; while (i < 40) { s = s + s; i = i + 1 } return s.length",
        "let a = [1]; let i = 0; while (i < 40) { a.push(a); i += 1 } return a.length",
        "let a = []; let i = 0; while (i < 1000) { a = [a]; i += 1 } return 'done'",
    ] {
        assert_eq!(evaluated(&config, expression), Some(json!(expression)));
    }

    let config = EngineConfig::from_str(r#"{"sandbox": {"max_value_len": 2000000}}"#).unwrap();
    let expression =
        "let s = 'x'; let i = 0; while (i < 20) { s = s + s; i = i + 1 } return s.length";
    assert_eq!(evaluated(&config, expression), Some(json!(1_048_576)));
}

#[test]
fn test_fetch_is_handed_to_the_fetcher() {
    let mut fetcher = MockFetcher::new();
    fetcher
        .expect_fetch()
        .with(function(|request: &flowvar::eval::FetchRequest| {
            request.url == "https://hooks.example.com/ping"
                && request.method == "POST"
                && request.body.as_deref() == Some(r#"{"name":"Ada"}"#)
        }))
        .times(1)
        .return_const(());
    let expression = r#"fetch("https://hooks.example.com/ping", {
        method: "POST",
        body: { name: {{Name}} }
    });
    return "sent""#;
    let options = json!({"variableId": "v_out", "expressionToEvaluate": expression});
    let state = executor_with(&EngineConfig::default(), fetcher)
        .execute(&block(options), &session())
        .unwrap()
        .new_session_state
        .unwrap();
    assert_eq!(state.variables.get("v_out").unwrap().value, Some(json!("sent")));
}

#[test]
fn test_disabled_fetch_is_dropped() {
    let config = EngineConfig::from_str(r#"{"sandbox": {"allow_fetch": false}}"#).unwrap();
    let expression = r#"fetch("https://hooks.example.com/ping"); return 1"#;
    let options = json!({"variableId": "v_out", "expressionToEvaluate": expression});
    let state = executor_with(&config, quiet_fetcher())
        .execute(&block(options), &session())
        .unwrap()
        .new_session_state
        .unwrap();
    assert_eq!(state.variables.get("v_out").unwrap().value, Some(json!(1)));
}

#[test]
fn test_session_ids() {
    let session = session().with_queued_result_id("result-42");
    let state = executor()
        .execute(&block(json!({"variableId": "v_out", "type": "Result ID"})), &session)
        .unwrap()
        .new_session_state
        .unwrap();
    assert_eq!(state.variables.get("v_out").unwrap().value, Some(json!("result-42")));
    assert_eq!(state.queued_result_id.as_deref(), Some("result-42"));

    let state = executor()
        .execute(&block(json!({"variableId": "v_out", "type": "Random ID"})), &session)
        .unwrap()
        .new_session_state
        .unwrap();
    assert_eq!(state.variables.get("v_out").unwrap().value, Some(json!("id-0001")));
}

#[test]
fn test_request_and_response_wire_format() {
    let request: ExecuteRequest = serde_json::from_value(json!({
        "block": {
            "id": "block-1",
            "outgoingEdgeId": "edge-1",
            "options": {"variableId": "v_out", "type": "Environment name"}
        },
        "session": {
            "variables": [{"id": "v_out", "name": "Output"}],
            "channel": {"type": "whatsApp", "contact": {"name": "Ada"}}
        }
    }))
    .unwrap();
    let response = executor().execute(&request.block, &request.session).unwrap();
    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!({
            "outgoingEdgeId": "edge-1",
            "newSessionState": {
                "variables": [{"id": "v_out", "name": "Output", "value": "whatsapp"}],
                "channel": {"type": "whatsApp", "contact": {"name": "Ada", "phoneNumber": null}}
            }
        })
    );
    let decoded: ExecuteBlockResponse =
        serde_json::from_value(serde_json::to_value(&response).unwrap()).unwrap();
    assert_eq!(decoded, response);
}
