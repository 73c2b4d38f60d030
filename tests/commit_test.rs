mod common;

use flowvar::{Variable, VariablePool};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::{json, Value as JsonValue};

fn pool_strategy() -> impl Strategy<Value = VariablePool> {
    prop::collection::vec(prop::option::of("[a-zA-Z0-9]{0,6}"), 1..8).prop_map(|values| {
        let variables = values
            .into_iter()
            .enumerate()
            .map(|(i, value)| {
                let variable = Variable::new(format!("v{}", i + 1), format!("Var{}", i + 1));
                match value {
                    Some(value) => variable.with_value(value),
                    None => variable,
                }
            })
            .collect();
        VariablePool::new(variables).unwrap()
    })
}

proptest! {
    #[test]
    fn test_commit_touches_only_the_target(pool in pool_strategy(), new_value in "[a-z]{1,6}") {
        let before = pool.clone();
        let updated = pool.commit("v1", JsonValue::String(new_value.clone()));

        prop_assert!(!updated.ptr_eq(&pool));
        prop_assert_eq!(&pool, &before);
        prop_assert_eq!(updated.len(), pool.len());
        prop_assert_eq!(
            updated.get("v1").unwrap().value.clone(),
            Some(JsonValue::String(new_value))
        );
        for (old, new) in pool.iter().zip(updated.iter()).skip(1) {
            prop_assert_eq!(old, new);
        }
    }

    #[test]
    fn test_commit_unknown_id_is_identity(pool in pool_strategy()) {
        let updated = pool.commit("not-there", json!("x"));
        prop_assert_eq!(&updated, &pool);
    }
}

#[test]
fn test_commit_null_clears() {
    let pool = VariablePool::new(vec![Variable::new("v1", "A").with_value("x")]).unwrap();
    let cleared = pool.commit("v1", JsonValue::Null);
    assert_eq!(cleared.get("v1").unwrap().value, None);
    assert_eq!(pool.get("v1").unwrap().value, Some(json!("x")));
}
