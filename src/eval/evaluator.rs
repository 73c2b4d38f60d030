use std::sync::Arc;

use chrono_tz::Tz;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use super::builtins::GLOBALS;
use super::context::Sandbox;
use super::expression::ExpressionEvaluator;
use super::fetch::{Fetcher, HttpFetcher};
use super::statement::StatementEvaluator;
use super::value::Value;
use super::EvalResult;
use crate::analyzer::parse_program;
use crate::config::SandboxConfig;
use crate::preprocessor::{Preprocessor, TokenPreprocessor};
use crate::template::{
    infer_value_type, sole_placeholder, PlaceholderTemplate, SubstituteMode, TemplateEngine,
};
use crate::timestamp::{Clock, SystemClock, TimeError};
use crate::tokenizer::token::Tokenizer;
use crate::variable::VariablePool;

lazy_static! {
    static ref RETURN_KEYWORD: Regex = Regex::new(r"\breturn\b").unwrap();
    static ref LEADING_ZERO_NUMBER: Regex = Regex::new(r"^[+-]?0\d+(\.\d+)?$").unwrap();
}

/// Turns an expression into a function body by prepending `return` when the
/// text has none.
pub fn with_implicit_return(expression: &str) -> String {
    if RETURN_KEYWORD.is_match(expression) {
        expression.to_string()
    } else {
        format!("return {}", expression)
    }
}

/// Entry point of the sandboxed evaluator.
pub struct Evaluator {
    config: SandboxConfig,
    time_zone: Tz,
    clock: Arc<dyn Clock>,
    fetcher: Arc<dyn Fetcher>,
    templates: Arc<dyn TemplateEngine>,
}

impl Evaluator {
    pub fn new(config: &SandboxConfig) -> Result<Self, TimeError> {
        let time_zone = config.zone()?;
        Ok(Self {
            config: config.clone(),
            time_zone,
            clock: Arc::new(SystemClock),
            fetcher: Arc::new(HttpFetcher::new(config.fetch_timeout)),
            templates: Arc::new(PlaceholderTemplate),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_templates(mut self, templates: Arc<dyn TemplateEngine>) -> Self {
        self.templates = templates;
        self
    }

    /// Evaluates `expression` against `pool`. Never fails: on any error the
    /// expression's template-substituted text is returned instead.
    #[tracing::instrument(level = "debug", skip(self, pool))]
    pub fn evaluate(&self, expression: &str, pool: &VariablePool) -> JsonValue {
        let trimmed = expression.trim();
        if let Some(name) = sole_placeholder(trimmed) {
            return pool
                .find_by_name(name)
                .and_then(|variable| variable.value.clone())
                .unwrap_or(JsonValue::Null);
        }
        if LEADING_ZERO_NUMBER.is_match(trimmed) {
            return JsonValue::String(trimmed.to_string());
        }
        match self.run_script(expression, pool) {
            Ok(value) => value,
            Err(e) => {
                warn!("expression evaluation failed, using text: {}", e);
                let text = self.templates.substitute(pool, expression, SubstituteMode::Value);
                JsonValue::String(text)
            }
        }
    }

    /// Runs `expression` as a function body in a fresh sandbox.
    pub fn run_script(&self, expression: &str, pool: &VariablePool) -> EvalResult<JsonValue> {
        let body = self
            .templates
            .substitute(pool, &with_implicit_return(expression), SubstituteMode::Id);

        let tokens = TokenPreprocessor.process(Tokenizer::new().tokenize(&body)?);
        let program = parse_program(&tokens)?;

        let mut sandbox = Sandbox::new(&self.config);
        for (name, builtin) in GLOBALS {
            sandbox.bind_global(*name, Value::Builtin(*builtin));
        }
        for variable in pool.iter() {
            let value = variable
                .value
                .as_ref()
                .map(|raw| Value::from(infer_value_type(raw)))
                .unwrap_or(Value::Null);
            sandbox.bind_global(variable.id.clone(), value);
        }

        let evaluator = StatementEvaluator::new(ExpressionEvaluator::new(
            self.clock.as_ref(),
            self.time_zone,
            self.fetcher.as_ref(),
            self.config.allow_fetch,
        ));
        let value = evaluator.eval_program(&program, &mut sandbox)?;
        debug!(steps = sandbox.steps(), "script finished");
        Ok(value.to_json())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::eval::fetch::MockFetcher;
    use crate::timestamp::FixedClock;
    use crate::variable::Variable;

    fn evaluator() -> Evaluator {
        let mut fetcher = MockFetcher::new();
        fetcher.expect_fetch().never();
        Evaluator::new(&SandboxConfig::default())
            .unwrap()
            .with_clock(Arc::new(FixedClock(
                Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap().into(),
            )))
            .with_fetcher(Arc::new(fetcher))
    }

    fn pool() -> VariablePool {
        VariablePool::new(vec![
            Variable::new("v1", "Name").with_value("Ada"),
            Variable::new("v2", "Count").with_value("41"),
            Variable::new("v3", "Code").with_value("0123"),
            Variable::new("v4", "Tags").with_value(json!(["a", "b"])),
            Variable::new("v5", "Empty"),
        ])
        .unwrap()
    }

    #[test]
    fn test_sole_placeholder_returns_stored_value() {
        let evaluator = evaluator();
        assert_eq!(evaluator.evaluate("{{Count}}", &pool()), json!("41"));
        assert_eq!(evaluator.evaluate(" {{Tags}} ", &pool()), json!(["a", "b"]));
        assert_eq!(evaluator.evaluate("{{Empty}}", &pool()), JsonValue::Null);
        assert_eq!(evaluator.evaluate("{{Unknown}}", &pool()), JsonValue::Null);
    }

    #[test]
    fn test_leading_zero_numbers_stay_text() {
        let evaluator = evaluator();
        assert_eq!(evaluator.evaluate("0123", &pool()), json!("0123"));
        assert_eq!(evaluator.evaluate("-007.5", &pool()), json!("-007.5"));
        assert_eq!(evaluator.evaluate("0.5", &pool()), json!(0.5));
    }

    #[test]
    fn test_expressions_see_inferred_values() {
        let evaluator = evaluator();
        assert_eq!(evaluator.evaluate("{{Count}} + 1", &pool()), json!(42));
        assert_eq!(evaluator.evaluate("{{Code}}", &pool()), json!("0123"));
        assert_eq!(evaluator.evaluate("{{Code}} + 1", &pool()), json!("01231"));
        assert_eq!(evaluator.evaluate("{{Name}}.toUpperCase()", &pool()), json!("ADA"));
        assert_eq!(evaluator.evaluate("{{Empty}} ?? 'none'", &pool()), json!("none"));
        assert_eq!(evaluator.evaluate("{{Unknown}} === null", &pool()), json!(true));
    }

    #[test]
    fn test_explicit_return_is_kept() {
        let evaluator = evaluator();
        assert_eq!(
            evaluator.evaluate("const n = {{Count}}\nreturn n * 2", &pool()),
            json!(82)
        );
    }

    #[test]
    fn test_failures_fall_back_to_text() {
        let evaluator = evaluator();
        assert_eq!(evaluator.evaluate("Hello {{Name}}!", &pool()), json!("Hello Ada!"));
        assert_eq!(evaluator.evaluate("{{Name}}.nope()", &pool()), json!("Ada.nope()"));
        assert_eq!(
            evaluator.evaluate("while (true) {} return 1", &pool()),
            json!("while (true) {} return 1")
        );
    }

    #[test]
    fn test_sandbox_clock() {
        let evaluator = evaluator();
        assert_eq!(evaluator.evaluate("new Date().getHours()", &pool()), json!(9));
    }

    #[test]
    fn test_sandbox_time_zone() {
        let config = SandboxConfig {
            time_zone: Some("America/New_York".to_string()),
            ..SandboxConfig::default()
        };
        let evaluator = Evaluator::new(&config)
            .unwrap()
            .with_clock(Arc::new(FixedClock(
                Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap().into(),
            )));
        assert_eq!(evaluator.evaluate("new Date().getHours()", &VariablePool::empty()), json!(4));
    }

    #[test]
    fn test_invalid_sandbox_time_zone() {
        let config = SandboxConfig {
            time_zone: Some("Mars/Olympus".to_string()),
            ..SandboxConfig::default()
        };
        assert!(matches!(Evaluator::new(&config), Err(TimeError::InvalidTimeZone(_))));
    }

    #[test]
    fn test_evaluations_are_isolated() {
        let evaluator = evaluator();
        assert_eq!(evaluator.evaluate("leaked = 1; return leaked", &pool()), json!(1));
        assert_eq!(evaluator.evaluate("typeof leaked", &pool()), json!("undefined"));
    }
}
