//! # Expression Synthesizer
//!
//! Maps a [`VariableSourceDescriptor`] onto the script that computes the
//! variable's new value. Variables are referenced by id, as free identifiers
//! the sandbox binds to their current values. `None` means "assign nothing".

use std::sync::Arc;

use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::debug;

use crate::descriptor::VariableSourceDescriptor;
use crate::id::{IdGenerator, UuidIdGenerator};
use crate::session::SessionState;
use crate::template::{PlaceholderTemplate, SubstituteMode, TemplateEngine};
use crate::timestamp::{resolve_instant, Clock, SystemClock, TimeError, Timestamp};
use crate::variable::VariablePool;

const MOMENT_OF_DAY_SCRIPT: &str = r#"const hours = new Date().getHours()
if (hours < 12) return "morning"
if (hours >= 12 && hours < 18) return "afternoon"
if (hours >= 18) return "evening"
if (hours >= 22 || hours < 6) return "night""#;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SynthesisError {
    #[error("Variable {0} is not in the pool")]
    MissingTargetVariable(String),
    #[error("No {0} available in this session")]
    UnresolvableValue(&'static str),
    #[error(transparent)]
    Time(#[from] TimeError),
}

/// Builds the script for `descriptor`.
///
/// Missing variables and unavailable session values are not errors for the
/// caller: they yield `Ok(None)`. Only an invalid time zone is returned as
/// an error.
#[tracing::instrument(level = "debug", skip_all, fields(kind = %descriptor.kind()))]
pub fn synthesize(
    descriptor: &VariableSourceDescriptor,
    session: &SessionState,
    now: Timestamp,
    ids: &dyn IdGenerator,
    templates: &dyn TemplateEngine,
) -> Result<Option<String>, SynthesisError> {
    match expression_for(descriptor, session, now, ids, templates) {
        Ok(expression) => {
            debug!(has_expression = expression.is_some(), "synthesized");
            Ok(expression)
        }
        Err(SynthesisError::Time(e)) => Err(SynthesisError::Time(e)),
        Err(e) => {
            debug!("no expression: {}", e);
            Ok(None)
        }
    }
}

fn expression_for(
    descriptor: &VariableSourceDescriptor,
    session: &SessionState,
    now: Timestamp,
    ids: &dyn IdGenerator,
    templates: &dyn TemplateEngine,
) -> Result<Option<String>, SynthesisError> {
    let pool = &session.variables;
    let expression = match descriptor {
        VariableSourceDescriptor::ContactName => {
            let name = session
                .contact()
                .and_then(|contact| contact.name.as_deref())
                .ok_or(SynthesisError::UnresolvableValue("contact name"))?;
            quote(name)
        }
        VariableSourceDescriptor::PhoneNumber => {
            let phone_number = session
                .contact()
                .and_then(|contact| contact.phone_number.as_deref())
                .ok_or(SynthesisError::UnresolvableValue("phone number"))?;
            quote(phone_number)
        }
        VariableSourceDescriptor::Now { time_zone }
        | VariableSourceDescriptor::Today { time_zone } => {
            quote(&zoned_instant(now, time_zone.as_deref(), pool, templates)?)
        }
        VariableSourceDescriptor::Tomorrow { time_zone } => {
            quote(&zoned_instant(now.shift_days(1), time_zone.as_deref(), pool, templates)?)
        }
        VariableSourceDescriptor::Yesterday { time_zone } => {
            quote(&zoned_instant(now.shift_days(-1), time_zone.as_deref(), pool, templates)?)
        }
        VariableSourceDescriptor::RandomId => quote(&ids.generate()),
        VariableSourceDescriptor::ResultId | VariableSourceDescriptor::UserId => {
            match &session.queued_result_id {
                Some(id) => quote(id),
                None => quote(&ids.generate()),
            }
        }
        VariableSourceDescriptor::MapItemWithSameIndex {
            base_list_var_id,
            base_item_var_id,
            target_list_var_id,
        } => {
            for id in [base_list_var_id, base_item_var_id, target_list_var_id] {
                require(pool, id)?;
            }
            format!(
                "const itemIndex = {}.indexOf({})\nreturn {}[itemIndex]",
                base_list_var_id, base_item_var_id, target_list_var_id
            )
        }
        VariableSourceDescriptor::AppendValues {
            target_var_id,
            item_expr,
        } => {
            let item = item_expr
                .as_deref()
                .map(|expr| templates.substitute(pool, expr, SubstituteMode::Value))
                .unwrap_or_default();
            let target = if pool.contains(target_var_id) {
                target_var_id.as_str()
            } else {
                "null"
            };
            format!(
                "const item = {item}\n\
                 if (!item) return {target}\n\
                 if (!{target}) return [item]\n\
                 if (!Array.isArray({target})) return [{target}, item]\n\
                 return {target}.concat(item)",
                item = quote(&item),
                target = target
            )
        }
        VariableSourceDescriptor::Empty => return Ok(None),
        VariableSourceDescriptor::MomentOfDay => MOMENT_OF_DAY_SCRIPT.to_string(),
        VariableSourceDescriptor::EnvironmentName => {
            quote(if session.is_messaging_channel() { "whatsapp" } else { "web" })
        }
        VariableSourceDescriptor::Custom { expression, .. } => {
            return Ok(expression
                .as_deref()
                .filter(|expression| !expression.trim().is_empty())
                .map(str::to_string))
        }
    };
    Ok(Some(expression))
}

/// JSON string literal, which is also a valid script string literal.
fn quote(text: &str) -> String {
    JsonValue::String(text.to_string()).to_string()
}

fn require(pool: &VariablePool, id: &str) -> Result<(), SynthesisError> {
    if pool.contains(id) {
        Ok(())
    } else {
        Err(SynthesisError::MissingTargetVariable(id.to_string()))
    }
}

/// The zone may reference variables; an empty zone after substitution means UTC.
fn zoned_instant(
    instant: Timestamp,
    time_zone: Option<&str>,
    pool: &VariablePool,
    templates: &dyn TemplateEngine,
) -> Result<String, SynthesisError> {
    let zone = time_zone.map(|zone| templates.substitute(pool, zone, SubstituteMode::Value));
    Ok(resolve_instant(instant.into_inner(), zone.as_deref())?)
}

/// Synthesizer bound to its collaborators.
#[derive(Clone)]
pub struct Synthesizer {
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    templates: Arc<dyn TemplateEngine>,
}

impl Default for Synthesizer {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            ids: Arc::new(UuidIdGenerator),
            templates: Arc::new(PlaceholderTemplate),
        }
    }
}

impl Synthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_templates(mut self, templates: Arc<dyn TemplateEngine>) -> Self {
        self.templates = templates;
        self
    }

    pub fn synthesize(
        &self,
        descriptor: &VariableSourceDescriptor,
        session: &SessionState,
    ) -> Result<Option<String>, SynthesisError> {
        synthesize(
            descriptor,
            session,
            self.clock.now(),
            self.ids.as_ref(),
            self.templates.as_ref(),
        )
    }
}
