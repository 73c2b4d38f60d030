//! Set-variable options as authored in a flow, and the closed descriptor
//! they are converted into before synthesis.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

use crate::error::InternalResult;
use crate::template::placeholder_names;
use crate::timestamp::parse_zone;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DescriptorError {
    #[error("Malformed set variable options: {0}")]
    Malformed(String),
}

/// The `type` discriminant of [`SetVariableOptions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, AsRefStr)]
pub enum SourceKind {
    #[strum(serialize = "Contact name")]
    ContactName,
    #[strum(serialize = "Phone number")]
    PhoneNumber,
    Now,
    Today,
    Tomorrow,
    Yesterday,
    #[strum(serialize = "Random ID")]
    RandomId,
    #[strum(serialize = "Result ID")]
    ResultId,
    #[strum(serialize = "User ID")]
    UserId,
    #[strum(serialize = "Map item with same index")]
    MapItemWithSameIndex,
    #[strum(serialize = "Append value(s)")]
    AppendValues,
    Empty,
    #[strum(serialize = "Moment of the day")]
    MomentOfDay,
    #[strum(serialize = "Environment name")]
    EnvironmentName,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapListItemParams {
    #[serde(default)]
    pub base_list_variable_id: Option<String>,
    #[serde(default)]
    pub base_item_variable_id: Option<String>,
    #[serde(default)]
    pub target_list_variable_id: Option<String>,
}

/// Persisted options of a set-variable block.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetVariableOptions {
    #[serde(default)]
    pub variable_id: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression_to_evaluate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_executed_on_client: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_list_item_params: Option<MapListItemParams>,
}

/// How the new value of a variable is produced.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableSourceDescriptor {
    ContactName,
    PhoneNumber,
    Now {
        time_zone: Option<String>,
    },
    Today {
        time_zone: Option<String>,
    },
    Tomorrow {
        time_zone: Option<String>,
    },
    Yesterday {
        time_zone: Option<String>,
    },
    RandomId,
    ResultId,
    UserId,
    MapItemWithSameIndex {
        base_list_var_id: String,
        base_item_var_id: String,
        target_list_var_id: String,
    },
    AppendValues {
        target_var_id: String,
        item_expr: Option<String>,
    },
    Empty,
    MomentOfDay,
    EnvironmentName,
    Custom {
        expression: Option<String>,
        executed_on_client: bool,
    },
}

impl VariableSourceDescriptor {
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::ContactName => SourceKind::ContactName,
            Self::PhoneNumber => SourceKind::PhoneNumber,
            Self::Now { .. } => SourceKind::Now,
            Self::Today { .. } => SourceKind::Today,
            Self::Tomorrow { .. } => SourceKind::Tomorrow,
            Self::Yesterday { .. } => SourceKind::Yesterday,
            Self::RandomId => SourceKind::RandomId,
            Self::ResultId => SourceKind::ResultId,
            Self::UserId => SourceKind::UserId,
            Self::MapItemWithSameIndex { .. } => SourceKind::MapItemWithSameIndex,
            Self::AppendValues { .. } => SourceKind::AppendValues,
            Self::Empty => SourceKind::Empty,
            Self::MomentOfDay => SourceKind::MomentOfDay,
            Self::EnvironmentName => SourceKind::EnvironmentName,
            Self::Custom { .. } => SourceKind::Custom,
        }
    }

    pub fn time_zone(&self) -> Option<&str> {
        match self {
            Self::Now { time_zone }
            | Self::Today { time_zone }
            | Self::Tomorrow { time_zone }
            | Self::Yesterday { time_zone } => time_zone.as_deref(),
            _ => None,
        }
    }
}

impl TryFrom<&SetVariableOptions> for VariableSourceDescriptor {
    type Error = DescriptorError;

    fn try_from(options: &SetVariableOptions) -> Result<Self, Self::Error> {
        let kind = match options.kind.as_deref() {
            None => SourceKind::Custom,
            Some(kind) => kind.parse::<SourceKind>().map_err(|_| {
                DescriptorError::Malformed(format!("unknown variable source type '{}'", kind))
            })?,
        };
        let time_zone = || options.time_zone.clone();

        let descriptor = match kind {
            SourceKind::ContactName => Self::ContactName,
            SourceKind::PhoneNumber => Self::PhoneNumber,
            SourceKind::Now => Self::Now {
                time_zone: time_zone(),
            },
            SourceKind::Today => Self::Today {
                time_zone: time_zone(),
            },
            SourceKind::Tomorrow => Self::Tomorrow {
                time_zone: time_zone(),
            },
            SourceKind::Yesterday => Self::Yesterday {
                time_zone: time_zone(),
            },
            SourceKind::RandomId => Self::RandomId,
            SourceKind::ResultId => Self::ResultId,
            SourceKind::UserId => Self::UserId,
            SourceKind::MapItemWithSameIndex => {
                let params = options.map_list_item_params.as_ref().ok_or_else(|| {
                    DescriptorError::Malformed("missing mapListItemParams".to_string())
                })?;
                let require = |id: &Option<String>, field: &str| {
                    id.clone().ok_or_else(|| {
                        DescriptorError::Malformed(format!("missing mapListItemParams.{}", field))
                    })
                };
                Self::MapItemWithSameIndex {
                    base_list_var_id: require(&params.base_list_variable_id, "baseListVariableId")?,
                    base_item_var_id: require(&params.base_item_variable_id, "baseItemVariableId")?,
                    target_list_var_id: require(
                        &params.target_list_variable_id,
                        "targetListVariableId",
                    )?,
                }
            }
            SourceKind::AppendValues => Self::AppendValues {
                target_var_id: options.variable_id.clone().ok_or_else(|| {
                    DescriptorError::Malformed("missing variableId".to_string())
                })?,
                item_expr: options.item.clone(),
            },
            SourceKind::Empty => Self::Empty,
            SourceKind::MomentOfDay => Self::MomentOfDay,
            SourceKind::EnvironmentName => Self::EnvironmentName,
            SourceKind::Custom => Self::Custom {
                expression: options.expression_to_evaluate.clone(),
                executed_on_client: options.is_executed_on_client.unwrap_or(false),
            },
        };
        Ok(descriptor)
    }
}

/// Checks options at authoring time.
///
/// Beyond the shape check done by the conversion, a literal time zone (one
/// without placeholders) must name a known IANA zone.
pub fn validate_options(options: &SetVariableOptions) -> InternalResult<VariableSourceDescriptor> {
    let descriptor = VariableSourceDescriptor::try_from(options)?;
    if let Some(zone) = descriptor.time_zone() {
        if !zone.trim().is_empty() && placeholder_names(zone).is_empty() {
            parse_zone(zone)?;
        }
    }
    Ok(descriptor)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::Error;
    use crate::timestamp::TimeError;

    fn options(value: serde_json::Value) -> SetVariableOptions {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_source_kind_strings() {
        assert_eq!("Append value(s)".parse::<SourceKind>(), Ok(SourceKind::AppendValues));
        assert_eq!(SourceKind::MomentOfDay.to_string(), "Moment of the day");
        assert_eq!(SourceKind::Now.as_ref(), "Now");
        assert!("now".parse::<SourceKind>().is_err());
    }

    #[test]
    fn test_missing_type_is_custom() {
        let descriptor = VariableSourceDescriptor::try_from(&options(json!({
            "variableId": "v1",
            "expressionToEvaluate": "1 + 1",
            "isExecutedOnClient": true
        })))
        .unwrap();
        assert_eq!(
            descriptor,
            VariableSourceDescriptor::Custom {
                expression: Some("1 + 1".to_string()),
                executed_on_client: true,
            }
        );
    }

    #[test]
    fn test_time_zone_carried() {
        let descriptor = VariableSourceDescriptor::try_from(&options(json!({
            "variableId": "v1",
            "type": "Tomorrow",
            "timeZone": "Asia/Tokyo"
        })))
        .unwrap();
        assert_eq!(descriptor.kind(), SourceKind::Tomorrow);
        assert_eq!(descriptor.time_zone(), Some("Asia/Tokyo"));
    }

    #[test]
    fn test_append_values_targets_variable() {
        let descriptor = VariableSourceDescriptor::try_from(&options(json!({
            "variableId": "list",
            "type": "Append value(s)",
            "item": "{{Name}}"
        })))
        .unwrap();
        assert_eq!(
            descriptor,
            VariableSourceDescriptor::AppendValues {
                target_var_id: "list".to_string(),
                item_expr: Some("{{Name}}".to_string()),
            }
        );
    }

    #[test]
    fn test_map_item_requires_params() {
        let result = VariableSourceDescriptor::try_from(&options(json!({
            "variableId": "v1",
            "type": "Map item with same index"
        })));
        assert!(matches!(result, Err(DescriptorError::Malformed(_))));

        let result = VariableSourceDescriptor::try_from(&options(json!({
            "variableId": "v1",
            "type": "Map item with same index",
            "mapListItemParams": {"baseListVariableId": "a", "baseItemVariableId": "b"}
        })));
        assert_eq!(
            result,
            Err(DescriptorError::Malformed(
                "missing mapListItemParams.targetListVariableId".to_string()
            ))
        );
    }

    #[test]
    fn test_unknown_type_is_malformed() {
        let result = VariableSourceDescriptor::try_from(&options(json!({
            "variableId": "v1",
            "type": "Weather"
        })));
        assert!(matches!(result, Err(DescriptorError::Malformed(_))));
    }

    #[test]
    fn test_validate_rejects_bad_literal_zone() {
        let result = validate_options(&options(json!({
            "variableId": "v1",
            "type": "Now",
            "timeZone": "Europe/Atlantis"
        })));
        assert!(matches!(
            result,
            Err(Error::Time(TimeError::InvalidTimeZone(ref zone))) if zone == "Europe/Atlantis"
        ));
    }

    #[test]
    fn test_validate_skips_templated_zone() {
        let result = validate_options(&options(json!({
            "variableId": "v1",
            "type": "Now",
            "timeZone": "{{Zone}}"
        })));
        assert!(result.is_ok());
    }
}
