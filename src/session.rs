use serde::{Deserialize, Serialize};

use crate::variable::VariablePool;

/// Contact details known to a messaging channel.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

/// Marks a session that runs on a messaging channel instead of the web runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Channel {
    #[serde(rename = "whatsApp")]
    WhatsApp { contact: Contact },
}

/// Read-only view of a flow session.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    #[serde(default)]
    pub variables: VariablePool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<Channel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queued_result_id: Option<String>,
}

impl SessionState {
    pub fn new(variables: VariablePool) -> Self {
        Self {
            variables,
            ..Default::default()
        }
    }

    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn with_queued_result_id(mut self, id: impl Into<String>) -> Self {
        self.queued_result_id = Some(id.into());
        self
    }

    /// Produces a snapshot that differs from this one only by its variables.
    pub fn with_variables(&self, variables: VariablePool) -> Self {
        Self {
            variables,
            channel: self.channel.clone(),
            queued_result_id: self.queued_result_id.clone(),
        }
    }

    pub fn is_messaging_channel(&self) -> bool {
        self.channel.is_some()
    }

    pub fn contact(&self) -> Option<&Contact> {
        match &self.channel {
            Some(Channel::WhatsApp { contact }) => Some(contact),
            None => None,
        }
    }
}
