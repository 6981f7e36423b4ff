//! Requested-schema builder for `elicitation/create`.
//!
//! MCP elicitation schemas are a restricted flat subset of JSON Schema: an
//! object whose properties are primitives. [`ElicitationSchema`] models that
//! subset so the orchestrator can pass a typed value to the channel, and it
//! serializes to exactly the wire shape clients expect.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Name of the single field requested from the human.
pub const FEEDBACK_FIELD: &str = "feedback";

const FEEDBACK_TITLE: &str = "Your feedback";
const FEEDBACK_DESCRIPTION_PREFIX: &str =
    "Based on the following AI work summary, please provide your feedback:\n\n";

/// Primitive type of a requested property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Boolean,
    Number,
    Integer,
}

/// One property of a requested schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub kind: PropertyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
}

/// Object schema sent as `requestedSchema`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElicitationSchema {
    #[serde(rename = "type")]
    pub kind: String,
    pub properties: BTreeMap<String, PropertySchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

impl ElicitationSchema {
    /// Look up a property by name.
    pub fn property(&self, name: &str) -> Option<&PropertySchema> {
        self.properties.get(name)
    }
}

/// Build the schema for the `interactive_feedback` form.
///
/// One required, non-empty string field named `feedback`. `summary` is
/// embedded verbatim in the description; no escaping is applied since it is
/// display text, not markup.
pub fn build_feedback_schema(summary: &str) -> ElicitationSchema {
    let feedback = PropertySchema {
        kind: PropertyType::String,
        title: Some(FEEDBACK_TITLE.to_string()),
        description: Some(format!("{FEEDBACK_DESCRIPTION_PREFIX}{summary}")),
        min_length: Some(1),
        max_length: None,
    };

    ElicitationSchema {
        kind: "object".to_string(),
        properties: BTreeMap::from([(FEEDBACK_FIELD.to_string(), feedback)]),
        required: vec![FEEDBACK_FIELD.to_string()],
    }
}
