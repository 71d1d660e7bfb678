//! Schema definitions as they arrive from configuration.
//!
//! These types mirror the JSON a schema file is written in. Field specs, rules
//! and condition trees are kept as raw JSON until [`crate::SchemaSet::compile`]
//! so that one malformed entry does not reject the whole set.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

/// A collection of named schemas plus shared enumerations.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct SchemaSet {
    /// Named value lists, referenced from `values` as `$name`.
    pub variables: HashMap<String, Vec<String>>,
    /// Schemas by id.
    pub schemas: HashMap<String, NodeSchema>,
    /// Global code overrides: check name (e.g. `missing-required-field`) to code.
    pub codes: HashMap<String, String>,
}

/// Fields and rules of one node kind.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct NodeSchema {
    /// Raw [`FieldSpec`]s by key. Ordered so diagnostics come out
    /// deterministically.
    pub fields: BTreeMap<String, serde_json::Value>,
    /// Reject keys that have no field spec.
    pub closed: bool,
    /// Raw [`RuleSpec`]s.
    pub rules: Vec<serde_json::Value>,
}

/// What a single field may contain.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct FieldSpec {
    /// `int`, `float`, `bool`, `scalar`, `block`, `list`, `any`. Anything
    /// else is opaque and skips value checks.
    #[serde(rename = "type")]
    pub ty: Option<String>,
    pub required: Requirement,
    /// Allowed values; entries starting with `$` expand a variable.
    pub values: Option<Vec<String>>,
    /// Id of the schema nested blocks are validated against.
    pub schema: Option<String>,
    /// Symbol category the value refers to.
    pub reference: Option<String>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Maximum number of occurrences.
    pub max_count: Option<usize>,
    /// Per-field code overrides: check name to code.
    pub codes: HashMap<String, String>,
}

/// `required: true | false | <condition>`.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum Requirement {
    Always(bool),
    /// Required when the condition holds for the enclosing node.
    When(serde_json::Value),
}

impl Default for Requirement {
    fn default() -> Self {
        Requirement::Always(false)
    }
}

/// A cross-field rule.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RuleSpec {
    pub code: String,
    /// Message template; `{key}`, `{value}` and `{field:NAME}` are filled
    /// from the node the rule failed on.
    pub message: String,
    #[serde(default)]
    pub severity: RuleSeverity,
    /// Evaluate once per child block with this key instead of on the node itself.
    #[serde(default)]
    pub each: Option<String>,
    /// Condition that must hold; the rule fires where it does not.
    pub condition: serde_json::Value,
}

#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuleSeverity {
    Error,
    #[default]
    Warning,
    Information,
    Hint,
}

/// Condition tree as written: `{"all": [...]}`, `{"exists": "field"}`,
/// `{"count": {"field": "f", "op": ">=", "value": 1}}`,
/// `{"compare": {"field": "f", "op": "==", "value": "x"}}`.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) enum ConditionSpec {
    All(Vec<ConditionSpec>),
    Any(Vec<ConditionSpec>),
    Not(Box<ConditionSpec>),
    Exists(String),
    Count { field: String, op: String, value: f64 },
    Compare { field: String, op: String, value: ScalarSpec },
}

#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub(crate) enum ScalarSpec {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl ScalarSpec {
    /// The value as it would be written in script.
    pub(crate) fn to_script(&self) -> String {
        match self {
            ScalarSpec::Bool(true) => "yes".to_string(),
            ScalarSpec::Bool(false) => "no".to_string(),
            ScalarSpec::Number(n) => n.to_string(),
            ScalarSpec::Text(s) => s.clone(),
        }
    }
}

impl SchemaSet {
    /// Parse a schema set from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
