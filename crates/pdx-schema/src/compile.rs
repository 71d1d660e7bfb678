//! Turning a [`SchemaSet`] into checked, ready-to-evaluate schemas.

use std::collections::{BTreeMap, HashMap};

use pdx_parse::Severity;

use crate::codes::{CheckKind, CodeRegistry};
use crate::condition::{CompareOp, Condition};
use crate::template::Template;
use crate::types::{
    ConditionSpec, FieldSpec, NodeSchema, Requirement, RuleSeverity, RuleSpec, SchemaSet,
};

/// A piece of a schema that could not be compiled. The piece is dropped; the
/// rest of the schema stays usable.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaDefinitionError {
    #[error("schema `{schema}`, {context}: unknown variable `${name}`")]
    UnknownVariable {
        schema: String,
        context: String,
        name: String,
    },

    #[error("schema `{schema}`, {context}: reference to unknown schema `{target}`")]
    DanglingReference {
        schema: String,
        context: String,
        target: String,
    },

    #[error("schema `{schema}`, {context}: unknown operator `{op}`")]
    UnknownOperator {
        schema: String,
        context: String,
        op: String,
    },

    #[error("schema `{schema}`, {context}: invalid condition: {reason}")]
    InvalidCondition {
        schema: String,
        context: String,
        reason: String,
    },

    #[error("schema `{schema}`, {context}: invalid message template: {reason}")]
    InvalidTemplate {
        schema: String,
        context: String,
        reason: String,
    },

    #[error("schema `{schema}`, field `{field}`: invalid field spec: {reason}")]
    InvalidField {
        schema: String,
        field: String,
        reason: String,
    },

    #[error("schema `{schema}`, rule #{index}: invalid rule: {reason}")]
    InvalidRule {
        schema: String,
        index: usize,
        reason: String,
    },

    #[error("{context}: unknown check `{name}` in code overrides")]
    UnknownCheck { context: String, name: String },
}

/// Value shape a field accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Any,
    Int,
    Float,
    Bool,
    Scalar,
    Block,
    List,
    /// Unrecognized type name: no value checks.
    Opaque(String),
}

impl FieldType {
    fn parse(name: &str) -> Self {
        match name {
            "any" => FieldType::Any,
            "int" => FieldType::Int,
            "float" => FieldType::Float,
            "bool" => FieldType::Bool,
            "scalar" | "string" => FieldType::Scalar,
            "block" => FieldType::Block,
            "list" => FieldType::List,
            other => FieldType::Opaque(other.to_string()),
        }
    }

    pub fn expects_container(&self) -> bool {
        matches!(self, FieldType::Block | FieldType::List)
    }

    pub fn expects_scalar(&self) -> bool {
        matches!(
            self,
            FieldType::Int | FieldType::Float | FieldType::Bool | FieldType::Scalar
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Required {
    Never,
    Always,
    When(Condition),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledField {
    pub ty: FieldType,
    pub required: Required,
    /// Allowed values with variables expanded.
    pub values: Option<Vec<String>>,
    pub schema: Option<String>,
    pub reference: Option<String>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub max_count: Option<usize>,
}

impl CompiledField {
    /// Accepts anything. Stands in for a field whose spec failed to parse.
    fn unchecked() -> Self {
        Self {
            ty: FieldType::Any,
            required: Required::Never,
            values: None,
            schema: None,
            reference: None,
            min: None,
            max: None,
            max_count: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRule {
    pub code: String,
    pub severity: Severity,
    pub each: Option<String>,
    pub condition: Condition,
    pub message: Template,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSchema {
    pub id: String,
    pub fields: BTreeMap<String, CompiledField>,
    pub closed: bool,
    pub rules: Vec<CompiledRule>,
}

/// Output of [`SchemaSet::compile`].
#[derive(Debug, Clone, Default)]
pub struct CompiledSchemas {
    pub schemas: HashMap<String, CompiledSchema>,
    pub codes: CodeRegistry,
    pub errors: Vec<SchemaDefinitionError>,
}

impl SchemaSet {
    /// Check every schema, expanding variables and parsing conditions and
    /// templates. Broken pieces are reported in `errors` and left out.
    pub fn compile(&self) -> CompiledSchemas {
        let mut out = CompiledSchemas::default();

        for (name, code) in &self.codes {
            match CheckKind::from_name(name) {
                Some(kind) => out.codes.set_global(kind, code),
                None => out.errors.push(SchemaDefinitionError::UnknownCheck {
                    context: "schema set".to_string(),
                    name: name.clone(),
                }),
            }
        }

        let mut ids: Vec<&String> = self.schemas.keys().collect();
        ids.sort();
        for id in ids {
            let schema = &self.schemas[id];
            let mut compiler = Compiler {
                set: self,
                schema_id: id,
                errors: &mut out.errors,
            };
            let compiled = compiler.schema(schema, &mut out.codes);
            out.schemas.insert(id.clone(), compiled);
        }
        out
    }
}

struct Compiler<'a> {
    set: &'a SchemaSet,
    schema_id: &'a str,
    errors: &'a mut Vec<SchemaDefinitionError>,
}

impl Compiler<'_> {
    fn schema(&mut self, schema: &NodeSchema, codes: &mut CodeRegistry) -> CompiledSchema {
        let mut fields = BTreeMap::new();
        for (name, raw) in &schema.fields {
            let spec: FieldSpec = match serde_json::from_value(raw.clone()) {
                Ok(spec) => spec,
                Err(e) => {
                    self.errors.push(SchemaDefinitionError::InvalidField {
                        schema: self.schema_id.to_string(),
                        field: name.clone(),
                        reason: e.to_string(),
                    });
                    // Keep the key known so closed schemas do not also flag it.
                    fields.insert(name.clone(), CompiledField::unchecked());
                    continue;
                }
            };
            for (check, code) in &spec.codes {
                match CheckKind::from_name(check) {
                    Some(kind) => codes.set_field(self.schema_id, name, kind, code),
                    None => self.errors.push(SchemaDefinitionError::UnknownCheck {
                        context: format!("schema `{}`, field `{}`", self.schema_id, name),
                        name: check.clone(),
                    }),
                }
            }
            fields.insert(name.clone(), self.field(name, &spec));
        }

        let rules = schema
            .rules
            .iter()
            .enumerate()
            .filter_map(|(index, raw)| self.rule(index, raw))
            .collect();

        CompiledSchema {
            id: self.schema_id.to_string(),
            fields,
            closed: schema.closed,
            rules,
        }
    }

    fn field(&mut self, name: &str, spec: &FieldSpec) -> CompiledField {
        let context = format!("field `{name}`");

        let schema = match &spec.schema {
            Some(target) if !self.set.schemas.contains_key(target) => {
                self.errors.push(SchemaDefinitionError::DanglingReference {
                    schema: self.schema_id.to_string(),
                    context: context.clone(),
                    target: target.clone(),
                });
                None
            }
            other => other.clone(),
        };

        let ty = match &spec.ty {
            Some(ty) => FieldType::parse(ty),
            None if spec.schema.is_some() => FieldType::Block,
            None => FieldType::Any,
        };

        let required = match &spec.required {
            Requirement::Always(true) => Required::Always,
            Requirement::Always(false) => Required::Never,
            Requirement::When(raw) => match self.condition(&context, raw) {
                Some(condition) => Required::When(condition),
                None => Required::Never,
            },
        };

        let values = spec
            .values
            .as_ref()
            .and_then(|values| self.expand_values(&context, values));

        CompiledField {
            ty,
            required,
            values,
            schema,
            reference: spec.reference.clone(),
            min: spec.min,
            max: spec.max,
            max_count: spec.max_count,
        }
    }

    /// Expand `$name` entries. An unknown variable drops the whole list so
    /// no value is flagged against an incomplete set.
    fn expand_values(&mut self, context: &str, values: &[String]) -> Option<Vec<String>> {
        let mut expanded = Vec::with_capacity(values.len());
        for value in values {
            match value.strip_prefix('$') {
                Some(var) => match self.set.variables.get(var) {
                    Some(items) => expanded.extend(items.iter().cloned()),
                    None => {
                        self.errors.push(SchemaDefinitionError::UnknownVariable {
                            schema: self.schema_id.to_string(),
                            context: context.to_string(),
                            name: var.to_string(),
                        });
                        return None;
                    }
                },
                None => expanded.push(value.clone()),
            }
        }
        Some(expanded)
    }

    fn rule(&mut self, index: usize, raw: &serde_json::Value) -> Option<CompiledRule> {
        let rule: RuleSpec = match serde_json::from_value(raw.clone()) {
            Ok(rule) => rule,
            Err(e) => {
                self.errors.push(SchemaDefinitionError::InvalidRule {
                    schema: self.schema_id.to_string(),
                    index,
                    reason: e.to_string(),
                });
                return None;
            }
        };
        let context = format!("rule `{}`", rule.code);
        let condition = self.condition(&context, &rule.condition)?;
        let message = match Template::parse(&rule.message) {
            Ok(template) => template,
            Err(reason) => {
                self.errors.push(SchemaDefinitionError::InvalidTemplate {
                    schema: self.schema_id.to_string(),
                    context,
                    reason,
                });
                return None;
            }
        };
        Some(CompiledRule {
            code: rule.code.clone(),
            severity: match rule.severity {
                RuleSeverity::Error => Severity::Error,
                RuleSeverity::Warning => Severity::Warning,
                RuleSeverity::Information => Severity::Information,
                RuleSeverity::Hint => Severity::Hint,
            },
            each: rule.each.clone(),
            condition,
            message,
        })
    }

    fn condition(&mut self, context: &str, raw: &serde_json::Value) -> Option<Condition> {
        let spec: ConditionSpec = match serde_json::from_value(raw.clone()) {
            Ok(spec) => spec,
            Err(e) => {
                self.errors.push(SchemaDefinitionError::InvalidCondition {
                    schema: self.schema_id.to_string(),
                    context: context.to_string(),
                    reason: e.to_string(),
                });
                return None;
            }
        };
        self.lower(context, spec)
    }

    fn lower(&mut self, context: &str, spec: ConditionSpec) -> Option<Condition> {
        Some(match spec {
            ConditionSpec::All(items) => Condition::All(self.lower_all(context, items)?),
            ConditionSpec::Any(items) => Condition::Any(self.lower_all(context, items)?),
            ConditionSpec::Not(inner) => Condition::Not(Box::new(self.lower(context, *inner)?)),
            ConditionSpec::Exists(field) => Condition::Exists(field),
            ConditionSpec::Count { field, op, value } => Condition::Count {
                field,
                op: self.op(context, &op)?,
                value,
            },
            ConditionSpec::Compare { field, op, value } => Condition::Compare {
                field,
                op: self.op(context, &op)?,
                value: value.to_script(),
            },
        })
    }

    fn lower_all(&mut self, context: &str, items: Vec<ConditionSpec>) -> Option<Vec<Condition>> {
        items
            .into_iter()
            .map(|item| self.lower(context, item))
            .collect()
    }

    fn op(&mut self, context: &str, op: &str) -> Option<CompareOp> {
        let parsed = CompareOp::parse(op);
        if parsed.is_none() {
            self.errors.push(SchemaDefinitionError::UnknownOperator {
                schema: self.schema_id.to_string(),
                context: context.to_string(),
                op: op.to_string(),
            });
        }
        parsed
    }
}
