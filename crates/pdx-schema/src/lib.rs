//! Declarative schemas and a generic rule engine for Paradox-style script.
//!
//! A [`SchemaSet`] describes, per node kind, which fields may appear, what
//! values they take and which cross-field rules must hold. It is compiled once
//! into a [`RuleEngine`], whose [`RuleEngine::validate`] turns AST nodes into
//! diagnostics without side effects.

mod codes;
mod compile;
mod condition;
mod suggest;
mod template;
mod types;
mod validate;

pub use codes::{CheckKind, CodeRegistry};
pub use compile::{
    CompiledField, CompiledRule, CompiledSchema, CompiledSchemas, FieldType, Required,
    SchemaDefinitionError,
};
pub use condition::{CompareOp, Condition};
pub use suggest::{levenshtein, suggest};
pub use template::Template;
pub use types::{FieldSpec, NodeSchema, Requirement, RuleSeverity, RuleSpec, SchemaSet};
pub use validate::{RuleEngine, SymbolReference};
