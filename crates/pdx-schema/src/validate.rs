//! The rule engine: evaluates compiled schemas against AST nodes.

use std::collections::HashMap;

use pdx_parse::{Ast, AstNode, Diagnostic, DiagnosticSource, NodeId, NodeKind, Range, Span};
use tracing::{debug, warn};

use crate::codes::{CheckKind, CodeRegistry};
use crate::compile::{CompiledField, CompiledSchema, FieldType, Required, SchemaDefinitionError};
use crate::suggest::suggest;
use crate::types::SchemaSet;

/// A field value that names a symbol, collected for index-aware checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolReference {
    pub category: String,
    pub name: String,
    pub range: Range,
    pub span: Span,
}

/// Validates nodes against a compiled [`SchemaSet`].
///
/// Validation is pure: the same AST, node and schema id always produce the
/// same diagnostics, and nothing outside the returned vector is touched.
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    schemas: HashMap<String, CompiledSchema>,
    codes: CodeRegistry,
    errors: Vec<SchemaDefinitionError>,
}

impl RuleEngine {
    /// Compile `set`. Definition errors are logged and the broken pieces skipped.
    pub fn new(set: &SchemaSet) -> Self {
        let compiled = set.compile();
        for error in &compiled.errors {
            warn!(%error, "skipping schema definition");
        }
        debug!(
            schemas = compiled.schemas.len(),
            skipped = compiled.errors.len(),
            "compiled schemas"
        );
        Self {
            schemas: compiled.schemas,
            codes: compiled.codes,
            errors: compiled.errors,
        }
    }

    pub fn definition_errors(&self) -> &[SchemaDefinitionError] {
        &self.errors
    }

    pub fn codes(&self) -> &CodeRegistry {
        &self.codes
    }

    pub fn schema(&self, id: &str) -> Option<&CompiledSchema> {
        self.schemas.get(id)
    }

    /// Check `node` against the schema named `schema_id`.
    ///
    /// An unknown schema id yields no diagnostics.
    pub fn validate(&self, ast: &Ast, node: NodeId, schema_id: &str) -> Vec<Diagnostic> {
        let Some(schema) = self.schemas.get(schema_id) else {
            warn!(schema_id, "unknown schema; skipping validation");
            return Vec::new();
        };
        let mut out = Vec::new();
        if ast.node(node).is_container() {
            self.check_node(ast, node, schema, &mut out);
        }
        out
    }

    /// Values of `reference` fields under `node`, nested schemas included.
    pub fn references(&self, ast: &Ast, node: NodeId, schema_id: &str) -> Vec<SymbolReference> {
        let mut out = Vec::new();
        if let Some(schema) = self.schemas.get(schema_id) {
            self.collect_references(ast, node, schema, &mut out);
        }
        out
    }

    fn diagnostic(
        &self,
        schema: &CompiledSchema,
        field: &str,
        kind: CheckKind,
        message: String,
        (range, span): (Range, Span),
    ) -> Diagnostic {
        Diagnostic::new(
            kind.severity(),
            DiagnosticSource::Schema,
            self.codes.code_for(&schema.id, field, kind),
            message,
            range,
            span,
        )
    }

    fn check_node(&self, ast: &Ast, node: NodeId, schema: &CompiledSchema, out: &mut Vec<Diagnostic>) {
        let mut present: HashMap<&str, Vec<NodeId>> = HashMap::new();
        for (id, child) in ast.children(node) {
            if let Some(key) = child.key_str()
                && !child.is_comment()
            {
                present.entry(key).or_default().push(id);
            }
        }

        for (name, field) in &schema.fields {
            let occurrences = present.get(name.as_str()).map(Vec::as_slice).unwrap_or_default();
            if occurrences.is_empty() {
                let required = match &field.required {
                    Required::Never => false,
                    Required::Always => true,
                    Required::When(condition) => condition.eval(ast, node),
                };
                if required {
                    out.push(self.diagnostic(
                        schema,
                        name,
                        CheckKind::MissingRequiredField,
                        format!("missing required field `{name}`"),
                        key_anchor(ast.node(node)),
                    ));
                }
                continue;
            }

            if let Some(max) = field.max_count
                && occurrences.len() > max
            {
                for &extra in &occurrences[max..] {
                    out.push(self.diagnostic(
                        schema,
                        name,
                        CheckKind::TooManyOccurrences,
                        format!("`{name}` may appear at most {max} time(s)"),
                        key_anchor(ast.node(extra)),
                    ));
                }
            }

            for &id in occurrences {
                self.check_field(ast, id, schema, name, field, out);
            }
        }

        if schema.closed {
            for (_, child) in ast.children(node) {
                let Some(key) = child.key_str() else { continue };
                if schema.fields.contains_key(key) {
                    continue;
                }
                let mut d = self.diagnostic(
                    schema,
                    key,
                    CheckKind::UnknownField,
                    format!("unknown field `{key}`"),
                    key_anchor(child),
                );
                if let Some(s) = suggest(key, schema.fields.keys().map(String::as_str)) {
                    d = d.with_suggestion(s);
                }
                out.push(d);
            }
        }

        for rule in &schema.rules {
            let contexts: Vec<NodeId> = match &rule.each {
                Some(key) => ast
                    .children_by_key(Some(node), key)
                    .filter(|&id| ast.node(id).is_container())
                    .collect(),
                None => vec![node],
            };
            for ctx in contexts {
                if rule.condition.eval(ast, ctx) {
                    continue;
                }
                let (range, span) = key_anchor(ast.node(ctx));
                out.push(Diagnostic::new(
                    rule.severity,
                    DiagnosticSource::Schema,
                    rule.code.clone(),
                    rule.message.render(ast, ctx),
                    range,
                    span,
                ));
            }
        }
    }

    fn check_field(
        &self,
        ast: &Ast,
        id: NodeId,
        schema: &CompiledSchema,
        name: &str,
        field: &CompiledField,
        out: &mut Vec<Diagnostic>,
    ) {
        let node = ast.node(id);
        if let FieldType::Opaque(_) = field.ty {
            return;
        }

        if field.ty.expects_container() && !node.is_container() {
            out.push(self.diagnostic(
                schema,
                name,
                CheckKind::ExpectedBlock,
                format!("`{name}` expects a block"),
                value_anchor(node),
            ));
            return;
        }
        if field.ty.expects_scalar() && node.is_container() {
            out.push(self.diagnostic(
                schema,
                name,
                CheckKind::ExpectedScalar,
                format!("`{name}` expects a value, not a block"),
                key_anchor(node),
            ));
            return;
        }

        if node.is_container() {
            if let Some(nested) = field.schema.as_ref().and_then(|s| self.schemas.get(s)) {
                self.check_node(ast, id, nested, out);
            }
            if let Some(values) = &field.values {
                for (_, item) in ast.children(id) {
                    if item.kind == NodeKind::Value {
                        self.check_enum(schema, name, values, item, out);
                    }
                }
            }
            return;
        }

        let Some(value) = &node.value else {
            // The parser already reported the missing value.
            return;
        };
        let anchor = (value.range, value.span);

        let type_ok = match field.ty {
            FieldType::Int => value.as_number().is_some_and(|n| n.fract() == 0.0),
            FieldType::Float => value.as_number().is_some(),
            FieldType::Bool => value.as_bool().is_some(),
            _ => true,
        };
        if !type_ok {
            let expected = match field.ty {
                FieldType::Int => "an integer",
                FieldType::Float => "a number",
                _ => "`yes` or `no`",
            };
            out.push(self.diagnostic(
                schema,
                name,
                CheckKind::TypeMismatch,
                format!("`{name}` expects {expected}, found `{}`", value.as_str()),
                anchor,
            ));
            return;
        }

        if let Some(n) = value.as_number() {
            let below = field.min.is_some_and(|min| n < min);
            let above = field.max.is_some_and(|max| n > max);
            if below || above {
                out.push(self.diagnostic(
                    schema,
                    name,
                    CheckKind::OutOfRange,
                    format!(
                        "`{name}` must be within {}..={}, found {}",
                        bound(field.min),
                        bound(field.max),
                        value.as_str()
                    ),
                    anchor,
                ));
            }
        }

        if let Some(values) = &field.values {
            self.check_enum(schema, name, values, node, out);
        }
    }

    fn check_enum(
        &self,
        schema: &CompiledSchema,
        name: &str,
        values: &[String],
        node: &AstNode,
        out: &mut Vec<Diagnostic>,
    ) {
        let Some(value) = &node.value else { return };
        if values.iter().any(|v| v == value.as_str()) {
            return;
        }
        let mut d = self.diagnostic(
            schema,
            name,
            CheckKind::InvalidEnumValue,
            format!("`{}` is not a valid value for `{name}`", value.as_str()),
            (value.range, value.span),
        );
        if let Some(s) = suggest(value.as_str(), values.iter().map(String::as_str)) {
            d = d.with_suggestion(s);
        }
        out.push(d);
    }

    fn collect_references(
        &self,
        ast: &Ast,
        node: NodeId,
        schema: &CompiledSchema,
        out: &mut Vec<SymbolReference>,
    ) {
        for (id, child) in ast.children(node) {
            let Some(field) = child.key_str().and_then(|k| schema.fields.get(k)) else {
                continue;
            };
            if let Some(category) = &field.reference {
                let values: Vec<&AstNode> = if child.is_container() {
                    ast.children(id)
                        .map(|(_, n)| n)
                        .filter(|n| n.kind == NodeKind::Value)
                        .collect()
                } else {
                    vec![child]
                };
                for v in values.into_iter().filter_map(|n| n.value.as_ref()) {
                    out.push(SymbolReference {
                        category: category.clone(),
                        name: v.text.clone(),
                        range: v.range,
                        span: v.span,
                    });
                }
            }
            if child.is_container()
                && let Some(nested) = field.schema.as_ref().and_then(|s| self.schemas.get(s))
            {
                self.collect_references(ast, id, nested, out);
            }
        }
    }
}

/// Where to point at a node: its key if it has one.
fn key_anchor(node: &AstNode) -> (Range, Span) {
    match &node.key {
        Some(key) => (key.range, key.span),
        None => (node.range, node.span),
    }
}

fn value_anchor(node: &AstNode) -> (Range, Span) {
    match &node.value {
        Some(value) => (value.range, value.span),
        None => key_anchor(node),
    }
}

fn bound(b: Option<f64>) -> String {
    b.map(|b| b.to_string()).unwrap_or_default()
}
