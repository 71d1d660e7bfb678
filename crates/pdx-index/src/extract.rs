//! Turning a parsed document into symbol definitions.

use pdx_parse::{Ast, NodeKind};
use serde::Deserialize;
use tracing::warn;

use crate::symbol::Symbol;

/// Category used for `@name = value` script variables.
pub const VARIABLE_CATEGORY: &str = "variable";

/// Produces the symbols a document defines.
pub trait SymbolExtractor: Send + Sync {
    fn extract(&self, uri: &str, ast: &Ast) -> Vec<Symbol>;
}

/// Declares which top-level entries of which files define symbols.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionRule {
    /// Glob matched against the document uri, e.g. `**/events/*.txt`.
    pub path: String,
    pub category: String,
    /// Take the name from this field's value instead of the entry key.
    #[serde(default)]
    pub name_field: Option<String>,
}

#[derive(Debug, Clone)]
struct CompiledRule {
    pattern: glob::Pattern,
    category: String,
    name_field: Option<String>,
}

/// The default extractor, driven by [`ExtractionRule`]s.
///
/// Every top-level block in a matching file defines a symbol. Top-level
/// `@name = value` assignments define variables in any file.
#[derive(Debug, Clone, Default)]
pub struct RuleExtractor {
    rules: Vec<CompiledRule>,
}

impl RuleExtractor {
    /// Rules with an invalid glob are logged and skipped.
    pub fn new(rules: &[ExtractionRule]) -> Self {
        let rules = rules
            .iter()
            .filter_map(|rule| match glob::Pattern::new(&rule.path) {
                Ok(pattern) => Some(CompiledRule {
                    pattern,
                    category: rule.category.clone(),
                    name_field: rule.name_field.clone(),
                }),
                Err(error) => {
                    warn!(path = %rule.path, %error, "skipping extraction rule with invalid glob");
                    None
                }
            })
            .collect();
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl SymbolExtractor for RuleExtractor {
    fn extract(&self, uri: &str, ast: &Ast) -> Vec<Symbol> {
        let matching: Vec<&CompiledRule> =
            self.rules.iter().filter(|r| r.pattern.matches(uri)).collect();

        let mut symbols = Vec::new();
        for &root in ast.roots() {
            let node = ast.node(root);
            let Some(key) = &node.key else { continue };

            if node.kind == NodeKind::Assignment && key.text.starts_with('@') {
                symbols.push(Symbol::new(
                    VARIABLE_CATEGORY,
                    key.text.as_str(),
                    uri,
                    key.range,
                    key.span,
                ));
                continue;
            }
            if !node.is_container() {
                continue;
            }

            for rule in &matching {
                let name = match &rule.name_field {
                    None => Some(key),
                    Some(field) => ast
                        .child_by_key(Some(root), field)
                        .and_then(|id| ast.node(id).value.as_ref()),
                };
                if let Some(name) = name {
                    symbols.push(Symbol::new(
                        rule.category.as_str(),
                        name.text.as_str(),
                        uri,
                        name.range,
                        name.span,
                    ));
                }
            }
        }
        symbols
    }
}
