//! Per-document diagnostic phases.

use std::collections::HashMap;
use std::sync::Arc;

use eyre::WrapErr;
use pdx_index::{SymbolIndex, SymbolLookup};
use pdx_parse::{Ast, Diagnostic, DiagnosticSource, Severity};
use pdx_schema::RuleEngine;
use tracing::debug;

use crate::config::SchemaBinding;

pub const UNRESOLVED_REFERENCE: &str = "unresolved-reference";
pub const DUPLICATE_DEFINITION: &str = "duplicate-definition";

/// Which half of a document's diagnostics a batch carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Syntax,
    Semantic,
}

#[derive(Debug)]
struct CompiledBinding {
    pattern: glob::Pattern,
    schema: String,
}

/// Turns a parsed document into diagnostics in two phases: syntax first,
/// then schema and index checks.
#[derive(Debug)]
pub struct Orchestrator {
    rules: Arc<RuleEngine>,
    bindings: Vec<CompiledBinding>,
    check_references: bool,
    check_duplicates: bool,
}

impl Orchestrator {
    pub fn new(
        rules: Arc<RuleEngine>,
        bindings: &[SchemaBinding],
        check_references: bool,
        check_duplicates: bool,
    ) -> eyre::Result<Self> {
        let bindings = bindings
            .iter()
            .map(|binding| {
                let pattern = glob::Pattern::new(&binding.pattern)
                    .wrap_err_with(|| format!("invalid schema binding pattern `{}`", binding.pattern))?;
                Ok(CompiledBinding {
                    pattern,
                    schema: binding.schema.clone(),
                })
            })
            .collect::<eyre::Result<Vec<_>>>()?;
        Ok(Self {
            rules,
            bindings,
            check_references,
            check_duplicates,
        })
    }

    pub fn rules(&self) -> &RuleEngine {
        &self.rules
    }

    /// The schema top-level blocks of `uri` are validated against.
    pub fn schema_for(&self, uri: &str) -> Option<&str> {
        self.bindings
            .iter()
            .find(|b| b.pattern.matches(uri))
            .map(|b| b.schema.as_str())
    }

    pub fn syntax(&self, ast: &Ast) -> Vec<Diagnostic> {
        ast.diagnostics()
    }

    /// Schema validation of every top-level block plus checks that consult
    /// `index`. Reads the index but never writes it.
    pub fn semantic(&self, uri: &str, ast: &Ast, index: &SymbolIndex) -> Vec<Diagnostic> {
        let mut out = Vec::new();
        self.schema_checks(uri, ast, index, &mut out);

        if self.check_duplicates {
            for duplicate in index.duplicates_in(uri) {
                let winner = &duplicate.winner;
                out.push(Diagnostic::new(
                    Severity::Warning,
                    DiagnosticSource::Semantic,
                    DUPLICATE_DEFINITION,
                    format!(
                        "{} `{}` is already defined at {}:{}",
                        duplicate.key.category, duplicate.key.name, winner.uri, winner.range.start
                    ),
                    duplicate.location.range,
                    duplicate.location.span,
                ));
            }
        }

        debug!(uri, schema = ?self.schema_for(uri), diagnostics = out.len(), "semantic phase");
        out
    }

    fn schema_checks(&self, uri: &str, ast: &Ast, index: &dyn SymbolLookup, out: &mut Vec<Diagnostic>) {
        let Some(schema) = self.schema_for(uri) else {
            return;
        };
        // Suggestion candidates, fetched at most once per category.
        let mut candidates = HashMap::new();
        for &root in ast.roots() {
            if !ast.node(root).is_container() {
                continue;
            }
            out.extend(self.rules.validate(ast, root, schema));
            if self.check_references {
                self.unresolved_references(ast, root, schema, index, &mut candidates, out);
            }
        }
    }

    fn unresolved_references(
        &self,
        ast: &Ast,
        root: pdx_parse::NodeId,
        schema: &str,
        index: &dyn SymbolLookup,
        candidates: &mut HashMap<String, Vec<String>>,
        out: &mut Vec<Diagnostic>,
    ) {
        for reference in self.rules.references(ast, root, schema) {
            if index.contains(&reference.category, &reference.name) {
                continue;
            }
            let names = candidates
                .entry(reference.category.clone())
                .or_insert_with(|| index.names(&reference.category));
            let mut diagnostic = Diagnostic::new(
                Severity::Warning,
                DiagnosticSource::Semantic,
                UNRESOLVED_REFERENCE,
                format!("unknown {} `{}`", reference.category, reference.name),
                reference.range,
                reference.span,
            );
            if let Some(suggestion) = pdx_schema::suggest(&reference.name, names.iter().map(String::as_str))
            {
                diagnostic = diagnostic.with_suggestion(suggestion);
            }
            out.push(diagnostic);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pdx_index::Location;
    use pdx_schema::SchemaSet;

    use super::*;

    struct CountingLookup {
        names: Vec<String>,
        calls: AtomicUsize,
    }

    impl SymbolLookup for CountingLookup {
        fn find(&self, _category: &str, _name: &str) -> Option<Location> {
            None
        }

        fn definitions(&self, _category: &str, _name: &str) -> Vec<Location> {
            Vec::new()
        }

        fn names(&self, _category: &str) -> Vec<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.names.clone()
        }
    }

    #[test]
    fn test_candidates_fetched_once_per_category() {
        let schemas = SchemaSet::from_json_str(
            r#"{ "schemas": { "event": { "fields": {
                "trait": { "reference": "trait", "maxCount": 5 }
            } } } }"#,
        )
        .unwrap();
        let orchestrator = Orchestrator::new(
            Arc::new(RuleEngine::new(&schemas)),
            &[SchemaBinding {
                pattern: "**/events/*.txt".into(),
                schema: "event".into(),
            }],
            true,
            true,
        )
        .unwrap();
        let ast = pdx_parse::parse("a = { trait = bravr trait = zealus }\nb = { trait = calm }");
        let lookup = CountingLookup {
            names: vec!["brave".into(), "zealous".into()],
            calls: AtomicUsize::new(0),
        };

        let mut out = Vec::new();
        orchestrator.schema_checks("file:///mod/events/a.txt", &ast, &lookup, &mut out);

        let unresolved: Vec<_> = out.iter().filter(|d| d.code == UNRESOLVED_REFERENCE).collect();
        assert_eq!(unresolved.len(), 3);
        assert_eq!(unresolved[0].suggestion.as_deref(), Some("brave"));
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }
}
