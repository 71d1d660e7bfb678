//! The shared analysis context.

use std::path::PathBuf;
use std::sync::Arc;

use pdx_index::{RuleExtractor, ScanError, ScanReport, Symbol, SymbolExtractor, SymbolIndex};
use pdx_parse::{Ast, Diagnostic};
use pdx_schema::{RuleEngine, SchemaSet};
use tracing::{debug, info};

use crate::cache::{AstCache, ContentHash};
use crate::config::EngineConfig;
use crate::debounce::DebouncePolicy;
use crate::orchestrator::Orchestrator;

/// A document parsed off the scheduler, not yet committed to the index or cache.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub hash: ContentHash,
    pub ast: Arc<Ast>,
    /// The AST came from the cache.
    pub cached: bool,
    pub symbols: Vec<Symbol>,
}

/// Everything analysis needs, built once and passed to whoever needs it.
pub struct Engine {
    config: EngineConfig,
    debounce: DebouncePolicy,
    index: Arc<SymbolIndex>,
    cache: AstCache,
    orchestrator: Orchestrator,
    extractor: Arc<dyn SymbolExtractor>,
}

impl Engine {
    /// Build an engine with the rule-driven extractor from `config.extraction`.
    pub fn new(config: EngineConfig, schemas: &SchemaSet) -> eyre::Result<Self> {
        let extractor = Arc::new(RuleExtractor::new(&config.extraction));
        Self::with_extractor(config, schemas, extractor)
    }

    pub fn with_extractor(
        config: EngineConfig,
        schemas: &SchemaSet,
        extractor: Arc<dyn SymbolExtractor>,
    ) -> eyre::Result<Self> {
        let rules = Arc::new(RuleEngine::new(schemas));
        let orchestrator = Orchestrator::new(
            rules,
            &config.schemas,
            config.check_references,
            config.check_duplicates,
        )?;
        info!(
            schemas = schemas.schemas.len(),
            bindings = config.schemas.len(),
            cache_capacity = config.cache_capacity,
            workers = config.worker_count(),
            "engine ready"
        );
        Ok(Self {
            debounce: config.debounce_policy(),
            cache: AstCache::new(config.cache_capacity),
            index: Arc::new(SymbolIndex::new()),
            orchestrator,
            extractor,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn debounce(&self) -> &DebouncePolicy {
        &self.debounce
    }

    pub fn index(&self) -> &Arc<SymbolIndex> {
        &self.index
    }

    pub fn cache(&self) -> &AstCache {
        &self.cache
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Index every matching file under `roots`. Blocking; documents the
    /// editor already owns are left alone.
    pub fn scan_workspace(&self, roots: &[PathBuf]) -> Result<ScanReport, ScanError> {
        pdx_index::scan_workspace(
            &self.index,
            roots,
            &self.config.scan_options(),
            self.extractor.as_ref(),
        )
    }

    /// Parse `text` (or reuse a cached AST) and extract its symbols. Reads the
    /// cache but writes nothing shared.
    pub fn parse_document(&self, uri: &str, text: &str) -> ParsedDocument {
        let hash = ContentHash::of(text);
        let (ast, cached) = match self.cache.get(&hash) {
            Some(ast) => (ast, true),
            None => (Arc::new(pdx_parse::parse(text)), false),
        };
        let symbols = self.extractor.extract(uri, &ast);
        debug!(uri, %hash, cached, symbols = symbols.len(), "parsed document");
        ParsedDocument {
            hash,
            ast,
            cached,
            symbols,
        }
    }

    /// Publish a parse into the cache and the index.
    pub fn commit(&self, uri: &str, parsed: &ParsedDocument) {
        if !parsed.cached {
            self.cache.insert(parsed.hash, Arc::clone(&parsed.ast));
        }
        let summary = self.index.update_document(uri, parsed.symbols.clone());
        debug!(uri, added = summary.added, removed = summary.removed, "index updated");
    }

    /// Drop everything `uri` contributed to the index.
    pub fn retract(&self, uri: &str) -> bool {
        self.index.remove_document(uri)
    }

    pub fn syntax_diagnostics(&self, ast: &Ast) -> Vec<Diagnostic> {
        self.orchestrator.syntax(ast)
    }

    pub fn semantic_diagnostics(&self, uri: &str, ast: &Ast) -> Vec<Diagnostic> {
        self.orchestrator.semantic(uri, ast, &self.index)
    }

    /// Parse, commit and diagnose `text` in one go, without debouncing.
    pub fn analyze(&self, uri: &str, text: &str) -> Vec<Diagnostic> {
        let parsed = self.parse_document(uri, text);
        self.commit(uri, &parsed);
        let mut diagnostics = self.syntax_diagnostics(&parsed.ast);
        diagnostics.extend(self.semantic_diagnostics(uri, &parsed.ast));
        diagnostics
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("index", &self.index.stats())
            .field("cache", &self.cache.stats())
            .finish_non_exhaustive()
    }
}
