//! Incremental analysis engine for Paradox-style script.
//!
//! - [`Engine`] holds everything analysis shares: the symbol index, the
//!   content-hash AST cache, the compiled rule engine and the configuration.
//! - [`Scheduler`] debounces edits to open documents, runs parsing and
//!   analysis on blocking workers, and streams diagnostics to a
//!   [`DiagnosticsSink`] in two batches per version: syntax, then semantic.

mod cache;
mod config;
mod debounce;
mod engine;
mod orchestrator;
mod scheduler;
mod sink;

use std::path::PathBuf;
use std::sync::Arc;

use eyre::WrapErr;
use pdx_schema::SchemaSet;
use tokio::task::JoinHandle;
use tracing::info;

pub use cache::{AstCache, CacheStats, ContentHash};
pub use config::{ConfigError, EngineConfig, SchemaBinding};
pub use debounce::{DebounceConfig, DebouncePolicy, DebounceTier};
pub use engine::{Engine, ParsedDocument};
pub use orchestrator::{DUPLICATE_DEFINITION, Orchestrator, Phase, UNRESOLVED_REFERENCE};
pub use scheduler::{DocumentPhase, DocumentSnapshot, Scheduler};
pub use sink::{DiagnosticBatch, DiagnosticsSink};

/// Install a stderr subscriber filtered by `RUST_LOG`, logging at info and above.
pub fn init_logging() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| eyre::eyre!(err))
}

/// Build an engine, index `roots` and start a scheduler publishing to `sink`.
pub async fn start(
    config: EngineConfig,
    schemas: &SchemaSet,
    roots: Vec<PathBuf>,
    sink: Arc<dyn DiagnosticsSink>,
) -> eyre::Result<(Arc<Engine>, Scheduler, JoinHandle<()>)> {
    let engine = Arc::new(Engine::new(config, schemas).wrap_err("failed to build engine")?);

    if !roots.is_empty() {
        let scan_engine = Arc::clone(&engine);
        let report = tokio::task::spawn_blocking(move || scan_engine.scan_workspace(&roots))
            .await
            .wrap_err("workspace scan was interrupted")?
            .wrap_err("workspace scan failed")?;
        info!(
            files = report.files_indexed,
            symbols = report.symbols,
            "initial workspace index ready"
        );
    }

    let (scheduler, handle) = Scheduler::spawn(Arc::clone(&engine), sink);
    Ok((engine, scheduler, handle))
}
