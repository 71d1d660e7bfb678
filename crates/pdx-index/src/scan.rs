//! Parallel workspace scan.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use ignore::WalkBuilder;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::extract::SymbolExtractor;
use crate::index::SymbolIndex;
use crate::symbol::{Symbol, file_uri};

/// How to walk and batch a workspace scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    /// File extensions to index, without the dot. Empty means every file.
    pub extensions: Vec<String>,
    /// Files per batch; each batch is merged under one write lock.
    pub batch_size: usize,
    /// Worker threads; 0 uses the number of cores.
    pub workers: usize,
    pub respect_ignore_files: bool,
    pub include_hidden: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            extensions: vec!["txt".to_string()],
            batch_size: 64,
            workers: 0,
            respect_ignore_files: true,
            include_hidden: false,
        }
    }
}

impl ScanOptions {
    fn extension_filter(&self) -> Option<HashSet<String>> {
        let set: HashSet<String> = self
            .extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        (!set.is_empty()).then_some(set)
    }

    fn worker_count(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism().map_or(1, |n| n.get())
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("failed to start scan workers: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Outcome of [`scan_workspace`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub files_indexed: usize,
    /// Files that could not be read or named by a uri.
    pub files_failed: usize,
    /// Files skipped because the editor owns them.
    pub files_skipped: usize,
    pub symbols: usize,
    pub batches: usize,
    pub elapsed: Duration,
}

#[derive(Default)]
struct BatchOutcome {
    indexed: usize,
    failed: usize,
    skipped: usize,
    symbols: usize,
}

/// Walk `roots`, parse every matching file on a bounded worker pool and merge
/// the extracted symbols into `index` batch by batch.
pub fn scan_workspace(
    index: &SymbolIndex,
    roots: &[PathBuf],
    options: &ScanOptions,
    extractor: &dyn SymbolExtractor,
) -> Result<ScanReport, ScanError> {
    let start = Instant::now();
    let files = collect_files(roots, options);
    let workers = options.worker_count();
    info!(files = files.len(), workers, "workspace scan started");

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("pdx-scan-{i}"))
        .build()?;

    let batch_size = options.batch_size.max(1);
    let outcomes: Vec<BatchOutcome> = pool.install(|| {
        files
            .par_chunks(batch_size)
            .map(|batch| scan_batch(index, batch, extractor))
            .collect()
    });

    let mut report = ScanReport {
        batches: outcomes.len(),
        ..ScanReport::default()
    };
    for outcome in outcomes {
        report.files_indexed += outcome.indexed;
        report.files_failed += outcome.failed;
        report.files_skipped += outcome.skipped;
        report.symbols += outcome.symbols;
    }
    report.elapsed = start.elapsed();
    info!(
        indexed = report.files_indexed,
        failed = report.files_failed,
        skipped = report.files_skipped,
        symbols = report.symbols,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "workspace scan complete"
    );
    Ok(report)
}

/// Parse and extract outside the lock, then merge once.
fn scan_batch(index: &SymbolIndex, batch: &[PathBuf], extractor: &dyn SymbolExtractor) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();
    let mut partial: Vec<(String, Vec<Symbol>)> = Vec::with_capacity(batch.len());
    for path in batch {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(error) => {
                warn!(path = %path.display(), %error, "skipping unreadable file");
                outcome.failed += 1;
                continue;
            }
        };
        let Some(uri) = file_uri(path) else {
            warn!(path = %path.display(), "skipping file with no file: uri");
            outcome.failed += 1;
            continue;
        };
        let ast = pdx_parse::parse(&text);
        let symbols = extractor.extract(&uri, &ast);
        partial.push((uri, symbols));
    }

    let merged = index.merge_scanned(partial);
    outcome.indexed = merged.documents;
    outcome.skipped = merged.skipped;
    outcome.symbols = merged.symbols;
    debug!(files = batch.len(), indexed = outcome.indexed, "scan batch merged");
    outcome
}

fn collect_files(roots: &[PathBuf], options: &ScanOptions) -> Vec<PathBuf> {
    let filter = options.extension_filter();
    let mut files = Vec::new();
    for root in roots {
        let mut walker = WalkBuilder::new(root);
        walker
            .standard_filters(options.respect_ignore_files)
            .hidden(!options.include_hidden)
            .require_git(false)
            .follow_links(false);
        for entry in walker.build() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    warn!(root = %root.display(), %error, "walk error");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            if let Some(filter) = &filter
                && !has_extension(entry.path(), filter)
            {
                continue;
            }
            files.push(entry.into_path());
        }
    }
    files.sort();
    files.dedup();
    files
}

fn has_extension(path: &Path, filter: &HashSet<String>) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| filter.contains(&ext.to_ascii_lowercase()))
}
