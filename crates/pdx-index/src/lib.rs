//! Workspace symbol index for Paradox-style script.
//!
//! [`SymbolIndex`] maps `(category, name)` to definitions (forward) and each
//! document to what it contributes (reverse). Documents are updated by atomic
//! replace; [`scan_workspace`] fills the index from disk in parallel batches.

mod extract;
mod index;
mod lookup;
mod scan;
mod symbol;

pub use extract::{ExtractionRule, RuleExtractor, SymbolExtractor, VARIABLE_CATEGORY};
pub use index::{Duplicate, IndexStats, MergeSummary, SymbolIndex, UpdateSummary};
pub use lookup::SymbolLookup;
pub use scan::{ScanError, ScanOptions, ScanReport, scan_workspace};
pub use symbol::{Location, Origin, Symbol, SymbolKey, file_uri, normalize_uri};
