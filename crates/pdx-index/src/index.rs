//! Forward and reverse symbol tables behind one reader-writer lock.

use std::collections::{BTreeMap, HashMap, HashSet};

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::symbol::{Location, Origin, Symbol, SymbolKey, normalize_uri};

/// What one document contributes.
#[derive(Debug, Clone)]
struct DocumentEntry {
    origin: Origin,
    keys: HashSet<SymbolKey>,
}

#[derive(Debug, Default)]
struct Tables {
    /// category -> name -> definitions, sorted so the winner comes first.
    forward: HashMap<String, BTreeMap<String, Vec<Location>>>,
    /// uri -> contributed keys.
    reverse: HashMap<String, DocumentEntry>,
}

impl Tables {
    fn retract(&mut self, uri: &str) -> Option<DocumentEntry> {
        let entry = self.reverse.remove(uri)?;
        for key in &entry.keys {
            let Some(names) = self.forward.get_mut(&key.category) else {
                continue;
            };
            if let Some(defs) = names.get_mut(&key.name) {
                defs.retain(|loc| loc.uri != uri);
                if defs.is_empty() {
                    names.remove(&key.name);
                }
            }
            if names.is_empty() {
                self.forward.remove(&key.category);
            }
        }
        Some(entry)
    }

    /// Every definition is filed under `uri`, whatever location the
    /// extractor gave it, so that [`Tables::retract`] finds it again.
    fn insert(&mut self, uri: &str, origin: Origin, symbols: Vec<Symbol>) -> HashSet<SymbolKey> {
        let mut keys = HashSet::with_capacity(symbols.len());
        for mut symbol in symbols {
            if symbol.location.uri != uri {
                symbol.location.uri = uri.to_string();
            }
            let defs = self
                .forward
                .entry(symbol.key.category.clone())
                .or_default()
                .entry(symbol.key.name.clone())
                .or_default();
            let pos = defs.partition_point(|loc| precedes(loc, &symbol.location));
            defs.insert(pos, symbol.location);
            keys.insert(symbol.key);
        }
        self.reverse.insert(
            uri.to_string(),
            DocumentEntry {
                origin,
                keys: keys.clone(),
            },
        );
        keys
    }

    /// Replace everything `uri` contributes with `symbols`.
    fn replace(&mut self, uri: &str, origin: Origin, symbols: Vec<Symbol>) -> UpdateSummary {
        let old = self.retract(uri).map(|e| e.keys).unwrap_or_default();
        let new = self.insert(uri, origin, symbols);
        UpdateSummary {
            added: new.difference(&old).count(),
            removed: old.difference(&new).count(),
            total: new.len(),
        }
    }
}

/// Definition order: lowest uri first, then earliest position.
fn precedes(a: &Location, b: &Location) -> bool {
    (a.uri.as_str(), a.range.start) <= (b.uri.as_str(), b.range.start)
}

/// Key-level changes made by one update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateSummary {
    pub added: usize,
    pub removed: usize,
    pub total: usize,
}

/// Result of merging one scan batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeSummary {
    pub documents: usize,
    pub symbols: usize,
    /// Documents left alone because the editor owns them.
    pub skipped: usize,
}

/// Counts for logging and status displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexStats {
    pub documents: usize,
    pub categories: usize,
    pub names: usize,
    pub definitions: usize,
}

/// A definition that lost to an earlier one of the same key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Duplicate {
    pub key: SymbolKey,
    pub location: Location,
    pub winner: Location,
}

/// Thread-safe workspace symbol index.
///
/// Every definition of a `(category, name)` is kept; [`SymbolIndex::find`]
/// returns the winner, the one from the lowest uri and then the earliest
/// position. Locks are held only for table updates, never across parsing or I/O.
///
/// Document uris are normalized with [`normalize_uri`] on the way in, so an
/// editor's spelling of a file and the scanner's refer to the same entry.
#[derive(Debug, Default)]
pub struct SymbolIndex {
    tables: RwLock<Tables>,
}

impl SymbolIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically replace the symbols contributed by `uri`. The document is
    /// marked as owned by the editor.
    pub fn update_document(&self, uri: &str, symbols: Vec<Symbol>) -> UpdateSummary {
        let uri = normalize_uri(uri);
        let summary = self.tables.write().replace(&uri, Origin::Editor, symbols);
        trace!(uri = %uri, ?summary, "index updated");
        summary
    }

    /// Retract everything `uri` contributes. Returns whether it had an entry.
    pub fn remove_document(&self, uri: &str) -> bool {
        let uri = normalize_uri(uri);
        let removed = self.tables.write().retract(&uri).is_some();
        trace!(uri = %uri, removed, "index retracted");
        removed
    }

    /// Merge scan results under one write lock. Documents the editor owns are
    /// left untouched.
    pub fn merge_scanned(&self, batch: Vec<(String, Vec<Symbol>)>) -> MergeSummary {
        let batch: Vec<_> = batch
            .into_iter()
            .map(|(uri, symbols)| (normalize_uri(&uri), symbols))
            .collect();
        let mut tables = self.tables.write();
        let mut summary = MergeSummary::default();
        for (uri, symbols) in batch {
            if tables
                .reverse
                .get(&uri)
                .is_some_and(|e| e.origin == Origin::Editor)
            {
                summary.skipped += 1;
                continue;
            }
            summary.documents += 1;
            summary.symbols += symbols.len();
            tables.replace(&uri, Origin::Disk, symbols);
        }
        summary
    }

    /// The winning definition.
    pub fn find(&self, category: &str, name: &str) -> Option<Location> {
        self.tables
            .read()
            .forward
            .get(category)?
            .get(name)?
            .first()
            .cloned()
    }

    /// All definitions, winner first.
    pub fn definitions(&self, category: &str, name: &str) -> Vec<Location> {
        self.tables
            .read()
            .forward
            .get(category)
            .and_then(|names| names.get(name))
            .cloned()
            .unwrap_or_default()
    }

    /// Defined names in a category, sorted.
    pub fn names(&self, category: &str) -> Vec<String> {
        self.tables
            .read()
            .forward
            .get(category)
            .map(|names| names.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Categories with at least one definition, sorted.
    pub fn categories(&self) -> Vec<String> {
        let mut categories: Vec<_> = self.tables.read().forward.keys().cloned().collect();
        categories.sort();
        categories
    }

    /// Keys `uri` contributes, sorted.
    pub fn contributions(&self, uri: &str) -> Vec<SymbolKey> {
        let uri = normalize_uri(uri);
        let mut keys: Vec<_> = self
            .tables
            .read()
            .reverse
            .get(&uri)
            .map(|e| e.keys.iter().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    pub fn origin(&self, uri: &str) -> Option<Origin> {
        self.tables.read().reverse.get(&normalize_uri(uri)).map(|e| e.origin)
    }

    /// Definitions in `uri` that lose to another definition of the same key.
    pub fn duplicates_in(&self, uri: &str) -> Vec<Duplicate> {
        let uri = normalize_uri(uri);
        let tables = self.tables.read();
        let Some(entry) = tables.reverse.get(&uri) else {
            return Vec::new();
        };
        let mut keys: Vec<_> = entry.keys.iter().collect();
        keys.sort();

        let mut out = Vec::new();
        for key in keys {
            let Some(defs) = tables
                .forward
                .get(&key.category)
                .and_then(|names| names.get(&key.name))
            else {
                continue;
            };
            let Some((winner, rest)) = defs.split_first() else {
                continue;
            };
            for loc in rest.iter().filter(|loc| loc.uri == uri) {
                out.push(Duplicate {
                    key: key.clone(),
                    location: loc.clone(),
                    winner: winner.clone(),
                });
            }
        }
        out
    }

    pub fn stats(&self) -> IndexStats {
        let tables = self.tables.read();
        let mut stats = IndexStats {
            documents: tables.reverse.len(),
            categories: tables.forward.len(),
            ..IndexStats::default()
        };
        for names in tables.forward.values() {
            stats.names += names.len();
            stats.definitions += names.values().map(Vec::len).sum::<usize>();
        }
        stats
    }

    /// Drop everything.
    pub fn clear(&self) {
        let mut tables = self.tables.write();
        let documents = tables.reverse.len();
        *tables = Tables::default();
        debug!(documents, "index cleared");
    }

    #[cfg(test)]
    fn forward_snapshot(&self) -> BTreeMap<SymbolKey, Vec<Location>> {
        let tables = self.tables.read();
        let mut out = BTreeMap::new();
        for (category, names) in &tables.forward {
            for (name, defs) in names {
                out.insert(SymbolKey::new(category, name), defs.clone());
            }
        }
        out
    }

    #[cfg(test)]
    fn reverse_snapshot(&self) -> BTreeMap<String, Vec<SymbolKey>> {
        let tables = self.tables.read();
        tables
            .reverse
            .iter()
            .map(|(uri, e)| {
                let mut keys: Vec<_> = e.keys.iter().cloned().collect();
                keys.sort();
                (uri.clone(), keys)
            })
            .collect()
    }
}
