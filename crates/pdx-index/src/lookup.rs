//! Read-only view of the index for feature handlers.

use crate::index::SymbolIndex;
use crate::symbol::Location;

/// The queries a read-only consumer (hover, go-to-definition, completion)
/// may run. Handlers take `&dyn SymbolLookup` so they can be tested against a
/// stub and cannot mutate the index.
pub trait SymbolLookup: Send + Sync {
    fn find(&self, category: &str, name: &str) -> Option<Location>;

    fn definitions(&self, category: &str, name: &str) -> Vec<Location>;

    fn names(&self, category: &str) -> Vec<String>;

    fn contains(&self, category: &str, name: &str) -> bool {
        self.find(category, name).is_some()
    }
}

impl SymbolLookup for SymbolIndex {
    fn find(&self, category: &str, name: &str) -> Option<Location> {
        SymbolIndex::find(self, category, name)
    }

    fn definitions(&self, category: &str, name: &str) -> Vec<Location> {
        SymbolIndex::definitions(self, category, name)
    }

    fn names(&self, category: &str) -> Vec<String> {
        SymbolIndex::names(self, category)
    }
}
