//! Symbols and where they are defined.

use std::fmt;
use std::path::Path;

use pdx_parse::{Range, Span};
use url::Url;

/// Where a symbol is defined.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub uri: String,
    pub range: Range,
    pub span: Span,
}

/// `(category, name)`: the identity of a symbol across the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolKey {
    pub category: String,
    pub name: String,
}

impl SymbolKey {
    pub fn new(category: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for SymbolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.category, self.name)
    }
}

/// One definition found in a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol {
    pub key: SymbolKey,
    pub location: Location,
}

impl Symbol {
    pub fn new(
        category: impl Into<String>,
        name: impl Into<String>,
        uri: impl Into<String>,
        range: Range,
        span: Span,
    ) -> Self {
        Self {
            key: SymbolKey::new(category, name),
            location: Location {
                uri: uri.into(),
                range,
                span,
            },
        }
    }

    pub fn category(&self) -> &str {
        &self.key.category
    }

    pub fn name(&self) -> &str {
        &self.key.name
    }
}

/// Who currently owns a document's contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Open in the editor; scans leave it alone.
    Editor,
    /// Read from disk by a workspace scan.
    Disk,
}

/// The uri a file on disk is indexed under, as an editor would send it.
/// Relative paths are resolved against the working directory. `None` if the
/// path cannot be expressed as a `file:` url.
pub fn file_uri(path: &Path) -> Option<String> {
    let absolute = std::path::absolute(path).ok()?;
    Url::from_file_path(&absolute).ok().map(String::from)
}

/// Canonical spelling of a document uri, so that a path scanned from disk
/// and the same file opened in the editor share one index entry.
///
/// `file:` uris round-trip through their path, which settles percent-encoding
/// and drive-letter differences. Other uris are re-serialized by the url
/// parser; anything unparseable is kept verbatim.
pub fn normalize_uri(uri: &str) -> String {
    let Ok(url) = Url::parse(uri) else {
        return uri.to_string();
    };
    if url.scheme() == "file"
        && let Ok(path) = url.to_file_path()
        && let Ok(canonical) = Url::from_file_path(&path)
    {
        return canonical.into();
    }
    url.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_file_uri_is_percent_encoded() {
        assert_eq!(
            file_uri(Path::new("/mod/events/a.txt")).as_deref(),
            Some("file:///mod/events/a.txt")
        );
        assert_eq!(
            file_uri(Path::new("/my mod/events/a.txt")).as_deref(),
            Some("file:///my%20mod/events/a.txt")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_relative_path_is_made_absolute() {
        let uri = file_uri(Path::new("events/a.txt")).unwrap();
        assert!(uri.starts_with("file:///"), "{uri}");
        assert!(uri.ends_with("/events/a.txt"), "{uri}");
    }

    #[cfg(unix)]
    #[test]
    fn test_normalize_uri_agrees_with_file_uri() {
        let scanned = file_uri(Path::new("/my mod/events/a.txt")).unwrap();
        assert_eq!(normalize_uri("file:///my%20mod/events/a.txt"), scanned);
        assert_eq!(normalize_uri("file:///my mod/events/a.txt"), scanned);
        assert_eq!(normalize_uri(&scanned), scanned);
    }

    #[test]
    fn test_normalize_uri_keeps_other_forms() {
        assert_eq!(normalize_uri("untitled:Untitled-1"), "untitled:Untitled-1");
        assert_eq!(normalize_uri("not a uri"), "not a uri");
    }

    #[test]
    fn test_key_display() {
        assert_eq!(SymbolKey::new("event", "foo.1").to_string(), "event:foo.1");
    }
}
