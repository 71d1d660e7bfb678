//! Diagnostic codes for built-in checks.

use std::collections::HashMap;
use std::fmt;

use pdx_parse::Severity;

/// Built-in checks the rule engine performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckKind {
    MissingRequiredField,
    InvalidEnumValue,
    UnknownField,
    TypeMismatch,
    OutOfRange,
    TooManyOccurrences,
    ExpectedBlock,
    ExpectedScalar,
}

impl CheckKind {
    pub const ALL: [CheckKind; 8] = [
        CheckKind::MissingRequiredField,
        CheckKind::InvalidEnumValue,
        CheckKind::UnknownField,
        CheckKind::TypeMismatch,
        CheckKind::OutOfRange,
        CheckKind::TooManyOccurrences,
        CheckKind::ExpectedBlock,
        CheckKind::ExpectedScalar,
    ];

    /// Name used in schema files and as the default code.
    pub fn name(self) -> &'static str {
        match self {
            CheckKind::MissingRequiredField => "missing-required-field",
            CheckKind::InvalidEnumValue => "invalid-enum-value",
            CheckKind::UnknownField => "unknown-field",
            CheckKind::TypeMismatch => "type-mismatch",
            CheckKind::OutOfRange => "out-of-range",
            CheckKind::TooManyOccurrences => "too-many-occurrences",
            CheckKind::ExpectedBlock => "expected-block",
            CheckKind::ExpectedScalar => "expected-scalar",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    pub fn severity(self) -> Severity {
        match self {
            CheckKind::UnknownField | CheckKind::TooManyOccurrences => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Maps checks to codes: per-field overrides, then global overrides, then the
/// check's own name.
#[derive(Debug, Clone, Default)]
pub struct CodeRegistry {
    global: HashMap<CheckKind, String>,
    /// Keyed by (schema id, field).
    fields: HashMap<(String, String), HashMap<CheckKind, String>>,
}

impl CodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_global(&mut self, kind: CheckKind, code: impl Into<String>) {
        self.global.insert(kind, code.into());
    }

    pub fn set_field(
        &mut self,
        schema: impl Into<String>,
        field: impl Into<String>,
        kind: CheckKind,
        code: impl Into<String>,
    ) {
        self.fields
            .entry((schema.into(), field.into()))
            .or_default()
            .insert(kind, code.into());
    }

    /// Code for `kind` raised on `field` of `schema`.
    pub fn code_for(&self, schema: &str, field: &str, kind: CheckKind) -> &str {
        self.fields
            .get(&(schema.to_string(), field.to_string()))
            .and_then(|codes| codes.get(&kind))
            .or_else(|| self.global.get(&kind))
            .map(String::as_str)
            .unwrap_or(kind.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_precedence() {
        let mut registry = CodeRegistry::new();
        assert_eq!(
            registry.code_for("event", "title", CheckKind::MissingRequiredField),
            "missing-required-field"
        );

        registry.set_global(CheckKind::MissingRequiredField, "E001");
        registry.set_field("event", "title", CheckKind::MissingRequiredField, "E100");
        assert_eq!(
            registry.code_for("event", "title", CheckKind::MissingRequiredField),
            "E100"
        );
        assert_eq!(
            registry.code_for("event", "desc", CheckKind::MissingRequiredField),
            "E001"
        );
    }

    #[test]
    fn test_names_round_trip() {
        for kind in CheckKind::ALL {
            assert_eq!(CheckKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(CheckKind::from_name("bogus"), None);
    }
}
