//! Test utilities shared across the pdx crates.
//!
//! - [`init_tracing`] installs a test-friendly subscriber once per process.
//! - Annotated sources let a test state expected errors inline:
//!
//! ```text
//! a = { b = 1
//!     ^ unclosed-block
//! ```
//!
//! An annotation line starts (after optional indentation) with `^`. The caret
//! run marks columns of the closest source line above it; the word after the
//! carets names the expected error kind. Annotation lines are removed before
//! the source is handed to the code under test.

use std::ops::Range;
use std::sync::Once;

static INIT: Once = Once::new();

/// Install a `tracing` subscriber that writes through the test harness.
/// Honours `RUST_LOG`; safe to call from every test.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// An error produced by the code under test, reduced to what annotations can express.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActualError {
    /// Byte range in the annotation-free source.
    pub span: Range<usize>,
    /// Kind name, compared verbatim against the annotation text.
    pub kind: String,
}

/// An error expected by an annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedError {
    pub span: Range<usize>,
    pub kind: String,
}

fn is_annotation(line: &str) -> bool {
    line.trim_start().starts_with('^')
}

/// Strip annotation lines, returning the source the parser should see.
pub fn source_without_annotations(annotated: &str) -> String {
    annotated
        .split_inclusive('\n')
        .filter(|line| !is_annotation(line))
        .collect::<String>()
        .trim_end_matches('\n')
        .to_string()
}

/// Extract expected errors from annotation lines.
pub fn expected_errors(annotated: &str) -> Vec<ExpectedError> {
    let mut expected = Vec::new();
    let mut offset = 0usize;
    let mut last_line_start: Option<usize> = None;

    for line in annotated.split_inclusive('\n') {
        if is_annotation(line) {
            let Some(line_start) = last_line_start else {
                panic!("annotation before any source line: {line:?}");
            };
            let caret_col = line.len() - line.trim_start().len();
            let rest = &line[caret_col..];
            let carets = rest.chars().take_while(|c| *c == '^').count();
            let kind = rest[carets..].trim().to_string();
            assert!(!kind.is_empty(), "annotation without a kind: {line:?}");
            let start = line_start + caret_col;
            expected.push(ExpectedError {
                span: start..start + carets,
                kind,
            });
        } else {
            last_line_start = Some(offset);
            offset += line.len();
        }
    }
    expected
}

/// Assert that `actual` matches the annotations: same count, and each
/// expected error has an actual error of the same kind starting at the same
/// offset.
pub fn assert_annotated_errors(annotated: &str, actual: Vec<ActualError>) {
    let expected = expected_errors(annotated);
    let source = source_without_annotations(annotated);

    let describe = |span: &Range<usize>| {
        let start = span.start.min(source.len());
        let end = span.end.clamp(start, source.len());
        format!("{:?} ({:?})", span, &source[start..end])
    };

    let mut unmatched: Vec<ActualError> = actual;
    let mut missing = Vec::new();
    for exp in &expected {
        match unmatched
            .iter()
            .position(|a| a.kind == exp.kind && a.span.start == exp.span.start)
        {
            Some(idx) => {
                unmatched.remove(idx);
            }
            None => missing.push(exp),
        }
    }

    if missing.is_empty() && unmatched.is_empty() {
        return;
    }

    let mut report = String::from("annotated errors do not match\n");
    for exp in missing {
        report.push_str(&format!("  missing:    {} at {}\n", exp.kind, describe(&exp.span)));
    }
    for act in &unmatched {
        report.push_str(&format!("  unexpected: {} at {}\n", act.kind, describe(&act.span)));
    }
    report.push_str("source:\n");
    report.push_str(&source);
    panic!("{report}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_and_extract() {
        let annotated = "a = { b = 1\n    ^ unclosed-block\nc = 2";
        assert_eq!(source_without_annotations(annotated), "a = { b = 1\nc = 2");
        assert_eq!(
            expected_errors(annotated),
            vec![ExpectedError {
                span: 4..5,
                kind: "unclosed-block".to_string()
            }]
        );
    }

    #[test]
    fn test_annotation_refers_to_nearest_source_line() {
        let annotated = "x = 1\ny = }\n    ^ unmatched-close-brace";
        let expected = expected_errors(annotated);
        assert_eq!(expected[0].span.start, 10);
        assert_eq!(&source_without_annotations(annotated)[10..11], "}");
    }

    #[test]
    fn test_assert_passes_on_match() {
        assert_annotated_errors(
            "a }\n  ^ stray",
            vec![ActualError {
                span: 2..3,
                kind: "stray".into(),
            }],
        );
    }

    #[test]
    #[should_panic(expected = "annotated errors do not match")]
    fn test_assert_fails_on_extra_error() {
        assert_annotated_errors(
            "a = 1",
            vec![ActualError {
                span: 0..1,
                kind: "bogus".into(),
            }],
        );
    }
}
