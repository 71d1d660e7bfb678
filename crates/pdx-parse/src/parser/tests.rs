use super::*;
use crate::{NodeKind, Operator, Position, ScalarKind};
use pdx_testhelpers::{ActualError, assert_annotated_errors, init_tracing, source_without_annotations};
use proptest::prelude::*;

fn assert_parse_errors(annotated_source: &str) {
    init_tracing();
    let source = source_without_annotations(annotated_source);
    let ast = parse(&source);
    let actual_errors: Vec<_> = ast
        .errors()
        .iter()
        .map(|e| ActualError {
            span: e.span.into(),
            kind: e.kind.code().to_string(),
        })
        .collect();
    assert_annotated_errors(annotated_source, actual_errors);
}

fn root<'a>(ast: &'a Ast, key: &str) -> &'a AstNode {
    let id = ast.child_by_key(None, key).unwrap();
    ast.node(id)
}

#[test]
fn test_empty_document() {
    let ast = parse("");
    assert!(ast.is_empty());
    assert!(!ast.has_errors());
}

#[test]
fn test_block_with_assignment() {
    let source = "a = { b = 1 }";
    let ast = parse(source);
    assert!(!ast.has_errors());
    assert_eq!(ast.roots().len(), 1);

    let a = root(&ast, "a");
    assert_eq!(a.kind, NodeKind::Block);
    assert_eq!(a.range.start, Position::new(0, 0));
    assert_eq!(a.range.end, Position::new(0, 13));
    assert_eq!(a.span.slice(source), source);
    assert_eq!(a.children.len(), 1);

    let b = ast.node(a.children[0]);
    assert_eq!(b.kind, NodeKind::Assignment);
    assert_eq!(b.key_str(), Some("b"));
    assert_eq!(b.value_str(), Some("1"));
    assert_eq!(b.value.as_ref().unwrap().as_number(), Some(1.0));
    assert_eq!(b.parent, Some(ast.roots()[0]));
}

#[test]
fn test_unclosed_block_is_reported_once() {
    let ast = parse("a = { b = 1");
    assert_eq!(ast.errors().len(), 1);
    assert_eq!(ast.errors()[0].kind, ParseErrorKind::UnclosedBlock);

    let a = root(&ast, "a");
    assert!(a.unclosed);
    assert_eq!(a.range.end, Position::new(0, 11));
    assert_eq!(ast.node(a.children[0]).key_str(), Some("b"));
}

#[test]
fn test_unclosed_block_annotated() {
    assert_parse_errors(
        r#"a = {
    ^ unclosed-block
  b = 1
  c = 2"#,
    );
}

#[test]
fn test_unmatched_close_brace() {
    assert_parse_errors(
        r#"x = 1
}
^ unmatched-close-brace
y = 2"#,
    );
    let ast = parse("x = 1\n}\ny = 2");
    assert_eq!(ast.roots().len(), 2);
}

#[test]
fn test_missing_value() {
    assert_parse_errors(
        r#"x = { a = }
        ^ missing-value"#,
    );
    let ast = parse("x = { a = }");
    let x = root(&ast, "x");
    assert!(!x.unclosed);
    let a = ast.node(x.children[0]);
    assert_eq!(a.key_str(), Some("a"));
    assert_eq!(a.value, None);
}

#[test]
fn test_missing_value_at_end_of_input() {
    assert_parse_errors(
        r#"a = 1
b =
  ^ missing-value"#,
    );
}

#[test]
fn test_unterminated_string_keeps_value() {
    assert_parse_errors(
        r#"name = "hello
       ^ unterminated-string
b = 2"#,
    );
    let ast = parse("name = \"hello\nb = 2");
    assert_eq!(root(&ast, "name").value_str(), Some("hello"));
    assert_eq!(root(&ast, "b").value_str(), Some("2"));
}

#[test]
fn test_unexpected_tokens() {
    assert_parse_errors(
        r#"a = 1 ! b = 2
      ^ unexpected-token
= 3
^ unexpected-token"#,
    );
}

#[test]
fn test_list_of_values() {
    let ast = parse("l = { a b c }");
    let l = root(&ast, "l");
    assert_eq!(l.kind, NodeKind::List);
    let items: Vec<_> = ast
        .children(ast.roots()[0])
        .map(|(_, n)| {
            assert_eq!(n.kind, NodeKind::Value);
            n.value_str().unwrap()
        })
        .collect();
    assert_eq!(items, vec!["a", "b", "c"]);
}

#[test]
fn test_empty_braces_are_a_block() {
    let ast = parse("e = { }");
    assert_eq!(root(&ast, "e").kind, NodeKind::Block);
}

#[test]
fn test_list_of_anonymous_blocks() {
    let ast = parse("m = { { x = 1 } { x = 2 } }");
    let m = root(&ast, "m");
    assert_eq!(m.kind, NodeKind::List);
    for (_, child) in ast.children(ast.roots()[0]) {
        assert_eq!(child.kind, NodeKind::Block);
        assert_eq!(child.key, None);
        assert_eq!(child.children.len(), 1);
    }
}

#[test]
fn test_tagged_container() {
    let ast = parse("color = rgb { 1 2 3 }");
    assert!(!ast.has_errors());
    let color = root(&ast, "color");
    assert_eq!(color.kind, NodeKind::List);
    assert_eq!(color.tag.as_ref().map(|t| t.as_str()), Some("rgb"));
    assert_eq!(color.children.len(), 3);
}

#[test]
fn test_value_then_block_on_next_line_is_not_a_tag() {
    let ast = parse("a = b\n{ c = 1 }");
    assert_eq!(ast.roots().len(), 2);
    assert_eq!(root(&ast, "a").value_str(), Some("b"));
}

#[test]
fn test_comparison_operators() {
    let ast = parse("age >= 16\ngold < 5\nname != x\nflag ?= yes");
    let ops: Vec<_> = ast
        .roots()
        .iter()
        .map(|&id| ast.node(id).operator.unwrap())
        .collect();
    assert_eq!(
        ops,
        vec![
            Operator::GreaterEqual,
            Operator::Less,
            Operator::NotEqual,
            Operator::Conditional
        ]
    );
}

#[test]
fn test_comments_become_nodes() {
    let ast = parse("# hello\na = { # inner\n  b = 1 }");
    let first = ast.node(ast.roots()[0]);
    assert!(first.is_comment());
    assert_eq!(first.value_str(), Some("hello"));

    let a = root(&ast, "a");
    assert_eq!(a.kind, NodeKind::Block);
    assert!(ast.node(a.children[0]).is_comment());
}

#[test]
fn test_quoted_escapes() {
    let ast = parse(r#"t = "say \"hi\" \\ ok""#);
    let value = root(&ast, "t").value.clone().unwrap();
    assert_eq!(value.kind, ScalarKind::Quoted);
    assert_eq!(value.text, r#"say "hi" \ ok"#);
    assert_eq!(value.as_number(), None);
}

#[test]
fn test_nodes_are_preorder() {
    let ast = parse("a = { b = { c = 1 } d = 2 }\ne = 3");
    let keys: Vec<_> = ast.nodes().filter_map(|(_, n)| n.key_str()).collect();
    assert_eq!(keys, vec!["a", "b", "c", "d", "e"]);
}

#[test]
fn test_deep_nesting_is_bounded() {
    let depth = MAX_DEPTH + 40;
    let source = format!("a = {}{}", "{ ".repeat(depth), "} ".repeat(depth));
    let ast = parse(&source);
    let kinds: Vec<_> = ast.errors().iter().map(|e| e.kind.code()).collect();
    assert_eq!(kinds, vec!["nesting-too-deep"]);
}

#[test]
fn test_parse_is_deterministic() {
    let source = "a = { b = 1 c = { d e } }\n}\nf = \"x";
    assert_eq!(parse(source), parse(source));
}

fn check_tree(ast: &Ast) {
    let mut level = ast.roots().to_vec();
    for pair in level.windows(2) {
        assert!(ast.node(pair[0]).range.end <= ast.node(pair[1]).range.start);
    }
    while let Some(id) = level.pop() {
        let node = ast.node(id);
        for pair in node.children.windows(2) {
            assert!(ast.node(pair[0]).range.end <= ast.node(pair[1]).range.start);
        }
        for &child in &node.children {
            assert_eq!(ast.parent(child), Some(id));
            assert!(node.range.encloses(&ast.node(child).range));
            level.push(child);
        }
    }
}

proptest! {
    #[test]
    fn parse_never_panics_and_nests_ranges(source in "[a-z0-9 ={}#\"\n<>!?.]{0,80}") {
        let ast = parse(&source);
        check_tree(&ast);
    }

    #[test]
    fn node_at_result_contains_position(
        source in "[a-z ={}\n]{0,60}",
        line in 0u32..4,
        column in 0u32..20,
    ) {
        let ast = parse(&source);
        let pos = Position::new(line, column);
        if let Some(id) = ast.node_at(pos) {
            prop_assert!(ast.node(id).range.contains(pos));
        }
    }
}
