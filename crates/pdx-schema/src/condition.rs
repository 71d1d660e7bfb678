//! Compiled condition trees and their evaluation against an AST node.

use std::fmt;

use pdx_parse::{Ast, NodeId};

/// Comparison used by `count` and `compare`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn parse(op: &str) -> Option<Self> {
        Some(match op {
            "==" | "=" => CompareOp::Eq,
            "!=" => CompareOp::Ne,
            "<" => CompareOp::Lt,
            "<=" => CompareOp::Le,
            ">" => CompareOp::Gt,
            ">=" => CompareOp::Ge,
            _ => return None,
        })
    }

    fn numbers(self, lhs: f64, rhs: f64) -> bool {
        match self {
            CompareOp::Eq => lhs == rhs,
            CompareOp::Ne => lhs != rhs,
            CompareOp::Lt => lhs < rhs,
            CompareOp::Le => lhs <= rhs,
            CompareOp::Gt => lhs > rhs,
            CompareOp::Ge => lhs >= rhs,
        }
    }

    /// Non-numeric operands only support equality.
    fn text(self, lhs: &str, rhs: &str) -> bool {
        match self {
            CompareOp::Eq => lhs == rhs,
            CompareOp::Ne => lhs != rhs,
            _ => false,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        })
    }
}

/// A condition over the children of one node.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    All(Vec<Condition>),
    Any(Vec<Condition>),
    Not(Box<Condition>),
    /// A child with this key is present.
    Exists(String),
    /// Number of children with this key compared to `value`.
    Count {
        field: String,
        op: CompareOp,
        value: f64,
    },
    /// Value of the first child with this key compared to `value`.
    Compare {
        field: String,
        op: CompareOp,
        value: String,
    },
}

impl Condition {
    /// Evaluate with `node`'s children as the fields.
    pub fn eval(&self, ast: &Ast, node: NodeId) -> bool {
        match self {
            Condition::All(items) => items.iter().all(|c| c.eval(ast, node)),
            Condition::Any(items) => items.iter().any(|c| c.eval(ast, node)),
            Condition::Not(inner) => !inner.eval(ast, node),
            Condition::Exists(field) => ast.child_by_key(Some(node), field).is_some(),
            Condition::Count { field, op, value } => {
                let count = ast.children_by_key(Some(node), field).count();
                op.numbers(count as f64, *value)
            }
            Condition::Compare { field, op, value } => {
                let Some(actual) = ast
                    .child_by_key(Some(node), field)
                    .and_then(|id| ast.node(id).value.as_ref())
                else {
                    return false;
                };
                match (actual.as_number(), value.parse::<f64>().ok()) {
                    (Some(lhs), Some(rhs)) => op.numbers(lhs, rhs),
                    _ => op.text(actual.as_str(), value),
                }
            }
        }
    }
}
