//! Message templates for cross-field rules.

use pdx_parse::{Ast, NodeId};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Text(String),
    /// `{key}`
    Key,
    /// `{value}`: the scalar value, or the tag of a container.
    Value,
    /// `{field:NAME}`: value of the first child named NAME.
    Field(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    parts: Vec<Part>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, String> {
        let mut parts = Vec::new();
        let mut rest = source;
        while let Some(open) = rest.find('{') {
            if open > 0 {
                parts.push(Part::Text(rest[..open].to_string()));
            }
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else {
                return Err(format!("unclosed placeholder at byte {}", source.len() - rest.len() + open));
            };
            let name = &after[..close];
            parts.push(match name {
                "key" => Part::Key,
                "value" => Part::Value,
                _ => match name.strip_prefix("field:") {
                    Some(field) if !field.is_empty() => Part::Field(field.to_string()),
                    _ => return Err(format!("unknown placeholder `{{{name}}}`")),
                },
            });
            rest = &after[close + 1..];
        }
        if !rest.is_empty() {
            parts.push(Part::Text(rest.to_string()));
        }
        Ok(Self { parts })
    }

    /// Fill placeholders from `node`. Missing values render as empty text.
    pub fn render(&self, ast: &Ast, node: NodeId) -> String {
        let n = ast.node(node);
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Text(text) => out.push_str(text),
                Part::Key => out.push_str(n.key_str().unwrap_or_default()),
                Part::Value => {
                    let value = n.value.as_ref().or(n.tag.as_ref());
                    out.push_str(value.map(|v| v.as_str()).unwrap_or_default());
                }
                Part::Field(field) => {
                    let value = ast
                        .child_by_key(Some(node), field)
                        .and_then(|id| ast.node(id).value_str());
                    out.push_str(value.unwrap_or_default());
                }
            }
        }
        out
    }
}
