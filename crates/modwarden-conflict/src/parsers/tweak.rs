//! Tweak definition parsing
//!
//! Two source formats:
//! - YAML (`.yaml`, `.yml`, `.xl`), possibly multi-document. Nested maps
//!   flatten into dotted keys; list items become appends unless tagged
//!   `!remove`; `!append` / `!append-once` / `!remove` tags are honoured.
//! - Line based `.tweak` files: `key = value`, `key += value`,
//!   `key -= value`, with `#` and `//` comments.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use thiserror::Error;

const BOM: char = '\u{feff}';

fn tweak_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*([A-Za-z0-9_.]+)\s*([+\-]?=)\s*(.+?)\s*$")
            .expect("tweak line pattern is valid")
    })
}

#[derive(Debug, Error)]
pub enum TweakParseError {
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TweakOp {
    Set,
    Append,
    Remove,
}

impl fmt::Display for TweakOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TweakOp::Set => "set",
            TweakOp::Append => "append",
            TweakOp::Remove => "remove",
        })
    }
}

/// A single operation on one dotted key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TweakOperation {
    pub key: String,
    pub op: TweakOp,
    /// Normalized value used for equality checks
    pub value: String,
}

impl TweakOperation {
    fn new(key: impl Into<String>, op: TweakOp, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            op,
            value: value.into(),
        }
    }
}

/// Parses a tweak file, choosing the format from its name.
/// Unknown extensions yield no operations.
pub fn parse_tweak_source(file_name: &str, source: &str) -> Result<Vec<TweakOperation>, TweakParseError> {
    let source = source.trim_start_matches(BOM);
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "yaml" | "yml" | "xl" => parse_yaml(source),
        "tweak" => Ok(parse_tweak_lines(source)),
        _ => Ok(Vec::new()),
    }
}

pub fn parse_yaml(source: &str) -> Result<Vec<TweakOperation>, TweakParseError> {
    let source = source.trim_start_matches(BOM);
    let mut ops = Vec::new();
    for document in serde_yaml::Deserializer::from_str(source) {
        let value = Value::deserialize(document)?;
        // Top-level scalars and lists carry no key
        if let Value::Mapping(map) = value {
            for (k, v) in map {
                if let Some(key) = key_string(&k) {
                    flatten(&key, v, &mut ops);
                }
            }
        }
    }
    Ok(ops)
}

pub fn parse_tweak_lines(source: &str) -> Vec<TweakOperation> {
    source
        .trim_start_matches(BOM)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#') && !l.starts_with("//"))
        .filter_map(|line| {
            let caps = tweak_line_re().captures(line)?;
            let op = match &caps[2] {
                "+=" => TweakOp::Append,
                "-=" => TweakOp::Remove,
                _ => TweakOp::Set,
            };
            Some(TweakOperation::new(&caps[1], op, &caps[3]))
        })
        .collect()
}

fn key_string(key: &Value) -> Option<String> {
    match key {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn tag_name(tagged: &serde_yaml::value::TaggedValue) -> String {
    tagged.tag.to_string().trim_start_matches('!').to_string()
}

/// Op implied by a tag, if it is one of ours
fn tag_op(name: &str) -> Option<TweakOp> {
    match name {
        "append" | "append-once" => Some(TweakOp::Append),
        "remove" => Some(TweakOp::Remove),
        _ => None,
    }
}

fn normalize(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Tagged(t) => normalize(&t.value),
        other => serde_json::to_string(other).unwrap_or_else(|_| format!("{other:?}")),
    }
}

fn flatten(prefix: &str, value: Value, ops: &mut Vec<TweakOperation>) {
    match value {
        Value::Mapping(map) => {
            for (k, v) in map {
                if let Some(field) = key_string(&k) {
                    flatten(&format!("{prefix}.{field}"), v, ops);
                }
            }
        }
        Value::Sequence(items) => {
            for item in items {
                let (op, inner) = match item {
                    Value::Tagged(t) => match tag_op(&tag_name(&t)) {
                        Some(op) => (op, t.value),
                        None => (TweakOp::Append, t.value),
                    },
                    other => (TweakOp::Append, other),
                };
                ops.push(TweakOperation::new(prefix, op, normalize(&inner)));
            }
        }
        Value::Tagged(t) => match tag_op(&tag_name(&t)) {
            Some(op) => match t.value {
                Value::Sequence(items) => {
                    for item in items {
                        ops.push(TweakOperation::new(prefix, op, normalize(&item)));
                    }
                }
                scalar => ops.push(TweakOperation::new(prefix, op, normalize(&scalar))),
            },
            None => flatten(prefix, t.value, ops),
        },
        scalar => ops.push(TweakOperation::new(prefix, TweakOp::Set, normalize(&scalar))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triples(ops: &[TweakOperation]) -> Vec<(&str, TweakOp, &str)> {
        ops.iter()
            .map(|o| (o.key.as_str(), o.op, o.value.as_str()))
            .collect()
    }

    #[test]
    fn test_nested_maps_flatten_to_sets() {
        let ops = parse_yaml("Items.Pistol:\n  quality: Legendary\n  stats:\n    damage: 42\n").unwrap();
        assert_eq!(
            triples(&ops),
            vec![
                ("Items.Pistol.quality", TweakOp::Set, "Legendary"),
                ("Items.Pistol.stats.damage", TweakOp::Set, "42"),
            ]
        );
    }

    #[test]
    fn test_list_items_append_unless_removed() {
        let ops = parse_yaml("Vendors.Shop.items:\n  - Items.A\n  - !remove Items.B\n  - !append-once Items.C\n").unwrap();
        assert_eq!(
            triples(&ops),
            vec![
                ("Vendors.Shop.items", TweakOp::Append, "Items.A"),
                ("Vendors.Shop.items", TweakOp::Remove, "Items.B"),
                ("Vendors.Shop.items", TweakOp::Append, "Items.C"),
            ]
        );
    }

    #[test]
    fn test_tagged_value_on_key() {
        let ops = parse_yaml("Vendors.Shop.items: !append Items.X\n").unwrap();
        assert_eq!(
            triples(&ops),
            vec![("Vendors.Shop.items", TweakOp::Append, "Items.X")]
        );
    }

    #[test]
    fn test_multi_document_and_bom() {
        let ops = parse_yaml("\u{feff}A.b: 1\n---\nA.c: true\n").unwrap();
        assert_eq!(
            triples(&ops),
            vec![("A.b", TweakOp::Set, "1"), ("A.c", TweakOp::Set, "true")]
        );
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        assert!(parse_yaml("a: [unclosed\n").is_err());
    }

    #[test]
    fn test_tweak_lines() {
        let src = "# comment\n// also comment\nItems.A.price = 100\nItems.A.tags += \"Rare\"\nItems.A.tags -= Common\nnot a line\n";
        let ops = parse_tweak_lines(src);
        assert_eq!(
            triples(&ops),
            vec![
                ("Items.A.price", TweakOp::Set, "100"),
                ("Items.A.tags", TweakOp::Append, "\"Rare\""),
                ("Items.A.tags", TweakOp::Remove, "Common"),
            ]
        );
    }

    #[test]
    fn test_dispatch_by_extension() {
        assert_eq!(parse_tweak_source("x.XL", "A.b: 2\n").unwrap().len(), 1);
        assert_eq!(parse_tweak_source("x.tweak", "A.b = 2\n").unwrap().len(), 1);
        assert!(parse_tweak_source("x.txt", "A.b = 2\n").unwrap().is_empty());
    }
}
