// context.rs — Context parameters and their per-run values
//
// Context parameters are the graph's free variables, fixed once per run.
// Values come from an operator (see `interact`) or from command-line presets;
// `-1` is the operator's way of saying "not a number", kept symbolic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A declared context parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextParam {
    pub name: String,
    #[serde(rename = "type", default = "default_type")]
    pub ty: String,
}

fn default_type() -> String {
    "int".to_string()
}

impl ContextParam {
    pub fn int(name: impl Into<String>) -> Self {
        ContextParam {
            name: name.into(),
            ty: default_type(),
        }
    }
}

/// Sentinel the operator enters for an unknown value.
pub const UNKNOWN_SENTINEL: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextValue {
    Known(i64),
    Unknown,
}

impl Serialize for ContextValue {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            ContextValue::Known(v) => s.serialize_i64(*v),
            ContextValue::Unknown => s.serialize_str("NaN"),
        }
    }
}

impl ContextValue {
    /// Interpret an operator-supplied integer.
    pub fn from_input(raw: i64) -> Self {
        if raw == UNKNOWN_SENTINEL {
            ContextValue::Unknown
        } else {
            ContextValue::Known(raw)
        }
    }
}

/// Values for every context parameter of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ContextValues {
    values: BTreeMap<String, ContextValue>,
}

impl ContextValues {
    pub fn insert(&mut self, param: &ContextParam, value: ContextValue) {
        self.values.insert(param.name.clone(), value);
    }

    pub fn get(&self, name: &str) -> Option<ContextValue> {
        self.values.get(name).copied()
    }

    /// The value of `name` when it is declared and known.
    pub fn known(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(ContextValue::Known(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ContextValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Parse a C-style context declaration block into parameters.
///
/// Statements are separated by `;`. The first word of a statement is the
/// type; the remaining comma-separated names all share it, e.g.
/// `"int N, M; long K;"`.
pub fn parse_context_params(decls: &str) -> Vec<ContextParam> {
    let mut params = Vec::new();
    for statement in decls.split(';') {
        let normalized = statement.split_whitespace().collect::<Vec<_>>().join(" ");
        let Some((ty, names)) = normalized.split_once(' ') else {
            continue;
        };
        for name in names.split(',') {
            let name = name.trim();
            if !name.is_empty() {
                params.push(ContextParam {
                    name: name.to_string(),
                    ty: ty.to_string(),
                });
            }
        }
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declaration_block() {
        let params = parse_context_params("int N, M;\n  long   K ;");
        assert_eq!(
            params,
            vec![
                ContextParam {
                    name: "N".into(),
                    ty: "int".into()
                },
                ContextParam {
                    name: "M".into(),
                    ty: "int".into()
                },
                ContextParam {
                    name: "K".into(),
                    ty: "long".into()
                },
            ]
        );
    }

    #[test]
    fn empty_statements_are_skipped() {
        assert!(parse_context_params(";;  ;").is_empty());
        assert!(parse_context_params("int").is_empty());
    }

    #[test]
    fn sentinel_is_unknown() {
        assert_eq!(ContextValue::from_input(-1), ContextValue::Unknown);
        assert_eq!(ContextValue::from_input(0), ContextValue::Known(0));

        let mut values = ContextValues::default();
        values.insert(&ContextParam::int("N"), ContextValue::from_input(-1));
        values.insert(&ContextParam::int("M"), ContextValue::from_input(3));
        assert_eq!(values.known("N"), None);
        assert_eq!(values.known("M"), Some(3));
        assert_eq!(values.get("N"), Some(ContextValue::Unknown));
        assert_eq!(
            serde_json::to_string(&values).unwrap(),
            r#"{"M":3,"N":"NaN"}"#
        );
    }
}
