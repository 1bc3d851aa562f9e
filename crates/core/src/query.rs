// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use regex::Regex;
use serde_json::Value;

use crate::error::{CoreError, CoreResult};

/// Comparison operator parsed from a dotted filter key's suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Gt,
    Lt,
    Gte,
    Lte,
    Ne,
    Re,
}

/// A single filter clause: `data.kernel_revision.tree__gt = "v6.1"`.
#[derive(Debug, Clone)]
pub struct FilterClause {
    pub path: Vec<String>,
    pub op: Op,
    pub value: String,
}

/// A parsed filter: a conjunction of clauses (all must match).
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub clauses: Vec<FilterClause>,
}

const SUFFIXES: &[(&str, Op)] =
    &[("__gt", Op::Gt), ("__lt", Op::Lt), ("__gte", Op::Gte), ("__lte", Op::Lte), ("__ne", Op::Ne), ("__re", Op::Re)];

impl Filter {
    /// Parse query params (key, value) pairs into a `Filter`. Keys reserved
    /// for pagination (`limit`, `offset`) are skipped by the caller before
    /// reaching this function.
    pub fn parse(params: impl IntoIterator<Item = (String, String)>) -> CoreResult<Filter> {
        let mut clauses = Vec::new();
        for (key, value) in params {
            let (bare_key, op) = SUFFIXES
                .iter()
                .find_map(|(suffix, op)| key.strip_suffix(suffix).map(|k| (k, *op)))
                .unwrap_or((key.as_str(), Op::Eq));

            if bare_key.is_empty() {
                return Err(CoreError::InvalidInput(format!("empty filter key in {key:?}")));
            }
            let path: Vec<String> = bare_key.split('.').map(str::to_owned).collect();
            if path.iter().any(String::is_empty) {
                return Err(CoreError::InvalidInput(format!("malformed dotted key {bare_key:?}")));
            }
            if op == Op::Re {
                if Regex::new(&value).is_err() {
                    return Err(CoreError::InvalidInput(format!("invalid regex in filter: {value:?}")));
                }
            }
            clauses.push(FilterClause { path, op, value });
        }
        Ok(Filter { clauses })
    }

    pub fn matches(&self, doc: &Value) -> bool {
        self.clauses.iter().all(|clause| clause_matches(clause, doc))
    }
}

fn navigate<'a>(doc: &'a Value, path: &[String]) -> Option<&'a Value> {
    let mut cur = doc;
    for segment in path {
        cur = cur.as_object()?.get(segment)?;
    }
    Some(cur)
}

fn clause_matches(clause: &FilterClause, doc: &Value) -> bool {
    let found = navigate(doc, &clause.path);

    // The literal string "null" matches absent/null.
    if clause.value == "null" && clause.op == Op::Eq {
        return matches!(found, None | Some(Value::Null));
    }

    let Some(found) = found else { return false };

    match clause.op {
        Op::Eq => value_eq(found, &clause.value),
        Op::Ne => !value_eq(found, &clause.value),
        Op::Re => {
            let Some(s) = found.as_str() else { return false };
            Regex::new(&clause.value).map(|re| re.is_match(s)).unwrap_or(false)
        }
        Op::Gt | Op::Lt | Op::Gte | Op::Lte => compare(found, &clause.value, clause.op),
    }
}

fn value_eq(found: &Value, target: &str) -> bool {
    match found {
        Value::String(s) => s == target,
        Value::Number(n) => target.parse::<f64>().map(|t| n.as_f64() == Some(t)).unwrap_or(false),
        Value::Bool(b) => target.parse::<bool>().map(|t| *b == t).unwrap_or(false),
        Value::Null => target == "null",
        _ => false,
    }
}

fn compare(found: &Value, target: &str, op: Op) -> bool {
    let ordering = match found {
        Value::Number(n) => {
            let Some(f) = n.as_f64() else { return false };
            let Ok(t) = target.parse::<f64>() else { return false };
            f.partial_cmp(&t)
        }
        Value::String(s) => {
            // ISO-8601 timestamps and plain strings both compare correctly
            // lexicographically when fixed-width; this is adequate for the
            // dotted-path filter values this API exposes (timestamps,
            // kernel versions, free text).
            Some(s.as_str().cmp(target))
        }
        _ => None,
    };
    let Some(ordering) = ordering else { return false };
    match op {
        Op::Gt => ordering.is_gt(),
        Op::Lt => ordering.is_lt(),
        Op::Gte => ordering.is_ge(),
        Op::Lte => ordering.is_le(),
        _ => unreachable!(),
    }
}
