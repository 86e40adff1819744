// tag.rs — Concrete tags and resolution of tag-expression components
//
// A `Tag` is the concrete positional tuple stored in the resolution sets.
// A `TagExpr` component resolves under a local environment to one value, a
// finite range of values, or nothing (false guard, free structure).

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::ast::{Expr, RangeExpr, Scope, TagExpr};
use crate::context::ContextValues;
use crate::env::Env;
use crate::eval::EvalError;

// ── Concrete tags ──

/// A concrete tag tuple.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Tag(pub Vec<i64>);

impl Tag {
    pub fn empty() -> Self {
        Tag(Vec::new())
    }

    pub fn values(&self) -> &[i64] {
        &self.0
    }
}

impl From<Vec<i64>> for Tag {
    fn from(values: Vec<i64>) -> Self {
        Tag(values)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v}")?;
        }
        write!(f, ")")
    }
}

/// A (collection, concrete tag) pair: one step invocation or one item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Instance {
    pub collection: String,
    pub tag: Tag,
}

impl Instance {
    pub fn new(collection: impl Into<String>, tag: impl Into<Tag>) -> Self {
        Instance {
            collection: collection.into(),
            tag: tag.into(),
        }
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.collection, self.tag)
    }
}

// ── Component resolution ──

/// Half-open integer interval `[start, end)`. Empty when `start >= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagRange {
    pub start: i64,
    pub end: i64,
}

impl TagRange {
    /// Number of values, saturating at `u64::MAX`.
    pub fn len(&self) -> u64 {
        if self.start >= self.end {
            0
        } else {
            (self.end as i128 - self.start as i128).min(u64::MAX as i128) as u64
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The first `limit` values in ascending order.
    pub fn capped(&self, limit: usize) -> std::ops::Range<i64> {
        let take = self.len().min(limit as u64) as i64;
        self.start..self.start + take
    }
}

/// What a component denotes once every variable is bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Value(i64),
    Range(TagRange),
    /// A conditional whose guard is false: no tag at all.
    Undefined,
    /// Free or faulting structure remains.
    Unresolved(EvalError),
}

impl TagExpr {
    /// Pre-substitute run-fixed context values.
    pub fn substitute_context(&self, ctx: &ContextValues) -> TagExpr {
        match self {
            TagExpr::Plain(e) => TagExpr::Plain(e.substitute_context(ctx)),
            TagExpr::Ranged(r) => TagExpr::Ranged(RangeExpr {
                start: r.start.substitute_context(ctx),
                end: r.end.substitute_context(ctx),
                inclusive: r.inclusive,
            }),
            TagExpr::Conditional { guard, value } => TagExpr::Conditional {
                guard: guard.substitute_context(ctx),
                value: Box::new(value.substitute_context(ctx)),
            },
        }
    }

    /// Wrap this component so it only denotes a tag where `guard` holds.
    pub fn guarded(self, guard: Expr) -> TagExpr {
        TagExpr::Conditional {
            guard,
            value: Box::new(self),
        }
    }

    /// The plain expression under any guards, if the component is not ranged.
    pub fn plain(&self) -> Option<&Expr> {
        match self {
            TagExpr::Plain(e) => Some(e),
            TagExpr::Ranged(_) => None,
            TagExpr::Conditional { value, .. } => value.plain(),
        }
    }

    /// Collect the names of free variables in `scope`, guards included.
    pub fn free_vars(&self, scope: Scope, out: &mut BTreeSet<String>) {
        match self {
            TagExpr::Plain(e) => e.free_vars(scope, out),
            TagExpr::Ranged(r) => {
                r.start.free_vars(scope, out);
                r.end.free_vars(scope, out);
            }
            TagExpr::Conditional { guard, value } => {
                guard.free_vars(scope, out);
                value.free_vars(scope, out);
            }
        }
    }

    /// Resolve under a local environment.
    pub fn resolve(&self, env: &Env) -> Resolved {
        match self {
            TagExpr::Plain(e) => match e.eval(env) {
                Ok(v) => Resolved::Value(v),
                Err(err) => Resolved::Unresolved(err),
            },
            TagExpr::Ranged(r) => {
                let bounds = r.start.eval(env).and_then(|start| {
                    let end = r.end.eval(env)?;
                    let end = if r.inclusive {
                        end.checked_add(1).ok_or(EvalError::Overflow)?
                    } else {
                        end
                    };
                    Ok(TagRange { start, end })
                });
                match bounds {
                    Ok(range) => Resolved::Range(range),
                    Err(err) => Resolved::Unresolved(err),
                }
            }
            TagExpr::Conditional { guard, value } => match guard.holds(env) {
                Ok(true) => value.resolve(env),
                Ok(false) => Resolved::Undefined,
                Err(err) => Resolved::Unresolved(err),
            },
        }
    }
}
