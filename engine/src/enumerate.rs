// enumerate.rs — Expansion of tag-expression tuples into concrete tags
//
// Each component is resolved once up front. Ranged components then drive a
// depth-first expansion over an explicit work stack: the first pending range
// picks one value and the rest of the tuple is expanded under it, yielding
// the Cartesian product in ascending lexicographic order.
//
// Preconditions: context values have been substituted into `tuple`.
// Postconditions: only fully concrete tags are yielded.
// Failure modes: none. A tuple with a false guard or unresolved component
//                yields nothing; `discarded()` says why.
// Side effects: none.

use crate::ast::TagExpr;
use crate::env::Env;
use crate::tag::{Resolved, Tag};

/// Enumeration cap applied per range when none is configured.
pub const DEFAULT_RANGE_LIMIT: usize = 100;

/// A range that had more values than the cap allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Truncation {
    /// Component position within the tuple.
    pub position: usize,
    /// Values the range denotes.
    pub len: u64,
    /// Values actually enumerated.
    pub kept: usize,
}

/// Why a tuple produced no tags at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discard {
    /// A conditional component's guard is false.
    GuardFalse { position: usize },
    /// A component could not be evaluated (free variable, unknown context, fault).
    Unresolved { position: usize, reason: String },
}

struct Frame {
    position: usize,
    prefix: Vec<i64>,
}

/// Iterator over the concrete tags a tuple denotes.
///
/// Owns all of its state, so every call to [`expand`] starts a fresh,
/// independent sequence.
pub struct Enumerator {
    components: Vec<Resolved>,
    stack: Vec<Frame>,
    limit: usize,
    truncations: Vec<Truncation>,
    discarded: Option<Discard>,
}

/// Expand `tuple` under `env`, enumerating at most `limit` values per range.
pub fn expand(tuple: &[TagExpr], env: &Env, limit: usize) -> Enumerator {
    let components: Vec<Resolved> = tuple.iter().map(|c| c.resolve(env)).collect();

    let mut discarded = None;
    let mut truncations = Vec::new();
    for (position, component) in components.iter().enumerate() {
        match component {
            Resolved::Undefined => {
                discarded.get_or_insert(Discard::GuardFalse { position });
            }
            Resolved::Unresolved(err) => {
                discarded.get_or_insert(Discard::Unresolved {
                    position,
                    reason: err.to_string(),
                });
            }
            Resolved::Range(range) if range.len() > limit as u64 => {
                truncations.push(Truncation {
                    position,
                    len: range.len(),
                    kept: limit,
                });
            }
            _ => {}
        }
    }

    let stack = if discarded.is_none() {
        vec![Frame {
            position: 0,
            prefix: Vec::with_capacity(components.len()),
        }]
    } else {
        Vec::new()
    };

    Enumerator {
        components,
        stack,
        limit,
        truncations,
        discarded,
    }
}

impl Enumerator {
    /// Ranges that were cut short by the cap.
    pub fn truncations(&self) -> &[Truncation] {
        &self.truncations
    }

    pub fn discarded(&self) -> Option<&Discard> {
        self.discarded.as_ref()
    }
}

impl Iterator for Enumerator {
    type Item = Tag;

    fn next(&mut self) -> Option<Tag> {
        while let Some(Frame {
            mut position,
            mut prefix,
        }) = self.stack.pop()
        {
            // Consume single values until the next range or the end.
            loop {
                match self.components.get(position) {
                    None => return Some(Tag(prefix)),
                    Some(Resolved::Value(v)) => {
                        prefix.push(*v);
                        position += 1;
                    }
                    Some(Resolved::Range(range)) => {
                        // Pushed in reverse so the smallest value is popped first.
                        for v in range.capped(self.limit).rev() {
                            let mut next = prefix.clone();
                            next.push(v);
                            self.stack.push(Frame {
                                position: position + 1,
                                prefix: next,
                            });
                        }
                        break;
                    }
                    // Excluded when the enumerator was built.
                    Some(Resolved::Undefined | Resolved::Unresolved(_)) => break,
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_expr, parse_tag_component};

    fn tuple(components: &[&str]) -> Vec<TagExpr> {
        components
            .iter()
            .map(|c| parse_tag_component(c).unwrap())
            .collect()
    }

    fn env(pairs: &[(&str, i64)]) -> Env {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn tags(e: Enumerator) -> Vec<Vec<i64>> {
        e.map(|t| t.0).collect()
    }

    #[test]
    fn exclusive_range() {
        let out = tags(expand(&tuple(&["0 .. 3"]), &Env::new(), 100));
        assert_eq!(out, vec![vec![0], vec![1], vec![2]]);
    }

    #[test]
    fn inclusive_range() {
        let out = tags(expand(&tuple(&["0 ..= 3"]), &Env::new(), 100));
        assert_eq!(out, vec![vec![0], vec![1], vec![2], vec![3]]);
    }

    #[test]
    fn empty_ranges() {
        assert!(tags(expand(&tuple(&["3 .. 3"]), &Env::new(), 100)).is_empty());
        assert!(tags(expand(&tuple(&["5 .. 1"]), &Env::new(), 100)).is_empty());
        assert!(tags(expand(&tuple(&["5 ..= 4"]), &Env::new(), 100)).is_empty());
        assert_eq!(
            tags(expand(&tuple(&["4 ..= 4"]), &Env::new(), 100)),
            vec![vec![4]]
        );
    }

    #[test]
    fn cartesian_product_in_order() {
        let out = tags(expand(&tuple(&["0 .. 2", "k", "10 .. 12"]), &env(&[("k", 7)]), 100));
        assert_eq!(
            out,
            vec![
                vec![0, 7, 10],
                vec![0, 7, 11],
                vec![1, 7, 10],
                vec![1, 7, 11],
            ]
        );
    }

    #[test]
    fn plain_tuple_yields_one_tag() {
        let out = tags(expand(&tuple(&["i + 1", "j"]), &env(&[("i", 1), ("j", 9)]), 100));
        assert_eq!(out, vec![vec![2, 9]]);
    }

    #[test]
    fn empty_tuple_yields_the_empty_tag() {
        assert_eq!(tags(expand(&[], &Env::new(), 100)), vec![Vec::<i64>::new()]);
    }

    #[test]
    fn false_guard_discards_tuple() {
        let mut t = tuple(&["i", "i - 1"]);
        t[1] = t[1].clone().guarded(parse_expr("i > 0").unwrap());
        let e = expand(&t, &env(&[("i", 0)]), 100);
        assert_eq!(e.discarded(), Some(&Discard::GuardFalse { position: 1 }));
        assert!(tags(e).is_empty());
        assert_eq!(tags(expand(&t, &env(&[("i", 2)]), 100)), vec![vec![2, 1]]);
    }

    #[test]
    fn unbound_variable_discards_tuple() {
        let e = expand(&tuple(&["0 .. 3", "q"]), &Env::new(), 100);
        assert!(matches!(
            e.discarded(),
            Some(Discard::Unresolved { position: 1, .. })
        ));
        assert_eq!(e.count(), 0);
    }

    #[test]
    fn cap_truncates_and_reports() {
        let e = expand(&tuple(&["0 .. 1000"]), &Env::new(), 100);
        assert_eq!(
            e.truncations(),
            &[Truncation {
                position: 0,
                len: 1000,
                kept: 100
            }]
        );
        let out = tags(e);
        assert_eq!(out.len(), 100);
        assert_eq!(out.last(), Some(&vec![99]));
    }

    #[test]
    fn restartable() {
        let t = tuple(&["0 .. 3"]);
        let first = tags(expand(&t, &Env::new(), 100));
        let second = tags(expand(&t, &Env::new(), 100));
        assert_eq!(first, second);
    }
}
