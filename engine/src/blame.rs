// blame.rs — Which step could have produced a demanded item
//
// The blame oracle is the backward half of resolution: given a concrete
// (collection, tag), propose producing steps and the tag bindings under
// which they produce it. `InverseOracle` handles output tag functions that
// are affine in the step's tag variables, which covers the usual
// `i`, `i + 1`, `2 * i`, `#N - i` forms. Ranged positions are skipped when
// solving since they pin no single value.

use std::collections::BTreeMap;

use crate::ast::TagExpr;
use crate::context::ContextValues;
use crate::enumerate;
use crate::env::Env;
use crate::graph::GraphModel;
use crate::io;
use crate::tag::Tag;

/// Candidate producers: step name → the step's tag environment.
pub type Candidates = BTreeMap<String, Env>;

pub trait BlameOracle {
    fn find_candidates(
        &self,
        collection: &str,
        tag: &Tag,
        graph: &GraphModel,
        ctx: &ContextValues,
    ) -> Candidates;
}

impl<T: BlameOracle + ?Sized> BlameOracle for &T {
    fn find_candidates(
        &self,
        collection: &str,
        tag: &Tag,
        graph: &GraphModel,
        ctx: &ContextValues,
    ) -> Candidates {
        (**self).find_candidates(collection, tag, graph, ctx)
    }
}

/// Inverts affine output tag functions.
#[derive(Debug, Clone, Copy)]
pub struct InverseOracle {
    /// Range cap used when re-checking a solution by forward enumeration.
    pub range_limit: usize,
}

impl Default for InverseOracle {
    fn default() -> Self {
        InverseOracle {
            range_limit: enumerate::DEFAULT_RANGE_LIMIT,
        }
    }
}

impl BlameOracle for InverseOracle {
    fn find_candidates(
        &self,
        collection: &str,
        tag: &Tag,
        graph: &GraphModel,
        ctx: &ContextValues,
    ) -> Candidates {
        let mut candidates = Candidates::new();
        for step in graph.producers_of(collection) {
            let outputs = io::io_functions(&step.outputs, ctx);
            let Some(tuples) = outputs.get(collection) else {
                continue;
            };
            for tuple in tuples {
                if tuple.len() != tag.values().len() {
                    continue;
                }
                let Some(env) = solve(&step.tag, tuple, tag) else {
                    log::debug!("blame {}@{}: cannot invert {}", collection, tag, step.name);
                    continue;
                };
                // Re-check forward: guards, ranges and exact division.
                let produces = enumerate::expand(tuple, &env, self.range_limit).any(|t| &t == tag);
                if produces {
                    log::debug!("blame {}@{}: candidate {} {:?}", collection, tag, step.name, env);
                    candidates.entry(step.name.clone()).or_insert(env);
                    break;
                }
            }
        }
        candidates
    }
}

/// Solve the non-ranged positions of `tuple == tag` for `vars`.
///
/// Each pass binds any variable that is the only unknown in some position's
/// affine expression; passes repeat until nothing changes. Succeeds only if
/// every variable ends up bound.
fn solve(vars: &[String], tuple: &[TagExpr], tag: &Tag) -> Option<Env> {
    let mut env = Env::new();
    loop {
        let mut progress = false;
        for (component, &target) in tuple.iter().zip(tag.values()) {
            let Some(expr) = component.plain() else {
                continue;
            };
            let unbound: Vec<&String> = vars.iter().filter(|v| !env.contains_key(*v)).collect();
            for var in unbound {
                let Some((a, b)) = expr.affine_in(var, &env) else {
                    continue;
                };
                if a == 0 {
                    continue;
                }
                let diff = target.checked_sub(b)?;
                if diff.checked_rem(a)? != 0 {
                    return None;
                }
                env.insert(var.clone(), diff.checked_div(a)?);
                progress = true;
                break;
            }
        }
        if vars.iter().all(|v| env.contains_key(v)) {
            return Some(env);
        }
        if !progress {
            return None;
        }
    }
}
