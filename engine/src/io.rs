// io.rs — Per-step input/output tag functions
//
// For a step and a direction, lists the tag-expression tuples describing how
// each referenced collection's tags relate to the step's own tag variables.
// Conditional references contribute their nested reference's tuple with
// every component guarded. Context values are substituted up front since
// they are fixed for the run.
//
// Results are cached per (step, direction) by the resolver instance. The
// graph and context are immutable for a run, so the cache is never
// invalidated; a new run builds a new resolver.

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use crate::ast::{Expr, TagExpr};
use crate::context::ContextValues;
use crate::graph::{Reference, StepDecl};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Inputs,
    Outputs,
}

/// Referenced collection → tag-expression tuples, one per clause.
pub type IoFunctions = BTreeMap<String, Vec<Vec<TagExpr>>>;

/// Compute the tag functions of a reference list without caching.
pub fn io_functions(references: &[Reference], ctx: &ContextValues) -> IoFunctions {
    let mut out = IoFunctions::new();
    for reference in references {
        collect(&mut out, reference, &[], ctx);
    }
    out
}

fn collect(out: &mut IoFunctions, reference: &Reference, guards: &[&Expr], ctx: &ContextValues) {
    match reference {
        Reference::Item {
            collection,
            key: components,
        }
        | Reference::Step {
            collection,
            tag: components,
        } => {
            let tuple = components
                .iter()
                .map(|component| {
                    // Innermost guard applies first.
                    guards.iter().rev().fold(
                        component.substitute_context(ctx),
                        |acc, guard| acc.guarded(guard.substitute_context(ctx)),
                    )
                })
                .collect();
            out.entry(collection.clone()).or_default().push(tuple);
        }
        Reference::Conditional { guard, reference } => {
            let mut nested = guards.to_vec();
            nested.push(guard);
            collect(out, reference, &nested, ctx);
        }
    }
}

/// Memoizing resolver bound to one context.
pub struct IoResolver<'g> {
    ctx: &'g ContextValues,
    cache: HashMap<(String, Direction), Rc<IoFunctions>>,
}

impl<'g> IoResolver<'g> {
    pub fn new(ctx: &'g ContextValues) -> Self {
        IoResolver {
            ctx,
            cache: HashMap::new(),
        }
    }

    pub fn context(&self) -> &'g ContextValues {
        self.ctx
    }

    /// Tag functions of `step` in `direction`, computed at most once.
    pub fn functions(&mut self, step: &StepDecl, direction: Direction) -> Rc<IoFunctions> {
        let key = (step.name.clone(), direction);
        if let Some(cached) = self.cache.get(&key) {
            return Rc::clone(cached);
        }
        let references = match direction {
            Direction::Inputs => &step.inputs,
            Direction::Outputs => &step.outputs,
        };
        let computed = Rc::new(io_functions(references, self.ctx));
        self.cache.insert(key, Rc::clone(&computed));
        computed
    }
}
