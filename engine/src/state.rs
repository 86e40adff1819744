// state.rs — The run / compute / demand sets of one resolution
//
// Owned exclusively by the demand engine. `run` only grows. An item leaves
// `demand` in the same operation that puts it in `compute`, and an item
// already in `compute` is never demanded again.

use std::collections::BTreeSet;

use crate::tag::Instance;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionState {
    run: BTreeSet<Instance>,
    compute: BTreeSet<Instance>,
    demand: BTreeSet<Instance>,
}

impl ResolutionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit a step invocation. Returns false if it was already committed.
    pub fn mark_run(&mut self, step: Instance) -> bool {
        self.run.insert(step)
    }

    /// Record an item as available and retire any demand for it.
    pub fn mark_computed(&mut self, item: Instance) {
        self.demand.remove(&item);
        self.compute.insert(item);
    }

    /// Demand an item unless it is already available. Returns true if the
    /// item is newly demanded.
    pub fn add_demand(&mut self, item: Instance) -> bool {
        if self.compute.contains(&item) {
            return false;
        }
        self.demand.insert(item)
    }

    /// The next demanded item: the smallest, so runs are reproducible.
    pub fn next_demand(&self) -> Option<&Instance> {
        self.demand.first()
    }

    pub fn run(&self) -> &BTreeSet<Instance> {
        &self.run
    }

    pub fn compute(&self) -> &BTreeSet<Instance> {
        &self.compute
    }

    pub fn demand(&self) -> &BTreeSet<Instance> {
        &self.demand
    }

    pub fn is_satisfied(&self) -> bool {
        self.demand.is_empty()
    }

    pub fn into_sets(self) -> (BTreeSet<Instance>, BTreeSet<Instance>) {
        (self.run, self.compute)
    }
}
