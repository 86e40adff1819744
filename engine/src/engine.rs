// engine.rs — Demand propagation
//
// Owns the resolution state and moves it forward in two directions:
//
// - `satisfy`: forward BFS from a chosen step invocation. Every reached step
//   is committed to `run`; every produced item moves into `compute`. Stops as
//   soon as nothing is demanded.
// - `expand_demand`: backward. A chosen step's inputs that are not yet
//   available become demanded.
//
// Preconditions: the graph is validated; step→item→step chains terminate
//                (no step reaches itself without a tag change).
// Postconditions: `run` only grows; items move demand → compute atomically.
// Failure modes: unknown step names and unbound tag variables (from a
//                misbehaving blame oracle) are errors, as is a prescription
//                chain longer than `max_propagations`.
// Side effects: logs at debug/warn level.

use std::collections::{HashSet, VecDeque};

use crate::ast::TagExpr;
use crate::context::ContextValues;
use crate::diag::{codes, Diagnostic};
use crate::enumerate::{self, Discard, DEFAULT_RANGE_LIMIT};
use crate::env::{env_to_tag, tag_to_env, Env};
use crate::error::ResolveError;
use crate::graph::{CollectionKind, GraphModel};
use crate::io::{Direction, IoResolver};
use crate::state::ResolutionState;
use crate::tag::{Instance, Tag};

/// Limits for one resolution run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Values enumerated per range before truncation.
    pub range_limit: usize,
    /// Blame/propagate rounds before giving up.
    pub max_iterations: usize,
    /// Step invocations one `satisfy` call may visit.
    pub max_propagations: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            range_limit: DEFAULT_RANGE_LIMIT,
            max_iterations: 100_000,
            max_propagations: 1_000_000,
        }
    }
}

pub struct DemandEngine<'g> {
    graph: &'g GraphModel,
    io: IoResolver<'g>,
    state: ResolutionState,
    config: EngineConfig,
    diagnostics: Vec<Diagnostic>,
    reported: HashSet<String>,
}

impl<'g> DemandEngine<'g> {
    pub fn new(graph: &'g GraphModel, ctx: &'g ContextValues, config: EngineConfig) -> Self {
        DemandEngine {
            graph,
            io: IoResolver::new(ctx),
            state: ResolutionState::new(),
            config,
            diagnostics: Vec::new(),
            reported: HashSet::new(),
        }
    }

    pub fn graph(&self) -> &'g GraphModel {
        self.graph
    }

    pub fn context(&self) -> &'g ContextValues {
        self.io.context()
    }

    pub fn state(&self) -> &ResolutionState {
        &self.state
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_parts(self) -> (ResolutionState, Vec<Diagnostic>) {
        (self.state, self.diagnostics)
    }

    /// Demand the item-kind inputs of the finalizer under the run context.
    pub fn seed_from_finalize(&mut self) {
        let graph = self.graph;
        let finalize = &graph.finalize;
        let inputs = self.io.functions(finalize, Direction::Inputs);
        for (collection, tuples) in inputs.iter() {
            if graph.kind_of(collection) != Some(CollectionKind::Item) {
                continue;
            }
            for tuple in tuples {
                for tag in self.expand(&finalize.name, collection, tuple, &Env::new()) {
                    self.state.add_demand(Instance::new(collection.clone(), tag));
                }
            }
        }
    }

    /// Forward BFS from `(step, env)` until nothing is demanded.
    pub fn satisfy(&mut self, step: &str, env: Env) -> Result<(), ResolveError> {
        let graph = self.graph;
        let mut queue = VecDeque::from([(step.to_string(), env)]);
        let mut scheduled: HashSet<Instance> = HashSet::new();
        let mut visited = 0usize;

        while !self.state.is_satisfied() {
            let Some((name, env)) = queue.pop_front() else {
                break;
            };
            visited += 1;
            if visited > self.config.max_propagations {
                return Err(ResolveError::PropagationLimit(self.config.max_propagations));
            }
            let decl = graph
                .step(&name)
                .ok_or_else(|| ResolveError::UnknownStep(name.clone()))?;
            let tag = env_to_tag(graph, &name, &env)?;
            if self.state.mark_run(Instance::new(name.clone(), tag.clone())) {
                log::debug!("run {}@{}", name, tag);
            }

            let outputs = self.io.functions(decl, Direction::Outputs);
            for (collection, tuples) in outputs.iter() {
                let kind = graph.kind_of(collection);
                for tuple in tuples {
                    for produced in self.expand(&name, collection, tuple, &env) {
                        let instance = Instance::new(collection.clone(), produced);
                        match kind {
                            Some(CollectionKind::Step) => {
                                if self.state.run().contains(&instance)
                                    || !scheduled.insert(instance.clone())
                                {
                                    continue;
                                }
                                let step_env = tag_to_env(graph, collection, &instance.tag);
                                queue.push_back((collection.clone(), step_env));
                            }
                            Some(CollectionKind::Item) => self.state.mark_computed(instance),
                            None => {
                                log::warn!("{} produces undeclared collection `{}`", name, collection)
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Demand every input of `(step, env)` that is not yet available.
    pub fn expand_demand(&mut self, step: &str, env: &Env) -> Result<(), ResolveError> {
        let graph = self.graph;
        let decl = graph
            .step(step)
            .ok_or_else(|| ResolveError::UnknownStep(step.to_string()))?;
        let inputs = self.io.functions(decl, Direction::Inputs);
        for (collection, tuples) in inputs.iter() {
            if graph.kind_of(collection) != Some(CollectionKind::Item) {
                log::debug!("{} consumes non-item `{}`; not demanded", step, collection);
                continue;
            }
            for tuple in tuples {
                for tag in self.expand(step, collection, tuple, env) {
                    let instance = Instance::new(collection.clone(), tag);
                    if self.state.add_demand(instance.clone()) {
                        log::debug!("demand {} (input of {})", instance, step);
                    }
                }
            }
        }
        Ok(())
    }

    /// Enumerate `tuple`, recording truncations once per site.
    fn expand(&mut self, step: &str, collection: &str, tuple: &[TagExpr], env: &Env) -> Vec<Tag> {
        let enumerator = enumerate::expand(tuple, env, self.config.range_limit);

        for t in enumerator.truncations() {
            let message = format!(
                "range at position {} of `{}` denotes {} values; only the first {} were considered",
                t.position, collection, t.len, t.kept
            );
            let location = format!("step `{}`", step);
            if self.reported.insert(format!("{location}: {message}")) {
                log::warn!("{}: {}", location, message);
                self.diagnostics.push(
                    Diagnostic::warning(message)
                        .with_code(codes::RANGE_TRUNCATED)
                        .at(location)
                        .with_hint("raise --range-limit if the full range is needed"),
                );
            }
        }
        match enumerator.discarded() {
            Some(Discard::GuardFalse { position }) => {
                log::debug!("{} -> {}: guard false at position {}", step, collection, position)
            }
            Some(Discard::Unresolved { position, reason }) => log::debug!(
                "{} -> {}: position {} unresolved ({})",
                step,
                collection,
                position,
                reason
            ),
            None => {}
        }

        enumerator.collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ItemDecl, Reference, StepDecl, INIT};
    use crate::parser::parse_tag_component;

    fn item_ref(collection: &str, key: &[&str]) -> Reference {
        Reference::Item {
            collection: collection.into(),
            key: key.iter().map(|k| parse_tag_component(k).unwrap()).collect(),
        }
    }

    fn step_ref(collection: &str, tag: &[&str]) -> Reference {
        Reference::Step {
            collection: collection.into(),
            tag: tag.iter().map(|k| parse_tag_component(k).unwrap()).collect(),
        }
    }

    /// X(0) from init; S(i) consumes X(i) and produces X(i + 1); T(i) is
    /// prescribed by S(i) and produces Y(i).
    fn chain() -> GraphModel {
        let mut g = GraphModel::new();
        for name in ["X", "Y"] {
            g.items.insert(
                name.into(),
                ItemDecl {
                    name: name.into(),
                    key: vec!["i".into()],
                },
            );
        }
        g.steps.insert(
            "S".into(),
            StepDecl::new("S", &["i"])
                .with_input(item_ref("X", &["i"]))
                .with_output(item_ref("X", &["i + 1"]))
                .with_output(step_ref("T", &["i"])),
        );
        g.steps.insert(
            "T".into(),
            StepDecl::new("T", &["i"]).with_output(item_ref("Y", &["i"])),
        );
        g.init = StepDecl::new(INIT, &[]).with_output(item_ref("X", &["0"]));
        g
    }

    fn env(pairs: &[(&str, i64)]) -> Env {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn satisfy_moves_demand_to_compute() {
        let g = chain();
        let ctx = ContextValues::default();
        let mut engine = DemandEngine::new(&g, &ctx, EngineConfig::default());
        engine.state.add_demand(Instance::new("X", vec![3]));
        engine.satisfy("S", env(&[("i", 2)])).unwrap();
        assert!(engine.state().is_satisfied());
        assert!(engine.state().run().contains(&Instance::new("S", vec![2])));
        assert!(engine.state().compute().contains(&Instance::new("X", vec![3])));
    }

    #[test]
    fn satisfy_follows_prescriptions() {
        let g = chain();
        let ctx = ContextValues::default();
        let mut engine = DemandEngine::new(&g, &ctx, EngineConfig::default());
        engine.state.add_demand(Instance::new("Y", vec![1]));
        engine.satisfy("S", env(&[("i", 1)])).unwrap();
        assert!(engine.state().run().contains(&Instance::new("T", vec![1])));
        assert!(engine.state().compute().contains(&Instance::new("Y", vec![1])));
        assert!(engine.state().is_satisfied());
    }

    #[test]
    fn satisfy_is_idempotent() {
        let g = chain();
        let ctx = ContextValues::default();
        let mut engine = DemandEngine::new(&g, &ctx, EngineConfig::default());
        engine.state.add_demand(Instance::new("Y", vec![9]));
        engine.satisfy("S", env(&[("i", 1)])).unwrap();
        let after_first = engine.state().run().clone();
        engine.satisfy("S", env(&[("i", 1)])).unwrap();
        assert_eq!(engine.state().run(), &after_first);
    }

    #[test]
    fn satisfy_without_demand_does_nothing() {
        let g = chain();
        let ctx = ContextValues::default();
        let mut engine = DemandEngine::new(&g, &ctx, EngineConfig::default());
        engine.satisfy(INIT, Env::new()).unwrap();
        assert!(engine.state().run().is_empty());
        assert!(engine.state().compute().is_empty());
    }

    #[test]
    fn expand_demand_skips_available_inputs() {
        let g = chain();
        let ctx = ContextValues::default();
        let mut engine = DemandEngine::new(&g, &ctx, EngineConfig::default());
        engine.state.mark_computed(Instance::new("X", vec![0]));
        engine.expand_demand("S", &env(&[("i", 0)])).unwrap();
        assert!(engine.state().is_satisfied());
        engine.expand_demand("S", &env(&[("i", 4)])).unwrap();
        assert_eq!(
            engine.state().demand().iter().collect::<Vec<_>>(),
            vec![&Instance::new("X", vec![4])]
        );
    }

    #[test]
    fn unknown_step_is_an_error() {
        let g = chain();
        let ctx = ContextValues::default();
        let mut engine = DemandEngine::new(&g, &ctx, EngineConfig::default());
        engine.state.add_demand(Instance::new("X", vec![1]));
        assert!(matches!(
            engine.satisfy("Nope", Env::new()),
            Err(ResolveError::UnknownStep(name)) if name == "Nope"
        ));
    }

    #[test]
    fn runaway_prescription_chain_is_cut_off() {
        // R(i) produces Y(i) and prescribes R(i + 1); X(0) is never produced.
        let mut g = chain();
        g.steps.insert(
            "R".into(),
            StepDecl::new("R", &["i"])
                .with_output(item_ref("Y", &["i"]))
                .with_output(step_ref("R", &["i + 1"])),
        );
        g.init = StepDecl::new(INIT, &[]).with_output(step_ref("R", &["0"]));
        let ctx = ContextValues::default();
        let config = EngineConfig {
            max_propagations: 50,
            ..EngineConfig::default()
        };
        let mut engine = DemandEngine::new(&g, &ctx, config);
        engine.state.add_demand(Instance::new("X", vec![0]));
        assert!(matches!(
            engine.satisfy(INIT, Env::new()),
            Err(ResolveError::PropagationLimit(50))
        ));
        // init plus R(0..49) ran before the budget ran out.
        assert_eq!(engine.state().run().len(), 50);
        assert!(!engine.state().is_satisfied());
    }

    #[test]
    fn truncation_is_reported_once() {
        let mut g = chain();
        g.init = StepDecl::new(INIT, &[]).with_output(step_ref("T", &["0 .. 500"]));
        let ctx = ContextValues::default();
        let config = EngineConfig {
            range_limit: 10,
            ..EngineConfig::default()
        };
        let mut engine = DemandEngine::new(&g, &ctx, config);
        engine.state.add_demand(Instance::new("Y", vec![400]));
        engine.satisfy(INIT, Env::new()).unwrap();
        engine.satisfy(INIT, Env::new()).unwrap();
        assert_eq!(engine.diagnostics().len(), 1);
        assert_eq!(engine.diagnostics()[0].code, Some(codes::RANGE_TRUNCATED));
        // Only T(0..10) were reachable under the cap.
        assert!(!engine.state().is_satisfied());
        assert_eq!(engine.state().compute().len(), 10);
    }
}
