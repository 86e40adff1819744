// resolve.rs — The blame/propagate resolution loop
//
// Drives a `DemandEngine` to a fixed point. Each round picks the smallest
// demanded item, asks the blame oracle which step invocation could have
// produced it, commits that choice forward (`satisfy`) and pulls in the
// choice's own inputs (`expand_demand`).
//
// Preconditions: the graph is validated and the context is fixed.
// Postconditions: on `Done`, `demand` is empty and `(run, compute)` is the
//                 answer. An unsatisfiable or ambiguous pair fails before the
//                 round touches any state.
// Failure modes: unsatisfiable or ambiguous demand, a choice that does not
//                retire its demand, the iteration and propagation caps.
// Side effects: logs at info/debug level; may block on the disambiguator.

use std::collections::BTreeSet;

use crate::blame::{BlameOracle, Candidates};
use crate::context::ContextValues;
use crate::diag::Diagnostic;
use crate::engine::{DemandEngine, EngineConfig};
use crate::env::{env_to_tag, Env};
use crate::error::ResolveError;
use crate::graph::{GraphModel, INIT};
use crate::interact::{select_candidate, Disambiguator};
use crate::state::ResolutionState;
use crate::tag::Instance;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Resolving,
    Done,
    Failed,
}

/// The outcome of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub run: BTreeSet<Instance>,
    pub compute: BTreeSet<Instance>,
    pub diagnostics: Vec<Diagnostic>,
    /// Blame rounds taken after initialization.
    pub iterations: usize,
}

pub struct Resolver<'g, O, D> {
    engine: DemandEngine<'g>,
    oracle: O,
    disambiguator: D,
    status: Status,
    initialized: bool,
    iterations: usize,
}

impl<'g, O: BlameOracle, D: Disambiguator> Resolver<'g, O, D> {
    pub fn new(
        graph: &'g GraphModel,
        ctx: &'g ContextValues,
        config: EngineConfig,
        oracle: O,
        disambiguator: D,
    ) -> Self {
        Resolver {
            engine: DemandEngine::new(graph, ctx, config),
            oracle,
            disambiguator,
            status: Status::Resolving,
            initialized: false,
            iterations: 0,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn state(&self) -> &ResolutionState {
        self.engine.state()
    }

    /// Seed demand from the finalizer, then run the initializer.
    ///
    /// Demand is seeded first: `satisfy` does nothing while nothing is
    /// demanded. Called implicitly by the first `step`.
    pub fn initialize(&mut self) -> Result<Status, ResolveError> {
        if self.initialized {
            return Ok(self.status);
        }
        self.initialized = true;
        self.engine.seed_from_finalize();
        log::info!(
            "initial demand: {}",
            self.engine
                .state()
                .demand()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );
        let result = self.engine.satisfy(INIT, Env::new());
        self.settle(result)
    }

    /// One blame/propagate round.
    pub fn step(&mut self) -> Result<Status, ResolveError> {
        if !self.initialized {
            self.initialize()?;
        }
        if self.status != Status::Resolving {
            return Ok(self.status);
        }
        let result = self.advance();
        self.settle(result)
    }

    /// Step until `Done` or failure.
    pub fn run(&mut self) -> Result<Status, ResolveError> {
        loop {
            match self.step()? {
                Status::Resolving => continue,
                status => return Ok(status),
            }
        }
    }

    pub fn into_resolution(self) -> Resolution {
        let iterations = self.iterations;
        let (state, diagnostics) = self.engine.into_parts();
        let (run, compute) = state.into_sets();
        Resolution {
            run,
            compute,
            diagnostics,
            iterations,
        }
    }

    fn settle(&mut self, result: Result<(), ResolveError>) -> Result<Status, ResolveError> {
        match result {
            Ok(()) => {
                if self.engine.state().is_satisfied() {
                    self.status = Status::Done;
                }
                Ok(self.status)
            }
            Err(e) => {
                self.status = Status::Failed;
                Err(e)
            }
        }
    }

    fn advance(&mut self) -> Result<(), ResolveError> {
        let Some(demanded) = self.engine.state().next_demand().cloned() else {
            return Ok(());
        };
        let limit = self.engine.config().max_iterations;
        if self.iterations >= limit {
            return Err(ResolveError::IterationLimit(limit));
        }
        self.iterations += 1;

        let graph = self.engine.graph();
        let candidates = self.oracle.find_candidates(
            &demanded.collection,
            &demanded.tag,
            graph,
            self.engine.context(),
        );
        let (step, env) = self.choose(&demanded, candidates)?;
        log::debug!("blame {} -> {} {:?}", demanded, step, env);

        self.engine.satisfy(&step, env.clone())?;
        self.engine.expand_demand(&step, &env)?;

        if self.engine.state().demand().contains(&demanded) {
            let tag = env_to_tag(graph, &step, &env)?;
            return Err(ResolveError::Stalled {
                instance: demanded,
                step: Instance::new(step, tag),
            });
        }
        Ok(())
    }

    fn choose(
        &mut self,
        demanded: &Instance,
        mut candidates: Candidates,
    ) -> Result<(String, Env), ResolveError> {
        if candidates.len() <= 1 {
            return candidates
                .pop_first()
                .ok_or_else(|| ResolveError::Unsatisfiable {
                    instance: demanded.clone(),
                });
        }

        let names: Vec<String> = candidates.keys().cloned().collect();
        let Some(answer) = self.disambiguator.choose(demanded, &names)? else {
            return Err(ResolveError::Ambiguous {
                instance: demanded.clone(),
                candidates: names,
            });
        };
        select_candidate(&answer, &names)
            .and_then(|name| candidates.remove_entry(name))
            .ok_or_else(|| ResolveError::UnmatchedChoice {
                instance: demanded.clone(),
                input: answer.clone(),
                candidates: names.clone(),
            })
    }
}

/// Resolve a graph in one call.
pub fn resolve<O: BlameOracle, D: Disambiguator>(
    graph: &GraphModel,
    ctx: &ContextValues,
    config: EngineConfig,
    oracle: O,
    disambiguator: D,
) -> Result<Resolution, ResolveError> {
    let mut resolver = Resolver::new(graph, ctx, config, oracle, disambiguator);
    resolver.run()?;
    Ok(resolver.into_resolution())
}
