// error.rs — Errors that end a resolution run

use crate::tag::Instance;

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// No step can have produced a demanded item.
    #[error("cannot satisfy demand for {instance}")]
    Unsatisfiable { instance: Instance },

    /// Several steps could have produced a demanded item and no choice was made.
    #[error("ambiguous resolution for {instance}: candidates {}", .candidates.join(", "))]
    Ambiguous {
        instance: Instance,
        candidates: Vec<String>,
    },

    /// The operator's answer matched none of the candidates.
    #[error("no candidate for {instance} matches `{input}` (candidates: {})", .candidates.join(", "))]
    UnmatchedChoice {
        instance: Instance,
        input: String,
        candidates: Vec<String>,
    },

    /// A chosen producer ran without producing the demanded item.
    #[error("choosing {step} did not satisfy demand for {instance}")]
    Stalled { instance: Instance, step: Instance },

    #[error("resolution did not converge within {0} iterations")]
    IterationLimit(usize),

    /// Forward propagation kept prescribing new step invocations.
    #[error("propagation visited more than {0} step invocations")]
    PropagationLimit(usize),

    #[error("unknown step collection `{0}`")]
    UnknownStep(String),

    #[error("tag variable `{variable}` of `{collection}` is unbound")]
    UnboundTagVariable { collection: String, variable: String },

    #[error("operator input failed: {0}")]
    Operator(#[from] std::io::Error),
}
