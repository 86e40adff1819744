// env.rs — Conversion between positional tags and named environments
//
// The resolution sets store tags positionally; expression substitution needs
// them by name. Both directions follow the collection's declared variable
// order (step tag variables or item key variables).

use std::collections::BTreeMap;

use crate::error::ResolveError;
use crate::graph::GraphModel;
use crate::tag::Tag;

/// Local variable bindings: tag/key variable name → value.
pub type Env = BTreeMap<String, i64>;

/// Zip a tag positionally against the collection's declared names.
/// Unknown collections yield an empty environment; surplus values on either
/// side are dropped.
pub fn tag_to_env(graph: &GraphModel, collection: &str, tag: &Tag) -> Env {
    match graph.variables(collection) {
        Some(names) => names
            .iter()
            .cloned()
            .zip(tag.values().iter().copied())
            .collect(),
        None => Env::new(),
    }
}

/// Read the collection's declared variables back out of `env`, in order.
/// Unknown collections yield the empty tag.
pub fn env_to_tag(graph: &GraphModel, collection: &str, env: &Env) -> Result<Tag, ResolveError> {
    let Some(names) = graph.variables(collection) else {
        return Ok(Tag::empty());
    };
    names
        .iter()
        .map(|name| {
            env.get(name)
                .copied()
                .ok_or_else(|| ResolveError::UnboundTagVariable {
                    collection: collection.to_string(),
                    variable: name.clone(),
                })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Tag)
}
