// graph.rs — The step/item graph model
//
// Declarations of items, steps, and the references between them, with tag
// expressions already parsed and scoped. Immutable for the duration of a
// resolution run and shared read-only by every component.
//
// Preconditions: built by `load` (validated) or directly by tests.
// Postconditions: none (data and queries only).
// Failure modes: none.
// Side effects: none.

use std::collections::BTreeMap;

use crate::ast::{Expr, TagExpr};
use crate::context::ContextParam;

/// Reserved collection name of the initializer step.
pub const INIT: &str = "$initialize";
/// Reserved collection name of the finalizer step.
pub const FINALIZE: &str = "$finalize";

/// An item collection: name plus ordered key-variable names.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemDecl {
    pub name: String,
    pub key: Vec<String>,
}

/// A step collection: name, ordered tag-variable names, and the references it
/// consumes and produces.
#[derive(Debug, Clone, PartialEq)]
pub struct StepDecl {
    pub name: String,
    pub tag: Vec<String>,
    pub inputs: Vec<Reference>,
    pub outputs: Vec<Reference>,
}

/// One input or output clause of a step.
#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
    Item {
        collection: String,
        key: Vec<TagExpr>,
    },
    Step {
        collection: String,
        tag: Vec<TagExpr>,
    },
    /// A nested reference that only applies where `guard` holds.
    Conditional {
        guard: Expr,
        reference: Box<Reference>,
    },
}

impl Reference {
    /// The referenced collection, looking through guards.
    pub fn collection(&self) -> &str {
        match self {
            Reference::Item { collection, .. } | Reference::Step { collection, .. } => collection,
            Reference::Conditional { reference, .. } => reference.collection(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    Item,
    Step,
}

/// The whole graph.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphModel {
    pub context: Vec<ContextParam>,
    pub items: BTreeMap<String, ItemDecl>,
    pub steps: BTreeMap<String, StepDecl>,
    pub init: StepDecl,
    pub finalize: StepDecl,
}

impl GraphModel {
    /// An empty graph: no context, no collections, trivial init/finalize.
    pub fn new() -> Self {
        GraphModel {
            context: Vec::new(),
            items: BTreeMap::new(),
            steps: BTreeMap::new(),
            init: StepDecl::new(INIT, &[]),
            finalize: StepDecl::new(FINALIZE, &[]),
        }
    }

    /// Look up any step collection, including init and finalize.
    pub fn step(&self, name: &str) -> Option<&StepDecl> {
        match name {
            INIT => Some(&self.init),
            FINALIZE => Some(&self.finalize),
            _ => self.steps.get(name),
        }
    }

    pub fn item(&self, name: &str) -> Option<&ItemDecl> {
        self.items.get(name)
    }

    pub fn kind_of(&self, name: &str) -> Option<CollectionKind> {
        if self.step(name).is_some() {
            Some(CollectionKind::Step)
        } else if self.items.contains_key(name) {
            Some(CollectionKind::Item)
        } else {
            None
        }
    }

    /// Declared positional variable names of a collection.
    pub fn variables(&self, name: &str) -> Option<&[String]> {
        if let Some(step) = self.step(name) {
            return Some(&step.tag);
        }
        self.items.get(name).map(|item| item.key.as_slice())
    }

    /// Every step with at least one output reference to `collection`.
    pub fn producers_of<'a>(&'a self, collection: &'a str) -> impl Iterator<Item = &'a StepDecl> {
        self.steps
            .values()
            .filter(move |s| s.outputs.iter().any(|r| r.collection() == collection))
    }
}

impl Default for GraphModel {
    fn default() -> Self {
        Self::new()
    }
}

impl StepDecl {
    pub fn new(name: impl Into<String>, tag: &[&str]) -> Self {
        StepDecl {
            name: name.into(),
            tag: tag.iter().map(|s| s.to_string()).collect(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with_input(mut self, reference: Reference) -> Self {
        self.inputs.push(reference);
        self
    }

    pub fn with_output(mut self, reference: Reference) -> Self {
        self.outputs.push(reference);
        self
    }
}
