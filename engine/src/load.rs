// load.rs — Graph files: JSON → validated GraphModel
//
// Deserializes the raw declaration document, parses every tag expression,
// and checks names, arities and variable scopes. All problems are collected
// before failing so one run reports the whole list.
//
// Preconditions: none.
// Postconditions: on success every reference names a declared collection of
//                 the right kind and arity, and every variable is in scope.
// Failure modes: I/O, malformed JSON, error-level diagnostics (E0001–E0007).
// Side effects: reads the graph file in `load_file`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::ast::{Scope, TagExpr};
use crate::context::{parse_context_params, ContextParam};
use crate::diag::{codes, DiagCode, Diagnostic};
use crate::graph::{CollectionKind, GraphModel, ItemDecl, Reference, StepDecl, FINALIZE, INIT};
use crate::parser::{parse_expr, parse_tag_component, SyntaxError};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed graph: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid graph ({} error(s))", .0.iter().filter(|d| d.is_error()).count())]
    Invalid(Vec<Diagnostic>),
}

/// A validated graph plus the digest of the text it came from.
#[derive(Debug, Clone)]
pub struct LoadedGraph {
    pub graph: GraphModel,
    /// Hex SHA-256 of the source text (64 characters).
    pub source_sha256: String,
}

pub fn load_file(path: &Path) -> Result<LoadedGraph, LoadError> {
    let source = std::fs::read_to_string(path).map_err(|e| LoadError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    load_str(&source)
}

pub fn load_str(source: &str) -> Result<LoadedGraph, LoadError> {
    let raw: RawGraph = serde_json::from_str(source)?;
    let graph = compile(raw)?;
    Ok(LoadedGraph {
        graph,
        source_sha256: source_digest(source),
    })
}

/// SHA-256 of `source` as lowercase hex.
pub fn source_digest(source: &str) -> String {
    use sha2::{Digest, Sha256};
    use std::fmt::Write;

    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    let mut hex = String::with_capacity(64);
    for b in hasher.finalize() {
        let _ = write!(hex, "{:02x}", b);
    }
    hex
}

// ── Raw document ──

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawGraph {
    #[serde(default)]
    context: RawContext,
    #[serde(default)]
    items: Vec<RawItem>,
    #[serde(default)]
    steps: Vec<RawStep>,
    #[serde(default)]
    init: RawEndpoint,
    #[serde(default)]
    finalize: RawEndpoint,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawContext {
    Params(Vec<ContextParam>),
    Declarations(String),
}

impl Default for RawContext {
    fn default() -> Self {
        RawContext::Params(Vec::new())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawItem {
    name: String,
    #[serde(default)]
    key: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStep {
    name: String,
    #[serde(default)]
    tag: Vec<String>,
    #[serde(default)]
    inputs: Vec<RawReference>,
    #[serde(default)]
    outputs: Vec<RawReference>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEndpoint {
    #[serde(default)]
    inputs: Vec<RawReference>,
    #[serde(default)]
    outputs: Vec<RawReference>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum RawReference {
    Item {
        collection: String,
        #[serde(default)]
        key: Vec<String>,
    },
    Step {
        collection: String,
        #[serde(default)]
        tag: Vec<String>,
    },
    If {
        guard: String,
        then: Box<RawReference>,
    },
}

// ── Compilation ──

struct Compiler {
    context: BTreeSet<String>,
    /// Declared collections: name → (kind, arity).
    collections: BTreeMap<String, (CollectionKind, usize)>,
    diagnostics: Vec<Diagnostic>,
}

fn compile(raw: RawGraph) -> Result<GraphModel, LoadError> {
    let mut c = Compiler {
        context: BTreeSet::new(),
        collections: BTreeMap::new(),
        diagnostics: Vec::new(),
    };

    let params = match raw.context {
        RawContext::Params(params) => params,
        RawContext::Declarations(text) => parse_context_params(&text),
    };
    for p in &params {
        if !c.context.insert(p.name.clone()) {
            c.error(
                codes::DUPLICATE_NAME,
                "context",
                format!("context parameter `{}` declared twice", p.name),
            );
        }
    }

    c.declare(INIT, CollectionKind::Step, &[]);
    c.declare(FINALIZE, CollectionKind::Step, &[]);
    for item in &raw.items {
        c.declare(&item.name, CollectionKind::Item, &item.key);
    }
    for step in &raw.steps {
        c.declare(&step.name, CollectionKind::Step, &step.tag);
    }

    let mut graph = GraphModel::new();
    graph.context = params;
    for item in raw.items {
        graph.items.entry(item.name.clone()).or_insert(ItemDecl {
            name: item.name,
            key: item.key,
        });
    }
    for step in raw.steps {
        let decl = c.step(&step.name, step.tag, &step.inputs, &step.outputs);
        graph.steps.entry(decl.name.clone()).or_insert(decl);
    }

    if !raw.init.inputs.is_empty() {
        c.error(
            codes::MISPLACED_REFERENCE,
            "init",
            "the initializer cannot consume anything",
        );
    }
    if !raw.finalize.outputs.is_empty() {
        c.error(
            codes::MISPLACED_REFERENCE,
            "finalize",
            "the finalizer cannot produce anything",
        );
    }
    graph.init = c.step(INIT, Vec::new(), &[], &raw.init.outputs);
    graph.finalize = c.step(FINALIZE, Vec::new(), &raw.finalize.inputs, &[]);

    if c.diagnostics.iter().any(Diagnostic::is_error) {
        return Err(LoadError::Invalid(c.diagnostics));
    }
    Ok(graph)
}

impl Compiler {
    fn error(&mut self, code: DiagCode, location: impl Into<String>, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::error(message).with_code(code).at(location));
    }

    fn declare(&mut self, name: &str, kind: CollectionKind, vars: &[String]) {
        if self.collections.contains_key(name) {
            let message = if name == INIT || name == FINALIZE {
                format!("`{}` is a reserved name", name)
            } else {
                format!("collection `{}` declared twice", name)
            };
            self.error(codes::DUPLICATE_NAME, format!("`{}`", name), message);
            return;
        }
        let mut seen = BTreeSet::new();
        for v in vars {
            if !seen.insert(v) {
                self.error(
                    codes::DUPLICATE_NAME,
                    format!("`{}`", name),
                    format!("tag variable `{}` repeated", v),
                );
            }
        }
        self.collections
            .insert(name.to_string(), (kind, vars.len()));
    }

    fn step(
        &mut self,
        name: &str,
        tag: Vec<String>,
        inputs: &[RawReference],
        outputs: &[RawReference],
    ) -> StepDecl {
        let locals: BTreeSet<String> = tag.iter().cloned().collect();
        let mut decl = StepDecl {
            name: name.to_string(),
            tag,
            inputs: Vec::new(),
            outputs: Vec::new(),
        };
        for (i, raw) in inputs.iter().enumerate() {
            let location = format!("step `{}` input {}", name, i + 1);
            if let Some(r) = self.reference(raw, &location, &locals) {
                decl.inputs.push(r);
            }
        }
        for (i, raw) in outputs.iter().enumerate() {
            let location = format!("step `{}` output {}", name, i + 1);
            if let Some(r) = self.reference(raw, &location, &locals) {
                decl.outputs.push(r);
            }
        }
        decl
    }

    fn reference(
        &mut self,
        raw: &RawReference,
        location: &str,
        locals: &BTreeSet<String>,
    ) -> Option<Reference> {
        match raw {
            RawReference::Item { collection, key } => {
                let key = self.components(collection, CollectionKind::Item, key, location, locals)?;
                Some(Reference::Item {
                    collection: collection.clone(),
                    key,
                })
            }
            RawReference::Step { collection, tag } => {
                let tag = self.components(collection, CollectionKind::Step, tag, location, locals)?;
                Some(Reference::Step {
                    collection: collection.clone(),
                    tag,
                })
            }
            RawReference::If { guard, then } => {
                let guard = match parse_expr(guard) {
                    Ok(expr) => {
                        self.check_scope(&TagExpr::Plain(expr.clone()), location, locals);
                        Some(expr)
                    }
                    Err(errors) => {
                        self.syntax(guard, &errors, location);
                        None
                    }
                };
                let nested = self.reference(then, location, locals);
                Some(Reference::Conditional {
                    guard: guard?,
                    reference: Box::new(nested?),
                })
            }
        }
    }

    fn components(
        &mut self,
        collection: &str,
        kind: CollectionKind,
        texts: &[String],
        location: &str,
        locals: &BTreeSet<String>,
    ) -> Option<Vec<TagExpr>> {
        let noun = match kind {
            CollectionKind::Item => "item",
            CollectionKind::Step => "step",
        };
        match self.collections.get(collection) {
            None => {
                self.error(
                    codes::UNKNOWN_COLLECTION,
                    location,
                    format!("unknown {} collection `{}`", noun, collection),
                );
                return None;
            }
            Some(&(declared, _)) if declared != kind => {
                self.error(
                    codes::UNKNOWN_COLLECTION,
                    location,
                    format!("`{}` is not an {} collection", collection, noun),
                );
                return None;
            }
            Some(&(_, arity)) if arity != texts.len() => {
                self.error(
                    codes::ARITY_MISMATCH,
                    location,
                    format!(
                        "`{}` takes {} tag component(s), found {}",
                        collection,
                        arity,
                        texts.len()
                    ),
                );
                return None;
            }
            Some(_) => {}
        }

        let mut out = Vec::with_capacity(texts.len());
        let mut ok = true;
        for text in texts {
            match parse_tag_component(text) {
                Ok(component) => {
                    self.check_scope(&component, location, locals);
                    out.push(component);
                }
                Err(errors) => {
                    self.syntax(text, &errors, location);
                    ok = false;
                }
            }
        }
        ok.then_some(out)
    }

    fn check_scope(&mut self, component: &TagExpr, location: &str, locals: &BTreeSet<String>) {
        let mut used = BTreeSet::new();
        component.free_vars(Scope::Local, &mut used);
        for name in used.difference(locals) {
            self.diagnostics.push(
                Diagnostic::error(format!("`{}` is not a tag variable of this step", name))
                    .with_code(codes::UNKNOWN_LOCAL)
                    .at(location)
                    .with_hint(format!("did you mean the context parameter `#{}`?", name)),
            );
        }
        let mut used = BTreeSet::new();
        component.free_vars(Scope::Context, &mut used);
        let undeclared: Vec<String> = used.difference(&self.context).cloned().collect();
        for name in undeclared {
            let message = format!("undeclared context parameter `#{}`", name);
            self.error(codes::UNKNOWN_CONTEXT, location, message);
        }
    }

    fn syntax(&mut self, text: &str, errors: &[SyntaxError], location: &str) {
        for e in errors {
            self.error(codes::SYNTAX, location, format!("in `{}`: {}", text, e));
        }
    }
}
