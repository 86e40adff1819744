// interact.rs — Operator-facing capabilities
//
// The only blocking points of a run are reading context values at startup
// and choosing between several candidate producers. Both are injected
// through these traits so the resolver runs unchanged against a terminal,
// presets from the command line, or canned answers in tests.

use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};

use crate::context::{ContextParam, ContextValue, ContextValues};
use crate::tag::Instance;

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("no value supplied for context parameter `{0}`")]
    Missing(String),
    #[error("value for `{name}` is not an integer: `{input}`")]
    NotAnInteger { name: String, input: String },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Supplies the raw integer for one context parameter. `-1` means unknown.
pub trait ContextSource {
    fn value_for(&mut self, param: &ContextParam) -> Result<i64, ContextError>;
}

/// Chooses between candidate producers. `Ok(None)` means no choice can be
/// made; the answer may be an exact name or a fragment of one.
pub trait Disambiguator {
    fn choose(&mut self, instance: &Instance, candidates: &[String]) -> io::Result<Option<String>>;
}

impl<T: Disambiguator + ?Sized> Disambiguator for &mut T {
    fn choose(&mut self, instance: &Instance, candidates: &[String]) -> io::Result<Option<String>> {
        (**self).choose(instance, candidates)
    }
}

/// Preset names that match no declared parameter.
pub fn unknown_presets<'a>(
    params: &[ContextParam],
    presets: &'a BTreeMap<String, i64>,
) -> Vec<&'a str> {
    presets
        .keys()
        .filter(|name| !params.iter().any(|p| &p.name == *name))
        .map(String::as_str)
        .collect()
}

/// Collect values for every parameter, preferring `presets` over `source`.
/// Presets naming no parameter are logged and ignored.
pub fn acquire_context(
    params: &[ContextParam],
    presets: &BTreeMap<String, i64>,
    source: &mut dyn ContextSource,
) -> Result<ContextValues, ContextError> {
    for name in unknown_presets(params, presets) {
        log::warn!("ignoring preset `{}`: no such context parameter", name);
    }
    let mut values = ContextValues::default();
    for param in params {
        let raw = match presets.get(&param.name) {
            Some(v) => *v,
            None => source.value_for(param)?,
        };
        values.insert(param, ContextValue::from_input(raw));
    }
    Ok(values)
}

/// Resolve operator input against candidate names: an exact match wins;
/// otherwise the shortest name containing the input, ignoring case. Ties go
/// to the first candidate in order.
pub fn select_candidate<'a>(input: &str, candidates: &'a [String]) -> Option<&'a str> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if let Some(exact) = candidates.iter().find(|c| c.as_str() == input) {
        return Some(exact);
    }
    let needle = input.to_lowercase();
    candidates
        .iter()
        .filter(|c| c.to_lowercase().contains(&needle))
        .min_by_key(|c| c.len())
        .map(String::as_str)
}

// ── Implementations ──

/// Never answers: missing context values and ambiguity are errors.
#[derive(Debug, Default, Clone, Copy)]
pub struct NonInteractive;

impl ContextSource for NonInteractive {
    fn value_for(&mut self, param: &ContextParam) -> Result<i64, ContextError> {
        Err(ContextError::Missing(param.name.clone()))
    }
}

impl Disambiguator for NonInteractive {
    fn choose(&mut self, _: &Instance, _: &[String]) -> io::Result<Option<String>> {
        Ok(None)
    }
}

/// Prompts on a writer and reads answers line by line from a reader.
pub struct Terminal<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Terminal<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Terminal { input, output }
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

impl<R: BufRead, W: Write> ContextSource for Terminal<R, W> {
    fn value_for(&mut self, param: &ContextParam) -> Result<i64, ContextError> {
        write!(self.output, "Value for {}, type -1 if NaN: ", param.name)?;
        self.output.flush()?;
        let line = self
            .read_line()?
            .ok_or_else(|| ContextError::Missing(param.name.clone()))?;
        line.parse().map_err(|_| ContextError::NotAnInteger {
            name: param.name.clone(),
            input: line,
        })
    }
}

impl<R: BufRead, W: Write> Disambiguator for Terminal<R, W> {
    fn choose(&mut self, instance: &Instance, candidates: &[String]) -> io::Result<Option<String>> {
        writeln!(self.output, "Ambiguous resolution for {}:", instance)?;
        for name in candidates {
            writeln!(self.output, "  {}", name)?;
        }
        write!(self.output, "Choose a step: ")?;
        self.output.flush()?;
        Ok(self.read_line()?.filter(|l| !l.is_empty()))
    }
}

/// Replays fixed answers in order; used by tests and scripted runs.
#[derive(Debug, Default, Clone)]
pub struct Scripted {
    answers: Vec<String>,
    /// Every (instance, candidates) pair this was asked about.
    pub asked: Vec<(Instance, Vec<String>)>,
}

impl Scripted {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut answers: Vec<String> = answers.into_iter().map(Into::into).collect();
        answers.reverse();
        Scripted {
            answers,
            asked: Vec::new(),
        }
    }
}

impl Disambiguator for Scripted {
    fn choose(&mut self, instance: &Instance, candidates: &[String]) -> io::Result<Option<String>> {
        self.asked.push((instance.clone(), candidates.to_vec()));
        Ok(self.answers.pop())
    }
}
