// report.rs — The printed result of a run

use std::fmt::Write;

use serde::Serialize;

use crate::context::ContextValues;
use crate::diag::Diagnostic;
use crate::resolve::Resolution;
use crate::tag::Instance;

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub source_sha256: String,
    pub context: ContextValues,
    pub compute: Vec<Instance>,
    pub run: Vec<Instance>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Report {
    pub fn new(source_sha256: String, context: ContextValues, resolution: Resolution) -> Self {
        Report {
            source_sha256,
            context,
            compute: resolution.compute.into_iter().collect(),
            run: resolution.run.into_iter().collect(),
            diagnostics: resolution.diagnostics,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// `Compute:` then `Run:`, one instance per indented line, in set order.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for (title, set) in [("Compute", &self.compute), ("Run", &self.run)] {
            let _ = writeln!(out, "{}:", title);
            for instance in set {
                let _ = writeln!(out, "  {}", instance);
            }
        }
        out
    }
}
