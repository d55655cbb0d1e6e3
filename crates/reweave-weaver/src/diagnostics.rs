//! Per-site weave diagnostics
//!
//! Structural mismatches and ineligible properties are local to one marker
//! call site. They are collected here instead of aborting the pass; the
//! driving tool decides how to surface them (and treats any diagnostic as
//! a failed build).

use serde::Serialize;
use std::fmt;

/// One reported problem, tied to the offending method
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Fully qualified name of the method containing the call site
    pub method: String,
    /// Human-readable description
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.method, self.message)
    }
}

/// Diagnostic collector for one weave pass
#[derive(Debug, Default, Clone, Serialize)]
pub struct Diagnostics {
    errors: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error for the given method
    pub fn report_error(&mut self, method: impl Into<String>, message: impl Into<String>) {
        self.errors.push(Diagnostic {
            method: method.into(),
            message: message.into(),
        });
    }

    /// True when nothing was reported
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of reported errors
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Reported errors in order
    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_in_order() {
        let mut diagnostics = Diagnostics::new();
        assert!(diagnostics.is_empty());

        diagnostics.report_error("App.Vm::Build", "no property named `Total`");
        diagnostics.report_error("App.Vm::Init", "property `X` has no getter");

        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics.errors()[0].method, "App.Vm::Build");
        assert_eq!(
            diagnostics.errors()[1].to_string(),
            "App.Vm::Init: property `X` has no getter"
        );
    }
}
