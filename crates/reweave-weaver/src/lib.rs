//! Reweave Property Weaver
//!
//! Build-time transformer that rewrites marker-tagged property
//! assignments in compiled modules: the assignment is replaced with the
//! construction of a wrapper that subscribes to the reactive source, and
//! the property's getter is rewired to read the wrapper's latest value.
//!
//! The pass is deterministic, single-threaded, and does no I/O; loading
//! and persisting modules is the caller's job.

#![warn(rust_2018_idioms)]

pub mod diagnostics;
pub mod error;
pub mod resolve;
pub mod symbols;

mod rewrite;
mod scan;

pub use diagnostics::{Diagnostic, Diagnostics};
pub use error::{WeaveError, WeaveResult};
pub use resolve::{resolve, InstructionBlock, ResolveError};
pub use symbols::{HelperSymbols, WeaveConfig};

use reweave_bytecode::{Module, TypeDef};
use rustc_hash::FxHashMap;
use scan::ScanOutcome;

/// Outcome of one weave pass over a module
#[derive(Debug, Default)]
pub struct WeaveReport {
    /// Number of properties rewired through a wrapper
    pub properties_woven: usize,
    /// Number of marker call sites skipped with a diagnostic
    pub sites_skipped: usize,
    /// Collected per-site diagnostics
    pub diagnostics: Diagnostics,
}

impl WeaveReport {
    /// True when any call site was diagnosed
    ///
    /// Callers should treat this as a hard build failure even though the
    /// remaining sites were woven.
    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

/// The weave pass driver
///
/// Holds the helper symbols resolved once per pass. Construction fails
/// fast when the configuration cannot supply them.
pub struct Weaver {
    symbols: HelperSymbols,
    field_prefix: String,
}

impl Weaver {
    /// Build a weaver from configuration
    pub fn new(config: &WeaveConfig) -> WeaveResult<Self> {
        let symbols = HelperSymbols::resolve(config)?;
        Ok(Self {
            symbols,
            field_prefix: config.field_prefix.clone(),
        })
    }

    /// The resolved helper symbols
    pub fn symbols(&self) -> &HelperSymbols {
        &self.symbols
    }

    /// Run one weave pass, mutating the module in place
    pub fn weave_module(&self, module: &mut Module) -> WeaveResult<WeaveReport> {
        let mut report = WeaveReport::default();
        for ty in &mut module.types {
            self.weave_type(ty, &mut report)?;
        }
        Ok(report)
    }

    fn weave_type(&self, ty: &mut TypeDef, report: &mut WeaveReport) -> WeaveResult<()> {
        // Property indices are stable across rewrites (only methods are
        // added or removed), so the lookup table is built once per type.
        let properties: FxHashMap<String, usize> = ty
            .properties
            .iter()
            .enumerate()
            .map(|(index, property)| (property.name.clone(), index))
            .collect();

        let mut method_index = 0;
        while method_index < ty.methods.len() {
            // Accessor bodies are synthesized; markers live in ordinary
            // method bodies (constructors, initializers).
            if ty.methods[method_index].accessor.is_some() {
                method_index += 1;
                continue;
            }

            let mut from = 0;
            loop {
                match scan::next_site(
                    ty,
                    method_index,
                    &properties,
                    &self.symbols,
                    &self.field_prefix,
                    from,
                    &mut report.diagnostics,
                ) {
                    ScanOutcome::Done => break,
                    ScanOutcome::Skip { resume } => {
                        report.sites_skipped += 1;
                        from = resume;
                    }
                    ScanOutcome::Site(site) => {
                        let rewritten = rewrite::rewrite(
                            ty,
                            method_index,
                            site,
                            &self.symbols,
                            &self.field_prefix,
                        )?;
                        report.properties_woven += 1;
                        from = rewritten.resume;
                        method_index = rewritten.method_index;
                    }
                }
            }

            method_index += 1;
        }
        Ok(())
    }
}
