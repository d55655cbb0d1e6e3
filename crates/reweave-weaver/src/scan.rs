//! Marker call scanning
//!
//! Walks a method body looking for calls to the configured marker
//! function, validates the surrounding shape (the marker result must feed
//! a property setter, and the property must be eligible), and resolves the
//! assignment's dependency tree. Everything the rewrite engine assumes is
//! checked here; violations become diagnostics and the site is skipped.

use crate::diagnostics::Diagnostics;
use crate::resolve::{resolve, InstructionBlock};
use crate::symbols::HelperSymbols;
use reweave_bytecode::{AccessorKind, TypeDef};
use rustc_hash::FxHashMap;

/// A validated marker call site ready for rewriting
#[derive(Debug)]
pub(crate) struct WeaveSite {
    /// Index of the marker call within the method body
    pub marker_index: usize,
    /// Property targeted by the setter following the marker
    pub property_index: usize,
    /// Dependency tree rooted at the setter call
    pub block: InstructionBlock,
}

/// Result of scanning for the next marker call at or after `from`
#[derive(Debug)]
pub(crate) enum ScanOutcome {
    /// A valid site was found
    Site(WeaveSite),
    /// A marker was found but the site was diagnosed; resume past it
    Skip {
        /// Body index to continue scanning from
        resume: usize,
    },
    /// No marker call remains
    Done,
}

/// Find and validate the next marker call site in a method body
pub(crate) fn next_site(
    ty: &TypeDef,
    method_index: usize,
    properties: &FxHashMap<String, usize>,
    symbols: &HelperSymbols,
    field_prefix: &str,
    from: usize,
    diagnostics: &mut Diagnostics,
) -> ScanOutcome {
    let method = &ty.methods[method_index];
    let body = &method.body;

    let marker_index = body
        .iter()
        .enumerate()
        .skip(from)
        .find(|(_, instruction)| {
            instruction
                .called_method()
                .is_some_and(|m| m.full_name() == symbols.marker)
        })
        .map(|(index, _)| index);
    let Some(marker_index) = marker_index else {
        return ScanOutcome::Done;
    };

    let method_name = method.full_name(ty);
    let skip = ScanOutcome::Skip {
        resume: marker_index + 1,
    };

    // The marker's value must be consumed by the very next instruction,
    // and that instruction must be a property setter call.
    let setter = body
        .get(marker_index + 1)
        .and_then(|instruction| instruction.called_method())
        .filter(|m| m.accessor == Some(AccessorKind::Set));
    let Some(setter) = setter else {
        diagnostics.report_error(
            method_name,
            format!(
                "the result of `{}` must be assigned directly to a property",
                symbols.marker
            ),
        );
        return skip;
    };
    let Some(property_name) = setter.property_name() else {
        diagnostics.report_error(
            method_name,
            format!("setter `{}` has no recognizable property name", setter.name),
        );
        return skip;
    };

    let block = match resolve(body, marker_index + 1) {
        Ok(block) => block,
        Err(error) => {
            diagnostics.report_error(
                method_name,
                format!("could not reconstruct the assignment around the marker call: {error}"),
            );
            return skip;
        }
    };

    let Some(&property_index) = properties.get(property_name) else {
        diagnostics.report_error(
            method_name,
            format!("no property named `{property_name}` on `{}`", ty.name),
        );
        return skip;
    };
    let property = &ty.properties[property_index];

    let Some(getter_index) = property.getter else {
        diagnostics.report_error(
            method_name,
            format!("property `{property_name}` has no getter"),
        );
        return skip;
    };
    if ty.methods[getter_index].is_static {
        diagnostics.report_error(
            method_name,
            format!("the getter of property `{property_name}` is static"),
        );
        return skip;
    }
    if property.backing_field.is_none() {
        diagnostics.report_error(
            method_name,
            format!("property `{property_name}` has no backing field"),
        );
        return skip;
    }
    // A wrapper field from an earlier site means this property was already
    // woven; a second assignment is a per-site error, not a pass failure.
    let woven_field = format!("{field_prefix}{property_name}");
    if ty.find_field(&woven_field).is_some() {
        diagnostics.report_error(
            method_name,
            format!("property `{property_name}` is already woven (field `{woven_field}` exists)"),
        );
        return skip;
    }

    ScanOutcome::Site(WeaveSite {
        marker_index,
        property_index,
        block,
    })
}
