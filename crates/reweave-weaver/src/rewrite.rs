//! Assignment rewriting
//!
//! Consumes a validated [`WeaveSite`] and splices the replacement code
//! into the method body. The whole rewrite is computed as an immutable
//! plan from a read-only pass (indices to remove, instructions to insert
//! and where) and then applied in one batch: removals by descending index
//! so earlier removals never invalidate later ones, then a single splice
//! where the assignment stood.

use crate::error::{WeaveError, WeaveResult};
use crate::scan::WeaveSite;
use crate::symbols::HelperSymbols;
use reweave_bytecode::{Field, FieldRef, Instruction, TypeDef};

/// Indices valid after a rewrite, handed back to the scan loop
pub(crate) struct Rewritten {
    /// Body index just past the spliced-in replacement
    pub resume: usize,
    /// Method index of the marker-bearing method (may have shifted when
    /// the setter was removed)
    pub method_index: usize,
}

/// Replace the marker assignment with wrapper construction and rewire the
/// property to read through the wrapper
pub(crate) fn rewrite(
    ty: &mut TypeDef,
    method_index: usize,
    site: WeaveSite,
    symbols: &HelperSymbols,
    field_prefix: &str,
) -> WeaveResult<Rewritten> {
    let method_name = ty.methods[method_index].full_name(ty);
    let internal = |message: String| WeaveError::Internal {
        method: method_name.clone(),
        message,
    };

    // ===== Plan (read-only) =====

    let property = &ty.properties[site.property_index];
    let property_name = property.name.clone();
    let getter_index = property
        .getter
        .ok_or_else(|| internal(format!("property `{property_name}` lost its getter")))?;
    let setter_index = property.setter;
    let backing_index = property
        .backing_field
        .ok_or_else(|| internal(format!("property `{property_name}` lost its backing field")))?;

    let owner = ty.type_ref();
    let backing = &ty.fields[backing_index];
    let value_type = backing.field_type.clone();
    let backing_ref = FieldRef {
        declaring: owner.clone(),
        name: backing.name.clone(),
        field_type: value_type.clone(),
    };

    let field_name = format!("{field_prefix}{property_name}");
    if ty.find_field(&field_name).is_some() {
        return Err(internal(format!(
            "helper field `{field_name}` already exists"
        )));
    }
    let helper_type = symbols.helper_field_type(&value_type);
    let helper_ref = FieldRef {
        declaring: owner.clone(),
        name: field_name.clone(),
        field_type: helper_type.clone(),
    };

    // The source expression is the marker call's argument subtree; capture
    // it before anything is removed.
    let marker_node = site
        .block
        .children
        .iter()
        .find(|child| child.index == site.marker_index)
        .ok_or_else(|| internal("marker call is not an operand of the setter".to_string()))?;
    let mut source_indices: Vec<usize> = Vec::new();
    for child in &marker_node.children {
        source_indices.extend(child.indices());
    }
    source_indices.sort_unstable();
    source_indices.dedup();

    let body = &ty.methods[method_index].body;
    let source_instructions: Vec<Instruction> = source_indices
        .iter()
        .map(|&index| body[index].clone())
        .collect();

    let removals = site.block.indices();
    // The setter is the tree root and the highest removed index. Splicing
    // at its post-removal position keeps surviving instructions that were
    // interleaved with the tree (already-diagnosed sites among them) below
    // the resume point, so the scan never revisits them.
    let insert_at = site.block.index + 1 - removals.len();

    let mut insertions = vec![
        Instruction::load_this(), // receiver of the final store
        Instruction::load_this(), // owner argument
        Instruction::const_str(property_name.clone()),
        Instruction::load_this(),
        Instruction::load_field(backing_ref), // initial value
    ];
    insertions.extend(source_instructions);
    insertions.push(Instruction::call(symbols.to_property_for(&owner, &value_type)));
    insertions.push(Instruction::store_field(helper_ref.clone()));
    let resume = insert_at + insertions.len();

    let getter_body = vec![
        Instruction::load_this(),
        Instruction::load_field(helper_ref),
        Instruction::call_virt(symbols.value_get_for(&value_type)),
        Instruction::ret(),
    ];

    // ===== Apply =====

    ty.add_field(Field {
        name: field_name,
        field_type: helper_type,
        is_private: true,
    });

    let body = &mut ty.methods[method_index].body;
    for &index in removals.iter().rev() {
        body.remove(index);
    }
    let tail = body.split_off(insert_at);
    body.extend(insertions);
    body.extend(tail);

    ty.methods[getter_index].body = getter_body;

    let mut new_method_index = method_index;
    if let Some(setter_index) = setter_index {
        if setter_index == method_index {
            return Err(internal(
                "marker call appears inside the property's own setter".to_string(),
            ));
        }
        ty.remove_method(setter_index);
        if setter_index < new_method_index {
            new_method_index -= 1;
        }
    }

    Ok(Rewritten {
        resume,
        method_index: new_method_index,
    })
}
