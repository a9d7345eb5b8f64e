//! Whole-toolkit validation: walks every declared child's inheritance
//! chain and reports incompatible modifier contributions with the trace of
//! add-ons each came through.

use std::collections::HashSet;

use crate::attribute::AttributeDef;
use crate::child::EffectiveChild;
use crate::components::{ComponentTable, Ref};
use crate::element::{AddOn, ElementDef};
use crate::error::{ErrorReporting, IssueKind};
use crate::position::FilePosition;
use crate::shared::{ElementOrAddOn, NCName, Specification};
use crate::toolkit::Toolkit;
use crate::value_type::Value;

/// One modifier contribution found while walking an inheritance chain.
struct TracedModifier {
    add_on: Ref<AddOn>,
    trace: Vec<NCName>,
    key: ModifierKey,
    specify: Option<Specification>,
    default: Option<Value>,
    position: FilePosition,
}

#[derive(Clone, PartialEq, Eq)]
enum ModifierKey {
    Attribute(Ref<AttributeDef>),
    Value,
}

/// Validates every element-def's children recursively, reporting diamond
/// conflicts between modifier traces that the owning type does not
/// reconcile.
pub fn validate_toolkit(
    toolkit: &Toolkit,
    table: &impl ComponentTable,
    reporting: &mut ErrorReporting,
) {
    let mut no_recurse = HashSet::new();
    for (_, element) in toolkit.element_defs() {
        for entry in &element.get(table).kernel.all_children {
            validate_child(entry, table, &mut no_recurse, reporting);
        }
    }
}

fn validate_child(
    entry: &EffectiveChild,
    table: &impl ComponentTable,
    no_recurse: &mut HashSet<Ref<ElementDef>>,
    reporting: &mut ErrorReporting,
) {
    let Some(child_type) = entry.child_type else {
        return;
    };
    // Self-referential child types terminate here
    if !no_recurse.insert(child_type) {
        return;
    }

    // The add-on universe of elements fulfilling this role: the type's own
    // closure joined with what the role itself carries
    let kernel = &child_type.get(table).kernel;
    let mut seeds: Vec<Ref<AddOn>> = kernel.full_inheritance.iter().collect();
    for add_on in entry.inheritance.iter() {
        if !seeds.contains(&add_on) {
            seeds.push(add_on);
        }
    }
    for &add_on in &entry.requirement {
        if !seeds.contains(&add_on) {
            seeds.push(add_on);
        }
    }

    let mut traced = Vec::new();
    for seed in seeds {
        collect_modifiers(seed, Vec::new(), table, &mut traced);
    }

    for (i, a) in traced.iter().enumerate() {
        for b in &traced[i + 1..] {
            if a.add_on == b.add_on || a.key != b.key {
                continue;
            }
            if a.specify == b.specify && a.default == b.default {
                continue;
            }
            let comparable =
                AddOn::is_assignable_from(a.add_on, ElementOrAddOn::AddOn(b.add_on), table)
                    || AddOn::is_assignable_from(
                        b.add_on,
                        ElementOrAddOn::AddOn(a.add_on),
                        table,
                    );
            if comparable {
                continue;
            }
            if reconciled_by_owner(kernel, &a.key) {
                continue;
            }
            let key_name = match &a.key {
                ModifierKey::Attribute(declared) => {
                    AttributeDef::qualified_name(*declared, table)
                }
                ModifierKey::Value => format!("the value of {}", kernel.name),
            };
            reporting.error(
                IssueKind::InheritanceConflict,
                b.position.clone(),
                format!(
                    "conflicting modifications of {key_name} via {} and via {} (first at {})",
                    render_trace(&a.trace),
                    render_trace(&b.trace),
                    a.position
                ),
            );
        }
    }

    for nested in &kernel.all_children {
        validate_child(nested, table, no_recurse, reporting);
    }
}

fn reconciled_by_owner(
    kernel: &crate::element::ElementKernel,
    key: &ModifierKey,
) -> bool {
    match key {
        ModifierKey::Attribute(declared) => kernel
            .attribute_modifiers
            .iter()
            .any(|m| m.declared == *declared),
        ModifierKey::Value => kernel.value_modifier.is_some(),
    }
}

/// Depth-first walk over an add-on and everything it inherits, recording
/// each attribute and value modifier with the path it was reached through.
fn collect_modifiers(
    add_on: Ref<AddOn>,
    mut trace: Vec<NCName>,
    table: &impl ComponentTable,
    out: &mut Vec<TracedModifier>,
) {
    let kernel = &add_on.get(table).kernel;
    trace.push(kernel.name.clone());

    for m in &kernel.attribute_modifiers {
        out.push(TracedModifier {
            add_on,
            trace: trace.clone(),
            key: ModifierKey::Attribute(m.declared),
            specify: m.specify,
            default: m.default.clone(),
            position: m.position.clone(),
        });
    }
    if let Some(m) = &kernel.value_modifier {
        out.push(TracedModifier {
            add_on,
            trace: trace.clone(),
            key: ModifierKey::Value,
            specify: m.specify,
            default: m.default.clone(),
            position: m.position.clone(),
        });
    }

    for inherited in kernel.full_inheritance.iter() {
        collect_modifiers(inherited, trace.clone(), table, out);
    }
}

fn render_trace(trace: &[NCName]) -> String {
    trace.join(" -> ")
}
