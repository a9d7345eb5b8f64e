//! The merge kernel: composition of inherited attribute, value, and child
//! specifications along the inheritance lattice.
//!
//! The same composition runs in two places: when a toolkit is built (to
//! compile each type's flattened maps) and when a document element is
//! resolved (to fold in the add-ons an instance carries beyond its type).

use crate::attribute::{
    AttributeDef, AttributeModifier, AttributeProvenance, EffectiveAttribute, ValueModifier,
};
use crate::child::{ChildDef, ChildModifier, ChildProvenance, EffectiveChild};
use crate::components::{ComponentTable, Ref};
use crate::element::{AddOn, ElementDef};
use crate::error::{ErrorReporting, IssueKind};
use crate::position::FilePosition;
use crate::shared::{ElementOrAddOn, Sequence, Specification, ValueSpec};
use crate::value_type::{Value, ValueType};

/// One partial override of a value spec, with the source named for
/// diagnostics.
#[derive(Clone, Debug)]
pub struct SpecOverride {
    pub source: String,
    pub specify: Option<Specification>,
    pub default: Option<Value>,
    pub value_type: Option<ValueType>,
    pub position: FilePosition,
}

impl SpecOverride {
    pub fn from_attribute_modifier(
        m: &AttributeModifier,
        source: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            specify: m.specify,
            default: m.default.clone(),
            value_type: m.value_type.clone(),
            position: m.position.clone(),
        }
    }

    pub fn from_value_modifier(m: &ValueModifier, source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            specify: m.specify,
            default: m.default.clone(),
            value_type: None,
            position: m.position.clone(),
        }
    }

    /// Two overrides agree when they pin the same `(specification, default)`.
    fn agrees_with(&self, other: &SpecOverride) -> bool {
        self.specify == other.specify && self.default == other.default
    }
}

/// Applies one override to an inherited spec, enforcing the override laws:
///
/// - Forbidden is sticky: it cannot be relaxed, and a second Forbidden may
///   only confirm the inherited default.
/// - Required may become Optional or Forbidden only if a default is
///   available from either side.
/// - A default supplied alongside a still-Required specification is unused
///   and warned about.
/// - The value type may change only by narrowing an add-on bound.
///
/// On an illegal override the inherited spec is kept unchanged, so the
/// build stays coherent after the error.
pub fn validate_specification(
    old: &ValueSpec,
    ovr: &SpecOverride,
    reporting: &mut ErrorReporting,
    table: &impl ComponentTable,
) -> ValueSpec {
    let value_type = match &ovr.value_type {
        None => old.value_type.clone(),
        Some(new_type) if new_type.same_type(&old.value_type) => old.value_type.clone(),
        Some(new_type) => {
            let narrowed = match (&old.value_type, new_type) {
                (
                    ValueType::AddOnRef { add_on: old_bound, .. },
                    ValueType::AddOnRef { add_on: new_bound, .. },
                ) => AddOn::is_assignable_from(
                    *old_bound,
                    ElementOrAddOn::AddOn(*new_bound),
                    table,
                ),
                _ => false,
            };
            if narrowed {
                new_type.clone()
            } else {
                reporting.error(
                    IssueKind::InheritanceConflict,
                    ovr.position.clone(),
                    format!(
                        "{} may not change the value type from {} to {}",
                        ovr.source,
                        old.value_type.name(),
                        new_type.name()
                    ),
                );
                old.value_type.clone()
            }
        }
    };

    match (old.specify, ovr.specify) {
        (Specification::Forbidden, None | Some(Specification::Forbidden)) => {
            let default = match (&old.default, &ovr.default) {
                (Some(a), Some(b)) if a != b => {
                    reporting.error(
                        IssueKind::InheritanceConflict,
                        ovr.position.clone(),
                        format!(
                            "{} specifies default {b} for a forbidden value whose default is {a}",
                            ovr.source
                        ),
                    );
                    old.default.clone()
                }
                (Some(_), _) => old.default.clone(),
                (None, d) => d.clone(),
            };
            ValueSpec {
                value_type,
                specify: Specification::Forbidden,
                default,
                position: old.position.clone(),
            }
        }
        (Specification::Forbidden, Some(relaxed)) => {
            reporting.error(
                IssueKind::InheritanceConflict,
                ovr.position.clone(),
                format!("{} may not relax a forbidden value to {relaxed}", ovr.source),
            );
            old.clone()
        }
        (Specification::Required, None | Some(Specification::Required)) => {
            if ovr.default.is_some() {
                reporting.warn(
                    IssueKind::InheritanceConflict,
                    ovr.position.clone(),
                    format!("default from {} is unused on a required value", ovr.source),
                );
            }
            ValueSpec {
                value_type,
                specify: Specification::Required,
                default: old.default.clone(),
                position: old.position.clone(),
            }
        }
        (Specification::Required, Some(loosened)) => {
            // Required -> Optional/Forbidden needs a default from either side
            match ovr.default.clone().or_else(|| old.default.clone()) {
                Some(default) => ValueSpec {
                    value_type,
                    specify: loosened,
                    default: Some(default),
                    position: ovr.position.clone(),
                },
                None => {
                    reporting.error(
                        IssueKind::InheritanceConflict,
                        ovr.position.clone(),
                        format!(
                            "{} makes a required value {loosened} without supplying a default",
                            ovr.source
                        ),
                    );
                    old.clone()
                }
            }
        }
        (Specification::Optional, _) => {
            let specify = ovr.specify.unwrap_or(Specification::Optional);
            let default = match &ovr.default {
                Some(default) if !value_type.is_instance(default) => {
                    reporting.error(
                        IssueKind::TypeCoercion,
                        ovr.position.clone(),
                        format!(
                            "default {default} from {} is not a valid {}",
                            ovr.source,
                            value_type.name()
                        ),
                    );
                    old.default.clone()
                }
                Some(default) => Some(default.clone()),
                None => old.default.clone(),
            };
            ValueSpec {
                value_type,
                specify,
                default,
                position: ovr.position.clone(),
            }
        }
    }
}

/// Composes an inherited spec with the modifiers contributed by inherited
/// add-ons plus the owner's own final modifier.
///
/// Diamond rule: two incomparable add-ons pinning different
/// `(specification, default)` pairs for the same key conflict; the conflict
/// is fatal unless the owner supplies its own final word. On conflict the
/// inherited spec is kept unmodified.
pub fn compose_spec(
    base: &ValueSpec,
    addon_mods: &[(Ref<AddOn>, SpecOverride)],
    own: Option<&SpecOverride>,
    key: &str,
    reporting: &mut ErrorReporting,
    table: &impl ComponentTable,
) -> ValueSpec {
    if own.is_none() {
        for (i, (a, a_ovr)) in addon_mods.iter().enumerate() {
            for (b, b_ovr) in &addon_mods[i + 1..] {
                let comparable = AddOn::is_assignable_from(*a, ElementOrAddOn::AddOn(*b), table)
                    || AddOn::is_assignable_from(*b, ElementOrAddOn::AddOn(*a), table);
                if !comparable && !a_ovr.agrees_with(b_ovr) {
                    reporting.error(
                        IssueKind::InheritanceConflict,
                        b_ovr.position.clone(),
                        format!(
                            "unrelated add-ons {} (at {}) and {} (at {}) modify {key} differently \
                             and no final specification reconciles them",
                            a_ovr.source, a_ovr.position, b_ovr.source, b_ovr.position
                        ),
                    );
                    return base.clone();
                }
            }
        }
    }

    let mut spec = base.clone();
    for (_, ovr) in addon_mods {
        spec = validate_specification(&spec, ovr, reporting, table);
    }
    if let Some(own) = own {
        spec = validate_specification(&spec, own, reporting, table);
    }
    spec
}

/// Applies one child modifier: the type bound may only narrow, the
/// cardinality may only tighten, and inheritance/requirement sets
/// accumulate. An overridden role may not be modified.
pub fn merge_child(
    old: &EffectiveChild,
    m: &ChildModifier,
    by: ElementOrAddOn,
    reporting: &mut ErrorReporting,
    table: &impl ComponentTable,
) -> EffectiveChild {
    let name = ChildDef::qualified_name(old.declared, table);
    if matches!(old.provenance, ChildProvenance::Overridden { .. }) {
        reporting.error(
            IssueKind::InheritanceConflict,
            m.position.clone(),
            format!("{name} is overridden for this type and may not be modified"),
        );
        return old.clone();
    }

    let child_type = match (old.child_type, m.child_type) {
        (_, None) => old.child_type,
        (None, Some(new)) => Some(new),
        (Some(old_bound), Some(new)) => {
            if ElementDef::is_assignable_from(old_bound, new, table) {
                Some(new)
            } else {
                reporting.error(
                    IssueKind::InheritanceConflict,
                    m.position.clone(),
                    format!(
                        "{} does not narrow the type bound {} of {name}",
                        new.get(table).kernel.name,
                        old_bound.get(table).kernel.name
                    ),
                );
                old.child_type
            }
        }
    };

    let min = match m.min {
        Some(new_min) if new_min < old.min => {
            reporting.error(
                IssueKind::InheritanceConflict,
                m.position.clone(),
                format!("min {new_min} relaxes the inherited min {} of {name}", old.min),
            );
            old.min
        }
        Some(new_min) => new_min,
        None => old.min,
    };
    let max = match m.max {
        Some(new_max) if !new_max.at_most(old.max) => {
            reporting.error(
                IssueKind::InheritanceConflict,
                m.position.clone(),
                format!("max {new_max} relaxes the inherited max {} of {name}", old.max),
            );
            old.max
        }
        Some(new_max) => new_max,
        None => old.max,
    };

    if let crate::child::ChildMax::Count(count) = max {
        if min > count {
            reporting.error(
                IssueKind::Cardinality,
                m.position.clone(),
                format!("{name} ends up with min {min} greater than max {count}"),
            );
        }
    }

    let mut inheritance = old.inheritance.clone();
    inheritance.union(&m.inheritance, table);
    let mut requirement = old.requirement.clone();
    for &req in &m.requirement {
        if !requirement.contains(&req) {
            requirement.push(req);
        }
    }

    EffectiveChild {
        declared: old.declared,
        provenance: ChildProvenance::Modified { by },
        child_type,
        inheritance,
        requirement,
        min,
        max,
        position: m.position.clone(),
    }
}

fn source_name(source: ElementOrAddOn, table: &impl ComponentTable) -> String {
    match source {
        ElementOrAddOn::Element(_) => format!("element {}", source.name(table)),
        ElementOrAddOn::AddOn(_) => format!("add-on {}", source.name(table)),
    }
}

/// Flattens the attribute map of a type or instance: the inherited base,
/// then each add-on's declared attributes and modifiers in deterministic
/// order, then the owner's own declarations and modifiers.
///
/// `inherit_tag` retags base entries as inherited from the given source;
/// `owner` is `None` when composing instance-level add-ons onto an already
/// compiled type.
pub fn flatten_attributes(
    base: &[EffectiveAttribute],
    inherit_tag: Option<ElementOrAddOn>,
    addons: &[Ref<AddOn>],
    owner: Option<ElementOrAddOn>,
    own_declared: &[Ref<AttributeDef>],
    own_modifiers: &[AttributeModifier],
    reporting: &mut ErrorReporting,
    table: &impl ComponentTable,
) -> Sequence<EffectiveAttribute> {
    let mut result: Vec<EffectiveAttribute> = base
        .iter()
        .map(|entry| match inherit_tag {
            Some(from) => EffectiveAttribute {
                declared: entry.declared,
                provenance: AttributeProvenance::Inherited { from },
                spec: entry.spec.clone(),
            },
            None => entry.clone(),
        })
        .collect();

    // Declarations contributed by inherited add-ons
    for &add_on in addons {
        for &decl in &add_on.get(table).kernel.declared_attributes {
            let decl_def = decl.get(table);
            match result
                .iter()
                .find(|e| e.declared.get(table).name == decl_def.name)
            {
                Some(existing) if existing.declared == decl => {}
                Some(existing) => {
                    reporting.error(
                        IssueKind::InheritanceConflict,
                        decl_def.spec.position.clone(),
                        format!(
                            "attribute {} of add-on {} collides with inherited {}",
                            decl_def.name,
                            add_on.get(table).kernel.name,
                            AttributeDef::qualified_name(existing.declared, table)
                        ),
                    );
                }
                None => result.push(EffectiveAttribute {
                    declared: decl,
                    provenance: AttributeProvenance::Inherited {
                        from: ElementOrAddOn::AddOn(add_on),
                    },
                    spec: decl_def.spec.clone(),
                }),
            }
        }
    }

    // Modifiers contributed by inherited add-ons, grouped per declared root
    let mut addon_mods: Vec<(Ref<AttributeDef>, Vec<(Ref<AddOn>, SpecOverride)>)> = Vec::new();
    for &add_on in addons {
        for m in &add_on.get(table).kernel.attribute_modifiers {
            let ovr = SpecOverride::from_attribute_modifier(
                m,
                source_name(ElementOrAddOn::AddOn(add_on), table),
            );
            match addon_mods.iter_mut().find(|(d, _)| *d == m.declared) {
                Some((_, mods)) => mods.push((add_on, ovr)),
                None => addon_mods.push((m.declared, vec![(add_on, ovr)])),
            }
        }
    }
    for (declared, mods) in addon_mods {
        let own = own_modifiers.iter().find(|m| m.declared == declared).map(|m| {
            SpecOverride::from_attribute_modifier(
                m,
                owner.map_or_else(|| "this element".to_owned(), |o| source_name(o, table)),
            )
        });
        let key = AttributeDef::qualified_name(declared, table);
        match result.iter_mut().find(|e| e.declared == declared) {
            Some(entry) => {
                entry.spec =
                    compose_spec(&entry.spec, &mods, own.as_ref(), &key, reporting, table);
                entry.provenance = AttributeProvenance::Modified {
                    by: ElementOrAddOn::AddOn(mods.last().map(|(a, _)| *a).unwrap()),
                };
            }
            None => reporting.error(
                IssueKind::UnknownReference,
                mods[0].1.position.clone(),
                format!("{key} is not an attribute of this type"),
            ),
        }
    }

    // The owner's own declarations
    for &decl in own_declared {
        let decl_def = decl.get(table);
        if let Some(existing) = result
            .iter()
            .find(|e| e.declared.get(table).name == decl_def.name)
        {
            reporting.error(
                IssueKind::InheritanceConflict,
                decl_def.spec.position.clone(),
                format!(
                    "attribute {} collides with inherited {}; use a modifier to override it",
                    decl_def.name,
                    AttributeDef::qualified_name(existing.declared, table)
                ),
            );
        } else {
            result.push(EffectiveAttribute {
                declared: decl,
                provenance: AttributeProvenance::Declared,
                spec: decl_def.spec.clone(),
            });
        }
    }

    // The owner's own modifiers (add-on modifier targets were already
    // finalized above)
    for m in own_modifiers {
        let Some(entry) = result.iter_mut().find(|e| e.declared == m.declared) else {
            reporting.error(
                IssueKind::UnknownReference,
                m.position.clone(),
                format!(
                    "{} is not an attribute of this type",
                    AttributeDef::qualified_name(m.declared, table)
                ),
            );
            continue;
        };
        if let AttributeProvenance::Modified { .. } = entry.provenance {
            // Already applied as the final word of an add-on composition
            if addon_modified(entry.declared, addons, table) {
                continue;
            }
        }
        let owner_src =
            owner.map_or_else(|| "this element".to_owned(), |o| source_name(o, table));
        let ovr = SpecOverride::from_attribute_modifier(m, owner_src);
        entry.spec = validate_specification(&entry.spec, &ovr, reporting, table);
        if let Some(owner) = owner {
            entry.provenance = AttributeProvenance::Modified { by: owner };
        }
    }

    result
}

fn addon_modified(
    declared: Ref<AttributeDef>,
    addons: &[Ref<AddOn>],
    table: &impl ComponentTable,
) -> bool {
    addons.iter().any(|a| {
        a.get(table)
            .kernel
            .attribute_modifiers
            .iter()
            .any(|m| m.declared == declared)
    })
}

/// Flattens the value spec: the inherited value or the owner's declared
/// one, the add-on modifiers under the diamond rule, then the owner's own
/// modifier.
pub fn flatten_value(
    inherited: Option<&ValueSpec>,
    own_declared: Option<&ValueSpec>,
    addons: &[Ref<AddOn>],
    own_modifier: Option<&ValueModifier>,
    owner_label: &str,
    reporting: &mut ErrorReporting,
    table: &impl ComponentTable,
) -> Option<ValueSpec> {
    let base = match (inherited, own_declared) {
        (Some(inherited), Some(declared)) => {
            reporting.error(
                IssueKind::InheritanceConflict,
                declared.position.clone(),
                format!("{owner_label} inherits a value and may not declare a new one"),
            );
            Some(inherited.clone())
        }
        (Some(inherited), None) => Some(inherited.clone()),
        (None, Some(declared)) => Some(declared.clone()),
        (None, None) => None,
    };

    let mut addon_mods = Vec::new();
    for &add_on in addons {
        if let Some(m) = &add_on.get(table).kernel.value_modifier {
            addon_mods.push((
                add_on,
                SpecOverride::from_value_modifier(
                    m,
                    source_name(ElementOrAddOn::AddOn(add_on), table),
                ),
            ));
        }
    }
    let own = own_modifier.map(|m| SpecOverride::from_value_modifier(m, owner_label));

    match base {
        Some(base) => Some(compose_spec(
            &base,
            &addon_mods,
            own.as_ref(),
            "the element value",
            reporting,
            table,
        )),
        None => {
            if let Some(ovr) = addon_mods.first().map(|(_, o)| o).or(own.as_ref()) {
                reporting.error(
                    IssueKind::UnknownReference,
                    ovr.position.clone(),
                    format!("{owner_label} has no value to modify"),
                );
            }
            None
        }
    }
}

/// Flattens the child map, with the extra `Overridden` step: a newly
/// declared child that fulfills inherited roles closes those roles.
pub fn flatten_children(
    base: &[EffectiveChild],
    inherit_tag: Option<ElementOrAddOn>,
    addons: &[Ref<AddOn>],
    owner: Option<ElementOrAddOn>,
    own_declared: &[Ref<ChildDef>],
    own_modifiers: &[ChildModifier],
    reporting: &mut ErrorReporting,
    table: &impl ComponentTable,
) -> Sequence<EffectiveChild> {
    let mut result: Vec<EffectiveChild> = base
        .iter()
        .map(|entry| match inherit_tag {
            Some(_) if matches!(entry.provenance, ChildProvenance::Overridden { .. }) => {
                entry.clone()
            }
            Some(from) => EffectiveChild {
                provenance: ChildProvenance::Inherited { from },
                ..entry.clone()
            },
            None => entry.clone(),
        })
        .collect();

    let mut declare = |result: &mut Vec<EffectiveChild>,
                       decl: Ref<ChildDef>,
                       provenance: ChildProvenance,
                       reporting: &mut ErrorReporting| {
        let decl_def = decl.get(table);
        if let Some(existing) = result
            .iter()
            .find(|e| e.declared.get(table).name == decl_def.name)
        {
            if existing.declared != decl {
                reporting.error(
                    IssueKind::InheritanceConflict,
                    decl_def.position.clone(),
                    format!(
                        "child {} collides with inherited {}",
                        decl_def.name,
                        ChildDef::qualified_name(existing.declared, table)
                    ),
                );
            }
            return;
        }
        result.push(EffectiveChild {
            declared: decl,
            provenance,
            child_type: decl_def.child_type,
            inheritance: decl_def.inheritance.clone(),
            requirement: decl_def.requirement.clone(),
            min: decl_def.min,
            max: decl_def.max,
            position: decl_def.position.clone(),
        });
    };

    for &add_on in addons {
        for &decl in &add_on.get(table).kernel.declared_children {
            declare(
                &mut result,
                decl,
                ChildProvenance::Inherited {
                    from: ElementOrAddOn::AddOn(add_on),
                },
                reporting,
            );
        }
    }
    for &add_on in addons {
        for m in &add_on.get(table).kernel.child_modifiers {
            match result.iter_mut().find(|e| e.declared == m.declared) {
                Some(entry) => {
                    *entry = merge_child(entry, m, ElementOrAddOn::AddOn(add_on), reporting, table)
                }
                None => reporting.error(
                    IssueKind::UnknownReference,
                    m.position.clone(),
                    format!(
                        "{} is not a child of this type",
                        ChildDef::qualified_name(m.declared, table)
                    ),
                ),
            }
        }
    }

    for &decl in own_declared {
        declare(&mut result, decl, ChildProvenance::Declared, reporting);
    }

    // Fulfillment closes the fulfilled inherited roles
    for &decl in own_declared {
        for &role in &decl.get(table).fulfillment {
            match result.iter_mut().find(|e| e.declared == role) {
                Some(entry) => {
                    let overriders = match &mut entry.provenance {
                        ChildProvenance::Overridden { overriders } => {
                            overriders.push(decl);
                            continue;
                        }
                        _ => vec![decl],
                    };
                    entry.provenance = ChildProvenance::Overridden { overriders };
                    entry.min = 0;
                    entry.max = crate::child::ChildMax::Count(0);
                }
                None => reporting.error(
                    IssueKind::UnknownReference,
                    decl.get(table).position.clone(),
                    format!(
                        "{} does not fulfill any inherited role",
                        ChildDef::qualified_name(decl, table)
                    ),
                ),
            }
        }
    }

    for m in own_modifiers {
        let by = owner.unwrap_or_else(|| m.declared.get(table).owner);
        match result.iter_mut().find(|e| e.declared == m.declared) {
            Some(entry) => *entry = merge_child(entry, m, by, reporting, table),
            None => reporting.error(
                IssueKind::UnknownReference,
                m.position.clone(),
                format!(
                    "{} is not a child of this type",
                    ChildDef::qualified_name(m.declared, table)
                ),
            ),
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::child::ChildMax;
    use crate::components::ConstructionComponentTable;
    use crate::element::ElementKernel;
    use crate::shared::InheritanceSet;
    use crate::toolkit::ToolkitId;
    use pretty_assertions::assert_eq;

    fn spec(specify: Specification, default: Option<&str>) -> ValueSpec {
        ValueSpec {
            value_type: ValueType::String,
            specify,
            default: default.map(|d| Value::Text(d.to_owned())),
            position: FilePosition::unknown(),
        }
    }

    fn ovr(specify: Option<Specification>, default: Option<&str>) -> SpecOverride {
        SpecOverride {
            source: "the override".to_owned(),
            specify,
            default: default.map(|d| Value::Text(d.to_owned())),
            value_type: None,
            position: FilePosition::unknown(),
        }
    }

    fn empty_kernel(name: &str) -> ElementKernel {
        ElementKernel {
            declarer: ToolkitId(0),
            name: name.to_owned(),
            abstract_: false,
            super_element: None,
            declared_inheritance: InheritanceSet::new(),
            full_inheritance: InheritanceSet::new(),
            declared_attributes: Vec::new(),
            attribute_modifiers: Vec::new(),
            declared_value: None,
            value_modifier: None,
            value: None,
            declared_children: Vec::new(),
            child_modifiers: Vec::new(),
            all_attributes: Vec::new(),
            all_children: Vec::new(),
            meta_spec: None,
            position: FilePosition::unknown(),
        }
    }

    #[test]
    fn forbidden_cannot_be_relaxed() {
        let table = ConstructionComponentTable::new();
        let mut reporting = ErrorReporting::new();
        let old = spec(Specification::Forbidden, Some("x"));
        let result = validate_specification(
            &old,
            &ovr(Some(Specification::Optional), None),
            &mut reporting,
            &table,
        );
        assert!(reporting.has_errors());
        assert_eq!(result.specify, Specification::Forbidden);
        assert_eq!(result.default, Some(Value::Text("x".to_owned())));
    }

    #[test]
    fn forbidden_with_differing_defaults_is_an_error() {
        let table = ConstructionComponentTable::new();
        let mut reporting = ErrorReporting::new();
        let old = spec(Specification::Forbidden, Some("x"));
        let result = validate_specification(
            &old,
            &ovr(Some(Specification::Forbidden), Some("y")),
            &mut reporting,
            &table,
        );
        assert!(reporting.has_errors());
        assert_eq!(result.default, Some(Value::Text("x".to_owned())));

        let mut reporting = ErrorReporting::new();
        let agreed = validate_specification(
            &old,
            &ovr(Some(Specification::Forbidden), Some("x")),
            &mut reporting,
            &table,
        );
        assert!(!reporting.has_errors());
        assert_eq!(agreed.specify, Specification::Forbidden);
    }

    #[test]
    fn required_to_optional_needs_a_default() {
        let table = ConstructionComponentTable::new();
        let mut reporting = ErrorReporting::new();
        let old = spec(Specification::Required, None);
        let failed = validate_specification(
            &old,
            &ovr(Some(Specification::Optional), None),
            &mut reporting,
            &table,
        );
        assert!(reporting.has_errors());
        assert_eq!(failed.specify, Specification::Required);

        let mut reporting = ErrorReporting::new();
        let loosened = validate_specification(
            &old,
            &ovr(Some(Specification::Optional), Some("d")),
            &mut reporting,
            &table,
        );
        assert!(!reporting.has_errors());
        assert_eq!(loosened.specify, Specification::Optional);
        assert_eq!(loosened.default, Some(Value::Text("d".to_owned())));
    }

    #[test]
    fn default_on_required_value_warns_as_unused() {
        let table = ConstructionComponentTable::new();
        let mut reporting = ErrorReporting::new();
        let old = spec(Specification::Required, None);
        let result = validate_specification(
            &old,
            &ovr(Some(Specification::Required), Some("d")),
            &mut reporting,
            &table,
        );
        assert!(!reporting.has_errors());
        assert_eq!(reporting.issues().len(), 1);
        assert_eq!(result.specify, Specification::Required);
        assert_eq!(result.default, None);
    }

    #[test]
    fn optional_takes_the_override() {
        let table = ConstructionComponentTable::new();
        let mut reporting = ErrorReporting::new();
        let old = spec(Specification::Optional, Some("x"));
        let result = validate_specification(
            &old,
            &ovr(Some(Specification::Required), None),
            &mut reporting,
            &table,
        );
        assert!(!reporting.has_errors());
        assert_eq!(result.specify, Specification::Required);
    }

    #[test]
    fn agreeing_diamond_composes_cleanly() {
        let mut components = ConstructionComponentTable::new();
        let p = components.create(AddOn {
            kernel: empty_kernel("p"),
            requires: None,
        });
        let q = components.create(AddOn {
            kernel: empty_kernel("q"),
            requires: None,
        });
        let base = spec(Specification::Optional, Some("x"));
        let mods = vec![
            (p, ovr(Some(Specification::Required), None)),
            (q, ovr(Some(Specification::Required), None)),
        ];
        let mut reporting = ErrorReporting::new();
        let result = compose_spec(&base, &mods, None, "e.n", &mut reporting, &components);
        assert!(!reporting.has_errors());
        assert_eq!(result.specify, Specification::Required);
    }

    #[test]
    fn conflicting_diamond_without_final_word_fails() {
        let mut components = ConstructionComponentTable::new();
        let p = components.create(AddOn {
            kernel: empty_kernel("p"),
            requires: None,
        });
        let q = components.create(AddOn {
            kernel: empty_kernel("q"),
            requires: None,
        });
        let base = spec(Specification::Optional, Some("x"));
        let mods = vec![
            (p, ovr(None, Some("from-p"))),
            (q, ovr(None, Some("from-q"))),
        ];
        let mut reporting = ErrorReporting::new();
        let result = compose_spec(&base, &mods, None, "e.n", &mut reporting, &components);
        assert!(reporting.has_errors());
        // the inherited spec survives unmodified
        assert_eq!(result.default, Some(Value::Text("x".to_owned())));

        // an owner-level final word reconciles the same conflict
        let own = ovr(None, Some("final"));
        let mut reporting = ErrorReporting::new();
        let result = compose_spec(&base, &mods, Some(&own), "e.n", &mut reporting, &components);
        assert!(!reporting.has_errors());
        assert_eq!(result.default, Some(Value::Text("final".to_owned())));
    }

    #[test]
    fn child_bounds_may_only_tighten() {
        let mut components = ConstructionComponentTable::new();
        let element = components.create(ElementDef {
            kernel: empty_kernel("e"),
            promise: None,
        });
        let owner = ElementOrAddOn::Element(element);
        let declared = components.create(ChildDef {
            owner,
            name: "c".to_owned(),
            child_type: None,
            fulfillment: Vec::new(),
            inheritance: InheritanceSet::new(),
            requirement: Vec::new(),
            min: 1,
            max: ChildMax::Count(3),
            position: FilePosition::unknown(),
        });
        let old = EffectiveChild {
            declared,
            provenance: ChildProvenance::Declared,
            child_type: None,
            inheritance: InheritanceSet::new(),
            requirement: Vec::new(),
            min: 1,
            max: ChildMax::Count(3),
            position: FilePosition::unknown(),
        };

        let tighten = ChildModifier {
            declared,
            child_type: None,
            inheritance: InheritanceSet::new(),
            requirement: Vec::new(),
            min: Some(2),
            max: Some(ChildMax::Count(2)),
            position: FilePosition::unknown(),
        };
        let mut reporting = ErrorReporting::new();
        let merged = merge_child(&old, &tighten, owner, &mut reporting, &components);
        assert!(!reporting.has_errors());
        assert_eq!((merged.min, merged.max), (2, ChildMax::Count(2)));

        let relax = ChildModifier {
            declared,
            child_type: None,
            inheritance: InheritanceSet::new(),
            requirement: Vec::new(),
            min: Some(0),
            max: Some(ChildMax::Unbounded),
            position: FilePosition::unknown(),
        };
        let mut reporting = ErrorReporting::new();
        let merged = merge_child(&old, &relax, owner, &mut reporting, &components);
        assert!(reporting.has_errors());
        assert_eq!((merged.min, merged.max), (1, ChildMax::Count(3)));
    }
}
