use crate::attribute::{AttributeModifier, EffectiveAttribute, ValueModifier};
use crate::child::{ChildModifier, EffectiveChild};
use crate::components::{Component, ComponentTable, Ref};
use crate::position::FilePosition;
use crate::shared::{ElementOrAddOn, InheritanceSet, NCName, Sequence, ValueSpec};
use crate::toolkit::ToolkitId;
use crate::{attribute::AttributeDef, child::ChildDef};

/// The state shared by element-defs and add-ons: declarations, modifiers,
/// and the compiled (fully inherited) attribute and child maps.
#[derive(Clone, Debug)]
pub struct ElementKernel {
    pub declarer: ToolkitId,
    pub name: NCName,
    pub abstract_: bool,
    /// Single inheritance between element-defs; always `None` for add-ons.
    pub super_element: Option<Ref<ElementDef>>,
    pub declared_inheritance: InheritanceSet,
    /// Transitive closure over add-ons, including those pulled in by the
    /// super element.
    pub full_inheritance: InheritanceSet,
    pub declared_attributes: Sequence<Ref<AttributeDef>>,
    pub attribute_modifiers: Sequence<AttributeModifier>,
    /// The value spec declared here, if any. Only element-defs declare one.
    pub declared_value: Option<ValueSpec>,
    pub value_modifier: Option<ValueModifier>,
    /// The effective value spec after inheritance and modifiers.
    pub value: Option<ValueSpec>,
    pub declared_children: Sequence<Ref<ChildDef>>,
    pub child_modifiers: Sequence<ChildModifier>,
    /// Flattened attribute view, one entry per declared root.
    pub all_attributes: Sequence<EffectiveAttribute>,
    /// Flattened child view, one entry per declared root.
    pub all_children: Sequence<EffectiveChild>,
    /// An element-def whose instances constitute this type's metadata.
    pub meta_spec: Option<Ref<ElementDef>>,
    pub position: FilePosition,
}

impl ElementKernel {
    pub fn attribute_by_name<'k>(
        &'k self,
        name: &str,
        table: &impl ComponentTable,
    ) -> Option<&'k EffectiveAttribute> {
        self.all_attributes
            .iter()
            .find(|a| a.declared.get(table).name == name)
    }

    pub fn child_by_name<'k>(
        &'k self,
        name: &str,
        table: &impl ComponentTable,
    ) -> Option<&'k EffectiveChild> {
        self.all_children
            .iter()
            .find(|c| c.declared.get(table).name == name)
    }
}

/// A declarable element type.
#[derive(Clone, Debug)]
pub struct ElementDef {
    pub kernel: ElementKernel,
    /// The add-on marking instances of this type as external-content
    /// placeholders, if this type was declared a promise.
    pub promise: Option<Ref<AddOn>>,
}

impl Component for ElementDef {
    const DISPLAY_NAME: &'static str = "ElementDef";
}

impl ElementDef {
    /// Walks `other`'s super-element chain until `self_ref` or the root.
    pub fn is_assignable_from(
        self_ref: Ref<ElementDef>,
        other: Ref<ElementDef>,
        table: &impl ComponentTable,
    ) -> bool {
        let mut current = Some(other);
        while let Some(def) = current {
            if def == self_ref {
                return true;
            }
            current = def.get(table).kernel.super_element;
        }
        false
    }
}

/// A mixin modifying the value, attributes, or children of the element type
/// it requires.
#[derive(Clone, Debug)]
pub struct AddOn {
    pub kernel: ElementKernel,
    /// Types carrying this add-on must inherit from this element.
    pub requires: Option<Ref<ElementDef>>,
}

impl Component for AddOn {
    const DISPLAY_NAME: &'static str = "AddOn";
}

impl AddOn {
    /// An add-on is assignable from whatever inherits it, directly or
    /// through the full inheritance closure.
    pub fn is_assignable_from(
        self_ref: Ref<AddOn>,
        other: ElementOrAddOn,
        table: &impl ComponentTable,
    ) -> bool {
        if other == ElementOrAddOn::AddOn(self_ref) {
            return true;
        }
        other
            .kernel(table)
            .full_inheritance
            .iter()
            .any(|e| Self::is_assignable_from(self_ref, ElementOrAddOn::AddOn(e), table))
    }
}
