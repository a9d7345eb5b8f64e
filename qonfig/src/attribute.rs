use crate::components::{Component, ComponentTable, Ref};
use crate::position::FilePosition;
use crate::shared::{ElementOrAddOn, NCName, Specification, ValueSpec};
use crate::value_type::{Value, ValueType};

/// A declared attribute: the root of identity for every modified or
/// inherited view of it.
#[derive(Clone, Debug)]
pub struct AttributeDef {
    pub owner: ElementOrAddOn,
    pub name: NCName,
    pub spec: ValueSpec,
}

impl Component for AttributeDef {
    const DISPLAY_NAME: &'static str = "AttributeDef";
}

impl AttributeDef {
    /// `owner-name.attribute-name`, the qualified form used in diagnostics
    /// and modifier targets.
    pub fn qualified_name(ref_: Ref<AttributeDef>, table: &impl ComponentTable) -> String {
        let def = ref_.get(table);
        format!("{}.{}", def.owner.name(table), def.name)
    }
}

/// Where an effective attribute's specification came from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AttributeProvenance {
    Declared,
    Inherited { from: ElementOrAddOn },
    Modified { by: ElementOrAddOn },
}

/// One entry of a compiled attribute map: the declared root plus the
/// specification that results from composing every modifier on the way down.
#[derive(Clone, Debug)]
pub struct EffectiveAttribute {
    pub declared: Ref<AttributeDef>,
    pub provenance: AttributeProvenance,
    pub spec: ValueSpec,
}

/// A resolved `attr-mod`: a partial override of an inherited attribute.
/// Absent fields inherit.
#[derive(Clone, Debug)]
pub struct AttributeModifier {
    pub declared: Ref<AttributeDef>,
    pub specify: Option<Specification>,
    pub default: Option<Value>,
    pub value_type: Option<ValueType>,
    pub position: FilePosition,
}

/// A resolved `value-mod`: like an attribute modifier, but for the
/// positional text value, which always exists at most once per element.
#[derive(Clone, Debug)]
pub struct ValueModifier {
    pub specify: Option<Specification>,
    pub default: Option<Value>,
    pub position: FilePosition,
}
