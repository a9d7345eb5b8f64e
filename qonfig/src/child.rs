use std::fmt;

use crate::components::{Component, ComponentTable, Ref};
use crate::element::{AddOn, ElementDef};
use crate::position::FilePosition;
use crate::shared::{ElementOrAddOn, InheritanceSet, NCName, Set};

/// Upper bound on a role's child count.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChildMax {
    Count(u32),
    Unbounded,
}

impl ChildMax {
    pub fn allows(self, count: usize) -> bool {
        match self {
            Self::Count(max) => count <= max as usize,
            Self::Unbounded => true,
        }
    }

    /// `a.at_most(b)`: the bound `a` admits no more children than `b`.
    pub fn at_most(self, other: ChildMax) -> bool {
        match (self, other) {
            (_, Self::Unbounded) => true,
            (Self::Unbounded, Self::Count(_)) => false,
            (Self::Count(a), Self::Count(b)) => a <= b,
        }
    }
}

impl fmt::Display for ChildMax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(max) => write!(f, "{max}"),
            Self::Unbounded => write!(f, "inf"),
        }
    }
}

/// A declared child role of an element or add-on.
#[derive(Clone, Debug)]
pub struct ChildDef {
    pub owner: ElementOrAddOn,
    pub name: NCName,
    /// Upper type bound on fulfilling elements; `None` admits any element.
    pub child_type: Option<Ref<ElementDef>>,
    /// Inherited roles this child satisfies in the owner's super or add-ons.
    pub fulfillment: Set<Ref<ChildDef>>,
    /// Add-ons every fulfilling element automatically inherits.
    pub inheritance: InheritanceSet,
    /// Abstract add-ons fulfilling elements must be given from elsewhere.
    pub requirement: Set<Ref<AddOn>>,
    pub min: u32,
    pub max: ChildMax,
    pub position: FilePosition,
}

impl Component for ChildDef {
    const DISPLAY_NAME: &'static str = "ChildDef";
}

impl ChildDef {
    pub fn qualified_name(ref_: Ref<ChildDef>, table: &impl ComponentTable) -> String {
        let def = ref_.get(table);
        format!("{}.{}", def.owner.name(table), def.name)
    }
}

/// `role.is_fulfilled_by(child)`: the child is the role itself, or names it
/// (transitively) in its fulfillment set.
pub fn role_fulfilled_by(
    role: Ref<ChildDef>,
    child: Ref<ChildDef>,
    table: &impl ComponentTable,
) -> bool {
    role == child
        || child
            .get(table)
            .fulfillment
            .iter()
            .any(|&f| role_fulfilled_by(role, f, table))
}

/// Where an effective child's data came from.
#[derive(Clone, Debug)]
pub enum ChildProvenance {
    Declared,
    Inherited {
        from: ElementOrAddOn,
    },
    Modified {
        by: ElementOrAddOn,
    },
    /// The inherited role is fulfilled by newly declared children and the
    /// inherited slot itself is closed.
    Overridden {
        overriders: Vec<Ref<ChildDef>>,
    },
}

/// One entry of a compiled child map. Identity is the declared root ref;
/// the remaining fields are the fully merged view.
#[derive(Clone, Debug)]
pub struct EffectiveChild {
    pub declared: Ref<ChildDef>,
    pub provenance: ChildProvenance,
    pub child_type: Option<Ref<ElementDef>>,
    pub inheritance: InheritanceSet,
    pub requirement: Set<Ref<AddOn>>,
    pub min: u32,
    pub max: ChildMax,
    pub position: FilePosition,
}

impl EffectiveChild {
    pub fn name<'t>(&self, table: &'t impl ComponentTable) -> &'t str {
        &self.declared.get(table).name
    }

    /// An overridden or `min=max=0` role admits no direct children.
    pub fn is_closed(&self) -> bool {
        matches!(self.provenance, ChildProvenance::Overridden { .. })
            || (self.min == 0 && self.max == ChildMax::Count(0))
    }
}

/// A resolved `child-mod`. Absent fields inherit; `min`/`max` may only
/// tighten the inherited bounds.
#[derive(Clone, Debug)]
pub struct ChildModifier {
    pub declared: Ref<ChildDef>,
    pub child_type: Option<Ref<ElementDef>>,
    pub inheritance: InheritanceSet,
    pub requirement: Set<Ref<AddOn>>,
    pub min: Option<u32>,
    pub max: Option<ChildMax>,
    pub position: FilePosition,
}
