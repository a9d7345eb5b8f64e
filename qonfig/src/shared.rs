use std::fmt;
use std::str::FromStr;

use crate::components::{ComponentTable, Ref};
use crate::element::{AddOn, ElementDef, ElementKernel};
use crate::position::FilePosition;
use crate::toolkit::ToolkitId;
use crate::value_type::{Value, ValueType};

pub type NCName = String;
pub type Sequence<T> = Vec<T>;
pub type Set<T> = Vec<T>;

/// Supertype of [element](ElementDef) and [add-on](AddOn) definitions.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ElementOrAddOn {
    Element(Ref<ElementDef>),
    AddOn(Ref<AddOn>),
}

impl ElementOrAddOn {
    pub fn element(self) -> Option<Ref<ElementDef>> {
        match self {
            Self::Element(element) => Some(element),
            Self::AddOn(_) => None,
        }
    }

    pub fn add_on(self) -> Option<Ref<AddOn>> {
        match self {
            Self::AddOn(add_on) => Some(add_on),
            Self::Element(_) => None,
        }
    }

    pub fn kernel(self, table: &impl ComponentTable) -> &ElementKernel {
        match self {
            Self::Element(element) => &element.get(table).kernel,
            Self::AddOn(add_on) => &add_on.get(table).kernel,
        }
    }

    pub fn name(self, table: &impl ComponentTable) -> &str {
        &self.kernel(table).name
    }

    pub fn declarer(self, table: &impl ComponentTable) -> ToolkitId {
        self.kernel(table).declarer
    }

    /// Whether a value of this type may stand where `self` is expected:
    /// elements walk the super-element chain, add-ons test inheritance.
    pub fn is_assignable_from(self, other: ElementOrAddOn, table: &impl ComponentTable) -> bool {
        match (self, other) {
            (Self::Element(a), Self::Element(b)) => ElementDef::is_assignable_from(a, b, table),
            (Self::AddOn(a), _) => AddOn::is_assignable_from(a, other, table),
            (Self::Element(_), Self::AddOn(_)) => false,
        }
    }
}

/// How a declared attribute or text value must be supplied.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Specification {
    Required,
    Optional,
    Forbidden,
}

impl FromStr for Specification {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("required") {
            Ok(Self::Required)
        } else if s.eq_ignore_ascii_case("optional") {
            Ok(Self::Optional)
        } else if s.eq_ignore_ascii_case("forbidden") {
            Ok(Self::Forbidden)
        } else {
            Err(format!(
                "{s:?} is not a specification (required|optional|forbidden)"
            ))
        }
    }
}

impl fmt::Display for Specification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Required => "required",
            Self::Optional => "optional",
            Self::Forbidden => "forbidden",
        };
        write!(f, "{s}")
    }
}

/// The full specification of an attribute or text value: its type, how it
/// must be supplied, and the default used when it is omitted.
#[derive(Clone, Debug)]
pub struct ValueSpec {
    pub value_type: ValueType,
    pub specify: Specification,
    pub default: Option<Value>,
    pub position: FilePosition,
}

/// A set of add-ons kept minimal under assignability: inserting an add-on
/// that a present entry already inherits is a no-op, and inserting a more
/// specific add-on drops the entries it subsumes. Iteration yields the
/// most-specific members.
///
/// Sizes are small, so a flat vector with linear deduplication is used.
#[derive(Clone, Debug, Default)]
pub struct InheritanceSet {
    entries: Vec<Ref<AddOn>>,
}

impl InheritanceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `add_on`, collapsing comparable entries. Returns `false` if
    /// the set already covered it.
    pub fn add(&mut self, add_on: Ref<AddOn>, table: &impl ComponentTable) -> bool {
        if self.contains(add_on, table) {
            return false;
        }
        self.entries
            .retain(|&e| !AddOn::is_assignable_from(e, ElementOrAddOn::AddOn(add_on), table));
        self.entries.push(add_on);
        true
    }

    pub fn union(&mut self, other: &InheritanceSet, table: &impl ComponentTable) {
        for &add_on in &other.entries {
            self.add(add_on, table);
        }
    }

    /// Whether the set covers `add_on`, directly or through a more specific
    /// entry.
    pub fn contains(&self, add_on: Ref<AddOn>, table: &impl ComponentTable) -> bool {
        self.entries
            .iter()
            .any(|&e| AddOn::is_assignable_from(add_on, ElementOrAddOn::AddOn(e), table))
    }

    /// The most-specific members.
    pub fn iter(&self) -> impl Iterator<Item = Ref<AddOn>> + '_ {
        self.entries.iter().copied()
    }

    /// Every add-on the set covers, subsumed ancestors included, in
    /// deterministic (name, ref) order.
    pub fn expand(&self, table: &impl ComponentTable) -> Vec<Ref<AddOn>> {
        let mut all = Vec::new();
        let mut queue = self.entries.clone();
        while let Some(add_on) = queue.pop() {
            if all.contains(&add_on) {
                continue;
            }
            all.push(add_on);
            queue.extend(add_on.get(table).kernel.full_inheritance.iter());
        }
        all.sort_by(|&a, &b| {
            let (an, bn) = (&a.get(table).kernel.name, &b.get(table).kernel.name);
            an.cmp(bn).then(a.cmp(&b))
        });
        all
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::ConstructionComponentTable;
    use crate::element::{AddOn, ElementDef, ElementKernel};

    fn kernel(name: &str, full_inheritance: InheritanceSet) -> ElementKernel {
        ElementKernel {
            declarer: ToolkitId(0),
            name: name.to_owned(),
            abstract_: false,
            super_element: None,
            declared_inheritance: full_inheritance.clone(),
            full_inheritance,
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
    fn element_assignability_is_reflexive_and_transitive() {
        let mut components = ConstructionComponentTable::new();
        let a = components.create(ElementDef {
            kernel: kernel("a", InheritanceSet::new()),
            promise: None,
        });
        let mut b_kernel = kernel("b", InheritanceSet::new());
        b_kernel.super_element = Some(a);
        let b = components.create(ElementDef {
            kernel: b_kernel,
            promise: None,
        });
        let mut c_kernel = kernel("c", InheritanceSet::new());
        c_kernel.super_element = Some(b);
        let c = components.create(ElementDef {
            kernel: c_kernel,
            promise: None,
        });

        for e in [a, b, c] {
            assert!(ElementDef::is_assignable_from(e, e, &components));
        }
        assert!(ElementDef::is_assignable_from(a, b, &components));
        assert!(ElementDef::is_assignable_from(b, c, &components));
        assert!(ElementDef::is_assignable_from(a, c, &components));
        assert!(!ElementDef::is_assignable_from(c, a, &components));
    }

    #[test]
    fn inheritance_set_collapses_to_most_specific() {
        let mut components = ConstructionComponentTable::new();
        let base = components.create(AddOn {
            kernel: kernel("base", InheritanceSet::new()),
            requires: None,
        });
        let mut derived_inheritance = InheritanceSet::new();
        derived_inheritance.add(base, &components);
        let derived = components.create(AddOn {
            kernel: kernel("derived", derived_inheritance),
            requires: None,
        });
        let unrelated = components.create(AddOn {
            kernel: kernel("unrelated", InheritanceSet::new()),
            requires: None,
        });

        let mut set = InheritanceSet::new();
        assert!(set.add(base, &components));
        assert!(set.add(derived, &components));
        // base is subsumed by derived
        assert_eq!(set.len(), 1);
        assert!(set.contains(base, &components));
        assert!(set.contains(derived, &components));
        // adding the subsumed ancestor again is a no-op
        assert!(!set.add(base, &components));

        assert!(set.add(unrelated, &components));
        assert_eq!(set.len(), 2);

        let expanded = set.expand(&components);
        assert_eq!(expanded.len(), 3);
    }
}
