use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::child::ChildDef;
use crate::components::{ComponentTable, Ref};
use crate::element::{AddOn, ElementDef};
use crate::error::Issue;
use crate::position::FilePosition;
use crate::shared::{ElementOrAddOn, InheritanceSet, NCName};
use crate::value_type::ValueType;

/// Index of a toolkit within its session's component table.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ToolkitId(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ToolkitVersion {
    pub major: u32,
    pub minor: u32,
}

impl ToolkitVersion {
    /// Whether a toolkit of this version satisfies a dependency on
    /// `requested`: same major, at least the requested minor.
    pub fn satisfies(self, requested: ToolkitVersion) -> bool {
        self.major == requested.major && self.minor >= requested.minor
    }
}

impl FromStr for ToolkitVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix('v').unwrap_or(s);
        let (major, minor) = s
            .split_once('.')
            .ok_or_else(|| format!("{s:?} is not a version (expected M.m)"))?;
        let parse = |part: &str| {
            part.parse::<u32>()
                .map_err(|_| format!("{s:?} is not a version (expected M.m)"))
        };
        Ok(Self {
            major: parse(major)?,
            minor: parse(minor)?,
        })
    }
}

impl fmt::Display for ToolkitVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Identity of a toolkit, stored in the component table so components can
/// name their declarer in diagnostics.
#[derive(Clone, Debug)]
pub struct ToolkitInfo {
    pub name: String,
    pub version: ToolkitVersion,
    pub location: Option<String>,
}

/// One auto-inheritance rule: the add-ons to apply and the (type, role)
/// targets that trigger them.
#[derive(Clone, Debug)]
pub struct AutoInheritanceRule {
    pub inheritance: InheritanceSet,
    pub targets: Vec<AutoInheritTarget>,
    pub position: FilePosition,
}

#[derive(Clone, Debug)]
pub struct AutoInheritTarget {
    pub element_type: Option<Ref<ElementDef>>,
    pub role: Option<Ref<ChildDef>>,
}

impl AutoInheritTarget {
    /// A target matches an element type under a set of roles iff its type
    /// bound (if any) admits the element and its role (if any) is fulfilled
    /// by one of the roles.
    pub fn matches(
        &self,
        element_type: Ref<ElementDef>,
        roles: &[Ref<ChildDef>],
        table: &impl ComponentTable,
    ) -> bool {
        if let Some(bound) = self.element_type {
            if !ElementDef::is_assignable_from(bound, element_type, table) {
                return false;
            }
        }
        if let Some(target_role) = self.role {
            let target_owner = target_role.get(table).owner;
            return roles.iter().any(|&r| {
                target_owner.is_assignable_from(r.get(table).owner, table)
                    && crate::child::role_fulfilled_by(target_role, r, table)
            });
        }
        true
    }
}

/// A closed, immutable toolkit: a named and versioned vocabulary of value
/// types, element-defs, and add-ons, plus auto-inheritance rules and the
/// dependency toolkits its declarations may refer to.
///
/// All component refs resolve against the session's
/// [`ToolkitComponentTable`](crate::components::ToolkitComponentTable).
#[derive(Clone, Debug)]
pub struct Toolkit {
    pub id: ToolkitId,
    pub name: String,
    pub version: ToolkitVersion,
    pub location: Option<String>,
    pub(crate) value_types: BTreeMap<NCName, ValueType>,
    pub(crate) element_defs: BTreeMap<NCName, Ref<ElementDef>>,
    pub(crate) add_ons: BTreeMap<NCName, Ref<AddOn>>,
    pub(crate) auto_inheritance: Vec<AutoInheritanceRule>,
    /// Dependencies keyed by local alias (the dependency's declared name).
    pub(crate) dependencies: BTreeMap<String, Arc<Toolkit>>,
    /// Warnings recorded while this toolkit was built.
    pub warnings: Vec<Issue>,
}

impl Toolkit {
    pub fn element_def(&self, name: &str) -> Option<Ref<ElementDef>> {
        self.element_defs.get(name).copied()
    }

    pub fn add_on(&self, name: &str) -> Option<Ref<AddOn>> {
        self.add_ons.get(name).copied()
    }

    pub fn value_type(&self, name: &str) -> Option<&ValueType> {
        self.value_types.get(name)
    }

    pub fn element_defs(&self) -> impl Iterator<Item = (&str, Ref<ElementDef>)> {
        self.element_defs.iter().map(|(n, &r)| (n.as_str(), r))
    }

    pub fn add_ons(&self) -> impl Iterator<Item = (&str, Ref<AddOn>)> {
        self.add_ons.iter().map(|(n, &r)| (n.as_str(), r))
    }

    pub fn dependencies(&self) -> impl Iterator<Item = (&str, &Arc<Toolkit>)> {
        self.dependencies.iter().map(|(a, t)| (a.as_str(), t))
    }

    pub fn auto_inheritance_rules(&self) -> &[AutoInheritanceRule] {
        &self.auto_inheritance
    }

    /// Resolves `name` or `alias:name` to an element-def, searching this
    /// toolkit first, then its dependencies in alias order.
    pub fn find_element(&self, qualified: &str) -> Option<Ref<ElementDef>> {
        self.find(qualified, &|tk, name| tk.element_def(name))
    }

    /// Resolves `name` or `alias:name` to an add-on.
    pub fn find_add_on(&self, qualified: &str) -> Option<Ref<AddOn>> {
        self.find(qualified, &|tk, name| tk.add_on(name))
    }

    /// Resolves `name` or `alias:name` to a value type.
    pub fn find_value_type(&self, qualified: &str) -> Option<ValueType> {
        self.find(qualified, &|tk, name| tk.value_type(name).cloned())
    }

    fn find<T>(&self, qualified: &str, get: &dyn Fn(&Toolkit, &str) -> Option<T>) -> Option<T> {
        if let Some((alias, name)) = qualified.split_once(':') {
            if alias == self.name {
                return get(self, name);
            }
            return self
                .dependencies
                .get(alias)
                .and_then(|dep| dep.find(name, get));
        }
        if let Some(found) = get(self, qualified) {
            return Some(found);
        }
        self.dependencies
            .values()
            .find_map(|dep| dep.find(qualified, get))
    }

    /// Resolves `owner.role` to the declared root of one of `owner`'s
    /// effective child roles.
    pub fn find_role(&self, spec: &str, table: &impl ComponentTable) -> Option<Ref<ChildDef>> {
        let (owner_name, role_name) = spec.rsplit_once('.')?;
        let owner = if let Some(element) = self.find_element(owner_name) {
            ElementOrAddOn::Element(element)
        } else {
            ElementOrAddOn::AddOn(self.find_add_on(owner_name)?)
        };
        owner
            .kernel(table)
            .child_by_name(role_name, table)
            .map(|c| c.declared)
    }

    /// The add-ons this toolkit's own rules assign to `element_type` under
    /// `roles`.
    pub fn matching_auto_inheritance(
        &self,
        element_type: Ref<ElementDef>,
        roles: &[Ref<ChildDef>],
        table: &impl ComponentTable,
    ) -> Vec<Ref<AddOn>> {
        let mut matched = Vec::new();
        for rule in &self.auto_inheritance {
            if rule
                .targets
                .iter()
                .any(|t| t.matches(element_type, roles, table))
            {
                for add_on in rule.inheritance.iter() {
                    if !matched.contains(&add_on) {
                        matched.push(add_on);
                    }
                }
            }
        }
        matched
    }

    /// This toolkit and every transitive dependency, deduplicated by id.
    pub fn toolkit_closure(&self) -> Vec<&Toolkit> {
        let mut closure: Vec<&Toolkit> = Vec::new();
        let mut queue: Vec<&Toolkit> = vec![self];
        while let Some(tk) = queue.pop() {
            if closure.iter().any(|c| c.id == tk.id) {
                continue;
            }
            closure.push(tk);
            queue.extend(tk.dependencies.values().map(Arc::as_ref));
        }
        closure
    }
}
