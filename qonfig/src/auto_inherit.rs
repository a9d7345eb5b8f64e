use crate::child::ChildDef;
use crate::components::{ComponentTable, Ref};
use crate::element::{AddOn, ElementDef};
use crate::shared::InheritanceSet;
use crate::toolkit::Toolkit;

/// Incremental accumulator for the add-ons an element implicitly inherits.
///
/// Target types and roles are added as an element builder descends; each
/// addition re-queries every toolkit's auto-inheritance rules and absorbs
/// the matches, which may in turn surface new target types (an absorbed
/// add-on's required super element). Types and add-ons are finite and
/// addition is monotone, so the settle loop reaches a fixed point; running
/// it again on the same inputs adds nothing.
pub struct AutoInheritance<'a, T: ComponentTable> {
    toolkits: Vec<&'a Toolkit>,
    table: &'a T,
    target_types: Vec<Ref<ElementDef>>,
    roles: Vec<Ref<ChildDef>>,
    inheritance: InheritanceSet,
}

impl<'a, T: ComponentTable> AutoInheritance<'a, T> {
    pub fn new(toolkits: Vec<&'a Toolkit>, table: &'a T) -> Self {
        Self {
            toolkits,
            table,
            target_types: Vec::new(),
            roles: Vec::new(),
            inheritance: InheritanceSet::new(),
        }
    }

    pub fn add_target_type(&mut self, element_type: Ref<ElementDef>) {
        if self.target_types.contains(&element_type) {
            return;
        }
        self.target_types.push(element_type);
        self.settle();
    }

    pub fn add_role(&mut self, role: Ref<ChildDef>) {
        if self.roles.contains(&role) {
            return;
        }
        self.roles.push(role);
        let def = role.get(self.table);
        if let Some(child_type) = def.child_type {
            self.add_target_type(child_type);
        }
        // The role's inheritance and requirement add-ons contribute their
        // required super elements as target types; the add-ons themselves
        // are not implied (a requirement must be satisfied from elsewhere).
        let role_add_ons: Vec<_> = def
            .inheritance
            .iter()
            .chain(def.requirement.iter().copied())
            .collect();
        for add_on in role_add_ons {
            if let Some(required) = add_on.get(self.table).requires {
                self.add_target_type(required);
            }
        }
        self.settle();
    }

    /// The implicit add-on set accumulated so far.
    pub fn inheritance(&self) -> &InheritanceSet {
        &self.inheritance
    }

    fn settle(&mut self) {
        loop {
            let mut matched = Vec::new();
            for &element_type in &self.target_types {
                for tk in &self.toolkits {
                    matched.extend(tk.matching_auto_inheritance(
                        element_type,
                        &self.roles,
                        self.table,
                    ));
                }
            }
            let mut changed = false;
            for add_on in matched {
                changed |= self.absorb(add_on);
            }
            if !changed {
                break;
            }
        }
    }

    fn absorb(&mut self, add_on: Ref<AddOn>) -> bool {
        if !self.inheritance.add(add_on, self.table) {
            return false;
        }
        // The add-on's required super element is a new parent type
        if let Some(required) = add_on.get(self.table).requires {
            if !self.target_types.contains(&required) {
                self.target_types.push(required);
            }
        }
        for inherited in add_on
            .get(self.table)
            .kernel
            .full_inheritance
            .clone()
            .iter()
        {
            if let Some(required) = inherited.get(self.table).requires {
                if !self.target_types.contains(&required) {
                    self.target_types.push(required);
                }
            }
        }
        true
    }
}
