//! Document parsing: builds a resolved, fully-inherited element tree
//! against a closed toolkit.

use std::ops::Index;

use roxmltree::Node;

use crate::attribute::AttributeDef;
use crate::auto_inherit::AutoInheritance;
use crate::child::{role_fulfilled_by, ChildDef, EffectiveChild};
use crate::components::{ComponentTable, Ref, ToolkitComponentTable};
use crate::element::{AddOn, ElementDef};
use crate::error::{CompositeError, ErrorReporting, Issue, IssueKind};
use crate::merge;
use crate::position::FilePosition;
use crate::promise::{self, ExternalResolver};
use crate::reference;
use crate::shared::{ElementOrAddOn, InheritanceSet, Sequence, Set, Specification, ValueSpec};
use crate::toolkit::Toolkit;
use crate::value_type::{Value, ValueType};

/// Index of a resolved element within its document's arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ElementId(pub u32);

impl ElementId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A resolved attribute value on a document element.
#[derive(Clone, Debug)]
pub struct AttributeValue {
    pub declared: Ref<AttributeDef>,
    pub value: Value,
    /// Whether the value was written in the document (as opposed to filled
    /// from the effective default).
    pub explicit: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PromiseKind {
    /// Loads a referenced document whose root fulfills this element's type.
    ExternalReference,
    /// Inside an external document: names a role whose content comes from
    /// the referring site.
    ChildPlaceholder,
}

/// Placeholder state of a promise element.
#[derive(Clone, Debug)]
pub struct ElementPromise {
    pub kind: PromiseKind,
    pub reference: Option<String>,
}

/// A resolved document element: its type, the roles it fulfills, its full
/// add-on inheritance, and its resolved attributes, value, and children.
#[derive(Clone, Debug)]
pub struct QonfigElement {
    pub element_type: Ref<ElementDef>,
    pub parent: Option<ElementId>,
    /// Every role of the parent this element fulfills, transitively.
    pub parent_roles: Set<Ref<ChildDef>>,
    /// The roles this element was directly placed in; a subset of
    /// `parent_roles`.
    pub declared_roles: Set<Ref<ChildDef>>,
    pub inheritance: InheritanceSet,
    pub attributes: Sequence<AttributeValue>,
    /// Attributes that did not resolve against this element's own type,
    /// kept raw; only populated on external-content roots and
    /// child-placeholders, which carry attributes for the elements they
    /// stand in for.
    pub extra_attributes: Sequence<(String, String, FilePosition)>,
    pub value: Option<Value>,
    pub children: Sequence<ElementId>,
    pub children_by_role: Sequence<(Ref<ChildDef>, Vec<ElementId>)>,
    pub position: FilePosition,
    pub promise: Option<ElementPromise>,
    /// Source position of stitched external content, if any.
    pub external_position: Option<FilePosition>,
}

impl QonfigElement {
    pub fn attribute_value(
        &self,
        name: &str,
        table: &impl ComponentTable,
    ) -> Option<&Value> {
        self.attributes
            .iter()
            .find(|a| a.declared.get(table).name == name)
            .map(|a| &a.value)
    }

    pub fn attribute_text(&self, name: &str, table: &impl ComponentTable) -> Option<String> {
        self.attribute_value(name, table).map(|v| v.to_string())
    }

    pub fn children_in_role(&self, role: Ref<ChildDef>) -> &[ElementId] {
        self.children_by_role
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, ids)| ids.as_slice())
            .unwrap_or(&[])
    }
}

/// A resolved document: an arena of elements rooted at
/// [`root()`](Self::root).
#[derive(Debug)]
pub struct QonfigDocument {
    pub location: Option<String>,
    pub(crate) elements: Vec<QonfigElement>,
    pub(crate) root: ElementId,
    pub warnings: Vec<Issue>,
}

impl QonfigDocument {
    pub fn root(&self) -> ElementId {
        self.root
    }

    pub fn element(&self, id: ElementId) -> &QonfigElement {
        &self.elements[id.index()]
    }

    pub fn elements(&self) -> impl Iterator<Item = (ElementId, &QonfigElement)> {
        self.elements
            .iter()
            .enumerate()
            .map(|(i, e)| (ElementId(i as u32), e))
    }

    /// Walks the parent back-links from `id` to the root.
    pub fn ancestry(&self, id: ElementId) -> Vec<ElementId> {
        let mut ancestry = vec![id];
        let mut current = self.element(id).parent;
        while let Some(parent) = current {
            ancestry.push(parent);
            current = self.element(parent).parent;
        }
        ancestry
    }
}

impl Index<ElementId> for QonfigDocument {
    type Output = QonfigElement;

    fn index(&self, id: ElementId) -> &QonfigElement {
        self.element(id)
    }
}

/// Parses and resolves a document against a closed toolkit, then stitches
/// any external-content promises through `externals`.
pub fn read_document(
    document: &roxmltree::Document,
    location: Option<&str>,
    toolkit: &Toolkit,
    table: &ToolkitComponentTable,
    externals: &[Box<dyn ExternalResolver>],
) -> Result<QonfigDocument, CompositeError> {
    let mut reporting = ErrorReporting::new();
    let mut parser = DocParser::new(toolkit, table, externals, location);
    let root = parser.resolve_element_node(
        document.root_element(),
        None,
        false,
        &mut reporting,
    );

    if let Some(root) = root {
        let mut expansion_stack = Vec::new();
        promise::stitch_promises(&mut parser, &mut reporting, &mut expansion_stack);
        let warnings = reporting.warnings_since(0);
        reporting.finish()?;
        Ok(QonfigDocument {
            location: location.map(str::to_owned),
            elements: parser.elements,
            root,
            warnings,
        })
    } else {
        Err(reporting
            .finish()
            .expect_err("root resolution failed without recording an error"))
    }
}

pub(crate) struct DocParser<'a> {
    pub(crate) toolkit: &'a Toolkit,
    pub(crate) table: &'a ToolkitComponentTable,
    pub(crate) externals: &'a [Box<dyn ExternalResolver>],
    pub(crate) location: Option<String>,
    pub(crate) elements: Vec<QonfigElement>,
    /// External-reference promise elements, in source order.
    pub(crate) promises: Vec<ElementId>,
    promise_add_on: Option<Ref<AddOn>>,
    child_placeholder: Option<Ref<ElementDef>>,
}

impl<'a> DocParser<'a> {
    pub(crate) fn new(
        toolkit: &'a Toolkit,
        table: &'a ToolkitComponentTable,
        externals: &'a [Box<dyn ExternalResolver>],
        location: Option<&str>,
    ) -> Self {
        let closure = toolkit.toolkit_closure();
        let reference_toolkit = closure
            .iter()
            .find(|tk| tk.name == reference::REFERENCE_TOOLKIT_NAME);
        let promise_add_on =
            reference_toolkit.and_then(|tk| tk.add_on(reference::PROMISE_ADD_ON));
        let child_placeholder = reference_toolkit
            .and_then(|tk| tk.element_def(reference::CHILD_PLACEHOLDER_ELEMENT));
        Self {
            toolkit,
            table,
            externals,
            location: location.map(str::to_owned),
            elements: Vec::new(),
            promises: Vec::new(),
            promise_add_on,
            child_placeholder,
        }
    }

    pub(crate) fn element(&self, id: ElementId) -> &QonfigElement {
        &self.elements[id.index()]
    }

    pub(crate) fn element_mut(&mut self, id: ElementId) -> &mut QonfigElement {
        &mut self.elements[id.index()]
    }

    fn position_of(&self, node: Node) -> FilePosition {
        FilePosition::of_node(node, self.location.as_deref())
    }

    /// The effective attribute map of an instance: the type's compiled map
    /// composed with the add-ons the instance carries beyond its type.
    pub(crate) fn instance_attributes(
        &self,
        element_type: Ref<ElementDef>,
        inheritance: &InheritanceSet,
        reporting: &mut ErrorReporting,
    ) -> Vec<crate::attribute::EffectiveAttribute> {
        let type_def = element_type.get(self.table);
        let extra = self.instance_add_ons(element_type, inheritance);
        merge::flatten_attributes(
            &type_def.kernel.all_attributes,
            None,
            &extra,
            None,
            &[],
            &[],
            reporting,
            self.table,
        )
    }

    pub(crate) fn instance_children(
        &self,
        element_type: Ref<ElementDef>,
        inheritance: &InheritanceSet,
        reporting: &mut ErrorReporting,
    ) -> Vec<EffectiveChild> {
        let type_def = element_type.get(self.table);
        let extra = self.instance_add_ons(element_type, inheritance);
        merge::flatten_children(
            &type_def.kernel.all_children,
            None,
            &extra,
            None,
            &[],
            &[],
            reporting,
            self.table,
        )
    }

    fn instance_value(
        &self,
        element_type: Ref<ElementDef>,
        inheritance: &InheritanceSet,
        reporting: &mut ErrorReporting,
    ) -> Option<ValueSpec> {
        let type_def = element_type.get(self.table);
        let extra = self.instance_add_ons(element_type, inheritance);
        merge::flatten_value(
            type_def.kernel.value.as_ref(),
            None,
            &extra,
            None,
            &format!("element {}", type_def.kernel.name),
            reporting,
            self.table,
        )
    }

    /// The add-ons the instance carries that its type does not already
    /// compile in, expanded and deterministically ordered.
    fn instance_add_ons(
        &self,
        element_type: Ref<ElementDef>,
        inheritance: &InheritanceSet,
    ) -> Vec<Ref<AddOn>> {
        let type_kernel = &element_type.get(self.table).kernel;
        inheritance
            .expand(self.table)
            .into_iter()
            .filter(|&a| !type_kernel.full_inheritance.contains(a, self.table))
            .collect()
    }

    /// Resolves one document element and, recursively, its children.
    /// Returns `None` if the element had to be skipped; the parent
    /// continues.
    pub(crate) fn resolve_element_node(
        &mut self,
        node: Node,
        parent: Option<(ElementId, &[EffectiveChild])>,
        lenient_root: bool,
        reporting: &mut ErrorReporting,
    ) -> Option<ElementId> {
        let position = self.position_of(node);
        let tag = node.tag_name();
        let qualified = match tag.namespace() {
            Some(alias) => format!("{alias}:{}", tag.name()),
            None => tag.name().to_owned(),
        };
        log::trace!("resolving element {qualified} at {position}");

        // 1. Element name -> element-def
        let Some(element_type) = self.toolkit.find_element(&qualified) else {
            reporting.error(
                IssueKind::UnknownReference,
                position,
                format!("{qualified} does not name an element in scope"),
            );
            return None;
        };
        let type_def = element_type.get(self.table);
        if type_def.kernel.abstract_ {
            reporting.error(
                IssueKind::UnknownReference,
                position,
                format!("{qualified} is abstract and cannot be instantiated"),
            );
            return None;
        }

        // 2. Candidate parent roles
        let mut declared_roles: Vec<Ref<ChildDef>> = Vec::new();
        let mut parent_roles: Vec<Ref<ChildDef>> = Vec::new();
        let mut role_inheritance = InheritanceSet::new();
        if let Some((_, parent_children)) = parent {
            let selected = self.match_parent_roles(
                node.attribute("role"),
                tag.name(),
                element_type,
                parent_children,
                &position,
                reporting,
            )?;
            for entry in &selected {
                declared_roles.push(entry.declared);
                role_inheritance.union(&entry.inheritance, self.table);
            }
            parent_roles = declared_roles.clone();
            for entry in parent_children {
                if parent_roles.contains(&entry.declared) {
                    continue;
                }
                if declared_roles
                    .iter()
                    .any(|&d| role_fulfilled_by(entry.declared, d, self.table))
                {
                    parent_roles.push(entry.declared);
                }
            }
        }

        // 3. Explicit add-ons from with-extension
        let mut inheritance = role_inheritance;
        if let Some(extensions) = node.attribute("with-extension") {
            for name in extensions.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let Some(add_on) = self.toolkit.find_add_on(name) else {
                    reporting.error(
                        IssueKind::UnknownReference,
                        position.clone(),
                        format!("{name} does not name an add-on in scope"),
                    );
                    continue;
                };
                let add_on_def = add_on.get(self.table);
                if add_on_def.kernel.abstract_ {
                    reporting.error(
                        IssueKind::UnknownReference,
                        position.clone(),
                        format!("add-on {name} is abstract and cannot be applied directly"),
                    );
                    continue;
                }
                if let Some(required) = add_on_def.requires {
                    if !ElementDef::is_assignable_from(required, element_type, self.table) {
                        reporting.error(
                            IssueKind::InheritanceConflict,
                            position.clone(),
                            format!(
                                "add-on {name} requires {} but {qualified} does not inherit it",
                                required.get(self.table).kernel.name
                            ),
                        );
                        continue;
                    }
                }
                inheritance.add(add_on, self.table);
            }
        }

        // 4. Auto-inheritance, computed before attributes and children
        let closure = self.toolkit.toolkit_closure();
        let mut engine = AutoInheritance::new(closure, self.table);
        for &role in &declared_roles {
            engine.add_role(role);
        }
        engine.add_target_type(element_type);
        for add_on in engine.inheritance().clone().iter() {
            if let Some(required) = add_on.get(self.table).requires {
                if !ElementDef::is_assignable_from(required, element_type, self.table) {
                    reporting.error(
                        IssueKind::InheritanceConflict,
                        position.clone(),
                        format!(
                            "auto-inherited add-on {} requires {} but {qualified} does not \
                             inherit it",
                            add_on.get(self.table).kernel.name,
                            required.get(self.table).kernel.name
                        ),
                    );
                    continue;
                }
            }
            inheritance.add(add_on, self.table);
        }

        let lenient = lenient_root
            || self
                .child_placeholder
                .is_some_and(|cp| cp == element_type);

        // 5. Attributes against the instance-effective map
        let instance_attrs = self.instance_attributes(element_type, &inheritance, reporting);
        let mut attributes: Vec<AttributeValue> = Vec::new();
        let mut extra_attributes = Vec::new();
        for attr in node.attributes() {
            let name = attr.name();
            if name == "with-extension" || name == "role" {
                continue;
            }
            let Some(entry) = instance_attrs
                .iter()
                .find(|e| e.declared.get(self.table).name == name)
            else {
                if lenient {
                    extra_attributes.push((
                        name.to_owned(),
                        attr.value().to_owned(),
                        position.clone(),
                    ));
                } else {
                    reporting.error(
                        IssueKind::UnknownReference,
                        position.clone(),
                        format!("{qualified} has no attribute named {name}"),
                    );
                }
                continue;
            };
            if entry.spec.specify == Specification::Forbidden {
                reporting.error(
                    IssueKind::InheritanceConflict,
                    position.clone(),
                    format!("attribute {name} is forbidden on {qualified}"),
                );
                continue;
            }
            if let Some(value) = self.parse_attribute_value(
                &entry.spec.value_type,
                attr.value(),
                name,
                &position,
                reporting,
            ) {
                attributes.push(AttributeValue {
                    declared: entry.declared,
                    value,
                    explicit: true,
                });
            }
        }
        for entry in &instance_attrs {
            let name = &entry.declared.get(self.table).name;
            if attributes.iter().any(|a| a.declared == entry.declared) {
                continue;
            }
            match entry.spec.specify {
                Specification::Required => reporting.error(
                    IssueKind::Cardinality,
                    position.clone(),
                    format!("attribute {name} required on {qualified}"),
                ),
                Specification::Optional => {
                    if let Some(default) = &entry.spec.default {
                        attributes.push(AttributeValue {
                            declared: entry.declared,
                            value: default.clone(),
                            explicit: false,
                        });
                    }
                }
                Specification::Forbidden => {}
            }
        }

        // 6. Text value
        let text: String = node
            .children()
            .filter(|c| c.is_text())
            .filter_map(|c| c.text())
            .collect();
        let text = text.trim();
        let value_spec = self.instance_value(element_type, &inheritance, reporting);
        let value = match (&value_spec, text.is_empty()) {
            (Some(spec), false) => {
                if spec.specify == Specification::Forbidden {
                    reporting.error(
                        IssueKind::InheritanceConflict,
                        position.clone(),
                        format!("{qualified} may not have a value"),
                    );
                    None
                } else {
                    self.parse_attribute_value(
                        &spec.value_type,
                        text,
                        "value",
                        &position,
                        reporting,
                    )
                }
            }
            (Some(spec), true) => {
                if spec.specify == Specification::Required && spec.default.is_none() {
                    reporting.error(
                        IssueKind::Cardinality,
                        position.clone(),
                        format!("{qualified} requires a value"),
                    );
                }
                spec.default.clone()
            }
            (None, false) => {
                reporting.error(
                    IssueKind::UnknownReference,
                    position.clone(),
                    format!("{qualified} does not accept a value"),
                );
                None
            }
            (None, true) => None,
        };

        // 8. Promise detection (before children so placeholders defer)
        let promise = self.detect_promise(element_type, &inheritance, &attributes);

        let id = ElementId(self.elements.len() as u32);
        self.elements.push(QonfigElement {
            element_type,
            parent: parent.map(|(p, _)| p),
            parent_roles,
            declared_roles,
            inheritance: inheritance.clone(),
            attributes,
            extra_attributes,
            value,
            children: Vec::new(),
            children_by_role: Vec::new(),
            position: position.clone(),
            promise: promise.clone(),
            external_position: None,
        });

        // 7. Children, in source order
        let instance_children = self.instance_children(element_type, &inheritance, reporting);
        let mut children = Vec::new();
        for child_node in node.children().filter(Node::is_element) {
            if let Some(child_id) =
                self.resolve_element_node(child_node, Some((id, &instance_children)), false, reporting)
            {
                children.push(child_id);
            }
        }
        let children_by_role = self.group_children_by_role(&children);
        {
            let element = self.element_mut(id);
            element.children = children;
            element.children_by_role = children_by_role;
        }

        let defer_roles = matches!(
            &promise,
            Some(p) if p.kind == PromiseKind::ExternalReference
        );
        if defer_roles {
            self.promises.push(id);
        } else {
            self.verify_roles(id, &instance_children, reporting);
        }

        Some(id)
    }

    /// Selects the parent roles a child element is placed in: the `role`
    /// attribute if present, else roles sharing the element's name, else
    /// roles whose type bound admits the element.
    fn match_parent_roles(
        &self,
        role_attr: Option<&str>,
        tag_name: &str,
        element_type: Ref<ElementDef>,
        parent_children: &[EffectiveChild],
        position: &FilePosition,
        reporting: &mut ErrorReporting,
    ) -> Option<Vec<EffectiveChild>> {
        if let Some(role_name) = role_attr {
            let found = parent_children.iter().find(|e| {
                e.name(self.table) == role_name
                    || ChildDef::qualified_name(e.declared, self.table) == role_name
            });
            return match found {
                Some(entry) if entry.is_closed() => {
                    reporting.error(
                        IssueKind::Cardinality,
                        position.clone(),
                        format!("role {role_name} admits no children here"),
                    );
                    None
                }
                Some(entry) => Some(vec![entry.clone()]),
                None => {
                    reporting.error(
                        IssueKind::UnknownReference,
                        position.clone(),
                        format!("{role_name} does not name a role of the parent"),
                    );
                    None
                }
            };
        }

        let name_matched: Vec<_> = parent_children
            .iter()
            .filter(|e| e.name(self.table) == tag_name)
            .cloned()
            .collect();
        if !name_matched.is_empty() {
            if let Some(closed) = name_matched.iter().find(|e| e.is_closed()) {
                reporting.error(
                    IssueKind::Cardinality,
                    position.clone(),
                    format!(
                        "role {} admits no children here",
                        closed.name(self.table)
                    ),
                );
                return None;
            }
            return Some(name_matched);
        }

        let type_matched: Vec<_> = parent_children
            .iter()
            .filter(|e| !e.is_closed())
            .filter(|e| match e.child_type {
                Some(bound) => {
                    ElementDef::is_assignable_from(bound, element_type, self.table)
                }
                None => true,
            })
            .cloned()
            .collect();
        if type_matched.is_empty() {
            reporting.error(
                IssueKind::UnknownReference,
                position.clone(),
                format!(
                    "{} does not fulfill any role of the parent",
                    element_type.get(self.table).kernel.name
                ),
            );
            return None;
        }
        Some(type_matched)
    }

    pub(crate) fn parse_attribute_value(
        &self,
        value_type: &ValueType,
        text: &str,
        name: &str,
        position: &FilePosition,
        reporting: &mut ErrorReporting,
    ) -> Option<Value> {
        match value_type.parse(text) {
            Ok(parse) => {
                for warning in parse.warnings {
                    reporting.warn(IssueKind::TypeCoercion, position.clone(), warning);
                }
                // Add-on-bounded values resolve against the toolkit here,
                // where it is in scope.
                if let (ValueType::AddOnRef { add_on: bound, .. }, Value::AddOn(add_on_name)) =
                    (value_type, &parse.value)
                {
                    match self.toolkit.find_add_on(add_on_name) {
                        Some(named) => {
                            if !AddOn::is_assignable_from(
                                *bound,
                                ElementOrAddOn::AddOn(named),
                                self.table,
                            ) {
                                reporting.error(
                                    IssueKind::TypeCoercion,
                                    position.clone(),
                                    format!(
                                        "{add_on_name} does not inherit {}",
                                        bound.get(self.table).kernel.name
                                    ),
                                );
                                return None;
                            }
                        }
                        None => {
                            reporting.error(
                                IssueKind::UnknownReference,
                                position.clone(),
                                format!("{add_on_name} does not name an add-on in scope"),
                            );
                            return None;
                        }
                    }
                }
                Some(parse.value)
            }
            Err(message) => {
                reporting.error(
                    IssueKind::TypeCoercion,
                    position.clone(),
                    format!("invalid {name}: {message}"),
                );
                None
            }
        }
    }

    fn detect_promise(
        &self,
        element_type: Ref<ElementDef>,
        inheritance: &InheritanceSet,
        attributes: &[AttributeValue],
    ) -> Option<ElementPromise> {
        if let Some(placeholder) = self.child_placeholder {
            if ElementDef::is_assignable_from(placeholder, element_type, self.table) {
                let reference = attributes
                    .iter()
                    .find(|a| {
                        a.declared.get(self.table).name == reference::REF_ROLE_ATTRIBUTE
                    })
                    .map(|a| a.value.to_string());
                return Some(ElementPromise {
                    kind: PromiseKind::ChildPlaceholder,
                    reference,
                });
            }
        }
        let marked = element_type.get(self.table).promise.is_some()
            || self
                .promise_add_on
                .is_some_and(|p| inheritance.contains(p, self.table));
        if marked {
            let reference = attributes
                .iter()
                .find(|a| a.declared.get(self.table).name == reference::REF_ATTRIBUTE)
                .map(|a| a.value.to_string());
            return Some(ElementPromise {
                kind: PromiseKind::ExternalReference,
                reference,
            });
        }
        None
    }

    pub(crate) fn group_children_by_role(
        &self,
        children: &[ElementId],
    ) -> Vec<(Ref<ChildDef>, Vec<ElementId>)> {
        let mut by_role: Vec<(Ref<ChildDef>, Vec<ElementId>)> = Vec::new();
        for &child_id in children {
            for &role in &self.element(child_id).declared_roles {
                match by_role.iter_mut().find(|(r, _)| *r == role) {
                    Some((_, ids)) => ids.push(child_id),
                    None => by_role.push((role, vec![child_id])),
                }
            }
        }
        by_role
    }

    /// Checks every effective role's `[min, max]` against the grouped
    /// children, and that requirement add-ons are actually inherited by the
    /// fulfilling children.
    pub(crate) fn verify_roles(
        &self,
        id: ElementId,
        instance_children: &[EffectiveChild],
        reporting: &mut ErrorReporting,
    ) {
        let element = self.element(id);
        for entry in instance_children {
            let name = entry.name(self.table);
            let in_role = element.children_in_role(entry.declared);
            let count = in_role.len();
            if count < entry.min as usize || !entry.max.allows(count) {
                reporting.error(
                    IssueKind::Cardinality,
                    element.position.clone(),
                    format!(
                        "role {name} requires between {} and {} children, found {count}",
                        entry.min, entry.max
                    ),
                );
            }
            for &required in &entry.requirement {
                for &child_id in in_role {
                    let child = self.element(child_id);
                    if !child.inheritance.contains(required, self.table) {
                        reporting.error(
                            IssueKind::InheritanceConflict,
                            child.position.clone(),
                            format!(
                                "child in role {name} must inherit {}",
                                required.get(self.table).kernel.name
                            ),
                        );
                    }
                }
            }
        }
    }
}
