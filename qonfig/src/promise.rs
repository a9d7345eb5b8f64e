//! Late binding of external content into promise placeholders.
//!
//! An external-reference element defers its content to a referenced
//! document whose root is an `external-content` fulfilling the element's
//! type. Child placeholders inside that content are filled from the
//! referring site's own children. Expansion keeps a stack of
//! (document, fulfilling type) pairs; a repeat on the stack is a cycle.

use crate::child::role_fulfilled_by;
use crate::components::{ComponentTable, Ref};
use crate::document::{AttributeValue, DocParser, ElementId, PromiseKind};
use crate::element::ElementDef;
use crate::error::{ErrorReporting, IssueKind, ResolveError};
use crate::position::FilePosition;
use crate::reference;
use crate::shared::Specification;

/// Loads the raw text of a document referenced by a promise element.
/// Returns the text and the location it was loaded from.
pub trait ExternalResolver {
    fn resolve(
        &self,
        reference: &str,
        relative_to: Option<&str>,
    ) -> Result<(String, String), ResolveError>;
}

pub(crate) fn stitch_promises(
    parser: &mut DocParser,
    reporting: &mut ErrorReporting,
    stack: &mut Vec<(String, Ref<ElementDef>)>,
) {
    let promises = std::mem::take(&mut parser.promises);
    for id in promises {
        stitch_external_reference(parser, id, reporting, stack);
    }
}

fn stitch_external_reference(
    parser: &mut DocParser,
    id: ElementId,
    reporting: &mut ErrorReporting,
    stack: &mut Vec<(String, Ref<ElementDef>)>,
) {
    let (element_type, position, reference) = {
        let element = parser.element(id);
        let reference = element
            .promise
            .as_ref()
            .and_then(|p| p.reference.clone());
        (element.element_type, element.position.clone(), reference)
    };
    let type_name = element_type.get(parser.table).kernel.name.clone();

    let Some(reference) = reference else {
        reporting.error(
            IssueKind::Promise,
            position,
            format!("promise element {type_name} carries no reference"),
        );
        return;
    };

    // Load the referenced document text
    let mut resolved = None;
    let mut failures: Vec<ResolveError> = Vec::new();
    for resolver in parser.externals {
        match resolver.resolve(&reference, parser.location.as_deref()) {
            Ok(found) => {
                resolved = Some(found);
                break;
            }
            Err(e) => failures.push(e),
        }
    }
    let Some((text, ext_location)) = resolved else {
        reporting.error(
            IssueKind::Promise,
            position,
            format!(
                "could not resolve external reference {reference:?}: {}",
                failures
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ")
            ),
        );
        return;
    };

    let ext_document = match roxmltree::Document::parse(&text) {
        Ok(document) => document,
        Err(e) => {
            reporting.error(
                IssueKind::Promise,
                position,
                format!("malformed external document {ext_location}: {e}"),
            );
            return;
        }
    };

    // Resolve the external tree against the same toolkit
    let mut nested = DocParser::new(
        parser.toolkit,
        parser.table,
        parser.externals,
        Some(&ext_location),
    );
    let Some(ext_root) =
        nested.resolve_element_node(ext_document.root_element(), None, true, reporting)
    else {
        reporting.error(
            IssueKind::Promise,
            position,
            format!("external document {ext_location} did not resolve"),
        );
        return;
    };

    let ext_root_position = nested.element(ext_root).position.clone();
    let external_content = parser
        .toolkit
        .find_element(reference::EXTERNAL_CONTENT_ELEMENT);
    let root_is_content = external_content.is_some_and(|ec| {
        ElementDef::is_assignable_from(ec, nested.element(ext_root).element_type, parser.table)
    });
    if !root_is_content {
        reporting.error(
            IssueKind::Promise,
            position,
            format!(
                "root of {ext_location} (at {ext_root_position}) is not an external-content \
                 element"
            ),
        );
        return;
    }

    let fulfills_name = nested
        .element(ext_root)
        .attribute_text(reference::FULFILLS_ATTRIBUTE, parser.table)
        .unwrap_or_default();
    let Some(fulfills) = parser.toolkit.find_element(&fulfills_name) else {
        reporting.error(
            IssueKind::Promise,
            ext_root_position,
            format!("fulfills target {fulfills_name:?} does not name an element in scope"),
        );
        return;
    };
    if !ElementDef::is_assignable_from(fulfills, element_type, parser.table) {
        reporting.error(
            IssueKind::Promise,
            position.clone(),
            format!(
                "external content at {ext_root_position} fulfills {fulfills_name}, which \
                 {type_name} is not assignable to"
            ),
        );
        return;
    }

    let key = (ext_location.clone(), fulfills);
    if stack.contains(&key) {
        reporting.error(
            IssueKind::Promise,
            position,
            format!("external content cycle through {ext_location} fulfilling {fulfills_name}"),
        );
        return;
    }
    stack.push(key);
    stitch_promises(&mut nested, reporting, stack);
    stack.pop();

    // The referring site's original children feed the placeholders inside
    // the external content; the external root's children replace them.
    let referring_children = parser.element(id).children.clone();
    let ext_children = nested.element(ext_root).children.clone();

    // Inheritance of the external root joins the placeholder's
    let ext_inheritance = nested.element(ext_root).inheritance.clone();
    {
        let table = parser.table;
        let element = parser.element_mut(id);
        element.inheritance.union(&ext_inheritance, table);
        element.external_position = Some(ext_root_position.clone());
    }
    let inheritance = parser.element(id).inheritance.clone();

    // Attributes carried by the external root for the fulfilled type; the
    // placeholder's own explicit attributes win on overlap.
    let instance_attrs = parser.instance_attributes(element_type, &inheritance, reporting);
    let ext_attrs = nested.element(ext_root).extra_attributes.clone();
    let mut updates: Vec<AttributeValue> = Vec::new();
    for (name, text, attr_position) in &ext_attrs {
        let Some(entry) = instance_attrs
            .iter()
            .find(|e| &e.declared.get(parser.table).name == name)
        else {
            reporting.error(
                IssueKind::UnknownReference,
                attr_position.clone(),
                format!("{type_name} has no attribute named {name}"),
            );
            continue;
        };
        let already_explicit = parser
            .element(id)
            .attributes
            .iter()
            .any(|a| a.declared == entry.declared && a.explicit);
        if already_explicit {
            continue;
        }
        if entry.spec.specify == Specification::Forbidden {
            reporting.error(
                IssueKind::InheritanceConflict,
                attr_position.clone(),
                format!("attribute {name} is forbidden on {type_name}"),
            );
            continue;
        }
        if let Some(value) =
            parser.parse_attribute_value(&entry.spec.value_type, text, name, attr_position, reporting)
        {
            updates.push(AttributeValue {
                declared: entry.declared,
                value,
                explicit: true,
            });
        }
    }
    {
        let element = parser.element_mut(id);
        for update in updates {
            match element
                .attributes
                .iter_mut()
                .find(|a| a.declared == update.declared)
            {
                Some(existing) => *existing = update,
                None => element.attributes.push(update),
            }
        }
    }
    // Required attributes must be present from one side or the other
    for entry in &instance_attrs {
        if entry.spec.specify == Specification::Required
            && !parser
                .element(id)
                .attributes
                .iter()
                .any(|a| a.declared == entry.declared)
        {
            reporting.error(
                IssueKind::Cardinality,
                position.clone(),
                format!(
                    "attribute {} required on {type_name} (external content at \
                     {ext_root_position})",
                    entry.declared.get(parser.table).name
                ),
            );
        }
    }

    // Children: external content replaces the placeholder's own
    let mut new_children = Vec::new();
    for &ext_child in &ext_children {
        new_children.extend(copy_from_external(
            parser,
            &nested,
            ext_child,
            id,
            &referring_children,
            reporting,
        ));
    }
    let instance_children = parser.instance_children(element_type, &inheritance, reporting);
    let mut placed = Vec::new();
    for &child_id in &new_children {
        if assign_roles_by_type(parser, child_id, &instance_children, reporting) {
            placed.push(child_id);
        }
    }
    let children_by_role = parser.group_children_by_role(&placed);
    {
        let element = parser.element_mut(id);
        element.children = placed;
        element.children_by_role = children_by_role;
    }
    parser.verify_roles(id, &instance_children, reporting);
}

/// Copies one element of the external tree into the referring document,
/// expanding child placeholders from the referring site's children.
fn copy_from_external(
    parser: &mut DocParser,
    src: &DocParser,
    src_id: ElementId,
    parent: ElementId,
    referring_children: &[ElementId],
    reporting: &mut ErrorReporting,
) -> Vec<ElementId> {
    let src_element = src.element(src_id).clone();

    if matches!(
        &src_element.promise,
        Some(p) if p.kind == PromiseKind::ChildPlaceholder
    ) {
        return expand_placeholder(parser, &src_element, parent, referring_children, reporting);
    }

    let new_id = ElementId(parser.elements.len() as u32);
    let mut copied = src_element.clone();
    copied.parent = Some(parent);
    copied.children = Vec::new();
    copied.children_by_role = Vec::new();
    parser.elements.push(copied);

    let mut new_children = Vec::new();
    for &src_child in &src_element.children {
        new_children.extend(copy_from_external(
            parser,
            src,
            src_child,
            new_id,
            referring_children,
            reporting,
        ));
    }
    // Placeholder expansion can change the child set, so roles are
    // re-matched and cardinality re-verified at every copied level.
    let (element_type, inheritance) = {
        let e = parser.element(new_id);
        (e.element_type, e.inheritance.clone())
    };
    let instance_children = parser.instance_children(element_type, &inheritance, reporting);
    let mut placed = Vec::new();
    for &child_id in &new_children {
        if assign_roles_by_type(parser, child_id, &instance_children, reporting) {
            placed.push(child_id);
        }
    }
    let children_by_role = parser.group_children_by_role(&placed);
    {
        let element = parser.element_mut(new_id);
        element.children = placed;
        element.children_by_role = children_by_role;
    }
    parser.verify_roles(new_id, &instance_children, reporting);

    vec![new_id]
}

/// Replaces a child placeholder with copies of the referring site's
/// children in the named role, applying the placeholder's attributes as
/// overrides.
fn expand_placeholder(
    parser: &mut DocParser,
    placeholder: &crate::document::QonfigElement,
    parent: ElementId,
    referring_children: &[ElementId],
    reporting: &mut ErrorReporting,
) -> Vec<ElementId> {
    let position = placeholder.position.clone();
    let Some(role_spec) = placeholder
        .promise
        .as_ref()
        .and_then(|p| p.reference.clone())
    else {
        reporting.error(
            IssueKind::Promise,
            position,
            "child-placeholder carries no ref-role".to_owned(),
        );
        return Vec::new();
    };
    let Some(role) = parser.toolkit.find_role(&role_spec, parser.table) else {
        reporting.error(
            IssueKind::Promise,
            position,
            format!("{role_spec} does not name a role in scope"),
        );
        return Vec::new();
    };

    let selected: Vec<ElementId> = referring_children
        .iter()
        .copied()
        .filter(|&child_id| {
            parser
                .element(child_id)
                .parent_roles
                .iter()
                .any(|&r| role_fulfilled_by(role, r, parser.table))
        })
        .collect();

    let mut copies = Vec::new();
    for referred in selected {
        let copy_id = duplicate_local(parser, referred, parent);
        apply_attribute_overrides(parser, copy_id, &placeholder.extra_attributes, reporting);
        copies.push(copy_id);
    }
    copies
}

/// Deep-copies a subtree within the same document arena.
fn duplicate_local(parser: &mut DocParser, src_id: ElementId, parent: ElementId) -> ElementId {
    let new_id = ElementId(parser.elements.len() as u32);
    let mut copied = parser.element(src_id).clone();
    copied.parent = Some(parent);
    let source_children = std::mem::take(&mut copied.children);
    copied.children_by_role = Vec::new();
    parser.elements.push(copied);

    let mut new_children = Vec::new();
    for child in source_children {
        new_children.push(duplicate_local(parser, child, new_id));
    }
    let children_by_role = parser.group_children_by_role(&new_children);
    let element = parser.element_mut(new_id);
    element.children = new_children;
    element.children_by_role = children_by_role;
    new_id
}

fn apply_attribute_overrides(
    parser: &mut DocParser,
    item_id: ElementId,
    overrides: &[(String, String, FilePosition)],
    reporting: &mut ErrorReporting,
) {
    if overrides.is_empty() {
        return;
    }
    let (element_type, inheritance) = {
        let element = parser.element(item_id);
        (element.element_type, element.inheritance.clone())
    };
    let instance_attrs = parser.instance_attributes(element_type, &inheritance, reporting);
    let mut updates = Vec::new();
    for (name, text, attr_position) in overrides {
        let Some(entry) = instance_attrs
            .iter()
            .find(|e| &e.declared.get(parser.table).name == name)
        else {
            reporting.error(
                IssueKind::UnknownReference,
                attr_position.clone(),
                format!(
                    "{} has no attribute named {name}",
                    element_type.get(parser.table).kernel.name
                ),
            );
            continue;
        };
        if let Some(value) =
            parser.parse_attribute_value(&entry.spec.value_type, text, name, attr_position, reporting)
        {
            updates.push(AttributeValue {
                declared: entry.declared,
                value,
                explicit: true,
            });
        }
    }
    let element = parser.element_mut(item_id);
    for update in updates {
        match element
            .attributes
            .iter_mut()
            .find(|a| a.declared == update.declared)
        {
            Some(existing) => *existing = update,
            None => element.attributes.push(update),
        }
    }
}

/// Type-based role matching for stitched children, which no longer have a
/// source node to carry a role attribute.
fn assign_roles_by_type(
    parser: &mut DocParser,
    child_id: ElementId,
    parent_entries: &[crate::child::EffectiveChild],
    reporting: &mut ErrorReporting,
) -> bool {
    let child_type = parser.element(child_id).element_type;
    let matched: Vec<_> = parent_entries
        .iter()
        .filter(|e| !e.is_closed())
        .filter(|e| match e.child_type {
            Some(bound) => ElementDef::is_assignable_from(bound, child_type, parser.table),
            None => true,
        })
        .map(|e| e.declared)
        .collect();
    if matched.is_empty() {
        let position = parser.element(child_id).position.clone();
        reporting.error(
            IssueKind::Promise,
            position,
            format!(
                "{} does not fulfill any role of the fulfilled element",
                child_type.get(parser.table).kernel.name
            ),
        );
        return false;
    }
    let mut parent_roles = matched.clone();
    for entry in parent_entries {
        if parent_roles.contains(&entry.declared) {
            continue;
        }
        if matched
            .iter()
            .any(|&d| role_fulfilled_by(entry.declared, d, parser.table))
        {
            parent_roles.push(entry.declared);
        }
    }
    let element = parser.element_mut(child_id);
    element.declared_roles = matched;
    element.parent_roles = parent_roles;
    true
}
