//! Maps `qonfig-def` XML onto [`ToolkitBuilder`] calls.

use std::sync::Arc;

use regex::Regex;
use roxmltree::Node;

use crate::builder::{ChildDecl, ChildModDecl, ElementDefBuilder, ToolkitBuilder};
use crate::child::ChildMax;
use crate::error::{CompositeError, ErrorReporting, IssueKind};
use crate::position::FilePosition;
use crate::reference::REFERENCE_TOOLKIT_NAME;
use crate::session::ToolkitSession;
use crate::toolkit::{Toolkit, ToolkitVersion};
use crate::value_type::ValueType;

/// Reads one toolkit definition document, loading its `extends=`
/// dependencies through the session first, and closes the toolkit into the
/// session.
pub fn read_toolkit(
    document: &roxmltree::Document,
    location: Option<&str>,
    session: &mut ToolkitSession,
) -> Result<Arc<Toolkit>, CompositeError> {
    let mut reporting = ErrorReporting::new();
    let root = document.root_element();
    let root_pos = FilePosition::of_node(root, location);

    if root.tag_name().name() != "qonfig-def" {
        reporting.error(
            IssueKind::Xml,
            root_pos,
            format!(
                "expected a qonfig-def root element, found {}",
                root.tag_name().name()
            ),
        );
        return Err(reporting
            .finish()
            .expect_err("an error was just recorded"));
    }

    let name = match root.attribute("name") {
        Some(name) => name.to_owned(),
        None => {
            reporting.error(
                IssueKind::Xml,
                root_pos.clone(),
                "qonfig-def needs a name attribute".to_owned(),
            );
            "<unnamed>".to_owned()
        }
    };
    let version = root
        .attribute("version")
        .map(|v| {
            v.parse::<ToolkitVersion>().unwrap_or_else(|e| {
                reporting.error(IssueKind::Xml, root_pos.clone(), e);
                ToolkitVersion { major: 0, minor: 0 }
            })
        })
        .unwrap_or_else(|| {
            reporting.error(
                IssueKind::Xml,
                root_pos.clone(),
                "qonfig-def needs a version attribute".to_owned(),
            );
            ToolkitVersion { major: 0, minor: 0 }
        });

    let mut builder = ToolkitBuilder::new(name, version, location.map(str::to_owned));

    // Dependencies, satisfied before any local declaration resolves
    if let Some(extends) = root.attribute("extends") {
        for dep_spec in extends.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (dep_name, dep_version) = match dep_spec.rsplit_once(' ') {
                Some((dep_name, version_text)) => {
                    match version_text.trim().parse::<ToolkitVersion>() {
                        Ok(dep_version) => (dep_name.trim(), dep_version),
                        Err(e) => {
                            reporting.error(IssueKind::Xml, root_pos.clone(), e);
                            continue;
                        }
                    }
                }
                None => {
                    reporting.error(
                        IssueKind::Xml,
                        root_pos.clone(),
                        format!("dependency {dep_spec:?} is not of the form \"name vM.m\""),
                    );
                    continue;
                }
            };
            if let Some(dep) =
                session.require_dependency(dep_name, dep_version, &root_pos, &mut reporting)
            {
                builder.add_dependency(dep.name.clone(), dep);
            }
        }
    }
    builder.add_dependency(REFERENCE_TOOLKIT_NAME, session.reference_toolkit());

    for section in root.children().filter(Node::is_element) {
        match section.tag_name().name() {
            "value-types" => map_value_types(&mut builder, section, location, session, &mut reporting),
            "add-ons" => {
                for add_on in section.children().filter(Node::is_element) {
                    if add_on.tag_name().name() == "add-on" {
                        map_add_on(&mut builder, add_on, location, &mut reporting);
                    } else {
                        unknown_node(add_on, location, &mut reporting);
                    }
                }
            }
            "elements" => {
                for element in section.children().filter(Node::is_element) {
                    if element.tag_name().name() == "element-def" {
                        map_element_def(&mut builder, element, location, &mut reporting);
                    } else {
                        unknown_node(element, location, &mut reporting);
                    }
                }
            }
            "auto-inheritance" => map_auto_inheritance(&mut builder, section, location),
            _ => unknown_node(section, location, &mut reporting),
        }
    }

    let toolkit = builder.build(&mut session.components, &mut reporting);
    crate::validation::validate_toolkit(&toolkit, &session.components, &mut reporting);
    let warnings = reporting.warnings_since(0);
    let toolkit = Arc::new(Toolkit { warnings, ..toolkit });
    session.add_toolkit(toolkit.clone());
    reporting.finish().map(|_| toolkit)
}

fn unknown_node(node: Node, location: Option<&str>, reporting: &mut ErrorReporting) {
    reporting.warn(
        IssueKind::Xml,
        FilePosition::of_node(node, location),
        format!("ignoring unrecognized element {}", node.tag_name().name()),
    );
}

fn map_value_types(
    builder: &mut ToolkitBuilder,
    section: Node,
    location: Option<&str>,
    session: &ToolkitSession,
    reporting: &mut ErrorReporting,
) {
    let mut declared: Vec<(String, ValueType)> = Vec::new();
    for node in section.children().filter(Node::is_element) {
        let pos = FilePosition::of_node(node, location);
        let Some(value_type) = map_value_type(node, location, &declared, session, reporting)
        else {
            continue;
        };
        let name = node
            .attribute("name")
            .map(str::to_owned)
            .unwrap_or_else(|| value_type.name().to_owned());
        declared.push((name.clone(), value_type.clone()));
        builder.declare_value_type(name, value_type, pos);
    }
}

/// Maps one value type element, named or inline.
fn map_value_type(
    node: Node,
    location: Option<&str>,
    declared: &[(String, ValueType)],
    session: &ToolkitSession,
    reporting: &mut ErrorReporting,
) -> Option<ValueType> {
    let pos = FilePosition::of_node(node, location);
    let name = node.attribute("name");
    match node.tag_name().name() {
        "string" => Some(ValueType::String),
        "boolean" => Some(ValueType::Boolean),
        "literal" => {
            let value = node.attribute("value").or(name);
            match value {
                Some(value) => Some(ValueType::Literal(value.to_owned())),
                None => {
                    reporting.error(
                        IssueKind::Xml,
                        pos,
                        "literal needs a value attribute".to_owned(),
                    );
                    None
                }
            }
        }
        "one-of" => {
            let mut components = Vec::new();
            for child in node.children().filter(Node::is_element) {
                if let Some(component) =
                    map_value_type(child, location, declared, session, reporting)
                {
                    components.push(component);
                }
            }
            if components.is_empty() {
                reporting.error(
                    IssueKind::Xml,
                    pos,
                    "one-of needs at least one component type".to_owned(),
                );
                return None;
            }
            Some(ValueType::OneOf {
                name: name.unwrap_or("one-of").to_owned(),
                components,
            })
        }
        "pattern" => {
            let text = node.text().map(str::trim).unwrap_or_default();
            match Regex::new(text) {
                Ok(regex) => Some(ValueType::Pattern {
                    name: name.unwrap_or("pattern").to_owned(),
                    regex,
                }),
                Err(e) => {
                    reporting.error(
                        IssueKind::TypeCoercion,
                        pos,
                        format!("invalid pattern: {e}"),
                    );
                    None
                }
            }
        }
        "explicit" => {
            let prefix = node.attribute("prefix").unwrap_or_default().to_owned();
            let suffix = node.attribute("suffix").unwrap_or_default().to_owned();
            let inner = if let Some(child) = node.children().find(|c| c.is_element()) {
                map_value_type(child, location, declared, session, reporting)?
            } else {
                let inner_name = node.text().map(str::trim).unwrap_or_default();
                match inner_name {
                    "string" => ValueType::String,
                    "boolean" => ValueType::Boolean,
                    other => match declared.iter().find(|(n, _)| n == other) {
                        Some((_, found)) => found.clone(),
                        None => {
                            reporting.error(
                                IssueKind::UnknownReference,
                                pos,
                                format!("{other:?} does not name a declared value type"),
                            );
                            return None;
                        }
                    },
                }
            };
            Some(ValueType::Explicit {
                name: name.unwrap_or("explicit").to_owned(),
                prefix,
                suffix,
                inner: Box::new(inner),
            })
        }
        "external" => {
            let id = node.text().map(str::trim).unwrap_or_default();
            match session.custom_type(id) {
                Some(custom) => Some(ValueType::Custom(custom)),
                None => {
                    reporting.error(
                        IssueKind::UnknownReference,
                        pos,
                        format!("no custom value type registered under {id:?}"),
                    );
                    None
                }
            }
        }
        other => {
            reporting.error(
                IssueKind::Xml,
                pos,
                format!("{other} is not a value type element"),
            );
            None
        }
    }
}

fn csv(attr: Option<&str>) -> Vec<String> {
    attr.map(|v| {
        v.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect()
    })
    .unwrap_or_default()
}

fn parse_bool(
    node: Node,
    attr: &str,
    location: Option<&str>,
    reporting: &mut ErrorReporting,
) -> bool {
    match node.attribute(attr) {
        None => false,
        Some("true") => true,
        Some("false") => false,
        Some(other) => {
            reporting.error(
                IssueKind::TypeCoercion,
                FilePosition::of_node(node, location),
                format!("{other:?} is not a boolean {attr}"),
            );
            false
        }
    }
}

fn parse_min(
    node: Node,
    location: Option<&str>,
    reporting: &mut ErrorReporting,
) -> Option<u32> {
    let text = node.attribute("min")?;
    match text.parse() {
        Ok(min) => Some(min),
        Err(_) => {
            reporting.error(
                IssueKind::TypeCoercion,
                FilePosition::of_node(node, location),
                format!("{text:?} is not a valid min"),
            );
            None
        }
    }
}

fn parse_max(
    node: Node,
    location: Option<&str>,
    reporting: &mut ErrorReporting,
) -> Option<ChildMax> {
    let text = node.attribute("max")?;
    if text == "inf" || text == "unbounded" {
        return Some(ChildMax::Unbounded);
    }
    match text.parse() {
        Ok(max) => Some(ChildMax::Count(max)),
        Err(_) => {
            reporting.error(
                IssueKind::TypeCoercion,
                FilePosition::of_node(node, location),
                format!("{text:?} is not a valid max"),
            );
            None
        }
    }
}

/// Maps the body sections shared by `add-on` and `element-def`.
fn map_type_body(
    b: &mut ElementDefBuilder,
    node: Node,
    location: Option<&str>,
    reporting: &mut ErrorReporting,
) {
    for name in csv(node.attribute("inherits")) {
        b.inherits(name);
    }
    for child in node.children().filter(Node::is_element) {
        let pos = FilePosition::of_node(child, location);
        let attr = |name: &str| child.attribute(name).map(str::to_owned);
        match child.tag_name().name() {
            "attribute" => match child.attribute("name").zip(child.attribute("type")) {
                Some((name, type_name)) => {
                    b.add_attribute(name, type_name, attr("specify"), attr("default"), pos);
                }
                None => reporting.error(
                    IssueKind::Xml,
                    pos,
                    "attribute needs name and type attributes".to_owned(),
                ),
            },
            "attr-mod" => match child.attribute("name") {
                Some(target) => {
                    b.modify_attribute(
                        target,
                        attr("type"),
                        attr("specify"),
                        attr("default"),
                        pos,
                    );
                }
                None => reporting.error(
                    IssueKind::Xml,
                    pos,
                    "attr-mod needs a name attribute".to_owned(),
                ),
            },
            "value" => match child.attribute("type") {
                Some(type_name) => {
                    b.declare_value(type_name, attr("specify"), attr("default"), pos);
                }
                None => reporting.error(
                    IssueKind::Xml,
                    pos,
                    "value needs a type attribute".to_owned(),
                ),
            },
            "value-mod" => {
                b.modify_value(attr("specify"), attr("default"), pos);
            }
            "child-def" => match child.attribute("name") {
                Some(name) => {
                    let min = parse_min(child, location, reporting);
                    let max = parse_max(child, location, reporting);
                    b.add_child(ChildDecl {
                        name: name.to_owned(),
                        child_type: attr("type"),
                        fulfills: csv(child.attribute("fulfills")),
                        inherits: csv(child.attribute("inherits")),
                        requires: csv(child.attribute("requires")),
                        min,
                        max,
                        position: pos,
                    });
                }
                None => reporting.error(
                    IssueKind::Xml,
                    pos,
                    "child-def needs a name attribute".to_owned(),
                ),
            },
            "child-mod" => match child.attribute("name") {
                Some(target) => {
                    let min = parse_min(child, location, reporting);
                    let max = parse_max(child, location, reporting);
                    b.modify_child(ChildModDecl {
                        target: target.to_owned(),
                        child_type: attr("type"),
                        inherits: csv(child.attribute("inherits")),
                        requires: csv(child.attribute("requires")),
                        min,
                        max,
                        position: pos,
                    });
                }
                None => reporting.error(
                    IssueKind::Xml,
                    pos,
                    "child-mod needs a name attribute".to_owned(),
                ),
            },
            "inherits" => {
                if let Some(name) = child
                    .attribute("name")
                    .or_else(|| child.text().map(str::trim))
                {
                    if !name.is_empty() {
                        b.inherits(name);
                    }
                }
            }
            "meta" => {
                if let Some(name) = child.attribute("name") {
                    b.meta(name);
                }
            }
            _ => unknown_node(child, location, reporting),
        }
    }
}

fn map_add_on(
    builder: &mut ToolkitBuilder,
    node: Node,
    location: Option<&str>,
    reporting: &mut ErrorReporting,
) {
    let pos = FilePosition::of_node(node, location);
    let Some(name) = node.attribute("name") else {
        reporting.error(
            IssueKind::Xml,
            pos,
            "add-on needs a name attribute".to_owned(),
        );
        return;
    };
    let abstract_ = parse_bool(node, "abstract", location, reporting);
    let requires = node.attribute("requires").map(str::to_owned);
    let mut b = builder.declare_add_on(name, requires, abstract_, pos);
    map_type_body(&mut b, node, location, reporting);
}

fn map_element_def(
    builder: &mut ToolkitBuilder,
    node: Node,
    location: Option<&str>,
    reporting: &mut ErrorReporting,
) {
    let pos = FilePosition::of_node(node, location);
    let Some(name) = node.attribute("name") else {
        reporting.error(
            IssueKind::Xml,
            pos,
            "element-def needs a name attribute".to_owned(),
        );
        return;
    };
    let abstract_ = parse_bool(node, "abstract", location, reporting);
    let promise = parse_bool(node, "promise", location, reporting);
    let super_name = node.attribute("extends").map(str::to_owned);
    let mut b = builder.declare_element(name, super_name, abstract_, promise, pos);
    map_type_body(&mut b, node, location, reporting);
}

fn map_auto_inheritance(builder: &mut ToolkitBuilder, node: Node, location: Option<&str>) {
    let pos = FilePosition::of_node(node, location);
    let mut inherits = csv(node.attribute("inherits"));
    let mut targets = Vec::new();
    for child in node.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "inherits" => {
                if let Some(name) = child
                    .attribute("name")
                    .or_else(|| child.text().map(str::trim))
                {
                    if !name.is_empty() {
                        inherits.push(name.to_owned());
                    }
                }
            }
            "target" => targets.push((
                child.attribute("type").map(str::to_owned),
                child.attribute("role").map(str::to_owned),
            )),
            _ => {}
        }
    }
    builder.declare_auto_inheritance(inherits, targets, pos);
}
