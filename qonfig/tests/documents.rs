use std::collections::HashMap;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use qonfig::auto_inherit::AutoInheritance;
use qonfig::error::ResolveError;
use qonfig::{
    read_document, read_toolkit, ExternalResolver, IssueKind, QonfigDocument, Toolkit,
    ToolkitComponentTable, ToolkitSession, Value,
};

fn load(xml: &str, session: &mut ToolkitSession) -> Arc<Toolkit> {
    let document = roxmltree::Document::parse(xml).unwrap();
    read_toolkit(&document, Some("test.qtd"), session).unwrap()
}

fn parse(
    xml: &str,
    toolkit: &Toolkit,
    table: &ToolkitComponentTable,
) -> Result<QonfigDocument, qonfig::CompositeError> {
    let document = roxmltree::Document::parse(xml).unwrap();
    read_document(&document, Some("doc.qml"), toolkit, table, &[])
}

fn parse_with(
    xml: &str,
    toolkit: &Toolkit,
    table: &ToolkitComponentTable,
    externals: &[Box<dyn ExternalResolver>],
) -> Result<QonfigDocument, qonfig::CompositeError> {
    let document = roxmltree::Document::parse(xml).unwrap();
    read_document(&document, Some("doc.qml"), toolkit, table, externals)
}

/// Test resolver backed by an in-memory map of reference -> document text.
struct MapResolver(HashMap<String, String>);

impl MapResolver {
    fn new(entries: &[(&str, &str)]) -> Box<dyn ExternalResolver> {
        Box::new(Self(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ))
    }
}

impl ExternalResolver for MapResolver {
    fn resolve(
        &self,
        reference: &str,
        _relative_to: Option<&str>,
    ) -> Result<(String, String), ResolveError> {
        self.0
            .get(reference)
            .map(|text| (text.clone(), reference.to_owned()))
            .ok_or_else(|| ResolveError::NotFound(reference.to_owned()))
    }
}

fn override_toolkits(session: &mut ToolkitSession) -> (Arc<Toolkit>, Arc<Toolkit>) {
    let a = load(
        r#"<qonfig-def name="toolkit-a" version="1.0">
             <elements>
               <element-def name="e">
                 <attribute name="n" type="string" specify="optional" default="x"/>
               </element-def>
             </elements>
           </qonfig-def>"#,
        session,
    );
    let b = load(
        r#"<qonfig-def name="toolkit-b" version="1.0" extends="toolkit-a v1.0">
             <add-ons>
               <add-on name="m">
                 <attr-mod name="e.n" specify="required"/>
               </add-on>
             </add-ons>
           </qonfig-def>"#,
        session,
    );
    (a, b)
}

#[test]
fn attribute_defaults_resolve_without_extension() {
    let mut session = ToolkitSession::new(&[]);
    let (_, b) = override_toolkits(&mut session);
    let table = session.freeze();

    let doc = parse(r#"<e/>"#, &b, &table).unwrap();
    let root = doc.element(doc.root());
    assert_eq!(
        root.attribute_value("n", &table),
        Some(&Value::Text("x".to_owned()))
    );
}

#[test]
fn extension_makes_the_attribute_required() {
    let mut session = ToolkitSession::new(&[]);
    let (_, b) = override_toolkits(&mut session);
    let table = session.freeze();

    let err = parse(r#"<e with-extension="m"/>"#, &b, &table).unwrap_err();
    assert!(err
        .errors()
        .any(|i| i.message.contains("attribute n required")));

    let doc = parse(r#"<e with-extension="m" n="y"/>"#, &b, &table).unwrap();
    let root = doc.element(doc.root());
    assert_eq!(
        root.attribute_value("n", &table),
        Some(&Value::Text("y".to_owned()))
    );
}

#[test]
fn unknown_attributes_are_errors() {
    let mut session = ToolkitSession::new(&[]);
    let (_, b) = override_toolkits(&mut session);
    let table = session.freeze();

    let err = parse(r#"<e bogus="1"/>"#, &b, &table).unwrap_err();
    assert!(err
        .errors()
        .any(|i| i.kind == IssueKind::UnknownReference));
}

fn role_toolkit(session: &mut ToolkitSession) -> Arc<Toolkit> {
    load(
        r#"<qonfig-def name="roles" version="1.0">
             <elements>
               <element-def name="t"/>
               <element-def name="parent">
                 <child-def name="c" type="t" min="1" max="2"/>
               </element-def>
             </elements>
           </qonfig-def>"#,
        session,
    )
}

#[test]
fn role_counts_are_enforced() {
    let mut session = ToolkitSession::new(&[]);
    let toolkit = role_toolkit(&mut session);
    let table = session.freeze();

    let err = parse(r#"<parent/>"#, &toolkit, &table).unwrap_err();
    assert!(err.errors().any(|i| i.kind == IssueKind::Cardinality));

    for body in ["<t/>", "<t/><t/>"] {
        let doc = parse(&format!("<parent>{body}</parent>"), &toolkit, &table).unwrap();
        let root = doc.element(doc.root());
        assert_eq!(root.children.len(), body.matches("<t/>").count());
    }

    let err = parse(r#"<parent><t/><t/><t/></parent>"#, &toolkit, &table).unwrap_err();
    assert!(err.errors().any(|i| i.kind == IssueKind::Cardinality));
}

#[test]
fn children_group_by_their_declared_role() {
    let mut session = ToolkitSession::new(&[]);
    let toolkit = role_toolkit(&mut session);
    let table = session.freeze();

    let doc = parse(r#"<parent><t/></parent>"#, &toolkit, &table).unwrap();
    let root = doc.element(doc.root());
    let role = toolkit.find_role("parent.c", &table).unwrap();
    assert_eq!(root.children_in_role(role).len(), 1);

    let child = doc.element(root.children[0]);
    assert_eq!(child.parent, Some(doc.root()));
    assert!(child.parent_roles.contains(&role));
}

fn auto_inherit_toolkit(session: &mut ToolkitSession) -> Arc<Toolkit> {
    load(
        r#"<qonfig-def name="auto" version="1.0">
             <add-ons>
               <add-on name="addon1">
                 <attribute name="extra" type="string" specify="optional" default="v"/>
               </add-on>
             </add-ons>
             <elements>
               <element-def name="c"/>
               <element-def name="parent">
                 <child-def name="c" type="c" min="0" max="inf"/>
               </element-def>
             </elements>
             <auto-inheritance inherits="addon1">
               <target role="parent.c"/>
             </auto-inheritance>
           </qonfig-def>"#,
        session,
    )
}

#[test]
fn auto_inheritance_applies_by_role() {
    let mut session = ToolkitSession::new(&[]);
    let toolkit = auto_inherit_toolkit(&mut session);
    let table = session.freeze();

    let doc = parse(r#"<parent><c/></parent>"#, &toolkit, &table).unwrap();
    let root = doc.element(doc.root());
    let child = doc.element(root.children[0]);
    let addon1 = toolkit.add_on("addon1").unwrap();
    assert!(child.inheritance.contains(addon1, &table));
    // the add-on's attribute arrives with its default
    assert_eq!(
        child.attribute_value("extra", &table),
        Some(&Value::Text("v".to_owned()))
    );
    // the parent itself is not targeted
    assert!(!root.inheritance.contains(addon1, &table));
}

#[test]
fn auto_inheritance_is_idempotent() {
    let mut session = ToolkitSession::new(&[]);
    let toolkit = auto_inherit_toolkit(&mut session);
    let table = session.freeze();

    let parent = toolkit.element_def("parent").unwrap();
    let c_type = toolkit.element_def("c").unwrap();
    let role = parent.get(&table).kernel.all_children[0].declared;

    let mut first = AutoInheritance::new(toolkit.toolkit_closure(), &table);
    first.add_role(role);
    first.add_target_type(c_type);
    let first_set: Vec<_> = first.inheritance().iter().collect();

    let mut second = AutoInheritance::new(toolkit.toolkit_closure(), &table);
    second.add_role(role);
    second.add_target_type(c_type);
    second.add_role(role);
    second.add_target_type(c_type);
    let second_set: Vec<_> = second.inheritance().iter().collect();

    assert_eq!(first_set, second_set);
}

fn promise_toolkit(session: &mut ToolkitSession) -> Arc<Toolkit> {
    load(
        r#"<qonfig-def name="promises" version="1.0">
             <elements>
               <element-def name="item">
                 <attribute name="label" type="string" specify="optional" default="plain"/>
               </element-def>
               <element-def name="ext" promise="true">
                 <child-def name="content" type="item" min="0" max="inf"/>
               </element-def>
               <element-def name="ext2" extends="ext"/>
             </elements>
           </qonfig-def>"#,
        session,
    )
}

#[test]
fn external_reference_copies_the_external_content() {
    let mut session = ToolkitSession::new(&[]);
    let toolkit = promise_toolkit(&mut session);
    let table = session.freeze();

    let externals = vec![MapResolver::new(&[(
        "D2.qml",
        r#"<external-content fulfills="ext"><item/><item/></external-content>"#,
    )])];
    let doc = parse_with(r#"<ext ref="D2.qml"/>"#, &toolkit, &table, &externals).unwrap();

    let root = doc.element(doc.root());
    assert_eq!(root.children.len(), 2);
    let item = toolkit.element_def("item").unwrap();
    for &child_id in &root.children {
        let child = doc.element(child_id);
        assert_eq!(child.element_type, item);
        // copied elements keep the external document's source position
        assert_eq!(child.position.location.as_deref(), Some("D2.qml"));
    }
    assert!(root.external_position.is_some());
}

#[test]
fn fulfills_may_name_a_strict_supertype() {
    let mut session = ToolkitSession::new(&[]);
    let toolkit = promise_toolkit(&mut session);
    let table = session.freeze();

    let externals = vec![MapResolver::new(&[(
        "D2.qml",
        r#"<external-content fulfills="ext"><item/></external-content>"#,
    )])];
    let doc = parse_with(r#"<ext2 ref="D2.qml"/>"#, &toolkit, &table, &externals).unwrap();
    assert_eq!(doc.element(doc.root()).children.len(), 1);
}

#[test]
fn fulfills_mismatch_is_an_error() {
    let mut session = ToolkitSession::new(&[]);
    let toolkit = promise_toolkit(&mut session);
    let table = session.freeze();

    let externals = vec![MapResolver::new(&[(
        "D2.qml",
        r#"<external-content fulfills="item"><item/></external-content>"#,
    )])];
    let err =
        parse_with(r#"<ext ref="D2.qml"/>"#, &toolkit, &table, &externals).unwrap_err();
    assert!(err.errors().any(|i| i.kind == IssueKind::Promise));
}

#[test]
fn missing_external_reference_is_an_error() {
    let mut session = ToolkitSession::new(&[]);
    let toolkit = promise_toolkit(&mut session);
    let table = session.freeze();

    let externals = vec![MapResolver::new(&[])];
    let err =
        parse_with(r#"<ext ref="nowhere.qml"/>"#, &toolkit, &table, &externals).unwrap_err();
    assert!(err.errors().any(|i| i.kind == IssueKind::Promise));
}

#[test]
fn child_placeholder_is_filled_from_the_referring_site() {
    let mut session = ToolkitSession::new(&[]);
    let toolkit = promise_toolkit(&mut session);
    let table = session.freeze();

    let externals = vec![MapResolver::new(&[(
        "D2.qml",
        r#"<external-content fulfills="ext">
             <child-placeholder ref-role="ext.content" label="overridden"/>
           </external-content>"#,
    )])];
    let doc = parse_with(
        r#"<ext ref="D2.qml"><item/><item/></ext>"#,
        &toolkit,
        &table,
        &externals,
    )
    .unwrap();

    let root = doc.element(doc.root());
    assert_eq!(root.children.len(), 2);
    for &child_id in &root.children {
        let child = doc.element(child_id);
        // the placeholder's attribute overrides the item default
        assert_eq!(
            child.attribute_value("label", &table),
            Some(&Value::Text("overridden".to_owned()))
        );
    }
}

#[test]
fn external_content_cycles_are_detected() {
    let mut session = ToolkitSession::new(&[]);
    let toolkit = promise_toolkit(&mut session);
    let table = session.freeze();

    let externals = vec![MapResolver::new(&[(
        "D2.qml",
        r#"<external-content fulfills="ext"><ext ref="D2.qml"/></external-content>"#,
    )])];
    let err =
        parse_with(r#"<ext ref="D2.qml"/>"#, &toolkit, &table, &externals).unwrap_err();
    assert!(err.errors().any(|i| i.message.contains("cycle")));
}
