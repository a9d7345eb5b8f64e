use std::sync::Arc;

use pretty_assertions::assert_eq;
use qonfig::child::ChildProvenance;
use qonfig::{read_toolkit, IssueKind, Specification, Toolkit, ToolkitSession, Value};

fn load(xml: &str, session: &mut ToolkitSession) -> Arc<Toolkit> {
    let document = roxmltree::Document::parse(xml).unwrap();
    read_toolkit(&document, Some("test.qtd"), session).unwrap()
}

fn load_err(xml: &str, session: &mut ToolkitSession) -> qonfig::CompositeError {
    let document = roxmltree::Document::parse(xml).unwrap();
    read_toolkit(&document, Some("test.qtd"), session).unwrap_err()
}

#[test]
fn builds_a_toolkit_with_dependencies() {
    let mut session = ToolkitSession::new(&[]);
    let a = load(
        r#"<qonfig-def name="toolkit-a" version="1.0">
             <elements>
               <element-def name="e">
                 <attribute name="n" type="string" specify="optional" default="x"/>
               </element-def>
             </elements>
           </qonfig-def>"#,
        &mut session,
    );
    let b = load(
        r#"<qonfig-def name="toolkit-b" version="1.0" extends="toolkit-a v1.0">
             <add-ons>
               <add-on name="m">
                 <attr-mod name="e.n" specify="required"/>
               </add-on>
             </add-ons>
           </qonfig-def>"#,
        &mut session,
    );
    let table = session.freeze();

    let e = a.element_def("e").unwrap();
    let entry = &e.get(&table).kernel.all_attributes[0];
    assert_eq!(entry.declared.get(&table).name, "n");
    assert_eq!(entry.spec.specify, Specification::Optional);
    assert_eq!(entry.spec.default, Some(Value::Text("x".to_owned())));

    let m = b.add_on("m").unwrap();
    let modifier = &m.get(&table).kernel.attribute_modifiers[0];
    assert_eq!(modifier.specify, Some(Specification::Required));
    // the modifier resolved to the declared attribute of the dependency
    assert_eq!(modifier.declared, entry.declared);
}

#[test]
fn diamond_conflict_without_final_word_fails() {
    let mut session = ToolkitSession::new(&[]);
    let err = load_err(
        r#"<qonfig-def name="diamond" version="1.0">
             <add-ons>
               <add-on name="p" requires="e"><attr-mod name="e.n" default="from-p"/></add-on>
               <add-on name="q" requires="e"><attr-mod name="e.n" default="from-q"/></add-on>
             </add-ons>
             <elements>
               <element-def name="e">
                 <attribute name="n" type="string" specify="optional" default="x"/>
               </element-def>
               <element-def name="d" extends="e" inherits="p,q"/>
             </elements>
           </qonfig-def>"#,
        &mut session,
    );
    assert!(err
        .errors()
        .any(|i| i.kind == IssueKind::InheritanceConflict));
    assert!(err.to_string().contains("p"));
    assert!(err.to_string().contains("q"));
}

#[test]
fn diamond_conflict_reconciled_by_final_word() {
    let mut session = ToolkitSession::new(&[]);
    let toolkit = load(
        r#"<qonfig-def name="diamond" version="1.0">
             <add-ons>
               <add-on name="p" requires="e"><attr-mod name="e.n" default="from-p"/></add-on>
               <add-on name="q" requires="e"><attr-mod name="e.n" default="from-q"/></add-on>
             </add-ons>
             <elements>
               <element-def name="e">
                 <attribute name="n" type="string" specify="optional" default="x"/>
               </element-def>
               <element-def name="d" extends="e" inherits="p,q">
                 <attr-mod name="e.n" default="final"/>
               </element-def>
             </elements>
           </qonfig-def>"#,
        &mut session,
    );
    let table = session.freeze();
    let d = toolkit.element_def("d").unwrap();
    let entry = &d.get(&table).kernel.all_attributes[0];
    assert_eq!(entry.spec.default, Some(Value::Text("final".to_owned())));
}

#[test]
fn agreeing_diamond_succeeds() {
    let mut session = ToolkitSession::new(&[]);
    let toolkit = load(
        r#"<qonfig-def name="diamond" version="1.0">
             <add-ons>
               <add-on name="p" requires="e"><attr-mod name="e.n" default="same"/></add-on>
               <add-on name="q" requires="e"><attr-mod name="e.n" default="same"/></add-on>
             </add-ons>
             <elements>
               <element-def name="e">
                 <attribute name="n" type="string" specify="optional" default="x"/>
               </element-def>
               <element-def name="d" extends="e" inherits="p,q"/>
             </elements>
           </qonfig-def>"#,
        &mut session,
    );
    let table = session.freeze();
    let d = toolkit.element_def("d").unwrap();
    let entry = &d.get(&table).kernel.all_attributes[0];
    assert_eq!(entry.spec.default, Some(Value::Text("same".to_owned())));
}

#[test]
fn forbidden_cannot_be_relaxed_by_a_subtype() {
    let mut session = ToolkitSession::new(&[]);
    let err = load_err(
        r#"<qonfig-def name="sticky" version="1.0">
             <elements>
               <element-def name="e">
                 <attribute name="n" type="string" specify="forbidden"/>
               </element-def>
               <element-def name="d" extends="e">
                 <attr-mod name="e.n" specify="optional" default="y"/>
               </element-def>
             </elements>
           </qonfig-def>"#,
        &mut session,
    );
    assert!(err
        .errors()
        .any(|i| i.kind == IssueKind::InheritanceConflict));
}

#[test]
fn inheritance_cycle_is_fatal() {
    let mut session = ToolkitSession::new(&[]);
    let err = load_err(
        r#"<qonfig-def name="cyclic" version="1.0">
             <elements>
               <element-def name="a" extends="b"/>
               <element-def name="b" extends="a"/>
             </elements>
           </qonfig-def>"#,
        &mut session,
    );
    assert!(err.to_string().contains("cycle"));
}

#[test]
fn fulfilling_child_closes_the_inherited_role() {
    let mut session = ToolkitSession::new(&[]);
    let toolkit = load(
        r#"<qonfig-def name="roles" version="1.0">
             <elements>
               <element-def name="t"/>
               <element-def name="t2" extends="t"/>
               <element-def name="base">
                 <child-def name="c" type="t" min="1" max="2"/>
               </element-def>
               <element-def name="derived" extends="base">
                 <child-def name="c2" type="t2" fulfills="c" min="1" max="1"/>
               </element-def>
             </elements>
           </qonfig-def>"#,
        &mut session,
    );
    let table = session.freeze();
    let derived = toolkit.element_def("derived").unwrap();
    let kernel = &derived.get(&table).kernel;

    let c = kernel.child_by_name("c", &table).unwrap();
    assert!(c.is_closed());
    assert!(matches!(
        &c.provenance,
        ChildProvenance::Overridden { overriders } if overriders.len() == 1
    ));

    let c2 = kernel.child_by_name("c2", &table).unwrap();
    assert_eq!((c2.min, c2.max), (1, qonfig::child::ChildMax::Count(1)));
}

#[test]
fn child_bounds_may_not_relax_in_a_modifier() {
    let mut session = ToolkitSession::new(&[]);
    let err = load_err(
        r#"<qonfig-def name="bounds" version="1.0">
             <elements>
               <element-def name="t"/>
               <element-def name="base">
                 <child-def name="c" type="t" min="1" max="2"/>
               </element-def>
               <element-def name="derived" extends="base">
                 <child-mod name="c" min="0" max="inf"/>
               </element-def>
             </elements>
           </qonfig-def>"#,
        &mut session,
    );
    assert!(err
        .errors()
        .any(|i| i.kind == IssueKind::InheritanceConflict));
}

#[test]
fn missing_dependency_is_reported() {
    let mut session = ToolkitSession::new(&[]);
    let err = load_err(
        r#"<qonfig-def name="lonely" version="1.0" extends="nowhere v1.0"/>"#,
        &mut session,
    );
    assert!(err
        .errors()
        .any(|i| i.kind == IssueKind::UnknownReference));
}

#[test]
fn closed_toolkits_share_one_frozen_table() {
    let mut session = ToolkitSession::new(&[]);
    let a = load(
        r#"<qonfig-def name="a" version="1.0">
             <elements><element-def name="e"/></elements>
           </qonfig-def>"#,
        &mut session,
    );
    let b = load(
        r#"<qonfig-def name="b" version="2.3" extends="a v1.0">
             <elements><element-def name="e2" extends="e"/></elements>
           </qonfig-def>"#,
        &mut session,
    );
    let table = session.freeze();

    let e = a.element_def("e").unwrap();
    let e2 = b.element_def("e2").unwrap();
    assert_eq!(e2.get(&table).kernel.super_element, Some(e));
    assert!(qonfig::element::ElementDef::is_assignable_from(e, e2, &table));
    assert_eq!(b.version.to_string(), "2.3");
}
