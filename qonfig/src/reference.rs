//! The bundled Qonfig-Reference mini-toolkit declaring the promise and
//! external-content vocabulary.
//!
//! The prototype is built once per process on first use and its frozen
//! table seeds every session's construction table, so the reference
//! components sit at identical refs in every session.

use std::sync::Arc;

use lazy_static::lazy_static;

use crate::builder::{ChildDecl, ToolkitBuilder};
use crate::child::ChildMax;
use crate::components::{ConstructionComponentTable, ToolkitComponentTable};
use crate::error::ErrorReporting;
use crate::position::FilePosition;
use crate::toolkit::{Toolkit, ToolkitVersion};

pub const REFERENCE_TOOLKIT_NAME: &str = "Qonfig-Reference";

pub(crate) const PROMISE_ADD_ON: &str = "promise";
pub(crate) const EXTERNAL_REFERENCE_ADD_ON: &str = "external-reference";
pub(crate) const EXTERNAL_CONTENT_ELEMENT: &str = "external-content";
pub(crate) const CHILD_PLACEHOLDER_ELEMENT: &str = "child-placeholder";
pub(crate) const CONTENT_ROLE: &str = "content";

pub(crate) const REF_ATTRIBUTE: &str = "ref";
pub(crate) const FULFILLS_ATTRIBUTE: &str = "fulfills";
pub(crate) const REF_ROLE_ATTRIBUTE: &str = "ref-role";

lazy_static! {
    static ref PROTOTYPE: (Arc<Toolkit>, ToolkitComponentTable) = build_prototype();
}

pub(crate) fn prototype() -> (&'static Arc<Toolkit>, &'static ToolkitComponentTable) {
    (&PROTOTYPE.0, &PROTOTYPE.1)
}

fn build_prototype() -> (Arc<Toolkit>, ToolkitComponentTable) {
    let mut components = ConstructionComponentTable::new();
    let mut reporting = ErrorReporting::new();
    let mut builder = ToolkitBuilder::new(
        REFERENCE_TOOLKIT_NAME,
        ToolkitVersion { major: 1, minor: 0 },
        None,
    );

    builder.declare_add_on(PROMISE_ADD_ON, None, true, FilePosition::unknown());

    builder
        .declare_add_on(EXTERNAL_REFERENCE_ADD_ON, None, false, FilePosition::unknown())
        .inherits(PROMISE_ADD_ON)
        .add_attribute(
            REF_ATTRIBUTE,
            "string",
            Some("required".to_owned()),
            None,
            FilePosition::unknown(),
        );

    builder
        .declare_element(
            EXTERNAL_CONTENT_ELEMENT,
            None,
            false,
            false,
            FilePosition::unknown(),
        )
        .add_attribute(
            FULFILLS_ATTRIBUTE,
            "string",
            Some("required".to_owned()),
            None,
            FilePosition::unknown(),
        )
        .add_child(ChildDecl {
            name: CONTENT_ROLE.to_owned(),
            child_type: None,
            fulfills: Vec::new(),
            inherits: Vec::new(),
            requires: Vec::new(),
            min: Some(0),
            max: Some(ChildMax::Unbounded),
            position: FilePosition::unknown(),
        });

    builder
        .declare_element(
            CHILD_PLACEHOLDER_ELEMENT,
            None,
            false,
            false,
            FilePosition::unknown(),
        )
        .add_attribute(
            REF_ROLE_ATTRIBUTE,
            "string",
            Some("required".to_owned()),
            None,
            FilePosition::unknown(),
        );

    let toolkit = builder.build(&mut components, &mut reporting);
    debug_assert!(
        !reporting.has_errors(),
        "reference toolkit failed to build: {:?}",
        reporting.issues()
    );
    let table = components
        .freeze()
        .expect("reference toolkit left an unfilled component slot");
    (Arc::new(toolkit), table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_reference_prototype() {
        let (toolkit, _table) = prototype();
        assert_eq!(toolkit.name, REFERENCE_TOOLKIT_NAME);
        assert!(toolkit.add_on(PROMISE_ADD_ON).is_some());
        assert!(toolkit.add_on(EXTERNAL_REFERENCE_ADD_ON).is_some());
        assert!(toolkit.element_def(EXTERNAL_CONTENT_ELEMENT).is_some());
        assert!(toolkit.element_def(CHILD_PLACEHOLDER_ELEMENT).is_some());
    }
}
