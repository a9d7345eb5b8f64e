//! Qonfig: a schema and extension system for XML-style configuration
//! documents.
//!
//! A *toolkit* declares a named, versioned vocabulary of element types,
//! add-ons (mixins), attributes, child roles, and value types, with
//! multi-inheritance over add-ons and role-based child placement.
//! [`read_toolkit`] compiles such a declaration (and its dependencies)
//! into an immutable [`Toolkit`] resolving against a shared
//! [`ToolkitComponentTable`]; [`read_document`] then parses a document
//! against the toolkit into a fully inherited [`QonfigDocument`] element
//! tree, stitching in external content for promise placeholders.

pub mod attribute;
pub mod auto_inherit;
pub mod builder;
pub mod child;
pub mod document;
pub mod element;
pub mod error;
pub mod merge;
pub mod position;
pub mod promise;
pub mod session;
pub mod shared;
pub mod toolkit;
pub mod validation;
pub mod value_type;

mod components;
mod reference;
mod toolkit_def;

use std::sync::Arc;

pub use components::{ComponentTable, Ref, ToolkitComponentTable};
pub use document::{ElementId, QonfigDocument, QonfigElement};
pub use error::{CompositeError, Issue, IssueKind, Severity};
pub use position::FilePosition;
pub use promise::ExternalResolver;
pub use reference::REFERENCE_TOOLKIT_NAME;
pub use session::{ToolkitResolver, ToolkitSession};
pub use shared::{ElementOrAddOn, Specification};
pub use toolkit::{Toolkit, ToolkitVersion};
pub use value_type::{CustomValueType, Value, ValueType};

/// Reads one toolkit definition document into the session, loading its
/// `extends=` dependencies first (from the session or through its
/// resolvers). The returned toolkit is closed; freeze the session to
/// obtain the component table its refs resolve against.
pub fn read_toolkit(
    document: &roxmltree::Document,
    location: Option<&str>,
    session: &mut ToolkitSession,
) -> Result<Arc<Toolkit>, CompositeError> {
    toolkit_def::read_toolkit(document, location, session)
}

/// Parses a document against a closed toolkit, producing the resolved
/// element tree. Promise elements are stitched through `externals`.
pub fn read_document(
    document: &roxmltree::Document,
    location: Option<&str>,
    toolkit: &Toolkit,
    table: &ToolkitComponentTable,
    externals: &[Box<dyn ExternalResolver>],
) -> Result<QonfigDocument, CompositeError> {
    document::read_document(document, location, toolkit, table, externals)
}
