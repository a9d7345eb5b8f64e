use std::collections::BTreeMap;
use std::sync::Arc;

use crate::components::{ConstructionComponentTable, ToolkitComponentTable};
use crate::error::{ErrorReporting, IssueKind, ResolveError};
use crate::position::FilePosition;
use crate::reference;
use crate::toolkit::{Toolkit, ToolkitVersion};
use crate::toolkit_def;
use crate::value_type::CustomValueType;

/// Finds the declaration source of a dependency toolkit that is not yet
/// loaded in the session. Returns the XML text and, if known, its location.
pub trait ToolkitResolver {
    fn resolve(
        &self,
        name: &str,
        version: ToolkitVersion,
    ) -> Result<(String, Option<String>), ResolveError>;
}

/// The construction context of one load: the shared component table, the
/// toolkits already closed in it, and the resolvers used to satisfy
/// `extends=` dependencies.
///
/// Every session starts from the bundled Qonfig-Reference prototype, so its
/// components sit at identical refs in every session. Freezing the session
/// yields the immutable table the closed toolkits resolve against.
pub struct ToolkitSession<'a> {
    pub(crate) components: ConstructionComponentTable,
    toolkits: Vec<Arc<Toolkit>>,
    resolvers: &'a [Box<dyn ToolkitResolver>],
    custom_types: BTreeMap<String, Arc<dyn CustomValueType>>,
    loading: Vec<String>,
}

impl<'a> ToolkitSession<'a> {
    pub fn new(resolvers: &'a [Box<dyn ToolkitResolver>]) -> Self {
        let (reference_toolkit, reference_table) = reference::prototype();
        Self {
            components: ConstructionComponentTable::from_base(reference_table),
            toolkits: vec![reference_toolkit.clone()],
            resolvers,
            custom_types: BTreeMap::new(),
            loading: Vec::new(),
        }
    }

    /// Registers a custom value type for `<external>` declarations to refer
    /// to by id.
    pub fn register_custom_type(&mut self, value_type: Arc<dyn CustomValueType>) {
        self.custom_types
            .insert(value_type.name().to_owned(), value_type);
    }

    pub(crate) fn custom_type(&self, id: &str) -> Option<Arc<dyn CustomValueType>> {
        self.custom_types.get(id).cloned()
    }

    pub fn reference_toolkit(&self) -> Arc<Toolkit> {
        self.toolkits[0].clone()
    }

    pub fn toolkits(&self) -> &[Arc<Toolkit>] {
        &self.toolkits
    }

    pub fn find_toolkit(&self, name: &str, version: ToolkitVersion) -> Option<Arc<Toolkit>> {
        self.toolkits
            .iter()
            .find(|tk| tk.name == name && tk.version.satisfies(version))
            .cloned()
    }

    pub(crate) fn add_toolkit(&mut self, toolkit: Arc<Toolkit>) {
        self.toolkits.push(toolkit);
    }

    /// Satisfies a dependency: a toolkit already loaded in this session, or
    /// one loaded on demand through the session's resolvers. Dependency
    /// cycles between toolkit documents are fatal.
    pub(crate) fn require_dependency(
        &mut self,
        name: &str,
        version: ToolkitVersion,
        position: &FilePosition,
        reporting: &mut ErrorReporting,
    ) -> Option<Arc<Toolkit>> {
        if let Some(found) = self.find_toolkit(name, version) {
            return Some(found);
        }
        if self.loading.iter().any(|n| n == name) {
            reporting.error(
                IssueKind::UnknownReference,
                position.clone(),
                format!(
                    "dependency cycle through toolkit {name}: {}",
                    self.loading.join(" -> ")
                ),
            );
            return None;
        }

        let resolvers = self.resolvers;
        for resolver in resolvers {
            let (text, location) = match resolver.resolve(name, version) {
                Ok(resolved) => resolved,
                Err(e) => {
                    log::warn!("resolver failed for toolkit {name} v{version}: {e}");
                    continue;
                }
            };
            let document = match roxmltree::Document::parse(&text) {
                Ok(document) => document,
                Err(e) => {
                    reporting.error(
                        IssueKind::Xml,
                        FilePosition {
                            location: location.clone(),
                            line: e.pos().row,
                            column: e.pos().col,
                            length: 0,
                        },
                        format!("malformed toolkit definition: {e}"),
                    );
                    return None;
                }
            };
            self.loading.push(name.to_owned());
            let result = toolkit_def::read_toolkit(&document, location.as_deref(), self);
            self.loading.pop();
            match result {
                Ok(toolkit) => {
                    if !toolkit.version.satisfies(version) {
                        reporting.error(
                            IssueKind::UnknownReference,
                            position.clone(),
                            format!(
                                "toolkit {name} v{} does not satisfy requested v{version}",
                                toolkit.version
                            ),
                        );
                        return None;
                    }
                    return Some(toolkit);
                }
                Err(e) => {
                    reporting.extend(e.issues);
                    return None;
                }
            }
        }

        reporting.error(
            IssueKind::UnknownReference,
            position.clone(),
            format!("no toolkit named {name} v{version} is loaded or resolvable"),
        );
        None
    }

    /// Closes the session, freezing every component built in it into the
    /// immutable table the toolkits resolve against.
    pub fn freeze(self) -> ToolkitComponentTable {
        self.components
            .freeze()
            .expect("a reserved component slot was never filled")
    }
}
