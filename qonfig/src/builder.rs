//! Toolkit construction: records declarations as they are read, then
//! compiles them into arena components on `build()`.
//!
//! Compilation is demand-driven: a type is compiled on first request,
//! recursing into its super element and declared add-ons, with an
//! in-progress set turning inheritance cycles into fatal errors. This
//! yields the required build order without an explicit topological sort.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::attribute::{AttributeDef, AttributeModifier, ValueModifier};
use crate::child::{ChildDef, ChildMax, ChildModifier};
use crate::components::{ComponentTable, ConstructionComponentTable, Ref};
use crate::element::{AddOn, ElementDef, ElementKernel};
use crate::error::{ErrorReporting, IssueKind};
use crate::merge;
use crate::position::FilePosition;
use crate::shared::{ElementOrAddOn, InheritanceSet, NCName, Specification, ValueSpec};
use crate::toolkit::{
    AutoInheritTarget, AutoInheritanceRule, Toolkit, ToolkitId, ToolkitInfo, ToolkitVersion,
};
use crate::value_type::{Value, ValueType};

/// A declared attribute before name resolution.
#[derive(Clone, Debug)]
struct RawAttribute {
    name: NCName,
    type_name: String,
    specify: Option<String>,
    default: Option<String>,
    position: FilePosition,
}

#[derive(Clone, Debug)]
struct RawAttrModifier {
    target: String,
    type_name: Option<String>,
    specify: Option<String>,
    default: Option<String>,
    position: FilePosition,
}

#[derive(Clone, Debug)]
struct RawValue {
    type_name: String,
    specify: Option<String>,
    default: Option<String>,
    position: FilePosition,
}

#[derive(Clone, Debug)]
struct RawValueModifier {
    specify: Option<String>,
    default: Option<String>,
    position: FilePosition,
}

/// A declared child role before name resolution, as handed to
/// [`ElementDefBuilder::add_child`].
#[derive(Clone, Debug)]
pub struct ChildDecl {
    pub name: NCName,
    pub child_type: Option<String>,
    pub fulfills: Vec<String>,
    pub inherits: Vec<String>,
    pub requires: Vec<String>,
    pub min: Option<u32>,
    pub max: Option<ChildMax>,
    pub position: FilePosition,
}

/// A child modifier before name resolution, as handed to
/// [`ElementDefBuilder::modify_child`].
#[derive(Clone, Debug)]
pub struct ChildModDecl {
    pub target: String,
    pub child_type: Option<String>,
    pub inherits: Vec<String>,
    pub requires: Vec<String>,
    pub min: Option<u32>,
    pub max: Option<ChildMax>,
    pub position: FilePosition,
}

/// Everything declared for one element-def or add-on.
#[derive(Clone, Debug)]
struct TypeDecl {
    name: NCName,
    is_add_on: bool,
    abstract_: bool,
    promise: bool,
    requires: Option<String>,
    super_name: Option<String>,
    inherits: Vec<String>,
    attributes: Vec<RawAttribute>,
    attr_modifiers: Vec<RawAttrModifier>,
    value: Option<RawValue>,
    value_modifier: Option<RawValueModifier>,
    children: Vec<ChildDecl>,
    child_modifiers: Vec<ChildModDecl>,
    meta: Option<String>,
    position: FilePosition,
}

#[derive(Clone, Debug)]
struct RawAutoInherit {
    inherits: Vec<String>,
    targets: Vec<(Option<String>, Option<String>)>,
    position: FilePosition,
}

/// Records the declarations of one toolkit and compiles them on
/// [`build()`](Self::build).
pub struct ToolkitBuilder {
    name: String,
    version: ToolkitVersion,
    location: Option<String>,
    value_types: Vec<(NCName, ValueType, FilePosition)>,
    types: Vec<TypeDecl>,
    auto_inherit: Vec<RawAutoInherit>,
    dependencies: BTreeMap<String, Arc<Toolkit>>,
}

impl ToolkitBuilder {
    pub fn new(
        name: impl Into<String>,
        version: ToolkitVersion,
        location: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version,
            location,
            value_types: Vec::new(),
            types: Vec::new(),
            auto_inherit: Vec::new(),
            dependencies: BTreeMap::new(),
        }
    }

    /// Registers a closed dependency toolkit under a local alias.
    pub fn add_dependency(&mut self, alias: impl Into<String>, toolkit: Arc<Toolkit>) {
        self.dependencies.insert(alias.into(), toolkit);
    }

    /// Declares a named value type. Duplicates within the toolkit are
    /// reported when the toolkit is built.
    pub fn declare_value_type(
        &mut self,
        name: impl Into<String>,
        value_type: ValueType,
        position: FilePosition,
    ) {
        self.value_types.push((name.into(), value_type, position));
    }

    pub fn declare_element(
        &mut self,
        name: impl Into<String>,
        super_name: Option<String>,
        abstract_: bool,
        promise: bool,
        position: FilePosition,
    ) -> ElementDefBuilder<'_> {
        self.types.push(TypeDecl {
            name: name.into(),
            is_add_on: false,
            abstract_,
            promise,
            requires: None,
            super_name,
            inherits: Vec::new(),
            attributes: Vec::new(),
            attr_modifiers: Vec::new(),
            value: None,
            value_modifier: None,
            children: Vec::new(),
            child_modifiers: Vec::new(),
            meta: None,
            position,
        });
        ElementDefBuilder {
            decl: self.types.last_mut().unwrap(),
        }
    }

    pub fn declare_add_on(
        &mut self,
        name: impl Into<String>,
        requires: Option<String>,
        abstract_: bool,
        position: FilePosition,
    ) -> ElementDefBuilder<'_> {
        self.types.push(TypeDecl {
            name: name.into(),
            is_add_on: true,
            abstract_,
            promise: false,
            requires,
            super_name: None,
            inherits: Vec::new(),
            attributes: Vec::new(),
            attr_modifiers: Vec::new(),
            value: None,
            value_modifier: None,
            children: Vec::new(),
            child_modifiers: Vec::new(),
            meta: None,
            position,
        });
        ElementDefBuilder {
            decl: self.types.last_mut().unwrap(),
        }
    }

    pub fn declare_auto_inheritance(
        &mut self,
        inherits: Vec<String>,
        targets: Vec<(Option<String>, Option<String>)>,
        position: FilePosition,
    ) {
        self.auto_inherit.push(RawAutoInherit {
            inherits,
            targets,
            position,
        });
    }

    /// Compiles every declaration into `components` and closes the toolkit.
    /// Errors are accumulated on `reporting`; the returned toolkit is
    /// coherent even after errors, but the caller must treat it as failed
    /// when any were recorded.
    pub fn build(
        self,
        components: &mut ConstructionComponentTable,
        reporting: &mut ErrorReporting,
    ) -> Toolkit {
        let toolkit_id = components.add_toolkit(ToolkitInfo {
            name: self.name.clone(),
            version: self.version,
            location: self.location.clone(),
        });

        let mut value_types = BTreeMap::new();
        for (name, value_type, position) in self.value_types {
            if value_types.contains_key(&name) {
                reporting.error(
                    IssueKind::InheritanceConflict,
                    position,
                    format!("value type {name} is declared twice"),
                );
            } else {
                value_types.insert(name, value_type);
            }
        }

        let mut decls = BTreeMap::new();
        for decl in self.types {
            if decls.contains_key(&decl.name) {
                reporting.error(
                    IssueKind::InheritanceConflict,
                    decl.position.clone(),
                    format!("{} is declared twice in this toolkit", decl.name),
                );
            } else {
                decls.insert(decl.name.clone(), decl);
            }
        }

        let mut compiler = TypeCompiler {
            components,
            reporting,
            toolkit_id,
            toolkit_name: self.name.clone(),
            decls,
            built: BTreeMap::new(),
            in_progress: Vec::new(),
            dependencies: self.dependencies,
            value_types,
        };

        while let Some(name) = compiler.decls.keys().next().cloned() {
            compiler.require_type(&name, &FilePosition::unknown());
        }

        let mut auto_inheritance = Vec::new();
        for raw in self.auto_inherit {
            if let Some(rule) = compiler.resolve_auto_inherit(raw) {
                auto_inheritance.push(rule);
            }
        }

        let mut element_defs = BTreeMap::new();
        let mut add_ons = BTreeMap::new();
        for (name, built) in &compiler.built {
            match built {
                ElementOrAddOn::Element(e) => {
                    element_defs.insert(name.clone(), *e);
                }
                ElementOrAddOn::AddOn(a) => {
                    add_ons.insert(name.clone(), *a);
                }
            }
        }

        Toolkit {
            id: toolkit_id,
            name: self.name,
            version: self.version,
            location: self.location,
            value_types: compiler.value_types,
            element_defs,
            add_ons,
            auto_inheritance,
            dependencies: compiler.dependencies,
            warnings: Vec::new(),
        }
    }
}

/// Per-type builder returned by
/// [`declare_element`](ToolkitBuilder::declare_element) and
/// [`declare_add_on`](ToolkitBuilder::declare_add_on).
pub struct ElementDefBuilder<'b> {
    decl: &'b mut TypeDecl,
}

impl ElementDefBuilder<'_> {
    pub fn inherits(&mut self, add_on: impl Into<String>) -> &mut Self {
        self.decl.inherits.push(add_on.into());
        self
    }

    pub fn add_attribute(
        &mut self,
        name: impl Into<String>,
        type_name: impl Into<String>,
        specify: Option<String>,
        default: Option<String>,
        position: FilePosition,
    ) -> &mut Self {
        self.decl.attributes.push(RawAttribute {
            name: name.into(),
            type_name: type_name.into(),
            specify,
            default,
            position,
        });
        self
    }

    pub fn modify_attribute(
        &mut self,
        target: impl Into<String>,
        type_name: Option<String>,
        specify: Option<String>,
        default: Option<String>,
        position: FilePosition,
    ) -> &mut Self {
        self.decl.attr_modifiers.push(RawAttrModifier {
            target: target.into(),
            type_name,
            specify,
            default,
            position,
        });
        self
    }

    pub fn declare_value(
        &mut self,
        type_name: impl Into<String>,
        specify: Option<String>,
        default: Option<String>,
        position: FilePosition,
    ) -> &mut Self {
        self.decl.value = Some(RawValue {
            type_name: type_name.into(),
            specify,
            default,
            position,
        });
        self
    }

    pub fn modify_value(
        &mut self,
        specify: Option<String>,
        default: Option<String>,
        position: FilePosition,
    ) -> &mut Self {
        self.decl.value_modifier = Some(RawValueModifier {
            specify,
            default,
            position,
        });
        self
    }

    pub fn add_child(&mut self, child: ChildDecl) -> &mut Self {
        self.decl.children.push(child);
        self
    }

    pub fn modify_child(&mut self, modifier: ChildModDecl) -> &mut Self {
        self.decl.child_modifiers.push(modifier);
        self
    }

    pub fn meta(&mut self, element: impl Into<String>) -> &mut Self {
        self.decl.meta = Some(element.into());
        self
    }
}

struct TypeCompiler<'c> {
    components: &'c mut ConstructionComponentTable,
    reporting: &'c mut ErrorReporting,
    toolkit_id: ToolkitId,
    toolkit_name: String,
    decls: BTreeMap<NCName, TypeDecl>,
    built: BTreeMap<NCName, ElementOrAddOn>,
    in_progress: Vec<NCName>,
    dependencies: BTreeMap<String, Arc<Toolkit>>,
    value_types: BTreeMap<NCName, ValueType>,
}

impl TypeCompiler<'_> {
    fn require_type(&mut self, name: &str, position: &FilePosition) -> Option<ElementOrAddOn> {
        if let Some(&built) = self.built.get(name) {
            return Some(built);
        }
        if self.in_progress.iter().any(|n| n == name) {
            self.reporting.error(
                IssueKind::InheritanceConflict,
                position.clone(),
                format!(
                    "inheritance cycle through {name}: {}",
                    self.in_progress.join(" -> ")
                ),
            );
            return None;
        }
        let decl = self.decls.remove(name)?;
        self.in_progress.push(name.to_owned());
        let built = self.compile(decl);
        self.in_progress.pop();
        self.built.insert(name.to_owned(), built);
        Some(built)
    }

    fn resolve_element(&mut self, name: &str, position: &FilePosition) -> Option<Ref<ElementDef>> {
        match self.resolve_type(name, position)? {
            ElementOrAddOn::Element(element) => Some(element),
            ElementOrAddOn::AddOn(_) => {
                self.reporting.error(
                    IssueKind::UnknownReference,
                    position.clone(),
                    format!("{name} is an add-on, not an element"),
                );
                None
            }
        }
    }

    fn resolve_add_on(&mut self, name: &str, position: &FilePosition) -> Option<Ref<AddOn>> {
        match self.resolve_type(name, position)? {
            ElementOrAddOn::AddOn(add_on) => Some(add_on),
            ElementOrAddOn::Element(_) => {
                self.reporting.error(
                    IssueKind::UnknownReference,
                    position.clone(),
                    format!("{name} is an element, not an add-on"),
                );
                None
            }
        }
    }

    fn resolve_type(&mut self, name: &str, position: &FilePosition) -> Option<ElementOrAddOn> {
        let found = self.try_resolve_type(name, position);
        if found.is_none() {
            self.reporting.error(
                IssueKind::UnknownReference,
                position.clone(),
                format!("{name} does not name an element or add-on in scope"),
            );
        }
        found
    }

    fn try_resolve_type(
        &mut self,
        name: &str,
        position: &FilePosition,
    ) -> Option<ElementOrAddOn> {
        let (local_name, dependency) = match name.split_once(':') {
            Some((alias, local)) if alias != self.toolkit_name => {
                (local, Some(self.dependencies.get(alias)?.clone()))
            }
            Some((_, local)) => (local, None),
            None => (name, None),
        };

        if let Some(dep) = dependency {
            return dep
                .find_element(local_name)
                .map(ElementOrAddOn::Element)
                .or_else(|| dep.find_add_on(local_name).map(ElementOrAddOn::AddOn));
        }

        if self.decls.contains_key(local_name)
            || self.built.contains_key(local_name)
            || self.in_progress.iter().any(|n| n == local_name)
        {
            return self.require_type(local_name, position);
        }

        for dep in self.dependencies.values().cloned().collect::<Vec<_>>() {
            if let Some(found) = dep
                .find_element(local_name)
                .map(ElementOrAddOn::Element)
                .or_else(|| dep.find_add_on(local_name).map(ElementOrAddOn::AddOn))
            {
                return Some(found);
            }
        }
        None
    }

    /// Fallback resolution for `owner.member` modifier targets naming a type
    /// outside the inheritance scope collected so far (e.g. an add-on
    /// modifying an element it does not formally require).
    fn find_member_attribute(
        &mut self,
        target: &str,
        position: &FilePosition,
    ) -> Option<Ref<AttributeDef>> {
        let (owner_name, attr_name) = target.rsplit_once('.')?;
        let owner = self.try_resolve_type(owner_name, position)?;
        owner
            .kernel(self.components)
            .attribute_by_name(attr_name, self.components)
            .map(|e| e.declared)
    }

    fn find_member_child(
        &mut self,
        target: &str,
        position: &FilePosition,
    ) -> Option<Ref<ChildDef>> {
        let (owner_name, child_name) = target.rsplit_once('.')?;
        let owner = self.try_resolve_type(owner_name, position)?;
        owner
            .kernel(self.components)
            .child_by_name(child_name, self.components)
            .map(|e| e.declared)
    }

    /// Resolution order for value type names: the built-ins, this toolkit's
    /// declarations, dependency declarations, then add-on names (yielding an
    /// add-on-bounded value).
    fn resolve_value_type(&mut self, name: &str, position: &FilePosition) -> Option<ValueType> {
        match name {
            "string" => return Some(ValueType::String),
            "boolean" => return Some(ValueType::Boolean),
            _ => {}
        }
        if let Some(found) = self.value_types.get(name) {
            return Some(found.clone());
        }
        for dep in self.dependencies.values() {
            if let Some(found) = dep.find_value_type(name) {
                return Some(found);
            }
        }
        // Fall back to add-on names without reporting through resolve_type,
        // since a miss here should name the value type in the error
        let add_on = if self.decls.contains_key(name)
            || self.built.contains_key(name)
            || self.in_progress.iter().any(|n| n == name)
        {
            self.require_type(name, position).and_then(|t| t.add_on())
        } else {
            self.dependencies
                .values()
                .find_map(|dep| dep.find_add_on(name))
        };
        if let Some(add_on) = add_on {
            return Some(ValueType::AddOnRef {
                name: name.to_owned(),
                add_on,
            });
        }
        self.reporting.error(
            IssueKind::UnknownReference,
            position.clone(),
            format!("{name} does not name a value type in scope"),
        );
        None
    }

    fn parse_specify(
        &mut self,
        raw: Option<&str>,
        has_default: bool,
        position: &FilePosition,
    ) -> Specification {
        match raw {
            Some(text) => match text.parse() {
                Ok(specify) => specify,
                Err(message) => {
                    self.reporting
                        .error(IssueKind::TypeCoercion, position.clone(), message);
                    Specification::Optional
                }
            },
            None if has_default => Specification::Optional,
            None => Specification::Required,
        }
    }

    fn parse_default(
        &mut self,
        value_type: &ValueType,
        raw: Option<&str>,
        position: &FilePosition,
    ) -> Option<Value> {
        let text = raw?;
        match value_type.parse(text) {
            Ok(parse) => {
                for warning in parse.warnings {
                    self.reporting
                        .warn(IssueKind::TypeCoercion, position.clone(), warning);
                }
                Some(parse.value)
            }
            Err(message) => {
                self.reporting.error(
                    IssueKind::TypeCoercion,
                    position.clone(),
                    format!("invalid default: {message}"),
                );
                None
            }
        }
    }

    fn compile(&mut self, decl: TypeDecl) -> ElementOrAddOn {
        let owner = if decl.is_add_on {
            ElementOrAddOn::AddOn(self.components.reserve::<AddOn>())
        } else {
            ElementOrAddOn::Element(self.components.reserve::<ElementDef>())
        };

        let super_element = if decl.is_add_on {
            None
        } else {
            decl.super_name
                .as_deref()
                .and_then(|name| self.resolve_element(name, &decl.position))
        };
        let requires = decl
            .requires
            .as_deref()
            .and_then(|name| self.resolve_element(name, &decl.position));

        let mut declared_inheritance = InheritanceSet::new();
        for name in &decl.inherits {
            if let Some(add_on) = self.resolve_add_on(name, &decl.position) {
                declared_inheritance.add(add_on, self.components);
            }
        }

        // A promise element inherits the reference toolkit's
        // external-reference add-on, which carries the `ref` attribute and
        // the promise marker.
        let mut promise = None;
        if decl.promise {
            if let Some(add_on) = self.resolve_add_on("external-reference", &decl.position) {
                declared_inheritance.add(add_on, self.components);
                promise = Some(add_on);
            }
        }

        let mut full_inheritance = declared_inheritance.clone();
        if let Some(super_element) = super_element {
            let super_full = super_element
                .get(self.components)
                .kernel
                .full_inheritance
                .clone();
            full_inheritance.union(&super_full, self.components);
        }
        for add_on in declared_inheritance.clone().iter() {
            let add_on_full = add_on
                .get(self.components)
                .kernel
                .full_inheritance
                .clone();
            full_inheritance.union(&add_on_full, self.components);
        }

        // An element carrying an add-on must satisfy its required super
        // element (through its own super chain; the type itself is still
        // under construction and cannot be the requirement)
        if !decl.is_add_on {
            for add_on in full_inheritance.clone().iter() {
                let Some(required) = add_on.get(self.components).requires else {
                    continue;
                };
                let satisfied = owner.element() == Some(required)
                    || super_element.is_some_and(|s| {
                        ElementDef::is_assignable_from(required, s, self.components)
                    });
                if !satisfied {
                    self.reporting.error(
                        IssueKind::InheritanceConflict,
                        decl.position.clone(),
                        format!(
                            "{} inherits add-on {} which requires {}, but does not extend it",
                            decl.name,
                            add_on.get(self.components).kernel.name,
                            required.get(self.components).kernel.name
                        ),
                    );
                }
            }
        }

        // Own attribute declarations
        let mut declared_attributes = Vec::new();
        let mut seen_attr_names: Vec<&str> = Vec::new();
        for raw in &decl.attributes {
            if seen_attr_names.contains(&raw.name.as_str()) {
                self.reporting.error(
                    IssueKind::InheritanceConflict,
                    raw.position.clone(),
                    format!("attribute {} is declared twice", raw.name),
                );
                continue;
            }
            seen_attr_names.push(&raw.name);
            let value_type = self
                .resolve_value_type(&raw.type_name, &raw.position)
                .unwrap_or(ValueType::String);
            let specify =
                self.parse_specify(raw.specify.as_deref(), raw.default.is_some(), &raw.position);
            let default = self.parse_default(&value_type, raw.default.as_deref(), &raw.position);
            let ref_ = self.components.create(AttributeDef {
                owner,
                name: raw.name.clone(),
                spec: ValueSpec {
                    value_type,
                    specify,
                    default,
                    position: raw.position.clone(),
                },
            });
            declared_attributes.push(ref_);
        }

        // The scope in which modifier targets and fulfillment roles resolve:
        // the super element's compiled view plus the declarations of every
        // inherited add-on (and, for add-ons, of the required element).
        let base_attrs = super_element
            .map(|s| s.get(self.components).kernel.all_attributes.clone())
            .unwrap_or_default();
        let base_children = super_element
            .map(|s| s.get(self.components).kernel.all_children.clone())
            .unwrap_or_default();
        let super_closure: Vec<Ref<AddOn>> = super_element
            .map(|s| {
                s.get(self.components)
                    .kernel
                    .full_inheritance
                    .expand(self.components)
            })
            .unwrap_or_default();
        let addons: Vec<Ref<AddOn>> = full_inheritance
            .expand(self.components)
            .into_iter()
            .filter(|a| !super_closure.contains(a))
            .collect();
        let required_attrs = requires
            .map(|r| r.get(self.components).kernel.all_attributes.clone())
            .unwrap_or_default();
        let required_children = requires
            .map(|r| r.get(self.components).kernel.all_children.clone())
            .unwrap_or_default();

        let find_attr_target = |compiler: &Self, target: &str| -> Option<Ref<AttributeDef>> {
            let matches = |r: Ref<AttributeDef>| {
                let def = r.get(compiler.components);
                if let Some((owner_name, attr_name)) = target.rsplit_once('.') {
                    def.name == attr_name && def.owner.name(compiler.components) == owner_name
                } else {
                    def.name == target
                }
            };
            base_attrs
                .iter()
                .map(|e| e.declared)
                .chain(required_attrs.iter().map(|e| e.declared))
                .chain(addons.iter().flat_map(|a| {
                    a.get(compiler.components)
                        .kernel
                        .declared_attributes
                        .iter()
                        .copied()
                }))
                .find(|&r| matches(r))
        };
        let find_child_target = |compiler: &Self, target: &str| -> Option<Ref<ChildDef>> {
            let matches = |r: Ref<ChildDef>| {
                let def = r.get(compiler.components);
                if let Some((owner_name, child_name)) = target.rsplit_once('.') {
                    def.name == child_name && def.owner.name(compiler.components) == owner_name
                } else {
                    def.name == target
                }
            };
            base_children
                .iter()
                .map(|e| e.declared)
                .chain(required_children.iter().map(|e| e.declared))
                .chain(addons.iter().flat_map(|a| {
                    a.get(compiler.components)
                        .kernel
                        .declared_children
                        .iter()
                        .copied()
                }))
                .find(|&r| matches(r))
        };

        // Attribute modifiers
        let mut attribute_modifiers = Vec::new();
        for raw in &decl.attr_modifiers {
            let target = find_attr_target(self, raw.target.as_str())
                .or_else(|| self.find_member_attribute(&raw.target, &raw.position));
            let Some(target) = target else {
                self.reporting.error(
                    IssueKind::UnknownReference,
                    raw.position.clone(),
                    format!("{} does not name an inherited attribute", raw.target),
                );
                continue;
            };
            let value_type = raw
                .type_name
                .as_deref()
                .and_then(|name| self.resolve_value_type(name, &raw.position));
            let specify = match raw.specify.as_deref() {
                Some(text) => match text.parse() {
                    Ok(specify) => Some(specify),
                    Err(message) => {
                        self.reporting
                            .error(IssueKind::TypeCoercion, raw.position.clone(), message);
                        None
                    }
                },
                None => None,
            };
            let default_type = value_type
                .clone()
                .unwrap_or_else(|| target.get(self.components).spec.value_type.clone());
            let default = self.parse_default(&default_type, raw.default.as_deref(), &raw.position);
            attribute_modifiers.push(AttributeModifier {
                declared: target,
                specify,
                default,
                value_type,
                position: raw.position.clone(),
            });
        }

        // Own child declarations
        let mut declared_children = Vec::new();
        let mut seen_child_names: Vec<&str> = Vec::new();
        for raw in &decl.children {
            if seen_child_names.contains(&raw.name.as_str()) {
                self.reporting.error(
                    IssueKind::InheritanceConflict,
                    raw.position.clone(),
                    format!("child {} is declared twice", raw.name),
                );
                continue;
            }
            seen_child_names.push(&raw.name);
            let child_type = raw
                .child_type
                .as_deref()
                .and_then(|name| self.resolve_element(name, &raw.position));
            let mut inheritance = InheritanceSet::new();
            for name in &raw.inherits {
                if let Some(add_on) = self.resolve_add_on(name, &raw.position) {
                    inheritance.add(add_on, self.components);
                }
            }
            let mut requirement = Vec::new();
            for name in &raw.requires {
                if let Some(add_on) = self.resolve_add_on(name, &raw.position) {
                    if !requirement.contains(&add_on) {
                        requirement.push(add_on);
                    }
                }
            }
            let mut fulfillment = Vec::new();
            for role in &raw.fulfills {
                let target = find_child_target(self, role.as_str())
                    .or_else(|| self.find_member_child(role, &raw.position));
                match target {
                    Some(target) => fulfillment.push(target),
                    None => self.reporting.error(
                        IssueKind::UnknownReference,
                        raw.position.clone(),
                        format!("{role} does not name an inherited role"),
                    ),
                }
            }
            let ref_ = self.components.create(ChildDef {
                owner,
                name: raw.name.clone(),
                child_type,
                fulfillment,
                inheritance,
                requirement,
                min: raw.min.unwrap_or(1),
                max: raw.max.unwrap_or(ChildMax::Count(1)),
                position: raw.position.clone(),
            });
            declared_children.push(ref_);
        }

        // Child modifiers
        let mut child_modifiers = Vec::new();
        for raw in &decl.child_modifiers {
            let target = find_child_target(self, raw.target.as_str())
                .or_else(|| self.find_member_child(&raw.target, &raw.position));
            let Some(target) = target else {
                self.reporting.error(
                    IssueKind::UnknownReference,
                    raw.position.clone(),
                    format!("{} does not name an inherited role", raw.target),
                );
                continue;
            };
            let child_type = raw
                .child_type
                .as_deref()
                .and_then(|name| self.resolve_element(name, &raw.position));
            let mut inheritance = InheritanceSet::new();
            for name in &raw.inherits {
                if let Some(add_on) = self.resolve_add_on(name, &raw.position) {
                    inheritance.add(add_on, self.components);
                }
            }
            let mut requirement = Vec::new();
            for name in &raw.requires {
                if let Some(add_on) = self.resolve_add_on(name, &raw.position) {
                    if !requirement.contains(&add_on) {
                        requirement.push(add_on);
                    }
                }
            }
            child_modifiers.push(ChildModifier {
                declared: target,
                child_type,
                inheritance,
                requirement,
                min: raw.min,
                max: raw.max,
                position: raw.position.clone(),
            });
        }

        // Value
        let declared_value = match &decl.value {
            Some(raw) if decl.is_add_on => {
                self.reporting.error(
                    IssueKind::InheritanceConflict,
                    raw.position.clone(),
                    format!("add-on {} may not declare a value", decl.name),
                );
                None
            }
            Some(raw) => {
                let value_type = self
                    .resolve_value_type(&raw.type_name, &raw.position)
                    .unwrap_or(ValueType::String);
                let specify = self.parse_specify(
                    raw.specify.as_deref(),
                    raw.default.is_some(),
                    &raw.position,
                );
                let default =
                    self.parse_default(&value_type, raw.default.as_deref(), &raw.position);
                Some(ValueSpec {
                    value_type,
                    specify,
                    default,
                    position: raw.position.clone(),
                })
            }
            None => None,
        };
        let inherited_value = super_element
            .and_then(|s| s.get(self.components).kernel.value.clone())
            .or_else(|| {
                requires.and_then(|r| r.get(self.components).kernel.value.clone())
            });
        let value_modifier = decl.value_modifier.as_ref().map(|raw| {
            let specify = match raw.specify.as_deref() {
                Some(text) => match text.parse() {
                    Ok(specify) => Some(specify),
                    Err(message) => {
                        self.reporting
                            .error(IssueKind::TypeCoercion, raw.position.clone(), message);
                        None
                    }
                },
                None => None,
            };
            let default_type = declared_value
                .as_ref()
                .or(inherited_value.as_ref())
                .map(|v| v.value_type.clone())
                .unwrap_or(ValueType::String);
            let default = self.parse_default(&default_type, raw.default.as_deref(), &raw.position);
            ValueModifier {
                specify,
                default,
                position: raw.position.clone(),
            }
        });

        let meta_spec = decl
            .meta
            .as_deref()
            .and_then(|name| self.resolve_element(name, &decl.position));

        // Flatten. An add-on's modifiers are not applied to its own maps;
        // they take effect on the types that inherit it.
        let label = if decl.is_add_on {
            format!("add-on {}", decl.name)
        } else {
            format!("element {}", decl.name)
        };
        let (own_attr_mods, own_child_mods, own_value_mod): (
            &[AttributeModifier],
            &[ChildModifier],
            Option<&ValueModifier>,
        ) = if decl.is_add_on {
            (&[], &[], None)
        } else {
            (
                &attribute_modifiers,
                &child_modifiers,
                value_modifier.as_ref(),
            )
        };

        let all_attributes = merge::flatten_attributes(
            &base_attrs,
            super_element.map(ElementOrAddOn::Element),
            &addons,
            Some(owner),
            &declared_attributes,
            own_attr_mods,
            self.reporting,
            self.components,
        );
        let all_children = merge::flatten_children(
            &base_children,
            super_element.map(ElementOrAddOn::Element),
            &addons,
            Some(owner),
            &declared_children,
            own_child_mods,
            self.reporting,
            self.components,
        );
        let value = if decl.is_add_on {
            None
        } else {
            merge::flatten_value(
                inherited_value.as_ref(),
                declared_value.as_ref(),
                &addons,
                own_value_mod,
                &label,
                self.reporting,
                self.components,
            )
        };

        let kernel = ElementKernel {
            declarer: self.toolkit_id,
            name: decl.name.clone(),
            abstract_: decl.abstract_,
            super_element,
            declared_inheritance,
            full_inheritance,
            declared_attributes,
            attribute_modifiers,
            declared_value,
            value_modifier,
            value,
            declared_children,
            child_modifiers,
            all_attributes,
            all_children,
            meta_spec,
            position: decl.position.clone(),
        };

        match owner {
            ElementOrAddOn::Element(ref_) => {
                self.components.insert(ref_, ElementDef { kernel, promise });
                ElementOrAddOn::Element(ref_)
            }
            ElementOrAddOn::AddOn(ref_) => {
                self.components.insert(ref_, AddOn { kernel, requires });
                ElementOrAddOn::AddOn(ref_)
            }
        }
    }

    fn resolve_auto_inherit(&mut self, raw: RawAutoInherit) -> Option<AutoInheritanceRule> {
        let mut inheritance = InheritanceSet::new();
        for name in &raw.inherits {
            if let Some(add_on) = self.resolve_add_on(name, &raw.position) {
                inheritance.add(add_on, self.components);
            }
        }
        let mut targets = Vec::new();
        for (type_name, role_name) in &raw.targets {
            let element_type = match type_name {
                Some(name) => match self.resolve_element(name, &raw.position) {
                    Some(element) => Some(element),
                    None => continue,
                },
                None => None,
            };
            let role = match role_name {
                Some(spec) => match self.resolve_role(spec, &raw.position) {
                    Some(role) => Some(role),
                    None => continue,
                },
                None => None,
            };
            if element_type.is_none() && role.is_none() {
                self.reporting.error(
                    IssueKind::UnknownReference,
                    raw.position.clone(),
                    "auto-inheritance target needs a type or a role".to_owned(),
                );
                continue;
            }
            targets.push(AutoInheritTarget { element_type, role });
        }
        if targets.is_empty() || inheritance.is_empty() {
            self.reporting.error(
                IssueKind::UnknownReference,
                raw.position.clone(),
                "auto-inheritance needs add-ons and at least one target".to_owned(),
            );
            return None;
        }
        Some(AutoInheritanceRule {
            inheritance,
            targets,
            position: raw.position,
        })
    }

    fn resolve_role(&mut self, spec: &str, position: &FilePosition) -> Option<Ref<ChildDef>> {
        let Some((owner_name, role_name)) = spec.rsplit_once('.') else {
            self.reporting.error(
                IssueKind::UnknownReference,
                position.clone(),
                format!("{spec} does not name a role (expected owner.role)"),
            );
            return None;
        };
        let owner = self.resolve_type(owner_name, position)?;
        let found = owner
            .kernel(self.components)
            .child_by_name(role_name, self.components)
            .map(|c| c.declared);
        if found.is_none() {
            self.reporting.error(
                IssueKind::UnknownReference,
                position.clone(),
                format!("{owner_name} has no role named {role_name}"),
            );
        }
        found
    }
}
