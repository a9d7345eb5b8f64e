use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::num::{NonZeroU32, NonZeroUsize};

use crate::attribute::AttributeDef;
use crate::child::ChildDef;
use crate::element::{AddOn, ElementDef};
use crate::toolkit::{ToolkitId, ToolkitInfo};

/// Trait implemented by all concrete schema components.
pub trait Component {
    const DISPLAY_NAME: &'static str;
}

/// Type on which internal component traits are implemented.
///
/// This type is used to prevent leaking internal functions into the
/// [`Component`] trait.
pub struct ComponentTraits;

/// A component referencable via [`Ref`]. Intended for internal use.
pub trait HasArenaContainer<R: Component>: Sized {
    fn get_container_from_construction_component_table(
        table: &ConstructionComponentTable,
    ) -> &[Option<R>];
    fn get_container_from_construction_component_table_mut(
        table: &mut ConstructionComponentTable,
    ) -> &mut Vec<Option<R>>;
    fn get_container_from_toolkit_component_table(table: &ToolkitComponentTable) -> &[R];
}

/// A reference to a [`Component`] stored in a component table.
///
/// A `Ref` is the component's identity: two declarations are the same
/// declaration exactly when their refs are equal. Modified and inherited
/// views of a declaration carry the declared root's ref.
pub struct Ref<R>(NonZeroU32, PhantomData<R>)
where
    R: Component,
    ComponentTraits: HasArenaContainer<R>;

impl<R> Ref<R>
where
    R: Component,
    ComponentTraits: HasArenaContainer<R>,
{
    const fn from_inner(inner: NonZeroU32) -> Self {
        Self(inner, PhantomData)
    }

    fn index(self) -> usize {
        let size: NonZeroUsize = self
            .0
            .try_into()
            .expect("Could not convert component reference to usize index");
        usize::from(size) - 1
    }

    pub fn get(self, table: &impl ComponentTable) -> &R {
        table.get(self)
    }
}

// derive(...) does not work if R itself does not derive the trait, even though
// it is only "used" in the PhantomData; hence the manual impls.

impl<R> Copy for Ref<R>
where
    R: Component,
    ComponentTraits: HasArenaContainer<R>,
{
}

impl<R> Clone for Ref<R>
where
    R: Component,
    ComponentTraits: HasArenaContainer<R>,
{
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> fmt::Debug for Ref<R>
where
    R: Component,
    ComponentTraits: HasArenaContainer<R>,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<{} #{}>", R::DISPLAY_NAME, self.0)
    }
}

impl<R> PartialEq for Ref<R>
where
    R: Component,
    ComponentTraits: HasArenaContainer<R>,
{
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<R> Eq for Ref<R>
where
    R: Component,
    ComponentTraits: HasArenaContainer<R>,
{
}

impl<R> Hash for Ref<R>
where
    R: Component,
    ComponentTraits: HasArenaContainer<R>,
{
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl<R> PartialOrd for Ref<R>
where
    R: Component,
    ComponentTraits: HasArenaContainer<R>,
{
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<R> Ord for Ref<R>
where
    R: Component,
    ComponentTraits: HasArenaContainer<R>,
{
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

/// An arena-like container for the schema components of a build session.
pub trait ComponentTable {
    /// Retrieves a component's value by reference from this component table.
    /// Panics if the component value is not present in the table.
    fn get<R>(&self, ref_: Ref<R>) -> &R
    where
        R: Component,
        ComponentTraits: HasArenaContainer<R>;

    fn toolkit_info(&self, id: ToolkitId) -> &ToolkitInfo;
}

/// The [component table](ComponentTable) used while toolkits are being built.
///
/// The individual container `Vec`s hold the components wrapped in `Option`s,
/// since components often need to reference themselves and thus are
/// constructed after the `Ref` itself.
#[derive(Default)]
pub struct ConstructionComponentTable {
    element_defs: Vec<Option<ElementDef>>,
    add_ons: Vec<Option<AddOn>>,
    attribute_defs: Vec<Option<AttributeDef>>,
    child_defs: Vec<Option<ChildDef>>,
    toolkits: Vec<ToolkitInfo>,
}

impl ComponentTable for ConstructionComponentTable {
    fn get<R>(&self, ref_: Ref<R>) -> &R
    where
        R: Component,
        ComponentTraits: HasArenaContainer<R>,
    {
        let container = ComponentTraits::get_container_from_construction_component_table(self);
        container
            .get(ref_.index())
            .expect("Invalid component reference (out-of-bounds)")
            .as_ref()
            .expect("Component is not present")
    }

    fn toolkit_info(&self, id: ToolkitId) -> &ToolkitInfo {
        &self.toolkits[id.0 as usize]
    }
}

impl ConstructionComponentTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a fresh construction table with every component of an already
    /// frozen table, preserving indices so that the frozen table's refs stay
    /// valid. Used to start each session from the reference toolkit
    /// prototype.
    pub fn from_base(base: &ToolkitComponentTable) -> Self {
        Self {
            element_defs: base.element_defs.iter().cloned().map(Some).collect(),
            add_ons: base.add_ons.iter().cloned().map(Some).collect(),
            attribute_defs: base.attribute_defs.iter().cloned().map(Some).collect(),
            child_defs: base.child_defs.iter().cloned().map(Some).collect(),
            toolkits: base.toolkits.to_vec(),
        }
    }

    pub fn add_toolkit(&mut self, info: ToolkitInfo) -> ToolkitId {
        let id = ToolkitId(
            self.toolkits
                .len()
                .try_into()
                .expect("Toolkit count did not fit into 32-bit integer"),
        );
        self.toolkits.push(info);
        id
    }

    /// Creates a [`Ref`] which points to an absent, reserved slot in the
    /// table.
    pub(crate) fn reserve<R>(&mut self) -> Ref<R>
    where
        R: Component,
        ComponentTraits: HasArenaContainer<R>,
    {
        let container = ComponentTraits::get_container_from_construction_component_table_mut(self);

        container.push(None);

        // The size is used for the ref's ID, which is non-zero after the push
        let size = NonZeroUsize::new(container.len()).unwrap();
        let id: NonZeroU32 = size.try_into().expect("ID did not fit into 32-bit integer");

        Ref::from_inner(id)
    }

    /// Inserts the `value` into the slot pointed to by `ref_`. Returns `ref_`
    /// for convenience.
    pub(crate) fn insert<R>(&mut self, ref_: Ref<R>, value: R) -> Ref<R>
    where
        R: Component,
        ComponentTraits: HasArenaContainer<R>,
    {
        let container = ComponentTraits::get_container_from_construction_component_table_mut(self);

        let slot = container
            .get_mut(ref_.index())
            .expect("Invalid component reference (out-of-bounds)");

        *slot = Some(value);

        ref_
    }

    /// Shorthand for `insert(reserve(), value)`
    pub(crate) fn create<R>(&mut self, value: R) -> Ref<R>
    where
        R: Component,
        ComponentTraits: HasArenaContainer<R>,
    {
        let ref_ = self.reserve();
        self.insert(ref_, value)
    }

    pub(crate) fn is_present<R>(&self, ref_: Ref<R>) -> bool
    where
        R: Component,
        ComponentTraits: HasArenaContainer<R>,
    {
        let container = ComponentTraits::get_container_from_construction_component_table(self);

        container
            .get(ref_.index())
            .expect("Invalid component reference (out-of-bounds)")
            .is_some()
    }

    /// Converts this construction table to a frozen
    /// [toolkit table](ToolkitComponentTable). Returns `None` if any reserved
    /// slot was never filled.
    pub(crate) fn freeze(self) -> Option<ToolkitComponentTable> {
        Some(ToolkitComponentTable {
            element_defs: Self::convert_container(self.element_defs)?,
            add_ons: Self::convert_container(self.add_ons)?,
            attribute_defs: Self::convert_container(self.attribute_defs)?,
            child_defs: Self::convert_container(self.child_defs)?,
            toolkits: self.toolkits.into_boxed_slice(),
        })
    }

    fn convert_container<R>(container: Vec<Option<R>>) -> Option<Box<[R]>> {
        let mut result = Vec::<R>::with_capacity(container.len());
        for component in container {
            result.push(component?);
        }
        Some(result.into_boxed_slice())
    }
}

/// The immutable [component table](ComponentTable) shared by every toolkit
/// closed in one session.
///
/// Components for which a [`Ref`] exists are always present in this table.
/// Since the table is read-only, the components are stored in boxed slices.
/// A frozen table may be read concurrently without synchronization.
pub struct ToolkitComponentTable {
    element_defs: Box<[ElementDef]>,
    add_ons: Box<[AddOn]>,
    attribute_defs: Box<[AttributeDef]>,
    child_defs: Box<[ChildDef]>,
    toolkits: Box<[ToolkitInfo]>,
}

impl ComponentTable for ToolkitComponentTable {
    fn get<R>(&self, ref_: Ref<R>) -> &R
    where
        R: Component,
        ComponentTraits: HasArenaContainer<R>,
    {
        let container = ComponentTraits::get_container_from_toolkit_component_table(self);
        container
            .get(ref_.index())
            .expect("Invalid component reference (out-of-bounds)")
    }

    fn toolkit_info(&self, id: ToolkitId) -> &ToolkitInfo {
        &self.toolkits[id.0 as usize]
    }
}

macro_rules! has_arena_container_impl {
    ($type_name:ty, $field_name:ident) => {
        impl HasArenaContainer<$type_name> for ComponentTraits {
            fn get_container_from_construction_component_table(
                table: &ConstructionComponentTable,
            ) -> &[Option<$type_name>] {
                &table.$field_name
            }

            fn get_container_from_construction_component_table_mut(
                table: &mut ConstructionComponentTable,
            ) -> &mut Vec<Option<$type_name>> {
                &mut table.$field_name
            }

            fn get_container_from_toolkit_component_table(
                table: &ToolkitComponentTable,
            ) -> &[$type_name] {
                &table.$field_name
            }
        }
    };
}

has_arena_container_impl!(ElementDef, element_defs);
has_arena_container_impl!(AddOn, add_ons);
has_arena_container_impl!(AttributeDef, attribute_defs);
has_arena_container_impl!(ChildDef, child_defs);
