//! Typed auxiliary data attached to arena nodes.
//!
//! Passes hang their products off existing nodes instead of widening the
//! definition records: the initialization pass records which field holds a
//! type's class pointer, the enum pass records underlying types, and so on.
//! Every attribute has its own [`SideTable`], keyed by the node id, so a
//! lookup can never confuse two kinds of data.
//!
//! Attaching to a node that already carries a datum is an error. Passes that
//! legitimately update a value go through [`SideTable::get_mut`] or
//! [`SideTable::get_or_default_mut`].

use std::{
    collections::{HashMap, HashSet},
    fmt,
    hash::Hash,
};

use crate::{
    assembly::{InstructionList, MethodBody},
    model::{AssemblyId, FieldId, MethodId, PropertyId, TypeId},
    typesystem::TypeExpr,
    Error, Result,
};

/// One auxiliary attribute, keyed by node.
#[derive(Debug, Clone)]
pub struct SideTable<K, V> {
    what: &'static str,
    entries: HashMap<K, V>,
}

impl<K, V> SideTable<K, V>
where
    K: Copy + Eq + Hash + fmt::Display,
{
    /// Creates an empty table; `what` names it in error messages.
    #[must_use]
    pub fn new(what: &'static str) -> Self {
        Self {
            what,
            entries: HashMap::new(),
        }
    }

    /// Attaches `value` to `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateData`] if `key` already carries a value.
    pub fn attach(&mut self, key: K, value: V) -> Result<()> {
        if self.entries.contains_key(&key) {
            return Err(Error::DuplicateData {
                what: self.what,
                node: key.to_string(),
            });
        }
        self.entries.insert(key, value);
        Ok(())
    }

    /// The value attached to `key`.
    #[must_use]
    pub fn get(&self, key: K) -> Option<&V> {
        self.entries.get(&key)
    }

    /// The value attached to `key`, mutably.
    pub fn get_mut(&mut self, key: K) -> Option<&mut V> {
        self.entries.get_mut(&key)
    }

    /// The value attached to `key`, which an earlier pass guarantees.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Invariant`] when the value is missing.
    pub fn require(&self, key: K) -> Result<&V> {
        self.entries
            .get(&key)
            .ok_or_else(|| invariant_error!("{} is missing its {}", key, self.what))
    }

    /// Returns `true` if `key` carries a value.
    #[must_use]
    pub fn contains(&self, key: K) -> bool {
        self.entries.contains_key(&key)
    }

    /// Detaches and returns the value of `key`.
    pub fn remove(&mut self, key: K) -> Option<V> {
        self.entries.remove(&key)
    }

    /// Number of attached values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over all entries in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }
}

impl<K, V> SideTable<K, V>
where
    K: Copy + Eq + Hash + fmt::Display,
    V: Default,
{
    /// The value of `key`, attaching a default first if absent.
    pub fn get_or_default_mut(&mut self, key: K) -> &mut V {
        self.entries.entry(key).or_default()
    }
}

/// A boolean attribute: a node is either marked or not.
#[derive(Debug, Clone)]
pub struct MarkSet<K: Eq + Hash> {
    marked: HashSet<K>,
}

impl<K: Eq + Hash> Default for MarkSet<K> {
    fn default() -> Self {
        Self {
            marked: HashSet::new(),
        }
    }
}

impl<K: Copy + Eq + Hash> MarkSet<K> {
    /// Marks `key`.
    pub fn mark(&mut self, key: K) {
        self.marked.insert(key);
    }

    /// Returns `true` if `key` is marked.
    #[must_use]
    pub fn is_marked(&self, key: K) -> bool {
        self.marked.contains(&key)
    }

    /// Number of marked nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.marked.len()
    }

    /// Returns `true` if nothing is marked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.marked.is_empty()
    }
}

/// How a type crosses the managed/native boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Blittability {
    /// Not classified yet; never survives the type-info pass.
    #[default]
    Unknown,
    /// A reference type, passed as an object pointer.
    ReferenceType,
    /// A value type whose layout is identical on both sides.
    BlittableValueType,
    /// A value type that has to be marshalled.
    NonBlittableValueType,
}

impl Blittability {
    /// Returns `true` for both value-type classifications.
    #[must_use]
    pub fn is_value_type(self) -> bool {
        matches!(self, Self::BlittableValueType | Self::NonBlittableValueType)
    }
}

/// Per-type layout facts computed by the type-info pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeInfo {
    /// Boundary classification.
    pub blittability: Blittability,
    /// Static, non-literal fields in declaration order.
    pub static_fields: Vec<FieldId>,
    /// Instance fields in declaration order.
    pub instance_fields: Vec<FieldId>,
}

/// The native and managed primitive behind an enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumUnderlying {
    /// `Il2CppSystem` primitive.
    pub il2cpp: TypeExpr,
    /// `System` primitive.
    pub mono: TypeExpr,
}

/// Delegate machinery of one internal call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ICallDelegate {
    /// Static field holding the resolved delegate.
    pub field: FieldId,
    /// `Invoke` of the delegate type.
    pub invoke: MethodId,
}

/// Getter and setter standing in for a removed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyAccessor {
    /// The synthesized property.
    pub property: PropertyId,
    /// Its getter.
    pub getter: MethodId,
    /// Its setter.
    pub setter: MethodId,
}

/// Every auxiliary attribute the passes produce.
#[derive(Debug, Clone)]
pub struct SideTables {
    /// Layout classification and field lists.
    pub type_info: SideTable<TypeId, TypeInfo>,
    /// Companion type whose static constructor resolves native handles.
    pub initialization_type: SideTable<TypeId, TypeId>,
    /// `Size` field of a value type's initialization type.
    pub size_storage: SideTable<TypeId, FieldId>,
    /// `FieldInfoPtr_*` field holding a field's native handle.
    pub field_info_storage: SideTable<FieldId, FieldId>,
    /// `FieldOffset_*` field holding a field's byte offset.
    pub offset_storage: SideTable<FieldId, FieldId>,
    /// Field holding a method's native handle.
    pub method_info_field: SideTable<MethodId, FieldId>,
    /// Resolved delegate of an internal call.
    pub icall_delegate: SideTable<MethodId, ICallDelegate>,
    /// Instructions queued for a type's static constructor.
    pub static_ctor_instructions: SideTable<TypeId, InstructionList>,
    /// `.ctor(ObjectPointer)` of a reference type.
    pub pointer_constructor: SideTable<TypeId, MethodId>,
    /// Property replacing a removed field.
    pub property_accessor: SideTable<FieldId, PropertyAccessor>,
    /// Managed exception wrapper of an `Il2CppSystem.Exception` subtype.
    pub system_exception_type: SideTable<TypeId, TypeId>,
    /// Underlying primitives of an enum.
    pub enum_underlying: SideTable<TypeId, EnumUnderlying>,
    /// Assemblies recovered from companion input.
    pub unstripped_assemblies: MarkSet<AssemblyId>,
    /// Types recovered from companion input.
    pub unstripped_types: MarkSet<TypeId>,
    /// Methods recovered from companion input.
    pub unstripped_methods: MarkSet<MethodId>,
    /// Fields recovered from companion input.
    pub unstripped_fields: MarkSet<FieldId>,
    /// Properties recovered from companion input.
    pub unstripped_properties: MarkSet<PropertyId>,
    /// Methods the managed runtime implements itself.
    pub runtime_implemented: MarkSet<MethodId>,
    /// Bodies recovered from companion input, operands resolved.
    pub original_bodies: SideTable<MethodId, MethodBody>,
    /// The body each method is finally emitted with.
    pub bodies: SideTable<MethodId, MethodBody>,
}

impl Default for SideTables {
    fn default() -> Self {
        Self {
            type_info: SideTable::new("type info"),
            initialization_type: SideTable::new("initialization type"),
            size_storage: SideTable::new("size storage"),
            field_info_storage: SideTable::new("field info storage"),
            offset_storage: SideTable::new("offset storage"),
            method_info_field: SideTable::new("method info field"),
            icall_delegate: SideTable::new("internal call delegate"),
            static_ctor_instructions: SideTable::new("static constructor instructions"),
            pointer_constructor: SideTable::new("pointer constructor"),
            property_accessor: SideTable::new("property accessor"),
            system_exception_type: SideTable::new("system exception type"),
            enum_underlying: SideTable::new("enum underlying types"),
            unstripped_assemblies: MarkSet::default(),
            unstripped_types: MarkSet::default(),
            unstripped_methods: MarkSet::default(),
            unstripped_fields: MarkSet::default(),
            unstripped_properties: MarkSet::default(),
            runtime_implemented: MarkSet::default(),
            original_bodies: SideTable::new("original body"),
            bodies: SideTable::new("body"),
        }
    }
}

impl SideTables {
    /// Blittability of a type, [`Blittability::Unknown`] before the type-info pass.
    #[must_use]
    pub fn blittability(&self, ty: TypeId) -> Blittability {
        self.type_info
            .get(ty)
            .map_or(Blittability::Unknown, |info| info.blittability)
    }

    /// Returns `true` if a method received a translated body.
    #[must_use]
    pub fn has_translated_body(&self, method: MethodId) -> bool {
        self.bodies
            .get(method)
            .is_some_and(|b| b.kind == crate::assembly::BodyKind::Translated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_twice_is_rejected() {
        let mut table: SideTable<TypeId, u32> = SideTable::new("size storage");
        let ty = TypeId::from_index(4);
        table.attach(ty, 1).unwrap();
        match table.attach(ty, 2) {
            Err(Error::DuplicateData { what, node }) => {
                assert_eq!(what, "size storage");
                assert_eq!(node, "type#4");
            }
            other => panic!("expected duplicate error, got {other:?}"),
        }
        assert_eq!(table.get(ty), Some(&1));
    }

    #[test]
    fn require_reports_invariant() {
        let table: SideTable<MethodId, FieldId> = SideTable::new("method info field");
        let err = table.require(MethodId::from_index(0)).unwrap_err();
        assert!(matches!(err, Error::Invariant { .. }));
        assert!(err.to_string().contains("method#0 is missing its method info field"));
    }

    #[test]
    fn default_slot_accumulates() {
        let mut table: SideTable<TypeId, Vec<u8>> = SideTable::new("bytes");
        let ty = TypeId::from_index(1);
        table.get_or_default_mut(ty).push(1);
        table.get_or_default_mut(ty).push(2);
        assert_eq!(table.get(ty).map(Vec::len), Some(2));
        assert_eq!(table.remove(ty), Some(vec![1, 2]));
        assert!(table.is_empty());
    }

    #[test]
    fn side_tables_start_empty() {
        let tables = SideTables::default();
        assert!(tables.unstripped_methods.is_empty());
        assert!(!tables.runtime_implemented.is_marked(MethodId::from_index(0)));
        assert!(tables.bodies.is_empty());
    }

    #[test]
    fn marks() {
        let mut marks: MarkSet<MethodId> = MarkSet::default();
        let m = MethodId::from_index(9);
        assert!(!marks.is_marked(m));
        marks.mark(m);
        marks.mark(m);
        assert!(marks.is_marked(m));
        assert_eq!(marks.len(), 1);
    }
}
