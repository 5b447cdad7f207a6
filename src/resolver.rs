//! Incremental id resolver.
//!
//! Records refer to assemblies, types, properties and strings by small integer
//! ids. Negative ids belong to the known catalog ([`SchemaRegistry`]); all
//! others are declared by records earlier in the same stream and stored in
//! append-only tables whose index is the id.
//!
//! Tabellen-Regeln (pro Session):
//! - Id == Laenge: anhaengen
//! - Id < Laenge: Duplikat, ignoriert (debug-Log)
//! - Id > Laenge oder negativ: [`Error::OutOfOrderDeclaration`]
//!
//! Property ids resolve in two phases: the declaring type and the type of the
//! object the member is set on decide between a regular and an attachable
//! member. Only such context-bound results are memoized.

use std::rc::Rc;

use crate::error::DescriptorKind;
use crate::record::TYPE_INFO_ASSEMBLY_MASK;
use crate::registry::SchemaRegistry;
use crate::schema::{MemberInfo, MemberKind, MemberRef, TypeFlags, TypeInfo, TypeRef};
use crate::{Error, FastHashMap, Result};

#[derive(Debug)]
struct DeclaredType {
    name: String,
    assembly_id: i16,
    serializer_id: Option<i16>,
    resolved: Option<TypeRef>,
}

#[derive(Debug)]
struct DeclaredProperty {
    owner_type_id: i16,
    name: String,
}

/// `PIMapping` declaration: XML namespace for a CLR namespace in an assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceMapping {
    pub xml_namespace: String,
    pub clr_namespace: String,
    pub assembly_id: i16,
}

/// Built-in language types used by extension expansion.
#[derive(Debug, Clone)]
pub struct LanguageTypes {
    /// `x:Type`
    pub type_extension: TypeRef,
    /// `x:Static`
    pub static_extension: TypeRef,
    /// `x:StaticResource`
    pub static_resource: TypeRef,
}

impl LanguageTypes {
    fn new() -> Self {
        Self {
            type_extension: TypeInfo::language("Type", TypeFlags::MARKUP_EXTENSION),
            static_extension: TypeInfo::language("Static", TypeFlags::MARKUP_EXTENSION),
            static_resource: TypeInfo::language("StaticResource", TypeFlags::MARKUP_EXTENSION),
        }
    }
}

/// Id resolver for one decoding session.
pub struct SchemaResolver {
    registry: Rc<dyn SchemaRegistry>,
    assemblies: Vec<String>,
    types: Vec<DeclaredType>,
    properties: Vec<DeclaredProperty>,
    strings: Vec<String>,
    mappings: Vec<NamespaceMapping>,
    /// Kontextgebundene Property-Aufloesungen, fuer bekannte und deklarierte Ids.
    members: FastHashMap<i16, MemberRef>,
    language: LanguageTypes,
}

impl SchemaResolver {
    pub fn new(registry: Rc<dyn SchemaRegistry>) -> Self {
        Self {
            registry,
            assemblies: Vec::new(),
            types: Vec::new(),
            properties: Vec::new(),
            strings: Vec::new(),
            mappings: Vec::new(),
            members: FastHashMap::default(),
            language: LanguageTypes::new(),
        }
    }

    pub fn registry(&self) -> &Rc<dyn SchemaRegistry> {
        &self.registry
    }

    pub fn language(&self) -> &LanguageTypes {
        &self.language
    }

    /// Clears all declared tables and memoized results.
    pub fn reset(&mut self) {
        self.assemblies.clear();
        self.types.clear();
        self.properties.clear();
        self.strings.clear();
        self.mappings.clear();
        self.members.clear();
    }

    /// Declared table lengths: assemblies, types, properties, strings.
    pub fn table_lengths(&self) -> [usize; 4] {
        [self.assemblies.len(), self.types.len(), self.properties.len(), self.strings.len()]
    }

    // --- Deklarationen ---------------------------------------------------------

    pub fn declare_assembly(&mut self, id: i16, name: String) -> Result<()> {
        if check_declaration(DescriptorKind::Assembly, id, self.assemblies.len())? {
            self.assemblies.push(name);
        }
        Ok(())
    }

    /// Declares an in-stream type. Only the low 12 bits of a non-negative
    /// `assembly_id` are the id.
    pub fn declare_type(
        &mut self,
        id: i16,
        assembly_id: i16,
        name: String,
        serializer_id: Option<i16>,
    ) -> Result<()> {
        if check_declaration(DescriptorKind::Type, id, self.types.len())? {
            self.types.push(DeclaredType {
                name,
                assembly_id: if assembly_id < 0 {
                    assembly_id
                } else {
                    assembly_id & TYPE_INFO_ASSEMBLY_MASK
                },
                serializer_id,
                resolved: None,
            });
        }
        Ok(())
    }

    pub fn declare_property(&mut self, id: i16, owner_type_id: i16, name: String) -> Result<()> {
        if check_declaration(DescriptorKind::Property, id, self.properties.len())? {
            self.properties.push(DeclaredProperty { owner_type_id, name });
        }
        Ok(())
    }

    pub fn declare_string(&mut self, id: i16, value: String) -> Result<()> {
        if check_declaration(DescriptorKind::String, id, self.strings.len())? {
            self.strings.push(value);
        }
        Ok(())
    }

    pub fn declare_namespace_mapping(
        &mut self,
        xml_namespace: String,
        clr_namespace: String,
        assembly_id: i16,
    ) {
        let mapping = NamespaceMapping { xml_namespace, clr_namespace, assembly_id };
        if !self.mappings.contains(&mapping) {
            self.mappings.push(mapping);
        }
    }

    // --- Aufloesung ------------------------------------------------------------

    pub fn resolve_assembly(&self, id: i16) -> Result<String> {
        let found = if id < 0 {
            self.registry.lookup_known_assembly(id)
        } else {
            self.assemblies.get(id as usize).cloned()
        };
        found.ok_or(Error::DescriptorNotFound { kind: DescriptorKind::Assembly, id })
    }

    pub fn resolve_string(&self, id: i16) -> Result<String> {
        let found = if id < 0 {
            self.registry.lookup_known_string(id)
        } else {
            self.strings.get(id as usize).cloned()
        };
        found.ok_or(Error::DescriptorNotFound { kind: DescriptorKind::String, id })
    }

    pub fn resolve_type(&mut self, id: i16) -> Result<TypeRef> {
        if id < 0 {
            return self
                .registry
                .lookup_known_type(id)
                .ok_or(Error::DescriptorNotFound { kind: DescriptorKind::Type, id });
        }
        let idx = id as usize;
        let decl = self
            .types
            .get(idx)
            .ok_or(Error::DescriptorNotFound { kind: DescriptorKind::Type, id })?;
        if let Some(t) = &decl.resolved {
            return Ok(Rc::clone(t));
        }
        let (name, assembly_id) = (decl.name.clone(), decl.assembly_id);
        let ty = self.build_declared_type(&name, assembly_id)?;
        self.types[idx].resolved = Some(Rc::clone(&ty));
        Ok(ty)
    }

    /// Serializer id a declared type was declared with (`TypeSerializerInfo`).
    pub fn type_serializer(&self, id: i16) -> Option<i16> {
        if id < 0 {
            return None;
        }
        self.types.get(id as usize).and_then(|t| t.serializer_id)
    }

    /// Converter type. Known converters come from the registry, others are
    /// ordinary declared types.
    pub fn resolve_converter(&mut self, id: i16) -> Result<TypeRef> {
        if id < 0 {
            return self
                .registry
                .create_known_converter(id)
                .ok_or(Error::DescriptorNotFound { kind: DescriptorKind::Converter, id });
        }
        self.resolve_type(id).map_err(|e| match e {
            Error::DescriptorNotFound { id, .. } => {
                Error::DescriptorNotFound { kind: DescriptorKind::Converter, id }
            }
            other => other,
        })
    }

    /// Resolves property `id` as set on an object of type `context`.
    ///
    /// Without context the member is reported as regular and not memoized.
    pub fn resolve_property(&mut self, id: i16, context: Option<&TypeInfo>) -> Result<MemberRef> {
        if let Some(m) = self.members.get(&id) {
            return Ok(Rc::clone(m));
        }
        let (declaring, name) = self.property_declaration(id)?;
        let Some(context) = context else {
            return Ok(MemberInfo::property(declaring, name, MemberKind::Regular));
        };
        let kind = if declaring.is_assignable_from(context) {
            MemberKind::Regular
        } else {
            MemberKind::Attachable
        };
        let member = MemberInfo::property(declaring, name, kind);
        self.members.insert(id, Rc::clone(&member));
        Ok(member)
    }

    /// Declaring type and name of property `id`, without the context phase.
    pub fn property_declaration(&mut self, id: i16) -> Result<(TypeRef, String)> {
        if id < 0 {
            return self
                .registry
                .lookup_known_property(id)
                .ok_or(Error::DescriptorNotFound { kind: DescriptorKind::Property, id });
        }
        let decl = self
            .properties
            .get(id as usize)
            .ok_or(Error::DescriptorNotFound { kind: DescriptorKind::Property, id })?;
        let (owner, name) = (decl.owner_type_id, decl.name.clone());
        Ok((self.resolve_type(owner)?, name))
    }

    /// XML namespace for `clr_namespace` in assembly `assembly_id`, if mapped.
    pub fn mapped_namespace(&self, clr_namespace: &str, assembly_id: i16) -> Option<&str> {
        self.mappings
            .iter()
            .find(|m| m.clr_namespace == clr_namespace && m.assembly_id == assembly_id)
            .map(|m| m.xml_namespace.as_str())
    }

    fn build_declared_type(&self, full_name: &str, assembly_id: i16) -> Result<TypeRef> {
        let assembly = self.resolve_assembly(assembly_id)?;
        let (clr_namespace, name) = match full_name.rfind('.') {
            Some(i) => (&full_name[..i], &full_name[i + 1..]),
            None => ("", full_name),
        };
        if let Some(t) = self.registry.describe_type(&assembly, clr_namespace, name) {
            return Ok(t);
        }
        let namespace = match self.mapped_namespace(clr_namespace, assembly_id) {
            Some(ns) => ns.to_owned(),
            None => format!("clr-namespace:{clr_namespace};assembly={assembly}"),
        };
        Ok(TypeInfo::builder(name, namespace).assembly(assembly).build())
    }
}

impl std::fmt::Debug for SchemaResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaResolver")
            .field("assemblies", &self.assemblies.len())
            .field("types", &self.types.len())
            .field("properties", &self.properties.len())
            .field("strings", &self.strings.len())
            .field("mappings", &self.mappings.len())
            .finish()
    }
}

/// `Ok(true)` to append, `Ok(false)` for an ignored duplicate.
fn check_declaration(kind: DescriptorKind, id: i16, len: usize) -> Result<bool> {
    if id < 0 || id as usize > len {
        return Err(Error::OutOfOrderDeclaration { kind, id, expected: len });
    }
    if (id as usize) < len {
        log::debug!("duplicate {kind} declaration {id} ignored");
        return Ok(false);
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::StaticRegistry;
    use crate::schema::PropertyDescriptor;

    fn resolver() -> SchemaResolver {
        let control = TypeInfo::builder("Control", "urn:ui")
            .property(PropertyDescriptor::new("Width"))
            .build();
        let button = TypeInfo::builder("Button", "urn:ui").base(control.clone()).build();
        let grid = TypeInfo::builder("Grid", "urn:ui").build();
        let reg = StaticRegistry::new()
            .with_assembly(-1, "Ui")
            .with_type(-1, control.clone())
            .with_type(-2, button)
            .with_type(-3, grid.clone())
            .with_property(-1, control, "Width")
            .with_property(-2, grid, "Row")
            .with_string(-1, "known");
        SchemaResolver::new(Rc::new(reg))
    }

    #[test]
    fn sequential_declarations_append() {
        let mut r = resolver();
        r.declare_string(0, "a".into()).unwrap();
        r.declare_string(1, "b".into()).unwrap();
        assert_eq!(r.resolve_string(1).unwrap(), "b");
        assert_eq!(r.resolve_string(-1).unwrap(), "known");
    }

    #[test]
    fn duplicate_declaration_is_ignored() {
        let mut r = resolver();
        r.declare_string(0, "first".into()).unwrap();
        r.declare_string(0, "second".into()).unwrap();
        assert_eq!(r.resolve_string(0).unwrap(), "first");
        assert_eq!(r.table_lengths()[3], 1);
    }

    #[test]
    fn skipped_or_negative_declaration_fails() {
        let mut r = resolver();
        assert_eq!(
            r.declare_assembly(2, "x".into()),
            Err(Error::OutOfOrderDeclaration { kind: DescriptorKind::Assembly, id: 2, expected: 0 })
        );
        assert!(matches!(
            r.declare_type(-4, 0, "T".into(), None),
            Err(Error::OutOfOrderDeclaration { id: -4, .. })
        ));
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let mut r = resolver();
        assert_eq!(
            r.resolve_type(-99).unwrap_err(),
            Error::DescriptorNotFound { kind: DescriptorKind::Type, id: -99 }
        );
        assert_eq!(
            r.resolve_string(0).unwrap_err(),
            Error::DescriptorNotFound { kind: DescriptorKind::String, id: 0 }
        );
        assert!(matches!(
            r.resolve_converter(-3),
            Err(Error::DescriptorNotFound { kind: DescriptorKind::Converter, .. })
        ));
    }

    #[test]
    fn declared_type_uses_namespace_mapping() {
        let mut r = resolver();
        r.declare_assembly(0, "App".into()).unwrap();
        r.declare_type(0, 0, "App.Views.Card".into(), None).unwrap();
        r.declare_type(1, 0, "App.Other.Tile".into(), Some(-2)).unwrap();
        r.declare_namespace_mapping("urn:app".into(), "App.Views".into(), 0);

        let card = r.resolve_type(0).unwrap();
        assert_eq!(card.name(), "Card");
        assert_eq!(card.namespace(), "urn:app");
        let tile = r.resolve_type(1).unwrap();
        assert_eq!(tile.namespace(), "clr-namespace:App.Other;assembly=App");
        assert_eq!(r.type_serializer(1), Some(-2));
    }

    #[test]
    fn assembly_flag_bits_are_masked() {
        let mut r = resolver();
        r.declare_assembly(0, "App".into()).unwrap();
        r.declare_type(0, 0x1000, "App.Card".into(), None).unwrap();
        assert_eq!(r.resolve_type(0).unwrap().assembly(), Some("App"));
    }

    #[test]
    fn property_kind_depends_on_context() {
        let mut r = resolver();
        let button = r.resolve_type(-2).unwrap();
        let width = r.resolve_property(-1, Some(&*button)).unwrap();
        assert_eq!(width.kind(), MemberKind::Regular);
        let row = r.resolve_property(-2, Some(&*button)).unwrap();
        assert_eq!(row.kind(), MemberKind::Attachable);
    }

    #[test]
    fn only_contextual_lookups_are_memoized() {
        let mut r = resolver();
        let grid = r.resolve_type(-3).unwrap();
        let button = r.resolve_type(-2).unwrap();

        let free = r.resolve_property(-2, None).unwrap();
        assert_eq!(free.kind(), MemberKind::Regular);
        let bound = r.resolve_property(-2, Some(&*button)).unwrap();
        assert_eq!(bound.kind(), MemberKind::Attachable);
        // memoized: a later context does not change the answer
        let again = r.resolve_property(-2, Some(&*grid)).unwrap();
        assert!(Rc::ptr_eq(&bound, &again));
    }

    #[test]
    fn declared_property_on_declared_type() {
        let mut r = resolver();
        r.declare_assembly(0, "App".into()).unwrap();
        r.declare_type(0, 0, "App.Card".into(), None).unwrap();
        r.declare_property(0, 0, "Title".into()).unwrap();
        let card = r.resolve_type(0).unwrap();
        let title = r.resolve_property(0, Some(&*card)).unwrap();
        assert_eq!(title.name(), "Title");
        assert_eq!(title.kind(), MemberKind::Regular);
    }

    #[test]
    fn reset_clears_tables() {
        let mut r = resolver();
        r.declare_string(0, "a".into()).unwrap();
        r.reset();
        assert_eq!(r.table_lengths(), [0; 4]);
        r.declare_string(0, "b".into()).unwrap();
        assert_eq!(r.resolve_string(0).unwrap(), "b");
    }
}
