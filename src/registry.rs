//! Known-schema registry.
//!
//! Negative ids in the record stream refer to a catalog of well-known types,
//! properties, strings and converters that the encoder and the decoder agree on
//! out of band. The decoder only sees that catalog through [`SchemaRegistry`];
//! [`StaticRegistry`] is a table-backed implementation that can be assembled in
//! code or loaded from a JSON catalog document.
//!
//! # Katalogformat
//!
//! ```json
//! {
//!   "assemblies": [{ "id": -1, "name": "Ui.Core" }],
//!   "types": [
//!     { "id": -1, "name": "Panel", "namespace": "urn:ui", "content_property": "Children",
//!       "properties": [{ "name": "Children", "type": "ChildList", "read_only": true }] },
//!     { "name": "ChildList", "namespace": "urn:ui", "flags": ["collection"] }
//!   ],
//!   "properties": [{ "id": -1, "owner": "Panel", "name": "Children" }],
//!   "strings": [{ "id": -1, "value": "Name" }],
//!   "converters": [{ "id": -1, "type": "BrushConverter" }]
//! }
//! ```
//!
//! Types are referenced by name. A referenced type must appear earlier in the
//! `types` array, except as a property value type, which may refer forward.

use std::rc::Rc;

use serde_json::Value;

use crate::schema::{PropertyDescriptor, TypeFlags, TypeInfo, TypeRef};
use crate::{Error, FastHashMap, Result};

/// Lookup interface for the out-of-band catalog. All ids are the raw negative
/// stream ids.
pub trait SchemaRegistry {
    fn lookup_known_type(&self, id: i16) -> Option<TypeRef>;

    /// Declaring type and member name.
    fn lookup_known_property(&self, id: i16) -> Option<(TypeRef, String)>;

    fn lookup_known_string(&self, id: i16) -> Option<String>;

    /// Converter type for a known converter id.
    fn create_known_converter(&self, id: i16) -> Option<TypeRef>;

    fn lookup_known_assembly(&self, _id: i16) -> Option<String> {
        None
    }

    /// Host reflection for types declared in the stream itself.
    ///
    /// `None` lets the resolver synthesize a plain descriptor without
    /// properties or flags.
    fn describe_type(&self, _assembly: &str, _clr_namespace: &str, _name: &str) -> Option<TypeRef> {
        None
    }
}

/// Registry without any known entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyRegistry;

impl SchemaRegistry for EmptyRegistry {
    fn lookup_known_type(&self, _id: i16) -> Option<TypeRef> {
        None
    }

    fn lookup_known_property(&self, _id: i16) -> Option<(TypeRef, String)> {
        None
    }

    fn lookup_known_string(&self, _id: i16) -> Option<String> {
        None
    }

    fn create_known_converter(&self, _id: i16) -> Option<TypeRef> {
        None
    }
}

/// Table-backed registry.
#[derive(Debug, Default, Clone)]
pub struct StaticRegistry {
    assemblies: FastHashMap<i16, String>,
    types: FastHashMap<i16, TypeRef>,
    properties: FastHashMap<i16, (TypeRef, String)>,
    strings: FastHashMap<i16, String>,
    converters: FastHashMap<i16, TypeRef>,
    /// Alle benannten Typen, auch solche ohne Id (fuer describe_type).
    by_name: FastHashMap<String, TypeRef>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_assembly(mut self, id: i16, name: impl Into<String>) -> Self {
        self.assemblies.insert(id, name.into());
        self
    }

    pub fn with_type(mut self, id: i16, ty: TypeRef) -> Self {
        self.by_name.insert(ty.name().to_owned(), Rc::clone(&ty));
        self.types.insert(id, ty);
        self
    }

    /// Named type without an id; found by [`SchemaRegistry::describe_type`].
    pub fn with_host_type(mut self, ty: TypeRef) -> Self {
        self.by_name.insert(ty.name().to_owned(), ty);
        self
    }

    pub fn with_property(mut self, id: i16, owner: TypeRef, name: impl Into<String>) -> Self {
        self.properties.insert(id, (owner, name.into()));
        self
    }

    pub fn with_string(mut self, id: i16, value: impl Into<String>) -> Self {
        self.strings.insert(id, value.into());
        self
    }

    pub fn with_converter(mut self, id: i16, converter: TypeRef) -> Self {
        self.converters.insert(id, converter);
        self
    }

    /// Any registered type by name.
    pub fn type_named(&self, name: &str) -> Option<&TypeRef> {
        self.by_name.get(name)
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Loads a catalog document (see module docs).
    pub fn from_json(json: &str) -> Result<Self> {
        let doc: Value = serde_json::from_str(json)
            .map_err(|e| Error::InvalidCatalog(format!("JSON parse error: {e}")))?;
        let root = doc
            .as_object()
            .ok_or_else(|| Error::InvalidCatalog("catalog root must be an object".into()))?;

        let mut reg = Self::new();
        for entry in array(root.get("assemblies"), "assemblies")? {
            reg = reg.with_assembly(id_field(entry)?, str_field(entry, "name")?);
        }

        let type_entries = array(root.get("types"), "types")?;
        // Erst Huellen ohne Properties, damit Property-Typen vorwaerts verweisen koennen.
        let mut shells: FastHashMap<String, TypeRef> = FastHashMap::default();
        for entry in type_entries {
            let ty = build_type(entry, &shells, &shells, false)?;
            shells.insert(ty.name().to_owned(), ty);
        }
        let mut finals: FastHashMap<String, TypeRef> = FastHashMap::default();
        for entry in type_entries {
            let ty = build_type(entry, &finals, &shells, true)?;
            finals.insert(ty.name().to_owned(), Rc::clone(&ty));
            reg = match opt_id_field(entry)? {
                Some(id) => reg.with_type(id, ty),
                None => reg.with_host_type(ty),
            };
        }

        for entry in array(root.get("properties"), "properties")? {
            let owner_name = str_field(entry, "owner")?;
            let owner = reg
                .type_named(owner_name)
                .cloned()
                .ok_or_else(|| Error::InvalidCatalog(format!("unknown owner type '{owner_name}'")))?;
            reg = reg.with_property(id_field(entry)?, owner, str_field(entry, "name")?);
        }
        for entry in array(root.get("strings"), "strings")? {
            reg = reg.with_string(id_field(entry)?, str_field(entry, "value")?);
        }
        for entry in array(root.get("converters"), "converters")? {
            let name = str_field(entry, "type")?;
            let converter = match reg.type_named(name) {
                Some(t) => Rc::clone(t),
                None => TypeInfo::builder(name, "").build(),
            };
            reg = reg.with_converter(id_field(entry)?, converter);
        }
        Ok(reg)
    }
}

impl SchemaRegistry for StaticRegistry {
    fn lookup_known_type(&self, id: i16) -> Option<TypeRef> {
        self.types.get(&id).cloned()
    }

    fn lookup_known_property(&self, id: i16) -> Option<(TypeRef, String)> {
        self.properties.get(&id).cloned()
    }

    fn lookup_known_string(&self, id: i16) -> Option<String> {
        self.strings.get(&id).cloned()
    }

    fn create_known_converter(&self, id: i16) -> Option<TypeRef> {
        self.converters.get(&id).cloned()
    }

    fn lookup_known_assembly(&self, id: i16) -> Option<String> {
        self.assemblies.get(&id).cloned()
    }

    fn describe_type(&self, assembly: &str, _clr_namespace: &str, name: &str) -> Option<TypeRef> {
        let ty = self.by_name.get(name)?;
        match ty.assembly() {
            Some(a) if a != assembly => None,
            _ => Some(Rc::clone(ty)),
        }
    }
}

impl<R: SchemaRegistry + ?Sized> SchemaRegistry for Rc<R> {
    fn lookup_known_type(&self, id: i16) -> Option<TypeRef> {
        (**self).lookup_known_type(id)
    }

    fn lookup_known_property(&self, id: i16) -> Option<(TypeRef, String)> {
        (**self).lookup_known_property(id)
    }

    fn lookup_known_string(&self, id: i16) -> Option<String> {
        (**self).lookup_known_string(id)
    }

    fn create_known_converter(&self, id: i16) -> Option<TypeRef> {
        (**self).create_known_converter(id)
    }

    fn lookup_known_assembly(&self, id: i16) -> Option<String> {
        (**self).lookup_known_assembly(id)
    }

    fn describe_type(&self, assembly: &str, clr_namespace: &str, name: &str) -> Option<TypeRef> {
        (**self).describe_type(assembly, clr_namespace, name)
    }
}

fn array<'a>(value: Option<&'a Value>, field: &str) -> Result<&'a [Value]> {
    match value {
        None => Ok(&[]),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(Error::InvalidCatalog(format!("'{field}' must be an array"))),
    }
}

fn str_field<'a>(entry: &'a Value, field: &str) -> Result<&'a str> {
    entry
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidCatalog(format!("missing string field '{field}'")))
}

fn opt_id_field(entry: &Value) -> Result<Option<i16>> {
    match entry.get("id") {
        None | Some(Value::Null) => Ok(None),
        Some(v) => {
            let id = v
                .as_i64()
                .and_then(|n| i16::try_from(n).ok())
                .ok_or_else(|| Error::InvalidCatalog(format!("id {v} is not a 16-bit integer")))?;
            if id >= 0 {
                return Err(Error::InvalidCatalog(format!("known id {id} must be negative")));
            }
            Ok(Some(id))
        }
    }
}

fn id_field(entry: &Value) -> Result<i16> {
    opt_id_field(entry)?.ok_or_else(|| Error::InvalidCatalog("missing field 'id'".into()))
}

fn parse_flags(entry: &Value) -> Result<TypeFlags> {
    let mut flags = TypeFlags::NONE;
    for flag in array(entry.get("flags"), "flags")? {
        flags = flags
            | match flag.as_str() {
                Some("collection") => TypeFlags::COLLECTION,
                Some("dictionary") => TypeFlags::DICTIONARY,
                Some("markup_extension") => TypeFlags::MARKUP_EXTENSION,
                Some("literal_conversion") => TypeFlags::LITERAL_CONVERSION,
                _ => return Err(Error::InvalidCatalog(format!("unknown type flag {flag}"))),
            };
    }
    Ok(flags)
}

/// Builds one type entry. Bases resolve against `known`, property types against
/// `known` first and `fallback` second.
fn build_type(
    entry: &Value,
    known: &FastHashMap<String, TypeRef>,
    fallback: &FastHashMap<String, TypeRef>,
    with_properties: bool,
) -> Result<TypeRef> {
    let name = str_field(entry, "name")?;
    let namespace = entry.get("namespace").and_then(Value::as_str).unwrap_or("");
    let mut builder = TypeInfo::builder(name, namespace).flags(parse_flags(entry)?);
    if let Some(assembly) = entry.get("assembly").and_then(Value::as_str) {
        builder = builder.assembly(assembly);
    }
    if let Some(base) = entry.get("base").and_then(Value::as_str) {
        let base = known
            .get(base)
            .ok_or_else(|| Error::InvalidCatalog(format!("base type '{base}' of '{name}' is not declared before it")))?;
        builder = builder.base(Rc::clone(base));
    }
    if let Some(content) = entry.get("content_property").and_then(Value::as_str) {
        builder = builder.content_property(content);
    }
    if with_properties {
        for prop in array(entry.get("properties"), "properties")? {
            let mut descriptor = PropertyDescriptor::new(str_field(prop, "name")?);
            if let Some(ty) = prop.get("type").and_then(Value::as_str) {
                let ty = known
                    .get(ty)
                    .or_else(|| fallback.get(ty))
                    .ok_or_else(|| Error::InvalidCatalog(format!("unknown property type '{ty}'")))?;
                descriptor = descriptor.with_value_type(Rc::clone(ty));
            }
            if prop.get("read_only").and_then(Value::as_bool).unwrap_or(false) {
                descriptor = descriptor.with_read_only();
            }
            if prop.get("defers_content").and_then(Value::as_bool).unwrap_or(false) {
                descriptor = descriptor.with_deferred_content();
            }
            builder = builder.property(descriptor);
        }
    }
    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"{
        "assemblies": [{ "id": -1, "name": "Ui.Core" }],
        "types": [
            { "id": -1, "name": "Panel", "namespace": "urn:ui", "content_property": "Children",
              "properties": [{ "name": "Children", "type": "ChildList", "read_only": true }] },
            { "name": "ChildList", "namespace": "urn:ui", "flags": ["collection"] },
            { "id": -2, "name": "StackPanel", "namespace": "urn:ui", "base": "Panel" },
            { "id": -3, "name": "Binding", "namespace": "urn:ui", "flags": ["markup_extension"] }
        ],
        "properties": [{ "id": -1, "owner": "Panel", "name": "Children" }],
        "strings": [{ "id": -1, "value": "Width" }],
        "converters": [{ "id": -1, "type": "BrushConverter" }]
    }"#;

    #[test]
    fn catalog_loads_all_sections() {
        let reg = StaticRegistry::from_json(CATALOG).unwrap();
        assert_eq!(reg.lookup_known_assembly(-1).as_deref(), Some("Ui.Core"));
        assert_eq!(reg.type_count(), 3);
        let stack = reg.lookup_known_type(-2).unwrap();
        assert_eq!(stack.content_property(), Some("Children"));
        let (owner, name) = reg.lookup_known_property(-1).unwrap();
        assert_eq!((owner.name(), name.as_str()), ("Panel", "Children"));
        assert_eq!(reg.lookup_known_string(-1).as_deref(), Some("Width"));
        assert_eq!(reg.create_known_converter(-1).unwrap().name(), "BrushConverter");
        assert!(reg.lookup_known_type(-9).is_none());
    }

    #[test]
    fn forward_property_type_is_resolved() {
        let reg = StaticRegistry::from_json(CATALOG).unwrap();
        let panel = reg.lookup_known_type(-1).unwrap();
        let (_, children) = panel.property("Children").unwrap();
        assert!(children.read_only);
        assert!(children.value_type.as_ref().is_some_and(|t| t.is_collection()));
    }

    #[test]
    fn host_types_are_described() {
        let reg = StaticRegistry::from_json(CATALOG).unwrap();
        assert!(reg.describe_type("Any", "Ui", "ChildList").is_some());
        assert!(reg.describe_type("Any", "Ui", "Missing").is_none());
    }

    #[test]
    fn positive_ids_are_rejected() {
        let err = StaticRegistry::from_json(r#"{"strings": [{"id": 3, "value": "x"}]}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidCatalog(_)), "{err}");
    }

    #[test]
    fn undeclared_base_is_rejected() {
        let json = r#"{"types": [{"id": -1, "name": "A", "base": "B"}]}"#;
        assert!(matches!(StaticRegistry::from_json(json), Err(Error::InvalidCatalog(_))));
    }

    #[test]
    fn builder_registry() {
        let t = TypeInfo::builder("Button", "urn:ui").build();
        let reg = StaticRegistry::new().with_type(-5, t.clone()).with_property(-7, t, "Content");
        assert_eq!(reg.lookup_known_type(-5).unwrap().name(), "Button");
        assert_eq!(reg.lookup_known_property(-7).unwrap().1, "Content");
        assert!(EmptyRegistry.lookup_known_type(-5).is_none());
    }
}
