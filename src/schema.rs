//! Type and member descriptors.
//!
//! Descriptors are what ids resolve to: [`TypeInfo`] for object types,
//! [`MemberInfo`] for properties and language directives. They carry just the
//! facts the node synthesizer needs for its structural decisions (content
//! property, collection/dictionary shape, literal conversion, assignability,
//! read-only and deferred-content members). Everything is immutable once built
//! and shared as `Rc`.
//!
//! # Beispiel
//!
//! ```
//! use cmrx::schema::{TypeFlags, TypeInfo};
//!
//! let panel = TypeInfo::builder("Panel", "urn:ui")
//!     .content_property("Children")
//!     .build();
//! let stack = TypeInfo::builder("StackPanel", "urn:ui").base(panel.clone()).build();
//!
//! assert!(panel.is_assignable_from(&stack));
//! assert_eq!(stack.content_property(), Some("Children"));
//! assert!(!stack.has_flag(TypeFlags::COLLECTION));
//! ```

use std::fmt;
use std::ops::BitOr;
use std::rc::Rc;

use crate::FastIndexMap;

/// XML namespace of the markup language itself (directives, built-in extensions).
pub const LANGUAGE_NAMESPACE: &str = "http://schemas.microsoft.com/winfx/2006/xaml";

/// Directive names in [`LANGUAGE_NAMESPACE`].
pub mod directive {
    pub const ITEMS: &str = "Items";
    pub const INITIALIZATION: &str = "Initialization";
    pub const POSITIONAL_PARAMETERS: &str = "PositionalParameters";
    pub const ARGUMENTS: &str = "Arguments";
    pub const KEY: &str = "Key";
    pub const NAME: &str = "Name";
    pub const UID: &str = "Uid";
    pub const CONNECTION_ID: &str = "ConnectionId";
    pub const FREEZE: &str = "Freeze";
    pub const DEFERRED_CONTENT: &str = "DeferredContent";
}

/// Shared type descriptor.
pub type TypeRef = Rc<TypeInfo>;

/// Shared member descriptor.
pub type MemberRef = Rc<MemberInfo>;

/// Shape flags of a type. Inherited through the base chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct TypeFlags(u8);

impl TypeFlags {
    pub const NONE: Self = Self(0);
    /// Accepts items through `x:Items`.
    pub const COLLECTION: Self = Self(0x01);
    /// Accepts keyed items through `x:Items`.
    pub const DICTIONARY: Self = Self(0x02);
    /// Is a markup extension (value provider).
    pub const MARKUP_EXTENSION: Self = Self(0x04);
    /// Can be created from text through `x:Initialization`.
    pub const LITERAL_CONVERSION: Self = Self(0x08);

    pub fn contains(self, other: Self) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for TypeFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Property of a type as the type itself declares it.
#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
    pub name: String,
    /// `None` accepts any value.
    pub value_type: Option<TypeRef>,
    pub read_only: bool,
    /// Content of this member is captured as a whole (templates).
    pub defers_content: bool,
}

impl PropertyDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), value_type: None, read_only: false, defers_content: false }
    }

    pub fn with_value_type(mut self, value_type: TypeRef) -> Self {
        self.value_type = Some(value_type);
        self
    }

    pub fn with_read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn with_deferred_content(mut self) -> Self {
        self.defers_content = true;
        self
    }
}

/// Object type descriptor.
#[derive(Debug)]
pub struct TypeInfo {
    name: String,
    namespace: String,
    assembly: Option<String>,
    base: Option<TypeRef>,
    flags: TypeFlags,
    content_property: Option<String>,
    properties: FastIndexMap<String, PropertyDescriptor>,
}

impl TypeInfo {
    pub fn builder(name: impl Into<String>, namespace: impl Into<String>) -> TypeInfoBuilder {
        TypeInfoBuilder {
            info: TypeInfo {
                name: name.into(),
                namespace: namespace.into(),
                assembly: None,
                base: None,
                flags: TypeFlags::NONE,
                content_property: None,
                properties: FastIndexMap::default(),
            },
        }
    }

    /// Built-in type of the markup language (`x:Type`, `x:Static`, ...).
    pub fn language(name: &str, flags: TypeFlags) -> TypeRef {
        Self::builder(name, LANGUAGE_NAMESPACE).flags(flags).build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// XML namespace the type lives in.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn assembly(&self) -> Option<&str> {
        self.assembly.as_deref()
    }

    pub fn base(&self) -> Option<&TypeRef> {
        self.base.as_ref()
    }

    /// Own flags only; see [`TypeInfo::has_flag`] for inherited ones.
    pub fn flags(&self) -> TypeFlags {
        self.flags
    }

    /// Same namespace and name.
    pub fn same_type(&self, other: &TypeInfo) -> bool {
        std::ptr::eq(self, other) || (self.name == other.name && self.namespace == other.namespace)
    }

    /// Walks `self` and its bases.
    pub fn ancestors(&self) -> impl Iterator<Item = &TypeInfo> {
        let mut next = Some(self);
        std::iter::from_fn(move || {
            let current = next?;
            next = current.base.as_deref();
            Some(current)
        })
    }

    pub fn has_flag(&self, flag: TypeFlags) -> bool {
        self.ancestors().any(|t| t.flags.contains(flag))
    }

    pub fn is_collection(&self) -> bool {
        self.has_flag(TypeFlags::COLLECTION)
    }

    pub fn is_dictionary(&self) -> bool {
        self.has_flag(TypeFlags::DICTIONARY)
    }

    pub fn is_markup_extension(&self) -> bool {
        self.has_flag(TypeFlags::MARKUP_EXTENSION)
    }

    pub fn has_literal_conversion(&self) -> bool {
        self.has_flag(TypeFlags::LITERAL_CONVERSION)
    }

    /// Designated content member, possibly inherited.
    pub fn content_property(&self) -> Option<&str> {
        self.ancestors().find_map(|t| t.content_property.as_deref())
    }

    /// Property lookup through the base chain. Returns the declaring type too.
    pub fn property(&self, name: &str) -> Option<(&TypeInfo, &PropertyDescriptor)> {
        self.ancestors().find_map(|t| t.properties.get(name).map(|p| (t, p)))
    }

    /// Properties declared on this type itself, in declaration order.
    pub fn declared_properties(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.properties.values()
    }

    /// True when a value of type `other` can be stored where `self` is expected.
    pub fn is_assignable_from(&self, other: &TypeInfo) -> bool {
        other.ancestors().any(|t| t.same_type(self))
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{{{}}}{}", self.namespace, self.name)
        }
    }
}

/// Builder for [`TypeInfo`].
#[derive(Debug)]
pub struct TypeInfoBuilder {
    info: TypeInfo,
}

impl TypeInfoBuilder {
    pub fn assembly(mut self, assembly: impl Into<String>) -> Self {
        self.info.assembly = Some(assembly.into());
        self
    }

    pub fn base(mut self, base: TypeRef) -> Self {
        self.info.base = Some(base);
        self
    }

    pub fn flags(mut self, flags: TypeFlags) -> Self {
        self.info.flags = self.info.flags | flags;
        self
    }

    pub fn content_property(mut self, name: impl Into<String>) -> Self {
        self.info.content_property = Some(name.into());
        self
    }

    pub fn property(mut self, property: PropertyDescriptor) -> Self {
        self.info.properties.insert(property.name.clone(), property);
        self
    }

    pub fn build(self) -> TypeRef {
        Rc::new(self.info)
    }
}

/// How a member relates to the object it is set on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// Declared by the object's type or one of its bases.
    Regular,
    /// Declared by an unrelated type and attached to the object.
    Attachable,
    /// Language directive (`x:Key`, `x:Items`, ...).
    Directive,
}

/// Member descriptor as it appears in the node stream.
#[derive(Debug, Clone)]
pub struct MemberInfo {
    name: String,
    kind: MemberKind,
    declaring_type: Option<TypeRef>,
    namespace: String,
    value_type: Option<TypeRef>,
    read_only: bool,
    defers_content: bool,
}

impl MemberInfo {
    /// Member `name` of `declaring_type`; flags come from its property descriptor, if any.
    pub fn property(declaring_type: TypeRef, name: impl Into<String>, kind: MemberKind) -> MemberRef {
        let name = name.into();
        let (value_type, read_only, defers_content) = match declaring_type.property(&name) {
            Some((_, p)) => (p.value_type.clone(), p.read_only, p.defers_content),
            None => (None, false, false),
        };
        Rc::new(Self {
            namespace: declaring_type.namespace().to_owned(),
            name,
            kind,
            declaring_type: Some(declaring_type),
            value_type,
            read_only,
            defers_content,
        })
    }

    /// Directive `name` in [`LANGUAGE_NAMESPACE`].
    pub fn directive(name: impl Into<String>) -> MemberRef {
        Rc::new(Self {
            name: name.into(),
            kind: MemberKind::Directive,
            declaring_type: None,
            namespace: LANGUAGE_NAMESPACE.to_owned(),
            value_type: None,
            read_only: false,
            defers_content: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    pub fn declaring_type(&self) -> Option<&TypeRef> {
        self.declaring_type.as_ref()
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn value_type(&self) -> Option<&TypeRef> {
        self.value_type.as_ref()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn defers_content(&self) -> bool {
        self.defers_content
    }

    pub fn is_directive(&self, name: &str) -> bool {
        self.kind == MemberKind::Directive && self.name == name
    }

    /// Same member with a different kind (regular vs attachable).
    pub fn with_kind(&self, kind: MemberKind) -> MemberRef {
        let mut m = self.clone();
        m.kind = kind;
        Rc::new(m)
    }
}

impl PartialEq for MemberInfo {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.name == other.name
            && self.namespace == other.namespace
            && match (&self.declaring_type, &other.declaring_type) {
                (Some(a), Some(b)) => a.same_type(b),
                (None, None) => true,
                _ => false,
            }
    }
}

impl fmt::Display for MemberInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.kind, &self.declaring_type) {
            (MemberKind::Directive, _) => write!(f, "x:{}", self.name),
            (MemberKind::Attachable, Some(t)) => write!(f, "{}.{}", t.name(), self.name),
            _ => f.write_str(&self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object() -> TypeRef {
        TypeInfo::builder("Object", "urn:sys").build()
    }

    #[test]
    fn properties_keep_declaration_order() {
        let ty = TypeInfo::builder("Grid", "urn:ui")
            .property(PropertyDescriptor::new("Rows"))
            .property(PropertyDescriptor::new("Columns"))
            .property(PropertyDescriptor::new("Children"))
            .build();
        let names: Vec<&str> = ty.declared_properties().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Rows", "Columns", "Children"]);
    }

    #[test]
    fn flags_are_inherited() {
        let list = TypeInfo::builder("List", "urn:sys").flags(TypeFlags::COLLECTION).build();
        let derived = TypeInfo::builder("Items", "urn:ui").base(list).build();
        assert!(derived.is_collection());
        assert!(!derived.is_dictionary());
        assert_eq!(derived.flags(), TypeFlags::NONE);
    }

    #[test]
    fn assignability_follows_base_chain() {
        let obj = object();
        let a = TypeInfo::builder("A", "urn:t").base(obj.clone()).build();
        let b = TypeInfo::builder("B", "urn:t").base(a.clone()).build();
        assert!(obj.is_assignable_from(&b));
        assert!(a.is_assignable_from(&b));
        assert!(!b.is_assignable_from(&a));
        assert!(b.is_assignable_from(&b));
    }

    #[test]
    fn same_name_in_other_namespace_is_distinct() {
        let a = TypeInfo::builder("Brush", "urn:one").build();
        let b = TypeInfo::builder("Brush", "urn:two").build();
        assert!(!a.is_assignable_from(&b));
    }

    #[test]
    fn member_takes_descriptor_flags() {
        let children = TypeInfo::builder("ChildList", "urn:ui").flags(TypeFlags::COLLECTION).build();
        let panel = TypeInfo::builder("Panel", "urn:ui")
            .property(PropertyDescriptor::new("Children").with_value_type(children).with_read_only())
            .build();
        let m = MemberInfo::property(panel, "Children", MemberKind::Regular);
        assert!(m.is_read_only());
        assert!(m.value_type().is_some_and(|t| t.is_collection()));
        assert_eq!(m.to_string(), "Children");
    }

    #[test]
    fn inherited_property_lookup_reports_declaring_type() {
        let base = TypeInfo::builder("Control", "urn:ui")
            .property(PropertyDescriptor::new("Template").with_deferred_content())
            .build();
        let button = TypeInfo::builder("Button", "urn:ui").base(base).build();
        let (declaring, p) = button.property("Template").unwrap();
        assert_eq!(declaring.name(), "Control");
        assert!(p.defers_content);
        assert!(button.property("Missing").is_none());
    }

    #[test]
    fn directive_display_and_match() {
        let key = MemberInfo::directive(directive::KEY);
        assert!(key.is_directive("Key"));
        assert_eq!(key.to_string(), "x:Key");
        assert_eq!(key.namespace(), LANGUAGE_NAMESPACE);
    }

    #[test]
    fn attachable_display() {
        let grid = TypeInfo::builder("Grid", "urn:ui").build();
        let row = MemberInfo::property(grid, "Row", MemberKind::Attachable);
        assert_eq!(row.to_string(), "Grid.Row");
        assert_ne!(*row, *row.with_kind(MemberKind::Regular));
    }
}
