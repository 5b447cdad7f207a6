//! Record model of the compiled markup stream.
//!
//! A record is a tagged unit: one tag byte, for variable-size kinds a varint
//! payload length, then the payload. [`RecordType`] carries the tag enumeration
//! and the fixed payload sizes, [`Record`] the decoded payloads. Parsing lives in
//! [`parser`], encoding in [`writer`].

pub mod parser;
pub mod writer;

pub use parser::{PayloadReader, RawRecord, read_record};
pub use writer::RecordWriter;

/// ElementStart flag: the object is created from the following text via its converter.
pub const ELEMENT_CREATE_FROM_TEXT: u8 = 0x01;
/// ElementStart flag: the object already exists on its parent and is retrieved, not created.
pub const ELEMENT_RETRIEVED: u8 = 0x02;

/// TypeInfo: untere 12 Bits der Assembly-Id, obere 4 Bits sind Flags.
pub const TYPE_INFO_ASSEMBLY_MASK: i16 = 0x0FFF;

/// PropertyWithExtension: low 12 bits hold the known extension type id.
pub const EXTENSION_ID_MASK: u16 = 0x0FFF;
/// PropertyWithExtension: the value id is a type id.
pub const EXTENSION_VALUE_IS_TYPE: u16 = 0x4000;
/// PropertyWithExtension: the value id is a property id (static member).
pub const EXTENSION_VALUE_IS_STATIC: u16 = 0x2000;

/// OptimizedStaticResource: the key is a type.
pub const STATIC_RESOURCE_KEY_IS_TYPE: u8 = 0x01;
/// OptimizedStaticResource: the key is a static member.
pub const STATIC_RESOURCE_KEY_IS_STATIC: u8 = 0x02;

/// Record tag enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RecordType {
    DocumentStart = 1,
    DocumentEnd = 2,
    ElementStart = 3,
    ElementEnd = 4,
    Property = 5,
    PropertyCustom = 6,
    PropertyComplexStart = 7,
    PropertyComplexEnd = 8,
    PropertyArrayStart = 9,
    PropertyArrayEnd = 10,
    PropertyIListStart = 11,
    PropertyIListEnd = 12,
    PropertyIDictionaryStart = 13,
    PropertyIDictionaryEnd = 14,
    Text = 16,
    TextWithConverter = 17,
    XmlnsProperty = 20,
    DefAttribute = 25,
    PiMapping = 27,
    AssemblyInfo = 28,
    TypeInfo = 29,
    TypeSerializerInfo = 30,
    AttributeInfo = 31,
    StringInfo = 32,
    PropertyStringReference = 33,
    PropertyTypeReference = 34,
    PropertyWithExtension = 35,
    PropertyWithConverter = 36,
    DeferableContentStart = 37,
    DefAttributeKeyString = 38,
    DefAttributeKeyType = 39,
    KeyElementStart = 40,
    KeyElementEnd = 41,
    ConstructorParametersStart = 42,
    ConstructorParametersEnd = 43,
    ConstructorParameterType = 44,
    ConnectionId = 45,
    ContentProperty = 46,
    StaticResourceStart = 48,
    StaticResourceEnd = 49,
    StaticResourceId = 50,
    TextWithId = 51,
    PresentationOptionsAttribute = 52,
    LineNumberAndPosition = 53,
    LinePosition = 54,
    OptimizedStaticResource = 55,
    PropertyWithStaticResourceId = 56,
}

impl RecordType {
    /// Maps a tag byte to its record type.
    pub fn from_tag(tag: u8) -> Option<Self> {
        use RecordType::*;
        let ty = match tag {
            1 => DocumentStart,
            2 => DocumentEnd,
            3 => ElementStart,
            4 => ElementEnd,
            5 => Property,
            6 => PropertyCustom,
            7 => PropertyComplexStart,
            8 => PropertyComplexEnd,
            9 => PropertyArrayStart,
            10 => PropertyArrayEnd,
            11 => PropertyIListStart,
            12 => PropertyIListEnd,
            13 => PropertyIDictionaryStart,
            14 => PropertyIDictionaryEnd,
            16 => Text,
            17 => TextWithConverter,
            20 => XmlnsProperty,
            25 => DefAttribute,
            27 => PiMapping,
            28 => AssemblyInfo,
            29 => TypeInfo,
            30 => TypeSerializerInfo,
            31 => AttributeInfo,
            32 => StringInfo,
            33 => PropertyStringReference,
            34 => PropertyTypeReference,
            35 => PropertyWithExtension,
            36 => PropertyWithConverter,
            37 => DeferableContentStart,
            38 => DefAttributeKeyString,
            39 => DefAttributeKeyType,
            40 => KeyElementStart,
            41 => KeyElementEnd,
            42 => ConstructorParametersStart,
            43 => ConstructorParametersEnd,
            44 => ConstructorParameterType,
            45 => ConnectionId,
            46 => ContentProperty,
            48 => StaticResourceStart,
            49 => StaticResourceEnd,
            50 => StaticResourceId,
            51 => TextWithId,
            52 => PresentationOptionsAttribute,
            53 => LineNumberAndPosition,
            54 => LinePosition,
            55 => OptimizedStaticResource,
            56 => PropertyWithStaticResourceId,
            _ => return None,
        };
        Some(ty)
    }

    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Fixed payload size, or `None` for kinds that carry a varint size field.
    pub fn fixed_size(self) -> Option<usize> {
        use RecordType::*;
        match self {
            DocumentEnd | ElementEnd | PropertyComplexEnd | PropertyArrayEnd
            | PropertyIListEnd | PropertyIDictionaryEnd | KeyElementEnd
            | ConstructorParametersStart | ConstructorParametersEnd | StaticResourceEnd => Some(0),
            PropertyComplexStart | PropertyArrayStart | PropertyIListStart
            | PropertyIDictionaryStart | ConstructorParameterType | ContentProperty
            | StaticResourceId => Some(2),
            ElementStart | StaticResourceStart => Some(3),
            PropertyStringReference | PropertyTypeReference | DeferableContentStart
            | ConnectionId | LinePosition | PropertyWithStaticResourceId => Some(4),
            DocumentStart | PropertyWithExtension => Some(6),
            LineNumberAndPosition => Some(8),
            Property | PropertyCustom | Text | TextWithConverter | XmlnsProperty
            | DefAttribute | PiMapping | AssemblyInfo | TypeInfo | TypeSerializerInfo
            | AttributeInfo | StringInfo | PropertyWithConverter | DefAttributeKeyString
            | DefAttributeKeyType | KeyElementStart | TextWithId
            | PresentationOptionsAttribute | OptimizedStaticResource => None,
        }
    }

    pub fn name(self) -> &'static str {
        use RecordType::*;
        match self {
            DocumentStart => "DocumentStart",
            DocumentEnd => "DocumentEnd",
            ElementStart => "ElementStart",
            ElementEnd => "ElementEnd",
            Property => "Property",
            PropertyCustom => "PropertyCustom",
            PropertyComplexStart => "PropertyComplexStart",
            PropertyComplexEnd => "PropertyComplexEnd",
            PropertyArrayStart => "PropertyArrayStart",
            PropertyArrayEnd => "PropertyArrayEnd",
            PropertyIListStart => "PropertyIListStart",
            PropertyIListEnd => "PropertyIListEnd",
            PropertyIDictionaryStart => "PropertyIDictionaryStart",
            PropertyIDictionaryEnd => "PropertyIDictionaryEnd",
            Text => "Text",
            TextWithConverter => "TextWithConverter",
            XmlnsProperty => "XmlnsProperty",
            DefAttribute => "DefAttribute",
            PiMapping => "PIMapping",
            AssemblyInfo => "AssemblyInfo",
            TypeInfo => "TypeInfo",
            TypeSerializerInfo => "TypeSerializerInfo",
            AttributeInfo => "AttributeInfo",
            StringInfo => "StringInfo",
            PropertyStringReference => "PropertyStringReference",
            PropertyTypeReference => "PropertyTypeReference",
            PropertyWithExtension => "PropertyWithExtension",
            PropertyWithConverter => "PropertyWithConverter",
            DeferableContentStart => "DeferableContentStart",
            DefAttributeKeyString => "DefAttributeKeyString",
            DefAttributeKeyType => "DefAttributeKeyType",
            KeyElementStart => "KeyElementStart",
            KeyElementEnd => "KeyElementEnd",
            ConstructorParametersStart => "ConstructorParametersStart",
            ConstructorParametersEnd => "ConstructorParametersEnd",
            ConstructorParameterType => "ConstructorParameterType",
            ConnectionId => "ConnectionId",
            ContentProperty => "ContentProperty",
            StaticResourceStart => "StaticResourceStart",
            StaticResourceEnd => "StaticResourceEnd",
            StaticResourceId => "StaticResourceId",
            TextWithId => "TextWithId",
            PresentationOptionsAttribute => "PresentationOptionsAttribute",
            LineNumberAndPosition => "LineNumberAndPosition",
            LinePosition => "LinePosition",
            OptimizedStaticResource => "OptimizedStaticResource",
            PropertyWithStaticResourceId => "PropertyWithStaticResourceId",
        }
    }
}

/// Key position fields shared by the key-table records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyPosition {
    /// Offset of the value, relative to the end of the key table.
    pub value_position: u32,
    pub shared: bool,
    pub shared_set: bool,
}

/// One decoded record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    DocumentStart { load_async: bool, max_async_records: u32, debug: bool },
    DocumentEnd,
    ElementStart { type_id: i16, flags: u8 },
    ElementEnd,
    Property { attribute_id: i16, value: String },
    PropertyCustom { attribute_id: i16, serializer_id: i16, data: Vec<u8> },
    PropertyComplexStart { attribute_id: i16 },
    PropertyComplexEnd,
    PropertyArrayStart { attribute_id: i16 },
    PropertyArrayEnd,
    PropertyIListStart { attribute_id: i16 },
    PropertyIListEnd,
    PropertyIDictionaryStart { attribute_id: i16 },
    PropertyIDictionaryEnd,
    Text { value: String },
    TextWithConverter { value: String, converter_id: i16 },
    XmlnsProperty { prefix: String, uri: String, assembly_ids: Vec<i16> },
    DefAttribute { value: String, name_id: i16 },
    PiMapping { xml_namespace: String, clr_namespace: String, assembly_id: i16 },
    AssemblyInfo { assembly_id: i16, name: String },
    TypeInfo { type_id: i16, assembly_id: i16, type_name: String },
    TypeSerializerInfo { type_id: i16, assembly_id: i16, type_name: String, serializer_id: i16 },
    AttributeInfo { attribute_id: i16, owner_type_id: i16, usage: u8, name: String },
    StringInfo { string_id: i16, value: String },
    PropertyStringReference { attribute_id: i16, string_id: i16 },
    PropertyTypeReference { attribute_id: i16, type_id: i16 },
    PropertyWithExtension { attribute_id: i16, extension: u16, value_id: i16 },
    PropertyWithConverter { attribute_id: i16, value: String, converter_id: i16 },
    DeferableContentStart { content_size: u32 },
    DefAttributeKeyString { value_id: i16, key: KeyPosition },
    DefAttributeKeyType { type_id: i16, flags: u8, key: KeyPosition },
    KeyElementStart { type_id: i16, flags: u8, key: KeyPosition },
    KeyElementEnd,
    ConstructorParametersStart,
    ConstructorParametersEnd,
    ConstructorParameterType { type_id: i16 },
    ConnectionId { connection_id: i32 },
    ContentProperty { attribute_id: i16 },
    StaticResourceStart { type_id: i16, flags: u8 },
    StaticResourceEnd,
    StaticResourceId { static_resource_id: i16 },
    TextWithId { value_id: i16 },
    PresentationOptionsAttribute { value: String, name_id: i16 },
    LineNumberAndPosition { line: u32, position: u32 },
    LinePosition { position: u32 },
    OptimizedStaticResource { flags: u8, value_id: i16 },
    PropertyWithStaticResourceId { attribute_id: i16, static_resource_id: i16 },
}

impl Record {
    pub fn record_type(&self) -> RecordType {
        use RecordType as T;
        match self {
            Self::DocumentStart { .. } => T::DocumentStart,
            Self::DocumentEnd => T::DocumentEnd,
            Self::ElementStart { .. } => T::ElementStart,
            Self::ElementEnd => T::ElementEnd,
            Self::Property { .. } => T::Property,
            Self::PropertyCustom { .. } => T::PropertyCustom,
            Self::PropertyComplexStart { .. } => T::PropertyComplexStart,
            Self::PropertyComplexEnd => T::PropertyComplexEnd,
            Self::PropertyArrayStart { .. } => T::PropertyArrayStart,
            Self::PropertyArrayEnd => T::PropertyArrayEnd,
            Self::PropertyIListStart { .. } => T::PropertyIListStart,
            Self::PropertyIListEnd => T::PropertyIListEnd,
            Self::PropertyIDictionaryStart { .. } => T::PropertyIDictionaryStart,
            Self::PropertyIDictionaryEnd => T::PropertyIDictionaryEnd,
            Self::Text { .. } => T::Text,
            Self::TextWithConverter { .. } => T::TextWithConverter,
            Self::XmlnsProperty { .. } => T::XmlnsProperty,
            Self::DefAttribute { .. } => T::DefAttribute,
            Self::PiMapping { .. } => T::PiMapping,
            Self::AssemblyInfo { .. } => T::AssemblyInfo,
            Self::TypeInfo { .. } => T::TypeInfo,
            Self::TypeSerializerInfo { .. } => T::TypeSerializerInfo,
            Self::AttributeInfo { .. } => T::AttributeInfo,
            Self::StringInfo { .. } => T::StringInfo,
            Self::PropertyStringReference { .. } => T::PropertyStringReference,
            Self::PropertyTypeReference { .. } => T::PropertyTypeReference,
            Self::PropertyWithExtension { .. } => T::PropertyWithExtension,
            Self::PropertyWithConverter { .. } => T::PropertyWithConverter,
            Self::DeferableContentStart { .. } => T::DeferableContentStart,
            Self::DefAttributeKeyString { .. } => T::DefAttributeKeyString,
            Self::DefAttributeKeyType { .. } => T::DefAttributeKeyType,
            Self::KeyElementStart { .. } => T::KeyElementStart,
            Self::KeyElementEnd => T::KeyElementEnd,
            Self::ConstructorParametersStart => T::ConstructorParametersStart,
            Self::ConstructorParametersEnd => T::ConstructorParametersEnd,
            Self::ConstructorParameterType { .. } => T::ConstructorParameterType,
            Self::ConnectionId { .. } => T::ConnectionId,
            Self::ContentProperty { .. } => T::ContentProperty,
            Self::StaticResourceStart { .. } => T::StaticResourceStart,
            Self::StaticResourceEnd => T::StaticResourceEnd,
            Self::StaticResourceId { .. } => T::StaticResourceId,
            Self::TextWithId { .. } => T::TextWithId,
            Self::PresentationOptionsAttribute { .. } => T::PresentationOptionsAttribute,
            Self::LineNumberAndPosition { .. } => T::LineNumberAndPosition,
            Self::LinePosition { .. } => T::LinePosition,
            Self::OptimizedStaticResource { .. } => T::OptimizedStaticResource,
            Self::PropertyWithStaticResourceId { .. } => T::PropertyWithStaticResourceId,
        }
    }

    /// Records that only feed the resolver or line tracking and never emit nodes.
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            Self::AssemblyInfo { .. }
                | Self::TypeInfo { .. }
                | Self::TypeSerializerInfo { .. }
                | Self::AttributeInfo { .. }
                | Self::StringInfo { .. }
                | Self::PiMapping { .. }
                | Self::LineNumberAndPosition { .. }
                | Self::LinePosition { .. }
                | Self::DocumentStart { .. }
        )
    }

    /// Records that only add entries to the resolver tables.
    pub fn is_declaration(&self) -> bool {
        matches!(
            self,
            Self::AssemblyInfo { .. }
                | Self::TypeInfo { .. }
                | Self::TypeSerializerInfo { .. }
                | Self::AttributeInfo { .. }
                | Self::StringInfo { .. }
                | Self::PiMapping { .. }
        )
    }

    /// Records that belong to a key table.
    pub fn is_key_table_record(&self) -> bool {
        matches!(
            self,
            Self::DefAttributeKeyString { .. }
                | Self::DefAttributeKeyType { .. }
                | Self::KeyElementStart { .. }
                | Self::StaticResourceStart { .. }
                | Self::OptimizedStaticResource { .. }
        )
    }
}
