//! cmrx – decoder for compiled markup record streams
//!
//! Liest den binaeren Record-Strom einer kompilierten Markup-Datei und
//! rekonstruiert daraus einen Objekt/Member-Node-Stream: implizite Member,
//! Collection-Preambles und Extension-Objekte werden synthetisiert, deferred
//! Regionen bleiben bis zum ersten Zugriff auf einen Eintrag ungelesen.
//!
//! # Beispiel
//!
//! ```
//! use std::rc::Rc;
//! use cmrx::{Header, Node, Record, RecordWriter, StaticRegistry, TypeInfo, decode};
//! use cmrx::schema::PropertyDescriptor;
//!
//! let button = TypeInfo::builder("Button", "urn:ui")
//!     .property(PropertyDescriptor::new("Width"))
//!     .build();
//! let registry = StaticRegistry::new()
//!     .with_type(-1, Rc::clone(&button))
//!     .with_property(-1, button, "Width");
//!
//! let mut w = RecordWriter::with_header(&Header::default());
//! w.record(Record::ElementStart { type_id: -1, flags: 0 })
//!     .record(Record::Property { attribute_id: -1, value: "10".into() })
//!     .record(Record::ElementEnd)
//!     .record(Record::DocumentEnd);
//!
//! let nodes = decode(w.as_bytes(), Rc::new(registry)).unwrap();
//! assert_eq!(nodes.len(), 5);
//! assert!(matches!(nodes.get(2), Some(Node::Value(v)) if v.as_text() == Some("10")));
//! ```

pub mod decoder;
pub mod error;
pub mod header;
pub mod materialize;
pub mod node;
pub mod node_serializer;
pub mod options;
pub mod record;
pub mod registry;
pub mod resolver;
pub mod schema;
pub mod source;
pub mod varint;
pub mod writer_stack;

pub use error::{Error, ErrorKind, Result};

/// HashMap mit ahash (schneller, nicht DoS-resistent, für interne Datenstrukturen).
pub(crate) type FastHashMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;

/// IndexMap mit ahash (deterministische Iteration + schnelles Hashing).
pub(crate) type FastIndexMap<K, V> = indexmap::IndexMap<K, V, ahash::RandomState>;

// Public API: Decoder
pub use decoder::{
    decode, decode_iter, decode_with_options, Decoder, DeferredContent, KeyPayload, KeyRecord,
    LineInfo, StaticResourceEntry,
};

// Public API: Options und Header
pub use header::Header;
pub use options::DecoderOptions;

// Public API: Records
pub use record::writer::{DeferredEntry, RecordWriter};
pub use record::{Record, RecordType};

// Public API: Nodes
pub use node::{NamespaceDecl, Node, NodeList, NodeWriter, Value, transform};
pub use node_serializer::{nodes_to_text, nodes_to_text_iter_fallible, nodes_to_text_writer};

// Public API: Schema
pub use materialize::{RawMaterializer, TextMaterializer, ValueMaterializer};
pub use registry::{EmptyRegistry, SchemaRegistry, StaticRegistry};
pub use resolver::SchemaResolver;
pub use schema::{MemberInfo, MemberKind, MemberRef, TypeFlags, TypeInfo, TypeRef};
pub use source::SharedSource;
