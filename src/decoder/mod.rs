//! Record decoder and node synthesizer.
//!
//! Liest Records aus einem [`ByteCursor`] und erzeugt daraus einen
//! wohlgeformten Node-Stream. Der Decoder ist pull-basiert: jeder
//! [`Decoder::advance`] liest genau so viele Records, bis mindestens ein Node
//! in der Hauptausgabe liegt.
//!
//! # Beispiel
//!
//! ```
//! use std::rc::Rc;
//! use cmrx::decoder::decode;
//! use cmrx::header::Header;
//! use cmrx::node::Node;
//! use cmrx::record::{Record, writer::RecordWriter};
//! use cmrx::registry::StaticRegistry;
//! use cmrx::schema::TypeInfo;
//!
//! let button = TypeInfo::builder("Button", "urn:ui").build();
//! let registry = StaticRegistry::new().with_type(-1, button);
//!
//! let mut w = RecordWriter::with_header(&Header::default());
//! w.record(Record::ElementStart { type_id: -1, flags: 0 })
//!     .record(Record::ElementEnd)
//!     .record(Record::DocumentEnd);
//!
//! let nodes = decode(w.as_bytes(), Rc::new(registry)).unwrap();
//! assert_eq!(nodes.len(), 2);
//! assert!(matches!(nodes.get(0), Some(Node::StartObject(_))));
//! ```

mod api;
mod deferred;
mod frame;
mod member;

pub use api::{decode, decode_iter, decode_with_options};
pub use deferred::{DeferredContent, KeyPayload, KeyRecord, StaticResourceEntry};
pub use frame::{CollectionHint, FrameFlags};

use std::cell::{RefCell, RefMut};
use std::rc::Rc;

use crate::header::Header;
use crate::materialize::{RawMaterializer, ValueMaterializer};
use crate::node::{NamespaceDecl, Node, NodeList, NodeWriter, Value};
use crate::options::DecoderOptions;
use crate::record::{ELEMENT_RETRIEVED, RawRecord, Record, read_record};
use crate::registry::SchemaRegistry;
use crate::resolver::SchemaResolver;
use crate::schema::{MemberInfo, TypeRef, directive};
use crate::source::{ByteCursor, SharedSource};
use crate::writer_stack::WriterStack;
use crate::{Error, Result};

use frame::FrameStack;
use member::{Placement, PositionalArg};

/// Most recent line record, when line info is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineInfo {
    pub line: u32,
    pub position: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Header noch nicht gelesen.
    Header,
    Body,
    Finished,
    /// Nach einem fatalen Fehler; weitere `advance` liefern nichts mehr.
    Failed,
    Disposed,
}

/// Result of dispatching one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    /// `DocumentEnd` gelesen.
    End,
}

/// Pull decoder over one record stream.
///
/// Also reads single deferred entries, see [`DeferredContent::read_entry`].
pub struct Decoder {
    cursor: ByteCursor,
    resolver: Rc<RefCell<SchemaResolver>>,
    materializer: Rc<dyn ValueMaterializer>,
    options: DecoderOptions,
    frames: FrameStack,
    writers: WriterStack,
    header: Option<Header>,
    state: State,
    /// Bindings collected for the next object.
    pending_namespaces: Vec<NamespaceDecl>,
    line_info: Option<LineInfo>,
    /// Key of the deferred entry this decoder reads. `None` for a document.
    entry_key: Option<Rc<KeyRecord>>,
    /// The key still has to be attached to the entry's root object.
    entry_key_pending: bool,
    /// Key-table capture: `KeyElementEnd`/`StaticResourceEnd` close objects.
    in_key_table: bool,
}

impl Decoder {
    /// Decoder over a complete document (header first) with default options.
    pub fn new(source: SharedSource, registry: Rc<dyn SchemaRegistry>) -> Self {
        let resolver = Rc::new(RefCell::new(SchemaResolver::new(registry)));
        Self::from_parts(
            ByteCursor::new(source),
            resolver,
            Rc::new(RawMaterializer),
            DecoderOptions::default(),
            None,
        )
    }

    /// Decoder over a complete document with explicit options.
    pub fn with_options(
        source: SharedSource,
        registry: Rc<dyn SchemaRegistry>,
        options: DecoderOptions,
    ) -> Result<Self> {
        options.validate()?;
        let mut decoder = Self::new(source, registry);
        decoder.options = options;
        Ok(decoder)
    }

    /// Decoder over any seekable reader.
    pub fn from_reader<R: std::io::Read + std::io::Seek + 'static>(
        reader: R,
        registry: Rc<dyn SchemaRegistry>,
        options: DecoderOptions,
    ) -> Result<Self> {
        Self::with_options(SharedSource::new(reader)?, registry, options)
    }

    /// Replaces the materializer used for `PropertyCustom` values.
    pub fn with_materializer(mut self, materializer: Rc<dyn ValueMaterializer>) -> Self {
        self.materializer = materializer;
        self
    }

    /// Decoder for one deferred entry: no header, key attached to the root.
    fn for_entry(
        cursor: ByteCursor,
        resolver: Rc<RefCell<SchemaResolver>>,
        materializer: Rc<dyn ValueMaterializer>,
        options: DecoderOptions,
        key: Rc<KeyRecord>,
    ) -> Self {
        let mut decoder = Self::from_parts(cursor, resolver, materializer, options, Some(key));
        decoder.state = State::Body;
        decoder.entry_key_pending = true;
        decoder
    }

    fn from_parts(
        cursor: ByteCursor,
        resolver: Rc<RefCell<SchemaResolver>>,
        materializer: Rc<dyn ValueMaterializer>,
        options: DecoderOptions,
        entry_key: Option<Rc<KeyRecord>>,
    ) -> Self {
        Self {
            cursor,
            resolver,
            materializer,
            options,
            frames: FrameStack::new(),
            writers: WriterStack::new(),
            header: None,
            state: State::Header,
            pending_namespaces: Vec::new(),
            line_info: None,
            entry_key,
            entry_key_pending: false,
            in_key_table: false,
        }
    }

    pub fn options(&self) -> &DecoderOptions {
        &self.options
    }

    /// Stream header, once the first `advance` has read it.
    pub fn header(&self) -> Option<&Header> {
        self.header.as_ref()
    }

    /// Resolver shared with every deferred region of this session.
    pub fn resolver(&self) -> &Rc<RefCell<SchemaResolver>> {
        &self.resolver
    }

    /// Position of the last line record; `None` unless requested in the options.
    pub fn line_info(&self) -> Option<LineInfo> {
        self.line_info
    }

    /// Byte offset of the next record.
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    /// Namespace bound to `prefix` in the currently open scopes.
    pub fn lookup_namespace(&self, prefix: &str) -> Option<&str> {
        self.pending_namespaces
            .iter()
            .rev()
            .find(|ns| ns.prefix == prefix)
            .map(|ns| ns.namespace.as_str())
            .or_else(|| self.frames.lookup_namespace(prefix))
    }

    pub fn is_finished(&self) -> bool {
        self.state == State::Finished
    }

    /// Gibt die Quelle frei. Danach liefert `advance` [`Error::Disposed`].
    pub fn release(&mut self) {
        self.cursor.release();
        self.writers.unwind();
        self.writers.main().clear();
        self.state = State::Disposed;
    }

    // --- Pull-Schleife -----------------------------------------------------

    /// Returns the next node, `Ok(None)` at the end of the document.
    ///
    /// After an error the decoder is failed: nodes queued by the failing call
    /// are discarded and every further call returns `Ok(None)`.
    pub fn advance(&mut self) -> Result<Option<Node>> {
        match self.state {
            State::Disposed => return Err(Error::Disposed),
            State::Failed => return Ok(None),
            _ => {}
        }
        if let Some(node) = self.writers.main().pop_front() {
            return Ok(Some(node));
        }
        if self.state == State::Finished {
            return Ok(None);
        }
        if let Err(e) = self.fill() {
            log::debug!("decoding failed at offset {}: {e}", self.cursor.position());
            self.writers.unwind();
            self.writers.main().clear();
            self.state = State::Failed;
            return Err(e);
        }
        Ok(self.writers.main().pop_front())
    }

    fn fill(&mut self) -> Result<()> {
        if self.state == State::Header {
            self.read_header()?;
            self.state = State::Body;
        }
        while self.writers.main_ref().is_empty() {
            let Some(raw) = self.next_record()? else {
                if !self.frames.is_empty() {
                    return Err(Error::PrematureEndOfStream);
                }
                self.state = State::Finished;
                break;
            };
            if self.dispatch(raw)? == Flow::End {
                if let Some(frame) = self.frames.current() {
                    return Err(Error::structural(
                        format!("ElementEnd of {}", frame.type_name()),
                        "DocumentEnd",
                    ));
                }
                self.state = State::Finished;
                break;
            }
        }
        Ok(())
    }

    fn read_header(&mut self) -> Result<()> {
        let header = Header::decode(&mut self.cursor)?;
        if let Some(expected) = self.options.expected_signature()
            && header.signature() != expected
        {
            log::warn!(
                "unexpected stream signature {:?}",
                String::from_utf8_lossy(header.signature())
            );
        }
        self.header = Some(header);
        Ok(())
    }

    fn next_record(&mut self) -> Result<Option<RawRecord>> {
        let raw = read_record(&mut self.cursor, self.options.max_record_size())?;
        if let Some(raw) = &raw {
            log::trace!("{} @{}", raw.record.record_type().name(), raw.offset);
        }
        Ok(raw)
    }

    fn require_record(&mut self) -> Result<RawRecord> {
        self.next_record()?.ok_or(Error::PrematureEndOfStream)
    }

    fn resolver_mut(&self) -> RefMut<'_, SchemaResolver> {
        self.resolver.borrow_mut()
    }

    /// Dispatches records until the frame depth drops to `target`.
    fn run_until_depth(&mut self, target: usize) -> Result<()> {
        while self.frames.depth() > target {
            let raw = self.require_record()?;
            if self.dispatch(raw)? == Flow::End {
                return Err(Error::structural("ElementEnd", "DocumentEnd"));
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, raw: RawRecord) -> Result<Flow> {
        let redirections = self.writers.depth();
        let flow = self.handle(raw.record)?;
        debug_assert_eq!(self.writers.depth(), redirections, "unbalanced output redirection");
        Ok(flow)
    }

    fn handle(&mut self, record: Record) -> Result<Flow> {
        match record {
            Record::DocumentStart { .. } => {}
            Record::DocumentEnd => return Ok(Flow::End),

            // Deklarationen
            Record::AssemblyInfo { assembly_id, name } => {
                self.resolver_mut().declare_assembly(assembly_id, name)?;
            }
            Record::TypeInfo { type_id, assembly_id, type_name } => {
                self.resolver_mut().declare_type(type_id, assembly_id, type_name, None)?;
            }
            Record::TypeSerializerInfo { type_id, assembly_id, type_name, serializer_id } => {
                self.resolver_mut().declare_type(type_id, assembly_id, type_name, Some(serializer_id))?;
            }
            Record::AttributeInfo { attribute_id, owner_type_id, name, .. } => {
                self.resolver_mut().declare_property(attribute_id, owner_type_id, name)?;
            }
            Record::StringInfo { string_id, value } => {
                self.resolver_mut().declare_string(string_id, value)?;
            }
            Record::PiMapping { xml_namespace, clr_namespace, assembly_id } => {
                self.resolver_mut().declare_namespace_mapping(xml_namespace, clr_namespace, assembly_id);
            }

            Record::XmlnsProperty { prefix, uri, .. } => self.bind_namespace(prefix, uri),
            Record::LineNumberAndPosition { line, position } => self.set_line(Some(line), position),
            Record::LinePosition { position } => self.set_line(None, position),

            // Objekte
            Record::ElementStart { type_id, flags } => {
                let ty = self.resolver_mut().resolve_type(type_id)?;
                self.place_object(ty, flags)?;
            }
            Record::ElementEnd => self.end_object("ElementEnd")?,
            Record::KeyElementEnd | Record::StaticResourceEnd if self.in_key_table => {
                self.end_object("key end")?;
            }

            // Einfache Properties
            Record::Property { attribute_id, value } => {
                self.simple_property(attribute_id, Value::Text(value))?;
            }
            Record::PropertyCustom { attribute_id, serializer_id, data } => {
                let value = if self.options.values_must_be_string() {
                    Value::Binary { converter_id: serializer_id, bytes: data }
                } else {
                    self.materializer.materialize(serializer_id, &data)?
                };
                self.simple_property(attribute_id, value)?;
            }
            Record::PropertyWithConverter { attribute_id, value, converter_id } => {
                let converter = self.resolver_mut().resolve_converter(converter_id)?;
                self.simple_property(attribute_id, Value::Converted { text: value, converter })?;
            }
            Record::PropertyStringReference { attribute_id, string_id } => {
                let text = self.resolver_mut().resolve_string(string_id)?;
                self.simple_property(attribute_id, Value::Text(text))?;
            }
            Record::PropertyTypeReference { attribute_id, type_id } => {
                let ty = self.resolver_mut().resolve_type(type_id)?;
                let ext = self.resolver.borrow().language().type_extension.clone();
                self.open_property(attribute_id, CollectionHint::None)?;
                self.extension_object(ext, PositionalArg::Type(ty));
                self.close_member("PropertyTypeReference")?;
            }
            Record::PropertyWithExtension { attribute_id, extension, value_id } => {
                self.property_with_extension(attribute_id, extension, value_id)?;
            }

            // Komplexe Properties
            Record::PropertyComplexStart { attribute_id } => {
                self.complex_property(attribute_id, CollectionHint::None)?;
            }
            Record::PropertyArrayStart { attribute_id } | Record::PropertyIListStart { attribute_id } => {
                self.complex_property(attribute_id, CollectionHint::List)?;
            }
            Record::PropertyIDictionaryStart { attribute_id } => {
                self.complex_property(attribute_id, CollectionHint::Dictionary)?;
            }
            Record::PropertyComplexEnd
            | Record::PropertyArrayEnd
            | Record::PropertyIListEnd
            | Record::PropertyIDictionaryEnd => self.close_member("property end")?,

            // Text
            Record::Text { value } => self.text(Value::Text(value))?,
            Record::TextWithConverter { value, converter_id } => {
                let converter = self.resolver_mut().resolve_converter(converter_id)?;
                self.text(Value::Converted { text: value, converter })?;
            }
            Record::TextWithId { value_id } => {
                let text = self.resolver_mut().resolve_string(value_id)?;
                self.text(Value::Text(text))?;
            }

            // Direktiven
            Record::DefAttribute { value, name_id } => {
                let name = self.resolver_mut().resolve_string(name_id)?;
                self.open_member(MemberInfo::directive(name), CollectionHint::None, "DefAttribute")?;
                self.writers.active().value(Value::Text(value));
                self.close_member("DefAttribute")?;
            }
            Record::PresentationOptionsAttribute { value, .. } => {
                self.frames
                    .current_mut()
                    .ok_or_else(|| Error::structural("object scope", "PresentationOptionsAttribute"))?
                    .freeze = true;
                self.open_member(MemberInfo::directive(directive::FREEZE), CollectionHint::None, "PresentationOptionsAttribute")?;
                self.writers.active().value(Value::Text(value));
                self.close_member("PresentationOptionsAttribute")?;
            }
            Record::ContentProperty { attribute_id } => {
                let context = self.frames.current().and_then(|f| f.ty.clone());
                let member = self.resolver_mut().resolve_property(attribute_id, context.as_deref())?;
                self.frames
                    .current_mut()
                    .ok_or_else(|| Error::structural("object scope", "ContentProperty"))?
                    .content_property = Some(member);
            }
            Record::ConnectionId { connection_id } => {
                self.frames
                    .current_mut()
                    .ok_or_else(|| Error::structural("object scope", "ConnectionId"))?
                    .connection_id = Some(connection_id);
            }
            Record::ConstructorParametersStart => {
                self.open_member(MemberInfo::directive(directive::ARGUMENTS), CollectionHint::None, "ConstructorParametersStart")?;
            }
            Record::ConstructorParametersEnd => self.close_member("ConstructorParametersEnd")?,
            Record::ConstructorParameterType { type_id } => {
                let ty = self.resolver_mut().resolve_type(type_id)?;
                let ext = self.resolver.borrow().language().type_extension.clone();
                self.ensure_member(false, "ConstructorParameterType")?;
                self.extension_object(ext, PositionalArg::Type(ty));
            }

            // Deferred content und Static Resources
            Record::DeferableContentStart { content_size } => self.deferable_content(content_size)?,
            Record::StaticResourceId { static_resource_id } => {
                self.ensure_member(false, "StaticResourceId")?;
                self.replay_static_resource(static_resource_id)?;
            }
            Record::PropertyWithStaticResourceId { attribute_id, static_resource_id } => {
                self.open_property(attribute_id, CollectionHint::None)?;
                self.replay_static_resource(static_resource_id)?;
                self.close_member("PropertyWithStaticResourceId")?;
            }

            record @ (Record::DefAttributeKeyString { .. }
            | Record::DefAttributeKeyType { .. }
            | Record::KeyElementStart { .. }
            | Record::KeyElementEnd
            | Record::StaticResourceStart { .. }
            | Record::StaticResourceEnd
            | Record::OptimizedStaticResource { .. }) => {
                return Err(Error::structural(
                    "record inside an object scope",
                    format!("{} outside a key table", record.record_type().name()),
                ));
            }
        }
        Ok(Flow::Continue)
    }

    // --- Handler ---------------------------------------------------------------

    fn bind_namespace(&mut self, prefix: String, namespace: String) {
        if self.pending_namespaces.iter().any(|ns| ns.prefix == prefix) {
            log::warn!("prefix '{prefix}' bound twice on one element");
        }
        self.pending_namespaces.push(NamespaceDecl { prefix, namespace });
    }

    fn set_line(&mut self, line: Option<u32>, position: u32) {
        if !self.options.provide_line_info() {
            return;
        }
        let info = self.line_info.get_or_insert_default();
        if let Some(line) = line {
            info.line = line;
        }
        info.position = position;
    }

    /// Places a new object: implicit member, preamble or lookahead, then start.
    fn place_object(&mut self, ty: TypeRef, flags: u8) -> Result<()> {
        if !self.frames.is_empty() {
            self.ensure_member(false, "ElementStart")?;
            let placement = match self.frames.current_mut() {
                Some(frame) if flags & ELEMENT_RETRIEVED == 0 && !frame.is_wrapper() => {
                    let first = !std::mem::replace(&mut frame.member_has_items, true);
                    match &frame.member {
                        // Lookahead nur fuer das erste Item eines Members
                        Some(member) => match member::placement(member, frame.hint, &ty) {
                            Placement::Lookahead if !first => Placement::Direct,
                            p => p,
                        },
                        None => Placement::Direct,
                    }
                }
                _ => Placement::Direct,
            };
            match placement {
                Placement::Direct => {}
                Placement::Preamble => self.emit_preamble(),
                Placement::Lookahead => return self.lookahead_extension(ty, flags),
            }
        }
        self.open_object(ty, flags);
        Ok(())
    }

    fn simple_property(&mut self, attribute_id: i16, value: Value) -> Result<()> {
        self.open_property(attribute_id, CollectionHint::None)?;
        self.writers.active().value(value);
        self.close_member("property")
    }

    fn complex_property(&mut self, attribute_id: i16, hint: CollectionHint) -> Result<()> {
        let member = self.open_property(attribute_id, hint)?;
        if member.defers_content() {
            self.spool_member()?;
        }
        Ok(())
    }

    fn property_with_extension(&mut self, attribute_id: i16, extension: u16, value_id: i16) -> Result<()> {
        use crate::record::{EXTENSION_ID_MASK, EXTENSION_VALUE_IS_STATIC, EXTENSION_VALUE_IS_TYPE};

        let ext_id = -((extension & EXTENSION_ID_MASK) as i16);
        let (ext, arg) = {
            let mut resolver = self.resolver_mut();
            let ext = resolver.resolve_type(ext_id)?;
            let arg = if extension & EXTENSION_VALUE_IS_TYPE != 0 {
                PositionalArg::Type(resolver.resolve_type(value_id)?)
            } else if extension & EXTENSION_VALUE_IS_STATIC != 0 {
                let (owner, name) = resolver.property_declaration(value_id)?;
                PositionalArg::Static(format!("{}.{name}", owner.name()))
            } else {
                PositionalArg::Text(resolver.resolve_string(value_id)?)
            };
            (ext, arg)
        };
        self.open_property(attribute_id, CollectionHint::None)?;
        self.extension_object(ext, arg);
        self.close_member("PropertyWithExtension")
    }

    fn text(&mut self, value: Value) -> Result<()> {
        if self.frames.is_empty() {
            return Err(Error::structural("object scope", "Text"));
        }
        self.ensure_member(true, "Text")?;
        self.writers.active().value(value);
        Ok(())
    }

    /// Records from here to the matching member end become one `Value::Nodes`.
    fn spool_member(&mut self) -> Result<()> {
        let owner_depth = self.frames.depth();
        self.writers.push_writer();
        loop {
            let raw = self.require_record()?;
            if is_member_end(&raw.record) && self.at_member_level(owner_depth) {
                if self.frames.current().is_some_and(|f| f.is_wrapper()) {
                    self.close_wrapper();
                }
                break;
            }
            if self.dispatch(raw)? == Flow::End {
                return Err(Error::structural("property end", "DocumentEnd"));
            }
        }
        let nodes = self.writers.pop_writer()?;
        log::debug!("spooled {} nodes of deferred member", nodes.len());
        self.writers.active().value(Value::Nodes(Rc::new(nodes)));
        self.close_member("property end")
    }

    fn at_member_level(&self, owner_depth: usize) -> bool {
        let depth = self.frames.depth();
        depth == owner_depth
            || (depth == owner_depth + 1 && self.frames.current().is_some_and(|f| f.is_wrapper()))
    }

    fn end_object(&mut self, found: &'static str) -> Result<()> {
        let Some(frame) = self.frames.current() else {
            return Err(Error::structural("open object", found));
        };
        if frame.is_wrapper() {
            self.close_wrapper();
        }
        let Some(frame) = self.frames.current_mut() else {
            return Err(Error::structural("open object", found));
        };
        if let Some(member) = &frame.member {
            if !frame.has_implicit_member() {
                return Err(Error::structural(format!("end of member {member}"), found));
            }
            self.writers.active().end_member();
            frame.member = None;
            frame.flags = FrameFlags::None;
        }
        if let Some(id) = frame.connection_id.take() {
            let out = self.writers.active();
            out.start_member(MemberInfo::directive(directive::CONNECTION_ID));
            out.value(Value::Text(id.to_string()));
            out.end_member();
        }
        self.writers.active().end_object();
        self.frames.pop();
        Ok(())
    }

    /// Emits pending namespaces and the start node, then opens the scope.
    fn open_object(&mut self, ty: TypeRef, flags: u8) {
        use crate::record::ELEMENT_CREATE_FROM_TEXT;

        let namespaces = std::mem::take(&mut self.pending_namespaces);
        let out = self.writers.active();
        for ns in &namespaces {
            out.namespace(ns.clone());
        }
        if flags & ELEMENT_RETRIEVED != 0 {
            out.get_object();
        } else {
            out.start_object(Rc::clone(&ty));
        }
        let pending_key = if self.entry_key_pending && self.frames.is_empty() {
            self.entry_key_pending = false;
            self.entry_key.as_ref().map(|k| k.payload().clone())
        } else {
            None
        };
        let frame = self.frames.push();
        frame.ty = Some(ty);
        frame.namespaces = namespaces;
        frame.create_from_text = flags & ELEMENT_CREATE_FROM_TEXT != 0;
        frame.pending_key = pending_key;
        self.flush_pending_key();
    }

    /// Entry-Decoding: genau ein Subtree, danach nur noch stille Records.
    fn decode_entry(&mut self, span_end: u64) -> Result<NodeList> {
        let mut started = false;
        while !started || !self.frames.is_empty() {
            let raw = self.require_record()?;
            if self.dispatch(raw)? == Flow::End {
                return Err(Error::structural("deferred entry", "DocumentEnd"));
            }
            started |= !self.frames.is_empty();
        }
        while self.cursor.position() < span_end {
            let offset = self.cursor.position();
            let raw = self.require_record()?;
            if !raw.record.is_silent() {
                self.cursor.seek_to(offset)?;
                break;
            }
            self.dispatch(raw)?;
        }
        self.state = State::Finished;
        Ok(std::mem::take(self.writers.main()))
    }
}

impl Iterator for Decoder {
    type Item = Result<Node>;

    fn next(&mut self) -> Option<Self::Item> {
        self.advance().transpose()
    }
}

impl std::fmt::Debug for Decoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder")
            .field("position", &self.cursor.position())
            .field("state", &self.state)
            .field("depth", &self.frames.depth())
            .field("queued", &self.writers.main_ref().len())
            .finish()
    }
}

fn is_member_end(record: &Record) -> bool {
    matches!(
        record,
        Record::PropertyComplexEnd
            | Record::PropertyArrayEnd
            | Record::PropertyIListEnd
            | Record::PropertyIDictionaryEnd
    )
}
