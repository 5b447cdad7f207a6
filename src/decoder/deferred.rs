//! Deferred content: key tables and random access to the entries behind them.
//!
//! `DeferableContentStart` leitet eine Region ein: zuerst die Key-Tabelle,
//! danach die Werte. Jeder Key speichert die Position seines Werts relativ
//! zum Ende der Tabelle. Die Werte werden nicht im Hauptstrom decodiert; der
//! Decoder springt ans Regionsende und liefert stattdessen einen
//! [`DeferredContent`]-Handle, ueber den jeder Eintrag einzeln gelesen wird.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::materialize::ValueMaterializer;
use crate::node::{NodeList, NodeWriter, Value};
use crate::options::DecoderOptions;
use crate::record::{KeyPosition, Record};
use crate::resolver::SchemaResolver;
use crate::schema::{MemberInfo, TypeRef, directive};
use crate::source::{ByteCursor, SharedSource};
use crate::{Error, Result};

use super::member::PositionalArg;
use super::Decoder;

/// What identifies an entry.
#[derive(Debug, Clone)]
pub enum KeyPayload {
    /// `DefAttributeKeyString`
    String(String),
    /// `DefAttributeKeyType`
    Type(TypeRef),
    /// `KeyElementStart` .. `KeyElementEnd`, captured as nodes.
    Nodes(Rc<NodeList>),
}

impl PartialEq for KeyPayload {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Type(a), Self::Type(b)) => a.same_type(b),
            (Self::Nodes(a), Self::Nodes(b)) => a == b,
            _ => false,
        }
    }
}

/// Static resource attached to a key, replayed by `StaticResourceId`.
#[derive(Debug, Clone, PartialEq)]
pub enum StaticResourceEntry {
    /// `StaticResourceStart` .. `StaticResourceEnd`
    Subtree(Rc<NodeList>),
    /// `OptimizedStaticResource`: a `StaticResource` reference in compact form.
    Optimized { flags: u8, value_id: i16 },
}

/// One key of a key table.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyRecord {
    shared: bool,
    shared_set: bool,
    relative_position: u32,
    position: u64,
    size: u64,
    payload: KeyPayload,
    static_resources: Vec<StaticResourceEntry>,
}

impl KeyRecord {
    pub(crate) fn new(key: KeyPosition, payload: KeyPayload) -> Self {
        Self {
            shared: key.shared,
            shared_set: key.shared_set,
            relative_position: key.value_position,
            position: 0,
            size: 0,
            payload,
            static_resources: Vec::new(),
        }
    }

    /// Absolute stream offset of the value.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Value length in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn relative_position(&self) -> u32 {
        self.relative_position
    }

    pub fn payload(&self) -> &KeyPayload {
        &self.payload
    }

    pub fn static_resources(&self) -> &[StaticResourceEntry] {
        &self.static_resources
    }

    pub fn shared(&self) -> bool {
        self.shared
    }

    pub fn shared_set(&self) -> bool {
        self.shared_set
    }
}

/// Turns relative key positions into absolute ones and derives the spans.
///
/// Positions strictly increase; every span runs to the next key, the last
/// one to the end of the region.
pub(crate) fn patch_positions(keys: &mut [KeyRecord], table_end: u64, region_end: u64) -> Result<()> {
    let mut previous: Option<u64> = None;
    for key in keys.iter_mut() {
        let position = table_end + u64::from(key.relative_position);
        if position > region_end {
            return Err(Error::invalid_key_table(format!(
                "value position {position} beyond region end {region_end}"
            )));
        }
        if let Some(previous) = previous.filter(|&p| position <= p) {
            return Err(Error::invalid_key_table(format!(
                "value position {position} not after previous value at {previous}"
            )));
        }
        key.position = position;
        previous = Some(position);
    }
    let ends: Vec<u64> = keys.iter().skip(1).map(|k| k.position).chain([region_end]).collect();
    for (key, end) in keys.iter_mut().zip(ends) {
        key.size = end - key.position;
    }
    Ok(())
}

/// Handle on one deferred region.
///
/// Keeps its own share of the source; entries can be read in any order for
/// as long as the handle is not released.
pub struct DeferredContent {
    source: RefCell<Option<SharedSource>>,
    resolver: Rc<RefCell<SchemaResolver>>,
    materializer: Rc<dyn ValueMaterializer>,
    options: DecoderOptions,
    keys: Vec<Rc<KeyRecord>>,
    region_start: u64,
    table_end: u64,
    region_end: u64,
}

impl DeferredContent {
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[Rc<KeyRecord>] {
        &self.keys
    }

    pub fn key(&self, index: usize) -> Option<&KeyRecord> {
        self.keys.get(index).map(|k| &**k)
    }

    /// Offset of the first byte after `DeferableContentStart`.
    pub fn region_start(&self) -> u64 {
        self.region_start
    }

    /// Offset the relative key positions count from.
    pub fn table_end(&self) -> u64 {
        self.table_end
    }

    pub fn region_end(&self) -> u64 {
        self.region_end
    }

    /// Decodes entry `index` into a fresh node list.
    ///
    /// `Ok(None)` when the entry's position is the end of the region. The
    /// key is attached to the entry's root object as `x:Key`.
    pub fn read_entry(&self, index: usize) -> Result<Option<NodeList>> {
        let key = self
            .keys
            .get(index)
            .ok_or(Error::EntryIndexOutOfRange { index, len: self.keys.len() })?;
        if key.position == self.region_end {
            return Ok(None);
        }
        let source = self.source.borrow().as_ref().ok_or(Error::Disposed)?.share()?;
        let cursor = ByteCursor::with_bounds(source, key.position, self.region_end);
        let mut decoder = Decoder::for_entry(
            cursor,
            Rc::clone(&self.resolver),
            Rc::clone(&self.materializer),
            self.options.clone(),
            Rc::clone(key),
        );
        let nodes = decoder.decode_entry(key.position + key.size)?;
        let consumed = decoder.position() - key.position;
        if consumed != key.size {
            return Err(Error::EntrySpanMismatch { index, expected: key.size, actual: consumed });
        }
        log::debug!("deferred entry {index}: {} nodes from {} bytes", nodes.len(), consumed);
        Ok(Some(nodes))
    }

    /// Drops this handle's share of the source. Later reads fail with
    /// [`Error::Disposed`].
    pub fn release(&self) {
        if let Some(mut source) = self.source.borrow_mut().take() {
            source.release();
        }
    }

    pub fn is_released(&self) -> bool {
        self.source.borrow().is_none()
    }
}

impl fmt::Debug for DeferredContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredContent")
            .field("keys", &self.keys.len())
            .field("region", &(self.region_start..self.region_end))
            .field("table_end", &self.table_end)
            .field("released", &self.is_released())
            .finish()
    }
}

impl Decoder {
    /// `DeferableContentStart`: Key-Tabelle lesen, Handle emittieren, Region
    /// ueberspringen.
    pub(super) fn deferable_content(&mut self, content_size: u32) -> Result<()> {
        self.prepare_member_slot("DeferableContentStart")?;
        let region_start = self.cursor.position();
        let region_end = region_start + u64::from(content_size);
        if region_end > self.cursor.end() {
            return Err(Error::invalid_key_table(format!(
                "region end {region_end} beyond stream end {}",
                self.cursor.end()
            )));
        }

        let mut keys = self.read_key_table(region_end)?;
        let table_end = self.cursor.position();
        patch_positions(&mut keys, table_end, region_end)?;
        self.register_region_declarations(region_end)?;
        self.cursor.seek_to(region_end)?;
        log::debug!(
            "deferred region {region_start}..{region_end}: {} keys, table ends at {table_end}",
            keys.len()
        );

        let content = DeferredContent {
            source: RefCell::new(Some(self.cursor.source().share()?)),
            resolver: Rc::clone(&self.resolver),
            materializer: Rc::clone(&self.materializer),
            options: self.options.clone(),
            keys: keys.into_iter().map(Rc::new).collect(),
            region_start,
            table_end,
            region_end,
        };
        let Some(frame) = self.frames.current_mut() else {
            return Err(Error::structural("object scope", "DeferableContentStart"));
        };
        frame.deferred = true;
        let out = self.writers.active();
        out.start_member(MemberInfo::directive(directive::DEFERRED_CONTENT));
        out.value(Value::Deferred(Rc::new(content)));
        out.end_member();
        Ok(())
    }

    fn read_key_table(&mut self, region_end: u64) -> Result<Vec<KeyRecord>> {
        let mut keys: Vec<KeyRecord> = Vec::new();
        while self.cursor.position() < region_end {
            let offset = self.cursor.position();
            let raw = self.require_record()?;
            match raw.record {
                Record::DefAttributeKeyString { value_id, key } => {
                    let text = self.resolver_mut().resolve_string(value_id)?;
                    keys.push(KeyRecord::new(key, KeyPayload::String(text)));
                }
                Record::DefAttributeKeyType { type_id, key, .. } => {
                    let ty = self.resolver_mut().resolve_type(type_id)?;
                    keys.push(KeyRecord::new(key, KeyPayload::Type(ty)));
                }
                Record::KeyElementStart { type_id, flags, key } => {
                    let ty = self.resolver_mut().resolve_type(type_id)?;
                    let nodes = self.capture_isolated(ty, flags)?;
                    keys.push(KeyRecord::new(key, KeyPayload::Nodes(Rc::new(nodes))));
                }
                Record::StaticResourceStart { type_id, flags } => {
                    let ty = self.resolver_mut().resolve_type(type_id)?;
                    let nodes = self.capture_isolated(ty, flags)?;
                    last_key(&mut keys, "StaticResourceStart")?
                        .static_resources
                        .push(StaticResourceEntry::Subtree(Rc::new(nodes)));
                }
                Record::OptimizedStaticResource { flags, value_id } => {
                    last_key(&mut keys, "OptimizedStaticResource")?
                        .static_resources
                        .push(StaticResourceEntry::Optimized { flags, value_id });
                }
                record @ (Record::LineNumberAndPosition { .. } | Record::LinePosition { .. }) => {
                    self.handle(record)?;
                }
                _ => {
                    self.cursor.seek_to(offset)?;
                    break;
                }
            }
        }
        Ok(keys)
    }

    /// Decodes one object subtree into a side buffer, detached from the open
    /// scopes of the document.
    fn capture_isolated(&mut self, ty: TypeRef, flags: u8) -> Result<NodeList> {
        let frames = std::mem::take(&mut self.frames);
        let namespaces = std::mem::take(&mut self.pending_namespaces);
        let in_key_table = std::mem::replace(&mut self.in_key_table, true);
        self.writers.push_writer();
        self.open_object(ty, flags);
        let result = self.run_until_depth(0);
        let captured = self.writers.pop_writer();
        self.frames = frames;
        self.pending_namespaces = namespaces;
        self.in_key_table = in_key_table;
        result?;
        captured
    }

    /// Declarations inside the value area are applied up front, so entries
    /// read in any order see them.
    fn register_region_declarations(&mut self, region_end: u64) -> Result<()> {
        while self.cursor.position() < region_end {
            let raw = self.require_record()?;
            if raw.record.is_declaration() {
                self.handle(raw.record)?;
            }
        }
        if self.cursor.position() != region_end {
            return Err(Error::invalid_key_table(format!(
                "record crosses region end {region_end}"
            )));
        }
        Ok(())
    }

    /// `StaticResourceId`: replays static resource `id` of the entry key.
    pub(super) fn replay_static_resource(&mut self, id: i16) -> Result<()> {
        use crate::record::{STATIC_RESOURCE_KEY_IS_STATIC, STATIC_RESOURCE_KEY_IS_TYPE};

        let entry = self
            .entry_key
            .as_ref()
            .and_then(|key| usize::try_from(id).ok().and_then(|i| key.static_resources.get(i)))
            .cloned()
            .ok_or(Error::StaticResourceNotFound(id))?;
        match entry {
            StaticResourceEntry::Subtree(nodes) => {
                crate::node::transform(nodes.iter(), self.writers.active());
            }
            StaticResourceEntry::Optimized { flags, value_id } => {
                let (ext, arg) = {
                    let mut resolver = self.resolver_mut();
                    let arg = if flags & STATIC_RESOURCE_KEY_IS_TYPE != 0 {
                        PositionalArg::Type(resolver.resolve_type(value_id)?)
                    } else if flags & STATIC_RESOURCE_KEY_IS_STATIC != 0 {
                        let (owner, name) = resolver.property_declaration(value_id)?;
                        PositionalArg::Static(format!("{}.{name}", owner.name()))
                    } else {
                        PositionalArg::Text(resolver.resolve_string(value_id)?)
                    };
                    (resolver.language().static_resource.clone(), arg)
                };
                self.extension_object(ext, arg);
            }
        }
        Ok(())
    }
}

fn last_key<'a>(keys: &'a mut [KeyRecord], found: &'static str) -> Result<&'a mut KeyRecord> {
    keys.last_mut().ok_or_else(|| Error::structural("key record", found))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(rel: u32) -> KeyRecord {
        KeyRecord::new(
            KeyPosition { value_position: rel, ..KeyPosition::default() },
            KeyPayload::String(format!("k{rel}")),
        )
    }

    #[test]
    fn spans_cover_the_value_area() {
        let mut keys = vec![key(0), key(7), key(9), key(20)];
        patch_positions(&mut keys, 100, 150).unwrap();
        let positions: Vec<u64> = keys.iter().map(KeyRecord::position).collect();
        let sizes: Vec<u64> = keys.iter().map(KeyRecord::size).collect();
        assert_eq!(positions, [100, 107, 109, 120]);
        assert_eq!(sizes, [7, 2, 11, 30]);
        assert_eq!(sizes.iter().sum::<u64>(), 150 - 100);
    }

    #[test]
    fn repeated_positions_are_rejected() {
        let mut keys = vec![key(0), key(7), key(7)];
        let err = patch_positions(&mut keys, 100, 150).unwrap_err();
        assert!(matches!(err, Error::InvalidKeyTable(_)), "{err}");
    }

    #[test]
    fn decreasing_positions_are_rejected() {
        let mut keys = vec![key(10), key(4)];
        let err = patch_positions(&mut keys, 0, 50).unwrap_err();
        assert!(matches!(err, Error::InvalidKeyTable(_)));
    }

    #[test]
    fn position_beyond_region_is_rejected() {
        let mut keys = vec![key(51)];
        assert!(matches!(patch_positions(&mut keys, 0, 50), Err(Error::InvalidKeyTable(_))));
    }

    #[test]
    fn empty_table_is_fine() {
        let mut keys: Vec<KeyRecord> = Vec::new();
        patch_positions(&mut keys, 10, 10).unwrap();
    }

    #[test]
    fn key_at_region_end_has_no_value() {
        let mut keys = vec![key(0), key(12)];
        patch_positions(&mut keys, 0, 12).unwrap();
        assert_eq!(keys[1].position(), 12);
        assert_eq!(keys[1].size(), 0);
    }
}
