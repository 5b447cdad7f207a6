//! Record encoding.
//!
//! The decoder never writes records back; this writer exists for tooling and
//! fixtures that need to assemble a stream record by record, including deferred
//! regions whose key table points forward into the value area.

use crate::header::Header;
use crate::varint;

use super::{KeyPosition, Record};

/// Appends the encoded record to `out`.
pub fn encode_record(record: &Record, out: &mut Vec<u8>) {
    let ty = record.record_type();
    let mut payload = Vec::new();
    encode_payload(record, &mut payload);
    out.push(ty.tag());
    if ty.fixed_size().is_none() {
        varint::encode(out, payload.len() as u32);
    } else {
        debug_assert_eq!(ty.fixed_size(), Some(payload.len()), "{}", ty.name());
    }
    out.extend_from_slice(&payload);
}

fn put_i16(out: &mut Vec<u8>, v: i16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_string(out: &mut Vec<u8>, s: &str) {
    varint::encode(out, s.len() as u32);
    out.extend_from_slice(s.as_bytes());
}

fn put_key(out: &mut Vec<u8>, key: &KeyPosition) {
    put_u32(out, key.value_position);
    out.push(u8::from(key.shared));
    out.push(u8::from(key.shared_set));
}

fn encode_payload(record: &Record, out: &mut Vec<u8>) {
    match record {
        Record::DocumentStart { load_async, max_async_records, debug } => {
            out.push(u8::from(*load_async));
            put_u32(out, *max_async_records);
            out.push(u8::from(*debug));
        }
        Record::DocumentEnd
        | Record::ElementEnd
        | Record::PropertyComplexEnd
        | Record::PropertyArrayEnd
        | Record::PropertyIListEnd
        | Record::PropertyIDictionaryEnd
        | Record::KeyElementEnd
        | Record::ConstructorParametersStart
        | Record::ConstructorParametersEnd
        | Record::StaticResourceEnd => {}
        Record::ElementStart { type_id, flags } | Record::StaticResourceStart { type_id, flags } => {
            put_i16(out, *type_id);
            out.push(*flags);
        }
        Record::Property { attribute_id, value } => {
            put_i16(out, *attribute_id);
            put_string(out, value);
        }
        Record::PropertyCustom { attribute_id, serializer_id, data } => {
            put_i16(out, *attribute_id);
            put_i16(out, *serializer_id);
            out.extend_from_slice(data);
        }
        Record::PropertyComplexStart { attribute_id }
        | Record::PropertyArrayStart { attribute_id }
        | Record::PropertyIListStart { attribute_id }
        | Record::PropertyIDictionaryStart { attribute_id }
        | Record::ContentProperty { attribute_id } => put_i16(out, *attribute_id),
        Record::Text { value } => put_string(out, value),
        Record::TextWithConverter { value, converter_id } => {
            put_string(out, value);
            put_i16(out, *converter_id);
        }
        Record::XmlnsProperty { prefix, uri, assembly_ids } => {
            put_string(out, prefix);
            put_string(out, uri);
            put_u16(out, assembly_ids.len() as u16);
            for id in assembly_ids {
                put_i16(out, *id);
            }
        }
        Record::DefAttribute { value, name_id }
        | Record::PresentationOptionsAttribute { value, name_id } => {
            put_string(out, value);
            put_i16(out, *name_id);
        }
        Record::PiMapping { xml_namespace, clr_namespace, assembly_id } => {
            put_string(out, xml_namespace);
            put_string(out, clr_namespace);
            put_i16(out, *assembly_id);
        }
        Record::AssemblyInfo { assembly_id, name } => {
            put_i16(out, *assembly_id);
            put_string(out, name);
        }
        Record::TypeInfo { type_id, assembly_id, type_name } => {
            put_i16(out, *type_id);
            put_i16(out, *assembly_id);
            put_string(out, type_name);
        }
        Record::TypeSerializerInfo { type_id, assembly_id, type_name, serializer_id } => {
            put_i16(out, *type_id);
            put_i16(out, *assembly_id);
            put_string(out, type_name);
            put_i16(out, *serializer_id);
        }
        Record::AttributeInfo { attribute_id, owner_type_id, usage, name } => {
            put_i16(out, *attribute_id);
            put_i16(out, *owner_type_id);
            out.push(*usage);
            put_string(out, name);
        }
        Record::StringInfo { string_id, value } => {
            put_i16(out, *string_id);
            put_string(out, value);
        }
        Record::PropertyStringReference { attribute_id, string_id } => {
            put_i16(out, *attribute_id);
            put_i16(out, *string_id);
        }
        Record::PropertyTypeReference { attribute_id, type_id } => {
            put_i16(out, *attribute_id);
            put_i16(out, *type_id);
        }
        Record::PropertyWithExtension { attribute_id, extension, value_id } => {
            put_i16(out, *attribute_id);
            put_u16(out, *extension);
            put_i16(out, *value_id);
        }
        Record::PropertyWithConverter { attribute_id, value, converter_id } => {
            put_i16(out, *attribute_id);
            put_string(out, value);
            put_i16(out, *converter_id);
        }
        Record::DeferableContentStart { content_size } => put_u32(out, *content_size),
        Record::DefAttributeKeyString { value_id, key } => {
            put_i16(out, *value_id);
            put_key(out, key);
        }
        Record::DefAttributeKeyType { type_id, flags, key }
        | Record::KeyElementStart { type_id, flags, key } => {
            put_i16(out, *type_id);
            out.push(*flags);
            put_key(out, key);
        }
        Record::ConstructorParameterType { type_id } => put_i16(out, *type_id),
        Record::ConnectionId { connection_id } => out.extend_from_slice(&connection_id.to_le_bytes()),
        Record::StaticResourceId { static_resource_id } => put_i16(out, *static_resource_id),
        Record::TextWithId { value_id } => put_i16(out, *value_id),
        Record::LineNumberAndPosition { line, position } => {
            put_u32(out, *line);
            put_u32(out, *position);
        }
        Record::LinePosition { position } => put_u32(out, *position),
        Record::OptimizedStaticResource { flags, value_id } => {
            out.push(*flags);
            put_i16(out, *value_id);
        }
        Record::PropertyWithStaticResourceId { attribute_id, static_resource_id } => {
            put_i16(out, *attribute_id);
            put_i16(out, *static_resource_id);
        }
    }
}

/// One entry of a deferred region.
///
/// `key` starts with the key record itself (key-by-string, key-by-type or a
/// complex key element); its value position is filled in by the writer. Further
/// records (key element content, static resources) follow it.
#[derive(Debug, Clone, Default)]
pub struct DeferredEntry {
    pub key: Vec<Record>,
    pub value: Vec<Record>,
}

/// Assembles a stream record by record.
#[derive(Debug, Clone, Default)]
pub struct RecordWriter {
    buf: Vec<u8>,
}

impl RecordWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the stream with `header`.
    pub fn with_header(header: &Header) -> Self {
        let mut buf = Vec::with_capacity(256);
        header.encode(&mut buf);
        Self { buf }
    }

    pub fn record(&mut self, record: Record) -> &mut Self {
        encode_record(&record, &mut self.buf);
        self
    }

    pub fn records(&mut self, records: impl IntoIterator<Item = Record>) -> &mut Self {
        for record in records {
            encode_record(&record, &mut self.buf);
        }
        self
    }

    /// Raw bytes, for streams that are deliberately malformed.
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// Writes a `DeferableContentStart` record, the key table and the values.
    ///
    /// Value positions are relative to the end of the key table; the content size
    /// covers key table and values.
    pub fn deferred_region(&mut self, entries: &[DeferredEntry]) -> &mut Self {
        let mut values = Vec::new();
        let mut positions = Vec::with_capacity(entries.len());
        for entry in entries {
            positions.push(values.len() as u32);
            for record in &entry.value {
                encode_record(record, &mut values);
            }
        }

        let mut table = Vec::new();
        for (entry, position) in entries.iter().zip(positions) {
            for (i, record) in entry.key.iter().enumerate() {
                if i == 0 {
                    encode_record(&with_value_position(record, position), &mut table);
                } else {
                    encode_record(record, &mut table);
                }
            }
        }

        let content_size = (table.len() + values.len()) as u32;
        encode_record(&Record::DeferableContentStart { content_size }, &mut self.buf);
        self.buf.extend_from_slice(&table);
        self.buf.extend_from_slice(&values);
        self
    }

    /// Number of bytes written so far.
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

fn with_value_position(record: &Record, value_position: u32) -> Record {
    let mut record = record.clone();
    match &mut record {
        Record::DefAttributeKeyString { key, .. }
        | Record::DefAttributeKeyType { key, .. }
        | Record::KeyElementStart { key, .. } => key.value_position = value_position,
        _ => {}
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::parser::parse_payload;
    use crate::record::{RecordType, read_record};
    use crate::source::{ByteCursor, SharedSource};

    fn decode_all(bytes: Vec<u8>) -> Vec<Record> {
        let mut c = ByteCursor::new(SharedSource::from_bytes(bytes));
        let mut out = Vec::new();
        while let Some(raw) = read_record(&mut c, usize::MAX).unwrap() {
            out.push(raw.record);
        }
        out
    }

    #[test]
    fn fixed_payloads_match_declared_sizes() {
        let samples = [
            Record::DocumentStart { load_async: false, max_async_records: 200, debug: false },
            Record::ElementStart { type_id: 7, flags: 0 },
            Record::PropertyWithExtension { attribute_id: -1, extension: 0x4001, value_id: 3 },
            Record::LineNumberAndPosition { line: 3, position: 9 },
            Record::ConnectionId { connection_id: -5 },
        ];
        for record in samples {
            let mut payload = Vec::new();
            encode_payload(&record, &mut payload);
            let ty = record.record_type();
            assert_eq!(Some(payload.len()), ty.fixed_size(), "{}", ty.name());
            assert_eq!(parse_payload(ty, &payload).unwrap(), record);
        }
    }

    #[test]
    fn xmlns_record_layout() {
        let record = Record::XmlnsProperty {
            prefix: "x".into(),
            uri: "urn:x".into(),
            assembly_ids: vec![1, 2],
        };
        let mut out = Vec::new();
        encode_record(&record, &mut out);
        assert_eq!(out[0], RecordType::XmlnsProperty.tag());
        // size(1) + prefix(2) + uri(6) + count(2) + ids(4)
        assert_eq!(out[1] as usize, out.len() - 2);
        assert_eq!(decode_all(out), vec![record]);
    }

    #[test]
    fn deferred_region_patches_positions() {
        let key = |value_id| Record::DefAttributeKeyString {
            value_id,
            key: KeyPosition { value_position: 999, shared: true, shared_set: false },
        };
        let entries = vec![
            DeferredEntry {
                key: vec![key(0)],
                value: vec![Record::ElementStart { type_id: 1, flags: 0 }, Record::ElementEnd],
            },
            DeferredEntry {
                key: vec![key(1)],
                value: vec![Record::ElementStart { type_id: 2, flags: 0 }, Record::ElementEnd],
            },
        ];
        let mut w = RecordWriter::new();
        w.deferred_region(&entries);
        let records = decode_all(w.into_bytes());

        let Record::DeferableContentStart { content_size } = records[0] else {
            panic!("expected DeferableContentStart, got {:?}", records[0]);
        };
        // two keys à 1 tag + 1 size + 8 payload, two values à 4 + 1
        assert_eq!(content_size, 2 * 10 + 2 * 5);
        let positions: Vec<u32> = records[1..3]
            .iter()
            .map(|r| match r {
                Record::DefAttributeKeyString { key, .. } => key.value_position,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(positions, vec![0, 5]);
    }
}
