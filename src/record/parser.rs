//! Record parsing: tag, size field and payload layouts.
//!
//! The payload of every record is read into memory first and parsed from the
//! slice; the parser has to consume exactly the declared length. There is no
//! re-synchronisation after a mismatch.

use crate::source::ByteCursor;
use crate::varint;
use crate::{Error, Result};

use super::{KeyPosition, Record, RecordType};

/// A record together with the stream offset of its tag byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub offset: u64,
    pub record: Record,
}

/// Reads the next record from the cursor.
///
/// Returns `Ok(None)` when the cursor is exhausted exactly at a record boundary.
pub fn read_record(cursor: &mut ByteCursor, max_size: usize) -> Result<Option<RawRecord>> {
    let offset = cursor.position();
    let Some(tag) = cursor.read_u8_opt()? else {
        return Ok(None);
    };
    let ty = RecordType::from_tag(tag).ok_or(Error::UnknownRecord { tag, offset })?;
    let size = match ty.fixed_size() {
        Some(size) => size,
        None => {
            let size = varint::decode(cursor)?;
            if size as usize > max_size {
                return Err(Error::RecordTooLarge { size: u64::from(size), max: max_size });
            }
            size as usize
        }
    };
    let payload = cursor.read_vec(size)?;
    let record = parse_payload(ty, &payload)?;
    Ok(Some(RawRecord { offset, record }))
}

/// Parses a payload of the given record type.
pub fn parse_payload(ty: RecordType, payload: &[u8]) -> Result<Record> {
    let mut r = PayloadReader::new(ty.name(), payload);
    let record = match ty {
        RecordType::DocumentStart => Record::DocumentStart {
            load_async: r.bool()?,
            max_async_records: r.u32()?,
            debug: r.bool()?,
        },
        RecordType::DocumentEnd => Record::DocumentEnd,
        RecordType::ElementStart => Record::ElementStart { type_id: r.i16()?, flags: r.u8()? },
        RecordType::ElementEnd => Record::ElementEnd,
        RecordType::Property => Record::Property { attribute_id: r.i16()?, value: r.string()? },
        RecordType::PropertyCustom => Record::PropertyCustom {
            attribute_id: r.i16()?,
            serializer_id: r.i16()?,
            data: r.rest().to_vec(),
        },
        RecordType::PropertyComplexStart => {
            Record::PropertyComplexStart { attribute_id: r.i16()? }
        }
        RecordType::PropertyComplexEnd => Record::PropertyComplexEnd,
        RecordType::PropertyArrayStart => Record::PropertyArrayStart { attribute_id: r.i16()? },
        RecordType::PropertyArrayEnd => Record::PropertyArrayEnd,
        RecordType::PropertyIListStart => Record::PropertyIListStart { attribute_id: r.i16()? },
        RecordType::PropertyIListEnd => Record::PropertyIListEnd,
        RecordType::PropertyIDictionaryStart => {
            Record::PropertyIDictionaryStart { attribute_id: r.i16()? }
        }
        RecordType::PropertyIDictionaryEnd => Record::PropertyIDictionaryEnd,
        RecordType::Text => Record::Text { value: r.string()? },
        RecordType::TextWithConverter => {
            Record::TextWithConverter { value: r.string()?, converter_id: r.i16()? }
        }
        RecordType::XmlnsProperty => {
            let prefix = r.string()?;
            let uri = r.string()?;
            let count = r.u16()?;
            let mut assembly_ids = Vec::with_capacity(usize::from(count).min(64));
            for _ in 0..count {
                assembly_ids.push(r.i16()?);
            }
            Record::XmlnsProperty { prefix, uri, assembly_ids }
        }
        RecordType::DefAttribute => Record::DefAttribute { value: r.string()?, name_id: r.i16()? },
        RecordType::PiMapping => Record::PiMapping {
            xml_namespace: r.string()?,
            clr_namespace: r.string()?,
            assembly_id: r.i16()?,
        },
        RecordType::AssemblyInfo => {
            Record::AssemblyInfo { assembly_id: r.i16()?, name: r.string()? }
        }
        RecordType::TypeInfo => Record::TypeInfo {
            type_id: r.i16()?,
            assembly_id: r.i16()?,
            type_name: r.string()?,
        },
        RecordType::TypeSerializerInfo => Record::TypeSerializerInfo {
            type_id: r.i16()?,
            assembly_id: r.i16()?,
            type_name: r.string()?,
            serializer_id: r.i16()?,
        },
        RecordType::AttributeInfo => Record::AttributeInfo {
            attribute_id: r.i16()?,
            owner_type_id: r.i16()?,
            usage: r.u8()?,
            name: r.string()?,
        },
        RecordType::StringInfo => Record::StringInfo { string_id: r.i16()?, value: r.string()? },
        RecordType::PropertyStringReference => Record::PropertyStringReference {
            attribute_id: r.i16()?,
            string_id: r.i16()?,
        },
        RecordType::PropertyTypeReference => Record::PropertyTypeReference {
            attribute_id: r.i16()?,
            type_id: r.i16()?,
        },
        RecordType::PropertyWithExtension => Record::PropertyWithExtension {
            attribute_id: r.i16()?,
            extension: r.u16()?,
            value_id: r.i16()?,
        },
        RecordType::PropertyWithConverter => Record::PropertyWithConverter {
            attribute_id: r.i16()?,
            value: r.string()?,
            converter_id: r.i16()?,
        },
        RecordType::DeferableContentStart => {
            Record::DeferableContentStart { content_size: r.u32()? }
        }
        RecordType::DefAttributeKeyString => {
            Record::DefAttributeKeyString { value_id: r.i16()?, key: r.key_position()? }
        }
        RecordType::DefAttributeKeyType => Record::DefAttributeKeyType {
            type_id: r.i16()?,
            flags: r.u8()?,
            key: r.key_position()?,
        },
        RecordType::KeyElementStart => Record::KeyElementStart {
            type_id: r.i16()?,
            flags: r.u8()?,
            key: r.key_position()?,
        },
        RecordType::KeyElementEnd => Record::KeyElementEnd,
        RecordType::ConstructorParametersStart => Record::ConstructorParametersStart,
        RecordType::ConstructorParametersEnd => Record::ConstructorParametersEnd,
        RecordType::ConstructorParameterType => {
            Record::ConstructorParameterType { type_id: r.i16()? }
        }
        RecordType::ConnectionId => Record::ConnectionId { connection_id: r.i32()? },
        RecordType::ContentProperty => Record::ContentProperty { attribute_id: r.i16()? },
        RecordType::StaticResourceStart => {
            Record::StaticResourceStart { type_id: r.i16()?, flags: r.u8()? }
        }
        RecordType::StaticResourceEnd => Record::StaticResourceEnd,
        RecordType::StaticResourceId => {
            Record::StaticResourceId { static_resource_id: r.i16()? }
        }
        RecordType::TextWithId => Record::TextWithId { value_id: r.i16()? },
        RecordType::PresentationOptionsAttribute => Record::PresentationOptionsAttribute {
            value: r.string()?,
            name_id: r.i16()?,
        },
        RecordType::LineNumberAndPosition => {
            Record::LineNumberAndPosition { line: r.u32()?, position: r.u32()? }
        }
        RecordType::LinePosition => Record::LinePosition { position: r.u32()? },
        RecordType::OptimizedStaticResource => {
            Record::OptimizedStaticResource { flags: r.u8()?, value_id: r.i16()? }
        }
        RecordType::PropertyWithStaticResourceId => Record::PropertyWithStaticResourceId {
            attribute_id: r.i16()?,
            static_resource_id: r.i16()?,
        },
    };
    r.finish()?;
    Ok(record)
}

/// Little-endian reader over one record payload.
///
/// Reading past the payload end reports a size mismatch for the record, since
/// the declared length was too short for the layout.
pub struct PayloadReader<'a> {
    record: &'static str,
    data: &'a [u8],
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    pub fn new(record: &'static str, data: &'a [u8]) -> Self {
        Self { record, data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos + n;
        if end > self.data.len() {
            return Err(Error::RecordSizeMismatch {
                record: self.record,
                declared: self.data.len(),
                consumed: end,
            });
        }
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn bool(&mut self) -> Result<bool> {
        Ok(self.u8()? != 0)
    }

    pub fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn i16(&mut self) -> Result<i16> {
        let b = self.take(2)?;
        Ok(i16::from_le_bytes([b[0], b[1]]))
    }

    pub fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn i32(&mut self) -> Result<i32> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Varint length followed by UTF-8 bytes.
    pub fn string(&mut self) -> Result<String> {
        let mut rest = &self.data[self.pos..];
        let before = rest.len();
        let len = match varint::decode(&mut rest) {
            Ok(len) => len as usize,
            Err(Error::PrematureEndOfStream) => {
                return Err(Error::RecordSizeMismatch {
                    record: self.record,
                    declared: self.data.len(),
                    consumed: self.data.len() + 1,
                });
            }
            Err(e) => return Err(e),
        };
        self.pos += before - rest.len();
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| Error::InvalidUtf8)
    }

    fn key_position(&mut self) -> Result<KeyPosition> {
        Ok(KeyPosition {
            value_position: self.u32()?,
            shared: self.bool()?,
            shared_set: self.bool()?,
        })
    }

    /// Everything not consumed yet.
    pub fn rest(&mut self) -> &'a [u8] {
        let bytes = &self.data[self.pos..];
        self.pos = self.data.len();
        bytes
    }

    /// Fails unless the whole payload was consumed.
    pub fn finish(&self) -> Result<()> {
        if self.pos != self.data.len() {
            return Err(Error::RecordSizeMismatch {
                record: self.record,
                declared: self.data.len(),
                consumed: self.pos,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SharedSource;

    fn cursor(bytes: Vec<u8>) -> ByteCursor {
        ByteCursor::new(SharedSource::from_bytes(bytes))
    }

    #[test]
    fn fixed_record_without_size_field() {
        let mut c = cursor(vec![3, 0xFE, 0xFF, 0x01, 4]);
        let first = read_record(&mut c, 1024).unwrap().unwrap();
        assert_eq!(first.offset, 0);
        assert_eq!(first.record, Record::ElementStart { type_id: -2, flags: 1 });
        let second = read_record(&mut c, 1024).unwrap().unwrap();
        assert_eq!(second.offset, 4);
        assert_eq!(second.record, Record::ElementEnd);
        assert!(read_record(&mut c, 1024).unwrap().is_none());
    }

    #[test]
    fn variable_record_with_string() {
        // Property: attr -1, value "hi"
        let mut c = cursor(vec![5, 5, 0xFF, 0xFF, 2, b'h', b'i']);
        let raw = read_record(&mut c, 1024).unwrap().unwrap();
        assert_eq!(raw.record, Record::Property { attribute_id: -1, value: "hi".into() });
    }

    #[test]
    fn unknown_tag_reports_offset() {
        let mut c = cursor(vec![4, 18, 0]);
        read_record(&mut c, 1024).unwrap();
        assert_eq!(read_record(&mut c, 1024), Err(Error::UnknownRecord { tag: 18, offset: 1 }));
    }

    #[test]
    fn declared_size_too_long() {
        // Text declares 4 bytes, string uses 3 → trailing byte unconsumed
        let mut c = cursor(vec![16, 4, 2, b'o', b'k', 0]);
        assert_eq!(
            read_record(&mut c, 1024),
            Err(Error::RecordSizeMismatch { record: "Text", declared: 4, consumed: 3 })
        );
    }

    #[test]
    fn declared_size_too_short() {
        // Text declares 2 bytes, string needs 3
        let mut c = cursor(vec![16, 2, 2, b'o', b'k']);
        assert!(matches!(
            read_record(&mut c, 1024),
            Err(Error::RecordSizeMismatch { record: "Text", declared: 2, .. })
        ));
    }

    #[test]
    fn truncated_payload() {
        let mut c = cursor(vec![3, 0x01]);
        assert_eq!(read_record(&mut c, 1024), Err(Error::PrematureEndOfStream));
    }

    #[test]
    fn record_size_limit() {
        let mut c = cursor(vec![16, 0x80, 0x08]);
        assert_eq!(
            read_record(&mut c, 1000),
            Err(Error::RecordTooLarge { size: 1024, max: 1000 })
        );
    }

    #[test]
    fn invalid_utf8_string() {
        let mut c = cursor(vec![16, 2, 1, 0xFF]);
        assert_eq!(read_record(&mut c, 1024), Err(Error::InvalidUtf8));
    }

    #[test]
    fn custom_property_keeps_raw_bytes() {
        let payload = [0x05, 0x00, 0x9C, 0xFF, 1, 2, 3];
        let record = parse_payload(RecordType::PropertyCustom, &payload).unwrap();
        assert_eq!(
            record,
            Record::PropertyCustom { attribute_id: 5, serializer_id: -100, data: vec![1, 2, 3] }
        );
    }
}
