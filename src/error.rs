//! Central error types for the compiled markup decoder.
//!
//! Every error is fatal for the decode operation that raised it. [`Error::kind`]
//! groups the variants into the handful of failure classes callers care about.

use core::fmt;
use std::borrow::Cow;

/// Welche Art von Deskriptor nicht aufgeloest werden konnte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorKind {
    Assembly,
    Type,
    Property,
    String,
    Converter,
}

impl fmt::Display for DescriptorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Assembly => "assembly",
            Self::Type => "type",
            Self::Property => "property",
            Self::String => "string",
            Self::Converter => "converter",
        };
        f.write_str(name)
    }
}

/// Coarse failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown tag, truncated payload, size mismatch, bad header.
    MalformedRecord,
    /// Id outside the registry and the declared tables.
    UnresolvedDescriptor,
    /// Records arrive in an order the node stream cannot express.
    StructuralOrder,
    /// The decoder or its byte source was already released.
    Disposed,
    /// The underlying reader failed.
    Io,
    /// Value materialization or catalog loading failed.
    Value,
}

/// All errors raised while decoding a compiled markup stream.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Header is truncated or its signature length is implausible.
    MalformedHeader,
    /// A record tag outside the known enumeration.
    UnknownRecord { tag: u8, offset: u64 },
    /// The stream ended in the middle of a record or with open scopes.
    PrematureEndOfStream,
    /// The payload parser did not consume exactly the declared record size.
    RecordSizeMismatch {
        record: &'static str,
        declared: usize,
        consumed: usize,
    },
    /// Declared record size exceeds the configured limit.
    RecordTooLarge { size: u64, max: usize },
    /// A variable-length integer has more than five groups.
    VarintOverflow,
    /// An inline string is not valid UTF-8.
    InvalidUtf8,
    /// Id outside the registry range and the declared table.
    DescriptorNotFound { kind: DescriptorKind, id: i16 },
    /// A declaration id skips ahead of the table length (or is negative).
    OutOfOrderDeclaration {
        kind: DescriptorKind,
        id: i16,
        expected: usize,
    },
    /// Records arrive in an order the node stream cannot express.
    StructuralViolation {
        /// Was erwartet wurde (leer wenn nicht verfuegbar).
        expected: Cow<'static, str>,
        /// Was gefunden wurde (leer wenn nicht verfuegbar).
        found: Cow<'static, str>,
    },
    /// Object or text without an explicit member and no defaulting strategy applies.
    NoDefaultMember { type_name: String },
    /// Key table positions are not monotonic or exceed the deferred region.
    InvalidKeyTable(Cow<'static, str>),
    /// A deferred entry did not occupy exactly its patched span.
    EntrySpanMismatch {
        index: usize,
        expected: u64,
        actual: u64,
    },
    /// Deferred entry index outside the key table.
    EntryIndexOutOfRange { index: usize, len: usize },
    /// Static resource index outside the current key's list.
    StaticResourceNotFound(i16),
    /// Decoder or byte source already released.
    Disposed,
    /// The shared byte source is borrowed by another cursor right now.
    SourceBusy,
    /// IO error from the underlying reader.
    IoError(String),
    /// A custom value could not be materialized.
    InvalidValue(String),
    /// A known-schema catalog document could not be loaded.
    InvalidCatalog(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedHeader => write!(f, "malformed stream header"),
            Self::UnknownRecord { tag, offset } => {
                write!(f, "unknown record tag {tag} at offset {offset}")
            }
            Self::PrematureEndOfStream => write!(f, "premature end of record stream"),
            Self::RecordSizeMismatch { record, declared, consumed } => write!(
                f,
                "record {record} declares {declared} payload bytes but {consumed} were consumed"
            ),
            Self::RecordTooLarge { size, max } => {
                write!(f, "record size {size} exceeds maximum {max}")
            }
            Self::VarintOverflow => write!(f, "variable-length integer overflow"),
            Self::InvalidUtf8 => write!(f, "inline string is not valid UTF-8"),
            Self::DescriptorNotFound { kind, id } => {
                write!(f, "{kind} descriptor not found for id {id}")
            }
            Self::OutOfOrderDeclaration { kind, id, expected } => write!(
                f,
                "out-of-order {kind} declaration: id {id}, expected {expected}"
            ),
            Self::StructuralViolation { expected, found } => {
                if expected.is_empty() && found.is_empty() {
                    write!(f, "structural order violation")
                } else {
                    write!(
                        f,
                        "structural order violation: expected '{expected}', found '{found}'"
                    )
                }
            }
            Self::NoDefaultMember { type_name } => write!(
                f,
                "no member open on '{type_name}' and no content, items or initialization member applies"
            ),
            Self::InvalidKeyTable(msg) => write!(f, "invalid key table: {msg}"),
            Self::EntrySpanMismatch { index, expected, actual } => write!(
                f,
                "deferred entry {index} spans {actual} bytes, key table says {expected}"
            ),
            Self::EntryIndexOutOfRange { index, len } => {
                write!(f, "deferred entry index {index} out of range 0..{len}")
            }
            Self::StaticResourceNotFound(id) => {
                write!(f, "static resource {id} not found on current key")
            }
            Self::Disposed => write!(f, "decoder or byte source already released"),
            Self::SourceBusy => write!(f, "byte source is in use by another cursor"),
            Self::IoError(msg) => write!(f, "IO error: {msg}"),
            Self::InvalidValue(msg) => write!(f, "invalid value: {msg}"),
            Self::InvalidCatalog(msg) => write!(f, "invalid schema catalog: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Self::PrematureEndOfStream
        } else {
            Self::IoError(err.to_string())
        }
    }
}

impl Error {
    /// Erstellt einen `StructuralViolation` Fehler mit Kontext.
    pub fn structural(
        expected: impl Into<Cow<'static, str>>,
        found: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::StructuralViolation {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Erstellt einen `InvalidKeyTable` Fehler mit Nachricht.
    pub fn invalid_key_table(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidKeyTable(msg.into())
    }

    /// Failure class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedHeader
            | Self::UnknownRecord { .. }
            | Self::PrematureEndOfStream
            | Self::RecordSizeMismatch { .. }
            | Self::RecordTooLarge { .. }
            | Self::VarintOverflow
            | Self::InvalidUtf8
            | Self::InvalidKeyTable(_)
            | Self::EntrySpanMismatch { .. } => ErrorKind::MalformedRecord,
            Self::DescriptorNotFound { .. }
            | Self::OutOfOrderDeclaration { .. }
            | Self::StaticResourceNotFound(_)
            | Self::EntryIndexOutOfRange { .. } => ErrorKind::UnresolvedDescriptor,
            Self::StructuralViolation { .. } | Self::NoDefaultMember { .. } => {
                ErrorKind::StructuralOrder
            }
            Self::Disposed | Self::SourceBusy => ErrorKind::Disposed,
            Self::IoError(_) => ErrorKind::Io,
            Self::InvalidValue(_) | Self::InvalidCatalog(_) => ErrorKind::Value,
        }
    }
}

/// A convenience `Result` type alias using [`Error`].
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_record_display() {
        let e = Error::UnknownRecord { tag: 200, offset: 17 };
        let msg = e.to_string();
        assert!(msg.contains("200"), "{msg}");
        assert!(msg.contains("17"), "{msg}");
        assert_eq!(e.kind(), ErrorKind::MalformedRecord);
    }

    #[test]
    fn size_mismatch_display() {
        let e = Error::RecordSizeMismatch { record: "Property", declared: 9, consumed: 7 };
        let msg = e.to_string();
        assert!(msg.contains("Property"), "{msg}");
        assert!(msg.contains('9'), "{msg}");
        assert!(msg.contains('7'), "{msg}");
    }

    #[test]
    fn descriptor_not_found_display() {
        let e = Error::DescriptorNotFound { kind: DescriptorKind::Type, id: -400 };
        let msg = e.to_string();
        assert!(msg.contains("type"), "{msg}");
        assert!(msg.contains("-400"), "{msg}");
        assert_eq!(e.kind(), ErrorKind::UnresolvedDescriptor);
    }

    #[test]
    fn structural_violation_display() {
        let e = Error::structural("", "");
        assert_eq!(e.to_string(), "structural order violation");

        let e = Error::structural("ElementEnd", "PropertyComplexEnd");
        let msg = e.to_string();
        assert!(msg.contains("ElementEnd"), "{msg}");
        assert!(msg.contains("PropertyComplexEnd"), "{msg}");
        assert_eq!(e.kind(), ErrorKind::StructuralOrder);
    }

    #[test]
    fn no_default_member_is_structural() {
        let e = Error::NoDefaultMember { type_name: "Demo.Plain".into() };
        assert!(e.to_string().contains("Demo.Plain"));
        assert_eq!(e.kind(), ErrorKind::StructuralOrder);
    }

    #[test]
    fn io_eof_maps_to_premature_end() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        assert_eq!(Error::from(io), Error::PrematureEndOfStream);

        let io = std::io::Error::other("broken pipe");
        let e = Error::from(io);
        assert!(matches!(e, Error::IoError(ref m) if m.contains("broken pipe")));
        assert_eq!(e.kind(), ErrorKind::Io);
    }

    #[test]
    fn disposed_kinds() {
        assert_eq!(Error::Disposed.kind(), ErrorKind::Disposed);
        assert_eq!(Error::SourceBusy.kind(), ErrorKind::Disposed);
    }

    #[test]
    fn error_implements_std_error() {
        let e: Box<dyn std::error::Error> = Box::new(Error::MalformedHeader);
        assert!(!e.to_string().is_empty());
    }

    #[test]
    fn error_is_clone_and_eq() {
        let e1 = Error::invalid_key_table("positions not monotonic");
        let e2 = e1.clone();
        assert_eq!(e1, e2);
    }
}
