//! Stream header.
//!
//! Der Header hat folgende Struktur:
//! - Signatur-Laenge als `u32` (little endian)
//! - Signatur-Bytes (Standard: `MSBAML` als UTF-16LE)
//! - Drei Versionsworte als `u32`: Reader-, Updater- und Writer-Version
//!
//! The header is consumed once at stream start and is not otherwise interpreted;
//! a signature that differs from the expected one is only logged.
//!
//! # Beispiel
//!
//! ```
//! use cmrx::header::Header;
//!
//! let header = Header::default();
//! let mut bytes = Vec::new();
//! header.encode(&mut bytes);
//! assert_eq!(bytes.len(), 4 + 12 + 12);
//! ```

use crate::source::ByteCursor;
use crate::{Error, Result};

/// Standard-Signatur: "MSBAML" als UTF-16LE.
pub const DEFAULT_SIGNATURE: &[u8] = b"M\0S\0B\0A\0M\0L\0";

/// Default version word (major 0, minor 0x60).
pub const DEFAULT_VERSION: u32 = 0x0000_0060;

/// Obergrenze fuer die Signatur-Laenge; alles darueber ist kein Header.
const MAX_SIGNATURE_LEN: u32 = 256;

/// Stream header: signature plus three version words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    signature: Vec<u8>,
    versions: [u32; 3],
}

impl Default for Header {
    fn default() -> Self {
        Self {
            signature: DEFAULT_SIGNATURE.to_vec(),
            versions: [DEFAULT_VERSION; 3],
        }
    }
}

impl Header {
    pub fn new(signature: impl Into<Vec<u8>>, versions: [u32; 3]) -> Self {
        Self { signature: signature.into(), versions }
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Reader, updater and writer version words.
    pub fn versions(&self) -> [u32; 3] {
        self.versions
    }

    /// Encoded size in bytes.
    pub fn encoded_len(&self) -> usize {
        4 + self.signature.len() + 12
    }

    /// Appends the encoded header to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.signature.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.signature);
        for v in self.versions {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }

    /// Reads the header at the cursor position.
    pub fn decode(cursor: &mut ByteCursor) -> Result<Self> {
        let len = read_u32(cursor)?;
        if len > MAX_SIGNATURE_LEN {
            return Err(Error::MalformedHeader);
        }
        let signature = cursor.read_vec(len as usize).map_err(header_err)?;
        let mut versions = [0u32; 3];
        for v in &mut versions {
            *v = read_u32(cursor)?;
        }
        Ok(Self { signature, versions })
    }
}

fn read_u32(cursor: &mut ByteCursor) -> Result<u32> {
    let bytes = cursor.read_vec(4).map_err(header_err)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Abgeschnittener Header ist ein Header-Fehler, kein Record-Fehler.
fn header_err(e: Error) -> Error {
    match e {
        Error::PrematureEndOfStream => Error::MalformedHeader,
        other => other,
    }
}
