//! Decoder options.
//!
//! # Beispiel
//!
//! ```
//! use cmrx::options::DecoderOptions;
//!
//! let opts = DecoderOptions::default()
//!     .with_line_info()
//!     .with_max_record_size(4096);
//!
//! assert!(opts.provide_line_info());
//! assert_eq!(opts.max_record_size(), 4096);
//! assert!(!opts.values_must_be_string());
//! ```

use crate::header::DEFAULT_SIGNATURE;
use crate::{Error, Result};

/// Default upper bound for a single record payload (16 MiB).
pub const DEFAULT_MAX_RECORD_SIZE: usize = 16 * 1024 * 1024;

/// Options controlling one decoding session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderOptions {
    pub(crate) provide_line_info: bool,
    pub(crate) values_must_be_string: bool,
    pub(crate) max_record_size: usize,
    pub(crate) expected_signature: Option<Vec<u8>>,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            provide_line_info: false,
            values_must_be_string: false,
            max_record_size: DEFAULT_MAX_RECORD_SIZE,
            expected_signature: Some(DEFAULT_SIGNATURE.to_vec()),
        }
    }
}

impl DecoderOptions {
    // --- Getter ---

    /// Line records update [`crate::Decoder::line_info`].
    pub fn provide_line_info(&self) -> bool { self.provide_line_info }
    /// Custom binary values are passed through unmaterialized.
    pub fn values_must_be_string(&self) -> bool { self.values_must_be_string }
    /// Largest accepted record payload in bytes.
    pub fn max_record_size(&self) -> usize { self.max_record_size }
    /// Header signature the stream should carry; `None` disables the check.
    pub fn expected_signature(&self) -> Option<&[u8]> { self.expected_signature.as_deref() }

    // --- Builder-Setter (Fluent API) ---

    /// Aktiviert Zeileninformationen.
    pub fn with_line_info(mut self) -> Self { self.provide_line_info = true; self }
    /// Custom-Werte nicht materialisieren.
    pub fn with_values_as_string(mut self) -> Self { self.values_must_be_string = true; self }
    /// Setzt die maximale Record-Groesse.
    pub fn with_max_record_size(mut self, size: usize) -> Self { self.max_record_size = size; self }
    /// Setzt die erwartete Signatur.
    pub fn with_expected_signature(mut self, signature: impl Into<Vec<u8>>) -> Self { self.expected_signature = Some(signature.into()); self }
    /// Deaktiviert die Signaturpruefung.
    pub fn without_signature_check(mut self) -> Self { self.expected_signature = None; self }

    // --- Mutable Setter ---

    /// Setzt Zeileninformationen.
    pub fn set_provide_line_info(&mut self, val: bool) { self.provide_line_info = val; }
    /// Setzt den String-Modus fuer Custom-Werte.
    pub fn set_values_must_be_string(&mut self, val: bool) { self.values_must_be_string = val; }
    /// Setzt die maximale Record-Groesse.
    pub fn set_max_record_size(&mut self, size: usize) { self.max_record_size = size; }
    /// Setzt die erwartete Signatur.
    pub fn set_expected_signature(&mut self, signature: Option<Vec<u8>>) { self.expected_signature = signature; }

    /// Rejects option values no stream could be decoded with.
    pub fn validate(&self) -> Result<()> {
        if self.max_record_size == 0 {
            return Err(Error::InvalidValue("max_record_size must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opts = DecoderOptions::default();
        assert_eq!(opts.max_record_size(), DEFAULT_MAX_RECORD_SIZE);
        assert_eq!(opts.expected_signature(), Some(DEFAULT_SIGNATURE));
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn setters_mirror_builders() {
        let mut opts = DecoderOptions::default();
        opts.set_values_must_be_string(true);
        opts.set_expected_signature(None);
        assert_eq!(
            opts,
            DecoderOptions::default().with_values_as_string().without_signature_check()
        );
    }

    #[test]
    fn zero_record_size_is_invalid() {
        let opts = DecoderOptions::default().with_max_record_size(0);
        assert!(matches!(opts.validate(), Err(Error::InvalidValue(_))));
    }
}
