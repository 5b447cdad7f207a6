//! Custom binary value materialization.
//!
//! `PropertyCustom` records carry a value in a converter-specific binary form.
//! Turning those bytes into a host value is the job of a [`ValueMaterializer`];
//! the decoder only hands the bytes over.

use crate::node::Value;
use crate::{Error, Result};

pub trait ValueMaterializer {
    /// Converts the custom bytes of serializer `converter_id` into a value.
    fn materialize(&self, converter_id: i16, bytes: &[u8]) -> Result<Value>;
}

/// Keeps the bytes as [`Value::Binary`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RawMaterializer;

impl ValueMaterializer for RawMaterializer {
    fn materialize(&self, converter_id: i16, bytes: &[u8]) -> Result<Value> {
        Ok(Value::Binary { converter_id, bytes: bytes.to_vec() })
    }
}

/// Decodes custom bytes as UTF-8 text; anything else is [`Error::InvalidValue`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TextMaterializer;

impl ValueMaterializer for TextMaterializer {
    fn materialize(&self, converter_id: i16, bytes: &[u8]) -> Result<Value> {
        std::str::from_utf8(bytes)
            .map(|s| Value::Text(s.to_owned()))
            .map_err(|e| Error::InvalidValue(format!("serializer {converter_id}: {e}")))
    }
}
