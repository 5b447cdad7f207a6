use std::rc::Rc;

use crate::error::Result;
use crate::node::NodeList;
use crate::options::DecoderOptions;
use crate::registry::SchemaRegistry;
use crate::source::SharedSource;

use super::Decoder;

/// Decodiert ein komplettes Dokument mit Default-Options.
pub fn decode(data: &[u8], registry: Rc<dyn SchemaRegistry>) -> Result<NodeList> {
    decode_with_options(data, registry, DecoderOptions::default())
}

/// Decodiert ein komplettes Dokument.
///
/// Deferred regions stay unread; their handles keep a share of the data.
pub fn decode_with_options(
    data: &[u8],
    registry: Rc<dyn SchemaRegistry>,
    options: DecoderOptions,
) -> Result<NodeList> {
    let mut decoder = decode_iter(SharedSource::from_bytes(data), registry, options)?;
    let mut nodes = NodeList::new();
    while let Some(node) = decoder.advance()? {
        nodes.push(node);
    }
    Ok(nodes)
}

/// Erstellt einen pull-basierten Decoder; Nodes ueber [`Decoder::advance`]
/// oder als Iterator.
pub fn decode_iter(
    source: SharedSource,
    registry: Rc<dyn SchemaRegistry>,
    options: DecoderOptions,
) -> Result<Decoder> {
    Decoder::with_options(source, registry, options)
}
