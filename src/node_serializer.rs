//! Node-Stream → eingerueckter Text.
//!
//! Eine Zeile pro Node, Member und Objekte jeweils um zwei Spaces eingerueckt:
//!
//! ```text
//! SO {urn:ui}StackPanel
//!   SM Children
//!     GO
//!       SM x:Items
//!         SO {urn:ui}Button
//!         EO
//!       EM
//!     EO
//!   EM
//! EO
//! ```
//!
//! Textwerte werden als JSON-Strings ausgegeben, Binaerwerte als Base64.
//! Gespoolte Node-Listen werden eingerueckt darunter ausgegeben; deferred
//! Regionen optional mit allen Eintraegen.

use std::io::Write;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::decoder::{DeferredContent, KeyPayload};
use crate::error::Error;
use crate::node::{Node, NodeList, Value};
use crate::Result;

/// Serialisiert eine Node-Liste als String.
pub fn nodes_to_text(nodes: &NodeList) -> Result<String> {
    let mut buf = Vec::new();
    nodes_to_text_writer(nodes, &mut buf)?;
    String::from_utf8(buf).map_err(|_| Error::IoError("text output is not valid UTF-8".into()))
}

/// Serialisiert Nodes direkt in einen Writer.
pub fn nodes_to_text_writer<'a>(nodes: impl IntoIterator<Item = &'a Node>, writer: impl Write) -> Result<()> {
    let mut ser = TextSerializer::new(writer);
    for node in nodes {
        ser.process(node)?;
    }
    ser.finish()
}

/// Wie `nodes_to_text_writer`, aber fuer fallible Iteratoren (Decode-Fehler via `?`).
pub fn nodes_to_text_iter_fallible(
    nodes: impl Iterator<Item = Result<Node>>,
    writer: impl Write,
) -> Result<()> {
    let mut ser = TextSerializer::new(writer);
    for node in nodes {
        ser.process(&node?)?;
    }
    ser.finish()
}

/// Streaming-Serializer mit fester Einrueckung von zwei Spaces.
pub struct TextSerializer<W: Write> {
    writer: W,
    depth: usize,
    expand_deferred: bool,
}

impl<W: Write> TextSerializer<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, depth: 0, expand_deferred: false }
    }

    /// Deferred regions are followed by every decoded entry.
    pub fn expand_deferred(mut self, expand: bool) -> Self {
        self.expand_deferred = expand;
        self
    }

    pub fn process(&mut self, node: &Node) -> Result<()> {
        match node {
            Node::StartObject(ty) => {
                self.line(&format!("SO {ty}"))?;
                self.depth += 1;
            }
            Node::GetObject => {
                self.line("GO")?;
                self.depth += 1;
            }
            Node::StartMember(member) => {
                self.line(&format!("SM {member}"))?;
                self.depth += 1;
            }
            Node::EndObject => {
                self.depth = self.depth.saturating_sub(1);
                self.line("EO")?;
            }
            Node::EndMember => {
                self.depth = self.depth.saturating_sub(1);
                self.line("EM")?;
            }
            Node::Namespace(ns) => {
                let prefix = if ns.prefix.is_empty() { "(default)" } else { ns.prefix.as_str() };
                self.line(&format!("NS {prefix} = {}", ns.namespace))?;
            }
            Node::Value(value) => self.value(value)?,
        }
        Ok(())
    }

    fn value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Text(text) => self.line(&format!("V {}", quote(text))),
            Value::Converted { text, converter } => {
                self.line(&format!("V {} via {converter}", quote(text)))
            }
            Value::Binary { converter_id, bytes } => {
                self.line(&format!("V binary[{converter_id}] {}", BASE64.encode(bytes)))
            }
            Value::Type(ty) => self.line(&format!("V type {ty}")),
            Value::Nodes(nodes) => {
                self.line(&format!("V nodes ({})", nodes.len()))?;
                self.nested(nodes)
            }
            Value::Deferred(content) => {
                self.line(&format!("V deferred ({} entries)", content.len()))?;
                if self.expand_deferred {
                    self.deferred_entries(content)?;
                }
                Ok(())
            }
        }
    }

    fn deferred_entries(&mut self, content: &DeferredContent) -> Result<()> {
        self.depth += 1;
        for index in 0..content.len() {
            let label = match content.key(index).map(|k| k.payload()) {
                Some(KeyPayload::String(s)) => quote(s),
                Some(KeyPayload::Type(t)) => format!("type {t}"),
                Some(KeyPayload::Nodes(n)) => format!("nodes ({})", n.len()),
                None => String::new(),
            };
            self.line(&format!("entry {index} key {label}"))?;
            match content.read_entry(index)? {
                Some(nodes) => self.nested(&nodes)?,
                None => {
                    self.depth += 1;
                    self.line("(empty)")?;
                    self.depth -= 1;
                }
            }
        }
        self.depth -= 1;
        Ok(())
    }

    fn nested(&mut self, nodes: &NodeList) -> Result<()> {
        let base = self.depth;
        self.depth += 1;
        for node in nodes {
            self.process(node)?;
        }
        self.depth = base;
        Ok(())
    }

    fn line(&mut self, text: &str) -> Result<()> {
        writeln!(self.writer, "{:indent$}{text}", "", indent = self.depth * 2)?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("{text:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use crate::node::{NamespaceDecl, NodeWriter};
    use crate::schema::{MemberInfo, MemberKind, TypeInfo};

    #[test]
    fn indents_nested_scopes() {
        let button = TypeInfo::builder("Button", "urn:ui").build();
        let mut nodes = NodeList::new();
        nodes.namespace(NamespaceDecl { prefix: String::new(), namespace: "urn:ui".into() });
        nodes.start_object(Rc::clone(&button));
        nodes.start_member(MemberInfo::property(button, "Content", MemberKind::Regular));
        nodes.value(Value::Text("a \"b\"".into()));
        nodes.end_member();
        nodes.end_object();

        let text = nodes_to_text(&nodes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "NS (default) = urn:ui");
        assert_eq!(lines[1], "SO {urn:ui}Button");
        assert!(lines[2].starts_with("  SM "));
        assert_eq!(lines[3], r#"    V "a \"b\"""#);
        assert_eq!(lines[4], "  EM");
        assert_eq!(lines[5], "EO");
    }

    #[test]
    fn binary_values_are_base64() {
        let mut nodes = NodeList::new();
        nodes.start_member(MemberInfo::directive("Initialization"));
        nodes.value(Value::Binary { converter_id: 3, bytes: vec![0, 1, 2] });
        nodes.end_member();
        let text = nodes_to_text(&nodes).unwrap();
        assert!(text.contains("V binary[3] AAEC"), "{text}");
    }

    #[test]
    fn spooled_nodes_are_nested() {
        let mut inner = NodeList::new();
        inner.start_object(TypeInfo::builder("Grid", "urn:ui").build());
        inner.end_object();
        let mut nodes = NodeList::new();
        nodes.start_member(MemberInfo::directive("Template"));
        nodes.value(Value::Nodes(Rc::new(inner)));
        nodes.end_member();
        let text = nodes_to_text(&nodes).unwrap();
        assert!(text.contains("\n    SO {urn:ui}Grid\n    EO\n"), "{text}");
    }
}
