// Gemeinsamer Typkatalog und Stream-Helfer fuer die Integrationstests.
//
// Wird per `include!` eingebunden. Benötigte Imports:
//   use cmrx::{Header, Node, NodeList, Record, RecordWriter, StaticRegistry, Value};

/// Kleiner UI-Katalog; Ids wie im Stream (negativ).
const CATALOG: &str = r#"{
  "assemblies": [{ "id": -1, "name": "Ui.Core" }],
  "types": [
    { "id": -1, "name": "Window", "namespace": "urn:ui", "content_property": "Content",
      "properties": [
        { "name": "Title" },
        { "name": "Content" },
        { "name": "Resources", "type": "ResourceDictionary" },
        { "name": "Template", "defers_content": true }
      ] },
    { "id": -2, "name": "Button", "namespace": "urn:ui", "content_property": "Content",
      "properties": [{ "name": "Width" }, { "name": "Content" }, { "name": "Background" }] },
    { "id": -3, "name": "StackPanel", "namespace": "urn:ui", "content_property": "Children",
      "properties": [{ "name": "Children", "type": "UIElementCollection", "read_only": true }] },
    { "id": -4, "name": "UIElementCollection", "namespace": "urn:ui", "flags": ["collection"] },
    { "id": -5, "name": "ResourceDictionary", "namespace": "urn:ui", "flags": ["dictionary"] },
    { "id": -6, "name": "SolidColorBrush", "namespace": "urn:ui", "flags": ["literal_conversion"] },
    { "id": -7, "name": "Binding", "namespace": "urn:ui", "flags": ["markup_extension"] },
    { "id": -10, "name": "StaticResource", "namespace": "http://schemas.microsoft.com/winfx/2006/xaml",
      "flags": ["markup_extension"] }
  ],
  "properties": [
    { "id": -1, "owner": "Window", "name": "Title" },
    { "id": -2, "owner": "Window", "name": "Content" },
    { "id": -3, "owner": "Window", "name": "Resources" },
    { "id": -4, "owner": "Button", "name": "Width" },
    { "id": -5, "owner": "Button", "name": "Content" },
    { "id": -6, "owner": "StackPanel", "name": "Children" },
    { "id": -7, "owner": "Window", "name": "Template" },
    { "id": -8, "owner": "Button", "name": "Background" }
  ],
  "strings": [{ "id": -1, "value": "Name" }, { "id": -2, "value": "Key" }, { "id": -3, "value": "AccentBrush" }],
  "converters": [{ "id": -1, "type": "BrushConverter" }]
}"#;

const WINDOW: i16 = -1;
const BUTTON: i16 = -2;
const STACK_PANEL: i16 = -3;
const RESOURCE_DICTIONARY: i16 = -5;
const BRUSH: i16 = -6;

const WINDOW_TITLE: i16 = -1;
const WINDOW_RESOURCES: i16 = -3;
const BUTTON_WIDTH: i16 = -4;
const BUTTON_BACKGROUND: i16 = -8;
const WINDOW_TEMPLATE: i16 = -7;

const STR_NAME: i16 = -1;
const STR_ACCENT: i16 = -3;

fn catalog() -> std::rc::Rc<StaticRegistry> {
    std::rc::Rc::new(StaticRegistry::from_json(CATALOG).expect("catalog"))
}

fn element(type_id: i16) -> Record {
    Record::ElementStart { type_id, flags: 0 }
}

/// Header + Records + DocumentEnd.
fn stream(records: impl IntoIterator<Item = Record>) -> Vec<u8> {
    let mut w = RecordWriter::with_header(&Header::default());
    w.records(records).record(Record::DocumentEnd);
    w.into_bytes()
}

/// Kompakte Darstellung fuer Vergleiche.
fn sig(nodes: &NodeList) -> Vec<String> {
    nodes
        .iter()
        .map(|n| match n {
            Node::StartObject(t) => format!("SO {}", t.name()),
            Node::GetObject => "GO".to_owned(),
            Node::EndObject => "EO".to_owned(),
            Node::StartMember(m) => format!("SM {}", m.name()),
            Node::EndMember => "EM".to_owned(),
            Node::Value(Value::Text(t)) => format!("V {t}"),
            Node::Value(Value::Converted { text, converter }) => format!("V {text} ({})", converter.name()),
            Node::Value(Value::Type(t)) => format!("V type {}", t.name()),
            Node::Value(Value::Binary { bytes, .. }) => format!("V bin {}", bytes.len()),
            Node::Value(Value::Nodes(n)) => format!("V nodes {}", n.len()),
            Node::Value(Value::Deferred(d)) => format!("V deferred {}", d.len()),
            Node::Namespace(ns) => format!("NS {}={}", ns.prefix, ns.namespace),
        })
        .collect()
}
