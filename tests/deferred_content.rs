//! Deferred regions: key tables, random entry access, handle lifetime.

use std::rc::Rc;

use cmrx::record::KeyPosition;
use cmrx::{
    DeferredContent, DeferredEntry, Decoder, Error, ErrorKind, Header, KeyPayload, Node, NodeList,
    Record, RecordWriter, SharedSource, StaticRegistry, Value, decode,
};

include!("common/fixtures.rs");

fn key_at(position: u32) -> KeyPosition {
    KeyPosition { value_position: position, ..KeyPosition::default() }
}

fn resources_document() -> Vec<u8> {
    let entries = [
        DeferredEntry {
            key: vec![Record::DefAttributeKeyString { value_id: 0, key: key_at(0) }],
            value: vec![element(BRUSH), Record::Text { value: "Red".into() }, Record::ElementEnd],
        },
        DeferredEntry {
            key: vec![Record::DefAttributeKeyType { type_id: BUTTON, flags: 0, key: key_at(0) }],
            value: vec![
                element(BUTTON),
                Record::Property { attribute_id: BUTTON_WIDTH, value: "5".into() },
                Record::ElementEnd,
            ],
        },
    ];
    let mut w = RecordWriter::with_header(&Header::default());
    w.records([
        Record::StringInfo { string_id: 0, value: "brush".into() },
        element(WINDOW),
        Record::PropertyComplexStart { attribute_id: WINDOW_RESOURCES },
        element(RESOURCE_DICTIONARY),
    ]);
    w.deferred_region(&entries);
    w.records([
        Record::ElementEnd,
        Record::PropertyComplexEnd,
        Record::Property { attribute_id: WINDOW_TITLE, value: "after".into() },
        Record::ElementEnd,
        Record::DocumentEnd,
    ]);
    w.into_bytes()
}

fn handle(nodes: &NodeList) -> Rc<DeferredContent> {
    nodes
        .iter()
        .find_map(|n| match n {
            Node::Value(Value::Deferred(d)) => Some(Rc::clone(d)),
            _ => None,
        })
        .expect("deferred content node")
}

#[test]
fn main_stream_skips_the_region() {
    let nodes = decode(&resources_document(), catalog()).unwrap();
    assert_eq!(
        sig(&nodes),
        [
            "SO Window",
            "SM Resources", "SO ResourceDictionary", "SM DeferredContent", "V deferred 2", "EM", "EO", "EM",
            "SM Title", "V after", "EM",
            "EO",
        ]
    );
    let content = handle(&nodes);
    assert!(matches!(content.key(0).unwrap().payload(), KeyPayload::String(s) if s == "brush"));
    assert!(matches!(content.key(1).unwrap().payload(), KeyPayload::Type(t) if t.name() == "Button"));
    assert_eq!(content.key(1).unwrap().position() + content.key(1).unwrap().size(), content.region_end());
}

#[test]
fn handle_outlives_the_decoder() {
    let content = {
        let nodes = decode(&resources_document(), catalog()).unwrap();
        handle(&nodes)
    };
    let button = content.read_entry(1).unwrap().unwrap();
    assert_eq!(sig(&button)[0], "SO Button");
    assert_eq!(sig(&button)[1], "SM Key");
    assert!(sig(&button).contains(&"V 5".to_owned()));

    let brush = content.read_entry(0).unwrap().unwrap();
    assert_eq!(
        sig(&brush),
        ["SO SolidColorBrush", "SM Key", "V brush", "EM", "SM Initialization", "V Red", "EM", "EO"]
    );
}

#[test]
fn pull_decoder_keeps_the_source_shared() {
    let source = SharedSource::from_bytes(resources_document());
    let observer = source.share().unwrap();
    let mut d = Decoder::new(source, catalog());
    let mut content = None;
    while let Some(node) = d.advance().unwrap() {
        if let Node::Value(Value::Deferred(c)) = node {
            content = Some(c);
        }
    }
    let content = content.expect("deferred content");
    d.release();
    assert!(!observer.is_closed());
    assert!(content.read_entry(0).unwrap().is_some());

    content.release();
    assert_eq!(content.read_entry(0).unwrap_err(), Error::Disposed);
    assert_eq!(content.read_entry(0).unwrap_err().kind(), ErrorKind::Disposed);
}

#[test]
fn out_of_range_entry() {
    let nodes = decode(&resources_document(), catalog()).unwrap();
    let err = handle(&nodes).read_entry(7).unwrap_err();
    assert_eq!(err, Error::EntryIndexOutOfRange { index: 7, len: 2 });
    assert_eq!(err.kind(), ErrorKind::UnresolvedDescriptor);
}
