//! End-to-end decoding against a JSON type catalog.

use std::io::Cursor;

use cmrx::{
    Decoder, DecoderOptions, Error, ErrorKind, Header, Node, NodeList, Record, RecordWriter,
    SharedSource, StaticRegistry, Value, decode, decode_iter, nodes_to_text,
};

include!("common/fixtures.rs");

fn window_document() -> Vec<u8> {
    stream([
        Record::XmlnsProperty { prefix: String::new(), uri: "urn:ui".into(), assembly_ids: vec![] },
        element(WINDOW),
        Record::Property { attribute_id: WINDOW_TITLE, value: "Main".into() },
        Record::DefAttribute { value: "root".into(), name_id: STR_NAME },
        element(STACK_PANEL),
        element(BUTTON),
        Record::Property { attribute_id: BUTTON_WIDTH, value: "10".into() },
        Record::Text { value: "OK".into() },
        Record::ElementEnd,
        element(BUTTON),
        Record::PropertyWithConverter { attribute_id: BUTTON_BACKGROUND, value: "Red".into(), converter_id: -1 },
        Record::ElementEnd,
        Record::ElementEnd,
        Record::ElementEnd,
    ])
}

#[test]
fn window_with_panel_and_buttons() {
    let nodes = decode(&window_document(), catalog()).unwrap();
    assert_eq!(
        sig(&nodes),
        [
            "NS =urn:ui",
            "SO Window",
            "SM Title", "V Main", "EM",
            "SM Name", "V root", "EM",
            "SM Content",
            "SO StackPanel",
            "SM Children", "GO", "SM Items",
            "SO Button", "SM Width", "V 10", "EM", "SM Content", "V OK", "EM", "EO",
            "SO Button", "SM Background", "V Red (BrushConverter)", "EM", "EO",
            "EM", "EO", "EM",
            "EO",
            "EM",
            "EO",
        ]
    );
    nodes.check_well_formed().unwrap();
}

#[test]
fn pull_decoder_matches_batch_decode() {
    let batch = decode(&window_document(), catalog()).unwrap();

    let decoder = decode_iter(
        SharedSource::from_bytes(window_document()),
        catalog(),
        DecoderOptions::default(),
    )
    .unwrap();
    let pulled: NodeList = decoder.collect::<cmrx::Result<NodeList>>().unwrap();
    assert_eq!(pulled, batch);

    let mut d = Decoder::from_reader(Cursor::new(window_document()), catalog(), DecoderOptions::default())
        .unwrap();
    let mut count = 0;
    while d.advance().unwrap().is_some() {
        count += 1;
    }
    assert_eq!(count, batch.len());
    assert!(d.is_finished());
    assert_eq!(d.header(), Some(&Header::default()));
}

#[test]
fn text_rendering_of_a_document() {
    let nodes = decode(&window_document(), catalog()).unwrap();
    let text = nodes_to_text(&nodes).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "NS (default) = urn:ui");
    assert_eq!(lines[1], "SO {urn:ui}Window");
    assert_eq!(lines[2], "  SM Title");
    assert_eq!(lines[3], r#"    V "Main""#);
    assert_eq!(lines[5], "  SM x:Name");
    assert!(text.contains("\n        GO\n          SM x:Items\n"), "{text}");
    assert_eq!(lines.last(), Some(&"EO"));
}

#[test]
fn template_member_is_spooled() {
    let nodes = decode(
        &stream([
            element(WINDOW),
            Record::PropertyComplexStart { attribute_id: WINDOW_TEMPLATE },
            element(BUTTON),
            Record::ElementEnd,
            Record::PropertyComplexEnd,
            Record::ElementEnd,
        ]),
        catalog(),
    )
    .unwrap();
    assert_eq!(sig(&nodes), ["SO Window", "SM Template", "V nodes 2", "EM", "EO"]);
}

#[test]
fn resource_key_extension() {
    let nodes = decode(
        &stream([
            element(BUTTON),
            Record::PropertyWithExtension { attribute_id: BUTTON_BACKGROUND, extension: 10, value_id: STR_ACCENT },
            Record::ElementEnd,
        ]),
        catalog(),
    )
    .unwrap();
    assert_eq!(
        sig(&nodes),
        [
            "SO Button", "SM Background", "SO StaticResource", "SM PositionalParameters", "V AccentBrush",
            "EM", "EO", "EM", "EO",
        ]
    );
}

#[test]
fn truncated_stream_fails_once() {
    let mut bytes = window_document();
    bytes.truncate(bytes.len() - 3);
    let mut d = Decoder::new(SharedSource::from_bytes(bytes), catalog());
    let err = loop {
        match d.advance() {
            Ok(Some(_)) => continue,
            Ok(None) => panic!("truncated stream decoded"),
            Err(e) => break e,
        }
    };
    assert_eq!(err, Error::PrematureEndOfStream);
    assert_eq!(err.kind(), ErrorKind::MalformedRecord);
    assert!(d.advance().unwrap().is_none());
}

#[test]
fn unknown_type_without_catalog_entry() {
    let err = decode(&stream([element(-99), Record::ElementEnd]), catalog()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnresolvedDescriptor);
}

#[test]
fn invalid_catalogs_are_rejected() {
    assert!(matches!(StaticRegistry::from_json("[]"), Err(Error::InvalidCatalog(_))));
    assert!(matches!(
        StaticRegistry::from_json(r#"{ "types": [{ "id": 3, "name": "Positive" }] }"#),
        Err(Error::InvalidCatalog(_))
    ));
    let registry = StaticRegistry::from_json(CATALOG).unwrap();
    assert_eq!(registry.type_count(), 8);
}

#[test]
fn released_decoder_is_disposed() {
    let mut d = Decoder::new(SharedSource::from_bytes(window_document()), catalog());
    assert!(d.advance().unwrap().is_some());
    d.release();
    assert_eq!(d.advance().unwrap_err(), Error::Disposed);
}
