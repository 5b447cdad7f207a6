#![no_main]
use std::rc::Rc;

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let registry = Rc::new(cmrx::EmptyRegistry);
    let Ok(mut decoder) = cmrx::decode_iter(
        cmrx::SharedSource::from_bytes(data),
        registry,
        cmrx::DecoderOptions::default().with_max_record_size(1 << 16),
    ) else {
        return;
    };
    while let Ok(Some(node)) = decoder.advance() {
        if let cmrx::Node::Value(cmrx::Value::Deferred(content)) = node {
            for index in 0..content.len() {
                let _ = content.read_entry(index);
            }
        }
    }
});
