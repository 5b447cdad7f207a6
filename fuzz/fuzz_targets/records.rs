#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut cursor = cmrx::source::ByteCursor::new(cmrx::SharedSource::from_bytes(data));
    while let Ok(Some(_)) = cmrx::record::read_record(&mut cursor, 1 << 16) {}
});
