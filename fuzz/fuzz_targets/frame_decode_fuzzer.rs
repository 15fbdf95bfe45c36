#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Cursor;
use wavecore::frame::decode_from;

/// Feeds arbitrary bytes straight into the frame decoder. `decode_from` must never
/// panic, loop forever, or read past what the cursor holds — only ever return `Ok`
/// or a mapped `Error`.
fuzz_target!(|data: &[u8]| {
    let mut cursor = Cursor::new(data);
    let _ = decode_from(&mut cursor, 1024 * 1024);
});
