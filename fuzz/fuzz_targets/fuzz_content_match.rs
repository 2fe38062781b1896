#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use tokio_mimedb::{MimeDatabase, MAX_PRIORITY};

fuzz_target!(|data: &[u8]| {
    let db = MimeDatabase::global();
    let (_, priority) = db.match_by_content(data);
    assert!(priority <= MAX_PRIORITY);

    let owned = Bytes::copy_from_slice(data);
    let _ = db.match_by_file_and_content("fuzz.bin", true, move || Some(owned));
});
