#![no_main]

use libfuzzer_sys::fuzz_target;
use tokio_mimedb::MimeDatabase;

fuzz_target!(|data: &[u8]| {
    let db = MimeDatabase::new();
    if db.add_globs2(data).is_ok() {
        let _ = db.candidates_by_filename("fuzz.tar.gz");
    }
});
