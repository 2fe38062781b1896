#![no_main]

use libfuzzer_sys::fuzz_target;
use tokio_mimedb::MimeDatabase;

fuzz_target!(|data: &[u8]| {
    // Convert bytes to a filename
    if let Ok(name) = std::str::from_utf8(data) {
        let db = MimeDatabase::global();
        let candidates = db.candidates_by_filename(name);
        let chosen = db.mime_type_for_file_name(name);
        assert!(candidates.is_empty() || candidates.iter().any(|c| c == chosen.name()));
    }
});
