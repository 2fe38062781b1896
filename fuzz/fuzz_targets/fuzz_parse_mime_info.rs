#![no_main]

use libfuzzer_sys::fuzz_target;
use tokio_mimedb::MimeDatabase;

fuzz_target!(|data: &[u8]| {
    // Whatever was ingested before an error must still be queryable
    let db = MimeDatabase::new();
    let _ = db.add_types_from_stream(data, "<fuzz>");
    for record in db.all_types() {
        let _ = db.all_parent_types(record.name());
    }
    let _ = db.mime_type_for_data(data);
});
