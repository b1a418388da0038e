#![no_main]

use libfuzzer_sys::fuzz_target;
use netsentry::schema::normalize;
use netsentry::table::RawTable;
use netsentry::warnings::Warnings;

fuzz_target!(|data: &[u8]| {
    // Parsing and normalizing arbitrary input must return errors, never panic
    if let Ok(table) = RawTable::from_csv_reader(data) {
        let _ = normalize(&table, &mut Warnings::new());
    }

    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(table) = RawTable::from_json_str(text) {
            let _ = normalize(&table, &mut Warnings::new());
        }
    }
});
