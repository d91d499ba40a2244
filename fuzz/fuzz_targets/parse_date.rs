#![no_main]

use chrono::Datelike;
use libfuzzer_sys::fuzz_target;
use tasksync_core::wire;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };
    if let Some(date) = wire::parse_date(raw)
        && (1000..=9999).contains(&date.year())
    {
        assert_eq!(wire::parse_date(&wire::format_wire_date(date)), Some(date));
        assert_eq!(wire::parse_date(&wire::format_iso_date(date)), Some(date));
    }
    let _ = wire::parse_timestamp(raw);
});
