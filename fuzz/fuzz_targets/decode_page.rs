#![no_main]

use libfuzzer_sys::fuzz_target;
use serde_json::Value;
use tasksync_core::wire;

fuzz_target!(|data: &[u8]| {
    let Ok(body) = serde_json::from_slice::<Value>(data) else {
        return;
    };
    if let Ok(page) = wire::decode_page(&body) {
        for task in &page.tasks {
            let _ = task.column();
        }
    }
    let _ = wire::decode_task(&body);
});
