#![no_main]

use libfuzzer_sys::fuzz_target;
use serde_json::Value;
use tasksync_core::ApiError;

fuzz_target!(|data: &[u8]| {
    let Some((&first, rest)) = data.split_first() else {
        return;
    };
    let status = 400 + u16::from(first % 200);
    let body = serde_json::from_slice::<Value>(rest).ok();
    let error = ApiError::from_status(status, body.as_ref());
    let _ = error.code();
    let _ = error.to_string();
});
