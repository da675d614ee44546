#![no_main]

use libfuzzer_sys::fuzz_target;
use waypoint_core::remote::realtime::{Frame, decode_frame};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(Frame::Change(event)) = decode_frame(text) {
        // Every decoded change names the row it touches.
        let _ = event.id().as_str().len();
        let _ = event.kind();
    }
});
