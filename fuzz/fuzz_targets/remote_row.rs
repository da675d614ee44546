#![no_main]

use libfuzzer_sys::fuzz_target;
use waypoint_core::mapper::{from_remote, to_remote};
use waypoint_core::remote::row::RemoteRow;

fuzz_target!(|data: &[u8]| {
    let Ok(row) = serde_json::from_slice::<RemoteRow>(data) else {
        return;
    };
    let stamp = row.updated_at.unwrap_or_default();
    let local = from_remote(row);
    let back = from_remote(to_remote(&local, stamp));
    assert_eq!(back, local);
});
