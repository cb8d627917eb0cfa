mod common;

use common::Device;
use hide_daemon_protocol::{HideStatus, Method};
use serde_json::json;

fn enabled(device: &Device) -> bool {
    let response = device.call(Method::Status, None);
    assert!(response.ok, "status response was not ok");
    response
        .data
        .as_ref()
        .and_then(|data| data.get("enabled"))
        .and_then(|value| value.as_bool())
        .expect("enabled flag")
}

fn hidden(device: &Device, uid: u32, process: &str) -> bool {
    let response = device.call(
        Method::Query,
        Some(json!({ "uid": uid, "process": process })),
    );
    assert!(response.ok, "query response was not ok");
    response
        .data
        .as_ref()
        .and_then(|data| data.get("hidden"))
        .and_then(|value| value.as_bool())
        .expect("hidden flag")
}

#[test]
fn daemon_ipc_hide_list_round_trip_smoke() {
    let device = Device::new();
    let uid = device.install("com.example.app");
    let _guard = device.spawn();

    let health = device.call(Method::GetHealth, None);
    assert!(health.ok, "health response was not ok");
    let status = health
        .data
        .as_ref()
        .and_then(|data| data.get("status"))
        .and_then(|value| value.as_str())
        .unwrap_or("missing");
    assert_eq!(status, "ok");

    assert!(!enabled(&device));

    let enable = device.call(Method::Enable, None);
    assert_eq!(enable.status, HideStatus::Success);
    assert!(enabled(&device));

    let add = device.call(Method::Add, Some(json!({ "package": "com.example.app" })));
    assert_eq!(add.status, HideStatus::Success);

    let duplicate = device.call(
        Method::Add,
        Some(json!({ "package": "com.example.app", "process": "com.example.app" })),
    );
    assert_eq!(duplicate.status, HideStatus::ItemExists);

    let invalid = device.call(Method::Add, Some(json!({ "package": "com.foo$" })));
    assert_eq!(invalid.status, HideStatus::InvalidName);
    assert!(!invalid.ok);

    let isolated = device.call(
        Method::Add,
        Some(json!({ "package": "isolated", "process": "com.example.app:svc" })),
    );
    assert_eq!(isolated.status, HideStatus::Success);

    let list = device.call(Method::List, None);
    assert!(list.ok, "list response was not ok");
    assert_eq!(
        list.data,
        Some(json!([
            "com.example.app|com.example.app",
            "isolated|com.example.app:svc"
        ]))
    );

    // The isolated range has its own matching rules.
    if uid % 100_000 < 90_000 {
        assert!(hidden(&device, uid, "com.example.app"));
        assert!(!hidden(&device, uid, "com.example.other"));
    }
    assert!(hidden(&device, 99_000, "com.example.app:svc1"));
    assert!(!hidden(&device, 99_000, "webview_zygote"));

    let remove = device.call(Method::Remove, Some(json!({ "package": "com.example.app" })));
    assert_eq!(remove.status, HideStatus::Success);
    let missing = device.call(Method::Remove, Some(json!({ "package": "com.example.app" })));
    assert_eq!(missing.status, HideStatus::ItemNotFound);
    assert!(!hidden(&device, uid, "com.example.app"));

    let disable = device.call(Method::Disable, None);
    assert_eq!(disable.status, HideStatus::Success);
    let disable_again = device.call(Method::Disable, None);
    assert_eq!(disable_again.status, HideStatus::Success);
    assert!(!enabled(&device));
    assert!(!hidden(&device, 99_000, "com.example.app:svc1"));
}
