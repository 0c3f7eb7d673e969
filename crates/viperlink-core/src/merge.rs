// ── Status merge ──
//
// Combines the two independent status reads for one vehicle into a
// consolidated `VehicleStatus`. Each read is processed on its own: a
// failed or empty read leaves only that read's fields unknown. Field
// extraction is lenient by key -- the backend mixes strings and numbers
// freely, and a value that cannot be coerced is left absent rather than
// failing the merge.

use serde_json::Value;
use tracing::warn;

use viperlink_api::StatusReads;

use crate::model::VehicleStatus;

/// Merge both status reads into one `VehicleStatus`.
///
/// Two failed reads yield the fully-unknown status; that is a valid
/// result, not an error.
pub fn merge_status_reads(device_id: &str, reads: &StatusReads) -> VehicleStatus {
    let mut status = VehicleStatus::default();

    match &reads.active {
        Ok(payload) => apply_active(&mut status, payload),
        Err(err) => warn!(device = device_id, error = %err, "failed to get active status"),
    }

    match &reads.current {
        Ok(payload) => apply_current(&mut status, payload),
        Err(err) => warn!(device = device_id, error = %err, "failed to get current status"),
    }

    status
}

/// Active read: GPS position, motion, battery, door/ignition state.
fn apply_active(status: &mut VehicleStatus, payload: &Value) {
    let device = payload.pointer("/results/device").unwrap_or(&Value::Null);
    let device_status = device.get("deviceStatus").unwrap_or(&Value::Null);

    status.latitude = device.get("latitude").and_then(lenient_f64);
    status.longitude = device.get("longitude").and_then(lenient_f64);
    status.speed = device.get("speed").and_then(lenient_string);
    status.heading = device.get("heading").and_then(lenient_i64);
    status.battery_voltage = device.get("batteryVoltage").and_then(lenient_f64);

    status.doors_open = flag(device_status, "doorsOpen");
    status.ignition_on = flag(device_status, "ignitionOn");
    status.trunk_open = flag(device_status, "trunkOpen");
    status.hood_open = flag(device_status, "hoodOpen");
}

/// Current read: locks, security system, remote-start state.
fn apply_current(status: &mut VehicleStatus, payload: &Value) {
    let device_status = payload
        .pointer("/results/device/deviceStatus")
        .unwrap_or(&Value::Null);

    status.doors_locked = flag(device_status, "doorsLocked");
    status.remote_starter_active = flag(device_status, "remoteStarterActive");
    status.security_system_armed = flag(device_status, "securitySystemArmed");
    status.panic_on = flag(device_status, "panicOn");
    status.valet_on = flag(device_status, "valetOn");
}

/// Boolean flag: populated only when the key is present and non-null.
/// Present values coerce by truthiness (`0`, `""`, `[]`, `{}` are
/// false) so an explicit `false` stays distinct from an absent field.
fn flag(section: &Value, key: &str) -> Option<bool> {
    match section.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::Bool(b)) => Some(*b),
        Some(Value::Number(n)) => Some(n.as_f64().is_some_and(|f| f != 0.0)),
        Some(Value::String(s)) => Some(!s.is_empty()),
        Some(Value::Array(a)) => Some(!a.is_empty()),
        Some(Value::Object(o)) => Some(!o.is_empty()),
    }
}

fn lenient_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
