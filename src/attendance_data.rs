// src/attendance_data.rs

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

// --- Wire Types ---

/// Direction of a single punch. On the wire this is the CRM backend's
/// boolean `status` flag (`true` = check-in, `false` = check-out); internally
/// we keep it as an enum so pairing logic stays exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Punch {
    In,
    Out,
}

impl Serialize for Punch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bool(matches!(self, Punch::In))
    }
}

impl<'de> Deserialize<'de> for Punch {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(if bool::deserialize(deserializer)? {
            Punch::In
        } else {
            Punch::Out
        })
    }
}

/// One raw punch record as served by the attendance endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEvent {
    /// Moment of the punch, epoch milliseconds.
    pub time_stamp: i64,
    pub status: Punch,
}

/// Parsed attendance data: employee display name -> calendar day -> punches.
/// BTreeMap on both levels so aggregation output is deterministic.
pub type AttendanceMap = BTreeMap<String, BTreeMap<NaiveDate, Vec<AttendanceEvent>>>;

/// Raw response shape of the attendance endpoint. Events are kept as loose
/// JSON values so that one malformed record cannot fail the whole decode.
pub type RawAttendanceMap = HashMap<String, HashMap<String, Vec<Value>>>;

// --- Parsing ---

/// Truncates a possibly datetime-stamped day key (`2025-11-15T00:00:00`) to a
/// bare calendar-date key. Idempotent: already-bare keys pass through.
pub fn normalize_day_key(raw: &str) -> &str {
    match raw.find('T') {
        Some(idx) => &raw[..idx],
        None => raw,
    }
}

/// Converts the raw endpoint payload into a typed `AttendanceMap`.
///
/// The backend sometimes stamps day keys with a `T00:00:00` suffix, so keys
/// are normalized before parsing; raw keys that collapse onto the same day
/// are merged. Malformed entries (unparsable day key, non-integer timestamp,
/// non-boolean status) are skipped with a warning rather than failing the
/// employee or the whole response.
pub fn parse_employee_map(raw: RawAttendanceMap) -> AttendanceMap {
    let mut map = AttendanceMap::new();

    for (employee, days) in raw {
        let parsed_days = map.entry(employee.clone()).or_default();

        for (day_key, values) in days {
            let bare = normalize_day_key(&day_key);
            let date = match NaiveDate::parse_from_str(bare, "%Y-%m-%d") {
                Ok(d) => d,
                Err(e) => {
                    warn!(
                        "Skipping unparsable day key '{}' for employee '{}': {}",
                        day_key, employee, e
                    );
                    continue;
                }
            };

            let events = parsed_days.entry(date).or_default();
            for value in values {
                match serde_json::from_value::<AttendanceEvent>(value.clone()) {
                    Ok(event) => events.push(event),
                    Err(e) => {
                        warn!(
                            "Skipping malformed punch for employee '{}' on {}: {} ({})",
                            employee, date, e, value
                        );
                    }
                }
            }
        }
    }

    map
}
