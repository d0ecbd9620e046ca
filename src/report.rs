// src/report.rs

use crate::timesheet::{format_duration, SessionPair, ViewKind, ViewModel};
use chrono::DateTime;
use std::fmt::Write as _;
use std::io;

/// Renders an epoch-millisecond timestamp as a wall-clock label (UTC).
/// Unrepresentable timestamps render as "??:??" rather than failing a report
/// over one bad value.
fn clock_label(ms: i64) -> String {
    match DateTime::from_timestamp_millis(ms) {
        Some(dt) => dt.format("%H:%M").to_string(),
        None => "??:??".to_string(),
    }
}

fn session_label(pair: &SessionPair) -> String {
    match pair.clock_out {
        Some(out) => format!(
            "{}-{}",
            clock_label(pair.clock_in.time_stamp),
            clock_label(out.time_stamp)
        ),
        // Open session: checked in, not yet out.
        None => format!("{}-...", clock_label(pair.clock_in.time_stamp)),
    }
}

/// Renders the view model as a plain-text report, one block per employee.
pub fn render_table(vm: &ViewModel) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Attendance {} to {}", vm.from, vm.to);

    if vm.employees.is_empty() {
        let _ = writeln!(out, "No attendance records for this period.");
        return out;
    }

    for employee in &vm.employees {
        let _ = writeln!(
            out,
            "\n{} (total {})",
            employee.name,
            format_duration(employee.total_ms)
        );

        for day in &employee.days {
            let sessions = if day.pairs.is_empty() {
                "-".to_string()
            } else {
                day.pairs
                    .iter()
                    .map(session_label)
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            let _ = writeln!(
                out,
                "  {} {}  {:>8}  {}",
                day.weekday,
                day.date,
                format_duration(day.total_ms),
                sessions
            );
        }

        if vm.view == ViewKind::Daily {
            let first = employee.first_in.map(clock_label);
            let last = employee.last_out.map(clock_label);
            let _ = writeln!(
                out,
                "  first in: {}  last out: {}",
                first.as_deref().unwrap_or("-"),
                last.as_deref().unwrap_or("-")
            );
        }
    }

    out
}

/// Writes the view model as CSV, one row per employee-day.
pub fn write_csv<W: io::Write>(writer: W, vm: &ViewModel) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record([
        "employee", "date", "weekday", "sessions", "total_ms", "total",
    ])?;

    for employee in &vm.employees {
        for day in &employee.days {
            wtr.write_record([
                employee.name.clone(),
                day.date.to_string(),
                day.weekday.clone(),
                day.pairs.len().to_string(),
                day.total_ms.to_string(),
                format_duration(day.total_ms),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance_data::{AttendanceEvent, AttendanceMap, Punch};
    use crate::timesheet::{build_view_model, period_range};
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn weekly_view_model() -> ViewModel {
        let monday = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        let t0 = 1_736_150_400_000; // 2025-01-06 08:00:00 UTC
        let mut by_day = BTreeMap::new();
        by_day.insert(
            monday,
            vec![
                AttendanceEvent {
                    time_stamp: t0,
                    status: Punch::In,
                },
                AttendanceEvent {
                    time_stamp: t0 + 2 * 3_600_000,
                    status: Punch::Out,
                },
            ],
        );
        let mut map = AttendanceMap::new();
        map.insert("Alice".to_string(), by_day);

        let range = period_range(ViewKind::Weekly, monday);
        build_view_model(&map, ViewKind::Weekly, &range)
    }

    #[test]
    fn table_lists_every_day_of_the_period() {
        let rendered = render_table(&weekly_view_model());
        assert!(rendered.contains("Alice (total 2h 0m)"));
        assert!(rendered.contains("Mon 2025-01-06"));
        assert!(rendered.contains("Sun 2025-01-12"));
        assert!(rendered.contains("08:00-10:00"));
    }

    #[test]
    fn table_reports_empty_period() {
        let range = period_range(ViewKind::Weekly, NaiveDate::from_ymd_opt(2025, 1, 6).unwrap());
        let vm = build_view_model(&AttendanceMap::new(), ViewKind::Weekly, &range);
        let rendered = render_table(&vm);
        assert!(rendered.contains("No attendance records"));
    }

    #[test]
    fn csv_has_header_and_one_row_per_employee_day() {
        let mut buf = Vec::new();
        write_csv(&mut buf, &weekly_view_model()).unwrap();
        let text = String::from_utf8(buf).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 8); // header + 7 days
        assert_eq!(lines[0], "employee,date,weekday,sessions,total_ms,total");
        assert_eq!(lines[1], "Alice,2025-01-06,Mon,1,7200000,2h 0m");
        assert_eq!(lines[2], "Alice,2025-01-07,Tue,0,0,0h 0m");
    }

    #[test]
    fn json_serializes_epoch_millis_and_durations() {
        let vm = weekly_view_model();
        let json: serde_json::Value = serde_json::from_str(
            &serde_json::to_string(&vm).unwrap(),
        )
        .unwrap();

        assert_eq!(json["view"], "weekly");
        assert_eq!(json["from"], "2025-01-06");
        let alice = &json["employees"][0];
        assert_eq!(alice["totalMs"], 7_200_000);
        let pair = &alice["days"][0]["pairs"][0];
        assert_eq!(pair["clockIn"]["timeStamp"], 1_736_150_400_000i64);
        assert_eq!(pair["clockIn"]["status"], true);
    }
}
