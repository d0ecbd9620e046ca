// src/timesheet.rs
//
// Pure timesheet aggregation: turns raw punch events into render-ready
// daily/weekly/monthly summaries. No I/O, no clocks, no mutation of input;
// safe to call from anywhere, repeatedly.

use crate::attendance_data::{AttendanceEvent, AttendanceMap, Punch};
use chrono::{Datelike, Duration, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

// --- Calendar Ranges ---

/// Calendar granularity of a timesheet view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    Daily,
    Weekly,
    Monthly,
}

/// Inclusive day range of one rendered period, with every day listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub days: Vec<NaiveDate>,
}

/// Computes the inclusive period covering `anchor` for the given view.
///
/// Monthly: first to last day of the anchor's month (the last day is derived
/// from the first day of the following month, so leap Februaries work).
/// Weekly: Monday through Sunday of the anchor's week.
/// Daily: the anchor day alone.
pub fn period_range(kind: ViewKind, anchor: NaiveDate) -> PeriodRange {
    let (from, to) = match kind {
        ViewKind::Daily => (anchor, anchor),
        ViewKind::Weekly => {
            let monday = anchor - Duration::days(anchor.weekday().num_days_from_monday() as i64);
            (monday, monday + Duration::days(6))
        }
        ViewKind::Monthly => {
            let first = anchor.with_day(1).unwrap();
            let next_month_first = if anchor.month() == 12 {
                NaiveDate::from_ymd_opt(anchor.year() + 1, 1, 1)
            } else {
                NaiveDate::from_ymd_opt(anchor.year(), anchor.month() + 1, 1)
            }
            .unwrap();
            (first, next_month_first.pred_opt().unwrap())
        }
    };

    let mut days = Vec::new();
    let mut day = from;
    while day <= to {
        days.push(day);
        day = day.succ_opt().unwrap();
    }

    PeriodRange { from, to, days }
}

// --- Session Pairing ---

/// One work session: a check-in and, once the employee has punched out
/// again, its matching check-out. `clock_out == None` is an open session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPair {
    pub clock_in: AttendanceEvent,
    pub clock_out: Option<AttendanceEvent>,
}

/// Pairs punches into sessions.
///
/// Events are sorted by timestamp first; upstream ordering is not trusted.
/// A check-in while one is already pending is ignored (the first of a run
/// wins) and a check-out with no pending check-in is dropped. Both are the
/// backend's observable behavior for dirty punch streams and are kept as-is.
/// A trailing unmatched check-in becomes an open session.
pub fn pair_events(events: &[AttendanceEvent]) -> Vec<SessionPair> {
    let mut sorted = events.to_vec();
    sorted.sort_by_key(|e| e.time_stamp);

    let mut pairs = Vec::new();
    let mut pending_in: Option<AttendanceEvent> = None;

    for event in sorted {
        match event.status {
            Punch::In => {
                if pending_in.is_none() {
                    pending_in = Some(event);
                }
            }
            Punch::Out => {
                if let Some(clock_in) = pending_in.take() {
                    pairs.push(SessionPair {
                        clock_in,
                        clock_out: Some(event),
                    });
                }
            }
        }
    }

    if let Some(clock_in) = pending_in {
        pairs.push(SessionPair {
            clock_in,
            clock_out: None,
        });
    }

    pairs
}

// --- Durations ---

/// Total worked milliseconds across closed sessions. Open sessions count as
/// zero until closed; a malformed out-before-in pair is clamped to zero
/// rather than subtracted.
pub fn total_duration_ms(pairs: &[SessionPair]) -> i64 {
    pairs
        .iter()
        .filter_map(|p| {
            p.clock_out
                .map(|out| (out.time_stamp - p.clock_in.time_stamp).max(0))
        })
        .sum()
}

/// Renders a millisecond duration as `"{H}h {M}m"`, truncating sub-minute
/// remainders. Zero or negative input renders as `"0h 0m"`.
pub fn format_duration(ms: i64) -> String {
    let total_minutes = ms.max(0) / 60_000;
    format!("{}h {}m", total_minutes / 60, total_minutes % 60)
}

// --- View Model ---

/// One day's worth of sessions for one employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySummary {
    pub date: NaiveDate,
    /// Short weekday label for table headers ("Mon", "Tue", ...).
    pub weekday: String,
    pub pairs: Vec<SessionPair>,
    pub total_ms: i64,
}

/// Aggregated attendance for one employee over the requested period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeSummary {
    pub name: String,
    pub days: Vec<DaySummary>,
    pub total_ms: i64,
    /// Earliest check-in of the day, daily view only.
    pub first_in: Option<i64>,
    /// Check-out of the last session, daily view only; None while the last
    /// session is still open.
    pub last_out: Option<i64>,
}

/// Render-ready aggregation result for one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewModel {
    pub view: ViewKind,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub employees: Vec<EmployeeSummary>,
}

/// Builds the view model for every employee in `map` over `range`.
///
/// Days in range with no recorded punches become empty zero-duration rows.
/// The input map is read-only; identical inputs always produce identical
/// output.
pub fn build_view_model(map: &AttendanceMap, kind: ViewKind, range: &PeriodRange) -> ViewModel {
    let employees = map
        .iter()
        .map(|(name, by_day)| {
            let days: Vec<DaySummary> = range
                .days
                .iter()
                .map(|&date| {
                    let pairs = match by_day.get(&date) {
                        Some(events) => pair_events(events),
                        None => Vec::new(),
                    };
                    let total_ms = total_duration_ms(&pairs);
                    DaySummary {
                        date,
                        weekday: date.format("%a").to_string(),
                        pairs,
                        total_ms,
                    }
                })
                .collect();

            let total_ms = days.iter().map(|d| d.total_ms).sum();

            let (first_in, last_out) = match kind {
                ViewKind::Daily => {
                    let pairs = days.first().map(|d| d.pairs.as_slice()).unwrap_or(&[]);
                    (
                        pairs.first().map(|p| p.clock_in.time_stamp),
                        pairs
                            .last()
                            .and_then(|p| p.clock_out.map(|out| out.time_stamp)),
                    )
                }
                _ => (None, None),
            };

            EmployeeSummary {
                name: name.clone(),
                days,
                total_ms,
                first_in,
                last_out,
            }
        })
        .collect();

    ViewModel {
        view: kind,
        from: range.from,
        to: range.to,
        employees,
    }
}
