//! Rendering of SAS date, time and datetime values.
//!
//! SAS stores calendar values as plain numbers: days (dates) or seconds
//! (datetimes) since 1960-01-01, and seconds since midnight (times). The
//! variable's display format tells which one a numeric column holds.

use chrono::{Duration, NaiveDate, NaiveDateTime};

use super::model::CellValue;

const DATE_FORMATS: &[&str] = &[
    "B8601DA", "DATE", "DAY", "DDMMYY", "DDMMYYB", "DDMMYYC", "DDMMYYD", "DDMMYYN", "DDMMYYP",
    "DDMMYYS", "DOWNAME", "E8601DA", "IS8601DA", "JULDAY", "JULIAN", "MINGUO", "MMDDYY",
    "MMDDYYB", "MMDDYYC", "MMDDYYD", "MMDDYYN", "MMDDYYP", "MMDDYYS", "MMYY", "MMYYC", "MMYYD",
    "MMYYN", "MMYYP", "MMYYS", "MONNAME", "MONTH", "MONYY", "NENGO", "QTR", "QTRR", "WEEKDATE",
    "WEEKDATX", "WEEKDAY", "WEEKV", "WORDDATE", "WORDDATX", "YEAR", "YYMM", "YYMMC", "YYMMD",
    "YYMMDD", "YYMMDDB", "YYMMDDC", "YYMMDDD", "YYMMDDN", "YYMMDDP", "YYMMDDS", "YYMMN", "YYMMP",
    "YYMMS", "YYMON", "YYQ", "YYQC", "YYQD", "YYQN", "YYQP", "YYQR", "YYQRC", "YYQRD", "YYQRN",
    "YYQRP", "YYQRS", "YYQS",
];

const DATETIME_FORMATS: &[&str] = &[
    "B8601DN", "B8601DT", "B8601DX", "B8601DZ", "B8601LX", "DATEAMPM", "DATETIME", "DTDATE",
    "DTMONYY", "DTWKDATX", "DTYEAR", "DTYYQC", "E8601DN", "E8601DT", "E8601DX", "E8601DZ",
    "E8601LX", "IS8601DN", "IS8601DT", "IS8601DX", "IS8601DZ", "IS8601LX", "MDYAMPM",
];

const TIME_FORMATS: &[&str] = &[
    "B8601LZ", "B8601TM", "B8601TX", "B8601TZ", "E8601LZ", "E8601TM", "E8601TX", "E8601TZ",
    "HHMM", "HOUR", "IS8601LZ", "IS8601TM", "IS8601TX", "IS8601TZ", "MMSS", "TIME", "TIMEAMPM",
    "TOD",
];

/// What kind of calendar value a display format denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarKind {
    Date,
    DateTime,
    Time,
}

/// Classify a SAS format such as `DATE9.` or `e8601dt19.`.
pub fn calendar_kind(format: &str) -> Option<CalendarKind> {
    let name = format
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_digit() || c == '.')
        .to_ascii_uppercase();
    if name.is_empty() {
        return None;
    }
    if DATE_FORMATS.contains(&name.as_str()) {
        Some(CalendarKind::Date)
    } else if DATETIME_FORMATS.contains(&name.as_str()) {
        Some(CalendarKind::DateTime)
    } else if TIME_FORMATS.contains(&name.as_str()) {
        Some(CalendarKind::Time)
    } else {
        None
    }
}

fn epoch() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1960, 1, 1)?.and_hms_opt(0, 0, 0)
}

/// Render one numeric SAS value. Values out of chrono's range stay numeric.
pub fn render(value: f64, kind: CalendarKind) -> CellValue {
    if !value.is_finite() {
        return CellValue::Null;
    }
    let rendered = match kind {
        CalendarKind::Date => Duration::try_days(value.floor() as i64)
            .and_then(|d| epoch()?.date().checked_add_signed(d))
            .map(|d| d.format("%Y-%m-%d").to_string()),
        CalendarKind::DateTime => Duration::try_milliseconds((value * 1000.0).round() as i64)
            .and_then(|d| epoch()?.checked_add_signed(d))
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        CalendarKind::Time => {
            let secs = value.floor() as i64;
            Some(format!(
                "{:02}:{:02}:{:02}",
                secs.div_euclid(3600),
                secs.rem_euclid(3600) / 60,
                secs.rem_euclid(60)
            ))
        }
    };
    rendered
        .map(CellValue::Date)
        .unwrap_or(CellValue::Float(value))
}

/// Convert a numeric column in place when its format is a calendar format.
pub fn apply_format(values: &mut [CellValue], format: &str) {
    let Some(kind) = calendar_kind(format) else {
        return;
    };
    for v in values.iter_mut() {
        if let CellValue::Float(f) = *v {
            *v = render(f, kind);
        }
    }
}
