//! Time-of-day parsing for game log lines.
//!
//! Lines look like `D 23:59:58.1234567 GameState.DebugPrintPower() - ...`.
//! The log carries no date, so each source keeps a [`SourceClock`] that
//! places every time on a calendar day and corrects for midnight rollover.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

/// A backward jump larger than this many hours is treated as crossing midnight.
pub const ROLLOVER_THRESHOLD_HOURS: i64 = 6;

/// Offset of the time field (after the severity letter and a space).
const TIME_OFFSET: usize = 2;

/// True if the line starts with the producer's header: one uppercase
/// severity letter followed by a space.
pub fn has_line_header(line: &str) -> bool {
    let bytes = line.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_uppercase() && bytes[1] == b' '
}

/// Parse the leading time of `line` onto `reference`, correcting for
/// rollover against `previous` (the last timestamp from the same source).
///
/// Returns `None` if the header or the time field is missing.
pub fn parse_timestamp(
    line: &str,
    reference: NaiveDate,
    previous: Option<NaiveDateTime>,
) -> Option<NaiveDateTime> {
    if !has_line_header(line) {
        return None;
    }

    let time = parse_time_field(line.get(TIME_OFFSET..)?)?;
    let candidate = reference.and_time(time);
    let threshold = TimeDelta::hours(ROLLOVER_THRESHOLD_HOURS);

    match previous {
        Some(previous) if candidate < previous - threshold => Some(candidate + TimeDelta::days(1)),
        _ => Some(candidate),
    }
}

/// Accepts `HH:MM:SS.mmm` (longer fractions are cut to milliseconds) or `HH:MM:SS`.
fn parse_time_field(field: &str) -> Option<NaiveTime> {
    if let Some(long) = field.get(..12) {
        if let Ok(time) = NaiveTime::parse_from_str(long, "%H:%M:%S%.3f") {
            return Some(time);
        }
    }

    let short = field.get(..8)?;
    let time = NaiveTime::parse_from_str(short, "%H:%M:%S").ok()?;
    // "12:34:56.7" is neither form.
    match field.as_bytes().get(8) {
        None | Some(b' ') => Some(time),
        _ => None,
    }
}

/// Per-source rollover state.
///
/// The reference date for each line is the date of the previous line, or
/// the base date for the first one.
#[derive(Debug, Clone)]
pub struct SourceClock {
    base_date: NaiveDate,
    last: Option<NaiveDateTime>,
}

impl SourceClock {
    pub fn new(base_date: NaiveDate) -> Self {
        Self {
            base_date,
            last: None,
        }
    }

    /// Timestamp `line`, advancing the clock. Unparseable lines leave it untouched.
    pub fn stamp(&mut self, line: &str) -> Option<NaiveDateTime> {
        let reference = self.last.map(|t| t.date()).unwrap_or(self.base_date);
        let ts = parse_timestamp(line, reference, self.last)?;
        self.last = Some(ts);
        Some(ts)
    }

    pub fn last(&self) -> Option<NaiveDateTime> {
        self.last
    }
}
