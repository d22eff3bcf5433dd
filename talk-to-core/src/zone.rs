//! Anchoring wall-clock times to absolute instants.

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::warn;

/// Resolve a wall-clock `naive` time in `tz` to an instant.
///
/// Ambiguous times (clocks going back) resolve to the earlier instant. Times
/// that do not exist (clocks going forward) are pushed past the gap by its
/// actual length, so 02:30 on a Paris spring-forward night becomes 03:30
/// local and 02:15 on a Lord Howe one becomes 02:45.
pub fn anchor(tz: Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => across_gap(tz, naive),
    }
}

/// Read a skipped wall time with the offset in force just before the gap.
fn across_gap(tz: Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    let offset_before = naive
        .checked_sub_signed(Duration::days(1))
        .and_then(|day_before| tz.from_local_datetime(&day_before).earliest())
        .map(|dt| Duration::seconds(i64::from(dt.offset().fix().local_minus_utc())));

    match offset_before.and_then(|offset| naive.checked_sub_signed(offset)) {
        Some(utc) => utc.and_utc(),
        None => {
            warn!(%naive, tz = %tz.name(), "cannot place local time inside a DST gap, reading it as UTC");
            naive.and_utc()
        }
    }
}
