//! RRULE expansion for recurring feed events.
//!
//! Expands a master recurring event into the begin instants of its
//! occurrences within the feed's expansion window, respecting EXDATEs.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use rrule::RRuleSet;

use crate::error::{TalkToError, TalkToResult};
use crate::ics::FeedOptions;
use crate::ics::FeedTime;

/// Upper bound on generated occurrences per master event.
const MAX_OCCURRENCES: u16 = 2000;

/// Format a feed time as the value part of a DTSTART/EXDATE line.
///
/// The rrule crate needs a date-time, so all-day dates become local midnight
/// in the owner's zone, and floating times are pinned to the owner's zone.
fn rrule_value(time: FeedTime, owner_tz: chrono_tz::Tz) -> String {
    match time {
        FeedTime::Utc(dt) => format!(":{}", dt.format("%Y%m%dT%H%M%SZ")),
        FeedTime::Local { datetime, tz } => {
            format!(";TZID={}:{}", tz.name(), datetime.format("%Y%m%dT%H%M%S"))
        }
        FeedTime::Date(d) => format!(
            ";TZID={}:{}",
            owner_tz.name(),
            d.and_time(NaiveTime::MIN).format("%Y%m%dT%H%M%S")
        ),
    }
}

/// Build an iCalendar-format rule set string for the rrule crate parser.
fn build_rrule_string(
    start: FeedTime,
    rrule: &str,
    exdates: &[FeedTime],
    owner_tz: chrono_tz::Tz,
) -> String {
    let mut lines = Vec::with_capacity(exdates.len() + 2);
    lines.push(format!("DTSTART{}", rrule_value(start, owner_tz)));
    lines.push(format!("RRULE:{}", rrule));
    for exdate in exdates {
        lines.push(format!("EXDATE{}", rrule_value(*exdate, owner_tz)));
    }
    lines.join("\n")
}

/// Begin instants of every occurrence of `rrule` starting at `start`,
/// limited to the expansion window of `options`.
pub(crate) fn expand_occurrences(
    start: FeedTime,
    rrule: &str,
    exdates: &[FeedTime],
    options: &FeedOptions,
) -> TalkToResult<Vec<DateTime<Utc>>> {
    let rule_set: RRuleSet = build_rrule_string(start, rrule, exdates, options.timezone)
        .parse()
        .map_err(|e| TalkToError::Recurrence(format!("Failed to parse RRULE '{}': {}", rrule, e)))?;

    // after/before are exclusive, widen by a second to make the window inclusive
    let tz: rrule::Tz = Utc.into();
    let after = (options.expand_from - Duration::seconds(1)).with_timezone(&tz);
    let before = (options.expand_until + Duration::seconds(1)).with_timezone(&tz);

    let result = rule_set.after(after).before(before).all(MAX_OCCURRENCES);

    Ok(result
        .dates
        .iter()
        .map(|dt| dt.with_timezone(&Utc))
        .collect())
}
