//! ICS feed parsing using the icalendar crate's parser.

use std::collections::HashSet;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use icalendar::{
    CalendarDateTime, DatePerhapsTime,
    parser::{Component, Property, read_calendar, unfold},
};
use tracing::{debug, warn};

use crate::error::{TalkToError, TalkToResult};
use crate::event::{Event, Timeline};
use crate::recurrence::expand_occurrences;
use crate::zone::anchor;

/// How a feed is turned into busy intervals.
#[derive(Debug, Clone, Copy)]
pub struct FeedOptions {
    /// Floating times and all-day dates are read in this zone.
    pub timezone: Tz,
    /// Recurring events are expanded into instances within `[expand_from, expand_until]`.
    pub expand_from: DateTime<Utc>,
    pub expand_until: DateTime<Utc>,
}

impl FeedOptions {
    /// Expand recurrences from a day before `now` up to `horizon_days` after it.
    pub fn new(timezone: Tz, now: DateTime<Utc>, horizon_days: u32) -> Self {
        FeedOptions {
            timezone,
            expand_from: now - Duration::days(1),
            expand_until: now + Duration::days(i64::from(horizon_days)),
        }
    }
}

/// A DTSTART/DTEND/EXDATE value before it is pinned to an instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum FeedTime {
    Utc(DateTime<Utc>),
    Local { datetime: NaiveDateTime, tz: Tz },
    Date(NaiveDate),
}

impl FeedTime {
    pub(crate) fn to_utc(self, owner_tz: Tz) -> DateTime<Utc> {
        match self {
            FeedTime::Utc(dt) => dt,
            FeedTime::Local { datetime, tz } => anchor(tz, datetime),
            FeedTime::Date(d) => anchor(owner_tz, d.and_time(NaiveTime::MIN)),
        }
    }

    fn is_date(&self) -> bool {
        matches!(self, FeedTime::Date(_))
    }
}

/// Parse a whole feed into busy events, sorted ascending by begin.
///
/// Cancelled, transparent and zero-length entries do not block time and are left out.
/// Entries that cannot be read are skipped with a warning; only a feed that
/// is not iCalendar at all is an error.
pub fn parse_timeline(content: &str, options: &FeedOptions) -> TalkToResult<Timeline> {
    let unfolded = unfold(content);
    if !unfolded.contains("BEGIN:VCALENDAR") {
        return Err(TalkToError::IcsParse("not an iCalendar document".into()));
    }
    let calendar =
        read_calendar(&unfolded).map_err(|e| TalkToError::IcsParse(e.to_string()))?;

    let mut vevents = Vec::new();
    collect_vevents(&calendar.components, &mut vevents);

    let entries: Vec<Entry> = vevents
        .into_iter()
        .filter_map(|vevent| Entry::parse(vevent, options.timezone))
        .collect();

    // Instances replaced by a RECURRENCE-ID entry are not generated from the master
    let overridden: HashSet<(&str, DateTime<Utc>)> = entries
        .iter()
        .filter_map(|e| Some((e.uid.as_deref()?, e.recurrence_id?)))
        .collect();

    let mut timeline = Vec::new();
    for entry in &entries {
        if !entry.blocks_time || entry.duration.is_zero() {
            continue;
        }

        let Some(rrule) = &entry.rrule else {
            timeline.push(Event::new(entry.begin, entry.begin + entry.duration));
            continue;
        };

        match expand_occurrences(entry.start, rrule, &entry.exdates, options) {
            Ok(occurrences) => {
                timeline.extend(
                    occurrences
                        .into_iter()
                        .filter(|begin| match entry.uid.as_deref() {
                            Some(uid) => !overridden.contains(&(uid, *begin)),
                            None => true,
                        })
                        .map(|begin| Event::new(begin, begin + entry.duration)),
                );
            }
            Err(e) => {
                warn!(uid = ?entry.uid, error = %e, "could not expand recurrence, keeping first occurrence only");
                timeline.push(Event::new(entry.begin, entry.begin + entry.duration));
            }
        }
    }

    timeline.sort_by_key(|event| event.begin);
    debug!(events = timeline.len(), "parsed feed");
    Ok(timeline)
}

fn collect_vevents<'a, 'b>(components: &'b [Component<'a>], out: &mut Vec<&'b Component<'a>>) {
    for component in components {
        if component.name == "VEVENT" {
            out.push(component);
        } else {
            collect_vevents(&component.components, out);
        }
    }
}

/// The parts of a VEVENT that matter for busy time.
struct Entry {
    uid: Option<String>,
    start: FeedTime,
    begin: DateTime<Utc>,
    duration: Duration,
    blocks_time: bool,
    rrule: Option<String>,
    exdates: Vec<FeedTime>,
    recurrence_id: Option<DateTime<Utc>>,
}

impl Entry {
    fn parse(vevent: &Component<'_>, owner_tz: Tz) -> Option<Self> {
        let uid = vevent.find_prop("UID").map(|p| p.val.to_string());

        let Some(start) = vevent
            .find_prop("DTSTART")
            .and_then(|p| DatePerhapsTime::try_from(p).ok())
            .map(|dpt| to_feed_time(dpt, owner_tz))
        else {
            warn!(uid = ?uid, "skipping VEVENT without a readable DTSTART");
            return None;
        };
        let begin = start.to_utc(owner_tz);

        let end = vevent
            .find_prop("DTEND")
            .and_then(|p| DatePerhapsTime::try_from(p).ok())
            .map(|dpt| to_feed_time(dpt, owner_tz).to_utc(owner_tz));

        let end = match end {
            Some(end) => end,
            None => match vevent.find_prop("DURATION").map(|p| parse_duration(p.val.as_ref())) {
                Some(Some(duration)) => begin + duration,
                Some(None) => {
                    warn!(uid = ?uid, "skipping VEVENT with an unreadable DURATION");
                    return None;
                }
                // RFC 5545: a date start with no end lasts one day, a date-time start is instantaneous
                None if start.is_date() => begin + Duration::days(1),
                None => begin,
            },
        };

        if end < begin {
            warn!(uid = ?uid, %begin, %end, "skipping VEVENT that ends before it begins");
            return None;
        }

        let cancelled = vevent
            .find_prop("STATUS")
            .is_some_and(|p| p.val == "CANCELLED");
        let transparent = vevent
            .find_prop("TRANSP")
            .is_some_and(|p| p.val == "TRANSPARENT");

        let rrule = vevent.find_prop("RRULE").map(|p| p.val.to_string());
        let exdates = vevent
            .properties
            .iter()
            .filter(|p| p.name == "EXDATE")
            .flat_map(|p| parse_exdate_property(p, owner_tz))
            .collect();

        let recurrence_id = vevent
            .find_prop("RECURRENCE-ID")
            .and_then(|p| DatePerhapsTime::try_from(p).ok())
            .map(|dpt| to_feed_time(dpt, owner_tz).to_utc(owner_tz));

        Some(Entry {
            uid,
            start,
            begin,
            duration: end - begin,
            blocks_time: !cancelled && !transparent,
            rrule,
            exdates,
            recurrence_id,
        })
    }
}

fn to_feed_time(dpt: DatePerhapsTime, owner_tz: Tz) -> FeedTime {
    match dpt {
        DatePerhapsTime::Date(d) => FeedTime::Date(d),
        DatePerhapsTime::DateTime(cal_dt) => match cal_dt {
            CalendarDateTime::Utc(dt) => FeedTime::Utc(dt),
            CalendarDateTime::Floating(naive) => FeedTime::Local {
                datetime: naive,
                tz: owner_tz,
            },
            CalendarDateTime::WithTimezone { date_time, tzid } => FeedTime::Local {
                datetime: date_time,
                tz: resolve_tzid(&tzid, owner_tz),
            },
        },
    }
}

/// Feeds from some providers carry non-IANA zone names; those fall back to the owner's zone.
fn resolve_tzid(tzid: &str, owner_tz: Tz) -> Tz {
    let cleaned = tzid.trim_matches('"').trim_start_matches('/');
    cleaned.parse::<Tz>().unwrap_or_else(|_| {
        warn!(tzid, fallback = %owner_tz.name(), "unknown TZID in feed");
        owner_tz
    })
}

/// Parse an EXDATE property into a list of feed times.
///
/// Handles `TZID=` and `VALUE=DATE` parameters, UTC and floating values, and
/// comma-separated lists.
fn parse_exdate_property(prop: &Property, owner_tz: Tz) -> Vec<FeedTime> {
    let tz = prop
        .params
        .iter()
        .find(|p| p.key == "TZID")
        .and_then(|p| p.val.as_ref())
        .map(|v| resolve_tzid(v.as_ref(), owner_tz))
        .unwrap_or(owner_tz);

    let is_date = prop
        .params
        .iter()
        .any(|p| p.key == "VALUE" && p.val.as_ref().map(|v| v.as_ref()) == Some("DATE"));

    prop.val
        .as_ref()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| {
            if is_date {
                NaiveDate::parse_from_str(s, "%Y%m%d").ok().map(FeedTime::Date)
            } else if let Some(utc) = s.strip_suffix('Z') {
                NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S")
                    .ok()
                    .map(|dt| FeedTime::Utc(dt.and_utc()))
            } else {
                NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S")
                    .ok()
                    .map(|datetime| FeedTime::Local { datetime, tz })
            }
        })
        .collect()
}

/// Parse an RFC 5545 DURATION (`PT1H30M`, `P1D`). Negative durations are rejected.
fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim().trim_start_matches('+');
    if value.starts_with('-') {
        return None;
    }
    let duration = iso8601::duration(value).ok()?;
    let std_duration: std::time::Duration = duration.into();
    Duration::from_std(std_duration).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn options() -> FeedOptions {
        FeedOptions::new(
            chrono_tz::Europe::Paris,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            90,
        )
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn feed(events: &str) -> String {
        format!(
            "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:TEST\r\n{}END:VCALENDAR\r\n",
            events
        )
    }

    #[test]
    fn parses_and_sorts_events() {
        let ics = feed(
            "BEGIN:VEVENT\r\nUID:b\r\nDTSTART:20240110T140000Z\r\nDTEND:20240110T150000Z\r\nEND:VEVENT\r\n\
             BEGIN:VEVENT\r\nUID:a\r\nDTSTART:20240110T090000Z\r\nDTEND:20240110T100000Z\r\nEND:VEVENT\r\n",
        );

        let timeline = parse_timeline(&ics, &options()).unwrap();
        assert_eq!(
            timeline,
            vec![
                Event::new(utc(2024, 1, 10, 9, 0), utc(2024, 1, 10, 10, 0)),
                Event::new(utc(2024, 1, 10, 14, 0), utc(2024, 1, 10, 15, 0)),
            ]
        );
    }

    #[test]
    fn resolves_tzid_floating_and_all_day_times() {
        let ics = feed(
            "BEGIN:VEVENT\r\nUID:zoned\r\nDTSTART;TZID=America/New_York:20240110T090000\r\nDTEND;TZID=America/New_York:20240110T100000\r\nEND:VEVENT\r\n\
             BEGIN:VEVENT\r\nUID:floating\r\nDTSTART:20240111T090000\r\nDTEND:20240111T100000\r\nEND:VEVENT\r\n\
             BEGIN:VEVENT\r\nUID:allday\r\nDTSTART;VALUE=DATE:20240112\r\nEND:VEVENT\r\n",
        );

        let timeline = parse_timeline(&ics, &options()).unwrap();
        assert_eq!(
            timeline,
            vec![
                Event::new(utc(2024, 1, 10, 14, 0), utc(2024, 1, 10, 15, 0)),
                // floating times are read in the owner's zone (Paris, UTC+1 in winter)
                Event::new(utc(2024, 1, 11, 8, 0), utc(2024, 1, 11, 9, 0)),
                Event::new(utc(2024, 1, 11, 23, 0), utc(2024, 1, 12, 23, 0)),
            ]
        );
    }

    #[test]
    fn duration_stands_in_for_missing_dtend() {
        let ics = feed(
            "BEGIN:VEVENT\r\nUID:d\r\nDTSTART:20240110T090000Z\r\nDURATION:PT1H30M\r\nEND:VEVENT\r\n",
        );

        let timeline = parse_timeline(&ics, &options()).unwrap();
        assert_eq!(
            timeline,
            vec![Event::new(utc(2024, 1, 10, 9, 0), utc(2024, 1, 10, 10, 30))]
        );
    }

    #[test]
    fn skips_cancelled_and_transparent_events() {
        let ics = feed(
            "BEGIN:VEVENT\r\nUID:c\r\nSTATUS:CANCELLED\r\nDTSTART:20240110T090000Z\r\nDTEND:20240110T100000Z\r\nEND:VEVENT\r\n\
             BEGIN:VEVENT\r\nUID:t\r\nTRANSP:TRANSPARENT\r\nDTSTART:20240110T110000Z\r\nDTEND:20240110T120000Z\r\nEND:VEVENT\r\n\
             BEGIN:VEVENT\r\nUID:o\r\nTRANSP:OPAQUE\r\nDTSTART:20240110T130000Z\r\nDTEND:20240110T140000Z\r\nEND:VEVENT\r\n",
        );

        let timeline = parse_timeline(&ics, &options()).unwrap();
        assert_eq!(
            timeline,
            vec![Event::new(utc(2024, 1, 10, 13, 0), utc(2024, 1, 10, 14, 0))]
        );
    }

    #[test]
    fn instantaneous_events_do_not_block_time() {
        let ics = feed(
            "BEGIN:VEVENT\r\nUID:i\r\nDTSTART:20240110T090000Z\r\nEND:VEVENT\r\n",
        );
        assert!(parse_timeline(&ics, &options()).unwrap().is_empty());
    }

    #[test]
    fn skips_events_ending_before_they_begin() {
        let ics = feed(
            "BEGIN:VEVENT\r\nUID:x\r\nDTSTART:20240110T100000Z\r\nDTEND:20240110T090000Z\r\nEND:VEVENT\r\n",
        );
        assert!(parse_timeline(&ics, &options()).unwrap().is_empty());
    }

    #[test]
    fn expands_recurrences_with_exdates_and_overrides() {
        let ics = feed(
            "BEGIN:VEVENT\r\nUID:weekly\r\nDTSTART:20240101T100000Z\r\nDTEND:20240101T110000Z\r\n\
             RRULE:FREQ=WEEKLY;COUNT=4\r\nEXDATE:20240108T100000Z\r\nEND:VEVENT\r\n\
             BEGIN:VEVENT\r\nUID:weekly\r\nRECURRENCE-ID:20240115T100000Z\r\n\
             DTSTART:20240115T150000Z\r\nDTEND:20240115T160000Z\r\nEND:VEVENT\r\n",
        );

        let timeline = parse_timeline(&ics, &options()).unwrap();
        assert_eq!(
            timeline,
            vec![
                Event::new(utc(2024, 1, 1, 10, 0), utc(2024, 1, 1, 11, 0)),
                Event::new(utc(2024, 1, 15, 15, 0), utc(2024, 1, 15, 16, 0)),
                Event::new(utc(2024, 1, 22, 10, 0), utc(2024, 1, 22, 11, 0)),
            ]
        );
    }

    #[test]
    fn rejects_non_calendar_content() {
        let err = parse_timeline("<html>not a calendar</html>", &options()).unwrap_err();
        assert!(matches!(err, TalkToError::IcsParse(_)));
    }
}
