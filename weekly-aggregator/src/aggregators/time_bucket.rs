use crate::types::{AggregatorError, IsoWeek, Result};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use std::fmt;

/// A `[start, end)` instant range and the ISO week it stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub week: IsoWeek,
}

impl TimeWindow {
    /// Window for ISO week `week` of `year`, with Monday midnight taken in `tz`.
    pub fn for_iso_week<Tz: TimeZone>(tz: &Tz, year: i32, week: u32) -> Result<Self> {
        let monday = monday_of_iso_week(year, week)?;
        window_from_monday(tz, monday)
    }

    /// Window for the calendar week `weeks_ago` weeks before the week containing `now`.
    pub fn weeks_ago<Tz: TimeZone>(now: &DateTime<Tz>, weeks_ago: u32) -> Result<Self> {
        let monday = current_week_monday(now.date_naive()) - Duration::days(7 * i64::from(weeks_ago));
        window_from_monday(&now.timezone(), monday)
    }

    /// Rolling window covering the `days` days up to `now`, labelled with the
    /// ISO week its start falls in.
    pub fn last_days<Tz: TimeZone>(now: &DateTime<Tz>, days: u32) -> Self {
        let start = now.clone() - Duration::days(i64::from(days));
        let iso = start.date_naive().iso_week();
        Self {
            start: start.with_timezone(&Utc),
            end: now.with_timezone(&Utc),
            week: IsoWeek::new(iso.year(), iso.week()),
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }

    pub fn starts_after(&self, instant: DateTime<Utc>) -> bool {
        instant < self.start
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} to {})",
            self.week,
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

/// The `count` completed weeks before the week containing `now`, oldest first.
pub fn backfill_windows<Tz: TimeZone>(now: &DateTime<Tz>, count: u32) -> Result<Vec<TimeWindow>> {
    (1..=count)
        .rev()
        .map(|weeks_ago| TimeWindow::weeks_ago(now, weeks_ago))
        .collect()
}

/// Number of ISO weeks in `year` (52 or 53). December 28th always sits in the last one.
pub fn iso_weeks_in_year(year: i32) -> u32 {
    NaiveDate::from_ymd_opt(year, 12, 28)
        .map(|d| d.iso_week().week())
        .unwrap_or(52)
}

/// Monday of ISO week 1: January 4th is always in week 1, walk back to its Monday.
pub fn week_one_monday(year: i32) -> Option<NaiveDate> {
    let jan4 = NaiveDate::from_ymd_opt(year, 1, 4)?;
    Some(current_week_monday(jan4))
}

pub fn monday_of_iso_week(year: i32, week: u32) -> Result<NaiveDate> {
    if week == 0 || week > iso_weeks_in_year(year) {
        return Err(AggregatorError::InvalidWeek { year, week });
    }
    let week_one = week_one_monday(year).ok_or(AggregatorError::InvalidWeek { year, week })?;
    week_one
        .checked_add_signed(Duration::days(7 * (i64::from(week) - 1)))
        .ok_or(AggregatorError::InvalidWeek { year, week })
}

/// Monday of the week containing `date`; Sunday counts as day 7, not day 0.
pub fn current_week_monday(date: NaiveDate) -> NaiveDate {
    let weekday = i64::from(date.weekday().number_from_monday());
    date - Duration::days(weekday - 1)
}

fn window_from_monday<Tz: TimeZone>(tz: &Tz, monday: NaiveDate) -> Result<TimeWindow> {
    let start = local_midnight(tz, monday)?;
    // Sunday 23:59:59
    let end = local_midnight(tz, monday + Duration::days(7))? - Duration::seconds(1);
    let iso = monday.iso_week();
    Ok(TimeWindow {
        start,
        end,
        week: IsoWeek::new(iso.year(), iso.week()),
    })
}

fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> Result<DateTime<Utc>> {
    tz.from_local_datetime(&date.and_time(NaiveTime::MIN))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| AggregatorError::General(format!("no local midnight on {}", date)))
}
