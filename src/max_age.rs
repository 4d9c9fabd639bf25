//! Max-age specifications and their resolution to concrete seconds.
//!
//! A [`MaxAge`] is either a concrete number of seconds, one of the two
//! reserved sentinels ([`PERMANENT`] / [`NEVER`]), a named duration from a
//! fixed constant table (`"5m"`, `"1h"`, ...), or a named calendar interval
//! computed against the current time (`"midnight"`, `"end-of-week"`, ...).
//!
//! Resolution is a pure function of the spec and an injected `now` timestamp
//! in UTC epoch seconds, so policy decisions stay deterministic and testable.

use std::str::FromStr;

use crate::error::CacheError;

/// Sentinel meaning "never expires".
pub const PERMANENT: i64 = -1;

/// Sentinel meaning "always expired / not cached".
pub const NEVER: i64 = 0;

const SECONDS_PER_HOUR: i64 = 3_600;
const SECONDS_PER_DAY: i64 = 86_400;

/// A symbolic or numeric cache lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxAge {
    /// A concrete number of seconds. Negative values other than the
    /// permanent sentinel resolve to [`PERMANENT`].
    Seconds(i64),
    /// Never expires.
    Permanent,
    /// Always expired.
    Never,
    /// A fixed named duration from the constant table.
    Fixed(FixedDuration),
    /// A calendar interval computed against `now`.
    Interval(Interval),
}

/// Named durations with fixed second values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixedDuration {
    OneMinute,
    FiveMinutes,
    TenMinutes,
    QuarterHour,
    HalfHour,
    OneHour,
    TwoHours,
    FourHours,
    SixHours,
    TwelveHours,
    OneDay,
    TwoDays,
    OneWeek,
    OneMonth,
    OneYear,
}

impl FixedDuration {
    /// Seconds for this named duration.
    pub fn seconds(self) -> i64 {
        match self {
            FixedDuration::OneMinute => 60,
            FixedDuration::FiveMinutes => 300,
            FixedDuration::TenMinutes => 600,
            FixedDuration::QuarterHour => 900,
            FixedDuration::HalfHour => 1_800,
            FixedDuration::OneHour => SECONDS_PER_HOUR,
            FixedDuration::TwoHours => 7_200,
            FixedDuration::FourHours => 14_400,
            FixedDuration::SixHours => 21_600,
            FixedDuration::TwelveHours => 43_200,
            FixedDuration::OneDay => SECONDS_PER_DAY,
            FixedDuration::TwoDays => 172_800,
            FixedDuration::OneWeek => 604_800,
            FixedDuration::OneMonth => 2_592_000,
            FixedDuration::OneYear => 31_536_000,
        }
    }
}

/// Calendar intervals resolved dynamically against `now` (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interval {
    /// Seconds until the start of the next whole hour. Exactly on the hour
    /// yields a full hour.
    NextHour,
    /// Seconds until the next 15-minute boundary.
    NextQuarterHour,
    /// Seconds until 00:00:00 of the next calendar day.
    Midnight,
    /// Seconds until 23:59:59.999 of the upcoming Sunday, rounded up from
    /// the millisecond delta. Already-Sunday counts to the end of that
    /// Sunday.
    EndOfWeek,
}

impl MaxAge {
    /// Resolves this spec to a concrete number of seconds relative to `now`
    /// (UTC epoch seconds).
    ///
    /// The sentinels pass through unchanged; any other negative number is
    /// clamped to [`PERMANENT`].
    pub fn resolve(&self, now: i64) -> i64 {
        match *self {
            MaxAge::Permanent => PERMANENT,
            MaxAge::Never => NEVER,
            MaxAge::Seconds(PERMANENT) => PERMANENT,
            MaxAge::Seconds(NEVER) => NEVER,
            MaxAge::Seconds(value) => value.max(PERMANENT),
            MaxAge::Fixed(duration) => duration.seconds(),
            MaxAge::Interval(interval) => interval.resolve(now),
        }
    }
}

impl Interval {
    fn resolve(self, now: i64) -> i64 {
        match self {
            Interval::NextHour => until_next_boundary(now, SECONDS_PER_HOUR),
            Interval::NextQuarterHour => until_next_boundary(now, 900),
            Interval::Midnight => until_next_boundary(now, SECONDS_PER_DAY),
            Interval::EndOfWeek => until_end_of_week(now),
        }
    }
}

fn until_next_boundary(now: i64, period: i64) -> i64 {
    period - now.rem_euclid(period)
}

fn until_end_of_week(now: i64) -> i64 {
    let day = now.div_euclid(SECONDS_PER_DAY);
    // 1970-01-01 was a Thursday; 0 = Sunday.
    let weekday = (day + 4).rem_euclid(7);
    let days_until_sunday = (7 - weekday) % 7;
    let start_of_day = day * SECONDS_PER_DAY;
    let sunday_start = start_of_day + days_until_sunday * SECONDS_PER_DAY;
    let end_of_sunday_ms = (sunday_start + SECONDS_PER_DAY - 1) * 1_000 + 999;
    let delta_ms = end_of_sunday_ms - now * 1_000;
    // Ceiling of the millisecond delta, matching the wall-clock boundary.
    (delta_ms + 999).div_euclid(1_000)
}

impl From<i64> for MaxAge {
    fn from(value: i64) -> Self {
        MaxAge::Seconds(value)
    }
}

impl FromStr for MaxAge {
    type Err = CacheError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let spec = match value {
            "permanent" => MaxAge::Permanent,
            "never" => MaxAge::Never,
            "1m" => MaxAge::Fixed(FixedDuration::OneMinute),
            "5m" => MaxAge::Fixed(FixedDuration::FiveMinutes),
            "10m" => MaxAge::Fixed(FixedDuration::TenMinutes),
            "15m" => MaxAge::Fixed(FixedDuration::QuarterHour),
            "30m" => MaxAge::Fixed(FixedDuration::HalfHour),
            "1h" => MaxAge::Fixed(FixedDuration::OneHour),
            "2h" => MaxAge::Fixed(FixedDuration::TwoHours),
            "4h" => MaxAge::Fixed(FixedDuration::FourHours),
            "6h" => MaxAge::Fixed(FixedDuration::SixHours),
            "12h" => MaxAge::Fixed(FixedDuration::TwelveHours),
            "1d" => MaxAge::Fixed(FixedDuration::OneDay),
            "2d" => MaxAge::Fixed(FixedDuration::TwoDays),
            "1w" => MaxAge::Fixed(FixedDuration::OneWeek),
            "1month" => MaxAge::Fixed(FixedDuration::OneMonth),
            "1year" => MaxAge::Fixed(FixedDuration::OneYear),
            "next-hour" => MaxAge::Interval(Interval::NextHour),
            "next-quarter-hour" => MaxAge::Interval(Interval::NextQuarterHour),
            "midnight" => MaxAge::Interval(Interval::Midnight),
            "end-of-week" => MaxAge::Interval(Interval::EndOfWeek),
            other => match other.parse::<i64>() {
                Ok(seconds) => MaxAge::Seconds(seconds),
                Err(_) => return Err(CacheError::InvalidMaxAge(other.to_owned())),
            },
        };

        Ok(spec)
    }
}
