//! Trading-day arithmetic in the configured reference timezone

use chrono::{
    DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc,
};
use chrono_tz::Tz;

use crate::models::Timeframe;

/// Maps UTC instants to trading days that start at a fixed local hour.
///
/// Before the start hour the trading day is the previous calendar date, so
/// with a 16:00 start, 15:59 local on the 5th belongs to trading day the 4th.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradingCalendar {
    tz: Tz,
    start: NaiveTime,
}

impl TradingCalendar {
    pub fn new(tz: Tz, start_hour: u32) -> Self {
        let start = NaiveTime::from_hms_opt(start_hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
        Self { tz, start }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn start_hour(&self) -> u32 {
        self.start.hour()
    }

    /// Trading day containing `ts`
    pub fn trading_day(&self, ts: DateTime<Utc>) -> NaiveDate {
        let local = ts.with_timezone(&self.tz);
        let date = local.date_naive();
        if local.time() >= self.start {
            date
        } else {
            date - Duration::days(1)
        }
    }

    /// UTC instant at which `day` begins
    pub fn day_start_of(&self, day: NaiveDate) -> DateTime<Utc> {
        self.local_to_utc(day.and_time(self.start))
    }

    /// UTC instant at which the trading day containing `ts` began
    pub fn day_start(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        self.day_start_of(self.trading_day(ts))
    }

    /// Open time of the `timeframe` bucket containing `ts`.
    ///
    /// Intraday buckets are counted from the trading-day start; `D1`
    /// buckets span exactly one trading day.
    pub fn bucket_start(&self, ts: DateTime<Utc>, timeframe: Timeframe) -> DateTime<Utc> {
        let day_start = self.day_start(ts);
        if timeframe == Timeframe::D1 {
            return day_start;
        }
        let width = timeframe.to_seconds() as i64;
        let offset = (ts - day_start).num_seconds().max(0);
        day_start + Duration::seconds(offset - offset.rem_euclid(width))
    }

    /// Wall-clock time of `ts` in the reference timezone
    pub fn local_time(&self, ts: DateTime<Utc>) -> NaiveTime {
        ts.with_timezone(&self.tz).time()
    }

    fn local_to_utc(&self, naive: NaiveDateTime) -> DateTime<Utc> {
        match self.tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => dt.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
            // Start hour falls in a DST gap: the day begins when the clock resumes
            LocalResult::None => self
                .tz
                .from_local_datetime(&(naive + Duration::hours(1)))
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|| Utc.from_utc_datetime(&naive)),
        }
    }
}

impl Default for TradingCalendar {
    fn default() -> Self {
        Self::new(chrono_tz::America::Bogota, 16)
    }
}

/// Daily session during which new orders are allowed, in local time.
/// A start later than the end wraps over midnight. Both bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradingWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TradingWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Parse "HH:MM" bounds
    pub fn parse(start: &str, end: &str) -> Option<Self> {
        let start = NaiveTime::parse_from_str(start, "%H:%M").ok()?;
        let end = NaiveTime::parse_from_str(end, "%H:%M").ok()?;
        Some(Self { start, end })
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.start <= self.end {
            self.start <= time && time <= self.end
        } else {
            time >= self.start || time <= self.end
        }
    }
}

impl std::fmt::Display for TradingWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}
