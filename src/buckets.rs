// Categorical buckets derived from a transaction: calendar month, age
// group, weekday and time-of-day band.
use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

/// A parsed `transaction_date`. `hour` is only known when the raw value
/// carried a time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedDate {
    pub date: NaiveDate,
    pub hour: Option<u32>,
}

const DATETIME_FORMATS: &[&str] = &["%Y%m%d%H%M%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Parse the transaction date. The export format is `YYYYMMDD`; longer
/// compact stamps (`YYYYMMDDHH`, `YYYYMMDDHHMM`, `YYYYMMDDHHMMSS`) and ISO
/// dates are accepted too.
pub fn parse_transaction_date(s: &str) -> Option<ParsedDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let compact = s.len() >= 8 && s.bytes().all(|b| b.is_ascii_digit());
    if compact {
        let date = NaiveDate::parse_from_str(&s[..8], "%Y%m%d").ok()?;
        return match s.len() {
            8 => Some(ParsedDate { date, hour: None }),
            10 | 12 | 14 => {
                let hour: u32 = s[8..10].parse().ok()?;
                let minute: u32 = if s.len() >= 12 { s[10..12].parse().ok()? } else { 0 };
                let second: u32 = if s.len() == 14 { s[12..14].parse().ok()? } else { 0 };
                date.and_hms_opt(hour, minute, second)?;
                Some(ParsedDate { date, hour: Some(hour) })
            }
            _ => None,
        };
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(ParsedDate { date, hour: None });
    }
    DATETIME_FORMATS.iter().find_map(|fmt| {
        NaiveDateTime::parse_from_str(s, fmt).ok().map(|dt| ParsedDate {
            date: dt.date(),
            hour: Some(dt.hour()),
        })
    })
}

pub fn year_month(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AgeGroup {
    Under20,
    Twenties,
    Thirties,
    Forties,
    Fifties,
    SixtyPlus,
}

impl AgeGroup {
    /// Half-open ranges [0,20), [20,30) .. [60,∞). Negative ages have no
    /// group.
    pub fn from_age(age: i64) -> Option<Self> {
        let group = match age {
            i64::MIN..=-1 => return None,
            0..=19 => Self::Under20,
            20..=29 => Self::Twenties,
            30..=39 => Self::Thirties,
            40..=49 => Self::Forties,
            50..=59 => Self::Fifties,
            _ => Self::SixtyPlus,
        };
        Some(group)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Under20 => "<20",
            Self::Twenties => "20s",
            Self::Thirties => "30s",
            Self::Forties => "40s",
            Self::Fifties => "50s",
            Self::SixtyPlus => "60+",
        }
    }
}

impl fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Mon=1 .. Sun=7.
pub fn weekday_number(date: NaiveDate) -> u32 {
    date.weekday().number_from_monday()
}

pub fn weekday_label(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
        Weekday::Sun => "Sun",
    }
}

/// One of the ten fixed time-of-day bands, identified 1..=10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HourBand(u8);

const BAND_LABELS: [&str; 10] = [
    "00:00–06:59",
    "07:00–08:59",
    "09:00–10:59",
    "11:00–12:59",
    "13:00–14:59",
    "15:00–16:59",
    "17:00–18:59",
    "19:00–20:59",
    "21:00–22:59",
    "23:00–23:59",
];

// Keys of the legacy lookup table; an hour is rendered without padding
// before the lookup, so only 10 ever matches.
const LEGACY_KEYS: [&str; 10] = ["01", "02", "03", "04", "05", "06", "07", "08", "09", "10"];

impl HourBand {
    pub fn from_id(id: u8) -> Option<Self> {
        (1..=10).contains(&id).then_some(Self(id))
    }

    /// Band code as found in a pre-bucketed time column: "1".."10" or
    /// zero-padded "01".."10".
    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim();
        if code.is_empty() || code.len() > 2 || !code.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Self::from_id(code.parse().ok()?)
    }

    pub fn from_hour(hour: u32) -> Option<Self> {
        let id = match hour {
            0..=6 => 1,
            7..=8 => 2,
            9..=10 => 3,
            11..=12 => 4,
            13..=14 => 5,
            15..=16 => 6,
            17..=18 => 7,
            19..=20 => 8,
            21..=22 => 9,
            23 => 10,
            _ => return None,
        };
        Some(Self(id))
    }

    pub fn id(self) -> u8 {
        self.0
    }

    pub fn label(self) -> &'static str {
        BAND_LABELS[usize::from(self.0 - 1)]
    }
}

impl fmt::Display for HourBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How an hour of day (0-23) is turned into a band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum HourBandMapping {
    /// Every hour lands in the band whose interval contains it.
    #[default]
    Calendar,
    /// Unpadded hour string looked up among "01".."10". Lossy: only hour
    /// 10 matches. Date-only values count as midnight and the band column
    /// is never read.
    Legacy,
}

impl HourBandMapping {
    /// Resolve the band for one row. Under `Calendar` a valid pre-bucketed
    /// code wins over the timestamp; `Legacy` ignores the band column and
    /// always derives the hour from the date.
    pub fn band_for(self, time_band: Option<&str>, date: Option<&ParsedDate>) -> Option<HourBand> {
        match self {
            Self::Calendar => {
                if let Some(band) = time_band.and_then(HourBand::from_code) {
                    return Some(band);
                }
                HourBand::from_hour(date?.hour?)
            }
            Self::Legacy => {
                let date = date?;
                let key = date.hour.unwrap_or(0).to_string();
                let idx = LEGACY_KEYS.iter().position(|k| *k == key)?;
                HourBand::from_id(idx as u8 + 1)
            }
        }
    }
}
