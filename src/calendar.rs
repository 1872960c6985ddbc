//! Jalali (Solar Hijri) calendar arithmetic.
//!
//! The news site addresses its sitemaps by Jalali date, so the crawl cursor
//! is a [`JalaliDate`]. Month lengths and the leap rule of this calendar do not
//! line up with the Gregorian one, so day arithmetic is never done natively:
//! a date is converted to a [`chrono::NaiveDate`], moved there, and converted
//! back.
//!
//! Conversion goes through Julian day numbers using the 33-year-cycle break
//! table, which is exact for Jalali years `-61 ..= 3177`. Stepping past the
//! last few weeks of 3177 reports [`CalendarError::Unrepresentable`].

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Jalali years at which the leap cycle pattern restarts.
const BREAKS: [i32; 20] = [
    -61, 9, 38, 199, 426, 686, 756, 818, 1111, 1181, 1210, 1635, 2060, 2097, 2192, 2262, 2324,
    2394, 2456, 3178,
];

/// `NaiveDate::num_days_from_ce` is 1 on 0001-01-01, whose Julian day number is 1721426.
const CE_TO_JDN: i32 = 1_721_425;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CalendarError {
    #[error("Jalali year {0} is outside the supported range")]
    YearOutOfRange(i32),
    #[error("invalid Jalali month {0}")]
    InvalidMonth(u32),
    #[error("invalid day {day} for Jalali month {year}-{month:02}")]
    InvalidDay { year: i32, month: u32, day: u32 },
    #[error("Gregorian date {0} has no Jalali equivalent in the supported range")]
    Unrepresentable(NaiveDate),
    #[error("cannot parse Jalali date from '{0}' (expected YYYY-MM-DD)")]
    Parse(String),
}

/// A valid day on the Jalali calendar.
///
/// Field order gives the derived `Ord` chronological meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JalaliDate {
    year: i32,
    month: u32,
    day: u32,
}

impl JalaliDate {
    /// Build a date, rejecting anything that does not exist on the calendar.
    pub fn new(year: i32, month: u32, day: u32) -> Result<Self, CalendarError> {
        if !(1..=12).contains(&month) {
            return Err(CalendarError::InvalidMonth(month));
        }
        let len = days_in_month(year, month)?;
        if day == 0 || day > len {
            return Err(CalendarError::InvalidDay { year, month, day });
        }
        Ok(Self { year, month, day })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    /// The equivalent proleptic Gregorian date.
    pub fn to_gregorian(&self) -> Result<NaiveDate, CalendarError> {
        let jdn = farvardin_first(self.year)? + (self.month as i32 - 1) * 31
            - (self.month as i32 / 7) * (self.month as i32 - 7)
            + self.day as i32
            - 1;
        jdn_to_gregorian(jdn).ok_or(CalendarError::YearOutOfRange(self.year))
    }

    /// The Jalali date falling on the given Gregorian date.
    pub fn from_gregorian(date: NaiveDate) -> Result<Self, CalendarError> {
        let jdn = gregorian_to_jdn(date);
        let gy = date.year();
        let mut jy = gy - 621;
        let info = jal_cal(jy).map_err(|_| CalendarError::Unrepresentable(date))?;
        let first = march_day(gy, info.march).ok_or(CalendarError::Unrepresentable(date))?;

        let mut k = jdn - first;
        if k >= 0 {
            if k <= 185 {
                return Self::new(jy, (1 + k / 31) as u32, (k % 31 + 1) as u32)
                    .map_err(|_| CalendarError::Unrepresentable(date));
            }
            k -= 186;
        } else {
            jy -= 1;
            k += 179;
            if info.leap == 1 {
                k += 1;
            }
        }
        Self::new(jy, (7 + k / 30) as u32, (k % 30 + 1) as u32)
            .map_err(|_| CalendarError::Unrepresentable(date))
    }

    /// The following calendar day, with month and year rollover.
    ///
    /// Computed on the Gregorian side. Only the very last supported day has no
    /// successor.
    pub fn next_day(&self) -> Result<Self, CalendarError> {
        let today = self.to_gregorian()?;
        let tomorrow = today
            .succ_opt()
            .ok_or(CalendarError::Unrepresentable(today))?;
        Self::from_gregorian(tomorrow)
    }
}

impl fmt::Display for JalaliDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

impl FromStr for JalaliDate {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_err = || CalendarError::Parse(s.to_string());
        let parts: Vec<&str> = s.trim().split(['-', '/']).collect();
        let [y, m, d] = parts.as_slice() else {
            return Err(parse_err());
        };
        let year = y.parse().map_err(|_| parse_err())?;
        let month = m.parse().map_err(|_| parse_err())?;
        let day = d.parse().map_err(|_| parse_err())?;
        Self::new(year, month, day)
    }
}

impl TryFrom<String> for JalaliDate {
    type Error = CalendarError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<JalaliDate> for String {
    fn from(date: JalaliDate) -> Self {
        date.to_string()
    }
}

/// Whether the Jalali year has a 30-day Esfand.
pub fn is_leap_year(year: i32) -> Result<bool, CalendarError> {
    Ok(jal_cal(year)?.leap == 0)
}

/// Number of days in a Jalali month.
pub fn days_in_month(year: i32, month: u32) -> Result<u32, CalendarError> {
    match month {
        1..=6 => {
            jal_cal(year)?;
            Ok(31)
        }
        7..=11 => {
            jal_cal(year)?;
            Ok(30)
        }
        12 => Ok(if is_leap_year(year)? { 30 } else { 29 }),
        other => Err(CalendarError::InvalidMonth(other)),
    }
}

struct YearInfo {
    /// Years since the last leap year; 0 means this year is leap.
    leap: i32,
    /// Gregorian year in which this Jalali year starts.
    gy: i32,
    /// Day of March on which Farvardin 1st falls.
    march: i32,
}

fn jal_cal(jy: i32) -> Result<YearInfo, CalendarError> {
    let last = BREAKS[BREAKS.len() - 1];
    if jy < BREAKS[0] || jy >= last {
        return Err(CalendarError::YearOutOfRange(jy));
    }

    let gy = jy + 621;
    let mut leap_j = -14;
    let mut jp = BREAKS[0];
    let mut jump = 0;
    for &jm in &BREAKS[1..] {
        jump = jm - jp;
        if jy < jm {
            break;
        }
        leap_j += jump / 33 * 8 + (jump % 33) / 4;
        jp = jm;
    }

    let mut n = jy - jp;
    leap_j += n / 33 * 8 + (n % 33 + 3) / 4;
    if jump % 33 == 4 && jump - n == 4 {
        leap_j += 1;
    }

    let leap_g = gy / 4 - (gy / 100 + 1) * 3 / 4 - 150;
    let march = 20 + leap_j - leap_g;

    if jump - n < 6 {
        n = n - jump + (jump + 4) / 33 * 33;
    }
    let mut leap = ((n + 1) % 33 - 1) % 4;
    if leap == -1 {
        leap = 4;
    }

    Ok(YearInfo { leap, gy, march })
}

fn farvardin_first(jy: i32) -> Result<i32, CalendarError> {
    let info = jal_cal(jy)?;
    march_day(info.gy, info.march).ok_or(CalendarError::YearOutOfRange(jy))
}

fn march_day(gy: i32, day: i32) -> Option<i32> {
    NaiveDate::from_ymd_opt(gy, 3, u32::try_from(day).ok()?).map(gregorian_to_jdn)
}

fn gregorian_to_jdn(date: NaiveDate) -> i32 {
    date.num_days_from_ce() + CE_TO_JDN
}

fn jdn_to_gregorian(jdn: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(jdn - CE_TO_JDN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jd(y: i32, m: u32, d: u32) -> JalaliDate {
        JalaliDate::new(y, m, d).unwrap()
    }

    fn gd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_known_conversions() {
        assert_eq!(jd(1400, 1, 1).to_gregorian().unwrap(), gd(2021, 3, 21));
        assert_eq!(jd(1399, 12, 30).to_gregorian().unwrap(), gd(2021, 3, 20));
        assert_eq!(jd(1388, 2, 31).to_gregorian().unwrap(), gd(2009, 5, 21));
        assert_eq!(jd(1400, 7, 5).to_gregorian().unwrap(), gd(2021, 9, 27));

        assert_eq!(JalaliDate::from_gregorian(gd(2021, 3, 21)).unwrap(), jd(1400, 1, 1));
        assert_eq!(JalaliDate::from_gregorian(gd(2009, 5, 22)).unwrap(), jd(1388, 3, 1));
    }

    #[test]
    fn test_leap_years() {
        assert!(is_leap_year(1399).unwrap());
        assert!(!is_leap_year(1400).unwrap());
        assert!(is_leap_year(1403).unwrap());
        assert!(!is_leap_year(1404).unwrap());
        assert_eq!(days_in_month(1399, 12).unwrap(), 30);
        assert_eq!(days_in_month(1400, 12).unwrap(), 29);
    }

    #[test]
    fn test_rejects_invalid_dates() {
        assert_eq!(JalaliDate::new(1400, 13, 1), Err(CalendarError::InvalidMonth(13)));
        assert!(JalaliDate::new(1400, 7, 31).is_err());
        assert!(JalaliDate::new(1400, 12, 30).is_err());
        assert!(JalaliDate::new(1400, 1, 0).is_err());
        assert_eq!(
            JalaliDate::new(4000, 1, 1),
            Err(CalendarError::YearOutOfRange(4000))
        );
    }

    #[test]
    fn test_next_day_rollover() {
        assert_eq!(jd(1388, 2, 31).next_day().unwrap(), jd(1388, 3, 1));
        assert_eq!(jd(1400, 6, 31).next_day().unwrap(), jd(1400, 7, 1));
        assert_eq!(jd(1399, 12, 29).next_day().unwrap(), jd(1399, 12, 30));
        assert_eq!(jd(1399, 12, 30).next_day().unwrap(), jd(1400, 1, 1));
        assert_eq!(jd(1400, 12, 29).next_day().unwrap(), jd(1401, 1, 1));
    }

    #[test]
    fn test_next_day_is_one_gregorian_day_later() {
        let mut date = jd(1388, 1, 1);
        let end = jd(1405, 1, 1);
        let mut steps = 0;
        while date < end {
            let next = date.next_day().unwrap();
            let g = date.to_gregorian().unwrap();
            assert_eq!(next.to_gregorian().unwrap(), g.succ_opt().unwrap(), "after {date}");
            assert_eq!(JalaliDate::from_gregorian(g).unwrap(), date);
            assert!(next > date);
            date = next;
            steps += 1;
        }
        assert_eq!(steps, (gd(2026, 3, 21) - gd(2009, 3, 21)).num_days());
    }

    #[test]
    fn test_year_lengths() {
        let count = |year: i32| {
            let mut date = jd(year, 1, 1);
            let mut days = 0;
            while date.year() == year {
                date = date.next_day().unwrap();
                days += 1;
            }
            days
        };
        assert_eq!(count(1399), 366);
        assert_eq!(count(1400), 365);
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("1400-07-05".parse::<JalaliDate>().unwrap(), jd(1400, 7, 5));
        assert_eq!("1403/3/1".parse::<JalaliDate>().unwrap(), jd(1403, 3, 1));
        assert_eq!(jd(1388, 2, 31).to_string(), "1388-02-31");
        assert!("1400-07".parse::<JalaliDate>().is_err());
        assert!("yesterday".parse::<JalaliDate>().is_err());
    }

    #[test]
    fn test_last_supported_day_has_no_successor() {
        let last_month_len = days_in_month(3177, 12).unwrap();
        assert!(jd(3177, 12, last_month_len).next_day().is_err());
    }
}
