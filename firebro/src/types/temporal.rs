//! Engine date and time words.
//!
//! Date is days since 1858-11-17, time is 1/10000 second ticks since midnight.
use time::{Date, Duration, PrimitiveDateTime, Time};

use super::ConversionError;

pub(crate) const TICKS_PER_SECOND: u32 = 10_000;
const NANOS_PER_TICK: u32 = 100_000;

const ENGINE_EPOCH: Date = {
    // source: `from_julian_day` docs, 2_451_545 is 2000-01-01
    match Date::from_julian_day(2_400_001) {
        Ok(ok) => ok,
        Err(_) => panic!("engine epoch out of range"),
    }
};

/// Encode date as days since engine epoch.
pub fn encode_date(date: Date) -> i32 {
    date.to_julian_day() - ENGINE_EPOCH.to_julian_day()
}

/// Decode days since engine epoch.
pub fn decode_date(days: i32) -> Result<Date, ConversionError> {
    ENGINE_EPOCH
        .to_julian_day()
        .checked_add(days)
        .and_then(|day| Date::from_julian_day(day).ok())
        .ok_or(ConversionError::DateRange)
}

/// Encode time as ticks since midnight.
pub fn encode_time(time: Time) -> u32 {
    let (h, m, s, nano) = time.as_hms_nano();
    let seconds = (h as u32 * 60 + m as u32) * 60 + s as u32;
    seconds * TICKS_PER_SECOND + nano / NANOS_PER_TICK
}

/// Decode ticks since midnight, wrapping past one day.
pub fn decode_time(ticks: u32) -> Time {
    Time::MIDNIGHT + Duration::microseconds(ticks as i64 * 100)
}

pub(crate) fn encode_timestamp(ts: PrimitiveDateTime) -> (i32, u32) {
    (encode_date(ts.date()), encode_time(ts.time()))
}

pub(crate) fn decode_timestamp(days: i32, ticks: u32) -> Result<PrimitiveDateTime, ConversionError> {
    Ok(PrimitiveDateTime::new(decode_date(days)?, decode_time(ticks)))
}

#[cfg(test)]
mod test {
    use super::*;
    use time::Month;

    #[test]
    fn epoch() {
        let epoch = Date::from_calendar_date(1858, Month::November, 17).unwrap();
        assert_eq!(encode_date(epoch), 0);
        assert_eq!(decode_date(0).unwrap(), epoch);

        let y2k = Date::from_calendar_date(2000, Month::January, 1).unwrap();
        assert_eq!(encode_date(y2k), 51544);
        assert_eq!(decode_date(-1).unwrap(), epoch.previous_day().unwrap());
    }

    #[test]
    fn ticks() {
        let t = Time::from_hms_milli(13, 45, 30, 250).unwrap();
        let ticks = encode_time(t);
        assert_eq!(ticks, (13 * 3600 + 45 * 60 + 30) * 10_000 + 2_500);
        assert_eq!(decode_time(ticks), t);
    }

    #[test]
    fn out_of_range() {
        assert!(decode_date(i32::MAX).is_err());
    }
}
