//! Civil dates and business-day counting.
//!
//! A [`CivilDate`] is a calendar date pinned to 06:00 local time in the zone
//! of the instant it was derived from. Daylight-saving changes happen around
//! midnight or between 01:00 and 03:00, so a value anchored at 06:00 never
//! sits on a transition and stepping it forward by whole days stays on the
//! expected calendar date.

use chrono::{
  DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveTime, Offset, TimeZone, Weekday,
};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Local hour every civil date is anchored to.
const ANCHOR_HOUR: i64 = 6;

/// Step used to move to the next day. One hour more than a day so a 23-hour
/// DST day still crosses midnight.
const DAY_STEP_HOURS: i64 = 25;

/// A calendar date in a specific timezone, anchored at 06:00 local time.
///
/// Only read accessors are exposed; the wrapped instant cannot be moved off
/// its anchor.
#[derive(Debug, Clone)]
pub struct CivilDate<Tz: TimeZone> {
  instant: DateTime<Tz>,
}

/// Project an instant onto its local calendar date.
///
/// Shorthand for [`CivilDate::of`].
pub fn normalize<Tz: TimeZone>(instant: &DateTime<Tz>) -> CivilDate<Tz> {
  CivilDate::of(instant)
}

impl<Tz: TimeZone> CivilDate<Tz> {
  /// Truncate `instant` to its date in its own timezone and re-anchor it at
  /// 06:00 in that same timezone.
  pub fn of(instant: &DateTime<Tz>) -> Self {
    let tz = instant.timezone();
    Self {
      instant: anchor(&tz, instant.date_naive()),
    }
  }

  /// The following calendar day.
  pub fn next(&self) -> Self {
    Self::of(&(self.instant.clone() + Duration::hours(DAY_STEP_HOURS)))
  }

  /// Count the business days elapsed between `self` and `until`.
  ///
  /// Each step towards `until` counts once, and the cursor is pushed past
  /// Saturday and Sunday right after the step that reaches them, so a step
  /// from Friday lands on Monday. `until` may live in another timezone; it is
  /// shifted by the offset difference so both dates compare on the same
  /// local timeline. Returns 0 if `until` is not after `self`.
  ///
  /// A `self` that falls on a weekend is counted literally: the first step
  /// moves to the next day whatever it is.
  pub fn business_days_until<Tz2: TimeZone>(&self, until: &CivilDate<Tz2>) -> u32 {
    let start_offset = self.utc_offset_seconds();
    let until_offset = until.utc_offset_seconds();
    let aligned_until = until.instant.with_timezone(&self.instant.timezone())
      + Duration::seconds(i64::from(until_offset - start_offset));

    let mut days = 0;
    let mut cursor = self.clone();

    while cursor.instant < aligned_until {
      days += 1;
      cursor = cursor.next();

      if cursor.weekday() == Weekday::Sat {
        cursor = cursor.next();
      }
      if cursor.weekday() == Weekday::Sun {
        cursor = cursor.next();
      }
    }

    days
  }

  /// Local calendar date.
  pub fn date(&self) -> NaiveDate {
    self.instant.date_naive()
  }

  pub fn weekday(&self) -> Weekday {
    self.instant.weekday()
  }

  /// The anchored instant (06:00 local).
  #[allow(dead_code)]
  pub fn instant(&self) -> &DateTime<Tz> {
    &self.instant
  }

  /// Offset from UTC in seconds at this date's own instant.
  pub fn utc_offset_seconds(&self) -> i32 {
    self.instant.offset().fix().local_minus_utc()
  }
}

/// Build 06:00 on `date` in `tz`.
///
/// An ambiguous 06:00 resolves to the earlier instant. If 06:00 does not
/// exist that day, the first valid local time after it is used.
fn anchor<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Tz> {
  let target = date.and_time(NaiveTime::MIN) + Duration::hours(ANCHOR_HOUR);
  let mut local = target;

  for _ in 0..96 {
    match tz.from_local_datetime(&local) {
      LocalResult::Single(dt) => return dt,
      LocalResult::Ambiguous(earliest, _) => return earliest,
      LocalResult::None => local += Duration::minutes(15),
    }
  }

  // Only reachable for a zone that skips a whole day of local time after
  // 06:00, which no tz database zone does. The result is then 06:00 UTC and
  // no longer 06:00 local.
  tz.from_utc_datetime(&target)
}

impl<Tz: TimeZone> PartialEq for CivilDate<Tz> {
  fn eq(&self, other: &Self) -> bool {
    self.instant == other.instant
  }
}

impl<Tz: TimeZone> Eq for CivilDate<Tz> {}

impl<Tz: TimeZone> PartialOrd for CivilDate<Tz> {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl<Tz: TimeZone> Ord for CivilDate<Tz> {
  fn cmp(&self, other: &Self) -> Ordering {
    self.instant.cmp(&other.instant)
  }
}

impl<Tz: TimeZone> Hash for CivilDate<Tz> {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.instant.hash(state);
  }
}

impl<Tz: TimeZone> fmt::Display for CivilDate<Tz> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.date().format("%Y-%m-%d"))
  }
}
