use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  Duration,
  Months,
  NaiveDate,
  NaiveDateTime,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;

const TIMEZONE_ENV_VAR: &str =
  "PLAINPICKER_TIMEZONE";

const DAYS_IN_MONTH: [u32; 12] = [
  31, 28, 31, 30, 31, 30, 31, 31, 30,
  31, 30, 31
];

/// Gregorian leap year rule.
#[must_use]
pub fn is_leap_year(year: i32) -> bool {
  year % 4 == 0 && year % 100 != 0
    || year % 400 == 0
}

/// Number of days in `month` (0-based)
/// of `year`. Out of range months are
/// normalized first.
#[must_use]
pub fn days_in_month(
  year: i32,
  month: i32
) -> u32 {
  let (year, month) =
    adjust_calendar(year, month);
  if month == 1 && is_leap_year(year) {
    29
  } else {
    DAYS_IN_MONTH[month as usize]
  }
}

/// Folds an arbitrary month offset back
/// into `[0, 11]`, carrying whole years
/// in one step.
///
/// `year * 12 + month` is preserved
/// unless the year saturates.
#[must_use]
pub fn adjust_calendar(
  year: i32,
  month: i32
) -> (i32, i32) {
  (
    year.saturating_add(
      month.div_euclid(12)
    ),
    month.rem_euclid(12)
  )
}

/// Builds a date from a 0-based month.
#[must_use]
pub fn month_date(
  year: i32,
  month: i32,
  day: u32
) -> Option<NaiveDate> {
  let (year, month) =
    adjust_calendar(year, month);
  NaiveDate::from_ymd_opt(
    year,
    month as u32 + 1,
    day
  )
}

#[must_use]
pub fn start_of_day(
  value: NaiveDateTime
) -> NaiveDate {
  value.date()
}

#[must_use]
pub fn add_days(
  date: NaiveDate,
  days: i64
) -> NaiveDate {
  date
    .checked_add_signed(Duration::days(
      days
    ))
    .unwrap_or(date)
}

/// Sunday is 0.
#[must_use]
pub fn weekday_index(
  date: NaiveDate
) -> u32 {
  date.weekday().num_days_from_sunday()
}

#[must_use]
pub fn is_weekend(
  date: NaiveDate
) -> bool {
  matches!(
    date.weekday(),
    Weekday::Sat | Weekday::Sun
  )
}

/// Week of year counted from January 1
/// of `year`, including the partial
/// first week.
#[must_use]
pub fn week_number(
  date: NaiveDate,
  year: i32
) -> i32 {
  let Some(jan1) =
    NaiveDate::from_ymd_opt(year, 1, 1)
  else {
    return 0;
  };
  let days =
    date.signed_duration_since(jan1)
      .num_days();
  let offset =
    weekday_index(jan1) as i64 + 1;
  ((days + offset) as f64 / 7.0).ceil()
    as i32
}

#[must_use]
pub fn format_date(
  date: NaiveDate,
  format: &str
) -> String {
  date.format(format).to_string()
}

/// Parses `input` with the picker's
/// display format.
#[must_use]
pub fn parse_with_format(
  input: &str,
  format: &str
) -> Option<NaiveDate> {
  let token = input.trim();
  if token.is_empty() {
    return None;
  }
  NaiveDate::parse_from_str(
    token, format
  )
  .ok()
  .or_else(|| {
    NaiveDateTime::parse_from_str(
      token, format
    )
    .ok()
    .map(start_of_day)
  })
}

/// Resolves the timezone used for
/// "today": explicit value, then the
/// environment, then UTC.
pub fn resolve_timezone(
  configured: Option<&str>
) -> Tz {
  if let Some(raw) = configured
    && let Some(tz) =
      parse_timezone(raw, "options")
  {
    return tz;
  }

  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) =
      parse_timezone(&raw, TIMEZONE_ENV_VAR)
  {
    return tz;
  }

  chrono_tz::UTC
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::debug!(
        source,
        timezone = %trimmed,
        "configured picker timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

#[must_use]
pub fn today_in(tz: Tz) -> NaiveDate {
  Utc::now()
    .with_timezone(&tz)
    .date_naive()
}

/// Parses a free-form date expression
/// relative to `today`. The result is
/// always a start-of-day date.
#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_date_expr(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "today" | "now" => {
      return Ok(today);
    }
    | "tomorrow" => {
      return Ok(add_days(today, 1));
    }
    | "yesterday" => {
      return Ok(add_days(today, -1));
    }
    | _ => {}
  }

  if token.len() == 4
    && token
      .chars()
      .all(|c| c.is_ascii_digit())
  {
    let year: i32 =
      token.parse().context(
        "invalid 4-digit year"
      )?;
    return NaiveDate::from_ymd_opt(
      year, 1, 1
    )
    .ok_or_else(|| {
      anyhow!(
        "invalid year value: {year}"
      )
    });
  }

  if let Some(target_weekday) =
    parse_weekday_name(&lower)
  {
    return Ok(next_weekday_date(
      today,
      target_weekday
    ));
  }

  if let Some(target_month) =
    parse_month_name(&lower)
  {
    let mut year = today.year();
    if target_month <= today.month() {
      year = year.saturating_add(1);
    }
    return NaiveDate::from_ymd_opt(
      year,
      target_month,
      1
    )
    .ok_or_else(|| {
      anyhow!(
        "invalid month/year \
         candidate"
      )
    });
  }

  let rel_re = Regex::new(r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dwmy])$")
        .map_err(|e| anyhow!("internal regex compile failure: {e}"))?;

  if let Some(caps) =
    rel_re.captures(&lower)
  {
    let negative = caps
      .name("sign")
      .is_some_and(|m| m.as_str() == "-");
    let num: u32 = caps
      .name("num")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!(
          "missing relative amount"
        )
      })?
      .parse()
      .context(
        "invalid relative number"
      )?;
    let unit = caps
      .name("unit")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!("missing relative unit")
      })?;

    return shift_relative(
      today, negative, num, unit
    )
    .ok_or_else(|| {
      anyhow!(
        "relative date out of range: \
         {input}"
      )
    });
  }

  for fmt in ["%Y-%m-%d", "%Y%m%d"] {
    if let Ok(date) =
      NaiveDate::parse_from_str(
        token, fmt
      )
    {
      return Ok(date);
    }
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(token)
  {
    return Ok(dt.date_naive());
  }

  for fmt in
    ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
  {
    if let Ok(ndt) =
      NaiveDateTime::parse_from_str(
        token, fmt
      )
    {
      return Ok(start_of_day(ndt));
    }
  }

  Err(anyhow!(
    "unrecognized date expression: \
     {input}"
  ))
  .with_context(|| {
    "supported formats: \
     today/tomorrow/yesterday, \
     4-digit year, weekday names (e.g. \
     monday), month names (e.g. \
     march), +Nd/+Nw/+Nm/+Ny, \
     YYYY-MM-DD, YYYYMMDD, RFC3339, \
     YYYY-MM-DDTHH:MM, YYYY-MM-DD HH:MM"
  })
}

fn shift_relative(
  today: NaiveDate,
  negative: bool,
  num: u32,
  unit: &str
) -> Option<NaiveDate> {
  let days = match unit {
    | "d" => i64::from(num),
    | "w" => i64::from(num) * 7,
    | "m" | "y" => {
      let months = if unit == "y" {
        num.checked_mul(12)?
      } else {
        num
      };
      return if negative {
        today.checked_sub_months(
          Months::new(months)
        )
      } else {
        today.checked_add_months(
          Months::new(months)
        )
      };
    }
    | _ => return None
  };
  today.checked_add_signed(
    Duration::days(if negative {
      -days
    } else {
      days
    })
  )
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token.trim() {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

fn next_weekday_date(
  from: NaiveDate,
  target: Weekday
) -> NaiveDate {
  let from_idx = from
    .weekday()
    .num_days_from_monday()
    as i64;
  let target_idx = target
    .num_days_from_monday()
    as i64;
  let mut delta =
    (7 + target_idx - from_idx) % 7;
  if delta == 0 {
    delta = 7;
  }
  add_days(from, delta)
}

fn parse_month_name(
  token: &str
) -> Option<u32> {
  match token.trim() {
    | "january" | "jan" => Some(1),
    | "february" | "feb" => Some(2),
    | "march" | "mar" => Some(3),
    | "april" | "apr" => Some(4),
    | "may" => Some(5),
    | "june" | "jun" => Some(6),
    | "july" | "jul" => Some(7),
    | "august" | "aug" => Some(8),
    | "september" | "sep" | "sept" => {
      Some(9)
    }
    | "october" | "oct" => Some(10),
    | "november" | "nov" => Some(11),
    | "december" | "dec" => Some(12),
    | _ => None
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::{
    adjust_calendar,
    days_in_month,
    is_leap_year,
    month_date,
    parse_date_expr,
    parse_with_format,
    week_number
  };

  fn ymd(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  #[test]
  fn adjust_calendar_preserves_absolute_month()
   {
    for month in -1000..=1000 {
      let (year, normalized) =
        adjust_calendar(2000, month);
      assert!(
        (0..=11).contains(&normalized),
        "month {month} -> {normalized}"
      );
      assert_eq!(
        year * 12 + normalized,
        2000 * 12 + month
      );
    }
  }

  #[test]
  fn adjust_calendar_jumps_multiple_years()
   {
    assert_eq!(
      adjust_calendar(2021, -25),
      (2018, 11)
    );
    assert_eq!(
      adjust_calendar(2021, -12),
      (2020, 0)
    );
    assert_eq!(
      adjust_calendar(2021, 12),
      (2022, 0)
    );
    assert_eq!(
      adjust_calendar(2021, 35),
      (2023, 11)
    );
  }

  #[test]
  fn adjust_calendar_saturates_at_extremes()
  {
    assert_eq!(
      adjust_calendar(2021, i32::MIN),
      (2021 - 178_956_971, 4)
    );
    assert_eq!(
      adjust_calendar(i32::MAX, 12),
      (i32::MAX, 0)
    );
    assert_eq!(
      adjust_calendar(i32::MIN, -1),
      (i32::MIN, 11)
    );
    assert_eq!(
      month_date(i32::MAX, 0, 1),
      None
    );
  }

  #[test]
  fn leap_years_match_february_length()
   {
    for year in 1890..2110 {
      let feb = ymd(year, 3, 1)
        .pred_opt()
        .expect("last day of feb");
      assert_eq!(
        is_leap_year(year),
        feb.format("%d").to_string()
          == "29"
      );
      assert_eq!(
        days_in_month(year, 1),
        if is_leap_year(year) {
          29
        } else {
          28
        }
      );
    }
  }

  #[test]
  fn parses_relative_and_named_dates()
   {
    let today = ymd(2021, 6, 15);
    assert_eq!(
      parse_date_expr("+3d", today)
        .expect("relative days"),
      ymd(2021, 6, 18)
    );
    assert_eq!(
      parse_date_expr("-1m", today)
        .expect("relative months"),
      ymd(2021, 5, 15)
    );
    assert_eq!(
      parse_date_expr("march", today)
        .expect("month name"),
      ymd(2022, 3, 1)
    );
    assert_eq!(
      parse_date_expr("friday", today)
        .expect("weekday name"),
      ymd(2021, 6, 18)
    );
    assert_eq!(
      parse_date_expr(
        "2021-08-03 17:45",
        today
      )
      .expect("datetime"),
      ymd(2021, 8, 3)
    );
    assert!(
      parse_date_expr("soon", today)
        .is_err()
    );
  }

  #[test]
  fn parses_display_format() {
    assert_eq!(
      parse_with_format(
        "03/08/2021",
        "%d/%m/%Y"
      ),
      Some(ymd(2021, 8, 3))
    );
    assert_eq!(
      parse_with_format("", "%Y-%m-%d"),
      None
    );
  }

  #[test]
  fn week_number_counts_partial_first_week()
   {
    // 2021-01-01 is a Friday.
    assert_eq!(
      week_number(ymd(2021, 1, 1), 2021),
      1
    );
    assert_eq!(
      week_number(ymd(2021, 1, 2), 2021),
      1
    );
    assert_eq!(
      week_number(ymd(2021, 1, 3), 2021),
      2
    );
  }
}
