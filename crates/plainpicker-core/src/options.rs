use std::path::Path;

use anyhow::{
  Context,
  anyhow
};
use chrono::NaiveDate;
use serde::{
  Deserialize,
  Serialize
};
use tracing::{
  debug,
  warn
};

use crate::config::{
  Config,
  expand_tilde
};
use crate::datetime::parse_date_expr;
use crate::i18n::{
  I18n,
  I18nPatch
};

pub const DEFAULT_YEAR_RANGE: u32 = 10;
pub const MAX_YEAR_RANGE: u32 = 100;
pub const MAX_NUMBER_OF_MONTHS: u32 = 4;

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum MainCalendar {
  #[default]
  Left,
  Right
}

impl std::str::FromStr for MainCalendar {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "left" => Ok(Self::Left),
      | "right" => Ok(Self::Right),
      | other => {
        Err(anyhow!(
          "main calendar must be left \
           or right, got: {other}"
        ))
      }
    }
  }
}

/// Years offered by the title bar year
/// select.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(untagged)]
pub enum YearRange {
  /// `year - n ..= year + n`
  Span(u32),
  /// Fixed inclusive span.
  Between(i32, i32)
}

impl Default for YearRange {
  fn default() -> Self {
    Self::Span(DEFAULT_YEAR_RANGE)
  }
}

impl YearRange {
  fn sanitized(self) -> Self {
    match self {
      | Self::Span(0) => Self::default(),
      | Self::Span(n) => {
        Self::Span(n.min(MAX_YEAR_RANGE))
      }
      | Self::Between(from, to)
        if to < from =>
      {
        Self::Between(to, from)
      }
      | other => other
    }
  }
}

impl std::str::FromStr for YearRange {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    if let Some((from, to)) =
      s.split_once(',')
    {
      let from = from
        .trim()
        .parse::<i32>()
        .context("invalid year range start")?;
      let to = to
        .trim()
        .parse::<i32>()
        .context("invalid year range end")?;
      return Ok(Self::Between(from, to));
    }

    let span = s
      .trim()
      .parse::<i64>()
      .context("invalid year range")?;
    Ok(Self::Span(
      u32::try_from(span.unsigned_abs())
        .unwrap_or(MAX_YEAR_RANGE)
    ))
  }
}

/// Optional lower and upper selectable
/// dates.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
)]
pub struct Bounds {
  pub min_date: Option<NaiveDate>,
  pub max_date: Option<NaiveDate>
}

impl Bounds {
  /// Inconsistent bounds (`max < min`)
  /// collapse to unbounded.
  #[must_use]
  pub fn new(
    min_date: Option<NaiveDate>,
    max_date: Option<NaiveDate>
  ) -> Self {
    if let (Some(min), Some(max)) =
      (min_date, max_date)
      && max < min
    {
      warn!(
        %min,
        %max,
        "max date precedes min date; \
         clearing both bounds"
      );
      return Self::default();
    }
    Self { min_date, max_date }
  }

  #[must_use]
  pub fn contains(
    &self,
    date: NaiveDate
  ) -> bool {
    self
      .min_date
      .is_none_or(|min| date >= min)
      && self
        .max_date
        .is_none_or(|max| date <= max)
  }

  #[must_use]
  pub fn clamp(
    &self,
    date: NaiveDate
  ) -> NaiveDate {
    match (self.min_date, self.max_date)
    {
      | (Some(min), _) if date < min => {
        min
      }
      | (_, Some(max)) if date > max => {
        max
      }
      | _ => date
    }
  }

  /// The tighter of both bounds on each
  /// side, or `None` when no date
  /// satisfies both.
  #[must_use]
  pub fn intersect(
    &self,
    other: &Bounds
  ) -> Option<Bounds> {
    let min_date =
      match (self.min_date, other.min_date)
      {
        | (Some(a), Some(b)) => {
          Some(a.max(b))
        }
        | (a, b) => a.or(b)
      };
    let max_date =
      match (self.max_date, other.max_date)
      {
        | (Some(a), Some(b)) => {
          Some(a.min(b))
        }
        | (a, b) => a.or(b)
      };
    match (min_date, max_date) {
      | (Some(min), Some(max))
        if max < min =>
      {
        None
      }
      | _ => {
        Some(Bounds { min_date, max_date })
      }
    }
  }
}

/// Fully resolved picker configuration.
///
/// Built from [`PickerOptions::default`]
/// and an [`OptionsPatch`]; every
/// instance owns its own copy.
#[derive(Debug, Clone, PartialEq)]
pub struct PickerOptions {
  /// Initial text of the bound field,
  /// `None` when no field is attached.
  pub field: Option<String>,
  pub bound: bool,
  pub format: String,
  pub default_date: Option<NaiveDate>,
  pub set_default_date: bool,
  /// First column of the week, Sunday
  /// is 0.
  pub first_day: u32,
  pub min_date: Option<NaiveDate>,
  pub max_date: Option<NaiveDate>,
  pub year_range: YearRange,
  pub show_week_number: bool,
  pub pick_whole_week: bool,
  pub disable_weekends: bool,
  pub range_select: bool,
  pub number_of_months: u32,
  pub main_calendar: MainCalendar,
  pub show_days_in_adjacent_months: bool,
  pub enable_selection_days_in_adjacent_months:
    bool,
  pub show_month_after_year: bool,
  pub year_suffix: String,
  pub is_rtl: bool,
  pub events: Vec<NaiveDate>,
  pub i18n: I18n,
  pub timezone: Option<String>,
  pub coalesce_draws: bool,
  pub theme: Option<String>
}

impl Default for PickerOptions {
  fn default() -> Self {
    Self {
      field: None,
      bound: false,
      format: "%Y-%m-%d".to_string(),
      default_date: None,
      set_default_date: false,
      first_day: 0,
      min_date: None,
      max_date: None,
      year_range: YearRange::default(),
      show_week_number: false,
      pick_whole_week: false,
      disable_weekends: false,
      range_select: false,
      number_of_months: 1,
      main_calendar: MainCalendar::Left,
      show_days_in_adjacent_months:
        false,
      enable_selection_days_in_adjacent_months:
        false,
      show_month_after_year: false,
      year_suffix: String::new(),
      is_rtl: false,
      events: Vec::new(),
      i18n: I18n::default(),
      timezone: None,
      coalesce_draws: false,
      theme: None
    }
  }
}

/// Caller supplied overrides. Unset
/// fields keep the base value.
#[derive(
  Debug,
  Clone,
  Default,
  PartialEq,
  Serialize,
  Deserialize,
)]
#[serde(default)]
pub struct OptionsPatch {
  pub field: Option<String>,
  pub bound: Option<bool>,
  pub format: Option<String>,
  pub default_date: Option<NaiveDate>,
  pub set_default_date: Option<bool>,
  pub first_day: Option<i64>,
  pub min_date: Option<NaiveDate>,
  pub max_date: Option<NaiveDate>,
  pub year_range: Option<YearRange>,
  pub show_week_number: Option<bool>,
  pub pick_whole_week: Option<bool>,
  pub disable_weekends: Option<bool>,
  pub range_select: Option<bool>,
  pub number_of_months: Option<u32>,
  pub main_calendar: Option<MainCalendar>,
  pub show_days_in_adjacent_months:
    Option<bool>,
  pub enable_selection_days_in_adjacent_months:
    Option<bool>,
  pub show_month_after_year:
    Option<bool>,
  pub year_suffix: Option<String>,
  pub is_rtl: Option<bool>,
  pub events: Option<Vec<NaiveDate>>,
  pub i18n: Option<I18nPatch>,
  pub timezone: Option<String>,
  pub coalesce_draws: Option<bool>,
  pub theme: Option<String>
}

macro_rules! apply_field {
  ($out:ident, $patch:ident, $($name:ident),+ $(,)?) => {
    $(
      if let Some(value) = &$patch.$name {
        $out.$name = value.clone();
      }
    )+
  };
}

impl PickerOptions {
  /// Returns a new options value with
  /// `patch` applied and sanitized.
  /// Neither input is modified.
  #[must_use]
  pub fn merged(
    &self,
    patch: &OptionsPatch
  ) -> Self {
    let mut out = self.clone();

    apply_field!(
      out,
      patch,
      format,
      set_default_date,
      year_range,
      show_week_number,
      pick_whole_week,
      disable_weekends,
      range_select,
      number_of_months,
      main_calendar,
      show_days_in_adjacent_months,
      enable_selection_days_in_adjacent_months,
      show_month_after_year,
      year_suffix,
      is_rtl,
      events,
      coalesce_draws,
    );

    if patch.field.is_some() {
      out.field = patch.field.clone();
    }
    out.bound = patch.bound.unwrap_or(
      if patch.field.is_some() {
        true
      } else {
        self.bound
      }
    );
    if patch.default_date.is_some() {
      out.default_date = patch.default_date;
    }
    if patch.min_date.is_some() {
      out.min_date = patch.min_date;
    }
    if patch.max_date.is_some() {
      out.max_date = patch.max_date;
    }
    if let Some(first_day) =
      patch.first_day
    {
      out.first_day =
        first_day.rem_euclid(7) as u32;
    }
    if patch.timezone.is_some() {
      out.timezone = patch.timezone.clone();
    }
    if patch.theme.is_some() {
      out.theme = patch.theme.clone();
    }
    if let Some(i18n) = &patch.i18n {
      out.i18n = out.i18n.merged(i18n);
    }

    out.sanitize();
    out
  }

  fn sanitize(&mut self) {
    if self.format.trim().is_empty() {
      self.format =
        PickerOptions::default().format;
    }
    self.year_range =
      self.year_range.sanitized();
    self.number_of_months = self
      .number_of_months
      .clamp(1, MAX_NUMBER_OF_MONTHS);

    let bounds = Bounds::new(
      self.min_date,
      self.max_date
    );
    self.min_date = bounds.min_date;
    self.max_date = bounds.max_date;
  }

  #[must_use]
  pub fn bounds(&self) -> Bounds {
    Bounds {
      min_date: self.min_date,
      max_date: self.max_date
    }
  }
}

impl OptionsPatch {
  /// Maps `picker.*` and `i18n.*` keys
  /// of a loaded [`Config`] onto a patch.
  #[tracing::instrument(skip(cfg, today))]
  pub fn from_config(
    cfg: &Config,
    today: NaiveDate
  ) -> anyhow::Result<Self> {
    let date = |key: &str| {
      cfg
        .get(key)
        .filter(|v| !v.trim().is_empty())
        .map(|raw| {
          parse_date_expr(&raw, today)
            .with_context(|| {
              format!(
                "invalid date for {key}"
              )
            })
        })
        .transpose()
    };

    let mut patch = OptionsPatch {
      field: cfg.get("picker.field"),
      bound: cfg
        .get_bool("picker.bound"),
      format: cfg.get("picker.format"),
      default_date: date(
        "picker.default_date"
      )?,
      set_default_date: cfg.get_bool(
        "picker.set_default_date"
      ),
      first_day: parse_opt(
        cfg,
        "picker.first_day"
      )?,
      min_date: date(
        "picker.min_date"
      )?,
      max_date: date(
        "picker.max_date"
      )?,
      year_range: parse_opt(
        cfg,
        "picker.year_range"
      )?,
      show_week_number: cfg.get_bool(
        "picker.show_week_number"
      ),
      pick_whole_week: cfg.get_bool(
        "picker.pick_whole_week"
      ),
      disable_weekends: cfg.get_bool(
        "picker.disable_weekends"
      ),
      range_select: cfg.get_bool(
        "picker.range_select"
      ),
      number_of_months: parse_opt(
        cfg,
        "picker.number_of_months"
      )?,
      main_calendar: parse_opt(
        cfg,
        "picker.main_calendar"
      )?,
      show_days_in_adjacent_months: cfg
        .get_bool(
          "picker.show_days_in_adjacent_months"
        ),
      enable_selection_days_in_adjacent_months:
        cfg.get_bool(
          "picker.enable_selection_days_in_adjacent_months"
        ),
      show_month_after_year: cfg
        .get_bool(
          "picker.show_month_after_year"
        ),
      year_suffix: cfg
        .get("picker.year_suffix"),
      is_rtl: cfg
        .get_bool("picker.is_rtl"),
      events: None,
      i18n: None,
      timezone: cfg
        .get("picker.timezone"),
      coalesce_draws: cfg.get_bool(
        "picker.coalesce_draws"
      ),
      theme: cfg.get("picker.theme")
    };

    if let Some(raw) =
      cfg.get("picker.events")
    {
      let mut events = Vec::new();
      for item in raw
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
      {
        events.push(
          parse_date_expr(item, today)
            .with_context(|| {
              format!(
                "invalid event date \
                 {item}"
              )
            })?
        );
      }
      patch.events = Some(events);
    }

    patch.i18n = i18n_from_config(cfg)?;

    debug!(?patch, "options patch from config");
    Ok(patch)
  }
}

fn i18n_from_config(
  cfg: &Config
) -> anyhow::Result<Option<I18nPatch>> {
  let mut patch =
    if let Some(file) =
      cfg.get("i18n.file")
    {
      let loaded =
        I18n::load_toml(&expand_tilde(
          Path::new(&file)
        ))?;
      I18nPatch {
        previous_month: Some(
          loaded.previous_month
        ),
        next_month: Some(
          loaded.next_month
        ),
        months: Some(loaded.months),
        weekdays: Some(loaded.weekdays),
        weekdays_short: Some(
          loaded.weekdays_short
        )
      }
    } else {
      I18nPatch::default()
    };

  if let Some(value) =
    cfg.get("i18n.previous_month")
  {
    patch.previous_month = Some(value);
  }
  if let Some(value) =
    cfg.get("i18n.next_month")
  {
    patch.next_month = Some(value);
  }

  if patch == I18nPatch::default() {
    Ok(None)
  } else {
    Ok(Some(patch))
  }
}

fn parse_opt<T>(
  cfg: &Config,
  key: &str
) -> anyhow::Result<Option<T>>
where
  T: std::str::FromStr,
  T::Err: std::fmt::Display
{
  cfg
    .get(key)
    .map(|raw| {
      raw.trim().parse::<T>().map_err(
        |err| {
          anyhow!(
            "invalid value for {key}: \
             {raw} ({err})"
          )
        }
      )
    })
    .transpose()
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::{
    Bounds,
    MainCalendar,
    OptionsPatch,
    PickerOptions,
    YearRange
  };
  use crate::config::Config;

  fn ymd(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  #[test]
  fn merge_leaves_defaults_untouched() {
    let defaults =
      PickerOptions::default();
    let patch = OptionsPatch {
      first_day: Some(8),
      number_of_months: Some(9),
      year_range: Some(YearRange::Span(
        500
      )),
      ..OptionsPatch::default()
    };
    let merged = defaults.merged(&patch);

    assert_eq!(merged.first_day, 1);
    assert_eq!(merged.number_of_months, 4);
    assert_eq!(
      merged.year_range,
      YearRange::Span(100)
    );
    assert_eq!(
      defaults,
      PickerOptions::default()
    );
  }

  #[test]
  fn field_implies_bound_unless_overridden()
   {
    let base = PickerOptions::default();
    let with_field =
      base.merged(&OptionsPatch {
        field: Some(String::new()),
        ..OptionsPatch::default()
      });
    assert!(with_field.bound);

    let unbound =
      base.merged(&OptionsPatch {
        field: Some(String::new()),
        bound: Some(false),
        ..OptionsPatch::default()
      });
    assert!(!unbound.bound);
  }

  #[test]
  fn inconsistent_bounds_are_cleared() {
    let merged = PickerOptions::default()
      .merged(&OptionsPatch {
        min_date: Some(ymd(2020, 2, 1)),
        max_date: Some(ymd(2020, 1, 1)),
        ..OptionsPatch::default()
      });
    assert_eq!(merged.min_date, None);
    assert_eq!(merged.max_date, None);
  }

  #[test]
  fn bounds_clamp_and_intersect() {
    let bounds = Bounds::new(
      Some(ymd(2020, 1, 10)),
      Some(ymd(2020, 1, 20))
    );
    assert_eq!(
      bounds.clamp(ymd(2020, 1, 5)),
      ymd(2020, 1, 10)
    );
    assert_eq!(
      bounds.clamp(ymd(2020, 1, 25)),
      ymd(2020, 1, 20)
    );
    assert!(
      bounds.contains(ymd(2020, 1, 15))
    );

    let other = Bounds::new(
      Some(ymd(2020, 1, 12)),
      None
    );
    assert_eq!(
      bounds.intersect(&other),
      Some(Bounds::new(
        Some(ymd(2020, 1, 12)),
        Some(ymd(2020, 1, 20))
      ))
    );

    let later = Bounds::new(
      Some(ymd(2020, 2, 1)),
      None
    );
    assert_eq!(
      bounds.intersect(&later),
      None
    );
  }

  #[test]
  fn parses_year_range_forms() {
    assert_eq!(
      "-15"
        .parse::<YearRange>()
        .expect("span"),
      YearRange::Span(15)
    );
    assert_eq!(
      "1990, 2030"
        .parse::<YearRange>()
        .expect("between"),
      YearRange::Between(1990, 2030)
    );
    assert!(
      "soon".parse::<YearRange>().is_err()
    );
  }

  #[test]
  fn reads_picker_keys_from_config() {
    let mut cfg = Config::default();
    cfg.set("picker.first_day", "8");
    cfg.set(
      "picker.main_calendar",
      "right"
    );
    cfg.set(
      "picker.max_date",
      "+1m"
    );
    cfg.set(
      "picker.events",
      "2021-08-12, tomorrow"
    );
    cfg.set("picker.is_rtl", "yes");
    cfg.set(
      "i18n.next_month",
      "Weiter"
    );

    let today = ymd(2021, 8, 10);
    let patch =
      OptionsPatch::from_config(
        &cfg, today
      )
      .expect("patch");
    let opts = PickerOptions::default()
      .merged(&patch);

    assert_eq!(opts.first_day, 1);
    assert_eq!(
      opts.main_calendar,
      MainCalendar::Right
    );
    assert_eq!(
      opts.max_date,
      Some(ymd(2021, 9, 10))
    );
    assert_eq!(
      opts.events,
      vec![
        ymd(2021, 8, 12),
        ymd(2021, 8, 11)
      ]
    );
    assert!(opts.is_rtl);
    assert_eq!(
      opts.i18n.next_month,
      "Weiter"
    );

    cfg.set(
      "picker.number_of_months",
      "many"
    );
    assert!(
      OptionsPatch::from_config(
        &cfg, today
      )
      .is_err()
    );
  }
}
