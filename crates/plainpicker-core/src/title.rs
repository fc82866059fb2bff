use chrono::{
  Datelike,
  NaiveDate
};
use serde::Serialize;

use crate::grid::CalendarPane;
use crate::options::{
  PickerOptions,
  YearRange
};

pub const DEFAULT_MIN_YEAR: i32 = 0;
pub const DEFAULT_MAX_YEAR: i32 = 9999;

/// Navigation limits derived from the
/// min/max dates.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub struct NavLimits {
  pub min_year:  i32,
  pub min_month: Option<i32>,
  pub max_year:  i32,
  pub max_month: Option<i32>
}

impl Default for NavLimits {
  fn default() -> Self {
    Self {
      min_year:  DEFAULT_MIN_YEAR,
      min_month: None,
      max_year:  DEFAULT_MAX_YEAR,
      max_month: None
    }
  }
}

impl NavLimits {
  pub fn set_min(
    &mut self,
    date: NaiveDate
  ) {
    self.min_year = date.year();
    self.min_month =
      Some(date.month0() as i32);
  }

  pub fn set_max(
    &mut self,
    date: NaiveDate
  ) {
    self.max_year = date.year();
    self.max_month =
      Some(date.month0() as i32);
  }

  pub fn clear_min(&mut self) {
    self.min_year = DEFAULT_MIN_YEAR;
    self.min_month = None;
  }

  pub fn clear_max(&mut self) {
    self.max_year = DEFAULT_MAX_YEAR;
    self.max_month = None;
  }
}

#[derive(
  Debug, Clone, PartialEq, Eq, Serialize,
)]
pub struct SelectOption {
  pub value:    i32,
  pub label:    String,
  pub selected: bool,
  pub disabled: bool
}

#[derive(
  Debug, Clone, PartialEq, Eq, Serialize,
)]
pub struct TitleBar {
  pub pane: CalendarPane,
  pub month_label: String,
  pub year_label: String,
  pub months: Vec<SelectOption>,
  pub years: Vec<SelectOption>,
  pub show_month_after_year: bool,
  /// `None` when this pane carries no
  /// previous control; `Some(false)`
  /// when it is disabled.
  pub prev_enabled: Option<bool>,
  pub next_enabled: Option<bool>,
  pub prev_label: String,
  pub next_label: String
}

/// Title bar of pane `index`. Month
/// option values are relative to pane 0
/// so that choosing one repositions the
/// whole view.
#[must_use]
pub fn build_title(
  pane: CalendarPane,
  index: usize,
  ref_year: i32,
  limits: &NavLimits,
  opts: &PickerOptions
) -> TitleBar {
  let c = index as i32;
  let is_min_year =
    pane.year == limits.min_year;
  let is_max_year =
    pane.year == limits.max_year;

  let months = (0..12)
    .map(|i| {
      let disabled = (is_min_year
        && limits
          .min_month
          .is_some_and(|m| i < m))
        || (is_max_year
          && limits
            .max_month
            .is_some_and(|m| i > m));
      SelectOption {
        value: if pane.year == ref_year {
          i - c
        } else {
          12 + i - c
        },
        label: opts
          .i18n
          .month_name(i)
          .to_string(),
        selected: i == pane.month,
        disabled
      }
    })
    .collect();

  let (from, to) = match opts.year_range
  {
    | YearRange::Span(n) => {
      let n =
        i32::try_from(n).unwrap_or(i32::MAX);
      (
        pane.year.saturating_sub(n),
        pane.year.saturating_add(n)
      )
    }
    | YearRange::Between(from, to) => {
      (from, to)
    }
  };
  let years = (from.max(limits.min_year)
    ..=to.min(limits.max_year))
    .map(|year| SelectOption {
      value: year,
      label: format!(
        "{year}{}",
        opts.year_suffix
      ),
      selected: year == pane.year,
      disabled: false
    })
    .collect();

  let prev_enabled = (index == 0).then(|| {
    !(is_min_year
      && (pane.month == 0
        || limits
          .min_month
          .is_some_and(|m| m >= pane.month)))
  });
  let next_enabled = (index + 1
    == opts.number_of_months as usize)
    .then(|| {
      !(is_max_year
        && (pane.month == 11
          || limits
            .max_month
            .is_some_and(|m| {
              m <= pane.month
            })))
    });

  TitleBar {
    pane,
    month_label: opts
      .i18n
      .month_name(pane.month)
      .to_string(),
    year_label: format!(
      "{}{}",
      pane.year, opts.year_suffix
    ),
    months,
    years,
    show_month_after_year: opts
      .show_month_after_year,
    prev_enabled,
    next_enabled,
    prev_label: opts
      .i18n
      .previous_month
      .clone(),
    next_label: opts
      .i18n
      .next_month
      .clone()
  }
}
