use chrono::{
  Datelike,
  NaiveDate
};
use serde::Serialize;

use crate::datetime::{
  add_days,
  adjust_calendar,
  days_in_month,
  is_weekend,
  month_date,
  week_number,
  weekday_index
};
use crate::options::Bounds;

/// One visible month. `month` is 0-based
/// and always within `[0, 11]`.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Serialize,
)]
pub struct CalendarPane {
  pub year:  i32,
  pub month: i32
}

impl CalendarPane {
  #[must_use]
  pub fn new(
    year: i32,
    month: i32
  ) -> Self {
    let (year, month) =
      adjust_calendar(year, month);
    Self { year, month }
  }

  #[must_use]
  pub fn containing(
    date: NaiveDate
  ) -> Self {
    Self {
      year:  date.year(),
      month: date.month0() as i32
    }
  }

  /// The pane `months` after this one.
  #[must_use]
  pub fn offset(
    self,
    months: i32
  ) -> Self {
    Self::new(
      self.year,
      self.month + months
    )
  }

  #[must_use]
  pub fn first_day(self) -> NaiveDate {
    month_date(self.year, self.month, 1)
      .unwrap_or(NaiveDate::MIN)
  }

  #[must_use]
  pub fn last_day(self) -> NaiveDate {
    month_date(
      self.year,
      self.month,
      days_in_month(
        self.year, self.month
      )
    )
    .unwrap_or(NaiveDate::MAX)
  }
}

/// Inputs shared by every pane of one
/// draw.
pub struct GridContext<'a> {
  pub first_day:         u32,
  pub today:             NaiveDate,
  pub selected:          Option<NaiveDate>,
  pub bounds:            Bounds,
  pub disable_weekends:  bool,
  pub disable_day:
    Option<&'a dyn Fn(NaiveDate) -> bool>,
  pub events:            &'a [NaiveDate],
  pub start_range:       Option<NaiveDate>,
  pub end_range:         Option<NaiveDate>,
  pub show_week_number:  bool,
  pub pick_whole_week:   bool,
  pub show_adjacent_days: bool,
  pub enable_adjacent_selection: bool
}

#[derive(
  Debug, Clone, PartialEq, Eq, Serialize,
)]
pub struct DayCell {
  pub date:           NaiveDate,
  /// Day belongs to the previous or
  /// next month.
  pub is_empty:       bool,
  pub is_today:       bool,
  pub is_selected:    bool,
  pub is_disabled:    bool,
  pub is_in_range:    bool,
  pub is_start_range: bool,
  pub is_end_range:   bool,
  pub has_event:      bool,
  pub is_selectable:  bool
}

#[derive(
  Debug, Clone, PartialEq, Eq, Serialize,
)]
#[serde(
  tag = "kind",
  rename_all = "snake_case"
)]
pub enum GridCell {
  Day(DayCell),
  /// Adjacent-month slot rendered blank.
  Placeholder
}

impl GridCell {
  #[must_use]
  pub fn day(&self) -> Option<&DayCell> {
    match self {
      | GridCell::Day(cell) => Some(cell),
      | GridCell::Placeholder => None
    }
  }
}

#[derive(
  Debug, Clone, PartialEq, Eq, Serialize,
)]
pub struct WeekRow {
  pub week_number: Option<i32>,
  /// Set when whole-week picking is on
  /// and the row holds the selection.
  pub is_selected: bool,
  pub cells:       Vec<GridCell>
}

#[derive(
  Debug, Clone, PartialEq, Eq, Serialize,
)]
pub struct MonthGrid {
  pub pane:   CalendarPane,
  pub before: u32,
  pub rows:   Vec<WeekRow>
}

impl MonthGrid {
  pub fn cells(
    &self
  ) -> impl Iterator<Item = &GridCell> {
    self
      .rows
      .iter()
      .flat_map(|row| row.cells.iter())
  }

  #[must_use]
  pub fn cell_count(&self) -> usize {
    self.cells().count()
  }

  #[must_use]
  pub fn find(
    &self,
    date: NaiveDate
  ) -> Option<&DayCell> {
    self
      .cells()
      .filter_map(GridCell::day)
      .find(|cell| cell.date == date)
  }
}

/// Leading adjacent-month cells before
/// day 1, with weeks starting on
/// `first_day` (Sunday 0).
#[must_use]
pub fn leading_days(
  pane: CalendarPane,
  first_day: u32
) -> u32 {
  let weekday =
    weekday_index(pane.first_day());
  (weekday + 7 - first_day % 7) % 7
}

/// `days + before` rounded up to whole
/// weeks.
#[must_use]
pub fn total_cells(
  days: u32,
  before: u32
) -> u32 {
  (days + before).div_ceil(7) * 7
}

#[must_use]
pub fn build_month_grid(
  pane: CalendarPane,
  ctx: &GridContext<'_>
) -> MonthGrid {
  let days =
    days_in_month(pane.year, pane.month);
  let before =
    leading_days(pane, ctx.first_day);
  let cells = total_cells(days, before);
  let first = pane.first_day();

  let mut rows =
    Vec::with_capacity(cells as usize / 7);
  let mut row = Vec::with_capacity(7);
  let mut row_selected = false;

  for i in 0..cells {
    let offset =
      i64::from(i) - i64::from(before);
    let date = add_days(first, offset);
    let is_empty =
      i < before || i >= days + before;
    let cell = day_cell(date, is_empty, ctx);

    if ctx.pick_whole_week
      && cell.is_selected
    {
      row_selected = true;
    }

    if is_empty && !ctx.show_adjacent_days
    {
      row.push(GridCell::Placeholder);
    } else {
      row.push(GridCell::Day(cell));
    }

    if row.len() == 7 {
      let week_number =
        ctx.show_week_number.then(|| {
          week_number(
            add_days(first, offset - 1),
            pane.year
          )
        });
      rows.push(WeekRow {
        week_number,
        is_selected: row_selected,
        cells: std::mem::take(&mut row)
      });
      row_selected = false;
    }
  }

  MonthGrid { pane, before, rows }
}

fn day_cell(
  date: NaiveDate,
  is_empty: bool,
  ctx: &GridContext<'_>
) -> DayCell {
  let is_disabled = !ctx
    .bounds
    .contains(date)
    || (ctx.disable_weekends
      && is_weekend(date))
    || ctx
      .disable_day
      .is_some_and(|disable| disable(date));

  let is_start_range =
    ctx.start_range == Some(date);
  let is_end_range =
    ctx.end_range == Some(date);
  let is_in_range = matches!(
    (ctx.start_range, ctx.end_range),
    (Some(start), Some(end))
      if start < date && date < end
  );

  DayCell {
    date,
    is_empty,
    is_today: date == ctx.today,
    is_selected: ctx.selected
      == Some(date),
    is_disabled,
    is_in_range,
    is_start_range,
    is_end_range,
    has_event: ctx.events.contains(&date),
    is_selectable: !is_disabled
      && (!is_empty
        || (ctx.show_adjacent_days
          && ctx
            .enable_adjacent_selection))
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::{
    CalendarPane,
    GridCell,
    GridContext,
    build_month_grid,
    leading_days
  };
  use crate::datetime::days_in_month;
  use crate::options::Bounds;

  fn ymd(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  fn context(
    first_day: u32
  ) -> GridContext<'static> {
    GridContext {
      first_day,
      today: ymd(2021, 8, 10),
      selected: None,
      bounds: Bounds::default(),
      disable_weekends: false,
      disable_day: None,
      events: &[],
      start_range: None,
      end_range: None,
      show_week_number: false,
      pick_whole_week: false,
      show_adjacent_days: true,
      enable_adjacent_selection: false
    }
  }

  #[test]
  fn monday_first_august_2021_layout() {
    let pane = CalendarPane::new(2021, 7);
    assert_eq!(leading_days(pane, 1), 6);

    let grid =
      build_month_grid(pane, &context(1));
    let first_row: Vec<NaiveDate> = grid
      .rows[0]
      .cells
      .iter()
      .filter_map(GridCell::day)
      .map(|cell| cell.date)
      .collect();
    assert_eq!(first_row, vec![
      ymd(2021, 7, 26),
      ymd(2021, 7, 27),
      ymd(2021, 7, 28),
      ymd(2021, 7, 29),
      ymd(2021, 7, 30),
      ymd(2021, 7, 31),
      ymd(2021, 8, 1),
    ]);
    let first = grid.rows[0].cells[0]
      .day()
      .expect("adjacent day shown");
    assert!(first.is_empty);
    assert!(!first.is_selectable);
    assert!(
      grid
        .find(ymd(2021, 8, 10))
        .expect("today")
        .is_today
    );
  }

  #[test]
  fn cell_count_is_whole_weeks() {
    for year in [1999, 2000, 2021, 2024]
    {
      for month in 0..12 {
        for first_day in 0..7 {
          let grid = build_month_grid(
            CalendarPane::new(year, month),
            &context(first_day)
          );
          let count = grid.cell_count();
          assert_eq!(count % 7, 0);
          assert!(
            count
              >= days_in_month(year, month)
                as usize
          );
        }
      }
    }
  }

  #[test]
  fn hidden_adjacent_days_become_placeholders()
   {
    let mut ctx = context(0);
    ctx.show_adjacent_days = false;
    let grid = build_month_grid(
      CalendarPane::new(2021, 7),
      &ctx
    );
    // August 2021 starts on a Sunday and
    // ends on a Tuesday.
    assert_eq!(grid.before, 0);
    let last_row =
      grid.rows.last().expect("rows");
    assert!(last_row.cells[2].day().is_some());
    assert_eq!(
      last_row.cells[3],
      GridCell::Placeholder
    );
  }

  #[test]
  fn flags_disabled_range_and_selection()
   {
    let disable =
      |date: NaiveDate| date == ymd(2021, 8, 13);
    let events = [ymd(2021, 8, 20)];
    let mut ctx = context(0);
    ctx.bounds = Bounds::new(
      Some(ymd(2021, 8, 2)),
      Some(ymd(2021, 8, 28))
    );
    ctx.disable_weekends = true;
    ctx.disable_day = Some(&disable);
    ctx.events = &events;
    ctx.selected = Some(ymd(2021, 8, 11));
    ctx.start_range = Some(ymd(2021, 8, 9));
    ctx.end_range = Some(ymd(2021, 8, 12));
    ctx.pick_whole_week = true;
    ctx.show_week_number = true;

    let grid = build_month_grid(
      CalendarPane::new(2021, 7),
      &ctx
    );
    let cell = |d: u32| {
      grid
        .find(ymd(2021, 8, d))
        .expect("cell")
        .clone()
    };

    assert!(cell(1).is_disabled);
    assert!(cell(7).is_disabled);
    assert!(cell(13).is_disabled);
    assert!(cell(29).is_disabled);
    assert!(!cell(11).is_disabled);
    assert!(cell(11).is_selected);
    assert!(cell(9).is_start_range);
    assert!(!cell(9).is_in_range);
    assert!(cell(10).is_in_range);
    assert!(cell(12).is_end_range);
    assert!(cell(20).has_event);

    assert!(grid.rows[1].is_selected);
    assert!(!grid.rows[0].is_selected);
    assert_eq!(
      grid.rows[0].week_number,
      Some(32)
    );
  }
}
