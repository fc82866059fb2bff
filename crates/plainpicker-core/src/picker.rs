use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, instrument, trace};
use uuid::Uuid;

use crate::datetime::{self, add_days, format_date, month_date, parse_date_expr, parse_with_format};
use crate::events::{EventEmitter, PickerEvent, PickerId, SubscriptionId};
use crate::grid::{CalendarPane, DayCell, GridContext, MonthGrid, build_month_grid};
use crate::options::{Bounds, MainCalendar, OptionsPatch, PickerOptions};
use crate::timer::TimerQueue;
use crate::title::{NavLimits, TitleBar, build_title};

/// Delay between a day click and hiding a bound picker.
pub const SELECT_HIDE_DELAY: Duration = Duration::from_millis(100);
/// Delay between the field losing focus and hiding the picker.
pub const BLUR_HIDE_DELAY: Duration = Duration::from_millis(50);

pub type DisableDayFn = Rc<dyn Fn(NaiveDate) -> bool>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PickerTask {
    HideAfterSelect,
    HideAfterBlur,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Left,
    Right,
    Up,
    Down,
    Enter,
    Escape,
}

impl std::str::FromStr for Key {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            "enter" | "return" => Ok(Self::Enter),
            "escape" | "esc" => Ok(Self::Escape),
            other => Err(anyhow::anyhow!("unknown key: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekdayHeader {
    pub abbr: String,
    pub name: String,
    pub is_weekend: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaneView {
    pub title: TitleBar,
    pub grid: MonthGrid,
}

/// Everything needed to render one draw of a picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarView {
    pub panes: Vec<PaneView>,
    pub weekdays: Vec<WeekdayHeader>,
    pub show_week_number: bool,
    pub pick_whole_week: bool,
    pub is_rtl: bool,
    pub theme: Option<String>,
}

/// A single date picker: view state, selection and bound field.
pub struct Picker {
    id: PickerId,
    options: PickerOptions,
    bounds: Bounds,
    limits: NavLimits,
    start_range: Option<NaiveDate>,
    end_range: Option<NaiveDate>,
    selected: Option<NaiveDate>,
    date_range: Vec<NaiveDate>,
    range_min_backup: Option<Option<NaiveDate>>,
    calendars: Vec<CalendarPane>,
    visible: bool,
    field: Option<String>,
    pointer_inside: bool,
    draw_pending: bool,
    draw_count: u64,
    view: Option<CalendarView>,
    today: NaiveDate,
    disable_day: Option<DisableDayFn>,
    timers: TimerQueue<PickerTask>,
    emitter: EventEmitter<PickerEvent>,
}

impl fmt::Debug for Picker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Picker")
            .field("id", &self.id)
            .field("selected", &self.selected)
            .field("calendars", &self.calendars)
            .field("visible", &self.visible)
            .finish_non_exhaustive()
    }
}

/// The formatted selection, empty when nothing is selected.
impl fmt::Display for Picker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.selected {
            Some(date) => write!(f, "{}", format_date(date, &self.options.format)),
            None => Ok(()),
        }
    }
}

impl Picker {
    pub fn new(patch: &OptionsPatch) -> Self {
        let tz = datetime::resolve_timezone(patch.timezone.as_deref());
        Self::with_today(patch, datetime::today_in(tz))
    }

    /// Builds a picker with an explicit "today".
    #[instrument(skip(patch))]
    pub fn with_today(patch: &OptionsPatch, today: NaiveDate) -> Self {
        let options = PickerOptions::default().merged(patch);
        let mut picker = Self {
            id: Uuid::new_v4(),
            bounds: Bounds::default(),
            limits: NavLimits::default(),
            start_range: None,
            end_range: None,
            selected: None,
            date_range: Vec::new(),
            range_min_backup: None,
            calendars: Vec::new(),
            visible: false,
            field: options.field.clone(),
            pointer_inside: false,
            draw_pending: false,
            draw_count: 0,
            view: None,
            today,
            disable_day: None,
            timers: TimerQueue::new(),
            emitter: EventEmitter::new(),
            options,
        };

        if let Some(min) = picker.options.min_date {
            picker.set_min_date(Some(min));
        }
        if let Some(max) = picker.options.max_date {
            picker.set_max_date(Some(max));
        }

        match picker.options.default_date {
            Some(date) if picker.options.set_default_date => {
                picker.set_date(Some(date), true);
            }
            Some(date) => {
                picker.goto_date(date);
            }
            None => match picker.field.as_deref().and_then(|value| picker.parse_input(value)) {
                Some(date) => {
                    picker.set_date(Some(date), true);
                }
                None => {
                    picker.goto_date(today);
                }
            },
        }

        if !picker.options.bound {
            picker.show();
        }

        info!(id = %picker.id, bound = picker.options.bound, "picker created");
        picker
    }

    pub fn id(&self) -> PickerId {
        self.id
    }

    pub fn options(&self) -> &PickerOptions {
        &self.options
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn is_bound(&self) -> bool {
        self.options.bound
    }

    pub fn calendars(&self) -> &[CalendarPane] {
        &self.calendars
    }

    pub fn get_date(&self) -> Option<NaiveDate> {
        self.selected
    }

    pub fn date_range(&self) -> &[NaiveDate] {
        &self.date_range
    }

    pub fn field_value(&self) -> Option<&str> {
        self.field.as_deref()
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn min_date(&self) -> Option<NaiveDate> {
        self.bounds.min_date
    }

    pub fn max_date(&self) -> Option<NaiveDate> {
        self.bounds.max_date
    }

    pub fn start_range(&self) -> Option<NaiveDate> {
        self.start_range
    }

    pub fn end_range(&self) -> Option<NaiveDate> {
        self.end_range
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn view(&self) -> Option<&CalendarView> {
        self.view.as_ref()
    }

    pub fn draw_count(&self) -> u64 {
        self.draw_count
    }

    pub fn has_pending(&self, task: PickerTask) -> bool {
        self.timers.is_pending(task)
    }

    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&PickerEvent) + 'static,
    {
        self.emitter.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.emitter.unsubscribe(id)
    }

    pub fn set_disable_day_fn(&mut self, disable: Option<DisableDayFn>) {
        self.disable_day = disable;
        self.draw(false);
    }

    /// Parses with the display format first, then as a free-form expression.
    pub fn parse_input(&self, value: &str) -> Option<NaiveDate> {
        parse_with_format(value, &self.options.format).or_else(|| parse_date_expr(value, self.today).ok())
    }

    /// Selects `date`, or clears the selection for `None`.
    ///
    /// The date is clamped into the bounds. Selecting the current selection
    /// again is a no-op and fires nothing.
    #[instrument(skip(self), fields(id = %self.id))]
    pub fn set_date(&mut self, date: Option<NaiveDate>, prevent_callback: bool) {
        let Some(date) = date else {
            let had_selection = self.selected.take().is_some();
            if had_selection && self.field.is_some() {
                self.write_field(String::new());
            }
            self.draw(false);
            return;
        };

        let date = self.bounds.clamp(date);
        if self.selected == Some(date) {
            debug!(%date, "date already selected");
            return;
        }

        self.selected = Some(date);
        if !self.goto_date(date) {
            self.draw(false);
        }
        if self.field.is_some() {
            self.write_field(self.to_string());
        }
        if !prevent_callback {
            self.emitter.emit(&PickerEvent::Select(date));
        }
    }

    /// Parses and selects; unparseable input is ignored.
    pub fn set_date_str(&mut self, value: &str, prevent_callback: bool) -> bool {
        match self.parse_input(value) {
            Some(date) => {
                self.set_date(Some(date), prevent_callback);
                true
            }
            None => {
                debug!(value, "ignoring unparseable date");
                false
            }
        }
    }

    /// Brings `date` into view. Panes are only rebuilt when `date` lies
    /// outside the visible span; returns whether they were.
    #[instrument(skip(self), fields(id = %self.id))]
    pub fn goto_date(&mut self, date: NaiveDate) -> bool {
        let visible = match (self.calendars.first(), self.calendars.last()) {
            (Some(first), Some(last)) => first.first_day() <= date && date <= last.last_day(),
            _ => false,
        };
        if visible {
            trace!(%date, "date already visible");
            return false;
        }

        let mut pane = CalendarPane::containing(date);
        if self.options.main_calendar == MainCalendar::Right {
            pane = pane.offset(1 - self.options.number_of_months as i32);
        }
        self.calendars = vec![pane];
        self.adjust_calendars();
        true
    }

    pub fn goto_today(&mut self) -> bool {
        self.goto_date(self.today)
    }

    /// Moves the first pane to `month` (0-based, carried into the year) of
    /// its current year. Months beyond the representable dates are ignored.
    pub fn goto_month(&mut self, month: i32) -> bool {
        let year = self.pane0_mut().year;
        self.move_first_pane(CalendarPane::new(year, month))
    }

    pub fn goto_year(&mut self, year: i32) -> bool {
        let month = self.pane0_mut().month;
        self.move_first_pane(CalendarPane::new(year, month))
    }

    /// Non-numeric input is ignored.
    pub fn goto_month_str(&mut self, value: &str) -> bool {
        value
            .trim()
            .parse::<i32>()
            .is_ok_and(|month| self.goto_month(month))
    }

    pub fn goto_year_str(&mut self, value: &str) -> bool {
        value
            .trim()
            .parse::<i32>()
            .is_ok_and(|year| self.goto_year(year))
    }

    pub fn next_month(&mut self) -> bool {
        let pane = *self.pane0_mut();
        self.move_first_pane(pane.offset(1))
    }

    pub fn prev_month(&mut self) -> bool {
        let pane = *self.pane0_mut();
        self.move_first_pane(pane.offset(-1))
    }

    /// Sets the lower bound, or resets it (and the start range marker) for
    /// `None`. A bound past the current maximum clears both.
    pub fn set_min_date(&mut self, date: Option<NaiveDate>) {
        if date.is_none() {
            self.start_range = None;
        }
        self.apply_bounds(Bounds::new(date, self.bounds.max_date));
    }

    /// Sets the upper bound, or resets it (and the end range marker) for
    /// `None`. A bound before the current minimum clears both.
    pub fn set_max_date(&mut self, date: Option<NaiveDate>) {
        if date.is_none() {
            self.end_range = None;
        }
        self.apply_bounds(Bounds::new(self.bounds.min_date, date));
    }

    /// Replaces both bounds in one step, leaving the range markers alone.
    pub fn set_bounds(&mut self, min_date: Option<NaiveDate>, max_date: Option<NaiveDate>) {
        self.apply_bounds(Bounds::new(min_date, max_date));
    }

    pub fn set_start_range(&mut self, date: Option<NaiveDate>) {
        self.start_range = date;
    }

    pub fn set_end_range(&mut self, date: Option<NaiveDate>) {
        self.end_range = date;
    }

    pub fn show(&mut self) {
        if self.visible {
            return;
        }
        self.visible = true;
        self.draw(false);
        self.emitter.emit(&PickerEvent::Open);
    }

    pub fn hide(&mut self) {
        if !self.visible {
            return;
        }
        self.visible = false;
        self.timers.cancel(PickerTask::HideAfterSelect);
        self.timers.cancel(PickerTask::HideAfterBlur);
        self.emitter.emit(&PickerEvent::Close);
    }

    /// Requests a render. Hidden pickers skip unless forced; with draw
    /// coalescing the render waits for [`Picker::flush_frame`].
    pub fn draw(&mut self, force: bool) {
        if !self.visible && !force {
            return;
        }
        if self.options.coalesce_draws {
            self.draw_pending = true;
            return;
        }
        self.render_now();
    }

    /// Performs at most one pending draw. Returns whether one ran.
    pub fn flush_frame(&mut self) -> bool {
        if !self.draw_pending {
            return false;
        }
        self.draw_pending = false;
        self.render_now();
        true
    }

    /// Computes the current view without caching it.
    pub fn compute_view(&self) -> CalendarView {
        let disable = self.disable_day.as_deref();
        let ctx = GridContext {
            first_day: self.options.first_day,
            today: self.today,
            selected: self.selected,
            bounds: self.bounds,
            disable_weekends: self.options.disable_weekends,
            disable_day: disable,
            events: &self.options.events,
            start_range: self.start_range,
            end_range: self.end_range,
            show_week_number: self.options.show_week_number,
            pick_whole_week: self.options.pick_whole_week,
            show_adjacent_days: self.options.show_days_in_adjacent_months,
            enable_adjacent_selection: self.options.enable_selection_days_in_adjacent_months,
        };
        let ref_year = self.calendars.first().map(|pane| pane.year).unwrap_or_default();

        let panes = self
            .calendars
            .iter()
            .enumerate()
            .map(|(index, pane)| PaneView {
                title: build_title(*pane, index, ref_year, &self.limits, &self.options),
                grid: build_month_grid(*pane, &ctx),
            })
            .collect();

        let weekdays = (0..7)
            .map(|col| {
                let day = (col + self.options.first_day) % 7;
                WeekdayHeader {
                    abbr: self.options.i18n.weekday_short(day).to_string(),
                    name: self.options.i18n.weekday_name(day).to_string(),
                    is_weekend: day == 0 || day == 6,
                }
            })
            .collect();

        CalendarView {
            panes,
            weekdays,
            show_week_number: self.options.show_week_number,
            pick_whole_week: self.options.pick_whole_week,
            is_rtl: self.options.is_rtl,
            theme: self.options.theme.clone(),
        }
    }

    /// The cell for `date` if it is rendered in any visible pane.
    pub fn find_cell(&self, date: NaiveDate) -> Option<DayCell> {
        let view = self.compute_view();
        let mut adjacent = None;
        for pane in &view.panes {
            if let Some(cell) = pane.grid.find(date) {
                if !cell.is_empty {
                    return Some(cell.clone());
                }
                adjacent.get_or_insert_with(|| cell.clone());
            }
        }
        adjacent
    }

    /// A pointer click on a rendered day. Disabled, hidden or unselectable
    /// days are ignored.
    #[instrument(skip(self), fields(id = %self.id))]
    pub fn click_day(&mut self, date: NaiveDate, now: Duration) -> bool {
        if !self.visible {
            return false;
        }
        let Some(cell) = self.find_cell(date) else {
            debug!(%date, "clicked day not rendered");
            return false;
        };
        if !cell.is_selectable {
            debug!(%date, "clicked day not selectable");
            return false;
        }

        self.pointer_inside = false;
        let completed = if self.options.range_select {
            self.push_range_pick(date)
        } else {
            self.set_date(Some(date), false);
            true
        };

        if completed && self.options.bound {
            self.timers.schedule(PickerTask::HideAfterSelect, now, SELECT_HIDE_DELAY);
        }
        true
    }

    /// Keyboard handling while the picker is open.
    pub fn handle_key(&mut self, key: Key) {
        if !self.visible {
            return;
        }
        match key {
            Key::Left => self.adjust_date(-1),
            Key::Right => self.adjust_date(1),
            Key::Up => self.adjust_date(-7),
            Key::Down => self.adjust_date(7),
            Key::Enter | Key::Escape => {
                if self.options.bound {
                    self.hide();
                }
            }
        }
    }

    pub fn on_field_focus(&mut self) {
        self.pointer_inside = false;
        self.timers.cancel(PickerTask::HideAfterBlur);
        self.show();
    }

    pub fn on_field_click(&mut self) {
        self.show();
    }

    /// The field lost focus. Hides after a short delay unless the pointer
    /// went down inside the picker, which wins the race.
    pub fn on_field_blur(&mut self, now: Duration) {
        if !self.pointer_inside {
            self.timers.schedule(PickerTask::HideAfterBlur, now, BLUR_HIDE_DELAY);
        }
        self.pointer_inside = false;
    }

    /// Pointer pressed inside the picker.
    pub fn pointer_down(&mut self) {
        self.pointer_inside = true;
        self.timers.cancel(PickerTask::HideAfterBlur);
    }

    /// The bound field changed. Changes written by this picker are skipped.
    #[instrument(skip(self), fields(id = %self.id))]
    pub fn on_field_change(&mut self, value: &str, fired_by: Option<PickerId>) {
        if fired_by == Some(self.id) {
            trace!("ignoring own field change");
            return;
        }
        if self.field.is_some() {
            self.field = Some(value.to_string());
        }
        if let Some(date) = self.parse_input(value) {
            self.set_date(Some(date), false);
        }
        if !self.visible {
            self.show();
        }
    }

    /// Fires every deferred action due at `now`.
    pub fn tick(&mut self, now: Duration) {
        for task in self.timers.due(now) {
            debug!(?task, "timer fired");
            match task {
                PickerTask::HideAfterSelect | PickerTask::HideAfterBlur => self.hide(),
            }
        }
    }

    pub fn destroy(&mut self) {
        self.hide();
        self.timers.clear();
        self.emitter.clear();
        self.view = None;
        self.draw_pending = false;
        info!(id = %self.id, "picker destroyed");
    }

    fn pane0_mut(&mut self) -> &mut CalendarPane {
        if self.calendars.is_empty() {
            self.calendars.push(CalendarPane::containing(self.today));
        }
        &mut self.calendars[0]
    }

    fn apply_bounds(&mut self, bounds: Bounds) {
        self.bounds = bounds;
        match bounds.min_date {
            Some(min) => self.limits.set_min(min),
            None => self.limits.clear_min(),
        }
        match bounds.max_date {
            Some(max) => self.limits.set_max(max),
            None => self.limits.clear_max(),
        }
        self.draw(false);
    }

    fn move_first_pane(&mut self, first: CalendarPane) -> bool {
        let last = first.offset(self.options.number_of_months as i32 - 1);
        if month_date(first.year, first.month, 1).is_none() || month_date(last.year, last.month, 1).is_none() {
            debug!(year = first.year, month = first.month, "month outside the supported date range; ignoring");
            return false;
        }
        self.calendars = vec![first];
        self.adjust_calendars();
        true
    }

    fn adjust_calendars(&mut self) {
        let first = {
            let pane = self.pane0_mut();
            *pane = CalendarPane::new(pane.year, pane.month);
            *pane
        };
        self.calendars = (0..self.options.number_of_months as i32)
            .map(|c| first.offset(c))
            .collect();
        self.draw(false);
    }

    fn adjust_date(&mut self, days: i64) {
        let base = self.selected.unwrap_or(self.today);
        self.set_date(Some(add_days(base, days)), false);
    }

    /// Range mode click. Returns true when the click completed a range.
    fn push_range_pick(&mut self, date: NaiveDate) -> bool {
        if self.date_range.len() > 1 {
            self.date_range.clear();
        }
        self.date_range.push(date);

        match self.date_range.as_slice() {
            [start] => {
                let start = *start;
                if self.range_min_backup.is_none() {
                    self.range_min_backup = Some(self.bounds.min_date);
                }
                self.start_range = Some(start);
                self.end_range = None;
                self.bounds.min_date = Some(start);
                self.limits.set_min(start);
                self.set_date(Some(start), true);
                self.draw(false);
                false
            }
            [start, end] => {
                let (start, end) = (*start, *end);
                if let Some(original) = self.range_min_backup.take() {
                    self.bounds.min_date = original;
                    match original {
                        Some(min) => self.limits.set_min(min),
                        None => self.limits.clear_min(),
                    }
                }
                self.start_range = Some(start);
                self.end_range = Some(end);
                self.selected = Some(end);
                if self.field.is_some() {
                    let value = format!(
                        "{} - {}",
                        format_date(start, &self.options.format),
                        format_date(end, &self.options.format)
                    );
                    self.write_field(value);
                }
                self.draw(false);
                self.emitter.emit(&PickerEvent::RangeSelect { start, end });
                true
            }
            _ => false,
        }
    }

    fn write_field(&mut self, value: String) {
        self.field = Some(value.clone());
        self.emitter.emit(&PickerEvent::FieldChange {
            value,
            fired_by: Some(self.id),
        });
    }

    fn render_now(&mut self) {
        let view = self.compute_view();
        self.view = Some(view);
        self.draw_count += 1;
        trace!(id = %self.id, draws = self.draw_count, "picker drawn");
        self.emitter.emit(&PickerEvent::Draw);
    }
}
