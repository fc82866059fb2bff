use std::time::Duration;

use chrono::NaiveDate;
use tracing::{debug, instrument, warn};

use crate::datetime::add_days;
use crate::options::{Bounds, OptionsPatch};
use crate::picker::Picker;
use crate::timer::TimerQueue;

/// Delay before a hover preview is reverted once the pointer leaves.
pub const HOVER_REVERT_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RangerTask {
    RevertHover,
}

/// Minimum and maximum length of a range, in days from the start date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RangeLimits {
    pub min_range: Option<u32>,
    pub max_range: Option<u32>,
}

/// Two pickers, start and end, whose bounds and range markers follow each
/// other.
#[derive(Debug)]
pub struct PickRanger {
    start: Picker,
    end: Picker,
    limits: RangeLimits,
    overall: Bounds,
    hover: Option<NaiveDate>,
    timers: TimerQueue<RangerTask>,
}

impl PickRanger {
    pub fn new(start: &OptionsPatch, end: &OptionsPatch, limits: RangeLimits) -> Self {
        Self::from_pickers(Picker::new(start), Picker::new(end), limits)
    }

    pub fn with_today(
        start: &OptionsPatch,
        end: &OptionsPatch,
        limits: RangeLimits,
        today: NaiveDate,
    ) -> Self {
        Self::from_pickers(
            Picker::with_today(start, today),
            Picker::with_today(end, today),
            limits,
        )
    }

    /// The overall bounds are taken from the start picker's options.
    pub fn from_pickers(start: Picker, end: Picker, limits: RangeLimits) -> Self {
        let overall = start.options().bounds();
        let mut ranger = Self {
            start,
            end,
            limits,
            overall,
            hover: None,
            timers: TimerQueue::new(),
        };
        if ranger.start.get_date().is_some() {
            ranger.sync_start();
        }
        if ranger.end.get_date().is_some() {
            ranger.sync_end();
        }
        ranger
    }

    pub fn start(&self) -> &Picker {
        &self.start
    }

    pub fn end(&self) -> &Picker {
        &self.end
    }

    pub fn start_mut(&mut self) -> &mut Picker {
        &mut self.start
    }

    pub fn end_mut(&mut self) -> &mut Picker {
        &mut self.end
    }

    pub fn hover(&self) -> Option<NaiveDate> {
        self.hover
    }

    pub fn has_pending(&self, task: RangerTask) -> bool {
        self.timers.is_pending(task)
    }

    #[instrument(skip(self))]
    pub fn select_start(&mut self, date: Option<NaiveDate>) {
        let before = self.start.get_date();
        self.start.set_date(date, false);
        if self.start.get_date() != before {
            self.sync_start();
        }
    }

    #[instrument(skip(self))]
    pub fn select_end(&mut self, date: Option<NaiveDate>) {
        let before = self.end.get_date();
        self.end.set_date(date, false);
        if self.end.get_date() != before {
            self.sync_end();
        }
    }

    pub fn click_start(&mut self, date: NaiveDate, now: Duration) -> bool {
        let before = self.start.get_date();
        let clicked = self.start.click_day(date, now);
        if self.start.get_date() != before {
            self.sync_start();
        }
        clicked
    }

    pub fn click_end(&mut self, date: NaiveDate, now: Duration) -> bool {
        let before = self.end.get_date();
        let clicked = self.end.click_day(date, now);
        if clicked {
            self.timers.cancel(RangerTask::RevertHover);
            self.hover = None;
        }
        if self.end.get_date() != before {
            self.sync_end();
        }
        clicked
    }

    /// Previews `date` as the range end while the end is still open.
    pub fn hover_end(&mut self, date: NaiveDate) {
        if self.start.get_date().is_none() || self.end.get_date().is_some() {
            return;
        }
        self.timers.cancel(RangerTask::RevertHover);
        self.hover = Some(date);
        self.apply_end_marker(Some(date));
    }

    pub fn hover_leave(&mut self, now: Duration) {
        if self.hover.is_some() {
            self.timers.schedule(RangerTask::RevertHover, now, HOVER_REVERT_DELAY);
        }
    }

    /// Fires due timers of the wrapper and both pickers.
    pub fn tick(&mut self, now: Duration) {
        for task in self.timers.due(now) {
            match task {
                RangerTask::RevertHover => {
                    debug!(hover = ?self.hover, "reverting hover preview");
                    self.hover = None;
                    let committed = self.end.get_date();
                    self.apply_end_marker(committed);
                }
            }
        }
        self.start.tick(now);
        self.end.tick(now);
    }

    /// The start selection changed: mark it on both sides and narrow the end
    /// picker to the configured range length.
    fn sync_start(&mut self) {
        let start_date = self.start.get_date();

        if let Some(start_date) = start_date
            && (self.limits.min_range.is_some() || self.limits.max_range.is_some())
        {
            let window = Bounds {
                min_date: self
                    .limits
                    .min_range
                    .map(|days| add_days(start_date, i64::from(days))),
                max_date: self
                    .limits
                    .max_range
                    .map(|days| add_days(start_date, i64::from(days))),
            };
            let derived = window.intersect(&self.overall).unwrap_or_else(|| {
                warn!(%start_date, ?window, "range length does not fit the overall bounds; keeping them");
                self.overall
            });

            debug!(%start_date, ?derived, "derived end bounds");
            self.end.set_bounds(derived.min_date, derived.max_date);

            if let Some(end_date) = self.end.get_date()
                && !derived.contains(end_date)
            {
                debug!(%end_date, "end date outside derived bounds; clearing");
                self.end.set_date(None, true);
                self.end.goto_date(start_date);
                self.start.set_end_range(None);
                self.end.set_end_range(None);
            }
        }

        self.start.set_start_range(start_date);
        self.end.set_start_range(start_date);
        self.redraw();
    }

    fn sync_end(&mut self) {
        let end_date = self.end.get_date();
        self.apply_end_marker(end_date);
    }

    fn apply_end_marker(&mut self, date: Option<NaiveDate>) {
        self.start.set_end_range(date);
        self.end.set_end_range(date);
        self.redraw();
    }

    fn redraw(&mut self) {
        self.start.draw(false);
        self.end.draw(false);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::NaiveDate;

    use super::{PickRanger, RangeLimits, RangerTask};
    use crate::options::OptionsPatch;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn ranger(limits: RangeLimits, patch: OptionsPatch) -> PickRanger {
        PickRanger::with_today(&patch, &patch, limits, ymd(2021, 5, 20))
    }

    #[test]
    fn min_range_pushes_end_minimum() {
        let mut ranger = ranger(
            RangeLimits {
                min_range: Some(3),
                max_range: None,
            },
            OptionsPatch::default(),
        );
        ranger.select_start(Some(ymd(2021, 6, 1)));

        assert_eq!(ranger.end().min_date(), Some(ymd(2021, 6, 4)));
        assert_eq!(ranger.end().max_date(), None);
        assert_eq!(ranger.start().start_range(), Some(ymd(2021, 6, 1)));
        assert_eq!(ranger.end().start_range(), Some(ymd(2021, 6, 1)));
    }

    #[test]
    fn derived_bounds_respect_overall_limits() {
        let patch = OptionsPatch {
            max_date: Some(ymd(2021, 6, 10)),
            ..OptionsPatch::default()
        };
        let mut ranger = ranger(
            RangeLimits {
                min_range: Some(1),
                max_range: Some(30),
            },
            patch,
        );
        ranger.select_start(Some(ymd(2021, 6, 1)));
        assert_eq!(ranger.end().min_date(), Some(ymd(2021, 6, 2)));
        assert_eq!(ranger.end().max_date(), Some(ymd(2021, 6, 10)));
    }

    #[test]
    fn overall_bounds_win_when_range_length_cannot_fit() {
        let patch = OptionsPatch {
            max_date: Some(ymd(2021, 6, 10)),
            ..OptionsPatch::default()
        };
        let mut ranger = ranger(
            RangeLimits {
                min_range: Some(30),
                max_range: None,
            },
            patch,
        );
        ranger.select_start(Some(ymd(2021, 6, 5)));
        assert_eq!(ranger.end().min_date(), None);
        assert_eq!(ranger.end().max_date(), Some(ymd(2021, 6, 10)));

        ranger.select_end(Some(ymd(2021, 6, 8)));
        assert_eq!(ranger.end().get_date(), Some(ymd(2021, 6, 8)));
        ranger.select_end(Some(ymd(2021, 7, 20)));
        assert_eq!(ranger.end().get_date(), Some(ymd(2021, 6, 10)));
    }

    #[test]
    fn end_outside_new_bounds_is_cleared() {
        let mut ranger = ranger(
            RangeLimits {
                min_range: Some(2),
                max_range: Some(7),
            },
            OptionsPatch::default(),
        );
        ranger.select_start(Some(ymd(2021, 6, 1)));
        ranger.select_end(Some(ymd(2021, 6, 5)));
        assert_eq!(ranger.start().end_range(), Some(ymd(2021, 6, 5)));

        ranger.select_start(Some(ymd(2021, 7, 20)));
        assert_eq!(ranger.end().get_date(), None);
        assert_eq!(ranger.start().end_range(), None);
        assert_eq!(ranger.end().calendars()[0].month, 6);
        assert_eq!(ranger.end().min_date(), Some(ymd(2021, 7, 22)));
    }

    #[test]
    fn hover_preview_reverts_unless_reentered() {
        let mut ranger = ranger(RangeLimits::default(), OptionsPatch::default());
        ranger.select_start(Some(ymd(2021, 5, 21)));

        ranger.hover_end(ymd(2021, 5, 25));
        assert_eq!(ranger.start().end_range(), Some(ymd(2021, 5, 25)));

        ranger.hover_leave(ms(0));
        ranger.tick(ms(150));
        ranger.hover_end(ymd(2021, 5, 26));
        assert!(!ranger.has_pending(RangerTask::RevertHover));
        ranger.tick(ms(250));
        assert_eq!(ranger.end().end_range(), Some(ymd(2021, 5, 26)));

        ranger.hover_leave(ms(300));
        ranger.tick(ms(500));
        assert_eq!(ranger.hover(), None);
        assert_eq!(ranger.end().end_range(), None);
    }

    #[test]
    fn click_end_commits_range_marker() {
        let mut ranger = ranger(RangeLimits::default(), OptionsPatch::default());
        assert!(ranger.click_start(ymd(2021, 5, 21), ms(0)));
        ranger.hover_end(ymd(2021, 5, 27));
        ranger.hover_leave(ms(10));
        assert!(ranger.click_end(ymd(2021, 5, 28), ms(20)));
        ranger.tick(ms(1000));

        assert_eq!(ranger.start().end_range(), Some(ymd(2021, 5, 28)));
        assert_eq!(ranger.end().end_range(), Some(ymd(2021, 5, 28)));
        assert_eq!(ranger.end().start_range(), Some(ymd(2021, 5, 21)));
    }
}
