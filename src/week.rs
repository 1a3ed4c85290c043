use chrono::{Datelike, Days, Local, Months, NaiveDate};

pub const DAYS_PER_WEEK: u64 = 7;

/// Source of "today" for the navigation bound.
#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Seven consecutive days starting at a Monday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WeekWindow {
    start: NaiveDate,
}

impl WeekWindow {
    /// The week the anchor falls into. Sundays belong to the week that
    /// started six days earlier.
    pub fn containing(anchor: NaiveDate) -> Self {
        let offset = anchor.weekday().num_days_from_monday();
        let start = anchor
            .checked_sub_days(Days::new(offset.into()))
            .unwrap_or(anchor);
        Self { start }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.start
            .checked_add_days(Days::new(DAYS_PER_WEEK - 1))
            .unwrap_or(self.start)
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.start
            .iter_days()
            .take(DAYS_PER_WEEK as usize)
            .collect()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end()
    }

    pub fn previous(&self) -> Self {
        let start = self
            .start
            .checked_sub_days(Days::new(DAYS_PER_WEEK))
            .unwrap_or(self.start);
        Self { start }
    }

    /// `None` once the following week would start after `horizon`.
    pub fn next(&self, horizon: NaiveDate) -> Option<Self> {
        let start = self.start.checked_add_days(Days::new(DAYS_PER_WEEK))?;
        (start <= horizon).then_some(Self { start })
    }

    pub fn has_next(&self, horizon: NaiveDate) -> bool {
        self.next(horizon).is_some()
    }
}

pub fn compute_week_dates(week_start: NaiveDate) -> Vec<String> {
    WeekWindow::containing(week_start)
        .dates()
        .iter()
        .map(|date| date.format("%Y-%m-%d").to_string())
        .collect()
}

/// Last day a displayed week may start on.
pub fn booking_horizon(clock: &dyn Clock, months: u32) -> NaiveDate {
    let today = clock.today();
    today
        .checked_add_months(Months::new(months))
        .unwrap_or(NaiveDate::MAX)
}
