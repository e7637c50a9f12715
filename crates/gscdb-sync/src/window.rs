use chrono::{Days, NaiveDate, Utc};

/// Inclusive range of days fetched by one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl SyncWindow {
    /// Window of `days` days ending `lag_days` before `today`.
    ///
    /// `days = 0` is treated as a single day.
    #[must_use]
    pub fn ending_with_lag(today: NaiveDate, days: u32, lag_days: u32) -> Self {
        let end = today
            .checked_sub_days(Days::new(u64::from(lag_days)))
            .unwrap_or(NaiveDate::MIN);
        let span = u64::from(days.max(1) - 1);
        let start = end.checked_sub_days(Days::new(span)).unwrap_or(NaiveDate::MIN);
        Self { start, end }
    }

    /// Same as [`SyncWindow::ending_with_lag`] anchored at the current UTC date.
    #[must_use]
    pub fn current(days: u32, lag_days: u32) -> Self {
        Self::ending_with_lag(Utc::now().date_naive(), days, lag_days)
    }

    /// Days in the window, oldest first.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }

    #[must_use]
    pub fn len(&self) -> u32 {
        let span = (self.end - self.start).num_days() + 1;
        u32::try_from(span.max(0)).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
