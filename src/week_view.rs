//! State behind one week-grid screen.
//!
//! Every fetch is tagged with a request token. Only the response to the most
//! recent request may touch the view, so a slow fetch for a week the user
//! already navigated away from can't overwrite the newer week.

use crate::{
    backend::ReservationBackend,
    error::BookingError,
    slot_grid::{Selection, SlotGrid, WeekGrid},
    slots::SlotSequence,
    types::{Reservation, UnavailableSlot},
    week::WeekWindow,
};
use chrono::NaiveDate;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

pub type RequestToken = u64;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeekData {
    pub reservations: Vec<Reservation>,
    pub unavailable_days: Vec<NaiveDate>,
    pub unavailable_slots: Vec<UnavailableSlot>,
}

impl WeekData {
    pub fn grid(&self, slots: &SlotSequence) -> SlotGrid {
        SlotGrid::new(
            slots.clone(),
            self.reservations.clone(),
            self.unavailable_days.iter().copied(),
            self.unavailable_slots.iter().copied(),
        )
    }
}

/// Reads everything the grid needs for `window`. Fails on the first store error.
pub fn fetch_week<T: ReservationBackend>(
    backend: &T,
    window: WeekWindow,
) -> Result<WeekData, BookingError> {
    Ok(WeekData {
        reservations: backend.reservations(&window.dates())?,
        unavailable_days: backend.unavailable_days()?,
        unavailable_slots: backend.unavailable_slots()?,
    })
}

/// Like [`fetch_week`], but a failed read leaves its list empty. The flag is
/// `true` when anything was missing.
pub fn fetch_week_partial<T: ReservationBackend>(
    backend: &T,
    window: WeekWindow,
) -> (WeekData, bool) {
    let mut partial = false;
    let reservations = or_empty(
        backend.reservations(&window.dates()),
        "reservations",
        &mut partial,
    );
    let unavailable_days = or_empty(backend.unavailable_days(), "unavailable days", &mut partial);
    let unavailable_slots = or_empty(
        backend.unavailable_slots(),
        "unavailable slots",
        &mut partial,
    );
    let data = WeekData {
        reservations,
        unavailable_days,
        unavailable_slots,
    };
    (data, partial)
}

fn or_empty<V>(result: Result<Vec<V>, BookingError>, what: &str, partial: &mut bool) -> Vec<V> {
    result.unwrap_or_else(|err| {
        warn!(%err, "Failed to read {what}, showing the grid without them");
        *partial = true;
        Vec::new()
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekView {
    window: WeekWindow,
    data: WeekData,
    latest: RequestToken,
    loading: bool,
    failed: bool,
}

impl WeekView {
    pub fn new(window: WeekWindow) -> Self {
        Self {
            window,
            data: WeekData::default(),
            latest: 0,
            loading: false,
            failed: false,
        }
    }

    pub fn window(&self) -> WeekWindow {
        self.window
    }

    pub fn data(&self) -> &WeekData {
        &self.data
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn has_failed(&self) -> bool {
        self.failed
    }

    /// Switches to `window` and issues the token its response must carry.
    pub fn begin(&mut self, window: WeekWindow) -> RequestToken {
        self.latest += 1;
        self.window = window;
        self.loading = true;
        self.failed = false;
        self.latest
    }

    /// Returns `false` and leaves the view untouched for a superseded token.
    pub fn apply(&mut self, token: RequestToken, data: WeekData) -> bool {
        if token != self.latest {
            debug!(token, latest = self.latest, "Discarding stale week response");
            return false;
        }
        self.data = data;
        self.loading = false;
        true
    }

    pub fn fail(&mut self, token: RequestToken) -> bool {
        if token != self.latest {
            return false;
        }
        self.data = WeekData::default();
        self.loading = false;
        self.failed = true;
        true
    }

    pub fn grid(&self, slots: &SlotSequence, selection: &Selection, horizon: NaiveDate) -> WeekGrid {
        let mut grid = self.data.grid(slots).week(self.window, selection, horizon);
        grid.partial = self.failed;
        grid
    }
}

/// Drives a [`WeekView`] against a backend.
#[derive(Clone)]
pub struct WeekLoader<T: ReservationBackend> {
    backend: T,
    view: Arc<Mutex<WeekView>>,
}

impl<T: ReservationBackend> WeekLoader<T> {
    pub fn new(backend: T, window: WeekWindow) -> Self {
        Self {
            backend,
            view: Arc::new(Mutex::new(WeekView::new(window))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, WeekView> {
        self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn view(&self) -> WeekView {
        self.lock().clone()
    }

    /// Fetches `window` and shows it unless a newer request was issued in the
    /// meantime. Returns whether this response was applied.
    pub async fn show(&self, window: WeekWindow) -> bool {
        let token = self.lock().begin(window);

        let backend = self.backend.clone();
        let result = tokio::task::spawn_blocking(move || fetch_week(&backend, window)).await;

        match result {
            Ok(Ok(data)) => self.lock().apply(token, data),
            Ok(Err(err)) => {
                warn!(%err, "Failed to load week");
                self.lock().fail(token)
            }
            Err(err) => {
                warn!(%err, "Week loading task failed");
                self.lock().fail(token)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        local_store::LocalStore,
        testutils::{reservation_on, MockReservationBackend},
    };
    use std::{sync::atomic::Ordering, time::Duration};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, day).unwrap()
    }

    #[test]
    fn test_stale_response_is_discarded() {
        let first_week = WeekWindow::containing(date(1));
        let second_week = WeekWindow::containing(date(8));
        let mut view = WeekView::new(first_week);

        let first = view.begin(first_week);
        let second = view.begin(second_week);
        assert!(view.is_loading());

        let second_data = WeekData {
            reservations: vec![reservation_on(date(9), "10:00", "11:00")],
            ..Default::default()
        };
        assert!(view.apply(second, second_data.clone()));
        assert!(!view.is_loading());

        let first_data = WeekData {
            reservations: vec![reservation_on(date(2), "12:00", "13:00")],
            ..Default::default()
        };
        assert!(!view.apply(first, first_data));
        assert!(!view.fail(first));

        assert_eq!(view.window(), second_week);
        assert_eq!(view.data(), &second_data);
        assert!(!view.has_failed());
    }

    #[test]
    fn test_failure_of_latest_request_shows_empty_partial_grid() {
        let window = WeekWindow::containing(date(1));
        let mut view = WeekView::new(window);
        let token = view.begin(window);
        view.apply(
            token,
            WeekData {
                unavailable_days: vec![date(1)],
                ..Default::default()
            },
        );

        let token = view.begin(window);
        assert!(view.fail(token));
        assert!(view.has_failed());
        assert_eq!(view.data(), &WeekData::default());

        let grid = view.grid(&SlotSequence::default(), &Selection::default(), date(31));
        assert!(grid.partial);
        assert!(grid.days.iter().all(|day| !day.blocked));
    }

    #[test]
    fn test_partial_fetch_keeps_what_could_be_read() {
        let backend = MockReservationBackend::new();
        backend
            .0
            .reservations
            .lock()
            .unwrap()
            .push(reservation_on(date(2), "10:00", "11:00"));
        backend.0.unavailable_days.lock().unwrap().push(date(3));

        let window = WeekWindow::containing(date(1));
        let (data, partial) = fetch_week_partial(&backend, window);
        assert!(!partial);
        assert_eq!(data.reservations.len(), 1);
        assert_eq!(data.unavailable_days, vec![date(3)]);

        backend.0.success.store(false, Ordering::SeqCst);
        let (data, partial) = fetch_week_partial(&backend, window);
        assert!(partial);
        assert_eq!(data, WeekData::default());
        fetch_week(&backend, window).unwrap_err();
    }

    #[tokio::test]
    async fn test_loader_keeps_most_recent_week_when_responses_arrive_out_of_order() {
        let backend = MockReservationBackend::new();
        let first_week = WeekWindow::containing(date(1));
        let second_week = WeekWindow::containing(date(8));
        {
            let mut reservations = backend.0.reservations.lock().unwrap();
            reservations.push(reservation_on(date(2), "10:00", "11:00"));
            reservations.push(reservation_on(date(9), "13:00", "14:00"));
        }
        backend
            .0
            .read_delays
            .lock()
            .unwrap()
            .insert(first_week.start(), Duration::from_millis(300));

        let loader = WeekLoader::new(backend.clone(), first_week);
        let slow = loader.show(first_week);
        let fast = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            loader.show(second_week).await
        };
        let (slow_applied, fast_applied) = tokio::join!(slow, fast);

        assert!(!slow_applied);
        assert!(fast_applied);
        let view = loader.view();
        assert_eq!(view.window(), second_week);
        assert_eq!(view.data().reservations.len(), 1);
        assert_eq!(view.data().reservations[0].date, date(9));
        assert!(!view.is_loading());
    }

    #[tokio::test]
    async fn test_loader_reads_from_local_store() {
        let store = LocalStore::default();
        store.add_unavailable_day(date(4)).unwrap();
        let window = WeekWindow::containing(date(1));

        let loader = WeekLoader::new(store, window);
        assert!(loader.show(window).await);

        let grid = loader
            .view()
            .grid(&SlotSequence::default(), &Selection::default(), date(31));
        assert!(grid.days[3].blocked);
        assert!(!grid.partial);
    }
}
