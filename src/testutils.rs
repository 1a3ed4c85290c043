use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
    backend::ReservationBackend,
    configuration::Configuration,
    error::BookingError,
    slots::{parse_slot_label, SlotSequence},
    types::{NewReservation, Reservation, ReservationUpdate, UnavailableSlot},
};

pub const TEST_ADMIN_PASSWORD: &str = "123";

pub struct MockReservationBackendInner {
    pub success: AtomicBool,
    pub calls_to_reservations: AtomicU64,
    pub calls_to_add_reservation: AtomicU64,
    pub calls_to_update_reservation: AtomicU64,
    pub calls_to_remove_reservation: AtomicU64,
    pub calls_to_add_unavailable_day: AtomicU64,
    pub calls_to_remove_unavailable_day: AtomicU64,
    pub calls_to_add_unavailable_slot: AtomicU64,
    pub calls_to_remove_unavailable_slot: AtomicU64,
    pub reservations: Mutex<Vec<Reservation>>,
    pub unavailable_days: Mutex<Vec<NaiveDate>>,
    pub unavailable_slots: Mutex<Vec<UnavailableSlot>>,
    /// Delay for reservation reads whose first requested date is the key.
    pub read_delays: Mutex<HashMap<NaiveDate, Duration>>,
}

#[derive(Clone)]
pub struct MockReservationBackend(pub Arc<MockReservationBackendInner>);

impl MockReservationBackendInner {
    fn new() -> Self {
        Self {
            success: AtomicBool::new(true),
            calls_to_reservations: AtomicU64::default(),
            calls_to_add_reservation: AtomicU64::default(),
            calls_to_update_reservation: AtomicU64::default(),
            calls_to_remove_reservation: AtomicU64::default(),
            calls_to_add_unavailable_day: AtomicU64::default(),
            calls_to_remove_unavailable_day: AtomicU64::default(),
            calls_to_add_unavailable_slot: AtomicU64::default(),
            calls_to_remove_unavailable_slot: AtomicU64::default(),
            reservations: Mutex::default(),
            unavailable_days: Mutex::default(),
            unavailable_slots: Mutex::default(),
            read_delays: Mutex::default(),
        }
    }
}

impl MockReservationBackend {
    pub fn new() -> Self {
        Self(Arc::new(MockReservationBackendInner::new()))
    }

    fn result(&self) -> Result<(), BookingError> {
        match self.0.success.load(Ordering::SeqCst) {
            true => Ok(()),
            false => Err(BookingError::Store("Supposed to fail".into())),
        }
    }
}

impl ReservationBackend for MockReservationBackend {
    fn reservations(&self, dates: &[NaiveDate]) -> Result<Vec<Reservation>, BookingError> {
        self.0.calls_to_reservations.fetch_add(1, Ordering::SeqCst);
        let delay = dates
            .first()
            .and_then(|first| self.0.read_delays.lock().unwrap().get(first).copied());
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        self.result()?;
        Ok(self
            .0
            .reservations
            .lock()
            .unwrap()
            .iter()
            .filter(|reservation| dates.contains(&reservation.date))
            .cloned()
            .collect())
    }

    fn reservation(&self, id: Uuid) -> Result<Reservation, BookingError> {
        self.result()?;
        self.0
            .reservations
            .lock()
            .unwrap()
            .iter()
            .find(|reservation| reservation.id == id)
            .cloned()
            .ok_or_else(|| BookingError::NotFound(format!("Reservation {id}")))
    }

    fn add_reservation(&self, reservation: NewReservation) -> Result<Reservation, BookingError> {
        self.0
            .calls_to_add_reservation
            .fetch_add(1, Ordering::SeqCst);
        self.result()?;
        let reservation = Reservation::from_new(Uuid::new_v4(), reservation);
        self.0
            .reservations
            .lock()
            .unwrap()
            .push(reservation.clone());
        Ok(reservation)
    }

    fn update_reservation(
        &self,
        id: Uuid,
        update: ReservationUpdate,
    ) -> Result<Reservation, BookingError> {
        self.0
            .calls_to_update_reservation
            .fetch_add(1, Ordering::SeqCst);
        self.result()?;
        let mut reservations = self.0.reservations.lock().unwrap();
        let reservation = reservations
            .iter_mut()
            .find(|reservation| reservation.id == id)
            .ok_or_else(|| BookingError::NotFound(format!("Reservation {id}")))?;
        *reservation = reservation.updated(&update);
        Ok(reservation.clone())
    }

    fn remove_reservation(&self, id: Uuid) -> Result<(), BookingError> {
        self.0
            .calls_to_remove_reservation
            .fetch_add(1, Ordering::SeqCst);
        self.result()?;
        self.0
            .reservations
            .lock()
            .unwrap()
            .retain(|reservation| reservation.id != id);
        Ok(())
    }

    fn unavailable_days(&self) -> Result<Vec<NaiveDate>, BookingError> {
        self.result()?;
        Ok(self.0.unavailable_days.lock().unwrap().clone())
    }

    fn add_unavailable_day(&self, date: NaiveDate) -> Result<(), BookingError> {
        self.0
            .calls_to_add_unavailable_day
            .fetch_add(1, Ordering::SeqCst);
        self.result()?;
        self.0.unavailable_days.lock().unwrap().push(date);
        Ok(())
    }

    fn remove_unavailable_day(&self, date: NaiveDate) -> Result<(), BookingError> {
        self.0
            .calls_to_remove_unavailable_day
            .fetch_add(1, Ordering::SeqCst);
        self.result()?;
        self.0
            .unavailable_days
            .lock()
            .unwrap()
            .retain(|day| *day != date);
        Ok(())
    }

    fn unavailable_slots(&self) -> Result<Vec<UnavailableSlot>, BookingError> {
        self.result()?;
        Ok(self.0.unavailable_slots.lock().unwrap().clone())
    }

    fn add_unavailable_slot(&self, slot: UnavailableSlot) -> Result<(), BookingError> {
        self.0
            .calls_to_add_unavailable_slot
            .fetch_add(1, Ordering::SeqCst);
        self.result()?;
        self.0.unavailable_slots.lock().unwrap().push(slot);
        Ok(())
    }

    fn remove_unavailable_slot(&self, slot: UnavailableSlot) -> Result<(), BookingError> {
        self.0
            .calls_to_remove_unavailable_slot
            .fetch_add(1, Ordering::SeqCst);
        self.result()?;
        self.0
            .unavailable_slots
            .lock()
            .unwrap()
            .retain(|existing| *existing != slot);
        Ok(())
    }
}

pub fn reservation_on(date: NaiveDate, start: &str, end: &str) -> Reservation {
    Reservation {
        id: Uuid::new_v4(),
        date,
        start_time: parse_slot_label(start).unwrap(),
        end_time: parse_slot_label(end).unwrap(),
        name: "Hanako".into(),
        menu: "simple".into(),
        owner: None,
    }
}

#[derive(Clone)]
pub struct TestConfiguration;

impl Configuration for TestConfiguration {
    fn admin_password(&self) -> String {
        TEST_ADMIN_PASSWORD.into()
    }

    fn port(&self) -> String {
        "0".into()
    }

    fn database_url(&self) -> Option<String> {
        None
    }

    fn slot_sequence(&self) -> Result<SlotSequence, BookingError> {
        Ok(SlotSequence::default())
    }

    fn booking_horizon_months(&self) -> u32 {
        3
    }
}
