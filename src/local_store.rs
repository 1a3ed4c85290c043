use crate::{
    backend::ReservationBackend,
    error::BookingError,
    types::{NewReservation, Reservation, ReservationUpdate, UnavailableSlot},
};
use chrono::NaiveDate;
use std::{
    collections::{BTreeSet, HashMap},
    sync::{Arc, Mutex, MutexGuard},
};
use tracing::error;
use uuid::Uuid;

#[derive(Debug, Default)]
struct LocalData {
    reservations: HashMap<Uuid, Reservation>,
    unavailable_days: BTreeSet<NaiveDate>,
    unavailable_slots: BTreeSet<UnavailableSlot>,
}

/// In-memory store. Everything is lost on restart.
#[derive(Debug, Clone, Default)]
pub struct LocalStore {
    data: Arc<Mutex<LocalData>>,
}

impl LocalStore {
    fn lock(&self) -> Result<MutexGuard<'_, LocalData>, BookingError> {
        self.data.lock().map_err(|err| {
            error!(%err, "Local store lock poisoned");
            BookingError::Store("Local store is unavailable".into())
        })
    }
}

impl ReservationBackend for LocalStore {
    fn reservations(&self, dates: &[NaiveDate]) -> Result<Vec<Reservation>, BookingError> {
        let mut reservations: Vec<Reservation> = self
            .lock()?
            .reservations
            .values()
            .filter(|reservation| dates.contains(&reservation.date))
            .cloned()
            .collect();
        reservations.sort_unstable_by_key(|reservation| (reservation.date, reservation.start_time));
        Ok(reservations)
    }

    fn reservation(&self, id: Uuid) -> Result<Reservation, BookingError> {
        self.lock()?
            .reservations
            .get(&id)
            .cloned()
            .ok_or_else(|| BookingError::NotFound(format!("Reservation {id}")))
    }

    fn add_reservation(&self, reservation: NewReservation) -> Result<Reservation, BookingError> {
        let reservation = Reservation::from_new(Uuid::new_v4(), reservation);
        self.lock()?
            .reservations
            .insert(reservation.id, reservation.clone());
        Ok(reservation)
    }

    fn update_reservation(
        &self,
        id: Uuid,
        update: ReservationUpdate,
    ) -> Result<Reservation, BookingError> {
        let mut data = self.lock()?;
        let Some(reservation) = data.reservations.get_mut(&id) else {
            let err = BookingError::NotFound(format!("Reservation {id}"));
            error!(%err, "Reservation can't be updated");
            return Err(err);
        };
        *reservation = reservation.updated(&update);
        Ok(reservation.clone())
    }

    fn remove_reservation(&self, id: Uuid) -> Result<(), BookingError> {
        if self.lock()?.reservations.remove(&id).is_none() {
            let err = BookingError::NotFound(format!("Reservation {id}"));
            error!(%err, "Reservation can't be removed");
            return Err(err);
        }
        Ok(())
    }

    fn unavailable_days(&self) -> Result<Vec<NaiveDate>, BookingError> {
        Ok(self.lock()?.unavailable_days.iter().copied().collect())
    }

    fn add_unavailable_day(&self, date: NaiveDate) -> Result<(), BookingError> {
        self.lock()?.unavailable_days.insert(date);
        Ok(())
    }

    fn remove_unavailable_day(&self, date: NaiveDate) -> Result<(), BookingError> {
        if !self.lock()?.unavailable_days.remove(&date) {
            return Err(BookingError::NotFound(format!("Unavailable day {date}")));
        }
        Ok(())
    }

    fn unavailable_slots(&self) -> Result<Vec<UnavailableSlot>, BookingError> {
        Ok(self.lock()?.unavailable_slots.iter().copied().collect())
    }

    fn add_unavailable_slot(&self, slot: UnavailableSlot) -> Result<(), BookingError> {
        self.lock()?.unavailable_slots.insert(slot);
        Ok(())
    }

    fn remove_unavailable_slot(&self, slot: UnavailableSlot) -> Result<(), BookingError> {
        if !self.lock()?.unavailable_slots.remove(&slot) {
            return Err(BookingError::NotFound(format!(
                "Unavailable slot {} {}",
                slot.date, slot.time
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::NaiveTime;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, day).unwrap()
    }

    fn new_reservation(day: u32, start: u32, end: u32, name: &str) -> NewReservation {
        NewReservation {
            date: date(day),
            start_time: NaiveTime::from_hms_opt(start, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end, 0, 0).unwrap(),
            name: name.into(),
            menu: "simple".into(),
            owner: Some(Uuid::new_v4()),
        }
    }

    #[test]
    fn test_add_update_remove_single_reservation() {
        let local_store = LocalStore::default();

        let added = local_store
            .add_reservation(new_reservation(2, 10, 12, "Hanako"))
            .unwrap();

        let reservations = local_store.reservations(&[date(2)]).unwrap();
        assert_eq!(reservations.len(), 1);
        assert_eq!(reservations[0], added);
        assert_eq!(local_store.reservation(added.id).unwrap(), added);

        let update = ReservationUpdate {
            name: Some("Yoko".into()),
            end_time: NaiveTime::from_hms_opt(13, 0, 0),
            ..Default::default()
        };
        let updated = local_store.update_reservation(added.id, update).unwrap();
        assert_eq!(updated.name, "Yoko");
        assert_eq!(updated.end_time, NaiveTime::from_hms_opt(13, 0, 0).unwrap());
        assert_eq!(updated.start_time, added.start_time);
        assert_eq!(updated.menu, added.menu);

        local_store.remove_reservation(added.id).unwrap();
        assert!(local_store.reservations(&[date(2)]).unwrap().is_empty());

        local_store.remove_reservation(added.id).unwrap_err();
        local_store
            .update_reservation(added.id, ReservationUpdate::default())
            .unwrap_err();
        assert_eq!(
            local_store.reservation(added.id).unwrap_err(),
            BookingError::NotFound(format!("Reservation {}", added.id))
        );
    }

    #[test]
    fn test_reservations_filtered_by_date_and_sorted() {
        let local_store = LocalStore::default();
        local_store
            .add_reservation(new_reservation(3, 15, 17, "Third"))
            .unwrap();
        local_store
            .add_reservation(new_reservation(2, 14, 16, "Second"))
            .unwrap();
        local_store
            .add_reservation(new_reservation(2, 10, 12, "First"))
            .unwrap();
        local_store
            .add_reservation(new_reservation(9, 10, 12, "Next week"))
            .unwrap();

        let names: Vec<String> = local_store
            .reservations(&[date(2), date(3)])
            .unwrap()
            .into_iter()
            .map(|reservation| reservation.name)
            .collect();
        assert_eq!(names, vec!["First", "Second", "Third"]);
        assert!(local_store.reservations(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_unavailable_days_and_slots() {
        let local_store = LocalStore::default();

        local_store.add_unavailable_day(date(4)).unwrap();
        local_store.add_unavailable_day(date(1)).unwrap();
        local_store.add_unavailable_day(date(4)).unwrap();
        assert_eq!(local_store.unavailable_days().unwrap(), vec![date(1), date(4)]);

        local_store.remove_unavailable_day(date(4)).unwrap();
        local_store.remove_unavailable_day(date(4)).unwrap_err();
        assert_eq!(local_store.unavailable_days().unwrap(), vec![date(1)]);

        let slot = UnavailableSlot {
            date: date(2),
            time: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
        };
        local_store.add_unavailable_slot(slot).unwrap();
        assert_eq!(local_store.unavailable_slots().unwrap(), vec![slot]);
        local_store.remove_unavailable_slot(slot).unwrap();
        local_store.remove_unavailable_slot(slot).unwrap_err();
        assert!(local_store.unavailable_slots().unwrap().is_empty());
    }
}
