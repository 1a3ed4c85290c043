use crate::error::BookingError;
use crate::types::{NewReservation, Reservation, ReservationUpdate, UnavailableSlot};
use chrono::NaiveDate;
use uuid::Uuid;

/// Reservation store and availability-override store.
pub trait ReservationBackend: Clone + Send + Sync + 'static {
    /// Reservations whose date is one of `dates`.
    fn reservations(&self, dates: &[NaiveDate]) -> Result<Vec<Reservation>, BookingError>;
    fn reservation(&self, id: Uuid) -> Result<Reservation, BookingError>;
    fn add_reservation(&self, reservation: NewReservation) -> Result<Reservation, BookingError>;
    fn update_reservation(
        &self,
        id: Uuid,
        update: ReservationUpdate,
    ) -> Result<Reservation, BookingError>;
    fn remove_reservation(&self, id: Uuid) -> Result<(), BookingError>;

    fn unavailable_days(&self) -> Result<Vec<NaiveDate>, BookingError>;
    fn add_unavailable_day(&self, date: NaiveDate) -> Result<(), BookingError>;
    fn remove_unavailable_day(&self, date: NaiveDate) -> Result<(), BookingError>;

    fn unavailable_slots(&self) -> Result<Vec<UnavailableSlot>, BookingError>;
    fn add_unavailable_slot(&self, slot: UnavailableSlot) -> Result<(), BookingError>;
    fn remove_unavailable_slot(&self, slot: UnavailableSlot) -> Result<(), BookingError>;

    /// Blocks the day if it is bookable and unblocks it otherwise. Returns
    /// whether the day is blocked afterwards. Not atomic: the last writer wins.
    fn toggle_unavailable_day(&self, date: NaiveDate) -> Result<bool, BookingError> {
        if self.unavailable_days()?.contains(&date) {
            self.remove_unavailable_day(date)?;
            Ok(false)
        } else {
            self.add_unavailable_day(date)?;
            Ok(true)
        }
    }

    fn toggle_unavailable_slot(&self, slot: UnavailableSlot) -> Result<bool, BookingError> {
        if self.unavailable_slots()?.contains(&slot) {
            self.remove_unavailable_slot(slot)?;
            Ok(false)
        } else {
            self.add_unavailable_slot(slot)?;
            Ok(true)
        }
    }
}
