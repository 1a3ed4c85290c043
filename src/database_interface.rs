use crate::schema::{reservations, unavailable_days, unavailable_times};
use crate::types::{NewReservation, Reservation, ReservationUpdate, UnavailableSlot};
use crate::{backend::ReservationBackend, error::BookingError};
use chrono::NaiveDate;
use diesel::{
    Connection, ConnectionError, ExpressionMethods, PgConnection, QueryDsl, RunQueryDsl,
    SelectableHelper,
};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::error;
use uuid::Uuid;

#[derive(Clone)]
pub struct DatabaseInterface {
    connection: Arc<Mutex<PgConnection>>,
}

impl DatabaseInterface {
    pub fn new(database_url: &str) -> Result<Self, ConnectionError> {
        let connection = Self::establish_connection(database_url)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    fn establish_connection(database_url: &str) -> Result<PgConnection, ConnectionError> {
        PgConnection::establish(database_url)
    }

    fn connection(&self) -> Result<MutexGuard<'_, PgConnection>, BookingError> {
        self.connection.lock().map_err(|err| {
            error!(%err, "Database connection lock poisoned");
            BookingError::Store("Database connection is unavailable".into())
        })
    }
}

fn store_error(context: &str) -> impl Fn(diesel::result::Error) -> BookingError + '_ {
    move |err| {
        error!(%err, "{context}");
        BookingError::Store(context.into())
    }
}

impl ReservationBackend for DatabaseInterface {
    fn reservations(&self, dates: &[NaiveDate]) -> Result<Vec<Reservation>, BookingError> {
        let mut connection = self.connection()?;
        reservations::table
            .filter(reservations::date.eq_any(dates.to_vec()))
            .order((reservations::date, reservations::start_time))
            .select(Reservation::as_select())
            .load(&mut *connection)
            .map_err(store_error("Failed to read reservations"))
    }

    fn reservation(&self, id: Uuid) -> Result<Reservation, BookingError> {
        let mut connection = self.connection()?;
        match reservations::table
            .find(id)
            .select(Reservation::as_select())
            .first(&mut *connection)
        {
            Ok(reservation) => Ok(reservation),
            Err(diesel::result::Error::NotFound) => {
                Err(BookingError::NotFound(format!("Reservation {id}")))
            }
            Err(err) => Err(store_error("Failed to read reservation")(err)),
        }
    }

    fn add_reservation(&self, reservation: NewReservation) -> Result<Reservation, BookingError> {
        let mut connection = self.connection()?;
        diesel::insert_into(reservations::table)
            .values(&reservation)
            .returning(Reservation::as_returning())
            .get_result(&mut *connection)
            .map_err(store_error("Reservation can't be added"))
    }

    fn update_reservation(
        &self,
        id: Uuid,
        update: ReservationUpdate,
    ) -> Result<Reservation, BookingError> {
        if update.is_empty() {
            return self.reservation(id);
        }

        let mut connection = self.connection()?;
        match diesel::update(reservations::table.find(id))
            .set(&update)
            .returning(Reservation::as_returning())
            .get_result(&mut *connection)
        {
            Ok(reservation) => Ok(reservation),
            Err(diesel::result::Error::NotFound) => {
                Err(BookingError::NotFound(format!("Reservation {id}")))
            }
            Err(err) => Err(store_error("Reservation can't be updated")(err)),
        }
    }

    fn remove_reservation(&self, id: Uuid) -> Result<(), BookingError> {
        let mut connection = self.connection()?;
        let result = diesel::delete(reservations::table.find(id)).execute(&mut *connection);

        match result {
            Ok(0) => {
                error!("Deletion failed. 0 database lines were changed");
                Err(BookingError::NotFound(format!("Reservation {id}")))
            }
            Ok(_) => Ok(()),
            Err(err) => Err(store_error("Deletion of reservation failed")(err)),
        }
    }

    fn unavailable_days(&self) -> Result<Vec<NaiveDate>, BookingError> {
        let mut connection = self.connection()?;
        unavailable_days::table
            .select(unavailable_days::date)
            .order(unavailable_days::date)
            .load(&mut *connection)
            .map_err(store_error("Failed to read unavailable days"))
    }

    fn add_unavailable_day(&self, date: NaiveDate) -> Result<(), BookingError> {
        let mut connection = self.connection()?;
        diesel::insert_into(unavailable_days::table)
            .values(unavailable_days::date.eq(date))
            .on_conflict_do_nothing()
            .execute(&mut *connection)
            .map(|_| ())
            .map_err(store_error("Unavailable day can't be added"))
    }

    fn remove_unavailable_day(&self, date: NaiveDate) -> Result<(), BookingError> {
        let mut connection = self.connection()?;
        match diesel::delete(unavailable_days::table.find(date)).execute(&mut *connection) {
            Ok(0) => Err(BookingError::NotFound(format!("Unavailable day {date}"))),
            Ok(_) => Ok(()),
            Err(err) => Err(store_error("Unavailable day can't be removed")(err)),
        }
    }

    fn unavailable_slots(&self) -> Result<Vec<UnavailableSlot>, BookingError> {
        let mut connection = self.connection()?;
        unavailable_times::table
            .order((unavailable_times::date, unavailable_times::time))
            .select(UnavailableSlot::as_select())
            .load(&mut *connection)
            .map_err(store_error("Failed to read unavailable slots"))
    }

    fn add_unavailable_slot(&self, slot: UnavailableSlot) -> Result<(), BookingError> {
        let mut connection = self.connection()?;
        diesel::insert_into(unavailable_times::table)
            .values(&slot)
            .on_conflict_do_nothing()
            .execute(&mut *connection)
            .map(|_| ())
            .map_err(store_error("Unavailable slot can't be added"))
    }

    fn remove_unavailable_slot(&self, slot: UnavailableSlot) -> Result<(), BookingError> {
        let mut connection = self.connection()?;
        match diesel::delete(unavailable_times::table.find((slot.date, slot.time)))
            .execute(&mut *connection)
        {
            Ok(0) => Err(BookingError::NotFound(format!(
                "Unavailable slot {} {}",
                slot.date, slot.time
            ))),
            Ok(_) => Ok(()),
            Err(err) => Err(store_error("Unavailable slot can't be removed")(err)),
        }
    }
}
