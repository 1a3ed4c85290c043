use crate::schema::{reservations, unavailable_times};
use chrono::{Duration, NaiveDate, NaiveTime};
use diesel::{AsChangeset, Insertable, Queryable, Selectable};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = reservations)]
pub struct Reservation {
    pub id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub name: String,
    pub menu: String,
    pub owner: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Insertable)]
#[diesel(table_name = reservations)]
pub struct NewReservation {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub name: String,
    pub menu: String,
    pub owner: Option<Uuid>,
}

/// Partial edit of a reservation. `None` fields stay untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, AsChangeset)]
#[diesel(table_name = reservations)]
pub struct ReservationUpdate {
    pub date: Option<NaiveDate>,
    pub name: Option<String>,
    pub menu: Option<String>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
}

impl ReservationUpdate {
    pub fn is_empty(&self) -> bool {
        self.date.is_none()
            && self.name.is_none()
            && self.menu.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
    }
}

impl Reservation {
    pub fn from_new(id: Uuid, new: NewReservation) -> Self {
        Self {
            id,
            date: new.date,
            start_time: new.start_time,
            end_time: new.end_time,
            name: new.name,
            menu: new.menu,
            owner: new.owner,
        }
    }

    pub fn updated(&self, update: &ReservationUpdate) -> Self {
        let mut reservation = self.clone();
        if let Some(date) = update.date {
            reservation.date = date;
        }
        if let Some(name) = &update.name {
            reservation.name = name.clone();
        }
        if let Some(menu) = &update.menu {
            reservation.menu = menu.clone();
        }
        if let Some(start_time) = update.start_time {
            reservation.start_time = start_time;
        }
        if let Some(end_time) = update.end_time {
            reservation.end_time = end_time;
        }
        reservation
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Queryable,
    Selectable,
    Insertable,
)]
#[diesel(table_name = unavailable_times)]
pub struct UnavailableSlot {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Menu {
    Design,
    Simple,
}

impl Menu {
    pub fn duration(&self) -> Duration {
        match self {
            Menu::Design => Duration::minutes(150),
            Menu::Simple => Duration::minutes(120),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Menu::Design => "design",
            Menu::Simple => "simple",
        }
    }
}

impl fmt::Display for Menu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: Uuid,
    pub user: User,
}
