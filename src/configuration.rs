use crate::{error::BookingError, slots::SlotSequence};

pub trait Configuration: Clone + Send + Sync + 'static {
    fn admin_password(&self) -> String;
    fn port(&self) -> String;
    fn database_url(&self) -> Option<String>;
    fn slot_sequence(&self) -> Result<SlotSequence, BookingError>;
    /// How many months ahead of today a displayed week may start.
    fn booking_horizon_months(&self) -> u32;
}
