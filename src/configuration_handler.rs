use crate::{
    configuration::Configuration,
    error::BookingError,
    slots::{parse_slot_label, SlotSequence, DEFAULT_CLOSING, DEFAULT_OPENING, DEFAULT_SLOT_MINUTES},
};
use clap::Parser;
use tracing::info;

/// Command line and environment configuration. A `.env` file in the working
/// directory is read first.
#[derive(Parser, Debug, Clone)]
#[command(name = "nail_booking", about = "Reservation grid and booking API for the salon")]
pub struct ConfigurationHandler {
    #[arg(long, env = "PORT", default_value = "3000")]
    port: String,

    /// Without a database, reservations are kept in memory only.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[arg(long, env = "ADMIN_PASSWORD")]
    admin_password: String,

    #[arg(long, env = "OPENING_TIME", default_value = DEFAULT_OPENING)]
    opening_time: String,

    /// Start of the last bookable slot.
    #[arg(long, env = "CLOSING_TIME", default_value = DEFAULT_CLOSING)]
    closing_time: String,

    #[arg(long, env = "SLOT_MINUTES", default_value_t = DEFAULT_SLOT_MINUTES)]
    slot_minutes: u32,

    #[arg(long, env = "BOOKING_HORIZON_MONTHS", default_value_t = 3)]
    booking_horizon_months: u32,
}

impl ConfigurationHandler {
    pub fn parse_arguments() -> Self {
        match dotenvy::dotenv() {
            Ok(path) => info!(path = %path.display(), "Loaded environment file"),
            Err(err) => info!(%err, "No environment file loaded"),
        }
        Self::parse()
    }
}

impl Configuration for ConfigurationHandler {
    fn admin_password(&self) -> String {
        self.admin_password.clone()
    }

    fn port(&self) -> String {
        self.port.clone()
    }

    fn database_url(&self) -> Option<String> {
        self.database_url.clone()
    }

    fn slot_sequence(&self) -> Result<SlotSequence, BookingError> {
        let opening = parse_slot_label(&self.opening_time)
            .ok_or_else(|| BookingError::InvalidSlot(self.opening_time.clone()))?;
        let closing = parse_slot_label(&self.closing_time)
            .ok_or_else(|| BookingError::InvalidSlot(self.closing_time.clone()))?;
        SlotSequence::from_range(opening, closing, self.slot_minutes)
    }

    fn booking_horizon_months(&self) -> u32 {
        self.booking_horizon_months
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_custom_opening_hours() {
        let configuration = ConfigurationHandler::try_parse_from([
            "nail_booking",
            "--admin-password",
            "secret",
            "--opening-time",
            "09:00",
            "--closing-time",
            "12:00",
            "--slot-minutes",
            "60",
            "--booking-horizon-months",
            "2",
        ])
        .unwrap();

        assert_eq!(configuration.admin_password(), "secret");
        assert_eq!(configuration.booking_horizon_months(), 2);
        assert_eq!(
            configuration.slot_sequence().unwrap().labels(),
            vec!["09:00", "10:00", "11:00", "12:00"]
        );
    }

    #[test]
    fn test_invalid_opening_time() {
        let configuration = ConfigurationHandler::try_parse_from([
            "nail_booking",
            "--admin-password",
            "secret",
            "--opening-time",
            "morning",
        ])
        .unwrap();

        assert_eq!(
            configuration.slot_sequence().unwrap_err(),
            BookingError::InvalidSlot("morning".into())
        );
    }
}
