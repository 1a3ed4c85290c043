//! The fixed, ordered sequence of bookable time slots.
//!
//! A slot is identified by its position in the sequence. Every range
//! comparison in the grid goes through [`SlotSequence::slot_index`], never
//! through string or time ordering of the labels themselves.

use crate::error::BookingError;
use chrono::{Duration, NaiveTime, Timelike};

pub const DEFAULT_OPENING: &str = "10:00";
pub const DEFAULT_CLOSING: &str = "19:00";
pub const DEFAULT_SLOT_MINUTES: u32 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSequence {
    slots: Vec<NaiveTime>,
}

impl SlotSequence {
    /// Slots must be non-empty and strictly increasing.
    pub fn new(slots: Vec<NaiveTime>) -> Result<Self, BookingError> {
        if slots.is_empty() {
            return Err(BookingError::Validation(
                "Slot sequence must not be empty".into(),
            ));
        }
        let slots: Vec<NaiveTime> = slots.into_iter().map(truncate_to_minute).collect();
        if slots.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(BookingError::Validation(
                "Slot sequence must be strictly increasing".into(),
            ));
        }
        Ok(Self { slots })
    }

    /// Every `step_minutes` from `opening` up to and including `closing`.
    pub fn from_range(
        opening: NaiveTime,
        closing: NaiveTime,
        step_minutes: u32,
    ) -> Result<Self, BookingError> {
        if step_minutes == 0 {
            return Err(BookingError::Validation(
                "Slot length must be at least one minute".into(),
            ));
        }
        if opening > closing {
            return Err(BookingError::Validation(format!(
                "Opening time {} is after closing time {}",
                format_slot(opening),
                format_slot(closing)
            )));
        }

        let step = Duration::minutes(step_minutes.into());
        let mut slots = vec![];
        let mut current = opening;
        while current <= closing {
            slots.push(current);
            let (next, wrapped) = current.overflowing_add_signed(step);
            if wrapped != 0 {
                break;
            }
            current = next;
        }
        Self::new(slots)
    }

    pub fn from_labels(labels: &[&str]) -> Result<Self, BookingError> {
        let slots = labels
            .iter()
            .map(|label| parse_slot_label(label).ok_or_else(|| BookingError::InvalidSlot((*label).into())))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(slots)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn labels(&self) -> Vec<String> {
        self.slots.iter().copied().map(format_slot).collect()
    }

    pub fn label(&self, index: usize) -> Option<String> {
        self.slots.get(index).copied().map(format_slot)
    }

    pub fn time(&self, index: usize) -> Option<NaiveTime> {
        self.slots.get(index).copied()
    }

    /// Position of `time` after truncation to `HH:MM`.
    pub fn index_of(&self, time: NaiveTime) -> Option<usize> {
        self.slots.binary_search(&truncate_to_minute(time)).ok()
    }

    /// Accepts `HH:MM` and `HH:MM:SS`. Anything else, including times that
    /// fall between two slots, is `None`.
    pub fn slot_index(&self, label: &str) -> Option<usize> {
        parse_slot_label(label).and_then(|time| self.index_of(time))
    }
}

impl Default for SlotSequence {
    fn default() -> Self {
        let opening = NaiveTime::from_hms_opt(10, 0, 0).unwrap_or(NaiveTime::MIN);
        let closing = NaiveTime::from_hms_opt(19, 0, 0).unwrap_or(NaiveTime::MIN);
        let slots = std::iter::successors(Some(opening), |time| {
            Some(*time + Duration::minutes(DEFAULT_SLOT_MINUTES.into()))
        })
        .take_while(|time| *time <= closing)
        .collect();
        Self { slots }
    }
}

pub fn parse_slot_label(label: &str) -> Option<NaiveTime> {
    let label = label.trim();
    let hours_minutes = match label.len() {
        5 => label,
        8 => {
            NaiveTime::parse_from_str(label, "%H:%M:%S").ok()?;
            &label[..5]
        }
        _ => return None,
    };
    NaiveTime::parse_from_str(hours_minutes, "%H:%M").ok()
}

pub fn format_slot(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

fn truncate_to_minute(time: NaiveTime) -> NaiveTime {
    NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time)
}
