//! Weekly reservation grid.
//!
//! Turns the raw reservation and override lists into per-cell states for a
//! week window and lays out multi-slot reservations as merged bars. The grid
//! keeps no state of its own: it is rebuilt from a fresh read every time.
//!
//! Reservations whose times are not in the slot sequence, or whose end is not
//! after their start, are left out of the grid entirely.

use crate::{
    error::BookingError,
    slots::{format_slot, SlotSequence},
    types::{Reservation, UnavailableSlot},
    week::WeekWindow,
};
use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use std::{
    collections::{BTreeSet, HashSet},
    ops::Range,
};
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum CellState {
    Free,
    Booked { reservation: Uuid },
    Blocked,
    Selected,
}

impl CellState {
    /// Booked and blocked cells can't be picked for a new reservation.
    pub fn is_selectable(&self) -> bool {
        matches!(self, CellState::Free | CellState::Selected)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MergedCell {
    Bar {
        reservation: Uuid,
        slot: String,
        span: usize,
        start_time: String,
        end_time: String,
    },
    Empty {
        slot: String,
        state: CellState,
    },
}

impl MergedCell {
    pub fn width(&self) -> usize {
        match self {
            MergedCell::Bar { span, .. } => *span,
            MergedCell::Empty { .. } => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayRow {
    pub date: NaiveDate,
    pub blocked: bool,
    pub cells: Vec<CellState>,
    pub bars: Vec<MergedCell>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekGrid {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub slots: Vec<String>,
    pub days: Vec<DayRow>,
    pub has_next: bool,
    /// Set when a store read failed and the grid was built from incomplete data.
    pub partial: bool,
}

/// Slot range `[start, end)` covered by a reservation with the given times.
pub fn reservation_range(
    slots: &SlotSequence,
    start_time: NaiveTime,
    end_time: NaiveTime,
) -> Result<Range<usize>, BookingError> {
    let start = slots
        .index_of(start_time)
        .ok_or_else(|| BookingError::InvalidSlot(format_slot(start_time)))?;
    let end = slots
        .index_of(end_time)
        .ok_or_else(|| BookingError::InvalidSlot(format_slot(end_time)))?;
    if start >= end {
        return Err(BookingError::Validation(format!(
            "End time {} must be after start time {}",
            format_slot(end_time),
            format_slot(start_time)
        )));
    }
    Ok(start..end)
}

/// Number of slots the reservation covers, `None` for times outside the
/// sequence. A value of zero or less marks an invalid reservation.
pub fn span(slots: &SlotSequence, reservation: &Reservation) -> Option<isize> {
    let start = slots.index_of(reservation.start_time)? as isize;
    let end = slots.index_of(reservation.end_time)? as isize;
    Some(end - start)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    cells: BTreeSet<(NaiveDate, usize)>,
}

impl Selection {
    pub fn contains(&self, day: NaiveDate, index: usize) -> bool {
        self.cells.contains(&(day, index))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Flips the selection of one cell and returns whether it is selected
    /// afterwards. Booked and blocked cells are refused and leave the
    /// selection unchanged.
    pub fn toggle(
        &mut self,
        grid: &SlotGrid,
        day: NaiveDate,
        slot_label: &str,
    ) -> Result<bool, BookingError> {
        let index = grid
            .slot_index(slot_label)
            .ok_or_else(|| BookingError::InvalidSlot(slot_label.into()))?;
        if !grid.state_at(day, index, &Selection::default()).is_selectable() {
            return Err(BookingError::Validation(format!(
                "{day} {slot_label} is not available"
            )));
        }

        if self.cells.remove(&(day, index)) {
            Ok(false)
        } else {
            self.cells.insert((day, index));
            Ok(true)
        }
    }
}

#[derive(Debug, Clone)]
pub struct SlotGrid {
    slots: SlotSequence,
    reservations: Vec<(Reservation, Range<usize>)>,
    unavailable_days: HashSet<NaiveDate>,
    unavailable_slots: HashSet<(NaiveDate, usize)>,
}

impl SlotGrid {
    pub fn new(
        slots: SlotSequence,
        reservations: Vec<Reservation>,
        unavailable_days: impl IntoIterator<Item = NaiveDate>,
        unavailable_slots: impl IntoIterator<Item = UnavailableSlot>,
    ) -> Self {
        let reservations = reservations
            .into_iter()
            .filter_map(|reservation| {
                match reservation_range(&slots, reservation.start_time, reservation.end_time) {
                    Ok(range) => Some((reservation, range)),
                    Err(err) => {
                        warn!(id = %reservation.id, %err, "Skipping reservation outside the slot grid");
                        None
                    }
                }
            })
            .collect();

        let unavailable_slots = unavailable_slots
            .into_iter()
            .filter_map(|unavailable| match slots.index_of(unavailable.time) {
                Some(index) => Some((unavailable.date, index)),
                None => {
                    warn!(date = %unavailable.date, time = %unavailable.time, "Skipping override for unknown slot");
                    None
                }
            })
            .collect();

        Self {
            slots,
            reservations,
            unavailable_days: unavailable_days.into_iter().collect(),
            unavailable_slots,
        }
    }

    pub fn slots(&self) -> &SlotSequence {
        &self.slots
    }

    pub fn slot_index(&self, label: &str) -> Option<usize> {
        self.slots.slot_index(label)
    }

    /// The reservation that starts exactly at this slot.
    pub fn find_reservation(&self, day: NaiveDate, slot_label: &str) -> Option<&Reservation> {
        let index = self.slot_index(slot_label)?;
        self.starting_at(day, index).map(|(reservation, _)| reservation)
    }

    /// Whether any reservation covers this slot. The end slot itself is free.
    pub fn is_occupied(&self, day: NaiveDate, slot_label: &str) -> bool {
        self.covering_reservation(day, slot_label).is_some()
    }

    /// The reservation whose range contains this slot, wherever it starts.
    pub fn covering_reservation(&self, day: NaiveDate, slot_label: &str) -> Option<&Reservation> {
        let index = self.slot_index(slot_label)?;
        self.occupant_at(day, index)
    }

    pub fn is_blocked(&self, day: NaiveDate, slot_label: &str) -> bool {
        match self.slot_index(slot_label) {
            Some(index) => self.blocked_at(day, index),
            None => self.unavailable_days.contains(&day),
        }
    }

    pub fn cell_state(
        &self,
        day: NaiveDate,
        slot_label: &str,
        selection: &Selection,
    ) -> Option<CellState> {
        let index = self.slot_index(slot_label)?;
        Some(self.state_at(day, index, selection))
    }

    /// Fails unless every slot in `range` is neither booked nor blocked.
    pub fn ensure_available(&self, day: NaiveDate, range: Range<usize>) -> Result<(), BookingError> {
        for index in range {
            let state = self.state_at(day, index, &Selection::default());
            if !state.is_selectable() {
                let label = self.slots.label(index).unwrap_or_default();
                return Err(BookingError::Validation(format!(
                    "{day} {label} is not available"
                )));
            }
        }
        Ok(())
    }

    /// One day laid out left to right. A reservation becomes a single bar as
    /// wide as its span, and the slots it covers emit nothing else.
    pub fn merged_row(&self, day: NaiveDate) -> Vec<MergedCell> {
        let slot_count = self.slots.len();
        let mut cells = vec![];
        let mut index = 0;

        while index < slot_count {
            let slot = self.slots.label(index).unwrap_or_default();
            if let Some((reservation, range)) = self.starting_at(day, index) {
                let span = range.len().min(slot_count - index);
                cells.push(MergedCell::Bar {
                    reservation: reservation.id,
                    slot,
                    span,
                    start_time: format_slot(reservation.start_time),
                    end_time: format_slot(reservation.end_time),
                });
                index += span;
            } else {
                cells.push(MergedCell::Empty {
                    slot,
                    state: self.state_at(day, index, &Selection::default()),
                });
                index += 1;
            }
        }
        cells
    }

    pub fn day_row(&self, day: NaiveDate, selection: &Selection) -> DayRow {
        DayRow {
            date: day,
            blocked: self.unavailable_days.contains(&day),
            cells: (0..self.slots.len())
                .map(|index| self.state_at(day, index, selection))
                .collect(),
            bars: self.merged_row(day),
        }
    }

    pub fn week(&self, window: WeekWindow, selection: &Selection, horizon: NaiveDate) -> WeekGrid {
        WeekGrid {
            week_start: window.start(),
            week_end: window.end(),
            slots: self.slots.labels(),
            days: window
                .dates()
                .into_iter()
                .map(|day| self.day_row(day, selection))
                .collect(),
            has_next: window.has_next(horizon),
            partial: false,
        }
    }

    fn starting_at(&self, day: NaiveDate, index: usize) -> Option<&(Reservation, Range<usize>)> {
        self.reservations
            .iter()
            .find(|(reservation, range)| reservation.date == day && range.start == index)
    }

    fn occupant_at(&self, day: NaiveDate, index: usize) -> Option<&Reservation> {
        self.reservations
            .iter()
            .find(|(reservation, range)| reservation.date == day && range.contains(&index))
            .map(|(reservation, _)| reservation)
    }

    fn blocked_at(&self, day: NaiveDate, index: usize) -> bool {
        self.unavailable_days.contains(&day) || self.unavailable_slots.contains(&(day, index))
    }

    fn state_at(&self, day: NaiveDate, index: usize, selection: &Selection) -> CellState {
        if self.blocked_at(day, index) {
            return CellState::Blocked;
        }
        if let Some(reservation) = self.occupant_at(day, index) {
            return CellState::Booked {
                reservation: reservation.id,
            };
        }
        if selection.contains(day, index) {
            return CellState::Selected;
        }
        CellState::Free
    }
}
