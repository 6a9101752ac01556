use serde::{Deserialize, Serialize};

use crate::models::Booking;

/// Multi-turn cancellation flow state, stored per phone number. Terminal
/// outcomes (confirmed, aborted, nothing found) clear the stored record, so
/// they have no stage here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationState {
    pub stage: CancellationStage,
    pub found: Vec<Booking>,
    pub selected: Option<Booking>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationStage {
    SelectingBooking,
    AwaitingConfirmation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModificationState {
    pub stage: ModificationStage,
    pub found: Vec<Booking>,
    pub selected: Option<Booking>,
    pub pending_field: Option<EditableField>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModificationStage {
    SelectingBooking,
    AwaitingConfirmation,
    ChoosingField,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditableField {
    Date,
    Time,
    PartySize,
    Rice,
}

impl EditableField {
    pub fn label(&self) -> &'static str {
        match self {
            EditableField::Date => "la fecha",
            EditableField::Time => "la hora",
            EditableField::PartySize => "el número de personas",
            EditableField::Rice => "el arroz",
        }
    }
}
