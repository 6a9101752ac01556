use serde::{Deserialize, Serialize};

/// What the model's reply asked the system to do. Each variant carries only
/// the data that applies to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Intent {
    Normal,
    Booking(BookingPayload),
    Cancellation(BookingPayload),
    Modification,
    SameDay,
    Interactive(Vec<String>),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingPayload {
    pub name: String,
    pub phone: String,
    pub date: String,
    pub party_size: u32,
    pub time: String,
    pub rice: Option<String>,
    pub rice_servings: Option<u32>,
    pub high_chairs: Option<u32>,
    pub strollers: Option<u32>,
}
