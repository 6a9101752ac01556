use crate::models::{Booking, BookingPayload, CancellationState, ModificationState};

/// Booking lookup and mutation collaborator. `future_bookings` only returns
/// active bookings from today onward.
pub trait BookingStore: Send + Sync {
    fn future_bookings(&self, phone: &str) -> anyhow::Result<Vec<Booking>>;
    fn create(&self, payload: &BookingPayload) -> anyhow::Result<Option<String>>;
    fn cancel(&self, id: &str) -> anyhow::Result<bool>;
    fn archive(&self, booking: &Booking, actor: &str) -> anyhow::Result<bool>;
}

/// Per-phone-number store for multi-turn flow state. Entries carry the same
/// expiry policy as the conversation history; a cleared entry simply means
/// "no flow in progress".
pub trait FlowStore: Send + Sync {
    fn cancellation(&self, phone: &str) -> anyhow::Result<Option<CancellationState>>;
    fn set_cancellation(&self, phone: &str, state: &CancellationState) -> anyhow::Result<()>;
    fn clear_cancellation(&self, phone: &str) -> anyhow::Result<()>;

    fn modification(&self, phone: &str) -> anyhow::Result<Option<ModificationState>>;
    fn set_modification(&self, phone: &str, state: &ModificationState) -> anyhow::Result<()>;
    fn clear_modification(&self, phone: &str) -> anyhow::Result<()>;
}
