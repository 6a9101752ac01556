pub mod availability;
pub mod booking;
pub mod conversation;
pub mod flow;
pub mod intent;

pub use availability::AvailabilityStatus;
pub use booking::{Booking, BookingStatus};
pub use conversation::{
    Conversation, ConversationMessage, ConversationState, Field, RiceDecision, Stage,
};
pub use flow::{
    CancellationStage, CancellationState, EditableField, ModificationStage, ModificationState,
};
pub use intent::{BookingPayload, Intent};
