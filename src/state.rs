use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::services::ai::LlmProvider;
use crate::services::availability::AvailabilityPolicy;
use crate::services::menu::MenuProvider;
use crate::services::messaging::MessagingProvider;
use crate::services::store::{BookingStore, FlowStore};

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub llm: Box<dyn LlmProvider>,
    pub messaging: Box<dyn MessagingProvider>,
    pub menu: Box<dyn MenuProvider>,
    pub bookings: Box<dyn BookingStore>,
    pub flows: Box<dyn FlowStore>,
    pub availability: AvailabilityPolicy,
}
