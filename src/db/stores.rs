use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, NaiveTime, Utc};
use rusqlite::Connection;

use crate::db::queries;
use crate::models::{
    Booking, BookingPayload, BookingStatus, CancellationState, ModificationState,
};
use crate::services::menu::MenuProvider;
use crate::services::store::{BookingStore, FlowStore};

const CANCELLATION_KIND: &str = "cancellation";
const MODIFICATION_KIND: &str = "modification";

pub struct SqliteMenu {
    db: Arc<Mutex<Connection>>,
}

impl SqliteMenu {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }
}

impl MenuProvider for SqliteMenu {
    fn active_dishes(&self) -> anyhow::Result<Vec<String>> {
        let db = self.db.lock().unwrap();
        queries::active_dishes(&db)
    }
}

pub struct SqliteBookingStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteBookingStore {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }
}

impl BookingStore for SqliteBookingStore {
    fn future_bookings(&self, phone: &str) -> anyhow::Result<Vec<Booking>> {
        let db = self.db.lock().unwrap();
        queries::future_bookings(&db, phone, Utc::now().date_naive())
    }

    fn create(&self, payload: &BookingPayload) -> anyhow::Result<Option<String>> {
        let Ok(date) = NaiveDate::parse_from_str(&payload.date, "%d/%m/%Y") else {
            tracing::warn!(date = %payload.date, "unparseable booking date, not creating");
            return Ok(None);
        };
        let Ok(time) = NaiveTime::parse_from_str(&payload.time, "%H:%M") else {
            tracing::warn!(time = %payload.time, "unparseable booking time, not creating");
            return Ok(None);
        };

        let now = Utc::now().naive_utc();
        let booking = Booking {
            id: uuid::Uuid::new_v4().to_string(),
            customer_name: payload.name.clone(),
            customer_phone: payload.phone.clone(),
            date,
            time,
            party_size: payload.party_size,
            rice: payload.rice.clone(),
            rice_servings: payload.rice_servings,
            high_chairs: payload.high_chairs,
            strollers: payload.strollers,
            status: BookingStatus::Confirmed,
            created_at: now,
            updated_at: now,
        };

        let db = self.db.lock().unwrap();
        queries::create_booking(&db, &booking)?;
        Ok(Some(booking.id))
    }

    fn cancel(&self, id: &str) -> anyhow::Result<bool> {
        let db = self.db.lock().unwrap();
        queries::cancel_booking(&db, id)
    }

    fn archive(&self, booking: &Booking, actor: &str) -> anyhow::Result<bool> {
        let db = self.db.lock().unwrap();
        queries::archive_booking(&db, booking, actor)?;
        Ok(true)
    }
}

/// Flow state rows share the conversation TTL so an abandoned flow expires
/// with its conversation instead of trapping the next one.
pub struct SqliteFlowStore {
    db: Arc<Mutex<Connection>>,
    ttl_minutes: i64,
}

impl SqliteFlowStore {
    pub fn new(db: Arc<Mutex<Connection>>, ttl_minutes: i64) -> Self {
        Self { db, ttl_minutes }
    }
}

impl FlowStore for SqliteFlowStore {
    fn cancellation(&self, phone: &str) -> anyhow::Result<Option<CancellationState>> {
        let db = self.db.lock().unwrap();
        match queries::get_flow_state(&db, phone, CANCELLATION_KIND)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn set_cancellation(&self, phone: &str, state: &CancellationState) -> anyhow::Result<()> {
        let json = serde_json::to_string(state)?;
        let db = self.db.lock().unwrap();
        queries::set_flow_state(&db, phone, CANCELLATION_KIND, &json, self.ttl_minutes)
    }

    fn clear_cancellation(&self, phone: &str) -> anyhow::Result<()> {
        let db = self.db.lock().unwrap();
        queries::clear_flow_state(&db, phone, CANCELLATION_KIND)
    }

    fn modification(&self, phone: &str) -> anyhow::Result<Option<ModificationState>> {
        let db = self.db.lock().unwrap();
        match queries::get_flow_state(&db, phone, MODIFICATION_KIND)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn set_modification(&self, phone: &str, state: &ModificationState) -> anyhow::Result<()> {
        let json = serde_json::to_string(state)?;
        let db = self.db.lock().unwrap();
        queries::set_flow_state(&db, phone, MODIFICATION_KIND, &json, self.ttl_minutes)
    }

    fn clear_modification(&self, phone: &str) -> anyhow::Result<()> {
        let db = self.db.lock().unwrap();
        queries::clear_flow_state(&db, phone, MODIFICATION_KIND)
    }
}
