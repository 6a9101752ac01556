use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rusqlite::{params, Connection};

use crate::models::{Booking, BookingStatus, Conversation, ConversationMessage};

// ── Conversations ──

pub fn get_conversation(conn: &Connection, phone: &str) -> anyhow::Result<Option<Conversation>> {
    let now = Utc::now().naive_utc().format("%Y-%m-%d %H:%M:%S").to_string();
    let mut stmt = conn.prepare(
        "SELECT phone, messages, last_activity, expires_at FROM conversations
         WHERE phone = ?1 AND expires_at > ?2",
    )?;

    let result = stmt.query_row(params![phone, now], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    });

    match result {
        Ok((phone, messages_json, last_activity_str, expires_at_str)) => {
            let messages: Vec<ConversationMessage> =
                serde_json::from_str(&messages_json).unwrap_or_default();
            Ok(Some(Conversation {
                phone,
                messages,
                last_activity: parse_datetime(&last_activity_str),
                expires_at: parse_datetime(&expires_at_str),
            }))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn save_conversation(conn: &Connection, conv: &Conversation) -> anyhow::Result<()> {
    let messages_json = serde_json::to_string(&conv.messages)?;
    conn.execute(
        "INSERT INTO conversations (phone, messages, last_activity, expires_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(phone) DO UPDATE SET
           messages = excluded.messages,
           last_activity = excluded.last_activity,
           expires_at = excluded.expires_at",
        params![
            conv.phone,
            messages_json,
            conv.last_activity.format("%Y-%m-%d %H:%M:%S").to_string(),
            conv.expires_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ],
    )?;
    Ok(())
}

pub fn expire_old_conversations(conn: &Connection) -> anyhow::Result<usize> {
    let now = Utc::now().naive_utc().format("%Y-%m-%d %H:%M:%S").to_string();
    let count = conn.execute(
        "DELETE FROM conversations WHERE expires_at <= ?1",
        params![now],
    )?;
    Ok(count)
}

// ── Bookings ──

pub fn create_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, customer_name, customer_phone, date, time, party_size,
                               rice, rice_servings, high_chairs, strollers, status,
                               created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            booking.id,
            booking.customer_name,
            booking.customer_phone,
            booking.date.format("%Y-%m-%d").to_string(),
            booking.time.format("%H:%M").to_string(),
            booking.party_size,
            booking.rice,
            booking.rice_servings,
            booking.high_chairs,
            booking.strollers,
            booking.status.as_str(),
            booking.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            booking.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ],
    )?;
    Ok(())
}

pub fn future_bookings(
    conn: &Connection,
    phone: &str,
    from: NaiveDate,
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(
        "SELECT id, customer_name, customer_phone, date, time, party_size,
                rice, rice_servings, high_chairs, strollers, status, created_at, updated_at
         FROM bookings
         WHERE customer_phone = ?1 AND status = 'confirmed' AND date >= ?2
         ORDER BY date ASC, time ASC",
    )?;

    let rows = stmt.query_map(
        params![phone, from.format("%Y-%m-%d").to_string()],
        |row| Ok(parse_booking_row(row)),
    )?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn upcoming_bookings(conn: &Connection, from: NaiveDate) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(
        "SELECT id, customer_name, customer_phone, date, time, party_size,
                rice, rice_servings, high_chairs, strollers, status, created_at, updated_at
         FROM bookings
         WHERE status = 'confirmed' AND date >= ?1
         ORDER BY date ASC, time ASC",
    )?;

    let rows = stmt.query_map(params![from.format("%Y-%m-%d").to_string()], |row| {
        Ok(parse_booking_row(row))
    })?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn cancel_booking(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let now = Utc::now().naive_utc().format("%Y-%m-%d %H:%M:%S").to_string();
    let count = conn.execute(
        "UPDATE bookings SET status = 'cancelled', updated_at = ?1 WHERE id = ?2 AND status != 'cancelled'",
        params![now, id],
    )?;
    Ok(count > 0)
}

pub fn archive_booking(conn: &Connection, booking: &Booking, actor: &str) -> anyhow::Result<()> {
    let payload = serde_json::to_string(booking)?;
    conn.execute(
        "INSERT INTO bookings_archive (booking_id, payload, archived_by) VALUES (?1, ?2, ?3)",
        params![booking.id, payload, actor],
    )?;
    Ok(())
}

// ── Menu ──

pub fn active_dishes(conn: &Connection) -> anyhow::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM menu_items WHERE active = 1 ORDER BY id ASC")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

    let mut dishes = vec![];
    for row in rows {
        dishes.push(row?);
    }
    Ok(dishes)
}

// ── Flow state ──

pub fn get_flow_state(
    conn: &Connection,
    phone: &str,
    kind: &str,
) -> anyhow::Result<Option<String>> {
    let now = Utc::now().naive_utc().format("%Y-%m-%d %H:%M:%S").to_string();
    let result = conn.query_row(
        "SELECT state FROM flow_states WHERE phone = ?1 AND kind = ?2 AND expires_at > ?3",
        params![phone, kind, now],
        |row| row.get::<_, String>(0),
    );

    match result {
        Ok(state) => Ok(Some(state)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn set_flow_state(
    conn: &Connection,
    phone: &str,
    kind: &str,
    state: &str,
    ttl_minutes: i64,
) -> anyhow::Result<()> {
    let expires_at = (Utc::now().naive_utc() + chrono::Duration::minutes(ttl_minutes))
        .format("%Y-%m-%d %H:%M:%S")
        .to_string();
    conn.execute(
        "INSERT INTO flow_states (phone, kind, state, expires_at) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(phone, kind) DO UPDATE SET
           state = excluded.state,
           expires_at = excluded.expires_at",
        params![phone, kind, state, expires_at],
    )?;
    Ok(())
}

pub fn clear_flow_state(conn: &Connection, phone: &str, kind: &str) -> anyhow::Result<()> {
    conn.execute(
        "DELETE FROM flow_states WHERE phone = ?1 AND kind = ?2",
        params![phone, kind],
    )?;
    Ok(())
}

fn parse_datetime(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .unwrap_or_else(|_| Utc::now().naive_utc())
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let id: String = row.get(0)?;
    let customer_name: String = row.get(1)?;
    let customer_phone: String = row.get(2)?;
    let date_str: String = row.get(3)?;
    let time_str: String = row.get(4)?;
    let party_size: u32 = row.get(5)?;
    let rice: Option<String> = row.get(6)?;
    let rice_servings: Option<u32> = row.get(7)?;
    let high_chairs: Option<u32> = row.get(8)?;
    let strollers: Option<u32> = row.get(9)?;
    let status_str: String = row.get(10)?;
    let created_at_str: String = row.get(11)?;
    let updated_at_str: String = row.get(12)?;

    let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
        .unwrap_or_else(|_| Utc::now().date_naive());
    let time =
        NaiveTime::parse_from_str(&time_str, "%H:%M").unwrap_or_else(|_| NaiveTime::MIN);

    Ok(Booking {
        id,
        customer_name,
        customer_phone,
        date,
        time,
        party_size,
        rice,
        rice_servings,
        high_chairs,
        strollers,
        status: BookingStatus::parse(&status_str),
        created_at: parse_datetime(&created_at_str),
        updated_at: parse_datetime(&updated_at_str),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn setup() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn sample_booking(id: &str, phone: &str, date: &str) -> Booking {
        let now = Utc::now().naive_utc();
        Booking {
            id: id.to_string(),
            customer_name: "Juan".to_string(),
            customer_phone: phone.to_string(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            time: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            party_size: 4,
            rice: Some("Arroz negro".to_string()),
            rice_servings: Some(4),
            high_chairs: None,
            strollers: None,
            status: BookingStatus::Confirmed,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_booking_round_trip() {
        let conn = setup();
        let booking = sample_booking("b1", "346", "2099-12-05");
        create_booking(&conn, &booking).unwrap();

        let found = future_bookings(&conn, "346", Utc::now().date_naive()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "b1");
        assert_eq!(found[0].rice.as_deref(), Some("Arroz negro"));
        assert_eq!(found[0].party_size, 4);
    }

    #[test]
    fn test_cancel_removes_from_future() {
        let conn = setup();
        create_booking(&conn, &sample_booking("b1", "346", "2099-12-05")).unwrap();

        assert!(cancel_booking(&conn, "b1").unwrap());
        assert!(!cancel_booking(&conn, "b1").unwrap());
        assert!(future_bookings(&conn, "346", Utc::now().date_naive())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_past_bookings_not_returned() {
        let conn = setup();
        create_booking(&conn, &sample_booking("b1", "346", "2020-01-01")).unwrap();
        assert!(future_bookings(&conn, "346", Utc::now().date_naive())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_archive_booking() {
        let conn = setup();
        let booking = sample_booking("b1", "346", "2099-12-05");
        archive_booking(&conn, &booking, "customer").unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM bookings_archive WHERE booking_id = 'b1' AND archived_by = 'customer'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_seeded_menu_available() {
        let conn = setup();
        let dishes = active_dishes(&conn).unwrap();
        assert!(dishes.iter().any(|d| d.contains("señoret")));
    }

    #[test]
    fn test_flow_state_round_trip() {
        let conn = setup();
        assert!(get_flow_state(&conn, "346", "cancellation").unwrap().is_none());

        set_flow_state(&conn, "346", "cancellation", "{\"x\":1}", 30).unwrap();
        assert_eq!(
            get_flow_state(&conn, "346", "cancellation").unwrap().as_deref(),
            Some("{\"x\":1}")
        );

        clear_flow_state(&conn, "346", "cancellation").unwrap();
        assert!(get_flow_state(&conn, "346", "cancellation").unwrap().is_none());
    }

    #[test]
    fn test_expired_flow_state_hidden() {
        let conn = setup();
        set_flow_state(&conn, "346", "modification", "{}", -1).unwrap();
        assert!(get_flow_state(&conn, "346", "modification").unwrap().is_none());
    }

    #[test]
    fn test_conversation_round_trip() {
        let conn = setup();
        let now = Utc::now().naive_utc();
        let conv = Conversation {
            phone: "346".to_string(),
            messages: vec![ConversationMessage {
                role: "user".to_string(),
                content: "hola".to_string(),
            }],
            last_activity: now,
            expires_at: now + chrono::Duration::minutes(30),
        };
        save_conversation(&conn, &conv).unwrap();

        let loaded = get_conversation(&conn, "346").unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 1);
        assert_eq!(loaded.messages[0].content, "hola");
    }

    #[test]
    fn test_expired_conversation_hidden() {
        let conn = setup();
        let now = Utc::now().naive_utc();
        let conv = Conversation {
            phone: "346".to_string(),
            messages: vec![],
            last_activity: now,
            expires_at: now - chrono::Duration::minutes(1),
        };
        save_conversation(&conn, &conv).unwrap();
        assert!(get_conversation(&conn, "346").unwrap().is_none());

        let removed = expire_old_conversations(&conn).unwrap();
        assert_eq!(removed, 1);
    }
}
