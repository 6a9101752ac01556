use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};

use crate::db::queries;
use crate::models::{Conversation, ConversationMessage, ConversationState, Field, Intent, RiceDecision};
use crate::services::ai::Message;
use crate::services::extraction::{upcoming_weekend_dates, StateExtractor};
use crate::services::flows::{CancellationFlow, ModificationFlow};
use crate::services::protocol::{self, ParsedReply};
use crate::services::router::IntentRouter;
use crate::state::AppState;

const SYSTEM_PROMPT: &str = r#"You are the WhatsApp reservation assistant of an arrocería (Spanish rice restaurant). Always answer in Spanish, warm and concise.

When the customer has given you ALL of: name, date, party size and time, AND has settled the rice question (chosen a dish or said no), confirm by emitting this machine line on its own line, after your reply text:
BOOKING_REQUEST|<name>|<phone>|<date dd/mm/yyyy>|<party size>|<time HH:MM>

Other machine lines, each only when it applies:
- CANCELLATION_REQUEST|<name>|<phone>|<date>|<party size>|<time> when the customer wants to cancel an existing reservation.
- MODIFICATION_INTENT when the customer wants to change an existing reservation.
- SAME_DAY_BOOKING when the customer asks for a table for today.

Rules:
- Never invent data. Ask for whatever is missing, one thing at a time.
- Once date, time and party size are known, ask whether they want to pre-order a rice dish (arroces must be ordered in advance).
- Mention rice dishes by their menu name.
- Do not emit any machine line until its data is complete."#;

/// One inbound customer message, end to end: flow preemption, history,
/// extraction, model call, decode, dispatch, history save.
pub async fn process_message(
    state: &Arc<AppState>,
    from_phone: &str,
    message: &str,
) -> anyhow::Result<String> {
    // A flow in progress consumes the raw message directly; the model only
    // sees turns that are not mid-flow.
    if state.flows.cancellation(from_phone)?.is_some() {
        let flow = CancellationFlow {
            bookings: state.bookings.as_ref(),
            store: state.flows.as_ref(),
            messaging: state.messaging.as_ref(),
            operator_phone: &state.config.operator_phone,
        };
        let reply = flow.advance(from_phone, message).await?;
        record_turns(state, from_phone, message, &reply)?;
        return Ok(reply);
    }
    if let Some(modification) = state.flows.modification(from_phone)? {
        // Once a field has been chosen the edit itself is applied outside
        // this flow, so the message goes back through the model.
        if modification.pending_field.is_none() {
            let flow = ModificationFlow {
                bookings: state.bookings.as_ref(),
                store: state.flows.as_ref(),
            };
            let reply = flow.advance(from_phone, message)?;
            record_turns(state, from_phone, message, &reply)?;
            return Ok(reply);
        }
    }

    let mut conv = {
        let db = state.db.lock().unwrap();
        queries::get_conversation(&db, from_phone)?
    }
    .unwrap_or_else(|| new_conversation(from_phone, state.config.conversation_ttl_minutes));

    conv.messages.push(ConversationMessage {
        role: "user".to_string(),
        content: message.to_string(),
    });

    let today = Utc::now().date_naive();
    let snapshot = StateExtractor::new(today).extract(&conv.messages);

    let dishes = state.menu.active_dishes().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "menu unavailable, prompting without it");
        Vec::new()
    });
    let system = build_system_prompt(&snapshot, &dishes, today, from_phone);

    let messages: Vec<Message> = conv
        .messages
        .iter()
        .map(|m| Message {
            role: m.role.clone(),
            content: m.content.clone(),
        })
        .collect();

    let parsed = match tokio::time::timeout(
        StdDuration::from_secs(state.config.llm_timeout_secs),
        state.llm.chat(&system, &messages),
    )
    .await
    {
        Ok(Ok(raw)) => protocol::parse_reply(&raw),
        Ok(Err(e)) => {
            tracing::error!(error = %e, phone = from_phone, "model call failed");
            ParsedReply {
                intent: Intent::Error(e.to_string()),
                text: String::new(),
            }
        }
        Err(_) => {
            tracing::error!(phone = from_phone, "model call timed out");
            ParsedReply {
                intent: Intent::Error("model call timed out".to_string()),
                text: String::new(),
            }
        }
    };

    tracing::info!(
        phone = from_phone,
        intent = intent_name(&parsed.intent),
        stage = ?snapshot.stage,
        "processing message"
    );

    let router = IntentRouter {
        menu: state.menu.as_ref(),
        bookings: state.bookings.as_ref(),
        flows: state.flows.as_ref(),
        messaging: state.messaging.as_ref(),
        availability: &state.availability,
        operator_phone: &state.config.operator_phone,
        today,
    };
    let reply = router.dispatch(from_phone, parsed, message).await?;

    conv.messages.push(ConversationMessage {
        role: "assistant".to_string(),
        content: reply.clone(),
    });
    let now = Utc::now().naive_utc();
    conv.last_activity = now;
    conv.expires_at = now + Duration::minutes(state.config.conversation_ttl_minutes);
    {
        let db = state.db.lock().unwrap();
        queries::save_conversation(&db, &conv)?;
    }

    Ok(reply)
}

fn build_system_prompt(
    snapshot: &ConversationState,
    dishes: &[String],
    today: chrono::NaiveDate,
    phone: &str,
) -> String {
    let weekends = upcoming_weekend_dates(today)
        .iter()
        .map(|d| d.format("%d/%m/%Y (%A)").to_string())
        .collect::<Vec<_>>()
        .join(", ");

    let menu_block = if dishes.is_empty() {
        "(menu unavailable right now)".to_string()
    } else {
        dishes.join("; ")
    };

    let rice_line = match &snapshot.rice {
        None => "rice: not decided yet".to_string(),
        Some(RiceDecision::Declined) => "rice: declined".to_string(),
        Some(RiceDecision::Chosen(name)) => format!("rice: {name}"),
    };
    let missing = if snapshot.missing.is_empty() {
        "nothing".to_string()
    } else {
        snapshot
            .missing
            .iter()
            .map(|f| match f {
                Field::Date => "date",
                Field::Time => "time",
                Field::PartySize => "party size",
                Field::RiceDecision => "rice decision",
            })
            .collect::<Vec<_>>()
            .join(", ")
    };

    format!(
        "{SYSTEM_PROMPT}\n\nContext:\n- Today: {today}\n- Customer phone: {phone}\n- Upcoming weekend dates: {weekends}\n- Rice menu: {menu_block}\n- Known so far: date {date}, time {time}, party size {party}, {rice_line}\n- Still missing: {missing}",
        today = today.format("%d/%m/%Y"),
        date = snapshot.date.as_deref().unwrap_or("?"),
        time = snapshot.time.as_deref().unwrap_or("?"),
        party = snapshot
            .party_size
            .map(|p| p.to_string())
            .unwrap_or_else(|| "?".to_string()),
    )
}

fn intent_name(intent: &Intent) -> &'static str {
    match intent {
        Intent::Normal => "normal",
        Intent::Booking(_) => "booking",
        Intent::Cancellation(_) => "cancellation",
        Intent::Modification => "modification",
        Intent::SameDay => "same_day",
        Intent::Interactive(_) => "interactive",
        Intent::Error(_) => "error",
    }
}

fn new_conversation(phone: &str, ttl_minutes: i64) -> Conversation {
    let now = Utc::now().naive_utc();
    Conversation {
        phone: phone.to_string(),
        messages: vec![],
        last_activity: now,
        expires_at: now + Duration::minutes(ttl_minutes),
    }
}

fn record_turns(
    state: &Arc<AppState>,
    phone: &str,
    user_message: &str,
    reply: &str,
) -> anyhow::Result<()> {
    let mut conv = {
        let db = state.db.lock().unwrap();
        queries::get_conversation(&db, phone)?
    }
    .unwrap_or_else(|| new_conversation(phone, state.config.conversation_ttl_minutes));

    conv.messages.push(ConversationMessage {
        role: "user".to_string(),
        content: user_message.to_string(),
    });
    conv.messages.push(ConversationMessage {
        role: "assistant".to_string(),
        content: reply.to_string(),
    });
    let now = Utc::now().naive_utc();
    conv.last_activity = now;
    conv.expires_at = now + Duration::minutes(state.config.conversation_ttl_minutes);

    let db = state.db.lock().unwrap();
    queries::save_conversation(&db, &conv)
}
