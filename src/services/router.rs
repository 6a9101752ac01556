use chrono::NaiveDate;

use crate::models::{AvailabilityStatus, BookingPayload, Intent};
use crate::services::availability::AvailabilityPolicy;
use crate::services::extraction::RICE_CONFIRMED_MARKER;
use crate::services::flows::{CancellationFlow, ModificationFlow};
use crate::services::menu::{match_rice, MenuProvider, RiceMatch};
use crate::services::messaging::MessagingProvider;
use crate::services::protocol::ParsedReply;
use crate::services::store::{BookingStore, FlowStore};

const SAME_DAY_REPLY: &str =
    "Para reservas del mismo día llamadnos por teléfono, por favor, y os decimos si queda mesa.";
const ERROR_REPLY: &str =
    "Lo siento, estamos teniendo problemas técnicos. Inténtalo de nuevo en unos minutos.";
const INVALID_REQUEST_REPLY: &str =
    "No he entendido bien la fecha o la hora. ¿Me las repites? Por ejemplo: 30/11/2025 a las 14:00.";
const CREATE_FAILED_REPLY: &str =
    "No he podido guardar la reserva. Inténtalo de nuevo en unos minutos, por favor.";

/// Dispatches one decoded intent to its handler. Stateless; everything that
/// survives across invocations lives in the injected stores, which is what
/// keeps independent conversations independent.
pub struct IntentRouter<'a> {
    pub menu: &'a dyn MenuProvider,
    pub bookings: &'a dyn BookingStore,
    pub flows: &'a dyn FlowStore,
    pub messaging: &'a dyn MessagingProvider,
    pub availability: &'a AvailabilityPolicy,
    pub operator_phone: &'a str,
    pub today: NaiveDate,
}

impl IntentRouter<'_> {
    pub async fn dispatch(
        &self,
        phone: &str,
        parsed: ParsedReply,
        user_message: &str,
    ) -> anyhow::Result<String> {
        match parsed.intent {
            Intent::Normal | Intent::Interactive(_) => Ok(parsed.text),
            Intent::SameDay => Ok(SAME_DAY_REPLY.to_string()),
            Intent::Error(message) => {
                tracing::warn!(phone, error = %message, "error intent reached router");
                Ok(ERROR_REPLY.to_string())
            }
            Intent::Modification => {
                let flow = ModificationFlow {
                    bookings: self.bookings,
                    store: self.flows,
                };
                flow.advance(phone, user_message)
            }
            Intent::Cancellation(_) => {
                let flow = CancellationFlow {
                    bookings: self.bookings,
                    store: self.flows,
                    messaging: self.messaging,
                    operator_phone: self.operator_phone,
                };
                flow.advance(phone, user_message).await
            }
            Intent::Booking(payload) => self.handle_booking(phone, payload).await,
        }
    }

    async fn handle_booking(
        &self,
        phone: &str,
        mut payload: BookingPayload,
    ) -> anyhow::Result<String> {
        // Rice first: a clarification round trip is cheaper than walking the
        // customer through availability for a dish we don't serve.
        let mut confirmed_rice: Option<String> = None;
        if let Some(request) = payload.rice.clone() {
            let dishes = self.menu.active_dishes()?;
            match match_rice(&request, &dishes) {
                RiceMatch::Valid(name) => {
                    payload.rice = Some(name.clone());
                    confirmed_rice = Some(name);
                }
                RiceMatch::NotFound(request) => {
                    return Ok(format!(
                        "No encuentro «{request}» en nuestra carta de arroces. ¿Quieres que te mande la carta, o prefieres otro arroz?"
                    ));
                }
                RiceMatch::Multiple(names, request) => {
                    let listing = names
                        .iter()
                        .map(|n| format!("- {n}"))
                        .collect::<Vec<_>>()
                        .join("\n");
                    return Ok(format!(
                        "Tenemos varios arroces que encajan con «{request}»:\n{listing}\n¿Cuál prefieres?"
                    ));
                }
            }
        }

        match self
            .availability
            .check(&payload.date, &payload.time, payload.party_size, self.today)
        {
            AvailabilityStatus::Available => {}
            AvailabilityStatus::SameDay => return Ok(SAME_DAY_REPLY.to_string()),
            AvailabilityStatus::Invalid(reason) => {
                tracing::warn!(phone, reason, "booking payload failed validation");
                return Ok(INVALID_REQUEST_REPLY.to_string());
            }
            AvailabilityStatus::Unavailable(message) => return Ok(message),
        }

        let Some(id) = self.bookings.create(&payload)? else {
            return Ok(CREATE_FAILED_REPLY.to_string());
        };
        tracing::info!(phone, booking = %id, "booking created");

        self.notify_operator(&payload).await;

        let mut reply = format!(
            "¡Reserva confirmada, {}! {} a las {}, {} personas.",
            payload.name, payload.date, payload.time, payload.party_size
        );
        if let Some(rice) = confirmed_rice {
            let servings = payload
                .rice_servings
                .map(|n| format!(" ({n} raciones)"))
                .unwrap_or_default();
            reply.push_str(&format!("\n{RICE_CONFIRMED_MARKER} {rice}{servings}"));
        }
        reply.push_str("\n¡Os esperamos!");
        Ok(reply)
    }

    async fn notify_operator(&self, payload: &BookingPayload) {
        if self.operator_phone.is_empty() {
            tracing::warn!("operator_phone not configured, skipping notification");
            return;
        }
        let notice = format!(
            "Nueva reserva: {}, {} a las {}, {} personas",
            payload.name, payload.date, payload.time, payload.party_size
        );
        if let Err(e) = self.messaging.send_message(self.operator_phone, &notice).await {
            tracing::error!(error = %e, "failed to notify operator of new booking");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::flows::testutil::{MemFlowStore, RecordingMessaging, StubBookings};
    use crate::services::protocol::parse_reply;

    struct StubMenu(Vec<String>);

    impl MenuProvider for StubMenu {
        fn active_dishes(&self) -> anyhow::Result<Vec<String>> {
            Ok(self.0.clone())
        }
    }

    fn policy() -> AvailabilityPolicy {
        AvailabilityPolicy::from_config(&crate::config::AppConfig {
            port: 0,
            database_url: String::new(),
            admin_token: String::new(),
            llm_provider: "ollama".to_string(),
            llm_timeout_secs: 30,
            groq_api_key: String::new(),
            groq_model: String::new(),
            ollama_url: String::new(),
            twilio_account_sid: String::new(),
            twilio_auth_token: String::new(),
            twilio_whatsapp_number: String::new(),
            operator_phone: String::new(),
            open_days: vec![chrono::Weekday::Sat, chrono::Weekday::Sun],
            service_start: "13:00".to_string(),
            service_end: "16:30".to_string(),
            max_party_size: 12,
            conversation_ttl_minutes: 30,
        })
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 26).unwrap()
    }

    fn payload(rice: Option<&str>) -> ParsedReply {
        let rice_part = rice
            .map(|r| format!("Con arroz {r}.\n"))
            .unwrap_or_default();
        // 29/11/2025 is a Saturday.
        parse_reply(&format!(
            "{rice_part}¡Hecho!\nBOOKING_REQUEST|Juan|34612345678|29/11/2025|4|14:00"
        ))
    }

    #[tokio::test]
    async fn test_booking_created_and_operator_notified() {
        let menu = StubMenu(vec![]);
        let bookings = StubBookings::default();
        let flows = MemFlowStore::default();
        let messaging = RecordingMessaging::default();
        let policy = policy();
        let router = IntentRouter {
            menu: &menu,
            bookings: &bookings,
            flows: &flows,
            messaging: &messaging,
            availability: &policy,
            operator_phone: "34699999999",
            today: today(),
        };

        let reply = router
            .dispatch("34612345678", payload(None), "resérvame")
            .await
            .unwrap();

        assert!(reply.contains("Reserva confirmada"));
        assert_eq!(
            bookings.calls.lock().unwrap().clone(),
            vec!["create:Juan"]
        );
        let sent = messaging.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("Nueva reserva"));
    }

    #[tokio::test]
    async fn test_booking_with_valid_rice_emits_marker() {
        let menu = StubMenu(vec![
            "Arroz de señoret (+3€)".to_string(),
            "Paella valenciana".to_string(),
        ]);
        let bookings = StubBookings::default();
        let flows = MemFlowStore::default();
        let messaging = RecordingMessaging::default();
        let policy = policy();
        let router = IntentRouter {
            menu: &menu,
            bookings: &bookings,
            flows: &flows,
            messaging: &messaging,
            availability: &policy,
            operator_phone: "",
            today: today(),
        };

        let reply = router
            .dispatch("34612345678", payload(Some("del señoret")), "con arroz")
            .await
            .unwrap();

        assert!(reply.contains("Arroz confirmado: Arroz de señoret"));
    }

    #[tokio::test]
    async fn test_unknown_rice_short_circuits_before_create() {
        let menu = StubMenu(vec!["Paella valenciana".to_string()]);
        let bookings = StubBookings::default();
        let flows = MemFlowStore::default();
        let messaging = RecordingMessaging::default();
        let policy = policy();
        let router = IntentRouter {
            menu: &menu,
            bookings: &bookings,
            flows: &flows,
            messaging: &messaging,
            availability: &policy,
            operator_phone: "",
            today: today(),
        };

        let reply = router
            .dispatch("34612345678", payload(Some("de bogavante")), "con arroz")
            .await
            .unwrap();

        assert!(reply.contains("No encuentro"));
        assert!(bookings.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ambiguous_rice_lists_candidates() {
        let menu = StubMenu(vec![
            "Arroz negro de sepia".to_string(),
            "Arroz negro de chipirones".to_string(),
        ]);
        let bookings = StubBookings::default();
        let flows = MemFlowStore::default();
        let messaging = RecordingMessaging::default();
        let policy = policy();
        let router = IntentRouter {
            menu: &menu,
            bookings: &bookings,
            flows: &flows,
            messaging: &messaging,
            availability: &policy,
            operator_phone: "",
            today: today(),
        };

        let reply = router
            .dispatch("34612345678", payload(Some("negro")), "con arroz")
            .await
            .unwrap();

        assert!(reply.contains("varios arroces"));
        assert!(reply.contains("- Arroz negro de sepia"));
        assert!(bookings.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_closed_day_short_circuits_create() {
        let menu = StubMenu(vec![]);
        let bookings = StubBookings::default();
        let flows = MemFlowStore::default();
        let messaging = RecordingMessaging::default();
        let policy = policy();
        let router = IntentRouter {
            menu: &menu,
            bookings: &bookings,
            flows: &flows,
            messaging: &messaging,
            availability: &policy,
            operator_phone: "",
            today: today(),
        };

        // 03/12/2025 is a Wednesday.
        let parsed = parse_reply("BOOKING_REQUEST|Juan|34612345678|03/12/2025|4|14:00");
        let reply = router.dispatch("34612345678", parsed, "reserva").await.unwrap();

        assert!(reply.contains("cerrados"));
        assert!(bookings.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_same_day_intent_fixed_reply() {
        let menu = StubMenu(vec![]);
        let bookings = StubBookings::default();
        let flows = MemFlowStore::default();
        let messaging = RecordingMessaging::default();
        let policy = policy();
        let router = IntentRouter {
            menu: &menu,
            bookings: &bookings,
            flows: &flows,
            messaging: &messaging,
            availability: &policy,
            operator_phone: "",
            today: today(),
        };

        let reply = router
            .dispatch("346", parse_reply("SAME_DAY_BOOKING"), "hoy")
            .await
            .unwrap();
        assert!(reply.contains("mismo día"));
    }

    #[tokio::test]
    async fn test_normal_and_interactive_pass_through() {
        let menu = StubMenu(vec![]);
        let bookings = StubBookings::default();
        let flows = MemFlowStore::default();
        let messaging = RecordingMessaging::default();
        let policy = policy();
        let router = IntentRouter {
            menu: &menu,
            bookings: &bookings,
            flows: &flows,
            messaging: &messaging,
            availability: &policy,
            operator_phone: "",
            today: today(),
        };

        let reply = router
            .dispatch("346", parse_reply("¿Para cuántas personas?"), "hola")
            .await
            .unwrap();
        assert_eq!(reply, "¿Para cuántas personas?");

        let reply = router
            .dispatch(
                "346",
                parse_reply("La carta: https://example.com/carta"),
                "carta",
            )
            .await
            .unwrap();
        assert!(reply.contains("https://example.com/carta"));
    }

    #[tokio::test]
    async fn test_cancellation_intent_enters_flow() {
        let menu = StubMenu(vec![]);
        let bookings = StubBookings::default();
        let flows = MemFlowStore::default();
        let messaging = RecordingMessaging::default();
        let policy = policy();
        let router = IntentRouter {
            menu: &menu,
            bookings: &bookings,
            flows: &flows,
            messaging: &messaging,
            availability: &policy,
            operator_phone: "",
            today: today(),
        };

        let parsed = parse_reply("CANCELLATION_REQUEST|Juan|346|29/11/2025|4|14:00");
        let reply = router.dispatch("346", parsed, "quiero cancelar").await.unwrap();
        assert!(reply.contains("ninguna reserva"));
    }
}
