use crate::models::{Booking, CancellationStage, CancellationState};
use crate::services::flows::{enumerate_bookings, interpret_selection, interpret_yes_no, Selection};
use crate::services::messaging::MessagingProvider;
use crate::services::store::{BookingStore, FlowStore};

const NO_BOOKINGS_REPLY: &str =
    "No he encontrado ninguna reserva a nombre de este teléfono. ¿Quieres hacer una nueva reserva?";
const ABORT_REPLY: &str = "De acuerdo, no toco nada. Tu reserva sigue en pie.";
const CONFIRM_PROMPT: &str = "¿Confirmo la cancelación? Responde sí o no.";
const RETRY_PROMPT: &str = "Perdona, necesito un sí o un no para seguir.";
const FAILURE_REPLY: &str =
    "Lo siento, no he podido completar la cancelación. Llámanos por teléfono y lo arreglamos.";

/// Multi-turn cancellation state machine. One `advance` call handles one
/// inbound customer message; everything that must survive between turns
/// lives in the injected `FlowStore`.
pub struct CancellationFlow<'a> {
    pub bookings: &'a dyn BookingStore,
    pub store: &'a dyn FlowStore,
    pub messaging: &'a dyn MessagingProvider,
    pub operator_phone: &'a str,
}

impl CancellationFlow<'_> {
    pub async fn advance(&self, phone: &str, text: &str) -> anyhow::Result<String> {
        match self.store.cancellation(phone)? {
            None => self.enter(phone),
            Some(state) => match state.stage {
                CancellationStage::SelectingBooking => self.select(phone, state, text),
                CancellationStage::AwaitingConfirmation => self.confirm(phone, state, text).await,
            },
        }
    }

    fn enter(&self, phone: &str) -> anyhow::Result<String> {
        let found = self.bookings.future_bookings(phone)?;
        match found.len() {
            0 => {
                self.store.clear_cancellation(phone)?;
                Ok(NO_BOOKINGS_REPLY.to_string())
            }
            1 => {
                let selected = found[0].clone();
                let reply = format!(
                    "Tienes esta reserva:\n{}\n{CONFIRM_PROMPT}",
                    selected.summary()
                );
                self.store.set_cancellation(
                    phone,
                    &CancellationState {
                        stage: CancellationStage::AwaitingConfirmation,
                        found,
                        selected: Some(selected),
                    },
                )?;
                Ok(reply)
            }
            _ => {
                let reply = format!(
                    "He encontrado varias reservas a tu nombre:\n{}\n¿Cuál quieres cancelar?",
                    enumerate_bookings(&found)
                );
                self.store.set_cancellation(
                    phone,
                    &CancellationState {
                        stage: CancellationStage::SelectingBooking,
                        found,
                        selected: None,
                    },
                )?;
                Ok(reply)
            }
        }
    }

    fn select(
        &self,
        phone: &str,
        mut state: CancellationState,
        text: &str,
    ) -> anyhow::Result<String> {
        match interpret_selection(text, &state.found) {
            Selection::Unique(index) => {
                let selected = state.found[index].clone();
                let reply = format!(
                    "Vas a cancelar esta reserva:\n{}\n{CONFIRM_PROMPT}",
                    selected.summary()
                );
                state.stage = CancellationStage::AwaitingConfirmation;
                state.selected = Some(selected);
                self.store.set_cancellation(phone, &state)?;
                Ok(reply)
            }
            Selection::Ambiguous => Ok(format!(
                "Hay más de una reserva que encaja con eso. Dime el número de la lista:\n{}",
                enumerate_bookings(&state.found)
            )),
            Selection::NoMatch => Ok(format!(
                "No sé a cuál te refieres. Responde con el número de la lista:\n{}",
                enumerate_bookings(&state.found)
            )),
        }
    }

    async fn confirm(
        &self,
        phone: &str,
        state: CancellationState,
        text: &str,
    ) -> anyhow::Result<String> {
        let Some(booking) = state.selected else {
            // Stored state without a selection is unusable; start over.
            self.store.clear_cancellation(phone)?;
            return self.enter(phone);
        };

        match interpret_yes_no(text) {
            Some(true) => {
                let reply = self.execute(&booking).await;
                self.store.clear_cancellation(phone)?;
                Ok(reply)
            }
            Some(false) => {
                self.store.clear_cancellation(phone)?;
                Ok(ABORT_REPLY.to_string())
            }
            None => Ok(RETRY_PROMPT.to_string()),
        }
    }

    /// Archive must land before the active record is cancelled so a partial
    /// failure never loses the audit trail. Either failure still clears the
    /// stored flow state at the call site.
    async fn execute(&self, booking: &Booking) -> String {
        match self.bookings.archive(booking, "customer") {
            Ok(true) => {}
            Ok(false) => return FAILURE_REPLY.to_string(),
            Err(e) => {
                tracing::error!(error = %e, booking = %booking.id, "archive failed");
                return FAILURE_REPLY.to_string();
            }
        }

        match self.bookings.cancel(&booking.id) {
            Ok(true) => {}
            Ok(false) => return FAILURE_REPLY.to_string(),
            Err(e) => {
                tracing::error!(error = %e, booking = %booking.id, "cancel failed");
                return FAILURE_REPLY.to_string();
            }
        }

        self.notify_operator(booking).await;

        format!(
            "Tu reserva del {} queda cancelada. ¡Esperamos verte pronto!",
            booking.summary()
        )
    }

    async fn notify_operator(&self, booking: &Booking) {
        if self.operator_phone.is_empty() {
            tracing::warn!("operator_phone not configured, skipping notification");
            return;
        }
        let notice = format!(
            "Reserva cancelada: {}, {} a las {}",
            booking.customer_name,
            booking.date.format("%d/%m/%Y"),
            booking.time.format("%H:%M")
        );
        if let Err(e) = self.messaging.send_message(self.operator_phone, &notice).await {
            tracing::error!(error = %e, "failed to notify operator of cancellation");
        }
    }
}
