use std::sync::LazyLock;

use regex::Regex;

use crate::models::{EditableField, ModificationStage, ModificationState};
use crate::services::flows::{enumerate_bookings, interpret_selection, interpret_yes_no, Selection};
use crate::services::store::{BookingStore, FlowStore};

const NO_BOOKINGS_REPLY: &str =
    "No he encontrado ninguna reserva a nombre de este teléfono. ¿Quieres hacer una nueva reserva?";
const ABORT_REPLY: &str = "De acuerdo, dejamos la reserva como está.";
const CONFIRM_PROMPT: &str = "¿Es esta la reserva que quieres cambiar? Responde sí o no.";
const RETRY_PROMPT: &str = "Perdona, necesito un sí o un no para seguir.";
const FIELD_MENU: &str = "¿Qué quieres cambiar?\n1. La fecha\n2. La hora\n3. El número de personas\n4. El arroz";

static LEADING_INT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*([1-4])\b").unwrap());

/// Multi-turn modification state machine. Same shape as the cancellation
/// flow plus a field-choice step once the booking is confirmed; applying the
/// chosen edit happens outside this flow.
pub struct ModificationFlow<'a> {
    pub bookings: &'a dyn BookingStore,
    pub store: &'a dyn FlowStore,
}

impl ModificationFlow<'_> {
    pub fn advance(&self, phone: &str, text: &str) -> anyhow::Result<String> {
        match self.store.modification(phone)? {
            None => self.enter(phone),
            Some(state) => match state.stage {
                ModificationStage::SelectingBooking => self.select(phone, state, text),
                ModificationStage::AwaitingConfirmation => self.confirm(phone, state, text),
                ModificationStage::ChoosingField => self.choose_field(phone, state, text),
            },
        }
    }

    fn enter(&self, phone: &str) -> anyhow::Result<String> {
        let found = self.bookings.future_bookings(phone)?;
        match found.len() {
            0 => {
                self.store.clear_modification(phone)?;
                Ok(NO_BOOKINGS_REPLY.to_string())
            }
            1 => {
                let selected = found[0].clone();
                let reply = format!(
                    "Tienes esta reserva:\n{}\n{CONFIRM_PROMPT}",
                    selected.summary()
                );
                self.store.set_modification(
                    phone,
                    &ModificationState {
                        stage: ModificationStage::AwaitingConfirmation,
                        found,
                        selected: Some(selected),
                        pending_field: None,
                    },
                )?;
                Ok(reply)
            }
            _ => {
                let reply = format!(
                    "He encontrado varias reservas a tu nombre:\n{}\n¿Cuál quieres modificar?",
                    enumerate_bookings(&found)
                );
                self.store.set_modification(
                    phone,
                    &ModificationState {
                        stage: ModificationStage::SelectingBooking,
                        found,
                        selected: None,
                        pending_field: None,
                    },
                )?;
                Ok(reply)
            }
        }
    }

    fn select(
        &self,
        phone: &str,
        mut state: ModificationState,
        text: &str,
    ) -> anyhow::Result<String> {
        match interpret_selection(text, &state.found) {
            Selection::Unique(index) => {
                let selected = state.found[index].clone();
                let reply = format!(
                    "Vas a modificar esta reserva:\n{}\n{CONFIRM_PROMPT}",
                    selected.summary()
                );
                state.stage = ModificationStage::AwaitingConfirmation;
                state.selected = Some(selected);
                self.store.set_modification(phone, &state)?;
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

    fn confirm(
        &self,
        phone: &str,
        mut state: ModificationState,
        text: &str,
    ) -> anyhow::Result<String> {
        if state.selected.is_none() {
            self.store.clear_modification(phone)?;
            return self.enter(phone);
        }

        match interpret_yes_no(text) {
            Some(true) => {
                state.stage = ModificationStage::ChoosingField;
                self.store.set_modification(phone, &state)?;
                Ok(FIELD_MENU.to_string())
            }
            Some(false) => {
                self.store.clear_modification(phone)?;
                Ok(ABORT_REPLY.to_string())
            }
            None => Ok(RETRY_PROMPT.to_string()),
        }
    }

    fn choose_field(
        &self,
        phone: &str,
        mut state: ModificationState,
        text: &str,
    ) -> anyhow::Result<String> {
        let Some(field) = parse_field(text) else {
            return Ok(format!("No te he entendido.\n{FIELD_MENU}"));
        };

        state.pending_field = Some(field);
        self.store.set_modification(phone, &state)?;
        Ok(format!("Perfecto. Dime el nuevo valor para {}.", field.label()))
    }
}

fn parse_field(text: &str) -> Option<EditableField> {
    let t = text.to_lowercase();
    if let Some(caps) = LEADING_INT_RE.captures(&t) {
        return match &caps[1] {
            "1" => Some(EditableField::Date),
            "2" => Some(EditableField::Time),
            "3" => Some(EditableField::PartySize),
            "4" => Some(EditableField::Rice),
            _ => None,
        };
    }
    if t.contains("fecha") || t.contains("día") || t.contains("dia") {
        Some(EditableField::Date)
    } else if t.contains("hora") {
        Some(EditableField::Time)
    } else if t.contains("personas") || t.contains("comensales") {
        Some(EditableField::PartySize)
    } else if t.contains("arroz") {
        Some(EditableField::Rice)
    } else {
        None
    }
}
