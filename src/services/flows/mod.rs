pub mod cancellation;
pub mod modification;

use std::sync::LazyLock;

use chrono::{Datelike, Weekday};
use regex::Regex;

use crate::models::Booking;

pub use cancellation::CancellationFlow;
pub use modification::ModificationFlow;

static PARTY_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bde\s+(\d{1,2})\s+personas\b").unwrap());
static LEADING_INT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*(\d{1,2})\b").unwrap());

const ORDINALS: &[&str] = &["primer", "segund", "tercer", "cuart", "quint"];

const WEEKDAYS: &[(&str, Weekday)] = &[
    ("lunes", Weekday::Mon),
    ("martes", Weekday::Tue),
    ("miercoles", Weekday::Wed),
    ("jueves", Weekday::Thu),
    ("viernes", Weekday::Fri),
    ("sabado", Weekday::Sat),
    ("domingo", Weekday::Sun),
];

/// How a free-text reply resolved against the enumerated bookings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Selection {
    Unique(usize),
    Ambiguous,
    NoMatch,
}

/// Resolves "which booking did they mean". Rules in order: ordinal words,
/// weekday reference, party-size reference, bare leading integer. A rule
/// that matches several bookings stops the scan as ambiguous; a rule that
/// matches none falls through to the next.
pub(crate) fn interpret_selection(text: &str, bookings: &[Booking]) -> Selection {
    let normalized = fold_accents(&text.to_lowercase());

    for (i, ordinal) in ORDINALS.iter().enumerate() {
        if normalized.contains(ordinal) {
            return if i < bookings.len() {
                Selection::Unique(i)
            } else {
                Selection::NoMatch
            };
        }
    }

    for (name, weekday) in WEEKDAYS {
        if normalized.contains(name) {
            let matches: Vec<usize> = bookings
                .iter()
                .enumerate()
                .filter(|(_, b)| b.date.weekday() == *weekday)
                .map(|(i, _)| i)
                .collect();
            match matches.as_slice() {
                [] => break,
                [only] => return Selection::Unique(*only),
                _ => return Selection::Ambiguous,
            }
        }
    }

    if let Some(caps) = PARTY_REF_RE.captures(&normalized) {
        if let Ok(size) = caps[1].parse::<u32>() {
            let matches: Vec<usize> = bookings
                .iter()
                .enumerate()
                .filter(|(_, b)| b.party_size == size)
                .map(|(i, _)| i)
                .collect();
            match matches.as_slice() {
                [] => {}
                [only] => return Selection::Unique(*only),
                _ => return Selection::Ambiguous,
            }
        }
    }

    if let Some(caps) = LEADING_INT_RE.captures(&normalized) {
        if let Ok(n) = caps[1].parse::<usize>() {
            if n >= 1 && n <= bookings.len() {
                return Selection::Unique(n - 1);
            }
        }
    }

    Selection::NoMatch
}

/// Affirmative/negative reading of a confirmation reply. `None` when the
/// reply is neither, or confusingly both.
pub(crate) fn interpret_yes_no(text: &str) -> Option<bool> {
    let normalized = fold_accents(&text.to_lowercase());
    let tokens: Vec<&str> = normalized
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    let affirmative = ["si", "vale", "ok", "okay", "confirmo", "claro", "perfecto", "correcto", "adelante"];
    let has_yes = tokens.iter().any(|t| affirmative.contains(t));
    let has_no = tokens.iter().any(|t| *t == "no");

    match (has_yes, has_no) {
        (true, false) => Some(true),
        (false, true) => Some(false),
        _ => None,
    }
}

/// 1-based numbered list of bookings, one summary per line.
pub(crate) fn enumerate_bookings(bookings: &[Booking]) -> String {
    bookings
        .iter()
        .enumerate()
        .map(|(i, b)| format!("{}. {}", i + 1, b.summary()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn fold_accents(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' | 'ü' => 'u',
            other => other,
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{NaiveDate, NaiveTime};

    use crate::models::{
        Booking, BookingPayload, BookingStatus, CancellationState, ModificationState,
    };
    use crate::services::messaging::MessagingProvider;
    use crate::services::store::{BookingStore, FlowStore};

    pub fn booking(id: &str, date: (i32, u32, u32), time: (u32, u32), party: u32) -> Booking {
        let now = chrono::Utc::now().naive_utc();
        Booking {
            id: id.to_string(),
            customer_name: "Juan".to_string(),
            customer_phone: "34612345678".to_string(),
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            time: NaiveTime::from_hms_opt(time.0, time.1, 0).unwrap(),
            party_size: party,
            rice: None,
            rice_servings: None,
            high_chairs: None,
            strollers: None,
            status: BookingStatus::Confirmed,
            created_at: now,
            updated_at: now,
        }
    }

    #[derive(Default)]
    pub struct StubBookings {
        pub future: Vec<Booking>,
        pub fail_archive: bool,
        pub fail_cancel: bool,
        pub calls: Mutex<Vec<String>>,
    }

    impl BookingStore for StubBookings {
        fn future_bookings(&self, _phone: &str) -> anyhow::Result<Vec<Booking>> {
            Ok(self.future.clone())
        }

        fn create(&self, payload: &BookingPayload) -> anyhow::Result<Option<String>> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("create:{}", payload.name));
            Ok(Some("new-id".to_string()))
        }

        fn cancel(&self, id: &str) -> anyhow::Result<bool> {
            self.calls.lock().unwrap().push(format!("cancel:{id}"));
            Ok(!self.fail_cancel)
        }

        fn archive(&self, booking: &Booking, actor: &str) -> anyhow::Result<bool> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("archive:{}:{actor}", booking.id));
            Ok(!self.fail_archive)
        }
    }

    #[derive(Default)]
    pub struct MemFlowStore {
        pub cancellations: Mutex<Option<CancellationState>>,
        pub modifications: Mutex<Option<ModificationState>>,
    }

    impl FlowStore for MemFlowStore {
        fn cancellation(&self, _phone: &str) -> anyhow::Result<Option<CancellationState>> {
            Ok(self.cancellations.lock().unwrap().clone())
        }

        fn set_cancellation(
            &self,
            _phone: &str,
            state: &CancellationState,
        ) -> anyhow::Result<()> {
            *self.cancellations.lock().unwrap() = Some(state.clone());
            Ok(())
        }

        fn clear_cancellation(&self, _phone: &str) -> anyhow::Result<()> {
            *self.cancellations.lock().unwrap() = None;
            Ok(())
        }

        fn modification(&self, _phone: &str) -> anyhow::Result<Option<ModificationState>> {
            Ok(self.modifications.lock().unwrap().clone())
        }

        fn set_modification(
            &self,
            _phone: &str,
            state: &ModificationState,
        ) -> anyhow::Result<()> {
            *self.modifications.lock().unwrap() = Some(state.clone());
            Ok(())
        }

        fn clear_modification(&self, _phone: &str) -> anyhow::Result<()> {
            *self.modifications.lock().unwrap() = None;
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct RecordingMessaging {
        pub sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl MessagingProvider for RecordingMessaging {
        async fn send_message(&self, to: &str, body: &str) -> anyhow::Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), body.to_string()));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::booking;
    use super::*;

    fn two_bookings() -> Vec<Booking> {
        vec![
            // 02/12/2025 is a Tuesday, 06/12/2025 a Saturday.
            booking("b1", (2025, 12, 2), (14, 0), 4),
            booking("b2", (2025, 12, 6), (13, 30), 6),
        ]
    }

    #[test]
    fn test_ordinal_selection() {
        let bookings = two_bookings();
        assert_eq!(
            interpret_selection("la primera", &bookings),
            Selection::Unique(0)
        );
        assert_eq!(
            interpret_selection("el segundo", &bookings),
            Selection::Unique(1)
        );
    }

    #[test]
    fn test_ordinal_out_of_range() {
        assert_eq!(
            interpret_selection("la tercera", &two_bookings()),
            Selection::NoMatch
        );
    }

    #[test]
    fn test_weekday_selection_unique() {
        assert_eq!(
            interpret_selection("la del martes", &two_bookings()),
            Selection::Unique(0)
        );
    }

    #[test]
    fn test_weekday_selection_ambiguous() {
        let bookings = vec![
            booking("b1", (2025, 12, 2), (14, 0), 4),
            booking("b2", (2025, 12, 9), (13, 30), 6),
        ];
        assert_eq!(
            interpret_selection("la del martes", &bookings),
            Selection::Ambiguous
        );
    }

    #[test]
    fn test_party_size_selection() {
        assert_eq!(
            interpret_selection("la de 6 personas", &two_bookings()),
            Selection::Unique(1)
        );
    }

    #[test]
    fn test_bare_index_selection() {
        assert_eq!(
            interpret_selection("2", &two_bookings()),
            Selection::Unique(1)
        );
        assert_eq!(
            interpret_selection("5", &two_bookings()),
            Selection::NoMatch
        );
    }

    #[test]
    fn test_nonsense_is_no_match() {
        assert_eq!(
            interpret_selection("no me acuerdo", &two_bookings()),
            Selection::NoMatch
        );
    }

    #[test]
    fn test_yes_no() {
        assert_eq!(interpret_yes_no("sí"), Some(true));
        assert_eq!(interpret_yes_no("vale, perfecto"), Some(true));
        assert_eq!(interpret_yes_no("no"), Some(false));
        assert_eq!(interpret_yes_no("que no, mejor dejarlo"), Some(false));
        assert_eq!(interpret_yes_no("¿qué reserva?"), None);
        assert_eq!(interpret_yes_no("si no os importa"), None);
    }

    #[test]
    fn test_enumerate_bookings_lines() {
        let listing = enumerate_bookings(&two_bookings());
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("1. 02/12/2025"));
        assert!(lines[1].starts_with("2. 06/12/2025"));
    }
}
