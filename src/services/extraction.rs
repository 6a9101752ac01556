use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use regex::Regex;

use crate::models::{ConversationMessage, ConversationState, Field, RiceDecision, Stage};

/// Marker the router puts in its reply once a rice dish has been validated
/// against the menu. The extractor reads it back from assistant turns on
/// later turns, so the decision survives without separate storage.
pub const RICE_CONFIRMED_MARKER: &str = "Arroz confirmado:";

static DATE_LITERAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{2,4})\b").unwrap());
static DAY_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bel\s+(s[áa]bado|domingo)\b").unwrap());
static TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:a|para)\s+las\s+(\d{1,2})(?::(\d{2}))?\b").unwrap());
static PARTY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:para|somos)\s+(\d{1,2})\s+personas\b").unwrap());
static BARE_PARTY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2})\s+personas\b").unwrap());
static SERVINGS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2})\s+(?:raciones?|ración)\b").unwrap());

/// Derives a `ConversationState` snapshot from prior turns.
///
/// Every field follows the same ordering contract: user turns are scanned
/// from most recent to oldest and the first rule match wins. A field with no
/// match anywhere stays unset; extraction itself never fails.
pub struct StateExtractor {
    today: NaiveDate,
}

impl StateExtractor {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn extract(&self, history: &[ConversationMessage]) -> ConversationState {
        let date = self.scan_user_turns(history, |text| self.date_in(text));
        let time = self.scan_user_turns(history, time_in);
        let party_size = self.scan_user_turns(history, party_size_in);
        let rice = rice_decision_in(history);
        let rice_servings = self.scan_user_turns(history, servings_in);

        let mut missing = Vec::new();
        if date.is_none() {
            missing.push(Field::Date);
        }
        if time.is_none() {
            missing.push(Field::Time);
        }
        if party_size.is_none() {
            missing.push(Field::PartySize);
        }
        if rice.is_none() {
            missing.push(Field::RiceDecision);
        }

        let stage = if missing.is_empty() {
            Stage::AwaitingConfirmation
        } else {
            Stage::CollectingInfo
        };

        ConversationState {
            date,
            time,
            party_size,
            rice,
            rice_servings,
            missing,
            stage,
        }
    }

    fn scan_user_turns<T>(
        &self,
        history: &[ConversationMessage],
        rule: impl Fn(&str) -> Option<T>,
    ) -> Option<T> {
        history
            .iter()
            .rev()
            .filter(|m| m.role == "user")
            .find_map(|m| rule(&m.content))
    }

    /// Date rule: a dd/mm/yyyy literal wins over a weekend day name when both
    /// appear in the same turn.
    fn date_in(&self, text: &str) -> Option<String> {
        if let Some(caps) = DATE_LITERAL_RE.captures(text) {
            let day: u32 = caps[1].parse().ok()?;
            let month: u32 = caps[2].parse().ok()?;
            let mut year: i32 = caps[3].parse().ok()?;
            if year < 100 {
                year += 2000;
            }
            // Accept only calendar-valid literals; otherwise fall through to
            // the day-name rule.
            if NaiveDate::from_ymd_opt(year, month, day).is_some() {
                return Some(format!("{day:02}/{month:02}/{year:04}"));
            }
        }

        let caps = DAY_NAME_RE.captures(text)?;
        let wanted = if caps[1].to_lowercase().starts_with('s') {
            Weekday::Sat
        } else {
            Weekday::Sun
        };
        upcoming_weekend_dates(self.today)
            .into_iter()
            .find(|d| d.weekday() == wanted)
            .map(|d| d.format("%d/%m/%Y").to_string())
    }
}

/// The next four weekend dates after `today`, scanning forward up to 14 days.
pub fn upcoming_weekend_dates(today: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::with_capacity(4);
    for offset in 1..=14 {
        let date = today + Duration::days(offset);
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            dates.push(date);
            if dates.len() == 4 {
                break;
            }
        }
    }
    dates
}

fn time_in(text: &str) -> Option<String> {
    let caps = TIME_RE.captures(text)?;
    let hour: u32 = caps[1].parse().ok()?;
    if hour > 23 {
        return None;
    }
    let minute: u32 = caps
        .get(2)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0);
    if minute > 59 {
        return None;
    }
    Some(format!("{hour:02}:{minute:02}"))
}

fn party_size_in(text: &str) -> Option<u32> {
    PARTY_RE
        .captures(text)
        .or_else(|| BARE_PARTY_RE.captures(text))
        .and_then(|caps| caps[1].parse().ok())
}

fn servings_in(text: &str) -> Option<u32> {
    SERVINGS_RE
        .captures(text)
        .and_then(|caps| caps[1].parse().ok())
}

/// Rice decision, scanning backward over the whole history:
/// - an assistant turn carrying the confirmation marker fixes the chosen dish;
/// - a bare rejection ("no", "sin arroz", "nada") right after an assistant
///   turn that asked about rice records an explicit decline.
fn rice_decision_in(history: &[ConversationMessage]) -> Option<RiceDecision> {
    for (i, msg) in history.iter().enumerate().rev() {
        if msg.role == "assistant" {
            if let Some(pos) = msg.content.find(RICE_CONFIRMED_MARKER) {
                let rest = &msg.content[pos + RICE_CONFIRMED_MARKER.len()..];
                let line = rest.lines().next().unwrap_or("");
                // The marker line may carry a servings note in parentheses;
                // only the dish name is the decision.
                let name = line
                    .split(" (")
                    .next()
                    .unwrap_or(line)
                    .trim()
                    .trim_end_matches(['.', '!'])
                    .trim();
                if !name.is_empty() {
                    return Some(RiceDecision::Chosen(name.to_string()));
                }
            }
            continue;
        }

        if msg.role == "user"
            && is_rice_rejection(&msg.content)
            && i > 0
            && asked_about_rice(&history[i - 1])
        {
            return Some(RiceDecision::Declined);
        }
    }
    None
}

fn is_rice_rejection(text: &str) -> bool {
    let t = text.trim().to_lowercase();
    t == "no"
        || t.starts_with("no,")
        || t.starts_with("no ")
        || t.contains("sin arroz")
        || t == "nada"
        || t.starts_with("nada,")
}

fn asked_about_rice(msg: &ConversationMessage) -> bool {
    if msg.role != "assistant" {
        return false;
    }
    let t = msg.content.to_lowercase();
    t.contains("arroz") && (t.contains('?') || t.contains('¿'))
}
