use std::sync::LazyLock;

use regex::Regex;

use crate::models::{BookingPayload, Intent};

/// Shown when cleanup leaves nothing displayable.
pub const FALLBACK_REPLY: &str =
    "Perdona, no te he entendido bien. ¿Me lo puedes repetir, por favor?";

const BOOKING_TOKEN: &str = "BOOKING_REQUEST|";
const CANCELLATION_TOKEN: &str = "CANCELLATION_REQUEST|";
const MODIFICATION_TOKEN: &str = "MODIFICATION_INTENT";
const SAME_DAY_TOKEN: &str = "SAME_DAY_BOOKING";

static BOOKING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"BOOKING_REQUEST\|([^|\r\n]*)\|([^|\r\n]*)\|([^|\r\n]*)\|([^|\r\n]*)\|([^\r\n]*)")
        .unwrap()
});
static CANCELLATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"CANCELLATION_REQUEST\|([^|\r\n]*)\|([^|\r\n]*)\|([^|\r\n]*)\|([^|\r\n]*)\|([^\r\n]*)",
    )
    .unwrap()
});
static TIME_FIELD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d{1,2})(?::(\d{2}))?").unwrap());
static URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://[^\s]+").unwrap());
static RICE_NEGATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bno\s+queremos\s+arroz\b|\bsin\s+arroz\b|\bnada\s+de\s+arroz\b").unwrap()
});
static RICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\barroz\s+(?:del?\s+)?([a-záéíóúüñ][a-záéíóúüñ ]*)").unwrap()
});
static SERVINGS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2})\s+raciones\b").unwrap());
static HIGH_CHAIRS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2})\s+tronas?\b").unwrap());
static STROLLERS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2})\s+carritos?\b").unwrap());
static BOLD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap());
static BLANK_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReply {
    pub intent: Intent,
    pub text: String,
}

/// Decodes one raw model reply into an intent plus the text that may be shown
/// to the customer. Pure function of its input; a reply that matches nothing
/// comes back as `Normal`, and a directive with a broken payload degrades to
/// `Normal` as well instead of erroring.
pub fn parse_reply(raw: &str) -> ParsedReply {
    let unescaped = unescape(raw);
    let text = clean_display_text(&unescaped);

    // Fixed priority: booking, cancellation, modification, same-day.
    let intent = if unescaped.contains(BOOKING_TOKEN) {
        match directive_payload(&BOOKING_RE, &unescaped) {
            Some(payload) => Intent::Booking(payload),
            None => Intent::Normal,
        }
    } else if unescaped.contains(CANCELLATION_TOKEN) {
        match directive_payload(&CANCELLATION_RE, &unescaped) {
            Some(payload) => Intent::Cancellation(payload),
            None => Intent::Normal,
        }
    } else if unescaped.contains(MODIFICATION_TOKEN) {
        Intent::Modification
    } else if unescaped.contains(SAME_DAY_TOKEN) {
        Intent::SameDay
    } else {
        let urls: Vec<String> = URL_RE
            .find_iter(&unescaped)
            .map(|m| m.as_str().to_string())
            .collect();
        if urls.is_empty() {
            Intent::Normal
        } else {
            Intent::Interactive(urls)
        }
    };

    ParsedReply { intent, text }
}

fn unescape(raw: &str) -> String {
    raw.replace(r"\_", "_").replace(r"\|", "|").replace(r"\*", "*")
}

fn directive_payload(re: &Regex, text: &str) -> Option<BookingPayload> {
    let caps = re.captures(text)?;
    let name = caps[1].trim().to_string();
    let phone = caps[2].trim().to_string();
    let date = caps[3].trim().to_string();
    let party_size: u32 = caps[4].trim().parse().ok()?;
    let time = normalize_time_field(&caps[5])?;

    if name.is_empty() || phone.is_empty() || date.is_empty() {
        return None;
    }

    let (rice, rice_servings) = rice_in_body(text);
    Some(BookingPayload {
        name,
        phone,
        date,
        party_size,
        time,
        rice,
        rice_servings,
        high_chairs: count_in(&HIGH_CHAIRS_RE, text),
        strollers: count_in(&STROLLERS_RE, text),
    })
}

// The last positional field is greedy to end-of-line, so trailing free text
// lands here; only the leading HH[:MM] is the value.
fn normalize_time_field(field: &str) -> Option<String> {
    let caps = TIME_FIELD_RE.captures(field)?;
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

/// Rice mention anywhere in the reply body, unless the body negates rice
/// outright ("no queremos arroz", "sin arroz", "nada de arroz").
fn rice_in_body(text: &str) -> (Option<String>, Option<u32>) {
    if RICE_NEGATION_RE.is_match(text) {
        return (None, None);
    }
    let rice = RICE_RE
        .captures(text)
        .map(|caps| caps[1].trim().to_string())
        .filter(|s| !s.is_empty());
    let servings = count_in(&SERVINGS_RE, text);
    (rice, servings)
}

fn count_in(re: &Regex, text: &str) -> Option<u32> {
    re.captures(text).and_then(|caps| caps[1].parse().ok())
}

fn clean_display_text(text: &str) -> String {
    let without_directives: String = text
        .lines()
        .map(|line| {
            let cut = [
                BOOKING_TOKEN,
                CANCELLATION_TOKEN,
                MODIFICATION_TOKEN,
                SAME_DAY_TOKEN,
            ]
            .iter()
            .filter_map(|token| line.find(token.trim_end_matches('|')))
            .min();
            match cut {
                Some(pos) => &line[..pos],
                None => line,
            }
        })
        .map(|line| if line.trim().is_empty() { "" } else { line })
        .collect::<Vec<_>>()
        .join("\n");

    let emphasized = BOLD_RE.replace_all(&without_directives, "*$1*");
    let collapsed = BLANK_RUN_RE.replace_all(&emphasized, "\n\n");
    let trimmed = collapsed.trim();

    if trimmed.is_empty() {
        FALLBACK_REPLY.to_string()
    } else {
        trimmed.to_string()
    }
}
