use std::sync::LazyLock;

use regex::Regex;

/// Supplies the active dish names the matcher works against.
pub trait MenuProvider: Send + Sync {
    fn active_dishes(&self) -> anyhow::Result<Vec<String>>;
}

/// Outcome of matching a freeform rice request against the menu snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum RiceMatch {
    Valid(String),
    NotFound(String),
    Multiple(Vec<String>, String),
}

static PRICE_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\([^)]*\)\s*$").unwrap());

// Politeness and request verbs that carry no dish information.
const FILLER_WORDS: &[&str] = &[
    "por", "favor", "gracias", "si", "no", "queremos", "quiero", "para",
];
// Category tokens and articles stripped only from the front.
const CATEGORY_TOKENS: &[&str] = &["arroz", "paella", "fideua"];
const ARTICLES: &[&str] = &["del", "de", "la", "el", "los", "las", "un", "una", "unos", "unas"];

/// Matches a freeform dish request against the menu.
///
/// Two tiers, first non-empty one decides: bidirectional substring
/// containment on the normalized strings, then token-overlap scoring
/// (tokens of length >= 3, best score kept). Deterministic for a given
/// `(request, menu)` pair; candidate order follows menu order.
pub fn match_rice(request: &str, menu: &[String]) -> RiceMatch {
    let normalized_request = normalize(request);
    if normalized_request.is_empty() {
        return RiceMatch::NotFound(request.to_string());
    }

    let normalized_menu: Vec<(String, String)> = menu
        .iter()
        .map(|name| (canonical_name(name), normalize(&canonical_name(name))))
        .filter(|(_, n)| !n.is_empty())
        .collect();

    let tier1: Vec<&String> = normalized_menu
        .iter()
        .filter(|(_, n)| n.contains(&normalized_request) || normalized_request.contains(n))
        .map(|(canonical, _)| canonical)
        .collect();
    if !tier1.is_empty() {
        return classify(tier1, request);
    }

    let request_tokens: Vec<&str> = normalized_request
        .split_whitespace()
        .filter(|t| t.len() >= 3)
        .collect();
    let mut scored: Vec<(&String, usize)> = normalized_menu
        .iter()
        .map(|(canonical, n)| {
            let score = n
                .split_whitespace()
                .filter(|t| t.len() >= 3 && request_tokens.contains(t))
                .count();
            (canonical, score)
        })
        .filter(|(_, score)| *score > 0)
        .collect();
    let best = scored.iter().map(|(_, s)| *s).max().unwrap_or(0);
    scored.retain(|(_, s)| *s == best);

    classify(scored.into_iter().map(|(c, _)| c).collect(), request)
}

fn classify(candidates: Vec<&String>, request: &str) -> RiceMatch {
    match candidates.as_slice() {
        [] => RiceMatch::NotFound(request.to_string()),
        [single] => RiceMatch::Valid((*single).clone()),
        many => RiceMatch::Multiple(
            many.iter().map(|c| (*c).clone()).collect(),
            request.to_string(),
        ),
    }
}

/// Dish name without its trailing price/annotation suffix,
/// e.g. `"Arroz de señoret (+3€)"` → `"Arroz de señoret"`.
pub fn canonical_name(name: &str) -> String {
    PRICE_SUFFIX_RE.replace(name, "").trim().to_string()
}

fn normalize(text: &str) -> String {
    let lowered = strip_diacritics(&text.to_lowercase());
    let mut tokens: Vec<&str> = lowered
        .split_whitespace()
        .filter(|t| !FILLER_WORDS.contains(t))
        .collect();
    while let Some(first) = tokens.first() {
        if CATEGORY_TOKENS.contains(first) || ARTICLES.contains(first) {
            tokens.remove(0);
        } else {
            break;
        }
    }
    tokens.join(" ")
}

fn strip_diacritics(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'á' | 'à' => 'a',
            'é' | 'è' => 'e',
            'í' => 'i',
            'ó' | 'ò' => 'o',
            'ú' | 'ü' => 'u',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn menu() -> Vec<String> {
        vec![
            "Arroz de señoret (+3€)".to_string(),
            "Paella valenciana".to_string(),
            "Arroz negro".to_string(),
            "Arroz del senyoret especial (+5€)".to_string(),
        ]
    }

    #[test]
    fn test_exact_fragment_matches() {
        let menu = vec![
            "Arroz de señoret (+3€)".to_string(),
            "Paella valenciana".to_string(),
        ];
        assert_eq!(
            match_rice("señoret", &menu),
            RiceMatch::Valid("Arroz de señoret".to_string())
        );
    }

    #[test]
    fn test_polite_request_matches() {
        let menu = menu();
        assert_eq!(
            match_rice("queremos arroz negro por favor", &menu),
            RiceMatch::Valid("Arroz negro".to_string())
        );
    }

    #[test]
    fn test_round_trip_over_menu() {
        let menu = menu();
        for name in &menu {
            let canonical = canonical_name(name);
            let request = format!("quiero {canonical}");
            match match_rice(&request, &menu) {
                RiceMatch::Valid(found) => assert_eq!(found, canonical),
                // Dishes that contain another dish's name can legitimately
                // tie; the canonical name must still be among them.
                RiceMatch::Multiple(names, _) => assert!(names.contains(&canonical)),
                RiceMatch::NotFound(req) => panic!("{req} not found"),
            }
        }
    }

    #[test]
    fn test_unknown_dish_is_not_found() {
        assert_eq!(
            match_rice("bogavante a la plancha", &menu()),
            RiceMatch::NotFound("bogavante a la plancha".to_string())
        );
    }

    #[test]
    fn test_ambiguous_request_lists_candidates() {
        let menu = vec![
            "Arroz negro de sepia".to_string(),
            "Arroz negro de chipirones".to_string(),
        ];
        match match_rice("arroz negro", &menu) {
            RiceMatch::Multiple(names, request) => {
                assert_eq!(
                    names,
                    vec![
                        "Arroz negro de sepia".to_string(),
                        "Arroz negro de chipirones".to_string()
                    ]
                );
                assert_eq!(request, "arroz negro");
            }
            other => panic!("expected multiple, got {other:?}"),
        }
    }

    #[test]
    fn test_token_overlap_tier() {
        let menu = vec![
            "Arroz a banda".to_string(),
            "Arroz meloso de bogavante".to_string(),
        ];
        assert_eq!(
            match_rice("el meloso con bogavante", &menu),
            RiceMatch::Valid("Arroz meloso de bogavante".to_string())
        );
    }

    #[test]
    fn test_diacritics_do_not_matter() {
        let menu = vec!["Arroz de señoret (+3€)".to_string()];
        assert_eq!(
            match_rice("senoret", &menu),
            RiceMatch::Valid("Arroz de señoret".to_string())
        );
    }

    #[test]
    fn test_canonical_strips_price_suffix() {
        assert_eq!(canonical_name("Arroz de señoret (+3€)"), "Arroz de señoret");
        assert_eq!(canonical_name("Paella valenciana"), "Paella valenciana");
    }

    #[test]
    fn test_deterministic() {
        let menu = menu();
        let first = match_rice("señoret", &menu);
        for _ in 0..5 {
            assert_eq!(match_rice("señoret", &menu), first);
        }
    }

    #[test]
    fn test_empty_request_not_found() {
        assert_eq!(
            match_rice("por favor", &menu()),
            RiceMatch::NotFound("por favor".to_string())
        );
    }
}
