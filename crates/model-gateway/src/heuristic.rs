//! Deterministic search heuristic over the question text.

use std::sync::OnceLock;

use regex::Regex;

/// Earliest year considered "current information".
const CURRENT_YEAR_FLOOR: i32 = 2023;

/// Keywords and institutions that force search augmentation.
const FORCE_SEARCH_KEYWORDS: &[&str] = &[
    "cambios",
    "requisitos",
    "plazos",
    "nuevo",
    "nueva",
    "actualizado",
    "actualizada",
    "tasas",
    "cita previa",
    "extranjería",
    "extranjeria",
    "sepe",
    "boe",
    "ministerio",
    "madrid",
    "barcelona",
    "valencia",
    "sevilla",
    "andalucía",
    "cataluña",
];

fn year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{4})\b").unwrap())
}

/// Whether a question deterministically warrants search augmentation even if
/// the model did not request the tool: a 4-digit year at or past the floor,
/// or any keyword from the fixed set.
pub fn needs_current_info(question: &str) -> bool {
    for capture in year_re().captures_iter(question) {
        if let Ok(year) = capture[1].parse::<i32>() {
            if year >= CURRENT_YEAR_FLOOR {
                return true;
            }
        }
    }

    let lowered = question.to_lowercase();
    FORCE_SEARCH_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
}
