//! Small text utilities shared by the extractors.

use std::sync::LazyLock;

use html_escape::decode_html_entities;
use regex::Regex;

static TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("Invalid HTML tag regex"));

static WHITESPACE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid whitespace regex"));

static DURATION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^P(?:(\d+(?:\.\d+)?)D)?(?:T(?:(\d+(?:\.\d+)?)H)?(?:(\d+(?:\.\d+)?)M)?(?:(\d+(?:\.\d+)?)S)?)?$",
    )
    .expect("Invalid duration regex")
});

/// Decode named and numeric HTML entities.
pub fn decode_html_symbols(text: &str) -> String {
    // decode twice so double-escaped text ("&amp;amp;") comes out right
    decode_html_entities(&decode_html_entities(text)).into_owned()
}

/// Remove anything that looks like an HTML tag.
pub fn strip_tags(text: &str) -> String {
    TAG_REGEX.replace_all(text, " ").into_owned()
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn normalize_whitespace(text: &str) -> String {
    WHITESPACE_REGEX.replace_all(text.trim(), " ").into_owned()
}

/// Strip tags, decode entities and tidy whitespace. Returns `None` when
/// nothing is left.
pub fn clean_text(text: &str) -> Option<String> {
    let cleaned = normalize_whitespace(&decode_html_symbols(&strip_tags(text)));
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Convert an ISO 8601 duration (e.g. `PT1H30M`, `P1DT2H`, `PT5400.0S`) into
/// whole minutes. A bare number is taken as minutes.
pub fn duration_to_minutes(duration: &str) -> Option<u32> {
    let duration = duration.trim();
    if duration.is_empty() {
        return None;
    }

    if let Ok(minutes) = duration.parse::<u32>() {
        return Some(minutes);
    }

    let caps = DURATION_REGEX.captures(duration)?;
    let part = |i: usize| -> f64 {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .unwrap_or(0.0)
    };

    if (1..=4).all(|i| caps.get(i).is_none()) {
        return None;
    }

    let minutes = part(1) * 24.0 * 60.0 + part(2) * 60.0 + part(3) + part(4) / 60.0;
    Some(minutes.round() as u32)
}

/// Normalise a schema.org diet value, e.g. `https://schema.org/VeganDiet` -> `Vegan`.
pub fn clean_diet_value(diet: &str) -> String {
    diet.trim()
        .trim_start_matches("https://schema.org/")
        .trim_start_matches("http://schema.org/")
        .replace("Diet", "")
        .trim()
        .to_string()
}
