//! Ingredient line parsing.
//!
//! Turns a free-text line such as "1 1/2 cups flour" into a quantity, a unit
//! and a name. Parsing never fails: at worst the whole line becomes the name.

use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

use crate::model::Ingredient;

/// Bare text fraction at the start of the line, e.g. "1/2 cup"
static LEADING_FRACTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*/\s*(\d+)").expect("Invalid fraction regex"));

/// Leading whole or decimal number, e.g. "2", "1.5"
static LEADING_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(?:\.\d+)?").expect("Invalid number regex"));

/// Text fraction following a whole number, e.g. the "1/2" in "1 1/2"
static TRAILING_FRACTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)/(\d+)").expect("Invalid fraction regex"));

/// Known units, lowercase
const UNITS: &[&str] = &[
    // Volume
    "cup",
    "cups",
    "c",
    "tablespoon",
    "tablespoons",
    "tbsp",
    "tbsps",
    "tbs",
    "tbl",
    "tb",
    "teaspoon",
    "teaspoons",
    "tsp",
    "tsps",
    "ts",
    "milliliter",
    "milliliters",
    "millilitre",
    "millilitres",
    "ml",
    "liter",
    "liters",
    "litre",
    "litres",
    "l",
    "pint",
    "pints",
    "quart",
    "quarts",
    "gallon",
    "gallons",
    // Weight
    "ounce",
    "ounces",
    "oz",
    "pound",
    "pounds",
    "lb",
    "lbs",
    "gram",
    "grams",
    "g",
    "kilogram",
    "kilograms",
    "kg",
    // Count
    "pinch",
    "pinches",
    "dash",
    "dashes",
    "clove",
    "cloves",
    "slice",
    "slices",
    "piece",
    "pieces",
    "pc",
    "pcs",
    "can",
    "cans",
    "package",
    "packages",
    "pkg",
    "pkgs",
    "bunch",
    "bunches",
    "sprig",
    "sprigs",
    "head",
    "heads",
    "stick",
    "sticks",
    // Size words that act like units
    "large",
    "medium",
    "small",
];

/// Map a unicode vulgar fraction to its value
fn unicode_fraction(c: char) -> Option<f64> {
    let value = match c {
        '½' => 0.5,
        '¼' => 0.25,
        '¾' => 0.75,
        '⅓' => 1.0 / 3.0,
        '⅔' => 2.0 / 3.0,
        '⅛' => 0.125,
        '⅜' => 0.375,
        '⅝' => 0.625,
        '⅞' => 0.875,
        _ => return None,
    };
    Some(value)
}

/// Whether `token` is in the unit vocabulary (case-insensitive, trailing dot ignored)
pub fn is_known_unit(token: &str) -> bool {
    let lower = token.trim_end_matches('.').to_lowercase();
    UNITS.contains(&lower.as_str())
}

/// Consume a unicode fraction at the start of `text`, skipping leading spaces.
fn take_unicode_fraction(text: &str) -> Option<(f64, &str)> {
    let trimmed = text.trim_start();
    let mut chars = trimmed.chars();
    let c = chars.next()?;
    unicode_fraction(c).map(|value| (value, chars.as_str()))
}

/// Consume the leading quantity. Returns the quantity and the remaining text.
fn take_quantity(line: &str) -> (Option<f64>, &str) {
    if let Some(caps) = LEADING_FRACTION.captures(line) {
        let numerator: f64 = caps[1].parse().unwrap_or(0.0);
        let denominator: f64 = caps[2].parse().unwrap_or(0.0);
        let rest = &line[caps[0].len()..];
        if denominator == 0.0 {
            return (Some(numerator), rest);
        }
        return (Some(numerator / denominator), rest);
    }

    if let Some(m) = LEADING_NUMBER.find(line) {
        let mut quantity: f64 = m.as_str().parse().unwrap_or(0.0);
        let mut rest = &line[m.end()..];

        // mixed number: "1½" / "1 ½" or "1 1/2"
        if let Some((fraction, after)) = take_unicode_fraction(rest) {
            quantity += fraction;
            rest = after;
        } else if let Some(caps) = TRAILING_FRACTION.captures(rest) {
            let numerator: f64 = caps[1].parse().unwrap_or(0.0);
            let denominator: f64 = caps[2].parse().unwrap_or(0.0);
            if denominator != 0.0 {
                quantity += numerator / denominator;
            }
            rest = &rest[caps[0].len()..];
        }

        return (Some(quantity), rest);
    }

    if let Some((fraction, after)) = take_unicode_fraction(line) {
        return (Some(fraction), after);
    }

    (None, line)
}

/// Parse one free-text ingredient line.
pub fn parse_ingredient_line(raw: &str) -> Ingredient {
    let line = raw.trim();
    let (quantity, rest) = take_quantity(line);

    let mut tokens = rest.split_whitespace();
    let mut unit = String::new();
    let mut name_tokens: Vec<&str> = Vec::new();

    if let Some(first) = tokens.next() {
        let speculative = first.chars().count() <= 4
            && first.chars().next().is_some_and(|c| c.is_alphabetic());

        if is_known_unit(first) || speculative {
            unit = first.trim_end_matches('.').to_string();
        } else {
            name_tokens.push(first);
        }
    }
    name_tokens.extend(tokens);

    let mut name = name_tokens.join(" ");

    // "3 eggs": the short noun was taken as a unit, give it back
    if name.is_empty() && !unit.is_empty() {
        name = std::mem::take(&mut unit);
    }

    if name.is_empty() {
        name = line.to_string();
    }

    Ingredient {
        id: Uuid::new_v4(),
        name,
        quantity: quantity.unwrap_or(0.0),
        units: unit,
        raw: Some(raw.to_string()),
    }
}
