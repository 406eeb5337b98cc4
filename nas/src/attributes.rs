//! Extraction tolérante des attributs scalaires
//!
//! Chaque conversion est indépendante et fail-soft: tag absent, texte vide
//! ou littéral imparsable → `None` avec une note debug, jamais d'erreur.

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use tracing::debug;

use crate::element::Element;

/// Texte d'un noeud atteint par enfants directs successifs;
/// `None` si le chemin n'existe pas ou si le texte est vide
pub fn find_text<'a>(element: &'a Element, path: &[&str]) -> Option<&'a str> {
    element.path(path)?.text()
}

pub fn parse_int(value: Option<&str>) -> Option<i32> {
    let value = value?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            debug!(value, "failed to parse integer");
            None
        }
    }
}

/// Booléens ALKIS: true/1/t/yes et false/0/f/no, insensible à la casse
pub fn parse_bool(value: Option<&str>) -> Option<bool> {
    let value = value?;
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "t" | "yes" => Some(true),
        "false" | "0" | "f" | "no" => Some(false),
        _ => {
            debug!(value, "unexpected boolean literal");
            None
        }
    }
}

/// Timestamps ISO-8601; un marqueur UTC final `Z` est normalisé en offset
/// explicite, une valeur sans offset est interprétée comme UTC
pub fn parse_timestamp(value: Option<&str>) -> Option<DateTime<FixedOffset>> {
    let value = value?.trim();

    let normalized = match value.strip_suffix('Z') {
        Some(stripped) => format!("{stripped}+00:00"),
        None => value.to_string(),
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(parsed);
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc().fixed_offset());
    }

    debug!(value, "failed to parse timestamp");
    None
}
