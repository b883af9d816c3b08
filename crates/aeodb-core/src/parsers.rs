//! Canonical parsers for the loosely-typed fields on a response record.
//!
//! The row source stores `solution_analysis` either as a JSON object or as a
//! string containing a JSON object, and `rank_list` in three historical
//! shapes. Each parser tries the documented fallback order and returns a
//! tagged result instead of swallowing failures into an empty map.

use std::collections::BTreeMap;

use serde_json::Value;

/// Result of parsing a `solution_analysis` field.
///
/// Fallback order: JSON object → string-encoded JSON object → `Malformed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureAnalysis {
    /// Feature-name → verdict (`YES`/`NO`/`N/A`, as stored).
    Parsed(BTreeMap<String, String>),
    Malformed,
}

impl FeatureAnalysis {
    /// Fraction of feature entries whose verdict is `YES`, case-insensitive.
    ///
    /// `partial`/`planned` verdicts are NOT counted as positive. An empty or
    /// malformed analysis yields 0.0.
    #[must_use]
    pub fn yes_fraction(&self) -> f64 {
        match self {
            FeatureAnalysis::Parsed(features) if !features.is_empty() => {
                let yes = features
                    .values()
                    .filter(|v| v.eq_ignore_ascii_case("yes"))
                    .count();
                #[allow(clippy::cast_precision_loss)]
                {
                    yes as f64 / features.len() as f64
                }
            }
            _ => 0.0,
        }
    }
}

/// Parse a `solution_analysis` value into a [`FeatureAnalysis`].
#[must_use]
pub fn parse_solution_analysis(value: &Value) -> FeatureAnalysis {
    match value {
        Value::Object(map) => FeatureAnalysis::Parsed(object_to_features(map)),
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => FeatureAnalysis::Parsed(object_to_features(&map)),
            _ => FeatureAnalysis::Malformed,
        },
        _ => FeatureAnalysis::Malformed,
    }
}

fn object_to_features(map: &serde_json::Map<String, Value>) -> BTreeMap<String, String> {
    map.iter()
        .map(|(k, v)| {
            let verdict = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), verdict)
        })
        .collect()
}

/// Result of parsing a `rank_list` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedRankings {
    /// Company names in ranked order, best first.
    Parsed(Vec<String>),
    Malformed,
}

impl ParsedRankings {
    #[must_use]
    pub fn into_names(self) -> Option<Vec<String>> {
        match self {
            ParsedRankings::Parsed(names) => Some(names),
            ParsedRankings::Malformed => None,
        }
    }
}

/// Parse a `rank_list` field into ranked company names.
///
/// Fallback order:
/// 1. JSON array of strings.
/// 2. JSON array of objects carrying a `name` or `company` key.
/// 3. Delimited text (newline or comma separated, optional `1.`-style
///    numbering stripped).
///
/// Anything else, including an entirely empty list, is `Malformed`.
#[must_use]
pub fn parse_rank_list(raw: &str) -> ParsedRankings {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return ParsedRankings::Malformed;
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if let Value::Array(items) = value {
            if let Some(names) = json_array_names(&items) {
                return ParsedRankings::Parsed(names);
            }
            return ParsedRankings::Malformed;
        }
        // A bare JSON scalar is not a ranking; fall through to the text path
        // only for strings, which may be a quoted delimited list.
        if !value.is_string() {
            return ParsedRankings::Malformed;
        }
    }

    let names = delimited_names(trimmed);
    if names.is_empty() {
        ParsedRankings::Malformed
    } else {
        ParsedRankings::Parsed(names)
    }
}

fn json_array_names(items: &[Value]) -> Option<Vec<String>> {
    let mut names = Vec::with_capacity(items.len());
    for item in items {
        let name = match item {
            Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
            Value::Object(map) => map
                .get("name")
                .or_else(|| map.get("company"))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToOwned::to_owned)?,
            _ => return None,
        };
        names.push(name);
    }
    if names.is_empty() {
        None
    } else {
        Some(names)
    }
}

fn delimited_names(raw: &str) -> Vec<String> {
    raw.split(['\n', ','])
        .map(strip_rank_prefix)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Strip a leading `3.` / `3)` style rank marker from one entry.
fn strip_rank_prefix(entry: &str) -> &str {
    let entry = entry.trim();
    let digits = entry.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 {
        return entry;
    }
    let rest = &entry[digits..];
    rest.strip_prefix('.')
        .or_else(|| rest.strip_prefix(')'))
        .map_or(entry, str::trim_start)
}
