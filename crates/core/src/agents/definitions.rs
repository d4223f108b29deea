//! # Specialist Definitions
//!
//! Parses the analyst's reply into `{role, system_prompt}` records.
//!
//! Models do not always return bare JSON, so the parser accepts:
//! - a JSON array of records
//! - an object wrapping the array under `specialists`
//! - either of the above inside a Markdown code fence or surrounded by prose

use serde::{Deserialize, Serialize};

/// One specialist as described by the analyst
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpecialistDefinition {
    pub role: String,
    #[serde(alias = "systemPrompt")]
    pub system_prompt: String,
}

impl SpecialistDefinition {
    pub fn new(role: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            system_prompt: system_prompt.into(),
        }
    }

    fn is_valid(&self) -> bool {
        !self.role.trim().is_empty() && !self.system_prompt.trim().is_empty()
    }
}

#[derive(Deserialize)]
struct Wrapped {
    specialists: Vec<serde_json::Value>,
}

/// Extract specialist definitions from `text`.
///
/// Records missing a role or prompt are dropped. Returns `None` when no JSON
/// can be found or no valid record remains.
pub fn parse_specialist_definitions(text: &str) -> Option<Vec<SpecialistDefinition>> {
    let body = strip_code_fence(text.trim());

    let records = parse_records(body)
        .or_else(|| slice_between(body, '[', ']').and_then(parse_records))
        .or_else(|| slice_between(body, '{', '}').and_then(parse_records))?;

    let total = records.len();
    let valid: Vec<SpecialistDefinition> = records
        .into_iter()
        .filter_map(|value| serde_json::from_value::<SpecialistDefinition>(value).ok())
        .filter(SpecialistDefinition::is_valid)
        .map(|d| SpecialistDefinition::new(d.role.trim(), d.system_prompt.trim()))
        .collect();

    if valid.len() < total {
        tracing::warn!(
            "Dropped {} malformed specialist definitions out of {}",
            total - valid.len(),
            total
        );
    }

    if valid.is_empty() {
        None
    } else {
        Some(valid)
    }
}

fn parse_records(candidate: &str) -> Option<Vec<serde_json::Value>> {
    match serde_json::from_str::<serde_json::Value>(candidate).ok()? {
        serde_json::Value::Array(items) => Some(items),
        object @ serde_json::Value::Object(_) => serde_json::from_value::<Wrapped>(object)
            .ok()
            .map(|w| w.specialists),
        _ => None,
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Skip the info string ("json") on the opening line
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn slice_between(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}
