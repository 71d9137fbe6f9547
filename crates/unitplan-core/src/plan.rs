//! Unit-plan payload types shared by the cache, the model client and the aggregator.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// A source PDF as reported by the file store.
///
/// Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    pub id: String,
    pub name: String,
    /// Modification stamp. Compared by exact string equality, never by recency.
    pub updated_at: String,
}

/// One taught unit as reported by the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitItem {
    /// Original free-text phrase, e.g. "4〜5月" or "通年".
    pub period: String,
    /// Model-proposed month mentions. May be empty or malformed.
    pub months: Vec<String>,
    pub unit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hours: Option<f64>,
}

/// Everything extracted from one source file.
///
/// `source_file`, `file_id` and `file_updated_ms` are provenance fields
/// attached by the pipeline after the model call, not by the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionPayload {
    pub subject: String,
    pub items: Vec<UnitItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_updated_ms: Option<String>,
}

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("payload `items` is missing or not an array")]
    ItemsNotArray,
    #[error("payload JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExtractionPayload {
    /// Decode a payload from loosely-typed model output.
    ///
    /// Only the shape is enforced: the value must be an object whose `items`
    /// is an array. Scalars are stringified where a string is expected, and
    /// items with a blank `unit` are dropped.
    pub fn from_value(value: &Value) -> Result<Self, PayloadError> {
        let obj = value.as_object().ok_or(PayloadError::NotAnObject)?;
        let items = obj
            .get("items")
            .and_then(Value::as_array)
            .ok_or(PayloadError::ItemsNotArray)?;

        Ok(Self {
            subject: obj.get("subject").map(scalar_text).unwrap_or_default(),
            items: items.iter().filter_map(UnitItem::from_value).collect(),
            source_file: optional_text(obj, "sourceFile"),
            file_id: optional_text(obj, "fileId"),
            file_updated_ms: optional_text(obj, "fileUpdatedMs"),
        })
    }

    /// Decode a payload from serialized JSON (e.g. a cache row).
    pub fn from_json_str(json: &str) -> Result<Self, PayloadError> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(&value)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Stamp provenance from the live file, overwriting anything present.
    pub fn attach_provenance(&mut self, file: &FileRef) {
        self.source_file = Some(file.name.clone());
        self.file_id = Some(file.id.clone());
        self.file_updated_ms = Some(file.updated_at.clone());
    }

    /// Fill in provenance fields that are missing, keeping stored values.
    pub fn backfill_provenance(&mut self, file: &FileRef) {
        fill_missing(&mut self.source_file, &file.name);
        fill_missing(&mut self.file_id, &file.id);
        fill_missing(&mut self.file_updated_ms, &file.updated_at);
    }

    pub fn source_file_name(&self) -> &str {
        self.source_file.as_deref().unwrap_or("")
    }
}

impl UnitItem {
    /// Decode one item, returning `None` when the unit name is blank.
    fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let unit = obj.get("unit").map(scalar_text).unwrap_or_default();
        let unit = unit.trim();
        if unit.is_empty() {
            return None;
        }

        let months = match obj.get("months") {
            Some(Value::Array(values)) => values.iter().map(scalar_text).collect(),
            _ => Vec::new(),
        };

        Some(Self {
            period: obj.get("period").map(scalar_text).unwrap_or_default(),
            months,
            unit: unit.to_string(),
            hours: obj.get("hours").and_then(parse_hours),
        })
    }
}

/// Render an allotment the way it appears in table cells: `3`, `1.5`.
pub fn format_hours(hours: f64) -> String {
    format!("{hours}")
}

fn parse_hours(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            s.parse::<f64>().ok()?
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

fn optional_text(obj: &Map<String, Value>, key: &str) -> Option<String> {
    let text = obj.get(key).map(scalar_text)?;
    (!text.is_empty()).then_some(text)
}

fn fill_missing(slot: &mut Option<String>, value: &str) {
    if slot.as_deref().is_none_or(str::is_empty) {
        *slot = Some(value.to_string());
    }
}
