//! Catalog entry model and record normalization.
//!
//! The document store hands out untyped records. Persisted records may lack
//! `rating`, `downloads` or `featured` (and older ones keep the icon under
//! `icon`), so defaults are applied here at read time and never written back.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Document field names as persisted in the `apps` collection.
pub mod fields {
    pub const NAME: &str = "name";
    pub const DESCRIPTION: &str = "description";
    pub const CATEGORY: &str = "category";
    pub const ICON_URL: &str = "iconUrl";
    pub const LEGACY_ICON: &str = "icon";
    pub const DOWNLOAD_URL: &str = "downloadUrl";
    pub const RATING: &str = "rating";
    pub const DOWNLOADS: &str = "downloads";
    pub const FEATURED: &str = "featured";
    pub const CREATED_AT: &str = "createdAt";
    pub const UPDATED_AT: &str = "updatedAt";
}

/// A document exactly as delivered by the document store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Backend-assigned document id
    pub id: String,

    /// Document body; any shape is accepted
    pub fields: Map<String, Value>,
}

impl RawRecord {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    fn text(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    fn timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
        self.text(key)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// A fully populated catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    /// Backend-assigned id, immutable
    pub id: String,

    pub name: String,

    pub description: String,

    /// Free-form category, filtered by exact equality
    pub category: String,

    /// Public URL of the uploaded icon
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,

    /// External download link, not validated
    pub download_url: String,

    /// Admin-assigned rating
    pub rating: f64,

    /// Public download counter
    pub downloads: u64,

    /// Promoted on the storefront
    pub featured: bool,

    /// When the entry was first written
    pub created_at: DateTime<Utc>,

    /// Last mutation time, absent on records that were never touched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl CatalogEntry {
    /// Build a typed entry from an untyped record, coalescing missing fields.
    ///
    /// `now` stands in for a missing or unparsable `createdAt`.
    pub fn normalize(raw: &RawRecord, now: DateTime<Utc>) -> Self {
        let text = |key: &str| raw.text(key).unwrap_or_default().to_string();

        let icon_url = raw
            .text(fields::ICON_URL)
            .or_else(|| raw.text(fields::LEGACY_ICON))
            .filter(|url| !url.is_empty())
            .map(str::to_string);

        Self {
            id: raw.id.clone(),
            name: text(fields::NAME),
            description: text(fields::DESCRIPTION),
            category: text(fields::CATEGORY),
            icon_url,
            download_url: text(fields::DOWNLOAD_URL),
            rating: raw.fields.get(fields::RATING).and_then(lenient_f64).unwrap_or(0.0),
            downloads: raw.fields.get(fields::DOWNLOADS).map(lenient_u64).unwrap_or(0),
            featured: raw
                .fields
                .get(fields::FEATURED)
                .and_then(Value::as_bool)
                .unwrap_or(false),
            created_at: raw.timestamp(fields::CREATED_AT).unwrap_or(now),
            updated_at: raw.timestamp(fields::UPDATED_AT),
        }
    }

    /// Description cut to `max_chars` characters for table rows.
    pub fn summary(&self, max_chars: usize) -> String {
        if self.description.chars().count() <= max_chars {
            return self.description.clone();
        }

        let mut cut: String = self.description.chars().take(max_chars).collect();
        cut.push_str("...");
        cut
    }
}

/// Format a timestamp the way records persist it (`2025-01-01T00:00:00.000Z`).
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Leading decimal number in `input`, ignoring whatever follows it.
///
/// `"4.5 stars"` reads as 4.5 and `"12abc"` as 12; text with no leading
/// digits yields `None`. Exponents are not recognized.
pub fn parse_number_prefix(input: &str) -> Option<f64> {
    let input = input.trim_start();

    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    for (i, c) in input.char_indices() {
        match c {
            '+' | '-' if i == 0 => {}
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end = i + c.len_utf8();
    }

    if !seen_digit {
        return None;
    }
    input[..end].parse::<f64>().ok().filter(|f| f.is_finite())
}

/// Rating as typed into a form; 0 when no number leads the text.
pub fn parse_rating(input: &str) -> f64 {
    parse_number_prefix(input).unwrap_or(0.0)
}

/// Count as typed into a form, truncated toward zero; negatives read as 0.
pub fn parse_count(input: &str) -> u64 {
    parse_number_prefix(input).map(count_from).unwrap_or(0)
}

/// Float to count. Saturates at `u64::MAX`.
fn count_from(f: f64) -> u64 {
    if f > 0.0 {
        f as u64
    } else {
        0
    }
}

fn lenient_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => parse_number_prefix(s),
        _ => None,
    }
}

fn lenient_u64(value: &Value) -> u64 {
    if let Some(n) = value.as_u64() {
        return n;
    }

    lenient_f64(value).map(count_from).unwrap_or(0)
}
