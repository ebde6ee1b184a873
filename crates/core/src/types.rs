use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Inbound queue message (spec §3, §6): `{"url_to_scrape": "..."}`.
#[derive(Debug, Clone, Deserialize)]
pub struct UrlTask {
    pub url_to_scrape: String,
}

/// Whether a URL is a search/browse index page or a single-listing detail
/// page. The substring test is intentionally exact — see spec §4.4 and
/// §9's open question about preserving observed classification behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Index,
    Detail,
}

pub fn classify(url: &str) -> PageKind {
    if url.contains("/realestateandhomes-search/") {
        return PageKind::Index;
    }
    if url.contains("/realestateandhomes") && !url.contains("-detail/") {
        return PageKind::Index;
    }
    PageKind::Detail
}

/// Result of a single HTTPS GET. Immutable, lives for one request (spec §3).
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub status: u16,
    pub body: String,
    pub final_url: String,
}

/// An egress endpoint tracked by the proxy pool (spec §3, §4.2).
#[derive(Debug, Clone)]
pub struct ProxyEndpoint {
    pub url: String,
    pub score: f64,
    pub cooldown_until: Instant,
}

/// The fixed listing record schema (spec §3) plus provenance fields.
/// All fixed fields are nullable; extra LLM-only fields land in
/// `additional_attributes` instead of widening this struct, matching the
/// original `**record` / bag-of-extras style without losing static typing
/// on the fields every caller can rely on.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListingRecord {
    pub price: Option<Value>,
    pub beds: Option<Value>,
    pub baths: Option<Value>,
    pub sqft: Option<Value>,
    pub lot_size_sqft: Option<Value>,
    pub address_street: Option<String>,
    pub address_city: Option<String>,
    pub address_state: Option<String>,
    pub address_zip: Option<String>,
    pub property_type: Option<String>,
    pub year_built: Option<Value>,
    pub agent_name: Option<String>,
    pub brokerage_name: Option<String>,
    pub property_description: Option<String>,

    pub listing_id: String,
    pub url: String,
    pub ts: String,
    pub content_hash: String,
    pub parser_used: &'static str,
    pub confidence: f64,

    #[serde(flatten)]
    pub additional_attributes: Map<String, Value>,
}

impl ListingRecord {
    /// The fixed fields considered by the "is anything populated" checks in
    /// spec §4.4/§9 (LLM-fallback trigger, `parser_used`, `confidence`).
    pub fn any_fixed_field_set(&self) -> bool {
        self.price.as_ref().is_some_and(is_truthy)
            || self.beds.as_ref().is_some_and(is_truthy)
            || self.baths.as_ref().is_some_and(is_truthy)
            || self.sqft.as_ref().is_some_and(is_truthy)
            || self.lot_size_sqft.as_ref().is_some_and(is_truthy)
            || self.address_street.as_deref().is_some_and(|s| !s.is_empty())
            || self.address_city.as_deref().is_some_and(|s| !s.is_empty())
            || self.address_state.as_deref().is_some_and(|s| !s.is_empty())
            || self.address_zip.as_deref().is_some_and(|s| !s.is_empty())
            || self.property_type.as_deref().is_some_and(|s| !s.is_empty())
            || self.year_built.as_ref().is_some_and(is_truthy)
            || self.agent_name.as_deref().is_some_and(|s| !s.is_empty())
            || self.brokerage_name.as_deref().is_some_and(|s| !s.is_empty())
            || self
                .property_description
                .as_deref()
                .is_some_and(|s| !s.is_empty())
    }
}

fn is_truthy(v: &Value) -> bool {
    !matches!(v, Value::Null) && v != &Value::from(0) && v != &Value::from(false) && v != &Value::from("")
}

/// `listing_id`: trailing `_<id>` segment of the URL if present, else the
/// first 12 hex chars of SHA-256(url). Mirrors
/// `original_source`'s `_extract_listing_id`, which splits unconditionally
/// on `_` with no validation that the tail looks like an id.
pub fn listing_id_for_url(url: &str) -> String {
    let parts: Vec<&str> = url.split('_').collect();
    if parts.len() > 1 {
        if let Some(last) = parts.last() {
            if !last.is_empty() {
                return last.to_string();
            }
        }
    }
    sha256_hex(url)[..12].to_string()
}

/// First 16 hex chars of SHA-256(html), per spec §3.
pub fn content_hash(html: &str) -> String {
    sha256_hex(html)[..16].to_string()
}

fn sha256_hex(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    hex::encode(hasher.finalize())
}
