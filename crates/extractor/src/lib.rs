//! Rules-first / LLM-fallback extraction and index-page link discovery
//! (spec §4.4).

mod discovery;
mod llm;
mod rules;

pub use discovery::{discover_listing_links, DiscoveryEntry, MAX_DISCOVERY_LINKS};
pub use llm::GeminiClient;
pub use realtor_core::{classify, PageKind};

use chrono::Utc;
use serde_json::Value;

use realtor_core::{content_hash, listing_id_for_url, ListingRecord};

const REQUIRED_FIELDS: &[&str] = &[
    "price",
    "beds",
    "baths",
    "sqft",
    "lot_size_sqft",
    "address_street",
    "address_city",
    "address_state",
    "address_zip",
    "property_type",
    "year_built",
    "agent_name",
    "brokerage_name",
    "property_description",
];

/// Runs the full detail-page pipeline: rules pass, then (if every fixed
/// field is still falsy and `llm` is configured) the LLM fallback, then
/// record finalization (spec §4.4).
pub async fn extract_detail(html: &str, url: &str, llm: Option<&GeminiClient>) -> ListingRecord {
    let mut record = rules::parse_with_rules(html);
    let mut used_llm = false;

    if !record.any_fixed_field_set() {
        if let Some(client) = llm {
            if let Some(value) = client.extract(html).await {
                if apply_llm_overrides(&mut record, &value) {
                    used_llm = true;
                }
            }
        }
    }

    record.listing_id = listing_id_for_url(url);
    record.url = url.to_string();
    record.content_hash = content_hash(html);
    record.ts = Utc::now().to_rfc3339();
    record.parser_used = if used_llm { "rules+llm" } else { "rules" };
    record.confidence = if record.any_fixed_field_set() || used_llm {
        0.8
    } else {
        0.4
    };

    record
}

/// Overwrites each fixed field present (non-null) in the LLM response, and
/// stashes every other returned key — including the `additional_attributes`
/// bag itself — into `record.additional_attributes`. Returns whether any
/// fixed field was actually set this way.
fn apply_llm_overrides(record: &mut ListingRecord, llm: &Value) -> bool {
    let Value::Object(map) = llm else {
        return false;
    };

    let mut any_set = false;
    for &field in REQUIRED_FIELDS {
        let Some(v) = map.get(field) else { continue };
        if v.is_null() {
            continue;
        }
        any_set = true;
        set_field(record, field, v.clone());
    }

    for (key, value) in map {
        if REQUIRED_FIELDS.contains(&key.as_str()) {
            continue;
        }
        if value.is_null() {
            continue;
        }
        if key == "additional_attributes" {
            if let Value::Object(extra) = value {
                for (k, v) in extra {
                    record.additional_attributes.insert(k.clone(), v.clone());
                }
            }
            continue;
        }
        record.additional_attributes.insert(key.clone(), value.clone());
    }

    any_set
}

fn set_field(record: &mut ListingRecord, field: &str, value: Value) {
    match field {
        "price" => record.price = Some(value),
        "beds" => record.beds = Some(value),
        "baths" => record.baths = Some(value),
        "sqft" => record.sqft = Some(value),
        "lot_size_sqft" => record.lot_size_sqft = Some(value),
        "address_street" => record.address_street = value.as_str().map(str::to_string),
        "address_city" => record.address_city = value.as_str().map(str::to_string),
        "address_state" => record.address_state = value.as_str().map(str::to_string),
        "address_zip" => record.address_zip = value.as_str().map(str::to_string),
        "property_type" => record.property_type = value.as_str().map(str::to_string),
        "year_built" => record.year_built = Some(value),
        "agent_name" => record.agent_name = value.as_str().map(str::to_string),
        "brokerage_name" => record.brokerage_name = value.as_str().map(str::to_string),
        "property_description" => {
            record.property_description = value.as_str().map(str::to_string)
        }
        _ => {}
    }
}
