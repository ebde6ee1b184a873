//! Rules-first detail-page extraction: title fallback + tolerant JSON-LD
//! parsing (spec §4.4).

use scraper::{Html, Selector};
use serde_json::Value;
use tracing::trace;

use realtor_core::ListingRecord;

/// Parses `html` into a [`ListingRecord`] with only the rules pass applied
/// (no LLM, no finalization). `listing_id`/`content_hash`/`ts`/`parser_used`/
/// `confidence` are left at their defaults for the caller to fill in.
pub fn parse_with_rules(html: &str) -> ListingRecord {
    let document = Html::parse_document(html);
    let mut record = ListingRecord::default();

    if let Ok(title_sel) = Selector::parse("title") {
        if let Some(title_el) = document.select(&title_sel).next() {
            let text: String = title_el.text().collect::<String>();
            let text = text.trim();
            if !text.is_empty() {
                record.property_description = Some(text.to_string());
            }
        }
    }

    let Ok(ld_sel) = Selector::parse(r#"script[type="application/ld+json"]"#) else {
        return record;
    };

    for script in document.select(&ld_sel) {
        let raw: String = script.text().collect();
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let parsed: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                trace!(error = %e, "skipping malformed JSON-LD block");
                continue;
            }
        };
        match parsed {
            Value::Object(_) => apply_object(&parsed, &mut record),
            Value::Array(items) => {
                for item in items {
                    apply_object(&item, &mut record);
                    // SingleFamilyResidence's address takes precedence over
                    // whatever an earlier array element already set (spec §4.4).
                    if item.get("@type").and_then(Value::as_str) == Some("SingleFamilyResidence") {
                        apply_address(&item, &mut record);
                    }
                }
            }
            _ => {}
        }
    }

    record
}

fn apply_object(obj: &Value, record: &mut ListingRecord) {
    if obj.get("address").is_some() {
        apply_address(obj, record);
    }
    if let Some(floor_size) = obj.get("floorSize").and_then(|v| v.get("value")) {
        record.sqft = Some(floor_size.clone());
    }
    if let Some(rooms) = obj.get("numberOfRooms") {
        record.beds = Some(rooms.clone());
    }
    if record.property_description.is_none() {
        if let Some(name) = obj.get("name").and_then(Value::as_str) {
            record.property_description = Some(name.to_string());
        }
    }
}

fn apply_address(obj: &Value, record: &mut ListingRecord) {
    let Some(addr) = obj.get("address") else {
        return;
    };
    if let Some(s) = addr.get("streetAddress").and_then(Value::as_str) {
        record.address_street = Some(s.to_string());
    }
    if let Some(s) = addr.get("addressLocality").and_then(Value::as_str) {
        record.address_city = Some(s.to_string());
    }
    if let Some(s) = addr.get("addressRegion").and_then(Value::as_str) {
        record.address_state = Some(s.to_string());
    }
    if let Some(s) = addr.get("postalCode").and_then(Value::as_str) {
        record.address_zip = Some(s.to_string());
    }
}
