//! LLM fallback extraction via the Gemini API (spec §4.4, §6).
//!
//! Modeled on `original_source`'s `call_gemini`: a fixed instruction prompt,
//! the HTML truncated to the first 500,000 characters, and the response
//! text carved out by its first `{` and last `}` before being parsed as
//! JSON. Any error anywhere in this path yields no update — it never
//! crashes the worker (spec §4.4, §7).

use serde_json::Value;
use tracing::warn;

const MODEL: &str = "gemini-1.5-pro";
const HTML_CHAR_LIMIT: usize = 500_000;
const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

const PROMPT: &str = "You are an expert real estate listing extraction bot. Read the provided HTML and return a compact JSON with these keys (missing => null). Include as much listing-specific info as available.\n\
Required keys: price, beds (int), baths (int), sqft (int), lot_size_sqft (int), address_street, address_city, address_state, address_zip, property_type, year_built, agent_name, brokerage_name, property_description.\n\
Also include: images (array of absolute URLs), is_foreclosure (bool), hoa_fee, property_taxes, days_on_market, mls_id, latitude, longitude, open_house (array of ISO8601 times or strings), virtual_tour_urls (array), parking, heating, cooling, flooring, amenities (array), year_renovated, listing_status, listing_source, school_info (array of objects), price_history (array), tax_history (array), lot_acres, county, parcel_number, unit_number, condo_fee, appliances (array).\n\
If a field is not present, return null. Use additional_attributes (object) to store any other key information specific to the listing not covered above.";

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
        }
    }

    /// Calls Gemini with the fixed prompt and the truncated HTML, returning
    /// the extracted JSON object on success, `None` on any failure.
    pub async fn extract(&self, html: &str) -> Option<Value> {
        let html_chunk: String = html.chars().take(HTML_CHAR_LIMIT).collect();
        let url = format!("{API_BASE}/{MODEL}:generateContent?key={}", self.api_key);
        let body = serde_json::json!({
            "contents": [{
                "parts": [
                    { "text": PROMPT },
                    { "text": html_chunk },
                ]
            }]
        });

        let resp = match self.http.post(&url).json(&body).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "gemini request failed");
                return None;
            }
        };

        let payload: Value = match resp.json().await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "gemini response was not valid JSON");
                return None;
            }
        };

        let text = payload
            .get("candidates")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.get(0))
            .and_then(|p| p.get("text"))
            .and_then(Value::as_str)?;

        extract_json_object(text)
    }
}

/// Locates the first `{` and last `}` in `text` and parses the enclosed
/// substring as JSON (spec §4.4).
fn extract_json_object(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_json_object_from_surrounding_prose() {
        let text = "Here is the data:\n```json\n{\"price\": \"$500,000\", \"beds\": 3}\n```\nhope that helps";
        let value = extract_json_object(text).unwrap();
        assert_eq!(value["price"], "$500,000");
        assert_eq!(value["beds"], 3);
    }

    #[test]
    fn returns_none_when_no_braces_present() {
        assert!(extract_json_object("no json here").is_none());
    }

    #[test]
    fn returns_none_when_braces_are_reversed() {
        assert!(extract_json_object("} nothing {").is_none());
    }
}
