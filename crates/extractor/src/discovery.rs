//! Index-page link discovery (spec §4.4).

use std::collections::HashSet;

use scraper::{Html, Selector};
use tracing::debug;

/// Maximum discovery messages enqueued per index page (spec §3, §4.4, §8 I-4).
pub const MAX_DISCOVERY_LINKS: usize = 10;

/// One outbound `send_message_batch` entry (spec §6): sequential string ids
/// `"0".."9"` and a `MessageBody` carrying `{"url_to_scrape": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryEntry {
    pub id: String,
    pub message_body: String,
}

/// Scans for anchors whose `href` contains `listings_host` and
/// `/realestateandhomes-detail/`, dedups by href within the page, and caps
/// at [`MAX_DISCOVERY_LINKS`].
pub fn discover_listing_links(html: &str, listings_host: &str) -> Vec<DiscoveryEntry> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut hrefs = Vec::new();
    for el in document.select(&selector) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        if href.is_empty() {
            continue;
        }
        if !href.contains(listings_host) {
            continue;
        }
        if !href.contains("/realestateandhomes-detail/") {
            continue;
        }
        if seen.insert(href.to_string()) {
            hrefs.push(href.to_string());
        }
        if hrefs.len() >= MAX_DISCOVERY_LINKS {
            break;
        }
    }

    debug!(count = hrefs.len(), "discovered listing links on index page");

    hrefs
        .into_iter()
        .enumerate()
        .map(|(i, href)| DiscoveryEntry {
            id: i.to_string(),
            message_body: serde_json::json!({ "url_to_scrape": href }).to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedups_and_caps_at_ten() {
        let mut html = String::from("<html><body>");
        for i in 0..15 {
            html.push_str(&format!(
                "<a href=\"https://www.realtor.com/realestateandhomes-detail/listing-{i}_M{i}\">l</a>"
            ));
        }
        // duplicate of the first link
        html.push_str(
            "<a href=\"https://www.realtor.com/realestateandhomes-detail/listing-0_M0\">dup</a>",
        );
        html.push_str("</body></html>");

        let entries = discover_listing_links(&html, "realtor.com");
        assert_eq!(entries.len(), MAX_DISCOVERY_LINKS);
        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"]);
    }

    #[test]
    fn ignores_non_listing_anchors() {
        let html = r#"<html><body>
            <a href="https://www.realtor.com/realestateandhomes-search/Austin_TX">search</a>
            <a href="https://example.com/realestateandhomes-detail/x_1">wrong host</a>
        </body></html>"#;
        let entries = discover_listing_links(html, "realtor.com");
        assert!(entries.is_empty());
    }
}
