//! Randomized HTTP header sets that mimic a desktop browser (spec §4.1).

use std::time::{SystemTime, UNIX_EPOCH};

use rand::seq::SliceRandom;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

const ACCEPT_LANGS: &[&str] = &[
    "en-US,en;q=0.9",
    "en-GB,en;q=0.9",
    "en-US,en;q=0.8,es;q=0.6",
];

/// Source of desktop user-agent strings. A UA library would implement this
/// directly; absent one in the dependency corpus, `CuratedUserAgents` is
/// the documented fallback (spec §9 "Proxy library fallback").
pub trait UserAgentProvider: Send + Sync {
    fn random_user_agent(&self) -> String;
}

/// Fallback list covering Windows/macOS/Linux on a Chromium-class agent,
/// ported from `fingerprint.py`'s hard-coded fallback.
pub struct CuratedUserAgents;

const CURATED: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_4) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
];

impl UserAgentProvider for CuratedUserAgents {
    fn random_user_agent(&self) -> String {
        CURATED
            .choose(&mut rand::thread_rng())
            .expect("CURATED is non-empty")
            .to_string()
    }
}

/// Builds a fresh, randomized header map for one fetch attempt. Deterministic
/// only in which headers are present; values vary per call (spec §4.1).
pub fn build_headers(ua_provider: &dyn UserAgentProvider) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let ua = ua_provider.random_user_agent();
    let lang = ACCEPT_LANGS
        .choose(&mut rand::thread_rng())
        .expect("ACCEPT_LANGS is non-empty");
    let request_time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
        .to_string();

    insert(&mut headers, "User-Agent", &ua);
    insert(
        &mut headers,
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
    );
    insert(&mut headers, "Accept-Language", lang);
    insert(&mut headers, "Accept-Encoding", "gzip, deflate, br");
    insert(&mut headers, "Cache-Control", "no-cache");
    insert(&mut headers, "Pragma", "no-cache");
    insert(&mut headers, "DNT", "1");
    insert(&mut headers, "Sec-CH-UA", r#""Chromium";v="124", "Not.A/Brand";v="24""#);
    insert(&mut headers, "Sec-CH-UA-Mobile", "?0");
    insert(&mut headers, "Sec-CH-UA-Platform", r#""macOS""#);
    insert(&mut headers, "Upgrade-Insecure-Requests", "1");
    insert(&mut headers, "Referer", "https://www.google.com/search?q=realtor");
    insert(&mut headers, "X-Request-Time", &request_time);

    headers
}

fn insert(headers: &mut HeaderMap, name: &'static str, value: &str) {
    if let (Ok(name), Ok(value)) = (
        HeaderName::from_bytes(name.as_bytes()),
        HeaderValue::from_str(value),
    ) {
        headers.insert(name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_carry_the_properties_testable_fields_need() {
        let headers = build_headers(&CuratedUserAgents);
        for required in ["user-agent", "accept", "accept-language", "referer", "x-request-time"] {
            assert!(headers.get(required).is_some(), "missing header {required}");
        }
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;
        let sent: i64 = headers
            .get("x-request-time")
            .unwrap()
            .to_str()
            .unwrap()
            .parse()
            .expect("X-Request-Time must parse as an integer");
        assert!((now - sent).abs() <= 5);
    }

    #[test]
    fn curated_user_agents_span_desktop_platforms() {
        assert!(CURATED.len() >= 3);
        for _ in 0..20 {
            let ua = CuratedUserAgents.random_user_agent();
            assert!(CURATED.contains(&ua.as_str()));
        }
    }
}
