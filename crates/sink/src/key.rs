//! Object key format (spec §3): `<prefix>/<YYYYMMDD>/part-<HHMMSS>-<epoch_ms>.ndjson.<ext>`, UTC.

use chrono::{DateTime, Utc};

use realtor_core::CompressCodec;

pub fn object_key(prefix: &str, now: DateTime<Utc>, codec: CompressCodec) -> String {
    let day = now.format("%Y%m%d");
    let time = now.format("%H%M%S");
    let epoch_ms = now.timestamp_millis();
    format!(
        "{prefix}/{day}/part-{time}-{epoch_ms}.ndjson.{ext}",
        ext = codec.extension()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn key_matches_documented_format() {
        let now = Utc.with_ymd_and_hms(2026, 7, 28, 13, 5, 9).unwrap();
        let key = object_key("records", now, CompressCodec::Zstd);
        assert!(key.starts_with("records/20260728/part-130509-"));
        assert!(key.ends_with(".ndjson.zst"));
    }

    #[test]
    fn gzip_codec_uses_gz_extension() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let key = object_key("records", now, CompressCodec::Gzip);
        assert!(key.ends_with(".ndjson.gz"));
    }
}
