//! NDJSON serialization and compression (spec §4.5).

use std::io::Write;

use realtor_core::{CompressCodec, ListingRecord};

/// One compact JSON object per line, UTF-8, no ASCII-escaping — `serde_json`
/// already emits non-ASCII verbatim, matching `ensure_ascii=False`.
pub fn to_ndjson(records: &[ListingRecord]) -> Vec<u8> {
    let mut out = Vec::new();
    for record in records {
        if let Ok(line) = serde_json::to_vec(record) {
            out.extend_from_slice(&line);
            out.push(b'\n');
        }
    }
    out
}

pub fn compress(payload: &[u8], codec: CompressCodec) -> std::io::Result<Vec<u8>> {
    match codec {
        CompressCodec::Zstd => zstd::stream::encode_all(payload, 10),
        CompressCodec::Gzip => {
            let mut encoder =
                flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::new(6));
            encoder.write_all(payload)?;
            encoder.finish()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ndjson_has_one_line_per_record_in_append_order() {
        let mut records = Vec::new();
        for i in 0..3 {
            let mut r = ListingRecord::default();
            r.listing_id = format!("id-{i}");
            records.push(r);
        }
        let ndjson = to_ndjson(&records);
        let text = String::from_utf8(ndjson).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("id-0"));
        assert!(lines[2].contains("id-2"));
    }

    #[test]
    fn zstd_roundtrips() {
        let payload = b"hello world".to_vec();
        let compressed = compress(&payload, CompressCodec::Zstd).unwrap();
        let decompressed = zstd::stream::decode_all(compressed.as_slice()).unwrap();
        assert_eq!(decompressed, payload);
    }

    #[test]
    fn gzip_roundtrips() {
        let payload = b"hello world".to_vec();
        let compressed = compress(&payload, CompressCodec::Gzip).unwrap();
        let mut decoder = flate2::read::GzDecoder::new(compressed.as_slice());
        let mut out = Vec::new();
        std::io::Read::read_to_end(&mut decoder, &mut out).unwrap();
        assert_eq!(out, payload);
    }
}
