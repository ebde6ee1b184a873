//! Batch sink (spec §4.5): a shared buffer, drained on a 1-second flusher
//! tick when size- or age-triggered, serialized as NDJSON, compressed, and
//! written as one object per flush.

mod compress;
mod key;
mod store;

pub use store::{ObjectStore, S3ObjectStore, StoreError};

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::warn;

use realtor_core::{CompressCodec, ListingRecord};

struct BatchBuffer {
    records: Vec<ListingRecord>,
    last_flush: Instant,
}

pub struct BatchSink {
    buffer: Mutex<BatchBuffer>,
    store: Arc<dyn ObjectStore>,
    bucket: String,
    prefix: String,
    codec: CompressCodec,
    buffer_max: usize,
    flush_after: Duration,
    overflow_cap: usize,
}

impl BatchSink {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        bucket: String,
        prefix: String,
        codec: CompressCodec,
        buffer_max: usize,
        flush_after: Duration,
    ) -> Self {
        Self {
            buffer: Mutex::new(BatchBuffer {
                records: Vec::new(),
                last_flush: Instant::now(),
            }),
            store,
            bucket,
            prefix,
            codec,
            buffer_max,
            // Safety cap per spec §4.5: at least 10x BUFFER_MAX before the
            // oldest records are shed under persistent storage failure.
            overflow_cap: buffer_max.saturating_mul(10),
            flush_after,
        }
    }

    pub async fn append(&self, record: ListingRecord) {
        let mut buffer = self.buffer.lock().await;
        buffer.records.push(record);
        if buffer.records.len() > self.overflow_cap {
            let shed = buffer.records.len() - self.overflow_cap;
            buffer.records.drain(0..shed);
            warn!(shed, cap = self.overflow_cap, "batch buffer overflow, shedding oldest records");
        }
    }

    /// Called by the 1s flusher tick. Drains and flushes iff the buffer is
    /// non-empty and either size- or age-triggered (spec §4.5). Returns the
    /// number of records flushed, or an error from the object store — on
    /// error the drained records are put back so the next tick retries.
    pub async fn tick(&self) -> Result<usize, StoreError> {
        let drained = {
            let mut guard = self.buffer.lock().await;
            let should_flush = !guard.records.is_empty()
                && (guard.records.len() >= self.buffer_max
                    || guard.last_flush.elapsed() > self.flush_after);
            if !should_flush {
                return Ok(0);
            }
            std::mem::take(&mut guard.records)
        };
        self.flush_drained(drained).await
    }

    /// Unconditionally flushes whatever is currently buffered, ignoring the
    /// size/age thresholds. Used for the shutdown-time final drain (spec
    /// §5): a sub-threshold, recently-flushed buffer must still be written
    /// rather than dropped when the process is stopping. No-op if empty.
    pub async fn flush_all(&self) -> Result<usize, StoreError> {
        let drained = {
            let mut guard = self.buffer.lock().await;
            if guard.records.is_empty() {
                return Ok(0);
            }
            std::mem::take(&mut guard.records)
        };
        self.flush_drained(drained).await
    }

    async fn flush_drained(&self, drained: Vec<ListingRecord>) -> Result<usize, StoreError> {
        let count = drained.len();
        let now = Utc::now();
        let payload = compress::to_ndjson(&drained);
        let compressed = match compress::compress(&payload, self.codec) {
            Ok(c) => c,
            Err(e) => {
                self.restore(drained).await;
                return Err(StoreError::Put(e.to_string()));
            }
        };
        let key = key::object_key(&self.prefix, now, self.codec);

        let put_result = self
            .store
            .put_object(
                &self.bucket,
                &key,
                compressed,
                "application/x-ndjson",
                self.codec.content_encoding(),
            )
            .await;

        match put_result {
            Ok(()) => {
                let mut guard = self.buffer.lock().await;
                guard.last_flush = Instant::now();
                Ok(count)
            }
            Err(e) => {
                self.restore(drained).await;
                Err(e)
            }
        }
    }

    async fn restore(&self, mut records: Vec<ListingRecord>) {
        let mut guard = self.buffer.lock().await;
        records.append(&mut guard.records);
        guard.records = records;
    }

    pub async fn len(&self) -> usize {
        self.buffer.lock().await.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingStore {
        puts: AtomicUsize,
        fail_next: std::sync::atomic::AtomicBool,
        last_body_lines: Mutex<usize>,
    }

    impl RecordingStore {
        fn new() -> Self {
            Self {
                puts: AtomicUsize::new(0),
                fail_next: std::sync::atomic::AtomicBool::new(false),
                last_body_lines: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl ObjectStore for RecordingStore {
        async fn put_object(
            &self,
            _bucket: &str,
            _key: &str,
            body: Vec<u8>,
            _content_type: &str,
            _content_encoding: &str,
        ) -> Result<(), StoreError> {
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(StoreError::Put("injected failure".into()));
            }
            self.puts.fetch_add(1, Ordering::SeqCst);
            let decompressed = zstd::stream::decode_all(body.as_slice())
                .or_else(|_| -> std::io::Result<Vec<u8>> { Ok(body) })
                .unwrap_or_default();
            let lines = String::from_utf8_lossy(&decompressed).lines().count();
            *self.last_body_lines.lock().await = lines;
            Ok(())
        }
    }

    #[tokio::test]
    async fn empty_buffer_tick_performs_no_write() {
        let store = Arc::new(RecordingStore::new());
        let sink = BatchSink::new(
            store.clone(),
            "bucket".into(),
            "records".into(),
            CompressCodec::Zstd,
            500,
            Duration::from_secs(10),
        );
        let flushed = sink.tick().await.unwrap();
        assert_eq!(flushed, 0);
        assert_eq!(store.puts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn flush_all_writes_a_sub_threshold_buffer() {
        let store = Arc::new(RecordingStore::new());
        let sink = BatchSink::new(
            store.clone(),
            "bucket".into(),
            "records".into(),
            CompressCodec::Zstd,
            500,
            Duration::from_secs(600),
        );
        let mut r = ListingRecord::default();
        r.listing_id = "id-0".into();
        sink.append(r).await;

        // tick() would not flush yet: below buffer_max and well within flush_after.
        assert_eq!(sink.tick().await.unwrap(), 0);
        assert_eq!(store.puts.load(Ordering::SeqCst), 0);

        let flushed = sink.flush_all().await.unwrap();
        assert_eq!(flushed, 1);
        assert_eq!(store.puts.load(Ordering::SeqCst), 1);
        assert_eq!(sink.len().await, 0);
    }

    #[tokio::test]
    async fn flush_all_on_empty_buffer_performs_no_write() {
        let store = Arc::new(RecordingStore::new());
        let sink = BatchSink::new(
            store.clone(),
            "bucket".into(),
            "records".into(),
            CompressCodec::Zstd,
            500,
            Duration::from_secs(10),
        );
        let flushed = sink.flush_all().await.unwrap();
        assert_eq!(flushed, 0);
        assert_eq!(store.puts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn flushes_when_size_threshold_reached() {
        let store = Arc::new(RecordingStore::new());
        let sink = BatchSink::new(
            store.clone(),
            "bucket".into(),
            "records".into(),
            CompressCodec::Zstd,
            3,
            Duration::from_secs(600),
        );
        for i in 0..3 {
            let mut r = ListingRecord::default();
            r.listing_id = format!("id-{i}");
            sink.append(r).await;
        }
        let flushed = sink.tick().await.unwrap();
        assert_eq!(flushed, 3);
        assert_eq!(store.puts.load(Ordering::SeqCst), 1);
        assert_eq!(sink.len().await, 0);
        assert_eq!(*store.last_body_lines.lock().await, 3);
    }

    #[tokio::test]
    async fn failed_flush_retains_records_for_next_tick() {
        let store = Arc::new(RecordingStore::new());
        store.fail_next.store(true, Ordering::SeqCst);
        let sink = BatchSink::new(
            store.clone(),
            "bucket".into(),
            "records".into(),
            CompressCodec::Zstd,
            1,
            Duration::from_secs(600),
        );
        let mut r = ListingRecord::default();
        r.listing_id = "id-0".into();
        sink.append(r).await;

        let err = sink.tick().await;
        assert!(err.is_err());
        assert_eq!(sink.len().await, 1, "record must be retained after a failed put");

        let flushed = sink.tick().await.unwrap();
        assert_eq!(flushed, 1);
        assert_eq!(store.puts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn overflow_cap_sheds_oldest_records() {
        let store = Arc::new(RecordingStore::new());
        let sink = BatchSink::new(
            store,
            "bucket".into(),
            "records".into(),
            CompressCodec::Zstd,
            2,
            Duration::from_secs(600),
        );
        // overflow_cap = 2 * 10 = 20
        for i in 0..25 {
            let mut r = ListingRecord::default();
            r.listing_id = format!("id-{i}");
            sink.append(r).await;
        }
        assert_eq!(sink.len().await, 20);
    }
}
