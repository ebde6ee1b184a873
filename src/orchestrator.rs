//! Worker orchestrator (spec §4.6): receiver loop, bounded worker pool,
//! flusher, graceful shutdown — modeled on the teacher's
//! `crawl::run_crawl` channel/shutdown-broadcast shape.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::signal;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

use realtor_core::Config;
use realtor_extractor::{classify, discover_listing_links, extract_detail, GeminiClient, PageKind};
use realtor_fetcher::Fetcher;
use realtor_fingerprint::{build_headers, CuratedUserAgents};
use realtor_proxy::ProxyPool;
use realtor_queue::{parse_url_task, Queue, ReceivedMessage, SqsQueue};
use realtor_sink::{BatchSink, S3ObjectStore};

/// The listings site anchors we discover from are assumed to point back at
/// this host (spec §4.4). Not exposed as a config var upstream, so kept as
/// a constant here rather than invented as a new env var.
const LISTINGS_HOST: &str = "realtor.com";

/// In-process counters, logged on a stall-detection timer — ambient
/// observability (SPEC_FULL §2), grounded in `crawl.rs`'s
/// `storage_handle` stall-warning branch. Never changes behavior.
#[derive(Default)]
struct Stats {
    received: AtomicU64,
    fetched: AtomicU64,
    fetch_failures: AtomicU64,
    extracted: AtomicU64,
    discovered: AtomicU64,
    flushed: AtomicU64,
}

impl Stats {
    fn log_snapshot(&self) {
        info!(
            received = self.received.load(Ordering::Relaxed),
            fetched = self.fetched.load(Ordering::Relaxed),
            fetch_failures = self.fetch_failures.load(Ordering::Relaxed),
            extracted = self.extracted.load(Ordering::Relaxed),
            discovered = self.discovered.load(Ordering::Relaxed),
            flushed = self.flushed.load(Ordering::Relaxed),
            "worker stats"
        );
    }
}

struct WorkerContext {
    config: Config,
    fetcher: Fetcher,
    proxy_pool: ProxyPool,
    gemini: Option<GeminiClient>,
    queue: Arc<dyn Queue>,
    sink: Arc<BatchSink>,
    stats: Arc<Stats>,
}

pub async fn run_worker(config: Config) -> Result<()> {
    let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_sdk_sqs::config::Region::new(config.aws_region.clone()))
        .load()
        .await;

    let sqs_client = aws_sdk_sqs::Client::new(&aws_config);
    let s3_client = aws_sdk_s3::Client::new(&aws_config);

    let queue: Arc<dyn Queue> = Arc::new(SqsQueue::new(sqs_client, config.queue_url.clone()));
    let store = Arc::new(S3ObjectStore::new(s3_client));
    let sink = Arc::new(BatchSink::new(
        store,
        config.s3_bucket.clone(),
        config.s3_prefix_records.clone(),
        config.compress_codec,
        BUFFER_MAX,
        Duration::from_secs(BUFFER_FLUSH_SECONDS),
    ));

    let ctx = Arc::new(WorkerContext {
        fetcher: Fetcher::new(),
        proxy_pool: ProxyPool::new(config.proxy_url.clone()),
        gemini: config.gemini_api_key.clone().map(GeminiClient::new),
        queue,
        sink: Arc::clone(&sink),
        stats: Arc::new(Stats::default()),
        config,
    });

    let (tx, rx) = mpsc::channel::<ReceivedMessage>(2 * ctx.config.max_concurrency);
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);

    let receiver_handle = spawn_receiver(Arc::clone(&ctx), tx, shutdown_tx.subscribe());
    let worker_handles = spawn_workers(Arc::clone(&ctx), rx, &shutdown_tx);
    let flusher_handle = spawn_flusher(Arc::clone(&sink), Arc::clone(&ctx.stats), shutdown_tx.subscribe());
    let stall_handle = spawn_stall_logger(Arc::clone(&ctx.stats), shutdown_tx.subscribe());

    info!(max_concurrency = ctx.config.max_concurrency, "worker fleet started, press Ctrl+C to stop");
    signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(());

    let _ = receiver_handle.await;
    for handle in worker_handles {
        let _ = handle.await;
    }
    let _ = flusher_handle.await;
    let _ = stall_handle.await;

    // Final drain, best-effort, per spec §5's "flusher performs one final drain".
    // Unconditional: a sub-threshold, recently-flushed buffer must still be
    // written on shutdown rather than silently dropped.
    if let Err(e) = sink.flush_all().await {
        warn!(error = %e, "final flush on shutdown failed");
    }

    info!("shutdown complete");
    Ok(())
}

const BUFFER_MAX: usize = 500;
const BUFFER_FLUSH_SECONDS: u64 = 10;
const SQS_RECEIVE_BATCH: i32 = 10;
const VISIBILITY_TIMEOUT_SECONDS: i32 = 90;

fn spawn_receiver(
    ctx: Arc<WorkerContext>,
    tx: mpsc::Sender<ReceivedMessage>,
    mut shutdown: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("receiver shutting down");
                    break;
                }
                result = ctx.queue.receive(
                    SQS_RECEIVE_BATCH,
                    ctx.config.sqs_wait_time_seconds as i32,
                    VISIBILITY_TIMEOUT_SECONDS,
                ) => {
                    match result {
                        Ok(messages) if messages.is_empty() => {
                            tokio::time::sleep(ctx.config.sqs_idle_sleep).await;
                        }
                        Ok(messages) => {
                            ctx.stats.received.fetch_add(messages.len() as u64, Ordering::Relaxed);
                            for message in messages {
                                if tx.send(message).await.is_err() {
                                    return; // workers gone, channel closed
                                }
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "receive error");
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                    }
                }
            }
        }
    })
}

fn spawn_workers(
    ctx: Arc<WorkerContext>,
    rx: mpsc::Receiver<ReceivedMessage>,
    shutdown_tx: &broadcast::Sender<()>,
) -> Vec<tokio::task::JoinHandle<()>> {
    let rx = Arc::new(tokio::sync::Mutex::new(rx));
    (0..ctx.config.max_concurrency)
        .map(|worker_id| {
            let ctx = Arc::clone(&ctx);
            let rx = Arc::clone(&rx);
            let mut shutdown = shutdown_tx.subscribe();
            tokio::spawn(async move {
                loop {
                    let message = tokio::select! {
                        _ = shutdown.recv() => {
                            info!(worker_id, "worker shutting down");
                            break;
                        }
                        message = async {
                            let mut guard = rx.lock().await;
                            guard.recv().await
                        } => message,
                    };
                    let Some(message) = message else {
                        break; // channel closed, receiver is done
                    };

                    let receipt_handle = message.receipt_handle.clone();
                    let should_delete = process_message(&ctx, message).await;
                    if should_delete {
                        if let Err(e) = ctx.queue.delete(&receipt_handle).await {
                            warn!(worker_id, error = %e, "delete error, duplicate delivery will occur");
                        }
                    }
                }
            })
        })
        .collect()
}

fn spawn_flusher(
    sink: Arc<BatchSink>,
    stats: Arc<Stats>,
    mut shutdown: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("flusher shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    match sink.tick().await {
                        Ok(0) => {}
                        Ok(n) => {
                            stats.flushed.fetch_add(n as u64, Ordering::Relaxed);
                            info!(flushed = n, "flushed records");
                        }
                        Err(e) => error!(error = %e, "flush failed, buffer retained for next tick"),
                    }
                }
            }
        }
    })
}

fn spawn_stall_logger(stats: Arc<Stats>, mut shutdown: broadcast::Receiver<()>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = ticker.tick() => stats.log_snapshot(),
            }
        }
    })
}

/// Runs fetch → classify → (discover | extract) for one message. Returns
/// whether the message should be deleted: `true` for every outcome except
/// a fetch that ultimately failed, per the state machine in spec §4.6 —
/// processing failures leave the message for the queue to redeliver after
/// its visibility timeout.
async fn process_message(ctx: &WorkerContext, message: ReceivedMessage) -> bool {
    let Some(task) = parse_url_task(&message.body) else {
        warn!("malformed queue body, deleting to stop redelivery");
        return true;
    };

    let headers = build_headers(&CuratedUserAgents);
    let proxy = ctx.proxy_pool.select().await;

    let fetch = match ctx
        .fetcher
        .fetch(
            &task.url_to_scrape,
            proxy.as_deref(),
            headers,
            ctx.config.request_timeout,
            ctx.config.retry_limit,
        )
        .await
    {
        Ok(f) => {
            if let Some(p) = &proxy {
                ctx.proxy_pool.mark_success(p).await;
            }
            f
        }
        Err(e) => {
            if let Some(p) = &proxy {
                ctx.proxy_pool.mark_failure(p).await;
            }
            ctx.stats.fetch_failures.fetch_add(1, Ordering::Relaxed);
            warn!(url = %task.url_to_scrape, error = %e, "fetch failed, leaving message for redelivery");
            return false;
        }
    };
    ctx.stats.fetched.fetch_add(1, Ordering::Relaxed);

    match classify(&task.url_to_scrape) {
        PageKind::Index => {
            let entries = discover_listing_links(&fetch.body, LISTINGS_HOST);
            if !entries.is_empty() {
                let bodies: Vec<String> = entries.into_iter().map(|e| e.message_body).collect();
                let count = bodies.len() as u64;
                match ctx.queue.send_batch(&bodies).await {
                    Ok(()) => ctx.stats.discovered.fetch_add(count, Ordering::Relaxed),
                    Err(e) => warn!(url = %task.url_to_scrape, error = %e, "discovery enqueue failed, swallowing"),
                }
            }
            true
        }
        PageKind::Detail => {
            let record = extract_detail(&fetch.body, &task.url_to_scrape, ctx.gemini.as_ref()).await;
            ctx.sink.append(record).await;
            ctx.stats.extracted.fetch_add(1, Ordering::Relaxed);
            true
        }
    }
}
