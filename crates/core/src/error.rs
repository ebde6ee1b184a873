use thiserror::Error;

/// Startup/config-level errors (spec §7's fatal conditions). Per-concern
/// runtime errors (fetch, storage, queue) live in their own crates as
/// dedicated `thiserror` enums — `realtor_fetcher::FetchError`,
/// `realtor_sink::StoreError`, `realtor_queue::QueueError` — matching the
/// teacher's one-enum-per-failing-crate convention.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("config error: {0}")]
    Config(String),
}
