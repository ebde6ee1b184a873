use std::time::Duration;

use crate::error::WorkerError;

/// Compression codec used by the batch sink. `Gzip` is the documented
/// fallback when `zstd` isn't appropriate for some target (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressCodec {
    Zstd,
    Gzip,
}

impl CompressCodec {
    fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "gzip" | "gz" => CompressCodec::Gzip,
            _ => CompressCodec::Zstd,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            CompressCodec::Zstd => "zst",
            CompressCodec::Gzip => "gz",
        }
    }

    pub fn content_encoding(&self) -> &'static str {
        match self {
            CompressCodec::Zstd => "zstd",
            CompressCodec::Gzip => "gzip",
        }
    }
}

/// Runtime configuration, loaded entirely from environment variables (spec
/// §6). Unlike the teacher's TOML-backed `AppConfig`, this system has no
/// config file in its original form — every field here has a concrete env
/// var and a documented default, mirroring `original_source`'s
/// `config.py::load_settings`.
#[derive(Debug, Clone)]
pub struct Config {
    pub aws_region: String,
    pub queue_url: String,
    pub s3_bucket: String,
    pub proxy_url: Option<String>,
    pub gemini_api_key: Option<String>,
    pub max_concurrency: usize,
    pub request_timeout: Duration,
    pub retry_limit: u32,
    pub s3_prefix_records: String,
    pub compress_codec: CompressCodec,
    pub sqs_wait_time_seconds: u64,
    pub sqs_idle_sleep: Duration,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, WorkerError> {
        let queue_url = std::env::var("QUEUE_URL")
            .map_err(|_| WorkerError::Config("QUEUE_URL is required".into()))?;
        let s3_bucket = std::env::var("S3_BUCKET")
            .map_err(|_| WorkerError::Config("S3_BUCKET is required".into()))?;

        let request_timeout_s: f64 = env_parse("REQUEST_TIMEOUT_S", 25.0);
        let sqs_idle_sleep_s: f64 = env_parse("SQS_IDLE_SLEEP_S", 0.5);

        Ok(Self {
            aws_region: env_or("AWS_REGION", "us-east-2"),
            queue_url,
            s3_bucket,
            proxy_url: std::env::var("PROXY_URL").ok(),
            gemini_api_key: std::env::var("GEMINI_API_KEY").ok(),
            max_concurrency: env_parse("MAX_CONCURRENCY", 200),
            request_timeout: Duration::from_secs_f64(request_timeout_s),
            retry_limit: env_parse("RETRY_LIMIT", 5),
            s3_prefix_records: env_or("S3_PREFIX_RECORDS", "records"),
            compress_codec: CompressCodec::parse(&env_or("COMPRESS_CODEC", "zstd")),
            sqs_wait_time_seconds: env_parse("SQS_WAIT_TIME_SECONDS", 5),
            sqs_idle_sleep: Duration::from_secs_f64(sqs_idle_sleep_s),
        })
    }
}
