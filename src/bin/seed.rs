//! Thin producer-side utility that seeds the queue with one root URL.
//! Deliberately excluded from the core per spec §1 — contains no crawl
//! logic, grounded on `original_source/scrapers/realtor/Realtor_AWS.py`.

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use tracing::info;

#[derive(Parser)]
#[command(name = "realtor-seed", about = "Send one URL to the scrape queue")]
struct Args {
    /// URL to enqueue as `url_to_scrape`.
    url: String,

    #[arg(long, env = "QUEUE_URL")]
    queue_url: String,

    #[arg(long, env = "AWS_REGION", default_value = "us-east-2")]
    aws_region: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_sdk_sqs::config::Region::new(args.aws_region.clone()))
        .load()
        .await;
    let client = aws_sdk_sqs::Client::new(&aws_config);

    let body = json!({ "url_to_scrape": args.url }).to_string();
    client
        .send_message()
        .queue_url(&args.queue_url)
        .message_body(&body)
        .send()
        .await
        .context("send_message failed")?;

    info!(url = %args.url, queue_url = %args.queue_url, "sent task to queue");
    Ok(())
}
