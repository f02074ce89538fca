//! Throttle Demo - conflation and rate limiting under a tick flood
//!
//! A producer task floods the session with synthetic ticks every
//! millisecond while the drainer publishes at most 100 updates per second,
//! one per symbol per second, to a logging sink.

use std::sync::Arc;
use std::time::Duration;

use tick_throttler::publisher::LoggingSink;
use tick_throttler::{MarketDataGenerator, ThrottleConfig, ThrottleSession};
use tokio::time::{interval, sleep};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tick_throttler=debug")),
        )
        .init();

    let config = ThrottleConfig::builder()
        .max_admissions(100)
        .window_ms(1000)
        .drain_interval_ms(100)
        .store_capacity(1000)
        .build()?;

    println!("Throttle Configuration:");
    println!("  • Global budget: {} per {:?}", config.max_admissions_per_window, config.window());
    println!("  • Per symbol: 1 per {:?}", config.window());
    println!("  • Drain every {:?}\n", config.drain_interval());

    let session = Arc::new(ThrottleSession::new(config, Arc::new(LoggingSink))?);
    let drainer = session.spawn_drainer();
    let (sender, ingest) = session.spawn_ingest(10_000);

    let producer = tokio::spawn(async move {
        let mut generator = MarketDataGenerator::new(10, 1000);
        let mut ticker = interval(Duration::from_millis(1));
        for _ in 0..300 {
            ticker.tick().await;
            for update in generator.generate() {
                if sender.send(update).await.is_err() {
                    return;
                }
            }
            if generator.generation() % 100 == 0 {
                info!(
                    "Producer pausing for 5s after {} bursts",
                    generator.generation()
                );
                sleep(Duration::from_secs(5)).await;
            }
        }
    });

    producer.await?;
    let forwarded = ingest.await?;

    // Let the drainer flush what is still pending.
    while !session.store().is_empty() {
        sleep(Duration::from_millis(100)).await;
    }
    let passes = drainer.shutdown().await?;

    println!("\nForwarded {} ticks in {} drain passes", forwarded, passes);
    println!("Limiter: {}", session.limiter().metrics());
    for (symbol, count) in session.publisher().publish_counts() {
        println!("  {:<6} {}", symbol, count);
    }

    Ok(())
}
