//! Reconnecting echo example
//!
//! Dials an echo endpoint, writes a JSON message every second and prints the
//! replies. Stop and restart the server while it runs to watch the client heal.
//!
//! Run with: cargo run --example reconnecting_echo -- ws://127.0.0.1:9001

use reconws::client::{ConnectionListener, ReconnectingClient};
use reconws::{ClientBuilder, Error, HeaderMap, MessageKind, ObservabilityConfig};
use serde::Serialize;
use std::time::Duration;

struct LogListener;

impl ConnectionListener for LogListener {
    fn on_connect(&self, client: &ReconnectingClient) {
        tracing::info!(url = ?client.url(), "Connected");
    }

    fn on_disconnect(&self, _client: &ReconnectingClient) {
        tracing::warn!("Disconnected");
    }

    fn on_connect_error(&self, _client: &ReconnectingClient, error: &Error) {
        tracing::warn!(error = %error, "Dial failed");
    }

    fn on_read_error(&self, _client: &ReconnectingClient, error: &Error) {
        tracing::warn!(error = %error, "Read failed");
    }

    fn on_write_error(&self, _client: &ReconnectingClient, error: &Error) {
        tracing::warn!(error = %error, "Write failed");
    }
}

#[derive(Serialize)]
struct Ping {
    seq: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://127.0.0.1:9001".to_string());

    let client = ClientBuilder::new()
        .with_observability(ObservabilityConfig::from_env().with_service_name("reconnecting-echo"))
        .listener(LogListener)
        .reconnect_interval_min(Duration::from_millis(500))
        .reconnect_interval_max(Duration::from_secs(5))
        .verbose(true)
        .with_metrics()
        .name("echo")
        .build()?;

    client.dial(&url, HeaderMap::new()).await?;

    let reader = {
        let client = client.clone();
        tokio::spawn(async move {
            loop {
                match client.read_message().await {
                    Ok((MessageKind::Text, data)) => {
                        println!("< {}", String::from_utf8_lossy(&data));
                    }
                    Ok((kind, data)) => println!("< {kind} ({} bytes)", data.len()),
                    Err(_) => tokio::time::sleep(Duration::from_millis(200)).await,
                }
            }
        })
    };

    for seq in 0.. {
        match client.write_json(&Ping { seq }).await {
            Ok(()) => println!("> ping {seq}"),
            Err(Error::NotConnected) => println!("  waiting for connection ({})", client.state()),
            Err(e) => println!("  write failed: {e}"),
        }
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(1)) => {}
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    reader.abort();
    client.close().await;
    reconws::core::shutdown_observability();
    Ok(())
}
