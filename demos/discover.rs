//! Discover Yeelight devices, print them, and tail notifications from the first
//!
//! Run with `RUST_LOG=yeelight_lan=debug cargo run --example discover` to see
//! the wire traffic.

use std::time::Duration;
use tracing_subscriber::EnvFilter;
use yeelight_lan::{ClientConfig, Device};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ClientConfig::new().with_discovery_timeout(Duration::from_secs(3));
    let devices = Device::discover_all(config).await?;
    if devices.is_empty() {
        println!("No devices found. Is LAN control enabled?");
        return Ok(());
    }

    for device in &devices {
        let state = device.descriptor();
        println!(
            "{:<20} {:<22} model={:<10} power={:<4} bright={}",
            if state.name.is_empty() { "(unnamed)" } else { state.name.as_str() },
            state.address,
            state.model,
            state.power,
            state.brightness
        );
    }

    let device = &devices[0];
    let mut notifications = device.listen().await?;
    println!("Listening on {} for 30s, change the light from the app...", device.address());

    let deadline = tokio::time::sleep(Duration::from_secs(30));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            notification = notifications.recv() => match notification {
                Some(n) => println!("{} {}", n.method, serde_json::Value::Object(n.params)),
                None => {
                    println!("Connection closed by device");
                    break;
                }
            },
        }
    }

    notifications.stop().await;
    Ok(())
}
