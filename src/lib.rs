//! Rust library for controlling Yeelight smart lights over the LAN protocol
//!
//! This library provides an async API for discovering and controlling Yeelight
//! devices on the local network. It supports:
//!
//! - Discovery via the Yeelight multicast search (`239.255.255.250:1982`)
//! - Commands over short-lived TCP connections with correlated responses
//! - Power and brightness control, property reads, and raw method calls
//! - Real-time state change notifications with a configurable drop policy
//!
//! LAN control must be enabled for each device in the Yeelight app.
//!
//! # Quick Start
//!
//! ```no_run
//! use yeelight_lan::{ClientConfig, Device, Power};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Find the first device on the network
//!     let device = Device::discover(ClientConfig::default()).await?;
//!     println!("Found {} at {}", device.descriptor().name, device.address());
//!
//!     // Control it
//!     device.set_power(Power::On).await?;
//!     device.set_bright("75").await?;
//!
//!     // Subscribe to state changes
//!     let mut notifications = device.listen().await?;
//!     if let Some(notification) = notifications.recv().await {
//!         println!("{}: {:?}", notification.method, notification.params);
//!     }
//!     notifications.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! # Direct Connection
//!
//! If you know the address of a device, skip discovery:
//!
//! ```no_run
//! use yeelight_lan::Device;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let device = Device::new("192.168.1.5:55443");
//!     let props = device.get_prop(&["power", "bright"]).await?;
//!     println!("{:?}", props);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **Discovery**: multicast search and response header parsing
//! - **Device**: address plus cached state, high-level control API
//! - **Connection**: one TCP connection per command, ID correlation
//! - **Subscription**: long-lived notification connection and delivery buffer
//! - **Protocol**: line-delimited JSON messages

mod config;
mod connection;
mod device;
mod discovery;
mod error;
mod protocol;
mod subscription;
mod types;

// Public exports
pub use config::{ClientConfig, DropPolicy};
pub use connection::CommandChannel;
pub use device::Device;
pub use discovery::{parse_response, search_request, Discovery, MULTICAST_ADDR};
pub use error::{Result, YeelightError};
pub use protocol::{Command, CommandResult, DeviceError, IdGenerator, Notification};
pub use subscription::{listen, NotificationStream, StreamState};
pub use types::{Address, DeviceDescriptor, Power};
