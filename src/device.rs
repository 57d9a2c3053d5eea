use crate::config::ClientConfig;
use crate::connection::CommandChannel;
use crate::discovery::Discovery;
use crate::error::{Result, YeelightError};
use crate::protocol::{CommandResult, IdGenerator};
use crate::subscription::{self, NotificationStream};
use crate::types::{DeviceDescriptor, Power};
use serde_json::{json, Value};
use std::sync::Arc;

/// Transition effect sent with every state change
const EFFECT: &str = "sudden";
/// Transition duration in milliseconds
const DURATION: u64 = 0;

/// Properties read by [`Device::refresh`]
const REFRESH_PROPS: [&str; 3] = ["power", "bright", "name"];

/// Handle to a single Yeelight device
///
/// A `Device` holds the device address and the descriptor last observed for
/// it. The descriptor is a snapshot: notifications do not update it, only
/// [`Device::refresh`] does.
///
/// Clones share the same correlation ID generator.
///
/// # Example
///
/// ```no_run
/// use yeelight_lan::{ClientConfig, Device, Power};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let device = Device::discover(ClientConfig::default()).await?;
///     println!("Found {} at {}", device.descriptor().name, device.address());
///
///     device.set_power(Power::On).await?;
///     device.set_bright("40").await?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Device {
    descriptor: DeviceDescriptor,
    config: ClientConfig,
    channel: CommandChannel,
}

impl Device {
    /// Create a handle for a device at a known `host:port` address
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            descriptor: DeviceDescriptor::with_address(address),
            config: ClientConfig::default(),
            channel: CommandChannel::new(),
        }
    }

    /// Create a handle from a discovered descriptor
    pub fn from_descriptor(descriptor: DeviceDescriptor) -> Result<Self> {
        if descriptor.address.is_empty() {
            return Err(YeelightError::InvalidArgument(
                "device descriptor has no address".to_string(),
            ));
        }
        Ok(Self {
            descriptor,
            config: ClientConfig::default(),
            channel: CommandChannel::new(),
        })
    }

    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Draw correlation IDs from a shared generator
    pub fn with_ids(mut self, ids: Arc<IdGenerator>) -> Self {
        self.channel = CommandChannel::with_ids(ids);
        self
    }

    /// Discover the first device that answers the multicast search
    pub async fn discover(config: ClientConfig) -> Result<Self> {
        let descriptor = Discovery::new(config.discovery_timeout).first().await?;
        Ok(Self::from_descriptor(descriptor)?.with_config(config))
    }

    /// Discover every device that answers before the discovery timeout
    ///
    /// All returned handles share one ID generator.
    pub async fn discover_all(config: ClientConfig) -> Result<Vec<Self>> {
        let ids = Arc::new(IdGenerator::new());
        Discovery::new(config.discovery_timeout)
            .all()
            .await?
            .into_iter()
            .map(|descriptor| {
                Ok(Self::from_descriptor(descriptor)?
                    .with_config(config.clone())
                    .with_ids(ids.clone()))
            })
            .collect()
    }

    pub fn address(&self) -> &str {
        &self.descriptor.address
    }

    /// Get the last observed state
    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Execute an arbitrary method on the device
    pub async fn execute(&self, method: &str, params: Vec<Value>) -> Result<CommandResult> {
        self.channel
            .execute(self.address(), method, params, self.config.command_timeout)
            .await
    }

    /// Read properties, returned in request order
    ///
    /// The device answers with an empty string for properties it does not know.
    pub async fn get_prop(&self, props: &[&str]) -> Result<Vec<Value>> {
        let params = props.iter().map(|p| json!(p)).collect();
        let response = self.execute("get_prop", params).await?;
        Ok(response.result.unwrap_or_default())
    }

    /// Switch the light on or off
    pub async fn set_power(&self, power: Power) -> Result<()> {
        self.execute("set_power", vec![json!(power.as_str()), json!(EFFECT), json!(DURATION)])
            .await?;
        Ok(())
    }

    pub async fn toggle(&self) -> Result<()> {
        self.execute("toggle", vec![]).await?;
        Ok(())
    }

    /// Set brightness from a percentage string
    ///
    /// The value is validated before anything is sent.
    pub async fn set_bright(&self, bright: &str) -> Result<()> {
        let value: i64 = bright.parse().map_err(|_| {
            YeelightError::InvalidArgument(format!("brightness {:?} is not an integer", bright))
        })?;
        if !(0..=100).contains(&value) {
            return Err(YeelightError::InvalidArgument(format!(
                "brightness {} is outside 0-100",
                value
            )));
        }

        self.execute("set_bright", vec![json!(value), json!(EFFECT), json!(DURATION)])
            .await?;
        Ok(())
    }

    /// Re-read power, brightness and name and replace the cached descriptor
    pub async fn refresh(&mut self) -> Result<&DeviceDescriptor> {
        let values = self.get_prop(&REFRESH_PROPS).await?;
        let [power, bright, name] = values.as_slice() else {
            return Err(YeelightError::MalformedResponse(format!(
                "expected {} properties, got {}",
                REFRESH_PROPS.len(),
                values.len()
            )));
        };

        self.descriptor.power = value_to_string(power);
        self.descriptor.brightness = value_to_string(bright);
        self.descriptor.name = value_to_string(name);

        tracing::debug!("Refreshed state of {}: {:?}", self.address(), self.descriptor);
        Ok(&self.descriptor)
    }

    /// Open a notification stream to this device
    pub async fn listen(&self) -> Result<NotificationStream> {
        subscription::listen(self.address(), &self.config).await
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
