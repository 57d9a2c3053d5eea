use std::fmt;

/// Device address in `host:port` form
pub type Address = String;

/// Point-in-time description of a device, as announced during discovery
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub address: Address,
    pub name: String,
    /// "on", "off", or empty when unknown
    pub power: String,
    /// Brightness percentage as sent by the device, not validated
    pub brightness: String,
    /// Device identifier (hex string)
    pub id: String,
    pub model: String,
    /// Methods the device advertises support for
    pub support: Vec<String>,
}

impl DeviceDescriptor {
    /// Descriptor for a device known only by address
    pub fn with_address(address: impl Into<Address>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    /// Get the power state, if the device reported a known one
    pub fn power(&self) -> Option<Power> {
        self.power.parse().ok()
    }

    pub fn is_on(&self) -> bool {
        self.power() == Some(Power::On)
    }

    /// Parse the brightness string
    pub fn brightness_percent(&self) -> Option<u8> {
        self.brightness.trim().parse().ok()
    }

    /// Check if the device advertises a method
    pub fn supports(&self, method: &str) -> bool {
        self.support.iter().any(|m| m == method)
    }
}

/// Power state accepted by `set_power`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Power {
    On,
    Off,
}

impl Power {
    pub fn as_str(&self) -> &'static str {
        match self {
            Power::On => "on",
            Power::Off => "off",
        }
    }
}

impl fmt::Display for Power {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Power {
    type Err = crate::error::YeelightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            s if s.eq_ignore_ascii_case("on") => Ok(Power::On),
            s if s.eq_ignore_ascii_case("off") => Ok(Power::Off),
            other => Err(crate::error::YeelightError::InvalidArgument(format!(
                "unknown power state {:?}",
                other
            ))),
        }
    }
}
