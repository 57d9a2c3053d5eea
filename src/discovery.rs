//! Multicast discovery of Yeelight devices
//!
//! A search request is sent to the Yeelight multicast group and every device
//! on the segment answers with an HTTP-response-shaped header block describing
//! itself. Only the headers this crate cares about are extracted.

use crate::error::{Result, YeelightError};
use crate::types::DeviceDescriptor;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};

/// Multicast group and port devices listen on
pub const MULTICAST_ADDR: &str = "239.255.255.250:1982";
/// Search target identifying Yeelight bulbs
pub const SEARCH_TARGET: &str = "wifi_bulb";
/// Scheme prefix on the LOCATION header
pub const LOCATION_SCHEME: &str = "yeelight://";

const RECV_BUFFER_SIZE: usize = 2048;

/// One-shot discovery search
///
/// # Example
///
/// ```no_run
/// use yeelight_lan::Discovery;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     for device in Discovery::new(Duration::from_secs(3)).all().await? {
///         println!("Found {} at {}", device.name, device.address);
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Discovery {
    target: String,
    timeout: Duration,
}

impl Discovery {
    /// Create a search that waits up to `timeout` for responses
    pub fn new(timeout: Duration) -> Self {
        Self {
            target: MULTICAST_ADDR.to_string(),
            timeout,
        }
    }

    /// Send the search request somewhere other than the multicast group
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    /// Return the first device that answers
    ///
    /// Responses that cannot be parsed or carry no address are skipped.
    pub async fn first(&self) -> Result<DeviceDescriptor> {
        let deadline = Instant::now() + self.timeout;
        let socket = self.send_search().await?;
        let mut buffer = [0u8; RECV_BUFFER_SIZE];

        self.next_response(&socket, &mut buffer, deadline)
            .await?
            .ok_or(YeelightError::DiscoveryTimeout)
    }

    /// Collect every distinct device that answers before the deadline
    ///
    /// Devices are deduplicated by address and returned in arrival order.
    pub async fn all(&self) -> Result<Vec<DeviceDescriptor>> {
        let deadline = Instant::now() + self.timeout;
        let socket = self.send_search().await?;
        let mut buffer = [0u8; RECV_BUFFER_SIZE];
        let mut devices: Vec<DeviceDescriptor> = Vec::new();

        while let Some(device) = self.next_response(&socket, &mut buffer, deadline).await? {
            if devices.iter().any(|d| d.address == device.address) {
                tracing::debug!("Ignoring duplicate response from {}", device.address);
                continue;
            }
            tracing::info!("Found device {} at {}", device.name, device.address);
            devices.push(device);
        }

        tracing::info!("Discovery finished with {} device(s)", devices.len());
        Ok(devices)
    }

    async fn send_search(&self) -> Result<UdpSocket> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| YeelightError::transport(&self.target, e))?;

        tracing::info!("Sending discovery search to {}", self.target);
        socket
            .send_to(search_request().as_bytes(), &self.target)
            .await
            .map_err(|e| YeelightError::transport(&self.target, e))?;

        Ok(socket)
    }

    async fn next_response(
        &self,
        socket: &UdpSocket,
        buffer: &mut [u8],
        deadline: Instant,
    ) -> Result<Option<DeviceDescriptor>> {
        loop {
            let (size, from) = match timeout_at(deadline, socket.recv_from(buffer)).await {
                Ok(Ok(received)) => received,
                Ok(Err(e)) => return Err(YeelightError::transport(&self.target, e)),
                Err(_) => return Ok(None),
            };

            let text = match std::str::from_utf8(&buffer[..size]) {
                Ok(text) => text,
                Err(_) => {
                    tracing::debug!("Ignoring non UTF-8 response from {}", from);
                    continue;
                }
            };
            tracing::debug!("Discovery response from {}: {:?}", from, text);

            match parse_response(text) {
                Ok(device) if !device.address.is_empty() => return Ok(Some(device)),
                Ok(_) => tracing::warn!("Response from {} has no LOCATION header", from),
                Err(e) => tracing::warn!("Failed to parse response from {}: {}", from, e),
            }
        }
    }
}

/// Build the M-SEARCH request sent to the multicast group
pub fn search_request() -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: {}\r\n\
         MAN: \"ssdp:discover\"\r\n\
         ST: {}\r\n\
         \r\n",
        MULTICAST_ADDR, SEARCH_TARGET
    )
}

/// Parse a discovery response into a device descriptor
///
/// Missing headers produce empty fields. Fails only when the payload is not
/// a header block at all.
pub fn parse_response(payload: &str) -> Result<DeviceDescriptor> {
    let headers = parse_header_block(payload)?;

    let location = header(&headers, "LOCATION");
    Ok(DeviceDescriptor {
        address: location
            .strip_prefix(LOCATION_SCHEME)
            .unwrap_or(location)
            .to_string(),
        name: header(&headers, "NAME").to_string(),
        power: header(&headers, "POWER").to_string(),
        brightness: header(&headers, "BRIGHT").to_string(),
        id: header(&headers, "ID").to_string(),
        model: header(&headers, "MODEL").to_string(),
        support: header(&headers, "SUPPORT")
            .split_whitespace()
            .map(str::to_string)
            .collect(),
    })
}

/// Split a start line plus headers, stopping at the first blank line
///
/// Lines may end in CR-LF or a bare LF. Every line must be terminated unless
/// the blank line has already been seen; anything else is a truncated block.
fn parse_header_block(payload: &str) -> Result<Vec<(String, String)>> {
    let mut lines = payload.split_inclusive('\n');

    let start = lines
        .next()
        .ok_or_else(|| malformed("empty payload".to_string()))?;
    if !start.ends_with('\n') {
        return Err(malformed(format!("truncated start line {:?}", start)));
    }
    let start = start.trim_end();
    if !start.contains("HTTP/") {
        return Err(malformed(format!("unexpected start line {:?}", start)));
    }

    let mut headers: Vec<(String, String)> = Vec::new();
    for raw in lines {
        if !raw.ends_with('\n') {
            return Err(malformed(format!("truncated header {:?}", raw)));
        }
        let line = raw.trim_end_matches(&['\r', '\n'][..]);
        if line.is_empty() {
            break;
        }

        // Folded continuation of the previous header
        if line.starts_with(&[' ', '\t'][..]) {
            match headers.last_mut() {
                Some((_, value)) => {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                None => return Err(malformed(format!("continuation without header {:?}", line))),
            }
            continue;
        }

        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| malformed(format!("header without colon {:?}", line)))?;
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(malformed(format!("invalid header name {:?}", name)));
        }
        headers.push((name.to_string(), value.trim().to_string()));
    }

    Ok(headers)
}

fn header<'a>(headers: &'a [(String, String)], name: &str) -> &'a str {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
        .unwrap_or("")
}

fn malformed(detail: String) -> YeelightError {
    YeelightError::MalformedDiscoveryResponse(detail)
}
