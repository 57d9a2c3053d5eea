use crate::error::{Result, YeelightError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};

/// Line terminator used by the device for every message
pub const CRLF: &str = "\r\n";

/// Command request structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub id: u64,
    pub method: String,
    pub params: Vec<Value>,
}

/// Command response structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<DeviceError>,
}

/// Error object returned by the device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceError {
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// Unsolicited state-change message pushed by the device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

/// Monotonic source of command correlation IDs
///
/// IDs start at 1 and are never handed out twice by the same generator, so
/// concurrent commands sharing a generator always carry distinct IDs.
#[derive(Debug)]
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Create a generator whose first ID is `first`
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// Take the next ID
    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Command {
    /// Create a new command with the given ID and method
    pub fn new(id: u64, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            id,
            method: method.into(),
            params,
        }
    }

    /// Serialize to a single JSON line terminated by CR-LF
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut bytes = serde_json::to_vec(self)?;
        bytes.extend_from_slice(CRLF.as_bytes());
        Ok(bytes)
    }
}

impl CommandResult {
    /// Parse one response line
    ///
    /// Only the shape is checked here; matching the ID against the request is
    /// up to the caller.
    pub fn decode(line: &str) -> Result<Self> {
        serde_json::from_str(line.trim_end())
            .map_err(|e| YeelightError::MalformedResponse(format!("{}: {}", e, line.trim_end())))
    }

    /// Check if the device reported an error
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }
}

impl Notification {
    /// Parse one notification line, falling back to an empty notification
    pub fn decode(line: &str) -> Self {
        Self::try_decode(line).unwrap_or_default()
    }

    pub(crate) fn try_decode(line: &str) -> Result<Self> {
        serde_json::from_str(line.trim_end())
            .map_err(|e| YeelightError::MalformedResponse(e.to_string()))
    }

    /// Look up a single parameter
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// Check if this is a property-change notification
    pub fn is_props(&self) -> bool {
        self.method == "props"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_is_single_crlf_line() {
        let cmd = Command::new(7, "set_power", vec![json!("on"), json!("sudden"), json!(0)]);
        let bytes = cmd.encode().unwrap();
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.ends_with("\r\n"));
        assert_eq!(text.matches('\n').count(), 1);

        let value: Value = serde_json::from_str(text.trim_end()).unwrap();
        assert_eq!(
            value,
            json!({"id": 7, "method": "set_power", "params": ["on", "sudden", 0]})
        );
    }

    #[test]
    fn test_encode_keeps_numbers_and_strings_lossless() {
        let cmd = Command::new(1, "x", vec![json!(u64::MAX), json!(-3.25), json!("a\"b")]);
        let text = String::from_utf8(cmd.encode().unwrap()).unwrap();
        let back: Command = serde_json::from_str(text.trim_end()).unwrap();
        assert_eq!(back, cmd);
    }

    #[test]
    fn test_decode_result_round_trip() {
        let original = CommandResult {
            id: 42,
            result: Some(vec![json!("on"), json!("80"), json!(3)]),
            error: None,
        };
        let line = format!("{}\r\n", serde_json::to_string(&original).unwrap());

        assert_eq!(CommandResult::decode(&line).unwrap(), original);
    }

    #[test]
    fn test_decode_result_with_error() {
        let rs = CommandResult::decode(r#"{"id":1,"error":{"code":-1,"message":"bad params"}}"#)
            .unwrap();
        assert_eq!(rs.id, 1);
        assert!(rs.result.is_none());
        assert_eq!(
            rs.error,
            Some(DeviceError {
                code: -1,
                message: "bad params".to_string()
            })
        );
    }

    #[test]
    fn test_decode_result_does_not_check_correlation() {
        let rs = CommandResult::decode(r#"{"id":999,"result":["ok"]}"#).unwrap();
        assert_eq!(rs.id, 999);
    }

    #[test]
    fn test_decode_result_missing_id() {
        let err = CommandResult::decode(r#"{"result":["ok"]}"#).unwrap_err();
        assert!(matches!(err, YeelightError::MalformedResponse(_)));
    }

    #[test]
    fn test_decode_result_not_json() {
        let err = CommandResult::decode("garbage").unwrap_err();
        assert!(matches!(err, YeelightError::MalformedResponse(_)));
    }

    #[test]
    fn test_decode_notification() {
        let n = Notification::decode("{\"method\":\"props\",\"params\":{\"bright\":\"50\"}}\r\n");
        assert!(n.is_props());
        assert_eq!(n.param("bright"), Some(&json!("50")));
    }

    #[test]
    fn test_decode_notification_defaults() {
        assert_eq!(Notification::decode("{}"), Notification::default());
        assert_eq!(Notification::decode("not json"), Notification::default());

        let n = Notification::decode(r#"{"method":"props"}"#);
        assert_eq!(n.method, "props");
        assert!(n.params.is_empty());
    }

    #[test]
    fn test_id_generator_is_monotonic() {
        let ids = IdGenerator::new();
        assert_eq!(ids.next_id(), 1);
        assert_eq!(ids.next_id(), 2);

        let other = IdGenerator::starting_at(100);
        assert_eq!(other.next_id(), 100);
        assert_eq!(ids.next_id(), 3);
    }
}
