use crate::error::{Result, YeelightError};
use crate::protocol::{Command, CommandResult, IdGenerator};
use serde_json::Value;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Request/response channel to a device
///
/// Every command gets its own TCP connection: connect, write one request
/// line, read one response line, close. Concurrent calls never share a
/// socket, so the only shared state is the ID generator.
#[derive(Debug, Clone, Default)]
pub struct CommandChannel {
    ids: Arc<IdGenerator>,
}

impl CommandChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a channel drawing IDs from an existing generator
    pub fn with_ids(ids: Arc<IdGenerator>) -> Self {
        Self { ids }
    }

    /// Get the ID generator used by this channel
    pub fn ids(&self) -> Arc<IdGenerator> {
        self.ids.clone()
    }

    /// Send a command and wait for its result
    ///
    /// The whole exchange must finish within `budget`. A device-reported
    /// error object becomes [`YeelightError::CommandRejected`].
    pub async fn execute(
        &self,
        address: &str,
        method: &str,
        params: Vec<Value>,
        budget: Duration,
    ) -> Result<CommandResult> {
        match timeout(budget, self.exchange(address, method, params)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("Command {} to {} timed out after {:?}", method, address, budget);
                Err(YeelightError::Timeout)
            }
        }
    }

    async fn exchange(
        &self,
        address: &str,
        method: &str,
        params: Vec<Value>,
    ) -> Result<CommandResult> {
        tracing::debug!("Connecting to {}", address);
        let mut stream = TcpStream::connect(address)
            .await
            .map_err(|e| YeelightError::transport(address, e))?;

        let command = Command::new(self.ids.next_id(), method, params);
        let request = command.encode()?;
        tracing::debug!("Sending: {}", String::from_utf8_lossy(&request).trim_end());

        stream
            .write_all(&request)
            .await
            .map_err(|e| YeelightError::transport(address, e))?;

        let mut reader = BufReader::new(stream);
        let mut raw = Vec::new();
        let read = reader
            .read_until(b'\n', &mut raw)
            .await
            .map_err(|e| YeelightError::transport(address, e))?;
        if read == 0 {
            return Err(YeelightError::transport(
                address,
                io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed before response"),
            ));
        }
        let line = std::str::from_utf8(&raw)
            .map_err(|e| YeelightError::MalformedResponse(format!("response is not UTF-8: {}", e)))?;
        tracing::debug!("Received: {}", line.trim_end());

        let response = CommandResult::decode(line)?;
        if response.id != command.id {
            return Err(YeelightError::MalformedResponse(format!(
                "response id {} does not match request id {}",
                response.id, command.id
            )));
        }

        if let Some(error) = response.error {
            return Err(YeelightError::CommandRejected {
                code: error.code,
                message: error.message,
            });
        }

        if response.result.is_none() {
            return Err(YeelightError::MalformedResponse(
                "response has neither result nor error".to_string(),
            ));
        }

        Ok(response)
    }
}
