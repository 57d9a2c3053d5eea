use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);
const DEFAULT_NOTIFICATION_BUFFER: usize = 16;

/// What the notification reader does when the delivery buffer is full
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DropPolicy {
    /// Discard the incoming notification; the reader never waits
    #[default]
    DropNewest,
    /// Keep the incoming notification and discard the oldest buffered one
    ///
    /// The buffer capacity is rounded up to the next power of two.
    DropOldest,
    /// Wait for the consumer to make room
    Block,
}

/// Timeouts and streaming settings shared by a device handle
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Budget for one command exchange (connect, write, read)
    pub command_timeout: Duration,
    /// Budget for opening the notification connection
    pub connect_timeout: Duration,
    /// How long discovery waits for responses
    pub discovery_timeout: Duration,
    /// Capacity of the notification delivery buffer
    pub notification_buffer: usize,
    /// What the reader does when the notification buffer is full
    pub drop_policy: DropPolicy,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self {
            command_timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_TIMEOUT,
            discovery_timeout: DEFAULT_TIMEOUT,
            notification_buffer: DEFAULT_NOTIFICATION_BUFFER,
            drop_policy: DropPolicy::default(),
        }
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    /// Set the delivery buffer capacity (must be at least 1)
    pub fn with_notification_buffer(mut self, capacity: usize) -> Self {
        self.notification_buffer = capacity;
        self
    }

    pub fn with_drop_policy(mut self, policy: DropPolicy) -> Self {
        self.drop_policy = policy;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}
