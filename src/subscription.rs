use crate::config::{ClientConfig, DropPolicy};
use crate::error::{Result, YeelightError};
use crate::protocol::Notification;
use futures_util::stream::{self, Stream};
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// Longest notification line accepted; longer lines are discarded
const MAX_LINE_LEN: u64 = 16 * 1024;

/// Lifecycle of a notification stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Reader task is running
    Streaming,
    /// Connection closed or stream stopped; no new notifications will arrive
    Closed,
}

/// Notifications pushed by one device over a dedicated connection
///
/// The reader task owns the connection and closes it when it exits. It exits
/// when the device closes the connection, a read fails, [`stop`] is called,
/// or the stream is dropped. There is no reconnect; call `listen` again.
///
/// [`stop`]: NotificationStream::stop
pub struct NotificationStream {
    address: String,
    delivery: Delivery,
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

/// Open a notification connection to `address` and start reading
///
/// Fails with a transport error if the connection cannot be established
/// within the configured connect timeout.
pub async fn listen(address: &str, config: &ClientConfig) -> Result<NotificationStream> {
    if config.notification_buffer == 0 {
        return Err(YeelightError::InvalidArgument(
            "notification buffer must hold at least one notification".to_string(),
        ));
    }

    tracing::info!("Connecting to {} for notifications", address);
    let stream = match timeout(config.connect_timeout, TcpStream::connect(address)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => return Err(YeelightError::transport(address, e)),
        Err(_) => {
            return Err(YeelightError::transport(
                address,
                io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
            ))
        }
    };

    let (sink, delivery) = delivery_channel(config.notification_buffer, config.drop_policy);
    let (stop_tx, stop_rx) = oneshot::channel();
    let task = tokio::spawn(read_notifications(address.to_string(), stream, sink, stop_rx));

    Ok(NotificationStream {
        address: address.to_string(),
        delivery,
        stop_tx: Some(stop_tx),
        task: Some(task),
    })
}

impl NotificationStream {
    /// Get the device address this stream reads from
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Receive the next notification
    ///
    /// Returns `None` once the reader has exited and the buffer is drained.
    pub async fn recv(&mut self) -> Option<Notification> {
        self.delivery.recv().await
    }

    /// Take a buffered notification without waiting
    pub fn try_recv(&mut self) -> Option<Notification> {
        self.delivery.try_recv()
    }

    pub fn state(&self) -> StreamState {
        match &self.task {
            Some(task) if !task.is_finished() => StreamState::Streaming,
            _ => StreamState::Closed,
        }
    }

    /// Stop the reader task and wait for it to release the connection
    ///
    /// Notifications already buffered can still be received afterwards.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// Turn into a [`Stream`] of notifications
    pub fn into_stream(self) -> impl Stream<Item = Notification> {
        stream::unfold(self, |mut notifications| async move {
            notifications
                .recv()
                .await
                .map(|notification| (notification, notifications))
        })
    }
}

async fn read_notifications(
    address: String,
    stream: TcpStream,
    sink: Sink,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();
    let mut oversized = false;

    loop {
        line.clear();
        let mut limited = (&mut reader).take(MAX_LINE_LEN);
        let read = tokio::select! {
            _ = &mut stop_rx => {
                tracing::info!("Notification stream for {} stopped", address);
                break;
            }
            read = limited.read_until(b'\n', &mut line) => read,
        };

        match read {
            Ok(0) => {
                tracing::info!("Notification connection to {} closed", address);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Notification read from {} failed: {}", address, e);
                break;
            }
        }

        // A chunk that hit the limit without a newline is part of an over-long
        // line; drop it and everything up to the next newline.
        if !line.ends_with(b"\n") && line.len() as u64 >= MAX_LINE_LEN {
            if !oversized {
                tracing::debug!("Discarding line over {} bytes from {}", MAX_LINE_LEN, address);
            }
            oversized = true;
            continue;
        }
        if oversized {
            oversized = false;
            continue;
        }

        let text = String::from_utf8_lossy(&line);
        let text = text.trim();
        if text.is_empty() {
            continue;
        }

        let notification = match Notification::try_decode(text) {
            Ok(notification) => notification,
            Err(e) => {
                tracing::debug!("Skipping malformed line from {}: {}", address, e);
                continue;
            }
        };
        tracing::debug!("Received: {}", text);

        if !sink.publish(notification, &mut stop_rx).await {
            tracing::info!("Notification reader for {} exiting", address);
            break;
        }
    }
}

/// Sending half, owned by the reader task
enum Sink {
    DropNewest(mpsc::Sender<Notification>),
    Block(mpsc::Sender<Notification>),
    DropOldest(broadcast::Sender<Notification>),
}

/// Receiving half, owned by the stream
enum Delivery {
    Queue(mpsc::Receiver<Notification>),
    Ring(broadcast::Receiver<Notification>),
}

/// Build the delivery buffer for a drop policy
///
/// `DropOldest` runs on a broadcast channel, which rounds `capacity` up to
/// the next power of two.
fn delivery_channel(capacity: usize, policy: DropPolicy) -> (Sink, Delivery) {
    match policy {
        DropPolicy::DropNewest => {
            let (tx, rx) = mpsc::channel(capacity);
            (Sink::DropNewest(tx), Delivery::Queue(rx))
        }
        DropPolicy::Block => {
            let (tx, rx) = mpsc::channel(capacity);
            (Sink::Block(tx), Delivery::Queue(rx))
        }
        DropPolicy::DropOldest => {
            let (tx, rx) = broadcast::channel(capacity);
            (Sink::DropOldest(tx), Delivery::Ring(rx))
        }
    }
}

impl Sink {
    /// Hand a notification to the consumer
    ///
    /// Returns `false` when the reader should stop: the consumer is gone or
    /// a stop was requested while waiting for room.
    async fn publish(
        &self,
        notification: Notification,
        stop_rx: &mut oneshot::Receiver<()>,
    ) -> bool {
        match self {
            Sink::DropNewest(tx) => match tx.try_send(notification) {
                Ok(()) => true,
                Err(TrySendError::Full(dropped)) => {
                    tracing::warn!("Notification buffer full, dropping {:?}", dropped.method);
                    true
                }
                Err(TrySendError::Closed(_)) => false,
            },
            Sink::Block(tx) => tokio::select! {
                _ = &mut *stop_rx => false,
                sent = tx.send(notification) => sent.is_ok(),
            },
            // Overwrites the oldest buffered entry when full; fails only
            // once the receiver is gone.
            Sink::DropOldest(tx) => tx.send(notification).is_ok(),
        }
    }
}

impl Delivery {
    async fn recv(&mut self) -> Option<Notification> {
        match self {
            Delivery::Queue(rx) => rx.recv().await,
            Delivery::Ring(rx) => loop {
                match rx.recv().await {
                    Ok(notification) => return Some(notification),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("Notification buffer full, dropped {} oldest", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            },
        }
    }

    fn try_recv(&mut self) -> Option<Notification> {
        match self {
            Delivery::Queue(rx) => rx.try_recv().ok(),
            Delivery::Ring(rx) => loop {
                match rx.try_recv() {
                    Ok(notification) => return Some(notification),
                    Err(broadcast::error::TryRecvError::Lagged(n)) => {
                        tracing::warn!("Notification buffer full, dropped {} oldest", n);
                    }
                    Err(_) => return None,
                }
            },
        }
    }
}
