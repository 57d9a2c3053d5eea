//! Fake Yeelight device for integration tests

#![allow(dead_code)]

use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// What the fake device does with one request
pub enum Reply {
    /// Write this line (CR-LF is appended)
    Line(String),
    /// Write these bytes as-is
    Raw(Vec<u8>),
    /// Keep the connection open without answering
    Silence,
}

/// A TCP device that answers command requests
pub struct FakeDevice {
    pub address: String,
    connections: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<Value>>>,
}

impl FakeDevice {
    /// Start a device that computes a reply for every request it receives
    pub async fn start<F>(reply: F) -> Self
    where
        F: Fn(&Value) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let connections = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let reply = Arc::new(reply);

        let counter = connections.clone();
        let log = requests.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let reply = reply.clone();
                let log = log.clone();
                tokio::spawn(async move {
                    let mut reader = BufReader::new(stream);
                    let mut line = String::new();
                    if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                        return;
                    }
                    let request: Value = serde_json::from_str(line.trim_end()).unwrap();
                    log.lock().unwrap().push(request.clone());

                    match (*reply)(&request) {
                        Reply::Line(text) => {
                            let _ = reader
                                .get_mut()
                                .write_all(format!("{}\r\n", text).as_bytes())
                                .await;
                        }
                        Reply::Raw(bytes) => {
                            let _ = reader.get_mut().write_all(&bytes).await;
                        }
                        Reply::Silence => {
                            tokio::time::sleep(Duration::from_secs(30)).await;
                        }
                    }
                });
            }
        });

        Self {
            address,
            connections,
            requests,
        }
    }

    /// Start a device that answers every request with `result`, echoing its ID
    pub async fn echoing(result: Value) -> Self {
        Self::start(move |request| {
            Reply::Line(json!({"id": request["id"], "result": result}).to_string())
        })
        .await
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }
}

/// Start a device that writes `lines` on the first connection
///
/// With `hold_open` the connection stays up after the last line, otherwise
/// it is closed.
pub async fn notification_feed(lines: Vec<&'static str>, hold_open: bool) -> String {
    notification_feed_bytes(lines.into_iter().map(|l| l.as_bytes().to_vec()).collect(), hold_open)
        .await
}

/// Like [`notification_feed`] but with raw bytes
pub async fn notification_feed_bytes(lines: Vec<Vec<u8>>, hold_open: bool) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        for line in lines {
            stream.write_all(&line).await.unwrap();
        }
        stream.flush().await.unwrap();
        if hold_open {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
    });

    address
}

/// Start a device that accepts one notification connection and writes `lines`
///
/// The receiver yields the byte count of the first read after that, which is
/// 0 once the client has closed its side.
pub async fn notification_watch(lines: Vec<&'static str>) -> (String, oneshot::Receiver<usize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        for line in lines {
            stream.write_all(line.as_bytes()).await.unwrap();
        }
        let mut buf = [0u8; 64];
        let read = stream.read(&mut buf).await.unwrap_or(0);
        let _ = tx.send(read);
    });

    (address, rx)
}

/// Address with nothing listening on it
pub async fn closed_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    drop(listener);
    address
}
