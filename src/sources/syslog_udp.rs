//! Syslog UDP source: background receiver into a bounded queue.

use super::{Source, SourceError};
use crate::events::Event;
use async_trait::async_trait;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Receives syslog datagrams over UDP and exposes them via `poll`.
///
/// The socket is bound at construction and a receiver task drains it into
/// a bounded channel. On overflow the newest datagram is dropped and
/// counted; the receiver never blocks the queue.
pub struct SyslogUdpSource {
    rx: mpsc::Receiver<Event>,
    local_addr: SocketAddr,
    dropped: Arc<AtomicU64>,
    receiver: JoinHandle<()>,
}

impl SyslogUdpSource {
    /// Default bounded queue capacity between receiver and poll.
    pub const DEFAULT_QUEUE: usize = 50_000;

    /// Bind the UDP socket and start the receiver task.
    pub async fn bind(host: &str, port: u16, max_queue_size: usize) -> Result<Self, SourceError> {
        let addr = format!("{host}:{port}");
        let socket = UdpSocket::bind(&addr)
            .await
            .map_err(|err| SourceError::Bind { addr: addr.clone(), err })?;
        let local_addr = socket.local_addr()?;

        let (tx, rx) = mpsc::channel(max_queue_size.max(1));
        let dropped = Arc::new(AtomicU64::new(0));
        let receiver = tokio::spawn(receive_loop(socket, tx, Arc::clone(&dropped)));

        debug!(addr = %local_addr, "syslog UDP source listening");
        Ok(Self {
            rx,
            local_addr,
            dropped,
            receiver,
        })
    }

    /// The bound address (useful when port 0 was requested).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

async fn receive_loop(socket: UdpSocket, tx: mpsc::Sender<Event>, dropped: Arc<AtomicU64>) {
    let mut buf = vec![0u8; 65_535];
    loop {
        let (n, remote) = match socket.recv_from(&mut buf).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "syslog UDP receive failed, stopping receiver");
                break;
            }
        };

        let raw = String::from_utf8_lossy(&buf[..n]).trim().to_string();
        if raw.is_empty() {
            continue;
        }

        let mut evt = Event::from_raw(raw);
        evt.meta.insert("source".to_string(), Value::from("syslog_udp"));
        evt.meta
            .insert("remote_addr".to_string(), Value::from(remote.to_string()));

        match tx.try_send(evt) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                // Drop-newest: refuse the arrival, keep what is queued.
                let total = dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if total % 1000 == 1 {
                    warn!(dropped = total, "syslog UDP queue full, dropping datagrams");
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => break,
        }
    }
}

#[async_trait]
impl Source for SyslogUdpSource {
    async fn poll(&mut self, max_events: usize) -> Result<Vec<Event>, SourceError> {
        let mut out = Vec::new();
        while out.len() < max_events {
            match self.rx.try_recv() {
                Ok(evt) => out.push(evt),
                Err(_) => break,
            }
        }
        Ok(out)
    }

    fn close(&mut self) {
        self.receiver.abort();
        self.rx.close();
    }

    fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for SyslogUdpSource {
    fn drop(&mut self) {
        self.receiver.abort();
    }
}
