//! Syslog UDP destination: RFC3164-style datagrams, best-effort delivery.

use super::{Destination, DestinationError};
use crate::events::Event;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::net::UdpSocket;

/// Sends each event as one `<PRI>Mon DD HH:MM:SS HOST APP: MSG` datagram.
///
/// UDP delivery is best-effort by design; a local send error still fails
/// the batch so the runner retries.
pub struct SyslogUdpDestination {
    host: String,
    port: u16,
    pri: u32,
    hostname: Option<String>,
    appname: String,
    socket: UdpSocket,
}

impl SyslogUdpDestination {
    pub const DEFAULT_PORT: u16 = 514;
    pub const DEFAULT_PRI: u32 = 13;
    pub const DEFAULT_APPNAME: &'static str = "observix";

    pub fn new(
        host: &str,
        port: u16,
        pri: u32,
        hostname: Option<String>,
        appname: &str,
    ) -> Result<Self, DestinationError> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        Ok(Self {
            host: host.to_string(),
            port,
            pri,
            hostname,
            appname: appname.to_string(),
            socket,
        })
    }

    /// Format one event as an RFC3164-style line.
    ///
    /// The hostname falls back to the stamped `agent_id`, then "observix".
    /// Embedded newlines would split the message across syslog records, so
    /// they are replaced with spaces.
    fn format_line(&self, event: &Event) -> String {
        let ts = event.ts.with_timezone(&Utc).format("%b %d %H:%M:%S");
        let host = self
            .hostname
            .as_deref()
            .or_else(|| event.meta.get("agent_id").and_then(Value::as_str))
            .unwrap_or("observix");
        let msg = event.raw.replace('\n', " ");
        format!("<{}>{} {} {}: {}", self.pri, ts, host, self.appname, msg.trim())
    }
}

#[async_trait]
impl Destination for SyslogUdpDestination {
    async fn send(&self, batch: &[Event]) -> Result<(), DestinationError> {
        for event in batch {
            let line = self.format_line(event);
            self.socket
                .send_to(line.as_bytes(), (self.host.as_str(), self.port))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event_at(raw: &str, agent_id: Option<&str>) -> Event {
        let mut evt = Event::from_raw(raw);
        evt.ts = Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 2).unwrap();
        if let Some(id) = agent_id {
            evt.meta.insert("agent_id".to_string(), Value::from(id));
        }
        evt
    }

    #[test]
    fn test_format_line_with_agent_id_fallback() {
        let dest = SyslogUdpDestination::new("127.0.0.1", 514, 13, None, "observix").unwrap();
        let line = dest.format_line(&event_at("disk full", Some("a1")));
        assert_eq!(line, "<13>Mar 07 09:05:02 a1 observix: disk full");
    }

    #[test]
    fn test_format_line_explicit_hostname_and_newlines() {
        let dest =
            SyslogUdpDestination::new("127.0.0.1", 514, 34, Some("edge-7".to_string()), "app")
                .unwrap();
        let line = dest.format_line(&event_at("line one\nline two\n", None));
        assert_eq!(line, "<34>Mar 07 09:05:02 edge-7 app: line one line two");
    }

    #[tokio::test]
    async fn test_sends_one_datagram_per_event() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(std::time::Duration::from_secs(2)))
            .unwrap();
        let port = receiver.local_addr().unwrap().port();

        let dest = SyslogUdpDestination::new("127.0.0.1", port, 13, None, "observix").unwrap();
        dest.send(&[event_at("first", None), event_at("second", None)])
            .await
            .unwrap();

        let mut buf = [0u8; 1024];
        let (n, _) = receiver.recv_from(&mut buf).unwrap();
        let first = String::from_utf8_lossy(&buf[..n]).to_string();
        let (n, _) = receiver.recv_from(&mut buf).unwrap();
        let second = String::from_utf8_lossy(&buf[..n]).to_string();

        assert!(first.ends_with("observix: first"), "{first}");
        assert!(second.ends_with("observix: second"), "{second}");
    }
}
