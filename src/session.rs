//! Per-client session state and the registry that owns all live sessions
//!
//! A session owns one UDP socket used both to receive traffic from its
//! client and to send everything device-originated back out: the initial
//! `/serialosc/device` reply, `/sys/*` confirmations, and fanned-out key
//! events. There is no separate sender socket.

use crate::constants::{DEFAULT_SIZE, MAX_SOCKET_RETRY_ATTEMPTS, RETRY_BASE_DELAY_MS};
use crate::error::{BridgeError, Result};
use crate::osc;
use rosc::OscType;
use socket2::{Domain, Socket, Type};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

/// An event forwarded to the Bridge Controller's single dispatch loop.
#[derive(Debug)]
pub enum ControllerEvent {
    /// A `/serialosc/list` (or other) datagram arrived on the discovery socket.
    Discovery(rosc::OscMessage, SocketAddr),
    /// A datagram arrived on a session's own socket.
    Session(SocketAddr, rosc::OscMessage),
}

/// Per-client state.
pub struct Session {
    pub client_addr: SocketAddr,
    pub prefix: String,
    pub device_host: String,
    pub device_port: u16,
    pub sys_port: u16,
    pub socket: Arc<UdpSocket>,
}

impl Session {
    /// Apply a `/sys/port` update. Returns `false` (no-op) for an invalid port.
    pub fn set_port(&mut self, new_port: i32) -> bool {
        if !osc::is_good_port(new_port) {
            return false;
        }
        self.device_port = new_port as u16;
        true
    }

    pub fn set_host(&mut self, new_host: &str) {
        self.device_host = new_host.to_string();
    }

    /// Apply a `/sys/prefix` update. Returns `false` (no-op) for an invalid prefix.
    pub fn set_prefix(&mut self, new_prefix: &str) -> bool {
        if new_prefix.is_empty() || !new_prefix.starts_with('/') {
            return false;
        }
        self.prefix = new_prefix.to_string();
        true
    }

    /// A cheap, owned snapshot of everything needed to talk to this
    /// session's device-facing endpoint, so callers never hold the
    /// session's lock across an `.await`.
    pub fn endpoint(&self) -> SessionEndpoint {
        SessionEndpoint {
            socket: self.socket.clone(),
            client_addr: self.client_addr,
            device_host: self.device_host.clone(),
            device_port: self.device_port,
            prefix: self.prefix.clone(),
            sys_port: self.sys_port,
        }
    }
}

/// Owned view of a session's endpoint, used to perform I/O without holding
/// the session's `RwLock` across an await point.
pub struct SessionEndpoint {
    socket: Arc<UdpSocket>,
    client_addr: SocketAddr,
    pub device_host: String,
    pub device_port: u16,
    pub prefix: String,
    pub sys_port: u16,
}

impl SessionEndpoint {
    /// Send an OSC message to the session's current device-facing endpoint.
    pub async fn send(&self, addr: &str, args: Vec<OscType>) {
        let bytes = osc::encode(addr, args);
        let dest = format!("{}:{}", self.device_host, self.device_port);
        if let Err(e) = self.socket.send_to(&bytes, dest.as_str()).await {
            tracing::debug!(session = %self.client_addr, error = %e, "send to device endpoint failed");
        }
    }

    /// Send `/serialosc/device` to the client's originally-announced endpoint.
    pub async fn announce(&self, sys_id: &str, addr: SocketAddr) {
        let bytes = osc::encode(
            "/serialosc/device",
            vec![
                OscType::String(sys_id.to_string()),
                OscType::String(crate::constants::DEVICE_KIND.to_string()),
                OscType::Int(self.sys_port as i32),
            ],
        );
        if let Err(e) = self.socket.send_to(&bytes, addr).await {
            tracing::debug!(session = %self.client_addr, error = %e, "announce failed");
        }
    }

    /// Emit the six-message `/sys/info` dump, in order.
    pub async fn send_sys_info(&self, sys_id: &str, size: (u8, u8)) {
        self.send("/sys/id", vec![OscType::String(sys_id.to_string())]).await;
        self.send("/sys/size", vec![OscType::Int(size.0 as i32), OscType::Int(size.1 as i32)]).await;
        self.send("/sys/host", vec![OscType::String(self.device_host.clone())]).await;
        self.send("/sys/port", vec![OscType::Int(self.device_port as i32)]).await;
        self.send("/sys/prefix", vec![OscType::String(self.prefix.clone())]).await;
        self.send("/sys/rotation", vec![OscType::Int(0)]).await;
    }
}

/// Owns every live session, keyed by the client's announced socket address.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: parking_lot::Mutex<HashMap<SocketAddr, Arc<parking_lot::RwLock<Session>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent: returns the existing session if `client_addr` is already
    /// known, otherwise binds a fresh ephemeral socket, spawns its reader
    /// task, and registers the new session.
    pub async fn ensure_session(
        &self,
        client_addr: SocketAddr,
        default_prefix: &str,
        event_tx: mpsc::Sender<ControllerEvent>,
    ) -> Result<Arc<parking_lot::RwLock<Session>>> {
        if let Some(existing) = self.sessions.lock().get(&client_addr) {
            return Ok(existing.clone());
        }

        let socket = Arc::new(bind_ephemeral().await?);
        let sys_port = socket.local_addr().map_err(|e| BridgeError::UdpBind { port: 0, source: e })?.port();

        let session = Arc::new(parking_lot::RwLock::new(Session {
            client_addr,
            prefix: default_prefix.to_string(),
            device_host: client_addr.ip().to_string(),
            device_port: client_addr.port(),
            sys_port,
            socket: socket.clone(),
        }));

        spawn_session_reader(client_addr, socket, event_tx);

        self.sessions.lock().insert(client_addr, session.clone());
        Ok(session)
    }

    /// Snapshot of every live session, for fanning out hardware key events.
    pub fn snapshot(&self) -> Vec<Arc<parking_lot::RwLock<Session>>> {
        self.sessions.lock().values().cloned().collect()
    }

    pub fn get(&self, client_addr: &SocketAddr) -> Option<Arc<parking_lot::RwLock<Session>>> {
        self.sessions.lock().get(client_addr).cloned()
    }
}

fn spawn_session_reader(client_addr: SocketAddr, socket: Arc<UdpSocket>, event_tx: mpsc::Sender<ControllerEvent>) {
    tokio::spawn(async move {
        let mut buf = [0u8; crate::constants::READ_BUFFER_SIZE];
        loop {
            match socket.recv(&mut buf).await {
                Ok(n) => {
                    if let Some(msg) = osc::decode(&buf[..n]) {
                        if event_tx.send(ControllerEvent::Session(client_addr, msg)).await.is_err() {
                            break;
                        }
                    }
                }
                Err(e) => {
                    tracing::debug!(session = %client_addr, error = %e, "session socket read error");
                    break;
                }
            }
        }
    });
}

/// Bind an ephemeral UDP port with the same retry/backoff policy used for
/// the discovery socket.
async fn bind_ephemeral() -> Result<UdpSocket> {
    let mut attempt = 0;
    loop {
        let result = (|| -> std::io::Result<UdpSocket> {
            let socket = Socket::new(Domain::IPV4, Type::DGRAM, None)?;
            socket.set_reuse_address(true)?;
            let addr: SocketAddr = "0.0.0.0:0".parse().unwrap();
            socket.bind(&addr.into())?;
            socket.set_nonblocking(true)?;
            UdpSocket::from_std(socket.into())
        })();

        match result {
            Ok(socket) => return Ok(socket),
            Err(e) if attempt + 1 < MAX_SOCKET_RETRY_ATTEMPTS => {
                attempt += 1;
                let delay = RETRY_BASE_DELAY_MS * 2u64.pow(attempt);
                tracing::warn!(attempt, error = %e, "ephemeral bind failed, retrying");
                tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
            }
            Err(e) => return Err(BridgeError::UdpBind { port: 0, source: e }),
        }
    }
}

/// Also used by the Bridge Controller for the fixed discovery port, which
/// must bind to an exact address rather than an ephemeral one.
pub async fn bind_fixed(port: u16) -> Result<UdpSocket> {
    let mut attempt = 0;
    loop {
        let result = (|| -> std::io::Result<UdpSocket> {
            let socket = Socket::new(Domain::IPV4, Type::DGRAM, None)?;
            socket.set_reuse_address(true)?;
            let addr: SocketAddr = format!("0.0.0.0:{port}").parse().unwrap();
            socket.bind(&addr.into())?;
            socket.set_nonblocking(true)?;
            UdpSocket::from_std(socket.into())
        })();

        match result {
            Ok(socket) => return Ok(socket),
            Err(e) if attempt + 1 < MAX_SOCKET_RETRY_ATTEMPTS => {
                attempt += 1;
                let delay = RETRY_BASE_DELAY_MS * 2u64.pow(attempt);
                tracing::warn!(port, attempt, error = %e, "discovery bind failed, retrying");
                tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
            }
            Err(e) => return Err(BridgeError::UdpBind { port, source: e }),
        }
    }
}

/// Default size reported before a real `SizeReport` has been seen.
pub fn default_size() -> (u8, u8) {
    DEFAULT_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ensure_session_is_idempotent() {
        let registry = SessionRegistry::new();
        let (tx, _rx) = mpsc::channel(16);
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();

        let first = registry.ensure_session(addr, "/monome", tx.clone()).await.unwrap();
        let second = registry.ensure_session(addr, "/monome", tx).await.unwrap();

        assert_eq!(first.read().sys_port, second.read().sys_port);
        assert_eq!(registry.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_set_port_rejects_invalid() {
        let registry = SessionRegistry::new();
        let (tx, _rx) = mpsc::channel(16);
        let addr: SocketAddr = "127.0.0.1:9001".parse().unwrap();
        let session = registry.ensure_session(addr, "/monome", tx).await.unwrap();

        let mut s = session.write();
        assert!(!s.set_port(70000));
        assert_eq!(s.device_port, addr.port());
        assert!(s.set_port(9500));
        assert_eq!(s.device_port, 9500);
    }

    #[tokio::test]
    async fn test_set_prefix_rejects_invalid() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut session = Session {
            client_addr: "127.0.0.1:9002".parse().unwrap(),
            prefix: "/monome".to_string(),
            device_host: "127.0.0.1".to_string(),
            device_port: 9002,
            sys_port: 10000,
            socket: Arc::new(socket),
        };
        assert!(!session.set_prefix("no-leading-slash"));
        assert_eq!(session.prefix, "/monome");
        assert!(session.set_prefix("/m"));
        assert_eq!(session.prefix, "/m");
    }
}
