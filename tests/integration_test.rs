//! Integration tests for the bridge over real loopback UDP sockets.
//!
//! These drive `Bridge` directly rather than spawning the binary, injecting
//! synthetic serial bytes and OSC datagrams the way a real client and a real
//! grid would produce them.

use bytes::Bytes;
use monome_bridge::bridge::Bridge;
use monome_bridge::config::Config;
use monome_bridge::session;
use rosc::OscType;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

async fn recv_osc(socket: &UdpSocket) -> rosc::OscMessage {
    let mut buf = [0u8; 1024];
    let (n, _) = tokio::time::timeout(Duration::from_millis(500), socket.recv_from(&mut buf))
        .await
        .expect("timed out waiting for datagram")
        .unwrap();
    monome_bridge::osc::decode(&buf[..n]).expect("not a valid OSC message")
}

/// S1: a `/serialosc/list` announcement creates a session and gets a
/// `/serialosc/device` reply at the announced endpoint.
#[tokio::test]
async fn test_discovery_replies_with_device() {
    let (serial_tx, mut serial_rx) = mpsc::channel::<Vec<u8>>(16);
    tokio::spawn(async move { while serial_rx.recv().await.is_some() {} });

    let bridge = Bridge::new(Config::load_default().unwrap(), serial_tx);
    let (event_tx, _rx) = mpsc::channel(16);

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let client_addr = client.local_addr().unwrap();

    let msg = rosc::OscMessage {
        addr: "/serialosc/list".to_string(),
        args: vec![OscType::String(client_addr.ip().to_string()), OscType::Int(client_addr.port() as i32)],
    };
    bridge.handle_discovery(msg, client_addr, event_tx).await;

    let reply = recv_osc(&client).await;
    assert_eq!(reply.addr, "/serialosc/device");
    assert_eq!(reply.args[0], OscType::String("monome".to_string()));
    assert_eq!(reply.args[1], OscType::String("monome".to_string()));
    assert!(matches!(reply.args[2], OscType::Int(p) if p > 0));
}

/// S2/S3/S5: LED messages translate to the exact byte sequences on the wire.
#[tokio::test]
async fn test_led_messages_translate_to_serial_bytes() {
    let (serial_tx, mut serial_rx) = mpsc::channel::<Vec<u8>>(16);
    let bridge = Bridge::new(Config::load_default().unwrap(), serial_tx);

    let client_addr: SocketAddr = "127.0.0.1:9300".parse().unwrap();
    let (event_tx, _rx) = mpsc::channel(16);
    bridge.sessions().ensure_session(client_addr, "/monome", event_tx).await.unwrap();

    bridge
        .handle_session_message(
            client_addr,
            rosc::OscMessage {
                addr: "/monome/grid/led/set".to_string(),
                args: vec![OscType::Int(3), OscType::Int(5), OscType::Int(1)],
            },
        )
        .await;
    assert_eq!(serial_rx.recv().await.unwrap(), vec![0x11, 3, 5]);

    bridge
        .handle_session_message(
            client_addr,
            rosc::OscMessage { addr: "/monome/grid/led/all".to_string(), args: vec![OscType::Int(0)] },
        )
        .await;
    assert_eq!(serial_rx.recv().await.unwrap(), vec![0x12]);

    bridge
        .handle_session_message(
            client_addr,
            rosc::OscMessage {
                addr: "/sys/prefix".to_string(),
                args: vec![OscType::String("/m".to_string())],
            },
        )
        .await;

    bridge
        .handle_session_message(
            client_addr,
            rosc::OscMessage {
                addr: "/m/grid/led/set".to_string(),
                args: vec![OscType::Int(1), OscType::Int(1), OscType::Int(0)],
            },
        )
        .await;
    assert_eq!(serial_rx.recv().await.unwrap(), vec![0x10, 1, 1]);
}

/// S4: a key-down frame on serial becomes an OSC key message at the session.
#[tokio::test]
async fn test_serial_key_event_reaches_session() {
    let (serial_tx, serial_rx) = mpsc::channel::<Vec<u8>>(16);
    let bridge = Bridge::new(Config::load_default().unwrap(), serial_tx);

    let client_addr: SocketAddr = "127.0.0.1:9301".parse().unwrap();
    let (event_tx, _rx) = mpsc::channel(16);
    bridge.sessions().ensure_session(client_addr, "/monome", event_tx).await.unwrap();
    let session = bridge.sessions().get(&client_addr).unwrap();
    let reply_socket = session.read().socket.clone();

    let (hw_tx, hw_rx) = mpsc::channel::<Bytes>(16);
    let shutdown = Arc::new(AtomicBool::new(false));
    let bridge_clone = bridge.clone();
    let shutdown_clone = shutdown.clone();
    let serial_disconnected = Arc::new(AtomicBool::new(false));
    let handle = tokio::spawn(async move {
        bridge_clone.run(hw_rx, serial_disconnected, "test".to_string(), shutdown_clone).await
    });

    hw_tx.send(Bytes::copy_from_slice(&[0x21, 0x02, 0x04])).await.unwrap();

    let mut buf = [0u8; 1024];
    let (n, _) = tokio::time::timeout(Duration::from_millis(500), reply_socket.recv_from(&mut buf))
        .await
        .expect("timed out waiting for key event")
        .unwrap();
    let decoded = monome_bridge::osc::decode(&buf[..n]).unwrap();
    assert_eq!(decoded.addr, "/monome/grid/key");
    assert_eq!(decoded.args, vec![OscType::Int(2), OscType::Int(4), OscType::Int(1)]);

    shutdown.store(true, Ordering::SeqCst);
    let _ = tokio::time::timeout(Duration::from_millis(500), handle).await;
}

/// Repeating `/sys/prefix` with the same value is idempotent.
#[tokio::test]
async fn test_repeated_prefix_update_is_idempotent() {
    let (serial_tx, _serial_rx) = mpsc::channel::<Vec<u8>>(16);
    let bridge = Bridge::new(Config::load_default().unwrap(), serial_tx);

    let client_addr: SocketAddr = "127.0.0.1:9400".parse().unwrap();
    let (event_tx, _rx) = mpsc::channel(16);
    bridge.sessions().ensure_session(client_addr, "/monome", event_tx).await.unwrap();

    for _ in 0..3 {
        bridge
            .handle_session_message(
                client_addr,
                rosc::OscMessage { addr: "/sys/prefix".to_string(), args: vec![OscType::String("/m".to_string())] },
            )
            .await;
    }

    let session = bridge.sessions().get(&client_addr).unwrap();
    assert_eq!(session.read().prefix, "/m");
}

/// A second discovery announcement from the same client reuses the session.
#[tokio::test]
async fn test_second_discovery_reuses_session() {
    let (serial_tx, mut serial_rx) = mpsc::channel::<Vec<u8>>(16);
    tokio::spawn(async move { while serial_rx.recv().await.is_some() {} });
    let bridge = Bridge::new(Config::load_default().unwrap(), serial_tx);

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let client_addr = client.local_addr().unwrap();

    for _ in 0..2 {
        let (event_tx, _rx) = mpsc::channel(16);
        let msg = rosc::OscMessage {
            addr: "/serialosc/list".to_string(),
            args: vec![OscType::String(client_addr.ip().to_string()), OscType::Int(client_addr.port() as i32)],
        };
        bridge.handle_discovery(msg, client_addr, event_tx).await;
        let _ = recv_osc(&client).await;
    }

    assert_eq!(bridge.sessions().snapshot().len(), 1);
}

/// The ephemeral/fixed-port UDP bind helper shared by discovery and session
/// sockets succeeds against port 0.
#[tokio::test]
async fn test_bind_fixed_ephemeral() {
    let socket = session::bind_fixed(0).await.unwrap();
    assert!(socket.local_addr().unwrap().port() > 0);
}
