//! Serial transport: opens the device and runs blocking reader/writer threads
//!
//! Framing (splitting the byte stream into hardware messages) is handled
//! separately by [`framer`]; this module only moves bytes in and out.

pub mod framer;

use crate::constants::{CHANNEL_CAPACITY, READ_BUFFER_SIZE, SERIAL_DISCONNECT_THRESHOLD};
use crate::error::{BridgeError, Result};
use bytes::Bytes;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Channels for bidirectional communication with the serial device.
pub struct SerialChannels {
    /// Raw bytes read from the device, in arrival order.
    pub rx: mpsc::Receiver<Bytes>,
    /// Raw byte sequences to write to the device. Each item is written with
    /// a single `write_all`, so writes from one OSC message are never
    /// interleaved with another's.
    pub tx: mpsc::Sender<Vec<u8>>,
    /// Set by the reader or writer thread when `rx`/`tx` closed because the
    /// port disconnected (EOF, hard read/write error, or the
    /// consecutive-zero-read threshold), as opposed to `shutdown` having been
    /// set deliberately. The caller checks this once `rx` closes to tell the
    /// two apart, mirroring the teacher's `session_shutdown` vs `shutdown`
    /// split in its UDP/serial bridge loop.
    pub disconnected: Arc<AtomicBool>,
}

/// Open the serial port at `baud_rate`, 8-N-1, no flow control, and spawn
/// the reader/writer threads.
///
/// Serial open failure is fatal and returned to the caller; once open,
/// transient per-read errors are retried but a hard read error or EOF ends
/// the reader thread, closes `rx`, and sets `disconnected` so the caller can
/// distinguish this from a deliberate shutdown.
pub fn open(port_name: &str, baud_rate: u32, shutdown: Arc<AtomicBool>) -> Result<SerialChannels> {
    let port_read = open_port(port_name, baud_rate)?;
    let port_write = port_read.try_clone().map_err(|e| BridgeError::SerialOpen {
        port: port_name.to_string(),
        source: std::io::Error::other(e.to_string()),
    })?;

    let (in_tx, in_rx) = mpsc::channel::<Bytes>(CHANNEL_CAPACITY);
    let (out_tx, mut out_rx) = mpsc::channel::<Vec<u8>>(CHANNEL_CAPACITY);
    let disconnected = Arc::new(AtomicBool::new(false));

    // Reader thread (blocking, low latency).
    let shutdown_reader = shutdown.clone();
    let disconnected_reader = disconnected.clone();
    let port_name_reader = port_name.to_string();
    std::thread::spawn(move || {
        let mut port = port_read;
        let mut buf = [0u8; READ_BUFFER_SIZE];
        let mut consecutive_errors = 0u32;

        while !shutdown_reader.load(Ordering::Relaxed) {
            match port.read(&mut buf) {
                Ok(n) if n > 0 => {
                    consecutive_errors = 0;
                    if in_tx.blocking_send(Bytes::copy_from_slice(&buf[..n])).is_err() {
                        break;
                    }
                }
                Ok(_) => {
                    consecutive_errors += 1;
                    if consecutive_errors > SERIAL_DISCONNECT_THRESHOLD {
                        tracing::warn!(port = %port_name_reader, "serial port disconnected");
                        disconnected_reader.store(true, Ordering::SeqCst);
                        break;
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    consecutive_errors = 0;
                }
                Err(e) => {
                    tracing::warn!(port = %port_name_reader, error = %e, "serial read error");
                    disconnected_reader.store(true, Ordering::SeqCst);
                    break;
                }
            }
        }
        // Dropping in_tx closes the channel, signalling the controller.
    });

    // Writer thread (blocking, serializes all outbound frames).
    let shutdown_writer = shutdown.clone();
    let disconnected_writer = disconnected.clone();
    std::thread::spawn(move || {
        let mut port = port_write;
        loop {
            if shutdown_writer.load(Ordering::Relaxed) {
                break;
            }
            match out_rx.blocking_recv() {
                Some(data) => {
                    if let Err(e) = port.write_all(&data) {
                        tracing::warn!(error = %e, "serial write error");
                        disconnected_writer.store(true, Ordering::SeqCst);
                        break;
                    }
                }
                None => break,
            }
        }
    });

    Ok(SerialChannels { rx: in_rx, tx: out_tx, disconnected })
}

fn open_port(port_name: &str, baud_rate: u32) -> Result<Box<dyn serialport::SerialPort>> {
    serialport::new(port_name, baud_rate)
        .timeout(std::time::Duration::from_millis(10))
        .open()
        .map_err(|e| BridgeError::SerialOpen {
            port: port_name.to_string(),
            source: std::io::Error::other(e.to_string()),
        })
}
