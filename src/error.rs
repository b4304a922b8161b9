//! Centralized error types for the bridge
//!
//! All bridge errors are represented by the `BridgeError` enum.
//! Use `Result<T>` as shorthand for `std::result::Result<T, BridgeError>`.

use std::fmt;
use std::path::PathBuf;

/// All bridge errors
#[derive(Debug)]
pub enum BridgeError {
    // === Serial ===
    /// Failed to open the serial port (fatal, non-zero exit)
    SerialOpen {
        port: String,
        source: std::io::Error,
    },
    /// Serial read failed after a successful open (fatal: EOF or hard I/O error)
    SerialDisconnected { port: String },

    // === Network ===
    /// Failed to bind a UDP socket (discovery or session)
    UdpBind { port: u16, source: std::io::Error },

    // === Config ===
    /// Failed to read/parse a config file
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Invalid config value
    ConfigValidation { field: &'static str, reason: String },

    // === CLI ===
    /// The tty path given on the command line does not exist
    TtyNotFound { path: PathBuf },
}

impl std::error::Error for BridgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::SerialOpen { source, .. } | Self::UdpBind { source, .. } => Some(source),
            Self::ConfigRead { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SerialOpen { port, .. } => write!(f, "cannot open serial port: {}", port),
            Self::SerialDisconnected { port } => write!(f, "serial port disconnected: {}", port),
            Self::UdpBind { port, .. } => write!(f, "cannot bind UDP port {}", port),
            Self::ConfigRead { path, .. } => write!(f, "cannot read config: {}", path.display()),
            Self::ConfigValidation { field, reason } => {
                write!(f, "invalid {}: {}", field, reason)
            }
            Self::TtyNotFound { path } => write!(f, "tty path does not exist: {}", path.display()),
        }
    }
}

/// Alias for Result with BridgeError
pub type Result<T> = std::result::Result<T, BridgeError>;
