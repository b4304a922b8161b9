//! Application-wide constants
//!
//! Centralized constants to avoid duplication and ensure consistency.

// =============================================================================
// Network
// =============================================================================

/// Fixed UDP port clients send `/serialosc/list` to.
pub const DISCOVERY_PORT: u16 = 12002;

// =============================================================================
// Serial
// =============================================================================

/// Baud rate for the USB-serial link (8-N-1, no flow control).
pub const SERIAL_BAUD: u32 = 115_200;

/// Every hardware frame handled by the Framer is exactly this many bytes.
pub const FRAME_SIZE: usize = 3;

/// Consecutive zero-byte reads before assuming the port disconnected.
pub const SERIAL_DISCONNECT_THRESHOLD: u32 = 10;

// =============================================================================
// Device defaults
// =============================================================================

pub const DEFAULT_SYS_ID: &str = "monome";
pub const DEVICE_KIND: &str = "monome";
pub const DEFAULT_PREFIX: &str = "/monome";
pub const DEFAULT_SIZE: (u8, u8) = (8, 8);

// =============================================================================
// Buffers / channels
// =============================================================================

/// UDP / serial receive buffer size.
pub const READ_BUFFER_SIZE: usize = 4096;

/// Channel capacity for internal async message passing.
pub const CHANNEL_CAPACITY: usize = 256;

// =============================================================================
// Retry / timing
// =============================================================================

/// Maximum socket bind retry attempts (discovery / session sockets).
pub const MAX_SOCKET_RETRY_ATTEMPTS: u32 = 5;

/// Base delay between socket bind retry attempts (milliseconds).
pub const RETRY_BASE_DELAY_MS: u64 = 200;

/// Poll interval for checking the shutdown flag in async UDP loops (milliseconds).
pub const SHUTDOWN_POLL_MS: u64 = 100;
