//! Splits the raw serial byte stream into fixed-width hardware frames
//!
//! Every frame handled here is [`FRAME_SIZE`] bytes, identified by its
//! leading byte (opcode). A leading byte that doesn't match a known opcode
//! is dropped one at a time until the buffer resynchronizes, so a single
//! corrupt or spurious byte never wedges the stream.

use crate::constants::FRAME_SIZE;

/// Decoded event from the grid's hardware protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareEvent {
    SizeReport { x: u8, y: u8 },
    KeyUp { x: u8, y: u8 },
    KeyDown { x: u8, y: u8 },
}

const OP_SYS_ID: u8 = 0x01;
const OP_SIZE_REPORT: u8 = 0x03;
const OP_KEY_UP: u8 = 0x20;
const OP_KEY_DOWN: u8 = 0x21;

/// The two query frames written to the device once, right after open.
pub const QUERY_SYS_ID: [u8; 1] = [0x01];
pub const QUERY_SIZE: [u8; 1] = [0x05];

/// Incrementally reassembles hardware frames from arbitrarily-chunked bytes.
#[derive(Debug, Default)]
pub struct Framer {
    buf: Vec<u8>,
}

impl Framer {
    pub fn new() -> Self {
        Self { buf: Vec::with_capacity(FRAME_SIZE * 4) }
    }

    /// Feed newly-read bytes and drain every complete frame they produce.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<HardwareEvent> {
        self.buf.extend_from_slice(bytes);
        let mut events = Vec::new();

        loop {
            let Some(&opcode) = self.buf.first() else { break };

            if !is_known_opcode(opcode) {
                self.buf.remove(0);
                continue;
            }

            if self.buf.len() < FRAME_SIZE {
                break;
            }

            let frame = [self.buf[0], self.buf[1], self.buf[2]];
            self.buf.drain(..FRAME_SIZE);

            if let Some(event) = decode_frame(frame) {
                events.push(event);
            }
        }

        events
    }
}

fn is_known_opcode(opcode: u8) -> bool {
    matches!(opcode, OP_SYS_ID | OP_SIZE_REPORT | OP_KEY_UP | OP_KEY_DOWN)
}

fn decode_frame(frame: [u8; FRAME_SIZE]) -> Option<HardwareEvent> {
    match frame[0] {
        OP_SYS_ID => None,
        OP_SIZE_REPORT => Some(HardwareEvent::SizeReport { x: frame[1], y: frame[2] }),
        OP_KEY_UP => Some(HardwareEvent::KeyUp { x: frame[1], y: frame[2] }),
        OP_KEY_DOWN => Some(HardwareEvent::KeyDown { x: frame[1], y: frame[2] }),
        _ => unreachable!("only known opcodes reach decode_frame"),
    }
}
