//! Thin wrapper around the `rosc` crate for encoding/decoding OSC packets
//!
//! Only the subset this bridge needs: building `s`/`i`-tagged messages and
//! decoding an inbound datagram into a path plus integer/string arguments.

use rosc::{OscMessage, OscPacket, OscType};

/// Encode an OSC message with the given address and argument list.
pub fn encode(addr: &str, args: Vec<OscType>) -> Vec<u8> {
    let packet = OscPacket::Message(OscMessage { addr: addr.to_string(), args });
    rosc::encoder::encode(&packet).unwrap_or_default()
}

/// Decode a UDP datagram into an OSC message, if it is one.
pub fn decode(datagram: &[u8]) -> Option<OscMessage> {
    match rosc::decoder::decode_udp(datagram).ok()?.1 {
        OscPacket::Message(msg) => Some(msg),
        OscPacket::Bundle(_) => None,
    }
}

/// Extract an argument as `i32`, coercing `Int`/`Long`/`Float` as rosc itself
/// would accept from a well-behaved client.
pub fn arg_as_i32(arg: &OscType) -> Option<i32> {
    match arg {
        OscType::Int(i) => Some(*i),
        OscType::Long(l) => Some(*l as i32),
        OscType::Float(f) => Some(*f as i32),
        OscType::Double(d) => Some(*d as i32),
        _ => None,
    }
}

/// Extract an argument as a string slice.
pub fn arg_as_str(arg: &OscType) -> Option<&str> {
    match arg {
        OscType::String(s) => Some(s.as_str()),
        _ => None,
    }
}

/// A UDP port is only valid in the open range `(0, 65536)`; OSC carries
/// ports as signed 32-bit integers so both bounds need checking.
pub fn is_good_port(n: i32) -> bool {
    n > 0 && n < 65536
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let bytes = encode("/sys/id", vec![OscType::String("monome".to_string())]);
        let msg = decode(&bytes).unwrap();
        assert_eq!(msg.addr, "/sys/id");
        assert_eq!(arg_as_str(&msg.args[0]), Some("monome"));
    }

    #[test]
    fn test_is_good_port() {
        assert!(!is_good_port(0));
        assert!(is_good_port(1));
        assert!(is_good_port(65535));
        assert!(!is_good_port(65536));
        assert!(!is_good_port(-1));
    }

    #[test]
    fn test_decode_rejects_non_osc() {
        assert!(decode(&[0xff, 0x00, 0x01]).is_none());
    }
}
