//! Stateless hardware <-> OSC translation
//!
//! `encode_led` takes an OSC address already stripped of the session prefix
//! and maps it to the exact byte sequence the device expects. Unknown
//! addresses or argument lists too short for their address translate to
//! `None` and are silently dropped by the caller.

use crate::osc::arg_as_i32;
use rosc::OscType;

pub fn encode_led(stripped_addr: &str, args: &[OscType]) -> Option<Vec<u8>> {
    let ints: Vec<i32> = args.iter().filter_map(arg_as_i32).collect();

    match stripped_addr {
        "/grid/led/set" => {
            let [x, y, s] = take3(&ints)?;
            Some(vec![if s == 0 { 0x10 } else { 0x11 }, x as u8, y as u8])
        }
        "/grid/led/all" => {
            let s = *ints.first()?;
            Some(vec![if s == 0 { 0x12 } else { 0x13 }])
        }
        "/grid/led/map" => {
            let (x, y, rest) = take2_rest(&ints)?;
            Some(frame(0x14, x, y, rest))
        }
        "/grid/led/row" => {
            let (x, y, rest) = take2_rest(&ints)?;
            Some(frame(0x15, x, y, rest))
        }
        "/grid/led/col" => {
            let (x, y, rest) = take2_rest(&ints)?;
            Some(frame(0x16, x, y, rest))
        }
        "/grid/led/intensity" => {
            let i = *ints.first()?;
            Some(vec![0x17, i as u8])
        }
        "/grid/led/level/set" => {
            let [x, y, l] = take3(&ints)?;
            Some(vec![0x18, x as u8, y as u8, l as u8])
        }
        "/grid/led/level/all" => {
            let l = *ints.first()?;
            Some(vec![0x19, l as u8])
        }
        "/grid/led/level/map" => {
            let (x, y, rest) = take2_rest(&ints)?;
            Some(frame(0x1a, x, y, rest))
        }
        "/grid/led/level/row" => {
            let (x, y, rest) = take2_rest(&ints)?;
            Some(frame(0x1b, x, y, rest))
        }
        "/grid/led/level/col" => {
            let (x, y, rest) = take2_rest(&ints)?;
            Some(frame(0x1c, x, y, rest))
        }
        _ => None,
    }
}

fn take3(ints: &[i32]) -> Option<[i32; 3]> {
    if ints.len() < 3 {
        return None;
    }
    Some([ints[0], ints[1], ints[2]])
}

fn take2_rest(ints: &[i32]) -> Option<(i32, i32, &[i32])> {
    if ints.len() < 2 {
        return None;
    }
    Some((ints[0], ints[1], &ints[2..]))
}

fn frame(opcode: u8, x: i32, y: i32, rest: &[i32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(3 + rest.len());
    out.push(opcode);
    out.push(x as u8);
    out.push(y as u8);
    out.extend(rest.iter().map(|v| *v as u8));
    out
}

/// Address + args for the key event emitted to every session on a
/// `KeyUp`/`KeyDown` hardware event, relative to the session's prefix.
pub fn key_event(prefix: &str, x: u8, y: u8, down: bool) -> (String, Vec<OscType>) {
    let addr = format!("{prefix}/grid/key");
    let state = if down { 1 } else { 0 };
    (addr, vec![OscType::Int(x as i32), OscType::Int(y as i32), OscType::Int(state)])
}
