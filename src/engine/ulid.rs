//! A small local ULID encoder (spec §4.C): lexicographically sortable,
//! time-prefixed 26-character job identifiers, Crockford base32 over a
//! 48-bit millisecond timestamp and 80 bits of randomness. Not the `ulid`
//! crate (it isn't in the dependency stack) — just the encode half, built
//! on `rand`, the way the rest of this crate's utilities lean on the
//! teacher's existing stack rather than reaching for a new one.

use rand::RngCore;

const ENCODING: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Generate a fresh ULID using the current wall-clock time.
pub fn generate() -> String {
    let timestamp_ms = chrono::Utc::now().timestamp_millis().max(0) as u64;
    let mut random = [0u8; 10];
    rand::thread_rng().fill_bytes(&mut random);
    encode(timestamp_ms, &random)
}

fn encode(timestamp_ms: u64, random: &[u8; 10]) -> String {
    let mut out = String::with_capacity(26);

    for shift in (0..10).rev() {
        let index = ((timestamp_ms >> (shift * 5)) & 0x1f) as usize;
        out.push(ENCODING[index] as char);
    }

    let mut bits: u128 = 0;
    for byte in random {
        bits = (bits << 8) | (*byte as u128);
    }
    for shift in (0..16).rev() {
        let index = ((bits >> (shift * 5)) & 0x1f) as usize;
        out.push(ENCODING[index] as char);
    }

    out
}

#[cfg(test)]
#[path = "ulid_test.rs"]
mod ulid_test;
