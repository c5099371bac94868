//! DB-Net keystream generator
//!
//! The controller XOR-encrypts the telegram portion of every frame with a
//! 4-byte keystream derived from the rolling session key and the frame's
//! transaction id. The generator is a small multiplicative PRNG seeded by the
//! station password; all arithmetic is modulo 2^32, so u32 wrapping ops
//! reproduce it exactly.

use super::frame::HEADER_SIZE;
use crate::error::{Error, Result};

/// Password-seeded PRNG used for both the keystream and the frame check word
///
/// A zero password is treated as 1 by the controller firmware.
pub fn randomize(seed: u32, password: u32) -> u32 {
    let password = if password == 0 { 1 } else { password };
    let mut mult = seed.wrapping_mul(password);
    let mut key = password;
    for _ in 0..4 {
        key = (key << 1).wrapping_add(13);
        mult = mult.wrapping_add(key).wrapping_mul(seed);
    }
    password.wrapping_add(mult).wrapping_add(key)
}

/// XOR the telegram region of `msg` in place
///
/// Symmetric: applying it twice restores the original bytes. The keystream is
/// seeded from the header's own session-key and transaction-id fields with the
/// complemented transaction id, and re-seeded with the plain transaction id at
/// telegram byte 8; the byte index within the 4-byte block keeps running
/// across the re-seed.
pub fn crypt_telegram(msg: &mut [u8]) -> Result<()> {
    if msg.len() < HEADER_SIZE {
        return Err(Error::MalformedFrame(format!(
            "frame shorter than header: {} bytes",
            msg.len()
        )));
    }
    let telegram_len = msg[14] as usize + 6;
    if msg.len() < HEADER_SIZE + telegram_len {
        return Err(Error::MalformedFrame(format!(
            "frame truncated: header declares {} telegram bytes, {} present",
            telegram_len,
            msg.len() - HEADER_SIZE
        )));
    }

    let transaction_id = u32::from_le_bytes([msg[0], msg[1], msg[2], msg[3]]);
    let key = u32::from_le_bytes([msg[6], msg[7], msg[8], msg[9]]);

    let mut stream = randomize(key, !transaction_id).to_le_bytes();
    for i in 0..telegram_len {
        if i == 8 {
            stream = randomize(key, transaction_id).to_le_bytes();
        }
        msg[HEADER_SIZE + i] ^= stream[i % 4];
    }
    Ok(())
}
