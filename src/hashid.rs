//! Opaque public identifiers for internal row keys.
//!
//! A key is run through a 4-round Feistel network whose round function is
//! HMAC-SHA256 under the configured salt, then written as 11 characters of
//! URL-safe base64. The mapping is a permutation of the 64-bit space, so
//! every key has exactly one public id and sequential keys look unrelated.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use ring::hmac;

const ROUNDS: u8 = 4;

#[derive(Clone)]
pub struct HashidCodec {
    key: hmac::Key,
}

impl HashidCodec {
    pub fn new(salt: &str) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, salt.as_bytes()),
        }
    }

    pub fn encode(&self, id: i64) -> String {
        let block = id as u64;
        let (mut left, mut right) = ((block >> 32) as u32, block as u32);
        for round in 0..ROUNDS {
            let next = left ^ self.round(round, right);
            left = right;
            right = next;
        }

        let mut bytes = [0u8; 8];
        bytes[..4].copy_from_slice(&left.to_be_bytes());
        bytes[4..].copy_from_slice(&right.to_be_bytes());
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Returns `None` for anything `encode` could not have produced for a
    /// positive key.
    pub fn decode(&self, hashid: &str) -> Option<i64> {
        let bytes: [u8; 8] = URL_SAFE_NO_PAD.decode(hashid).ok()?.try_into().ok()?;

        let mut left = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let mut right = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        for round in (0..ROUNDS).rev() {
            let previous = right ^ self.round(round, left);
            right = left;
            left = previous;
        }

        let id = ((u64::from(left) << 32) | u64::from(right)) as i64;
        (id > 0).then_some(id)
    }

    fn round(&self, round: u8, half: u32) -> u32 {
        let mut message = [0u8; 5];
        message[0] = round;
        message[1..].copy_from_slice(&half.to_be_bytes());

        let tag = hmac::sign(&self.key, &message);
        let mut word = [0u8; 4];
        word.copy_from_slice(&tag.as_ref()[..4]);
        u32::from_be_bytes(word)
    }
}

impl std::fmt::Debug for HashidCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashidCodec").finish_non_exhaustive()
    }
}
