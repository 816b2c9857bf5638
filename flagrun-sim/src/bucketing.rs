//! Deterministic percentage rollout bucketing.
//!
//! A user lands in a stable bucket derived from the SHA-1 of the flag key,
//! the environment salt and the user key. The same user therefore always
//! receives the same variant for a given rollout percentage.

use sha1::{Digest, Sha1};

/// Number of leading hex digits taken from the digest (60 bits).
const BUCKET_HEX_DIGITS: usize = 15;
/// Bits of the prefix kept so the bucket converts to `f64` exactly.
const BUCKET_BITS: u32 = f64::MANTISSA_DIGITS;
const BUCKET_SCALE: f64 = (1u64 << BUCKET_BITS) as f64;

/// Bucket of `user_key` in `[0, 1)`.
pub fn bucket(flag_key: &str, salt: &str, user_key: &str) -> f64 {
    bucket_prefix(flag_key, salt, user_key) as f64 / BUCKET_SCALE
}

/// Whether `user_key` falls inside a rollout of `rollout_percent`.
pub fn in_rollout(flag_key: &str, salt: &str, user_key: &str, rollout_percent: u8) -> bool {
    prefix_in_rollout(bucket_prefix(flag_key, salt, user_key), rollout_percent)
}

/// Leading `BUCKET_BITS` bits of the SHA-1 of `flag.salt.user`.
fn bucket_prefix(flag_key: &str, salt: &str, user_key: &str) -> u64 {
    let mut hasher = Sha1::new();
    hasher.update(flag_key.as_bytes());
    hasher.update(b".");
    hasher.update(salt.as_bytes());
    hasher.update(b".");
    hasher.update(user_key.as_bytes());

    let digest = hex::encode(hasher.finalize());
    // Hex output of a digest always parses
    let value = u64::from_str_radix(&digest[..BUCKET_HEX_DIGITS], 16).unwrap_or(0);

    value >> (BUCKET_HEX_DIGITS as u32 * 4 - BUCKET_BITS)
}

fn prefix_in_rollout(prefix: u64, rollout_percent: u8) -> bool {
    u128::from(prefix) * 100 < (u128::from(rollout_percent) << BUCKET_BITS)
}
