//! Random bytes and identifiers from a CSPRNG
//!
//! Entropy failures are not recoverable: every function here panics if the
//! operating system cannot supply random bytes.

use lazy_static::lazy_static;
use rand::rngs::OsRng;
use rand::{Rng, RngCore};

use crate::utils::{byte_buffer_pool, ObjectPool};

const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const ALPHANUMERIC: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

lazy_static! {
    /// Scratch buffers for string assembly
    static ref STRING_BUFFERS: ObjectPool<Vec<u8>> = byte_buffer_pool(64, 32);
}

/// Fill `buf` with bytes from the OS CSPRNG and return it.
///
/// # Panics
///
/// Panics if the entropy source fails.
pub fn rand_bytes(buf: &mut [u8]) -> &mut [u8] {
    if let Err(err) = OsRng.try_fill_bytes(buf) {
        panic!("fast: OS entropy source error: {}", err);
    }
    buf
}

/// A random `u64` from the OS CSPRNG
pub fn rand_u64() -> u64 {
    let mut buf = [0u8; 8];
    rand_bytes(&mut buf);
    u64::from_le_bytes(buf)
}

/// A random identifier of `n` characters.
///
/// The first character is an uppercase letter, the rest are alphanumeric, so
/// the result is always a valid identifier in most languages.
pub fn rand_id(n: usize) -> String {
    rand_str(n, |i| if i == 0 { UPPER } else { ALPHANUMERIC })
}

/// A random string of `n` characters where character `i` is drawn uniformly
/// from `charset(i)`. An empty charset yields `-` at that position.
pub fn rand_str<'a, F>(n: usize, charset: F) -> String
where
    F: Fn(usize) -> &'a str,
{
    if n == 0 {
        return String::new();
    }

    // thread_rng is a CSPRNG periodically reseeded from the OS
    let mut rng = rand::thread_rng();
    let mut buf = STRING_BUFFERS.get();
    for i in 0..n {
        let set = charset(i);
        if set.is_empty() {
            buf.push(b'-');
        } else if set.is_ascii() {
            buf.push(set.as_bytes()[rng.gen_range(0..set.len())]);
        } else {
            let count = set.chars().count();
            let ch = set.chars().nth(rng.gen_range(0..count)).unwrap_or('-');
            let mut utf8 = [0u8; 4];
            buf.extend_from_slice(ch.encode_utf8(&mut utf8).as_bytes());
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}
