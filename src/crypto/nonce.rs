//! Counter nonces for the framed stream.
//!
//! Each stream direction owns one counter, starting at zero and advancing
//! once per AEAD operation (so twice per chunk: once for the length block,
//! once for the payload). Wire layout:
//!
//! ```text
//! [ counter (8 bytes, little-endian) | zeros (4 bytes) ]
//! ```
//!
//! Note the endianness split on the wire: the chunk length prefix is
//! big-endian while this counter is little-endian. Keeping the counter
//! behind a dedicated type is what stops the two from ever being conflated.

use crate::crypto::NONCE_SIZE;
use crate::error::{Error, Result};

/// Monotone per-direction nonce counter.
///
/// Never reset, never shared between directions. Overflow is unreachable at
/// 2^64 operations but is still treated as a fatal error rather than wrapping
/// into nonce reuse.
#[derive(Debug, Default)]
pub struct NonceCounter {
    counter: u64,
}

impl NonceCounter {
    /// Create a counter at zero.
    pub fn new() -> Self {
        Self { counter: 0 }
    }

    /// Wire bytes for the current counter value, advancing it afterwards.
    pub fn next(&mut self) -> Result<[u8; NONCE_SIZE]> {
        let mut nonce = [0u8; NONCE_SIZE];
        nonce[..8].copy_from_slice(&self.counter.to_le_bytes());
        self.counter = self
            .counter
            .checked_add(1)
            .ok_or_else(|| Error::framing("nonce counter overflow"))?;
        Ok(nonce)
    }

    /// Current counter value (for diagnostics).
    pub fn value(&self) -> u64 {
        self.counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_nonce_is_zero() {
        let mut counter = NonceCounter::new();
        assert_eq!(counter.next().unwrap(), [0u8; NONCE_SIZE]);
        assert_eq!(counter.value(), 1);
    }

    #[test]
    fn test_layout_little_endian_with_zero_tail() {
        let mut counter = NonceCounter { counter: 0x0102030405060708 };
        let nonce = counter.next().unwrap();

        assert_eq!(&nonce[..8], &[0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&nonce[8..], &[0u8; 4]);
    }

    #[test]
    fn test_monotone_increment() {
        let mut counter = NonceCounter::new();
        for expected in 0u64..5 {
            let nonce = counter.next().unwrap();
            assert_eq!(u64::from_le_bytes(nonce[..8].try_into().unwrap()), expected);
        }
    }

    #[test]
    fn test_overflow_is_fatal() {
        let mut counter = NonceCounter { counter: u64::MAX };
        assert!(counter.next().is_err());
    }
}
