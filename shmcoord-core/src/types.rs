// SPDX-License-Identifier: Apache-2.0

//! Newtype wrappers for validated inputs.
//!
//! `IpcKey` validates SysV IPC keys at construction time; `BoundedMessage`
//! replaces a raw fixed-size character buffer with a bounded byte sequence
//! that carries its own capacity and truncation rule.

use std::fmt;
use std::str::FromStr;

use crate::error::CoordinatorError;
use crate::region::MESSAGE_CAPACITY;

/// Validated SysV IPC key.
/// Must be non-zero: key 0 is `IPC_PRIVATE` and would silently give every
/// process its own kernel object instead of a shared one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IpcKey(libc::key_t);

impl IpcKey {
    /// Default key for the shared memory segment.
    pub const SEGMENT_DEFAULT: IpcKey = IpcKey(0x1234);

    /// Default key for the gate semaphore.
    pub const GATE_DEFAULT: IpcKey = IpcKey(0x5678);

    /// Create a new IpcKey with validation.
    pub fn new(key: libc::key_t) -> Result<Self, CoordinatorError> {
        if key == 0 {
            return Err(CoordinatorError::InvalidKey {
                reason: "key 0 (IPC_PRIVATE) is not shareable".to_string(),
            });
        }
        Ok(Self(key))
    }

    /// Get the inner key value.
    pub fn value(&self) -> libc::key_t {
        self.0
    }
}

impl fmt::Display for IpcKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

impl FromStr for IpcKey {
    type Err = CoordinatorError;

    /// Parse a key from decimal or `0x`-prefixed hexadecimal notation.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            libc::key_t::from_str_radix(hex, 16)
        } else {
            s.parse::<libc::key_t>()
        };

        match parsed {
            Ok(key) => Self::new(key),
            Err(e) => Err(CoordinatorError::InvalidKey {
                reason: format!("'{}' is not a valid key: {}", s, e),
            }),
        }
    }
}

/// A message bounded to the region's fixed capacity.
///
/// Holds at most `MESSAGE_CAPACITY - 1` payload bytes plus a terminating
/// NUL, mirroring the layout inside the shared region. Longer input is
/// silently truncated (bytewise, not at a character boundary) - truncation
/// is part of the contract, not an error.
#[derive(Clone, Copy)]
pub struct BoundedMessage {
    bytes: [u8; MESSAGE_CAPACITY],
}

impl BoundedMessage {
    /// Usable payload capacity in bytes (capacity minus the NUL).
    pub const MAX_LEN: usize = MESSAGE_CAPACITY - 1;

    /// Build from arbitrary input, truncating silently to capacity.
    pub fn new(input: &str) -> Self {
        let mut bytes = [0u8; MESSAGE_CAPACITY];
        let src = input.as_bytes();
        let len = src.len().min(Self::MAX_LEN);
        bytes[..len].copy_from_slice(&src[..len]);
        Self { bytes }
    }

    /// Reconstruct from a raw region buffer, honoring NUL termination.
    pub fn from_raw(raw: &[u8; MESSAGE_CAPACITY]) -> Self {
        let mut bytes = *raw;
        // Force the terminator in case the buffer was never initialized
        bytes[MESSAGE_CAPACITY - 1] = 0;
        Self { bytes }
    }

    /// Payload length in bytes (up to the first NUL).
    pub fn len(&self) -> usize {
        self.bytes
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(Self::MAX_LEN)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Payload bytes without the terminator.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len()]
    }

    /// The full buffer as stored in the region, NUL included.
    pub fn as_raw(&self) -> &[u8; MESSAGE_CAPACITY] {
        &self.bytes
    }

    /// Lossy UTF-8 view of the payload.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(self.as_bytes()).into_owned()
    }
}

impl fmt::Debug for BoundedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedMessage")
            .field("len", &self.len())
            .field("payload", &self.to_string_lossy())
            .finish()
    }
}

impl From<&str> for BoundedMessage {
    fn from(input: &str) -> Self {
        Self::new(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_valid() {
        assert!(IpcKey::new(0x1234).is_ok());
        assert!(IpcKey::new(1).is_ok());
    }

    #[test]
    fn test_key_zero_rejected() {
        assert!(IpcKey::new(0).is_err());
    }

    #[test]
    fn test_key_parse() {
        assert_eq!("0x1234".parse::<IpcKey>().unwrap().value(), 0x1234);
        assert_eq!("4660".parse::<IpcKey>().unwrap().value(), 4660);
        assert!("0x0".parse::<IpcKey>().is_err());
        assert!("bogus".parse::<IpcKey>().is_err());
    }

    #[test]
    fn test_key_display_hex() {
        assert_eq!(IpcKey::SEGMENT_DEFAULT.to_string(), "0x1234");
        assert_eq!(IpcKey::GATE_DEFAULT.to_string(), "0x5678");
    }

    #[test]
    fn test_message_roundtrip() {
        let msg = BoundedMessage::new("hello");
        assert_eq!(msg.len(), 5);
        assert_eq!(msg.to_string_lossy(), "hello");
        assert_eq!(msg.as_raw()[5], 0);
    }

    #[test]
    fn test_message_empty() {
        let msg = BoundedMessage::new("");
        assert!(msg.is_empty());
        assert_eq!(msg.to_string_lossy(), "");
    }

    #[test]
    fn test_message_silent_truncation() {
        let long = "x".repeat(MESSAGE_CAPACITY * 2);
        let msg = BoundedMessage::new(&long);
        assert_eq!(msg.len(), BoundedMessage::MAX_LEN);
        assert_eq!(msg.as_raw()[MESSAGE_CAPACITY - 1], 0);
    }

    #[test]
    fn test_message_exact_fit() {
        let exact = "y".repeat(BoundedMessage::MAX_LEN);
        let msg = BoundedMessage::new(&exact);
        assert_eq!(msg.len(), BoundedMessage::MAX_LEN);
        assert_eq!(msg.to_string_lossy(), exact);
    }

    #[test]
    fn test_message_from_uninitialized_raw() {
        // A buffer with no NUL anywhere still yields a bounded payload
        let raw = [b'a'; MESSAGE_CAPACITY];
        let msg = BoundedMessage::from_raw(&raw);
        assert_eq!(msg.len(), BoundedMessage::MAX_LEN);
    }
}
