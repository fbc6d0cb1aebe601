//! Single-channel identifier.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::ChannelIdError;

/// Length of the device id segment in the canonical string (uuid simple form).
pub const DEVICE_SERIAL_LEN: usize = 32;

/// Length of the channel index segment in the canonical string.
pub const INDEX_SERIAL_LEN: usize = 5;

/// Total length of a canonical channel id string.
pub const SERIAL_LEN: usize = DEVICE_SERIAL_LEN + INDEX_SERIAL_LEN;

/// Identifies one audio channel of one device.
///
/// An immutable value type ordered by `(device, index)`. The canonical
/// string form is 32 lowercase hex characters (the device id without
/// separators) followed by the channel index in a zero-padded 5-character
/// field, and [`FromStr`] is its exact inverse:
///
/// ```
/// use mixflow_channel::ChannelId;
///
/// let id: ChannelId = "0102030405060708090a0b0c0d0e0f1000002".parse().unwrap();
/// assert_eq!(id.index(), 2);
/// assert_eq!(id.to_string(), "0102030405060708090a0b0c0d0e0f1000002");
/// ```
///
/// The empty sentinel is the nil device id with index −1; its index renders
/// as `-0001` so the canonical length stays fixed and the sentinel
/// round-trips like any other value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelId {
    device: Uuid,
    index: i32,
}

impl ChannelId {
    /// The empty sentinel: nil device id, index −1.
    pub const EMPTY: ChannelId = ChannelId {
        device: Uuid::nil(),
        index: -1,
    };

    /// Creates a channel id for the given device and channel index.
    pub fn new(device: Uuid, index: i32) -> Self {
        ChannelId { device, index }
    }

    /// Returns the device id.
    pub fn device(&self) -> Uuid {
        self.device
    }

    /// Returns the channel index within the device.
    pub fn index(&self) -> i32 {
        self.index
    }

    /// Returns true if this is the empty sentinel.
    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:05}", self.device.as_simple(), self.index)
    }
}

impl FromStr for ChannelId {
    type Err = ChannelIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != SERIAL_LEN {
            return Err(ChannelIdError::Length {
                expected: SERIAL_LEN,
                got: s.len(),
            });
        }
        if !s.is_ascii() {
            return Err(ChannelIdError::Format(s.to_string()));
        }

        let (device_part, index_part) = s.split_at(DEVICE_SERIAL_LEN);
        let device = Uuid::try_parse(device_part)
            .map_err(|_| ChannelIdError::Format(device_part.to_string()))?;
        let index = index_part
            .parse::<i32>()
            .map_err(|_| ChannelIdError::Format(index_part.to_string()))?;

        Ok(ChannelId { device, index })
    }
}

impl Serialize for ChannelId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ChannelId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> Uuid {
        Uuid::parse_str("0102030405060708090a0b0c0d0e0f10").unwrap()
    }

    #[test]
    fn test_canonical_round_trip() {
        let id = ChannelId::new(device(), 7);
        let serial = id.to_string();
        assert_eq!(serial, "0102030405060708090a0b0c0d0e0f1000007");
        assert_eq!(serial.parse::<ChannelId>().unwrap(), id);
    }

    #[test]
    fn test_empty_sentinel_round_trip() {
        let empty = ChannelId::EMPTY;
        assert!(empty.is_empty());

        let serial = empty.to_string();
        assert_eq!(serial.len(), SERIAL_LEN);
        assert_eq!(serial, "00000000000000000000000000000000-0001");
        assert_eq!(serial.parse::<ChannelId>().unwrap(), empty);
    }

    #[test]
    fn test_round_trip_random_ids() {
        for index in [0, 1, 42, 99999] {
            let id = ChannelId::new(Uuid::new_v4(), index);
            assert_eq!(id.to_string().parse::<ChannelId>().unwrap(), id);
        }
    }

    #[test]
    fn test_wrong_length_fails() {
        let err = "abc".parse::<ChannelId>().unwrap_err();
        assert_eq!(
            err,
            ChannelIdError::Length {
                expected: SERIAL_LEN,
                got: 3
            }
        );
    }

    #[test]
    fn test_bad_segments_fail() {
        // Right length, non-hex device id.
        let bad_device = format!("{}{:05}", "zz".repeat(16), 1);
        assert!(matches!(
            bad_device.parse::<ChannelId>(),
            Err(ChannelIdError::Format(_))
        ));

        // Right length, non-numeric index.
        let bad_index = format!("{}abcde", device().as_simple());
        assert!(matches!(
            bad_index.parse::<ChannelId>(),
            Err(ChannelIdError::Format(_))
        ));
    }

    #[test]
    fn test_ordering() {
        let low_device = Uuid::parse_str("00000000000000000000000000000001").unwrap();
        let high_device = Uuid::parse_str("00000000000000000000000000000002").unwrap();

        assert!(ChannelId::new(low_device, 9) < ChannelId::new(high_device, 0));
        assert!(ChannelId::new(low_device, 0) < ChannelId::new(low_device, 1));
        assert!(ChannelId::EMPTY < ChannelId::new(low_device, 0));
    }

    #[test]
    fn test_serde_as_string() {
        let id = ChannelId::new(device(), 3);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"0102030405060708090a0b0c0d0e0f1000003\"");

        let back: ChannelId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_serde_as_map_key() {
        use std::collections::BTreeMap;

        let mut map = BTreeMap::new();
        map.insert(ChannelId::new(device(), 1), "left");
        map.insert(ChannelId::new(device(), 2), "right");

        let json = serde_json::to_string(&map).unwrap();
        let back: BTreeMap<ChannelId, String> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), 2);
    }
}
