//! Input/output channel pair identifier.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::channel_id::{ChannelId, SERIAL_LEN};
use crate::error::ChannelIdError;

/// Total length of a canonical channel route string.
pub const ROUTE_SERIAL_LEN: usize = SERIAL_LEN * 2;

/// An ordered (input, output) pair of channel ids.
///
/// Follows the same value-type pattern as [`ChannelId`]: total order by
/// input first, then output; canonical string form is the concatenation of
/// the two canonical channel id strings, parsed back by splitting in half.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelRoute {
    input: ChannelId,
    output: ChannelId,
}

impl ChannelRoute {
    /// The empty sentinel route: both ends empty.
    pub const EMPTY: ChannelRoute = ChannelRoute {
        input: ChannelId::EMPTY,
        output: ChannelId::EMPTY,
    };

    /// Creates a route from an input channel to an output channel.
    pub fn new(input: ChannelId, output: ChannelId) -> Self {
        ChannelRoute { input, output }
    }

    /// Returns the input (capture) end of the route.
    pub fn input(&self) -> ChannelId {
        self.input
    }

    /// Returns the output (render) end of the route.
    pub fn output(&self) -> ChannelId {
        self.output
    }

    /// Returns true if both ends are the empty sentinel.
    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }
}

impl fmt::Display for ChannelRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.input, self.output)
    }
}

impl FromStr for ChannelRoute {
    type Err = ChannelIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != ROUTE_SERIAL_LEN {
            return Err(ChannelIdError::Length {
                expected: ROUTE_SERIAL_LEN,
                got: s.len(),
            });
        }
        if !s.is_ascii() {
            return Err(ChannelIdError::Format(s.to_string()));
        }

        let (input_part, output_part) = s.split_at(SERIAL_LEN);
        Ok(ChannelRoute {
            input: input_part.parse()?,
            output: output_part.parse()?,
        })
    }
}

impl Serialize for ChannelRoute {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ChannelRoute {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
