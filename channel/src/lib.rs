//! Channel identity value types.
//!
//! This crate provides the key types used to address individual audio
//! channels across devices:
//!
//! - [`ChannelId`]: one channel of one device (128-bit device id + index)
//! - [`ChannelRoute`]: an ordered (input, output) pair of channel ids
//!
//! Both types are immutable values with a total order and a fixed-width
//! canonical string form that round-trips through parsing, which makes them
//! usable as map keys and as serialized identifiers.
//!
//! # Example
//!
//! ```
//! use mixflow_channel::ChannelId;
//! use uuid::Uuid;
//!
//! let id = ChannelId::new(Uuid::new_v4(), 3);
//! let serial = id.to_string();
//! assert_eq!(serial.len(), 37);
//! assert_eq!(serial.parse::<ChannelId>().unwrap(), id);
//! ```

mod channel_id;
mod error;
mod route;

pub use channel_id::ChannelId;
pub use error::ChannelIdError;
pub use route::ChannelRoute;
