//! Buffer identity and format metadata shared by every buffer kind.

use chrono::{DateTime, TimeDelta, Utc};
use mixflow_channel::ChannelId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BufferError;

/// Identity and format state embedded in each buffer instance.
///
/// The stored sample count lives with the buffer kind, not here, because
/// the two kinds account for it differently; operations that depend on it
/// take it as an argument.
#[derive(Debug, Clone)]
pub(crate) struct BufferMeta {
    pub(crate) uid: Uuid,
    pub(crate) name: String,
    pub(crate) origin: ChannelId,
    pub(crate) channel: ChannelId,
    pub(crate) priority: i32,
    pub(crate) sample_rate: f32,
    pub(crate) channels: u32,
    pub(crate) interleaved: bool,
    pub(crate) last_timestamp: Option<DateTime<Utc>>,
}

impl BufferMeta {
    pub(crate) fn new(name: &str) -> Self {
        BufferMeta {
            uid: Uuid::new_v4(),
            name: name.to_string(),
            origin: ChannelId::EMPTY,
            channel: ChannelId::EMPTY,
            priority: 0,
            sample_rate: 0.0,
            channels: 1,
            interleaved: true,
            last_timestamp: None,
        }
    }

    /// Reconfigures identity and format.
    ///
    /// Sample rate and channel count are frozen while the buffer holds data
    /// and a non-zero sample rate was previously set. A `None` timestamp
    /// leaves the stored timestamp untouched.
    pub(crate) fn setup(
        &mut self,
        data_len: usize,
        origin: ChannelId,
        channel: ChannelId,
        priority: i32,
        sample_rate: f32,
        channels: u32,
        last_timestamp: Option<DateTime<Utc>>,
    ) -> Result<(), BufferError> {
        if data_len > 0
            && self.sample_rate > 0.0
            && ((self.sample_rate - sample_rate).abs() > f32::EPSILON || self.channels != channels)
        {
            return Err(BufferError::ConfigConflict {
                name: self.name.clone(),
                detail: "cannot change sample rate or channels of a non-empty buffer".into(),
            });
        }

        self.origin = origin;
        self.channel = channel;
        self.priority = priority;
        self.sample_rate = sample_rate;
        self.channels = channels;

        if last_timestamp.is_some() {
            self.last_timestamp = last_timestamp;
        }
        Ok(())
    }

    /// Converts a sample count to seconds under the current format.
    ///
    /// Returns 0 when the sample rate or channel count is unset.
    pub(crate) fn samples_to_seconds(&self, samples: usize) -> f64 {
        if self.sample_rate < f32::EPSILON || self.channels < 1 {
            return 0.0;
        }
        samples as f64 / self.sample_rate as f64 / self.channels as f64
    }

    /// Timestamp of the oldest stored sample, derived from the newest one.
    pub(crate) fn first_timestamp(&self, data_len: usize) -> Option<DateTime<Utc>> {
        let last = self.last_timestamp?;
        if self.sample_rate < f32::EPSILON {
            return Some(last);
        }
        Some(last - seconds_to_delta(self.samples_to_seconds(data_len)))
    }

    pub(crate) fn descriptor(&self, data_len: usize) -> BufferDescriptor {
        BufferDescriptor {
            uid: self.uid,
            name: self.name.clone(),
            origin: self.origin,
            channel: self.channel,
            priority: self.priority,
            sample_rate: self.sample_rate,
            channels: self.channels,
            interleaved: self.interleaved,
            data_len,
            last_timestamp: self.last_timestamp,
        }
    }
}

pub(crate) fn seconds_to_delta(seconds: f64) -> TimeDelta {
    TimeDelta::nanoseconds((seconds * 1e9) as i64)
}

/// A serializable point-in-time snapshot of a buffer's metadata.
///
/// This is the payload handed to a
/// [`BufferListener`](crate::flow::BufferListener) after every mutation and
/// the source for [`AudioBuffer::inherit`](crate::AudioBuffer::inherit).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferDescriptor {
    /// Unique id of the buffer instance, generated at construction.
    pub uid: Uuid,
    /// Display name of the buffer.
    pub name: String,
    /// Channel the samples were captured from.
    pub origin: ChannelId,
    /// Channel the samples are currently routed to.
    pub channel: ChannelId,
    /// Mixing priority.
    pub priority: i32,
    /// Sample rate in Hz; 0 means unset.
    pub sample_rate: f32,
    /// Width of the interleaved channel group.
    pub channels: u32,
    /// Whether samples of one frame are stored interleaved.
    pub interleaved: bool,
    /// Number of samples stored at snapshot time.
    pub data_len: usize,
    /// Time of the most recently appended sample; `None` means unset.
    pub last_timestamp: Option<DateTime<Utc>>,
}

impl BufferDescriptor {
    /// Samples stored per channel of the interleaved group.
    pub fn samples_per_channel(&self) -> usize {
        if self.channels < 1 {
            return 0;
        }
        self.data_len / self.channels as usize
    }

    /// Duration of the stored data in seconds.
    pub fn seconds(&self) -> f64 {
        if self.sample_rate < f32::EPSILON || self.channels < 1 {
            return 0.0;
        }
        self.data_len as f64 / self.sample_rate as f64 / self.channels as f64
    }

    /// Timestamp of the oldest stored sample.
    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        let last = self.last_timestamp?;
        if self.sample_rate < f32::EPSILON {
            return Some(last);
        }
        Some(last - seconds_to_delta(self.seconds()))
    }
}
