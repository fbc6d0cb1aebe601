//! Operation set shared by every buffer kind.

use chrono::{DateTime, Utc};
use mixflow_channel::ChannelId;

use crate::error::BufferError;
use crate::meta::BufferDescriptor;

/// Operations every buffer kind supports.
///
/// Implementors form a closed set: [`SnapshotBuffer`](crate::SnapshotBuffer)
/// holds one discrete block replaced wholesale per write, and
/// [`RingBuffer`](crate::RingBuffer) holds a continuous wraparound stream.
/// Collaborators that only care about identity and format work against this
/// trait.
pub trait AudioBuffer<T: Copy + Default>: Send + Sync {
    /// Returns a point-in-time snapshot of the buffer's metadata.
    fn descriptor(&self) -> BufferDescriptor;

    /// Number of samples currently stored.
    fn data_len(&self) -> usize;

    /// (Re)configures identity and format.
    ///
    /// Fails with [`BufferError::ConfigConflict`] when the buffer holds data,
    /// a non-zero sample rate was previously set, and the requested rate or
    /// channel count differs. A `None` timestamp leaves the stored timestamp
    /// untouched. Fires the change notification once.
    fn setup(
        &self,
        origin: ChannelId,
        channel: ChannelId,
        priority: i32,
        sample_rate: f32,
        channels: u32,
        last_timestamp: Option<DateTime<Utc>>,
    ) -> Result<(), BufferError>;

    /// Resets identity to empty channels and a zeroed format.
    fn setup_null(&self) -> Result<(), BufferError> {
        self.setup(ChannelId::EMPTY, ChannelId::EMPTY, 0, 0.0, 0, None)
    }

    /// Overwrites the last-sample timestamp; `None` is ignored.
    fn adjust_timestamp(&self, last_timestamp: Option<DateTime<Utc>>) -> Result<(), BufferError>;

    /// Copies identity and format from another buffer's descriptor.
    fn inherit(&self, proto: &BufferDescriptor) -> Result<(), BufferError> {
        self.setup(
            proto.origin,
            proto.channel,
            proto.priority,
            proto.sample_rate,
            proto.channels,
            proto.last_timestamp,
        )
    }

    /// Converts a sample count to seconds under the current format.
    ///
    /// Returns 0 when the sample rate or channel count is unset.
    fn samples_to_seconds(&self, samples: usize) -> f64;

    /// Writes `len` samples starting at `samples[offset]`, recording
    /// `last_timestamp` as the time of the newest sample.
    ///
    /// Snapshot buffers replace their whole content; ring buffers append,
    /// growing or overwriting the oldest data per their backpressure policy.
    fn push_samples(
        &self,
        samples: &[T],
        offset: usize,
        len: usize,
        last_timestamp: Option<DateTime<Utc>>,
    ) -> Result<(), BufferError>;

    /// Reads `len` samples into `out` starting at `out[offset]`, returning
    /// the timestamp associated with the read window.
    ///
    /// Snapshot buffers copy without consuming and fail strictly on short
    /// reads; ring buffers consume and zero-fill short reads instead.
    fn pop_samples(
        &self,
        out: &mut [T],
        offset: usize,
        len: usize,
    ) -> Result<Option<DateTime<Utc>>, BufferError>;
}
