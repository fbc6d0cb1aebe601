//! Replace-on-write snapshot buffer.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use mixflow_channel::ChannelId;
use uuid::Uuid;

use crate::audio_buffer::AudioBuffer;
use crate::error::BufferError;
use crate::flow::{BufferListener, NullListener};
use crate::meta::{BufferDescriptor, BufferMeta};

/// A thread-safe buffer holding exactly one discrete block of samples.
///
/// Each write replaces the whole content; there is no append. Reads copy
/// without consuming and are strict: popping more samples than stored fails
/// with [`BufferError::InsufficientData`] instead of zero-filling.
///
/// # Example
///
/// ```
/// use mixflow_buffer::{AudioBuffer, SnapshotBuffer};
///
/// let buf = SnapshotBuffer::<f32>::new("capture block");
/// buf.push_samples(&[0.1, 0.2, 0.3], 0, 3, None).unwrap();
///
/// let mut out = [0.0f32; 3];
/// buf.pop_samples(&mut out, 0, 3).unwrap();
/// assert_eq!(out, [0.1, 0.2, 0.3]);
///
/// // Non-consuming: the block is still there.
/// assert_eq!(buf.data_len(), 3);
/// ```
pub struct SnapshotBuffer<T> {
    inner: Arc<SnapshotInner<T>>,
}

struct SnapshotInner<T> {
    state: Mutex<SnapshotState<T>>,
    listener: Mutex<Arc<dyn BufferListener>>,
}

struct SnapshotState<T> {
    meta: BufferMeta,
    data: Vec<T>,
    data_len: usize,
}

impl<T> Clone for SnapshotBuffer<T> {
    fn clone(&self) -> Self {
        SnapshotBuffer {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Copy + Default> SnapshotBuffer<T> {
    /// Creates an empty snapshot buffer with no backing storage yet.
    pub fn new(name: &str) -> Self {
        Self::with_capacity(name, 0)
    }

    /// Creates a snapshot buffer with pre-allocated storage for `samples`.
    pub fn with_capacity(name: &str, samples: usize) -> Self {
        SnapshotBuffer {
            inner: Arc::new(SnapshotInner {
                state: Mutex::new(SnapshotState {
                    meta: BufferMeta::new(name),
                    data: vec![T::default(); samples],
                    data_len: 0,
                }),
                listener: Mutex::new(Arc::new(NullListener)),
            }),
        }
    }

    /// Injects the change listener for this instance.
    pub fn set_listener(&self, listener: Arc<dyn BufferListener>) {
        *self.inner.listener.lock().unwrap() = listener;
    }

    /// Unique id of this buffer instance.
    pub fn uid(&self) -> Uuid {
        self.lock().meta.uid
    }

    /// Display name of this buffer.
    pub fn name(&self) -> String {
        self.lock().meta.name.clone()
    }

    /// Storage capacity in samples.
    pub fn capacity(&self) -> usize {
        self.lock().data.len()
    }

    /// Grows the backing storage to hold at least `samples`.
    ///
    /// Never shrinks. Growth allocates fresh storage and gives no guarantee
    /// about preserved content.
    pub fn ensure(&self, samples: usize) {
        let mut state = self.lock();
        if state.data.len() < samples {
            state.data = vec![T::default(); samples];
        }
    }

    /// Reallocates the backing storage to exactly the stored length.
    pub fn trim(&self) {
        let mut state = self.lock();
        if state.data.len() != state.data_len {
            let len = state.data_len;
            state.data.truncate(len);
            state.data.shrink_to_fit();
        }
    }

    /// Zeroes the backing storage. The stored length is unchanged.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.data.fill(T::default());
    }

    /// Adopts `samples` as the backing storage, storing all of it.
    pub fn assign(&self, samples: Vec<T>) -> Result<(), BufferError> {
        let len = samples.len();
        self.assign_len(samples, len)
    }

    /// Adopts `samples` as the backing storage with an explicit stored
    /// length, clamped to the storage size.
    pub fn assign_len(&self, samples: Vec<T>, data_len: usize) -> Result<(), BufferError> {
        let snapshot = {
            let mut state = self.lock();
            let data_len = data_len.min(samples.len());
            state.data = samples;
            state.data_len = data_len;
            state.meta.descriptor(data_len)
        };
        self.notify(&snapshot)
    }

    /// Discards the first `samples` stored samples, moving the rest down.
    pub fn shift_left(&self, samples: usize) -> Result<(), BufferError> {
        let snapshot = {
            let mut state = self.lock();
            if samples > state.data_len {
                return Err(BufferError::InsufficientData {
                    name: state.meta.name.clone(),
                    requested: samples,
                    stored: state.data_len,
                });
            }
            let remaining = state.data_len - samples;
            state.data.copy_within(samples..samples + remaining, 0);
            state.data_len = remaining;
            state.meta.descriptor(remaining)
        };
        self.notify(&snapshot)
    }

    /// Moves the stored samples up by `samples`, zero-filling the head.
    ///
    /// Grows the backing storage if needed, preserving the stored prefix.
    pub fn shift_right(&self, samples: usize) -> Result<(), BufferError> {
        let snapshot = {
            let mut state = self.lock();
            let new_len = state.data_len + samples;
            if state.data.len() < new_len {
                let mut grown = vec![T::default(); new_len];
                grown[..state.data_len].copy_from_slice(&state.data[..state.data_len]);
                state.data = grown;
            }
            let stored = state.data_len;
            state.data.copy_within(0..stored, samples);
            state.data[..samples].fill(T::default());
            state.data_len = new_len;
            state.meta.descriptor(new_len)
        };
        self.notify(&snapshot)
    }

    /// Copies another snapshot buffer's full identity and content.
    pub fn push_from(&self, source: &SnapshotBuffer<T>) -> Result<(), BufferError> {
        // Instances never share state, so taking both locks in sequence is
        // safe; the source is snapshotted first.
        let (proto, data) = source.content();
        let snapshot = {
            let mut state = self.lock();
            let len = data.len();
            if state.data.len() < len {
                state.data = vec![T::default(); len];
            }
            // The freeze check runs against the length stored before this
            // push, like any other reconfiguration.
            let old_len = state.data_len;
            state.meta.setup(
                old_len,
                proto.origin,
                proto.channel,
                proto.priority,
                proto.sample_rate,
                proto.channels,
                proto.last_timestamp,
            )?;
            state.data[..len].copy_from_slice(&data);
            state.data_len = len;
            state.meta.descriptor(len)
        };
        self.notify(&snapshot)
    }

    /// Returns the descriptor and a copy of the stored samples.
    pub(crate) fn content(&self) -> (BufferDescriptor, Vec<T>) {
        let state = self.lock();
        (
            state.meta.descriptor(state.data_len),
            state.data[..state.data_len].to_vec(),
        )
    }

    /// Copies `samples` in and sets the stored length without touching the
    /// timestamp. Used by the ring buffer's pop-into path, which re-derives
    /// the timestamp through `setup` beforehand.
    pub(crate) fn adopt_samples(&self, samples: &[T]) -> Result<(), BufferError> {
        let snapshot = {
            let mut state = self.lock();
            let len = samples.len();
            if state.data.len() < len {
                state.data = vec![T::default(); len];
            }
            state.data[..len].copy_from_slice(samples);
            state.data_len = len;
            state.meta.descriptor(len)
        };
        self.notify(&snapshot)
    }

    /// Forces the stored length, so a following `setup` may change format.
    pub(crate) fn reset_data_len(&self) -> Result<(), BufferError> {
        let snapshot = {
            let mut state = self.lock();
            state.data_len = 0;
            state.meta.descriptor(0)
        };
        self.notify(&snapshot)
    }

    fn lock(&self) -> MutexGuard<'_, SnapshotState<T>> {
        self.inner.state.lock().unwrap()
    }

    fn notify(&self, snapshot: &BufferDescriptor) -> Result<(), BufferError> {
        let listener = Arc::clone(&self.inner.listener.lock().unwrap());
        listener.on_buffer_changed(snapshot)
    }
}

impl SnapshotBuffer<f32> {
    /// Reinterprets `len` little-endian bytes starting at `bytes[offset]` as
    /// f32 samples and replaces the content with them.
    pub fn push_bytes(&self, bytes: &[u8], offset: usize, len: usize) -> Result<(), BufferError> {
        let samples = len / size_of::<f32>();
        let snapshot = {
            let mut state = self.lock();
            if state.data.len() < samples {
                state.data = vec![0.0; samples];
            }
            for (slot, chunk) in state.data[..samples]
                .iter_mut()
                .zip(bytes[offset..offset + samples * 4].chunks_exact(4))
            {
                *slot = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            }
            state.data_len = samples;
            state.meta.descriptor(samples)
        };
        self.notify(&snapshot)
    }
}

impl<T: Copy + Default + Send + Sync> AudioBuffer<T> for SnapshotBuffer<T> {
    fn descriptor(&self) -> BufferDescriptor {
        let state = self.lock();
        state.meta.descriptor(state.data_len)
    }

    fn data_len(&self) -> usize {
        self.lock().data_len
    }

    fn setup(
        &self,
        origin: ChannelId,
        channel: ChannelId,
        priority: i32,
        sample_rate: f32,
        channels: u32,
        last_timestamp: Option<DateTime<Utc>>,
    ) -> Result<(), BufferError> {
        let snapshot = {
            let mut state = self.lock();
            let data_len = state.data_len;
            state.meta.setup(
                data_len,
                origin,
                channel,
                priority,
                sample_rate,
                channels,
                last_timestamp,
            )?;
            state.meta.descriptor(data_len)
        };
        self.notify(&snapshot)
    }

    fn adjust_timestamp(&self, last_timestamp: Option<DateTime<Utc>>) -> Result<(), BufferError> {
        let Some(ts) = last_timestamp else {
            return Ok(());
        };
        let snapshot = {
            let mut state = self.lock();
            state.meta.last_timestamp = Some(ts);
            state.meta.descriptor(state.data_len)
        };
        self.notify(&snapshot)
    }

    fn samples_to_seconds(&self, samples: usize) -> f64 {
        self.lock().meta.samples_to_seconds(samples)
    }

    fn push_samples(
        &self,
        samples: &[T],
        offset: usize,
        len: usize,
        last_timestamp: Option<DateTime<Utc>>,
    ) -> Result<(), BufferError> {
        let snapshot = {
            let mut state = self.lock();
            if state.data.len() < len {
                state.data = vec![T::default(); len];
            }
            state.data[..len].copy_from_slice(&samples[offset..offset + len]);
            state.data_len = len;
            // Unconditional: pushing without a timestamp resets to unset.
            state.meta.last_timestamp = last_timestamp;
            state.meta.descriptor(len)
        };
        self.notify(&snapshot)
    }

    fn pop_samples(
        &self,
        out: &mut [T],
        offset: usize,
        len: usize,
    ) -> Result<Option<DateTime<Utc>>, BufferError> {
        let state = self.lock();
        if len > state.data_len {
            return Err(BufferError::InsufficientData {
                name: state.meta.name.clone(),
                requested: len,
                stored: state.data_len,
            });
        }
        out[offset..offset + len].copy_from_slice(&state.data[..len]);
        Ok(state.meta.last_timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_push_replaces_content() {
        let buf = SnapshotBuffer::<f32>::new("block");
        buf.push_samples(&[1.0, 2.0, 3.0, 4.0], 0, 4, Some(t0()))
            .unwrap();
        assert_eq!(buf.data_len(), 4);

        // A shorter push replaces wholesale, not appends.
        buf.push_samples(&[9.0, 8.0], 0, 2, None).unwrap();
        assert_eq!(buf.data_len(), 2);

        let mut out = [0.0f32; 2];
        buf.pop_samples(&mut out, 0, 2).unwrap();
        assert_eq!(out, [9.0, 8.0]);
    }

    #[test]
    fn test_push_with_offset() {
        let buf = SnapshotBuffer::<i16>::new("block");
        let source = [0, 0, 5, 6, 7];
        buf.push_samples(&source, 2, 3, None).unwrap();

        let mut out = [0i16; 3];
        buf.pop_samples(&mut out, 0, 3).unwrap();
        assert_eq!(out, [5, 6, 7]);
    }

    #[test]
    fn test_push_records_timestamp() {
        let buf = SnapshotBuffer::<f32>::new("block");
        buf.push_samples(&[1.0], 0, 1, Some(t0())).unwrap();

        let mut out = [0.0f32; 1];
        let ts = buf.pop_samples(&mut out, 0, 1).unwrap();
        assert_eq!(ts, Some(t0()));

        // Pushing without a timestamp resets it.
        buf.push_samples(&[1.0], 0, 1, None).unwrap();
        let ts = buf.pop_samples(&mut out, 0, 1).unwrap();
        assert_eq!(ts, None);
    }

    #[test]
    fn test_ensure_grows_from_zero() {
        let buf = SnapshotBuffer::<f32>::new("block");
        assert_eq!(buf.capacity(), 0);

        buf.push_samples(&[0.5; 10], 0, 10, None).unwrap();
        assert!(buf.capacity() >= 10);
        assert_eq!(buf.data_len(), 10);
    }

    #[test]
    fn test_ensure_never_shrinks() {
        let buf = SnapshotBuffer::<f32>::with_capacity("block", 64);
        buf.ensure(16);
        assert_eq!(buf.capacity(), 64);
        buf.ensure(128);
        assert_eq!(buf.capacity(), 128);
    }

    #[test]
    fn test_pop_is_strict() {
        let buf = SnapshotBuffer::<f32>::new("block");
        buf.push_samples(&[0.5; 10], 0, 10, None).unwrap();

        let mut out = [0.0f32; 11];
        let err = buf.pop_samples(&mut out, 0, 11).unwrap_err();
        assert!(matches!(
            err,
            BufferError::InsufficientData {
                requested: 11,
                stored: 10,
                ..
            }
        ));
    }

    #[test]
    fn test_pop_does_not_consume() {
        let buf = SnapshotBuffer::<f32>::new("block");
        buf.push_samples(&[1.0, 2.0], 0, 2, None).unwrap();

        let mut out = [0.0f32; 2];
        buf.pop_samples(&mut out, 0, 2).unwrap();
        buf.pop_samples(&mut out, 0, 2).unwrap();
        assert_eq!(buf.data_len(), 2);
    }

    #[test]
    fn test_push_from_copies_identity_and_content() {
        let source = SnapshotBuffer::<f32>::new("source");
        source
            .setup(ChannelId::EMPTY, ChannelId::EMPTY, 3, 48000.0, 2, Some(t0()))
            .unwrap();
        source.push_samples(&[1.0, 2.0, 3.0], 0, 3, Some(t0())).unwrap();

        let target = SnapshotBuffer::<f32>::new("target");
        target.push_from(&source).unwrap();

        let d = target.descriptor();
        assert_eq!(d.priority, 3);
        assert_eq!(d.sample_rate, 48000.0);
        assert_eq!(d.channels, 2);
        assert_eq!(d.data_len, 3);
        assert_eq!(d.last_timestamp, Some(t0()));
        // Identity of the instance itself is not copied.
        assert_ne!(d.uid, source.uid());

        let mut out = [0.0f32; 3];
        target.pop_samples(&mut out, 0, 3).unwrap();
        assert_eq!(out, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_trim_and_clear() {
        let buf = SnapshotBuffer::<f32>::with_capacity("block", 100);
        buf.push_samples(&[1.0, 2.0, 3.0], 0, 3, None).unwrap();

        buf.trim();
        assert_eq!(buf.capacity(), 3);
        assert_eq!(buf.data_len(), 3);

        buf.clear();
        assert_eq!(buf.data_len(), 3);
        let mut out = [9.0f32; 3];
        buf.pop_samples(&mut out, 0, 3).unwrap();
        assert_eq!(out, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_assign_takes_ownership() {
        let buf = SnapshotBuffer::<f32>::new("block");
        buf.assign(vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(buf.data_len(), 4);
        assert_eq!(buf.capacity(), 4);

        buf.assign_len(vec![5.0, 6.0, 7.0, 8.0], 2).unwrap();
        assert_eq!(buf.data_len(), 2);
        assert_eq!(buf.capacity(), 4);
    }

    #[test]
    fn test_assign_len_clamped_to_storage() {
        let buf = SnapshotBuffer::<f32>::new("block");
        buf.assign_len(vec![1.0, 2.0], 5).unwrap();
        assert_eq!(buf.data_len(), 2);

        // The stored length never exceeds the storage, so an oversized pop
        // is a strict shortage error, not an out-of-bounds read.
        let mut out = [0.0f32; 5];
        let err = buf.pop_samples(&mut out, 0, 5).unwrap_err();
        assert!(matches!(
            err,
            BufferError::InsufficientData {
                requested: 5,
                stored: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_shift_left() {
        let buf = SnapshotBuffer::<f32>::new("block");
        buf.push_samples(&[1.0, 2.0, 3.0, 4.0, 5.0], 0, 5, None)
            .unwrap();

        buf.shift_left(2).unwrap();
        assert_eq!(buf.data_len(), 3);

        let mut out = [0.0f32; 3];
        buf.pop_samples(&mut out, 0, 3).unwrap();
        assert_eq!(out, [3.0, 4.0, 5.0]);

        assert!(buf.shift_left(4).is_err());
    }

    #[test]
    fn test_shift_right_zero_fills_head() {
        let buf = SnapshotBuffer::<f32>::new("block");
        buf.push_samples(&[1.0, 2.0, 3.0], 0, 3, None).unwrap();

        buf.shift_right(2).unwrap();
        assert_eq!(buf.data_len(), 5);

        let mut out = [9.0f32; 5];
        buf.pop_samples(&mut out, 0, 5).unwrap();
        assert_eq!(out, [0.0, 0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_push_bytes_reinterprets_le_floats() {
        let buf = SnapshotBuffer::<f32>::new("block");

        let mut bytes = Vec::new();
        for sample in [0.25f32, -0.5, 1.0] {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        buf.push_bytes(&bytes, 0, bytes.len()).unwrap();

        assert_eq!(buf.data_len(), 3);
        let mut out = [0.0f32; 3];
        buf.pop_samples(&mut out, 0, 3).unwrap();
        assert_eq!(out, [0.25, -0.5, 1.0]);
    }

    #[test]
    fn test_setup_conflict_on_loaded_buffer() {
        let buf = SnapshotBuffer::<f32>::new("block");
        buf.setup(ChannelId::EMPTY, ChannelId::EMPTY, 0, 16000.0, 1, None)
            .unwrap();
        buf.push_samples(&[0.0; 8], 0, 8, None).unwrap();

        let err = buf
            .setup(ChannelId::EMPTY, ChannelId::EMPTY, 0, 48000.0, 1, None)
            .unwrap_err();
        assert!(matches!(err, BufferError::ConfigConflict { .. }));
    }

    #[test]
    fn test_adjust_timestamp_ignores_unset() {
        let buf = SnapshotBuffer::<f32>::new("block");
        buf.adjust_timestamp(Some(t0())).unwrap();
        assert_eq!(buf.descriptor().last_timestamp, Some(t0()));

        buf.adjust_timestamp(None).unwrap();
        assert_eq!(buf.descriptor().last_timestamp, Some(t0()));
    }

    #[test]
    fn test_inherit_copies_format() {
        let source = SnapshotBuffer::<f32>::new("source");
        source
            .setup(ChannelId::EMPTY, ChannelId::EMPTY, 9, 44100.0, 2, Some(t0()))
            .unwrap();

        let target = SnapshotBuffer::<f32>::new("target");
        target.inherit(&source.descriptor()).unwrap();

        let d = target.descriptor();
        assert_eq!(d.priority, 9);
        assert_eq!(d.sample_rate, 44100.0);
        assert_eq!(d.channels, 2);
        assert_eq!(d.last_timestamp, Some(t0()));
    }
}
