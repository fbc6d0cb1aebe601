//! Growable overwriting ring buffer with timestamp-aware consumption.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use mixflow_channel::ChannelId;
use uuid::Uuid;

use crate::audio_buffer::AudioBuffer;
use crate::error::BufferError;
use crate::flow::{BufferListener, NullListener};
use crate::meta::{BufferDescriptor, BufferMeta, seconds_to_delta};
use crate::snapshot_buffer::SnapshotBuffer;

/// Default storage capacity in samples.
pub const INITIAL_CAPACITY: usize = 65536 * 2;

/// A thread-safe circular sample store with overwrite backpressure.
///
/// Producers append continuously; consumers read or discard from the oldest
/// end. No operation blocks: a push either grows the storage (when
/// growable), silently overwrites the oldest unread samples, or fails with
/// [`BufferError::Overflow`] on a non-growable instance whose capacity is
/// smaller than the push itself. A pop never fails on shortage; missing
/// samples are zero-filled.
///
/// All cursor and storage mutations are serialized by one per-instance
/// lock. A separate atomic occupancy counter supports an approximate
/// lock-free [`len`](RingBuffer::len) for reporting.
///
/// # Example
///
/// ```
/// use mixflow_buffer::{AudioBuffer, RingBuffer};
///
/// let ring = RingBuffer::<f32>::with_capacity("mix feed", 4, false);
/// ring.push_samples(&[1.0, 2.0, 3.0], 0, 3, None).unwrap();
/// ring.push_samples(&[4.0, 5.0, 6.0], 0, 3, None).unwrap();
///
/// // 6 samples into capacity 4: the oldest were overwritten.
/// assert_eq!(ring.len(), 4);
/// ```
pub struct RingBuffer<T> {
    inner: Arc<RingInner<T>>,
}

struct RingInner<T> {
    state: Mutex<RingState<T>>,
    // Approximate occupancy for lock-free reads; authoritative updates
    // happen while the state lock is held.
    stored: AtomicUsize,
    listener: Mutex<Arc<dyn BufferListener>>,
}

struct RingState<T> {
    meta: BufferMeta,
    data: Vec<T>,
    low: usize,
    high: usize,
    growable: bool,
    limit: usize,
}

impl<T> Clone for RingBuffer<T> {
    fn clone(&self) -> Self {
        RingBuffer {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Copy + Default + Send + Sync> RingBuffer<T> {
    /// Creates a non-growable ring with the default capacity.
    pub fn new(name: &str) -> Self {
        Self::with_capacity(name, INITIAL_CAPACITY, false)
    }

    /// Creates a ring with the given capacity and growth policy.
    pub fn with_capacity(name: &str, capacity: usize, growable: bool) -> Self {
        RingBuffer {
            inner: Arc::new(RingInner {
                state: Mutex::new(RingState {
                    meta: BufferMeta::new(name),
                    data: vec![T::default(); capacity],
                    low: 0,
                    high: 0,
                    growable,
                    limit: 0,
                }),
                stored: AtomicUsize::new(0),
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

    /// Approximate number of stored samples, read without locking.
    pub fn len(&self) -> usize {
        self.inner.stored.load(Ordering::Relaxed)
    }

    /// Returns true if no samples are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Storage capacity in samples.
    pub fn capacity(&self) -> usize {
        self.lock().data.len()
    }

    /// Free space in samples.
    pub fn free_space(&self) -> usize {
        let state = self.lock();
        state
            .data
            .len()
            .saturating_sub(self.inner.stored.load(Ordering::Relaxed))
    }

    /// Whether the storage may still grow.
    pub fn is_growable(&self) -> bool {
        self.lock().growable
    }

    /// The hard capacity limit; 0 means unlimited.
    pub fn limit(&self) -> usize {
        self.lock().limit
    }

    /// Sets the hard capacity limit and resizes the storage to it.
    ///
    /// Destructive: all stored samples are discarded first. A limit of 0
    /// clears the limit and leaves the storage allocation as is.
    pub fn set_limit(&self, limit: usize) -> Result<(), BufferError> {
        let snapshot = {
            let mut state = self.lock();
            state.limit = limit;
            state.low = 0;
            state.high = 0;
            self.inner.stored.store(0, Ordering::Relaxed);
            if limit > 0 {
                tracing::debug!(name = %state.meta.name, limit, "relimiting ring storage");
                state.data = vec![T::default(); limit];
            }
            state.meta.descriptor(0)
        };
        self.notify(&snapshot)
    }

    /// Discards all stored samples. The storage allocation is unchanged.
    pub fn flush(&self) -> Result<(), BufferError> {
        let snapshot = {
            let mut state = self.lock();
            state.low = 0;
            state.high = 0;
            self.inner.stored.store(0, Ordering::Relaxed);
            state.meta.descriptor(0)
        };
        self.notify(&snapshot)
    }

    /// Zeroes the backing storage. Cursors and occupancy are unchanged.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.data.fill(T::default());
    }

    /// Discards the oldest `len` samples without copying them out.
    pub fn purge(&self, len: usize) -> Result<(), BufferError> {
        self.pop_internal(None, 0, len).map(|_| ())
    }

    /// Discards everything older than `target`, keeping the span between
    /// `target` and the last-sample timestamp.
    ///
    /// Idempotent for a repeated identical target. Fails with
    /// [`BufferError::ConfigConflict`] when sample rate or channels are
    /// unset, since the cut-off cannot be converted to a sample count.
    pub fn purge_to_timestamp(&self, target: DateTime<Utc>) -> Result<(), BufferError> {
        let purge_len = {
            let state = self.lock();
            if state.meta.sample_rate < f32::EPSILON || state.meta.channels < 1 {
                return Err(BufferError::ConfigConflict {
                    name: state.meta.name.clone(),
                    detail: "purge-to-timestamp requires a configured sample rate and channels"
                        .into(),
                });
            }

            let remain_seconds = match state.meta.last_timestamp {
                Some(last) => last.signed_duration_since(target).as_seconds_f64().max(0.0),
                None => 0.0,
            };
            let remain_samples = (remain_seconds
                * state.meta.sample_rate as f64
                * state.meta.channels as f64) as usize;

            let stored = self.inner.stored.load(Ordering::Relaxed);
            if remain_samples >= stored {
                return Ok(());
            }
            stored - remain_samples
        };
        self.purge(purge_len)
    }

    /// Repositions the read cursor for clock-drift correction, without
    /// copying any data.
    ///
    /// A non-negative `samples` rewinds: the read cursor moves back by up to
    /// `samples`, bounded one sample short of the write cursor, and that
    /// many samples become readable again. A negative `samples` skips
    /// forward by up to two thirds of the stored data, a damping that keeps
    /// one correction from draining the buffer. Returns the signed number of
    /// samples actually moved.
    ///
    /// The rewind bound is geometric, not historical: on a wrapped ring the
    /// gap between the cursors can exceed the free space, so a large rewind
    /// may push occupancy past capacity and the next pop then fails with
    /// [`BufferError::InternalInvariant`]. Rewind only by amounts known to
    /// have been consumed recently.
    pub fn rewind_forward(&self, samples: i64) -> Result<i64, BufferError> {
        let (snapshot, moved) = {
            let mut state = self.lock();
            let capacity = state.data.len();
            let stored = self.inner.stored.load(Ordering::Relaxed);

            if samples >= 0 {
                let can_rewind = state.low + capacity - state.high;
                let moved = (samples as usize).min(can_rewind.saturating_sub(1));

                state.low = if state.low >= moved {
                    state.low - moved
                } else {
                    state.low + capacity - moved
                };
                let new_stored = stored + moved;
                self.inner.stored.store(new_stored, Ordering::Relaxed);
                (state.meta.descriptor(new_stored), moved as i64)
            } else {
                let moved = ((stored * 2) / 3).min(samples.unsigned_abs() as usize);
                state.low += moved;
                if state.low >= capacity {
                    state.low -= capacity;
                }
                let new_stored = stored - moved;
                self.inner.stored.store(new_stored, Ordering::Relaxed);
                (state.meta.descriptor(new_stored), -(moved as i64))
            }
        };
        self.notify(&snapshot)?;
        Ok(moved)
    }

    /// Pops `samples` into a snapshot buffer, re-deriving its identity from
    /// this ring and the read-window timestamp.
    ///
    /// The destination's stored length becomes `samples` even when the ring
    /// held fewer; the tail is zero-filled like any short ring read.
    pub fn pop_into(&self, target: &SnapshotBuffer<T>, samples: usize) -> Result<(), BufferError> {
        let mut staging = vec![T::default(); samples];
        let window_ts = self.pop_internal(Some(&mut staging), 0, samples)?;
        let proto = self.descriptor();

        target.reset_data_len()?;
        target.setup(
            proto.origin,
            proto.channel,
            proto.priority,
            proto.sample_rate,
            proto.channels,
            window_ts,
        )?;
        target.adopt_samples(&staging)
    }

    /// Appends a snapshot buffer's content with its last-sample timestamp.
    pub fn push_from(&self, source: &SnapshotBuffer<T>) -> Result<(), BufferError> {
        let (proto, data) = source.content();
        self.push_samples(&data, 0, data.len(), proto.last_timestamp)
    }

    /// Pop and purge share one walk; purging skips the copy-out.
    fn pop_internal(
        &self,
        out: Option<&mut [T]>,
        offset: usize,
        len: usize,
    ) -> Result<Option<DateTime<Utc>>, BufferError> {
        let (snapshot, window_ts) = {
            let mut state = self.lock();
            let capacity = state.data.len();
            let stored = self.inner.stored.load(Ordering::Relaxed);

            if stored > capacity {
                return Err(BufferError::InternalInvariant {
                    name: state.meta.name.clone(),
                    stored,
                    capacity,
                });
            }

            // End of the read window, derived from the occupancy's time
            // span regardless of how much data is actually available.
            let window_ts = state
                .meta
                .first_timestamp(stored)
                .map(|first| first + seconds_to_delta(state.meta.samples_to_seconds(len)));

            let copy_len = len.min(stored);

            if let Some(out) = out {
                let first = (capacity - state.low).min(copy_len);
                out[offset..offset + first]
                    .copy_from_slice(&state.data[state.low..state.low + first]);
                out[offset + first..offset + copy_len]
                    .copy_from_slice(&state.data[..copy_len - first]);

                // Short reads are zero-padded, never an error.
                out[offset + copy_len..offset + len].fill(T::default());
            }

            if capacity - state.low >= copy_len {
                state.low += copy_len;
                if state.low == capacity {
                    state.low = 0;
                }
            } else {
                state.low = copy_len - (capacity - state.low);
            }

            let new_stored = stored - copy_len;
            self.inner.stored.store(new_stored, Ordering::Relaxed);
            (state.meta.descriptor(new_stored), window_ts)
        };
        self.notify(&snapshot)?;
        Ok(window_ts)
    }

    /// Reallocates the storage to `new_capacity`, linearizing the stored
    /// samples at the front. When the new capacity is smaller than the
    /// occupancy, the oldest overshoot is dropped first.
    fn grow_locked(&self, state: &mut RingState<T>, new_capacity: usize) {
        let capacity = state.data.len();
        let stored = self.inner.stored.load(Ordering::Relaxed);
        let (keep, skip) = if stored > new_capacity {
            (new_capacity, stored - new_capacity)
        } else {
            (stored, 0)
        };

        let mut grown = vec![T::default(); new_capacity];
        if keep > 0 {
            let low = (state.low + skip) % capacity;
            let first = (capacity - low).min(keep);
            grown[..first].copy_from_slice(&state.data[low..low + first]);
            grown[first..keep].copy_from_slice(&state.data[..keep - first]);
        }

        state.data = grown;
        state.low = 0;
        state.high = if keep == new_capacity { 0 } else { keep };
        if skip > 0 {
            self.inner.stored.store(keep, Ordering::Relaxed);
        }
        tracing::trace!(name = %state.meta.name, capacity = new_capacity, "resized ring storage");
    }

    fn lock(&self) -> MutexGuard<'_, RingState<T>> {
        self.inner.state.lock().unwrap()
    }

    fn notify(&self, snapshot: &BufferDescriptor) -> Result<(), BufferError> {
        let listener = Arc::clone(&self.inner.listener.lock().unwrap());
        listener.on_buffer_changed(snapshot)
    }
}

impl<T: Copy + Default + Send + Sync> AudioBuffer<T> for RingBuffer<T> {
    fn descriptor(&self) -> BufferDescriptor {
        let state = self.lock();
        state
            .meta
            .descriptor(self.inner.stored.load(Ordering::Relaxed))
    }

    fn data_len(&self) -> usize {
        self.len()
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
            let stored = self.inner.stored.load(Ordering::Relaxed);
            state.meta.setup(
                stored,
                origin,
                channel,
                priority,
                sample_rate,
                channels,
                last_timestamp,
            )?;
            state.meta.descriptor(stored)
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
            state
                .meta
                .descriptor(self.inner.stored.load(Ordering::Relaxed))
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
            // Unconditional: a push without a timestamp resets to unset.
            state.meta.last_timestamp = last_timestamp;

            if len > state.data.len() {
                if !state.growable {
                    return Err(BufferError::Overflow {
                        name: state.meta.name.clone(),
                        requested: len,
                        capacity: state.data.len(),
                    });
                }
                self.grow_locked(&mut state, len);
            }

            let capacity = state.data.len();
            let stored = self.inner.stored.load(Ordering::Relaxed);
            let free = capacity.saturating_sub(stored);

            if len > free {
                if state.limit > 0 && capacity >= state.limit && state.growable {
                    // Permanent: the hard limit has been reached.
                    state.growable = false;
                    tracing::debug!(
                        name = %state.meta.name,
                        capacity,
                        limit = state.limit,
                        "ring reached its hard limit, growth latched off"
                    );
                }

                if state.growable {
                    let target = (capacity * 2).max(stored + len);
                    self.grow_locked(&mut state, target);
                } else {
                    // Silent overwrite: advance the read cursor past the
                    // oldest unread samples to make room.
                    let advance = len - free + 1;
                    state.low = (state.low + advance) % capacity;
                }
            }

            let capacity = state.data.len();
            let high = state.high;
            let space_to_end = capacity - high;
            if space_to_end >= len {
                state.data[high..high + len].copy_from_slice(&samples[offset..offset + len]);
                state.high = high + len;
                if state.high == capacity {
                    state.high = 0;
                }
            } else {
                let first = space_to_end;
                state.data[high..].copy_from_slice(&samples[offset..offset + first]);
                let second = len - first;
                state.data[..second].copy_from_slice(&samples[offset + first..offset + len]);
                state.high = second;
            }

            let mut new_stored = self.inner.stored.load(Ordering::Relaxed) + len;
            if !state.growable {
                new_stored = new_stored.min(capacity);
            }
            if state.limit > 0 {
                new_stored = new_stored.min(state.limit);
            }
            self.inner.stored.store(new_stored, Ordering::Relaxed);
            state.meta.descriptor(new_stored)
        };
        self.notify(&snapshot)
    }

    fn pop_samples(
        &self,
        out: &mut [T],
        offset: usize,
        len: usize,
    ) -> Result<Option<DateTime<Utc>>, BufferError> {
        self.pop_internal(Some(out), offset, len)
    }
}
