//! Timestamped sample buffers for multi-channel audio pipelines.
//!
//! This crate provides the buffer layer between capture, mixing, and
//! playback stages. It offers two buffer kinds behind one trait:
//!
//! - [`SnapshotBuffer<T>`]: holds one discrete block, replaced wholesale on
//!   every write
//! - [`RingBuffer<T>`]: holds a continuous wraparound stream that grows or
//!   overwrites its oldest data when full
//!
//! Both kinds carry identity and format metadata (channel of origin, mixing
//! priority, sample rate, channel count, last-sample timestamp) alongside
//! the samples, exposed through [`AudioBuffer`] and snapshotted as a
//! [`BufferDescriptor`].
//!
//! # Snapshot Buffers
//!
//! [`SnapshotBuffer<T>`] models a block passing through a pipeline stage.
//! Reads copy without consuming and are strict about shortage:
//!
//! ```
//! use mixflow_buffer::{AudioBuffer, SnapshotBuffer};
//!
//! let block = SnapshotBuffer::<f32>::new("capture block");
//! block.push_samples(&[0.1, 0.2, 0.3], 0, 3, None).unwrap();
//!
//! let mut out = [0.0f32; 3];
//! block.pop_samples(&mut out, 0, 3).unwrap();
//! assert_eq!(out, [0.1, 0.2, 0.3]);
//! assert_eq!(block.data_len(), 3);
//! ```
//!
//! # Ring Buffers
//!
//! [`RingBuffer<T>`] decouples producer and consumer clocks. Pushes never
//! block: a growable ring expands, a fixed one silently overwrites its
//! oldest samples. Pops consume and zero-fill short reads, and the buffer
//! tracks stream time so consumers can purge by timestamp or rewind for
//! clock-drift correction:
//!
//! ```
//! use mixflow_buffer::{AudioBuffer, RingBuffer};
//!
//! let ring = RingBuffer::<f32>::with_capacity("mic feed", 1024, false);
//! ring.push_samples(&[0.5; 256], 0, 256, None).unwrap();
//!
//! let mut out = vec![0.0f32; 128];
//! ring.pop_samples(&mut out, 0, 128).unwrap();
//! assert_eq!(ring.len(), 128);
//! ```
//!
//! # Change Notification
//!
//! Every mutation fires the instance's injected [`BufferListener`] once with
//! a metadata snapshot. [`FlowLedger`] is a ready-made listener that records
//! per-buffer state histories for diagnostics.
//!
//! # Thread Safety
//!
//! Both buffer kinds are `Send + Sync` and can be shared between threads
//! using `Clone` (which shares the underlying buffer via `Arc`).

mod audio_buffer;
mod error;
mod flow;
mod meta;
mod ring_buffer;
mod snapshot_buffer;

pub use audio_buffer::AudioBuffer;
pub use error::BufferError;
pub use flow::{BufferListener, FlowEntry, FlowLedger, NullListener};
pub use meta::BufferDescriptor;
pub use ring_buffer::{INITIAL_CAPACITY, RingBuffer};
pub use snapshot_buffer::SnapshotBuffer;
