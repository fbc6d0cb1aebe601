//! Error types for buffer operations.

use thiserror::Error;
use uuid::Uuid;

/// Errors returned by buffer operations.
///
/// All failures are synchronous and surfaced to the immediate caller;
/// nothing is retried internally. Every mutation is atomic under its
/// instance lock: it is either fully applied or not attempted.
#[derive(Debug, Error)]
pub enum BufferError {
    /// Configuration change rejected by a metadata invariant.
    #[error("configuration conflict on buffer '{name}': {detail}")]
    ConfigConflict { name: String, detail: String },

    /// Push exceeds the capacity of a non-growable ring buffer.
    #[error("push of {requested} samples overflows ring buffer '{name}' with capacity {capacity}")]
    Overflow {
        name: String,
        requested: usize,
        capacity: usize,
    },

    /// Pop requested more samples than a snapshot buffer stores.
    ///
    /// Raised only by [`SnapshotBuffer`](crate::SnapshotBuffer); the ring
    /// buffer zero-fills short reads instead.
    #[error("cannot pop {requested} samples from snapshot buffer '{name}' storing {stored}")]
    InsufficientData {
        name: String,
        requested: usize,
        stored: usize,
    },

    /// First notification for a buffer carried an empty name.
    #[error("cannot register flow for unnamed buffer {uid}")]
    UnnamedBuffer { uid: Uuid },

    /// Ring occupancy exceeded physical capacity. Always fatal.
    #[error("ring buffer '{name}' stores {stored} samples but capacity is {capacity}")]
    InternalInvariant {
        name: String,
        stored: usize,
        capacity: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_context() {
        let err = BufferError::Overflow {
            name: "mic0".into(),
            requested: 512,
            capacity: 256,
        };
        let text = format!("{}", err);
        assert!(text.contains("mic0"));
        assert!(text.contains("512"));
        assert!(text.contains("256"));
    }
}
