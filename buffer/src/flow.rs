//! Change-notification hook and the in-memory flow ledger.
//!
//! Every buffer mutator that changes identity or stored length invokes its
//! instance's [`BufferListener`] exactly once per logical change, after the
//! mutation and outside the instance's own lock. The listener is an injected
//! collaborator defaulting to [`NullListener`]; there is no process-wide
//! registry.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::BufferError;
use crate::meta::BufferDescriptor;

/// Receives a metadata snapshot after every buffer mutation.
///
/// Calls correspond to logically complete state changes, not micro-steps.
/// An error returned here is propagated to the caller of the mutating
/// operation; the mutation itself stays applied.
pub trait BufferListener: Send + Sync {
    fn on_buffer_changed(&self, snapshot: &BufferDescriptor) -> Result<(), BufferError>;
}

/// Listener that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullListener;

impl BufferListener for NullListener {
    fn on_buffer_changed(&self, _snapshot: &BufferDescriptor) -> Result<(), BufferError> {
        Ok(())
    }
}

/// One recorded buffer state.
#[derive(Debug, Clone, Serialize)]
pub struct FlowEntry {
    /// When the state was recorded.
    pub recorded_at: DateTime<Utc>,
    pub priority: i32,
    pub sample_rate: f32,
    pub channels: u32,
    pub data_len: usize,
    pub last_timestamp: Option<DateTime<Utc>>,
}

impl FlowEntry {
    fn from_snapshot(snapshot: &BufferDescriptor) -> Self {
        FlowEntry {
            recorded_at: Utc::now(),
            priority: snapshot.priority,
            sample_rate: snapshot.sample_rate,
            channels: snapshot.channels,
            data_len: snapshot.data_len,
            last_timestamp: snapshot.last_timestamp,
        }
    }

    fn same_state(&self, snapshot: &BufferDescriptor) -> bool {
        self.priority == snapshot.priority
            && (self.sample_rate - snapshot.sample_rate).abs() <= f32::EPSILON
            && self.channels == snapshot.channels
            && self.data_len == snapshot.data_len
    }
}

/// In-memory state history keyed by buffer id.
///
/// A strict listener: the first notification for a buffer must carry a
/// non-empty name, otherwise it fails with [`BufferError::UnnamedBuffer`].
/// The initial empty state (no history yet, zero stored samples) and
/// consecutive duplicate states are skipped, so the history only contains
/// transitions.
#[derive(Debug, Default)]
pub struct FlowLedger {
    state: Mutex<LedgerState>,
}

#[derive(Debug, Default)]
struct LedgerState {
    names: HashMap<Uuid, String>,
    flows: HashMap<Uuid, Vec<FlowEntry>>,
}

#[derive(Serialize)]
struct LedgerExport<'a> {
    names: &'a HashMap<Uuid, String>,
    flows: &'a HashMap<Uuid, Vec<FlowEntry>>,
}

impl FlowLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded name of a buffer, if it ever notified.
    pub fn buffer_name(&self, uid: Uuid) -> Option<String> {
        let state = self.state.lock().unwrap();
        state.names.get(&uid).cloned()
    }

    /// Returns the recorded state history of a buffer.
    pub fn history(&self, uid: Uuid) -> Vec<FlowEntry> {
        let state = self.state.lock().unwrap();
        state.flows.get(&uid).cloned().unwrap_or_default()
    }

    /// Number of buffers that have registered with the ledger.
    pub fn buffer_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.flows.len()
    }

    /// Serializes the full ledger as JSON.
    pub fn export_json<W: Write>(&self, writer: W) -> serde_json::Result<()> {
        let state = self.state.lock().unwrap();
        serde_json::to_writer(
            writer,
            &LedgerExport {
                names: &state.names,
                flows: &state.flows,
            },
        )
    }
}

impl BufferListener for FlowLedger {
    fn on_buffer_changed(&self, snapshot: &BufferDescriptor) -> Result<(), BufferError> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;

        if !state.flows.contains_key(&snapshot.uid) {
            if snapshot.name.is_empty() {
                return Err(BufferError::UnnamedBuffer { uid: snapshot.uid });
            }
            tracing::trace!(uid = %snapshot.uid, name = %snapshot.name, "registering buffer flow");
            state.names.insert(snapshot.uid, snapshot.name.clone());
            state.flows.insert(snapshot.uid, Vec::new());
        }

        let flow = state.flows.entry(snapshot.uid).or_default();

        // Skip the initial empty state and consecutive duplicates.
        if flow.is_empty() && snapshot.data_len == 0 {
            return Ok(());
        }
        if let Some(last) = flow.last() {
            if last.same_state(snapshot) {
                return Ok(());
            }
        }

        flow.push(FlowEntry::from_snapshot(snapshot));
        Ok(())
    }
}
