//! Frame arena and lookup indices guarded by the registry state lock.

use crate::frame::record::{FrameRecord, RecordKey};
use crate::frame::Frame;
use crate::registry::{BrowserHost, FrameLookup};
use crate::types::{FrameId, FrameTreeNodeId};
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// Everything protected by the state lock.
///
/// `records` owns every record; the two maps only hold keys into it.
#[derive(Default)]
pub(crate) struct RegistryState {
    pub browser: Option<Arc<dyn BrowserHost>>,
    pub main_frame: Option<Arc<Frame>>,
    records: HashMap<RecordKey, FrameRecord>,
    by_frame_id: HashMap<FrameId, RecordKey>,
    by_node_id: HashMap<FrameTreeNodeId, RecordKey>,
    temporaries: Vec<Weak<Frame>>,
    next_key: u64,
}

impl RegistryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a record and index it by frame id and node id.
    pub fn insert(&mut self, record: FrameRecord) -> RecordKey {
        let key = RecordKey(self.next_key);
        self.next_key += 1;
        self.by_frame_id.insert(record.frame_id, key);
        self.records.insert(key, record);
        self.refresh_node_index(key);
        key
    }

    pub fn key_for_id(&self, frame_id: FrameId) -> Option<RecordKey> {
        self.by_frame_id.get(&frame_id).copied()
    }

    pub fn get(&self, key: RecordKey) -> Option<&FrameRecord> {
        self.records.get(&key)
    }

    pub fn get_mut(&mut self, key: RecordKey) -> Option<&mut FrameRecord> {
        self.records.get_mut(&key)
    }

    pub fn find_by_id(&self, frame_id: FrameId) -> Option<&FrameRecord> {
        self.key_for_id(frame_id).and_then(|key| self.records.get(&key))
    }

    /// Point the node index at `key` unless that would replace a settled
    /// entry with a speculative record.
    pub fn refresh_node_index(&mut self, key: RecordKey) {
        let Some(record) = self.records.get(&key) else {
            return;
        };
        let node_id = record.node_id;
        match self.by_node_id.get(&node_id) {
            Some(existing) if *existing == key => {}
            Some(_) if record.is_speculative => {}
            _ => {
                self.by_node_id.insert(node_id, key);
            }
        }
    }

    /// Remove the record for `frame_id` from every index and the arena.
    pub fn remove(&mut self, frame_id: FrameId) -> Option<FrameRecord> {
        let key = self.by_frame_id.remove(&frame_id)?;
        let record = self.records.remove(&key)?;
        // A newer host for the same node may already own the entry.
        if self.by_node_id.get(&record.node_id) == Some(&key) {
            self.by_node_id.remove(&record.node_id);
            if let Some(successor) = self.newest_for_node(record.node_id) {
                self.by_node_id.insert(record.node_id, successor);
            }
        }
        Some(record)
    }

    /// Newest remaining record for a node, settled records first
    fn newest_for_node(&self, node_id: FrameTreeNodeId) -> Option<RecordKey> {
        self.records
            .iter()
            .filter(|(_, r)| r.node_id == node_id)
            .max_by_key(|(key, r)| (!r.is_speculative, **key))
            .map(|(key, _)| *key)
    }

    /// Clear the indices and hand back every record.
    pub fn drain(&mut self) -> Vec<FrameRecord> {
        self.by_frame_id.clear();
        self.by_node_id.clear();
        let mut records: Vec<(RecordKey, FrameRecord)> = self.records.drain().collect();
        records.sort_by_key(|(key, _)| *key);
        records.into_iter().map(|(_, record)| record).collect()
    }

    /// Resolve a node id through the node index.
    pub fn node_lookup(&self, node_id: FrameTreeNodeId) -> (FrameLookup, bool) {
        match self.by_node_id.get(&node_id).and_then(|key| self.records.get(key)) {
            Some(record) => (Self::resolve(record), record.is_speculative),
            None => (FrameLookup::Missing, false),
        }
    }

    /// Speculative record for a node, if any, in creation order.
    pub fn speculative_for_node(&self, node_id: FrameTreeNodeId) -> Option<&FrameRecord> {
        self.records
            .iter()
            .filter(|(_, r)| r.node_id == node_id && r.is_speculative)
            .max_by_key(|(key, _)| **key)
            .map(|(_, r)| r)
    }

    /// Record owning the given handle
    pub fn record_holding(&self, frame: &Arc<Frame>) -> Option<&FrameRecord> {
        self.records.values().find(|r| r.holds(frame))
    }

    pub fn is_main_frame(&self, frame: &Arc<Frame>) -> bool {
        self.main_frame
            .as_ref()
            .map(|main| Arc::ptr_eq(main, frame))
            .unwrap_or(false)
    }

    pub fn records(&self) -> impl Iterator<Item = &FrameRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn indexed_ids(&self) -> impl Iterator<Item = &FrameId> {
        self.by_frame_id.keys()
    }

    pub fn current_main_frame_count(&self) -> usize {
        self.records.values().filter(|r| r.is_current_main_frame()).count()
    }

    pub fn push_temporary(&mut self, frame: &Arc<Frame>) {
        self.temporaries.retain(|weak| weak.strong_count() > 0);
        self.temporaries.push(Arc::downgrade(frame));
    }

    pub fn take_temporaries(&mut self) -> Vec<Weak<Frame>> {
        std::mem::take(&mut self.temporaries)
    }

    /// Resolve a record to a lookup result without speculative redirection.
    pub fn resolve(record: &FrameRecord) -> FrameLookup {
        if record.is_guest_view {
            return FrameLookup::GuestView;
        }
        match &record.frame {
            Some(frame) => FrameLookup::Found(frame.clone()),
            None => FrameLookup::Missing,
        }
    }
}
