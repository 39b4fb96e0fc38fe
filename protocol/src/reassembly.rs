//! Reassembly of command responses split over several datagrams
//!
//! Long responses (player and ban listings) arrive as numbered fragments that
//! share the sequence number of the command they answer. Fragments may arrive
//! in any order. An entry is never merged with data from a different response:
//! when a fragment disagrees with the cached entry on the declared total, or the
//! cached entry is already complete, the old entry is dropped and a fresh one
//! started.

use log::debug;
use std::collections::HashMap;

#[derive(Debug)]
struct Entry {
    received: usize,
    parts: Vec<Option<Vec<u8>>>,
}

impl Entry {
    fn new(total: usize) -> Self {
        Self {
            received: 0,
            parts: vec![None; total],
        }
    }

    fn is_complete(&self) -> bool {
        self.received == self.parts.len()
    }

    fn assemble(&self) -> String {
        let bytes: Vec<u8> = self.parts.iter().flatten().flatten().copied().collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

/// Per-sequence buffers of partially received responses.
#[derive(Debug, Default)]
pub struct ReassemblyCache {
    entries: HashMap<u8, Entry>,
}

impl ReassemblyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores one fragment and returns the full response once every index
    /// of the entry has arrived.
    ///
    /// Fragments are concatenated as bytes before text decoding, so a
    /// multi-byte character split across two datagrams survives intact.
    pub fn insert(&mut self, sequence: u8, total: u8, index: u8, fragment: &[u8]) -> Option<String> {
        if total == 0 || index >= total {
            debug!(
                "Dropping fragment {}/{} for sequence {}: index out of range",
                index, total, sequence
            );
            return None;
        }

        let total = total as usize;
        let stale = match self.entries.get(&sequence) {
            Some(entry) => entry.parts.len() != total || entry.is_complete(),
            None => true,
        };

        if stale {
            if self.entries.contains_key(&sequence) {
                debug!("Discarding stale response buffer for sequence {}", sequence);
            }
            self.entries.insert(sequence, Entry::new(total));
        }

        let entry = self.entries.get_mut(&sequence)?;
        let slot = &mut entry.parts[index as usize];
        if slot.is_none() {
            entry.received += 1;
        }
        *slot = Some(fragment.to_vec());

        if entry.is_complete() {
            Some(entry.assemble())
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
