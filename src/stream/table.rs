//! Stream table: maps stream ids to `Stream` entries. Grounded on the
//! slab-plus-id-index storage pattern used for the connection's stream
//! store, generalised here to a plain map (insertion order is not required,
//! per spec §3).

use std::collections::HashMap;

use slab::Slab;

use super::Stream;
use crate::frame::StreamId;

#[derive(Debug)]
pub struct StreamTable<H> {
    slab: Slab<Stream<H>>,
    ids: HashMap<StreamId, usize>,
}

impl<H> StreamTable<H> {
    pub fn new() -> Self {
        StreamTable {
            slab: Slab::new(),
            ids: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.slab.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slab.is_empty()
    }

    pub fn contains(&self, id: StreamId) -> bool {
        self.ids.contains_key(&id)
    }

    pub fn get(&self, id: StreamId) -> Option<&Stream<H>> {
        self.ids.get(&id).map(|&key| &self.slab[key])
    }

    pub fn get_mut(&mut self, id: StreamId) -> Option<&mut Stream<H>> {
        self.ids.get(&id).copied().map(move |key| &mut self.slab[key])
    }

    pub fn insert(&mut self, stream: Stream<H>) {
        let id = stream.id;
        let key = self.slab.insert(stream);
        let prior = self.ids.insert(id, key);
        debug_assert!(prior.is_none(), "stream id reused while still live");
    }

    /// Remove and return a stream, if present.
    pub fn remove(&mut self, id: StreamId) -> Option<Stream<H>> {
        let key = self.ids.remove(&id)?;
        Some(self.slab.remove(key))
    }

    pub fn ids(&self) -> impl Iterator<Item = StreamId> + '_ {
        self.ids.keys().copied()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Stream<H>> {
        self.slab.iter_mut().map(|(_, s)| s)
    }
}

impl<H> Default for StreamTable<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_remove_round_trips() {
        let mut table: StreamTable<()> = StreamTable::new();
        let id = StreamId::new(1);
        table.insert(Stream::new(id, ()));

        assert!(table.contains(id));
        assert_eq!(table.len(), 1);

        let removed = table.remove(id).unwrap();
        assert_eq!(removed.id, id);
        assert!(!table.contains(id));
        assert!(table.is_empty());
    }

    #[test]
    fn missing_id_is_none() {
        let table: StreamTable<()> = StreamTable::new();
        assert!(table.get(StreamId::new(7)).is_none());
    }
}
