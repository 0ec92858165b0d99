//! Path history shared between configurations.
//!
//! Every transition a simulation takes is recorded once in an arena together with the id of
//! the record before it. A configuration only keeps the id of its newest record, so a child
//! shares its parent's whole history and extending a path never copies it.

/// Index of a record in a [`PathArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathId(usize);

#[derive(Debug, Clone)]
struct Record<E> {
    parent: Option<PathId>,
    edge: E,
}

#[derive(Debug, Clone)]
pub struct PathArena<E> {
    records: Vec<Record<E>>,
}

impl<E> Default for PathArena<E> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
        }
    }
}

impl<E> PathArena<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `edge` after `parent` (`None` for the first move) and returns the new tip.
    pub fn extend(&mut self, parent: Option<PathId>, edge: E) -> PathId {
        self.records.push(Record { parent, edge });
        PathId(self.records.len() - 1)
    }

    /// Edges from the seed configuration up to and including `tip`, oldest first.
    pub fn trace(&self, tip: Option<PathId>) -> Vec<&E> {
        let mut edges = Vec::new();
        let mut cursor = tip;
        while let Some(id) = cursor {
            let record = &self.records[id.0];
            edges.push(&record.edge);
            cursor = record.parent;
        }
        edges.reverse();
        edges
    }

    /// Number of records ever taken, across all branches.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
