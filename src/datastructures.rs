use crate::error::{Result, TdError};
use bitvec::prelude::*;
use fxhash::FxHashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::ops::Index;

#[derive(Clone, Default)]
pub struct BitSet {
    cardinality: usize,
    bit_vec: BitVec,
}

impl Debug for BitSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let values: Vec<_> = self.iter().map(|i| i.to_string()).collect();
        write!(
            f,
            "BitSet {{ cardinality: {}, bit_vec: [{}]}}",
            self.cardinality,
            values.join(", "),
        )
    }
}

impl BitSet {
    #[inline]
    pub fn new(size: usize) -> Self {
        Self {
            cardinality: 0,
            bit_vec: bitvec![0; size],
        }
    }

    /// Sets `idx` and returns whether it was already set.
    #[inline]
    pub fn set_bit(&mut self, idx: usize) -> bool {
        if !self.bit_vec[idx] {
            self.bit_vec.set(idx, true);
            self.cardinality += 1;
            false
        } else {
            true
        }
    }

    #[inline]
    pub fn unset_bit(&mut self, idx: usize) -> bool {
        if self.bit_vec[idx] {
            self.bit_vec.set(idx, false);
            self.cardinality -= 1;
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn cardinality(&self) -> usize {
        self.cardinality
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bit_vec.len()
    }

    #[inline]
    pub fn at(&self, idx: usize) -> bool {
        idx < self.bit_vec.len() && self.bit_vec[idx]
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.bit_vec
            .iter()
            .enumerate()
            .filter(|(_, bit)| **bit)
            .map(|(i, _)| i)
    }
}

impl Index<usize> for BitSet {
    type Output = bool;

    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        self.bit_vec.index(index)
    }
}

/// Minimum-degree priority structure driven by the elimination engine.
///
/// Vertices are keyed by their id. `pop_min` removes and returns a vertex of
/// smallest degree, `reposition` moves a queued vertex to a new degree.
pub trait DegreeQueue {
    fn insert(&mut self, vertex: usize, degree: usize) -> Result<()>;
    fn pop_min(&mut self) -> Option<usize>;
    fn reposition(&mut self, vertex: usize, degree: usize) -> Result<()>;
    /// Removes `vertex` if it is queued, returning whether it was.
    fn remove(&mut self, vertex: usize) -> bool;
    fn contains(&self, vertex: usize) -> bool;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Copy, Debug)]
struct BucketNode {
    vertex: usize,
    prev: Option<usize>,
    next: Option<usize>,
    bucket: Option<usize>,
}

impl BucketNode {
    fn detached(vertex: usize) -> Self {
        Self {
            vertex,
            prev: None,
            next: None,
            bucket: None,
        }
    }
}

/// Array of degree buckets, each an intrusive doubly-linked list threaded
/// through an arena of nodes.
///
/// A vertex gets an arena slot on its first insert and keeps it, so the slot
/// is a stable handle and the arena grows with the number of queued vertices,
/// not with the largest id. Unlinking only touches the two adjacent slots and
/// the bucket head, so repositioning is O(1). The scan cursor only moves back
/// when a vertex is repositioned to a smaller degree, which bounds the total
/// scan work of a run by the total degree decrease.
#[derive(Clone, Debug)]
pub struct BucketQueue {
    heads: Vec<Option<usize>>,
    nodes: Vec<BucketNode>,
    slots: FxHashMap<usize, usize>,
    cursor: usize,
    len: usize,
}

impl BucketQueue {
    /// `vertex_count` is a size hint for the arena, `max_degree` the largest
    /// degree any queued vertex may ever reach.
    pub fn with_capacity(vertex_count: usize, max_degree: usize) -> Self {
        Self {
            heads: vec![None; max_degree + 1],
            nodes: Vec::with_capacity(vertex_count),
            slots: FxHashMap::with_capacity_and_hasher(vertex_count, Default::default()),
            cursor: 0,
            len: 0,
        }
    }

    pub fn max_degree(&self) -> usize {
        self.heads.len() - 1
    }

    /// Number of arena slots handed out so far.
    pub fn arena_len(&self) -> usize {
        self.nodes.len()
    }

    /// Vertices currently queued at `degree`, front first.
    pub fn bucket(&self, degree: usize) -> Vec<usize> {
        let mut members = vec![];
        let mut current = self.heads.get(degree).copied().flatten();
        while let Some(slot) = current {
            members.push(self.nodes[slot].vertex);
            current = self.nodes[slot].next;
        }
        members
    }

    pub fn degree_of(&self, vertex: usize) -> Option<usize> {
        self.slots
            .get(&vertex)
            .and_then(|slot| self.nodes[*slot].bucket)
    }

    fn check_capacity(&self, degree: usize) -> Result<()> {
        if degree >= self.heads.len() {
            return Err(TdError::BucketOverflow {
                degree,
                capacity: self.max_degree(),
            });
        }
        Ok(())
    }

    fn slot(&mut self, vertex: usize) -> usize {
        let nodes = &mut self.nodes;
        *self.slots.entry(vertex).or_insert_with(|| {
            nodes.push(BucketNode::detached(vertex));
            nodes.len() - 1
        })
    }

    fn push_front(&mut self, slot: usize, degree: usize) {
        let old_head = self.heads[degree];
        if let Some(head) = old_head {
            self.nodes[head].prev = Some(slot);
        }
        let node = &mut self.nodes[slot];
        node.prev = None;
        node.next = old_head;
        node.bucket = Some(degree);
        self.heads[degree] = Some(slot);
        if degree < self.cursor {
            self.cursor = degree;
        }
    }

    fn unlink(&mut self, slot: usize) -> bool {
        let node = self.nodes[slot];
        let bucket = match node.bucket {
            Some(bucket) => bucket,
            None => return false,
        };
        match node.prev {
            Some(prev) => self.nodes[prev].next = node.next,
            None => self.heads[bucket] = node.next,
        }
        if let Some(next) = node.next {
            self.nodes[next].prev = node.prev;
        }
        self.nodes[slot] = BucketNode::detached(node.vertex);
        true
    }
}

impl DegreeQueue for BucketQueue {
    fn insert(&mut self, vertex: usize, degree: usize) -> Result<()> {
        if self.contains(vertex) {
            return self.reposition(vertex, degree);
        }
        self.check_capacity(degree)?;
        let slot = self.slot(vertex);
        self.push_front(slot, degree);
        self.len += 1;
        Ok(())
    }

    fn pop_min(&mut self) -> Option<usize> {
        while self.cursor < self.heads.len() && self.heads[self.cursor].is_none() {
            self.cursor += 1;
        }
        let slot = self.heads.get(self.cursor).copied().flatten()?;
        self.unlink(slot);
        self.len -= 1;
        Some(self.nodes[slot].vertex)
    }

    fn reposition(&mut self, vertex: usize, degree: usize) -> Result<()> {
        self.check_capacity(degree)?;
        let slot = self.slots.get(&vertex).copied();
        if !slot.map_or(false, |slot| self.unlink(slot)) {
            return Err(TdError::InvariantViolation(format!(
                "vertex {} is not in any degree bucket",
                vertex
            )));
        }
        if let Some(slot) = slot {
            self.push_front(slot, degree);
        }
        Ok(())
    }

    fn remove(&mut self, vertex: usize) -> bool {
        let removed = match self.slots.get(&vertex).copied() {
            Some(slot) => self.unlink(slot),
            None => false,
        };
        if removed {
            self.len -= 1;
        }
        removed
    }

    fn contains(&self, vertex: usize) -> bool {
        self.degree_of(vertex).is_some()
    }

    fn len(&self) -> usize {
        self.len
    }
}

/// Binary min-heap over vertex degrees with an id-to-slot index.
///
/// Same contract as [`BucketQueue`] without an upper bound on degrees. Ties
/// are broken by heap position, not by recency.
#[derive(Clone, Debug, Default)]
pub struct BinaryQueue {
    heap: Vec<usize>,
    values: FxHashMap<usize, usize>,
    indices: FxHashMap<usize, usize>,
}

enum ChildType {
    First,
    Second,
}

impl BinaryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn peek_min(&self) -> Option<(usize, usize)> {
        let k = *self.heap.first()?;
        self.values.get(&k).map(|v| (k, *v))
    }

    fn value(&self, idx: usize) -> usize {
        self.values[&self.heap[idx]]
    }

    fn update(&mut self, k: usize, v: usize) {
        self.values.insert(k, v);
        let idx = self.indices[&k];
        self.up(idx);
        let idx = self.indices[&k];
        self.down(idx);
    }

    fn remove_at(&mut self, idx: usize) -> usize {
        let k = self.heap.swap_remove(idx);
        self.values.remove(&k);
        self.indices.remove(&k);
        if idx < self.heap.len() {
            let moved = self.heap[idx];
            self.indices.insert(moved, idx);
            self.up(idx);
            let idx = self.indices[&moved];
            self.down(idx);
        }
        k
    }

    fn up(&mut self, mut idx: usize) {
        let x = self.heap[idx];
        let priority = self.values[&x];
        while let Some(p) = self.parent(idx) {
            if priority < self.value(p) {
                self.heap[idx] = self.heap[p];
                self.indices.insert(self.heap[p], idx);
                idx = p;
            } else {
                break;
            }
        }
        self.heap[idx] = x;
        self.indices.insert(x, idx);
    }

    fn down(&mut self, idx: usize) {
        let mut current = idx;
        let value = self.heap[current];
        let priority = self.values[&value];

        while let Some(mut first) = self.child(current, ChildType::First) {
            if let Some(second) = self.child(current, ChildType::Second) {
                if self.value(second) < self.value(first) {
                    first = second;
                }
            }
            if self.value(first) < priority {
                self.heap[current] = self.heap[first];
                self.indices.insert(self.heap[current], current);
                current = first
            } else {
                break;
            }
        }
        self.heap[current] = value;
        self.indices.insert(value, current);
    }

    fn parent(&self, idx: usize) -> Option<usize> {
        if idx == 0 {
            None
        } else {
            Some((idx - 1) / 2)
        }
    }

    fn child(&self, idx: usize, child_type: ChildType) -> Option<usize> {
        let off = match child_type {
            ChildType::First => 1,
            ChildType::Second => 2,
        };
        let idx = idx * 2 + off;
        if idx >= self.heap.len() {
            None
        } else {
            Some(idx)
        }
    }
}

impl DegreeQueue for BinaryQueue {
    fn insert(&mut self, vertex: usize, degree: usize) -> Result<()> {
        match self.values.entry(vertex) {
            Entry::Occupied(_) => self.update(vertex, degree),
            Entry::Vacant(entry) => {
                entry.insert(degree);
                self.indices.insert(vertex, self.heap.len());
                self.heap.push(vertex);
                self.up(self.heap.len() - 1);
            }
        }
        Ok(())
    }

    fn pop_min(&mut self) -> Option<usize> {
        if self.heap.is_empty() {
            return None;
        }
        Some(self.remove_at(0))
    }

    fn reposition(&mut self, vertex: usize, degree: usize) -> Result<()> {
        if !self.values.contains_key(&vertex) {
            return Err(TdError::InvariantViolation(format!(
                "vertex {} is not in the degree heap",
                vertex
            )));
        }
        self.update(vertex, degree);
        Ok(())
    }

    fn remove(&mut self, vertex: usize) -> bool {
        match self.indices.get(&vertex).copied() {
            Some(idx) => {
                self.remove_at(idx);
                true
            }
            None => false,
        }
    }

    fn contains(&self, vertex: usize) -> bool {
        self.values.contains_key(&vertex)
    }

    fn len(&self) -> usize {
        self.heap.len()
    }
}
