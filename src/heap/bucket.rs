// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Approximate bucket heap: buckets indexed by `floor(cost * conversion_factor)`, each a
//! singly-linked list. Popping picks a random item from the lowest non-empty bucket via a small
//! fixed-modulus random walk, which deliberately breaks symmetric ties between parallel paths
//! (spec §4.1).

use rand::Rng;

use super::{HeapEntry, HeapInterface};

/// Default conversion factor: buckets are ~1 picosecond wide when cost is dominated by delay.
pub const DEFAULT_CONVERSION_FACTOR: f64 = 1e12;

/// How far the random walk may travel down a bucket's list before settling; bounded so pop stays
/// O(1) amortized rather than O(bucket length).
const MAX_WALK: usize = 4;

#[derive(Debug, Clone)]
struct Node {
    entry: HeapEntry,
    next: Option<usize>,
}

/// A bucket-indexed approximate priority queue. Buckets below the current minimum are lazily
/// dropped rather than eagerly compacted, since the router only ever walks forward in cost.
#[derive(Debug, Clone)]
pub struct BucketHeap {
    conversion_factor: f64,
    /// Arena of list nodes; `buckets[b]` holds the head index of bucket `b`'s list.
    arena: Vec<Node>,
    buckets: Vec<Option<usize>>,
    /// Smallest bucket index known to possibly be non-empty; advanced monotonically by pops.
    min_bucket: usize,
    len: usize,
}

impl Default for BucketHeap {
    fn default() -> Self {
        Self::new(DEFAULT_CONVERSION_FACTOR)
    }
}

impl BucketHeap {
    /// Create an empty heap with the given conversion factor.
    pub fn new(conversion_factor: f64) -> Self {
        Self {
            conversion_factor,
            arena: Vec::new(),
            buckets: Vec::new(),
            min_bucket: 0,
            len: 0,
        }
    }

    fn bucket_index(&self, cost: f64) -> usize {
        (cost.max(0.0) * self.conversion_factor).floor() as usize
    }

    fn ensure_bucket(&mut self, index: usize) {
        if index >= self.buckets.len() {
            self.buckets.resize(index + 1, None);
        }
    }
}

impl HeapInterface for BucketHeap {
    fn push(&mut self, entry: HeapEntry) {
        let b = self.bucket_index(entry.total_cost);
        self.ensure_bucket(b);
        let node_idx = self.arena.len();
        self.arena.push(Node {
            entry,
            next: self.buckets[b],
        });
        self.buckets[b] = Some(node_idx);
        self.min_bucket = self.min_bucket.min(b);
        self.len += 1;
    }

    fn pop_min(&mut self) -> Option<HeapEntry> {
        while self.min_bucket < self.buckets.len() && self.buckets[self.min_bucket].is_none() {
            self.min_bucket += 1;
        }
        if self.min_bucket >= self.buckets.len() {
            return None;
        }
        let mut rng = rand::thread_rng();
        let steps = rng.gen_range(0..MAX_WALK);

        // Random walk down the bucket's list, removing the node we land on.
        let mut prev: Option<usize> = None;
        let mut cur = self.buckets[self.min_bucket].expect("bucket checked non-empty above");
        for _ in 0..steps {
            match self.arena[cur].next {
                Some(next) => {
                    prev = Some(cur);
                    cur = next;
                }
                None => break,
            }
        }

        let removed = self.arena[cur].entry;
        let next = self.arena[cur].next;
        match prev {
            Some(p) => self.arena[p].next = next,
            None => self.buckets[self.min_bucket] = next,
        }
        self.len -= 1;
        Some(removed)
    }

    fn build(&mut self) {
        // No ordering invariant to restore: bucket placement is already correct on push.
    }

    fn empty(&mut self) {
        self.arena.clear();
        self.buckets.clear();
        self.min_bucket = 0;
        self.len = 0;
    }

    fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn is_valid(&self) -> bool {
        self.buckets
            .iter()
            .enumerate()
            .filter_map(|(b, head)| head.map(|h| (b, h)))
            .all(|(b, mut cur)| loop {
                let node = &self.arena[cur];
                if self.bucket_index(node.entry.total_cost) != b {
                    break false;
                }
                match node.next {
                    Some(next) => cur = next,
                    None => break true,
                }
            })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::RrNodeId;

    fn entry(node: u32, cost: f64) -> HeapEntry {
        HeapEntry {
            node: RrNodeId::new(node as usize),
            total_cost: cost,
            backward_cost: cost,
            prev_node: None,
            prev_switch: None,
            r_upstream: 0.0,
        }
    }

    #[test]
    fn pop_returns_item_from_lowest_nonempty_bucket() {
        let mut heap = BucketHeap::new(1.0);
        heap.push(entry(1, 10.0));
        heap.push(entry(2, 1.0));
        heap.push(entry(3, 1.5));
        let popped = heap.pop_min().unwrap();
        // bucket(1.0) == bucket(1.5) == 1 with a conversion factor of 1.0, bucket(10.0) == 10.
        assert!(popped.node == RrNodeId::new(2) || popped.node == RrNodeId::new(3));
    }

    #[test]
    fn is_valid_after_interleaved_push_pop() {
        let mut heap = BucketHeap::default();
        for i in 0..20 {
            heap.push(entry(i, i as f64 * 1e-12));
        }
        heap.pop_min();
        heap.pop_min();
        assert!(heap.is_valid());
    }

    #[test]
    fn empty_heap_pop_returns_none() {
        let mut heap = BucketHeap::default();
        assert!(heap.pop_min().is_none());
    }
}
