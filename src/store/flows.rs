//! Bounded, time-ordered flow log with de-duplication.
//!
//! Flows arrive in small overlapping batches (at-least-once delivery). Each
//! batch is de-duplicated by `FlowKey`, sorted, and merged into the tail of the
//! stored run; the oldest entries are evicted beyond `capacity`.

use crate::domain::{Flow, FlowKey};

use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct Entry {
    key: FlowKey,
    flow: Arc<Flow>,
}

#[derive(Debug)]
pub struct FlowRegistry {
    entries: Vec<Entry>,
    seen: HashSet<FlowKey>,
    capacity: usize,
}

impl FlowRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            seen: HashSet::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Arc<Flow>> + ExactSizeIterator {
        self.entries.iter().map(|e| &e.flow)
    }

    pub fn contains(&self, key: &FlowKey) -> bool {
        self.seen.contains(key)
    }

    /// Key of the oldest flow held.
    pub fn first_key(&self) -> Option<&FlowKey> {
        self.entries.first().map(|e| &e.key)
    }

    /// Drop every flow ordered before `key`. Returns how many went.
    pub fn evict_before(&mut self, key: &FlowKey) -> usize {
        let cut = self.entries.partition_point(|e| &e.key < key);
        for entry in self.entries.drain(..cut) {
            self.seen.remove(&entry.key);
        }
        cut
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.seen.clear();
    }

    /// Replace the whole log. Without `sort` the delivery order is kept.
    pub fn set_flows(&mut self, flows: impl IntoIterator<Item = Arc<Flow>>, sort: bool) {
        self.clear();
        for flow in flows {
            let key = flow.key();
            if self.seen.insert(key.clone()) {
                self.entries.push(Entry { key, flow });
            }
        }
        if sort {
            self.entries.sort_by(|a, b| a.key.cmp(&b.key));
        }
        self.evict();
    }

    /// Merge a batch and return the flows that are genuinely new and still
    /// held after eviction. Its length is the diff count.
    pub fn add_flows(&mut self, flows: impl IntoIterator<Item = Arc<Flow>>) -> Vec<Arc<Flow>> {
        // 1) Drop duplicates, both against the log and within the batch.
        let mut batch: Vec<Entry> = Vec::new();
        for flow in flows {
            let key = flow.key();
            if self.seen.insert(key.clone()) {
                batch.push(Entry { key, flow });
            }
        }
        if batch.is_empty() {
            return Vec::new();
        }
        batch.sort_by(|a, b| a.key.cmp(&b.key));

        // 2) Everything up to the first new key is already in place; merge the
        //    batch with the remaining tail only.
        let split = self.entries.partition_point(|e| e.key < batch[0].key);
        let tail = self.entries.split_off(split);
        self.entries.reserve(tail.len() + batch.len());

        let mut added: Vec<Arc<Flow>> = Vec::with_capacity(batch.len());
        let mut old = tail.into_iter().peekable();
        let mut new = batch.into_iter().peekable();
        loop {
            let take_new = match (old.peek(), new.peek()) {
                (Some(o), Some(n)) => n.key < o.key,
                (None, Some(_)) => true,
                (Some(_), None) => false,
                (None, None) => break,
            };
            let next = if take_new { new.next() } else { old.next() };
            if let Some(entry) = next {
                if take_new {
                    added.push(entry.flow.clone());
                }
                self.entries.push(entry);
            }
        }

        // 3) Anything new that was evicted straight away is not news.
        let evicted = self.evict();
        if !evicted.is_empty() {
            added.retain(|f| !evicted.contains(&f.key()));
        }
        added
    }

    fn evict(&mut self) -> HashSet<FlowKey> {
        let overflow = self.entries.len().saturating_sub(self.capacity);
        if overflow == 0 {
            return HashSet::new();
        }
        let evicted: HashSet<FlowKey> = self.entries.drain(..overflow).map(|e| e.key).collect();
        for key in &evicted {
            self.seen.remove(key);
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Endpoint, Verdict};
    use pretty_assertions::assert_eq;

    fn flow(ts: i64, src: &str) -> Arc<Flow> {
        Arc::new(Flow::new(
            ts,
            Endpoint::service(src),
            Endpoint::service("dst"),
            Verdict::Forwarded,
        ))
    }

    fn timestamps(reg: &FlowRegistry) -> Vec<i64> {
        reg.iter().map(|f| f.timestamp).collect()
    }

    #[test]
    fn same_batch_twice_counts_once() {
        let mut reg = FlowRegistry::new(100);
        let batch: Vec<_> = (0..5).map(|i| flow(i, "a")).collect();

        assert_eq!(reg.add_flows(batch.clone()).len(), 5);
        assert_eq!(reg.add_flows(batch).len(), 0);
        assert_eq!(reg.len(), 5);
    }

    #[test]
    fn duplicates_within_a_batch_are_dropped() {
        let mut reg = FlowRegistry::new(100);
        let added = reg.add_flows([flow(1, "a"), flow(1, "a"), flow(1, "b")]);
        assert_eq!(added.len(), 2);
    }

    #[test]
    fn unsorted_batch_merges_into_sorted_log() {
        let mut reg = FlowRegistry::new(100);
        reg.add_flows([flow(10, "a"), flow(20, "a"), flow(30, "a")]);
        reg.add_flows([flow(25, "a"), flow(5, "a"), flow(35, "a"), flow(15, "a")]);
        assert_eq!(timestamps(&reg), vec![5, 10, 15, 20, 25, 30, 35]);
    }

    #[test]
    fn chunking_does_not_change_result() {
        let all: Vec<_> = [7, 3, 3, 9, 1, 4, 8, 2, 6, 5]
            .iter()
            .enumerate()
            .map(|(i, ts)| flow(*ts, if i % 2 == 0 { "a" } else { "b" }))
            .collect();

        let mut whole = FlowRegistry::new(100);
        whole.add_flows(all.clone());

        let mut chunked = FlowRegistry::new(100);
        for chunk in all.chunks(3) {
            chunked.add_flows(chunk.to_vec());
        }

        let mut reversed = FlowRegistry::new(100);
        for f in all.iter().rev() {
            reversed.add_flows([f.clone()]);
        }

        let keys = |r: &FlowRegistry| r.iter().map(|f| f.key()).collect::<Vec<_>>();
        assert_eq!(keys(&whole), keys(&chunked));
        assert_eq!(keys(&whole), keys(&reversed));
        assert!(timestamps(&whole).windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut reg = FlowRegistry::new(3);
        reg.add_flows([flow(1, "a"), flow(2, "a"), flow(3, "a")]);
        let added = reg.add_flows([flow(4, "a"), flow(0, "a")]);

        assert_eq!(timestamps(&reg), vec![2, 3, 4]);
        // ts=0 was evicted immediately, only ts=4 is news
        assert_eq!(added.iter().map(|f| f.timestamp).collect::<Vec<_>>(), vec![4]);
    }

    #[test]
    fn evict_before_drops_older_flows_and_forgets_them() {
        let mut reg = FlowRegistry::new(10);
        reg.add_flows([flow(1, "a"), flow(2, "a"), flow(3, "a")]);

        let cut = flow(2, "a").key();
        assert_eq!(reg.evict_before(&cut), 1);
        assert_eq!(timestamps(&reg), vec![2, 3]);
        assert_eq!(reg.first_key(), Some(&cut));
        assert!(!reg.contains(&flow(1, "a").key()));

        // forgotten flows are news again
        assert_eq!(reg.add_flows([flow(1, "a")]).len(), 1);
    }

    #[test]
    fn set_flows_sorts_on_request() {
        let mut reg = FlowRegistry::new(10);
        reg.set_flows([flow(3, "a"), flow(1, "a"), flow(2, "a")], false);
        assert_eq!(timestamps(&reg), vec![3, 1, 2]);

        reg.set_flows([flow(3, "a"), flow(1, "a"), flow(2, "a")], true);
        assert_eq!(timestamps(&reg), vec![1, 2, 3]);
    }
}
