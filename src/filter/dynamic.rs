// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use parking_lot::MutexGuard;
use rand::Rng;
use tracing::debug;

use crate::filter::builder::build_snapshot;
use crate::filter::builder::XorFilterBuilder;
use crate::filter::snapshot::Snapshot;
use crate::filter::Key;
use crate::filter::KeySet;
use crate::key::FilterKey;

/// Pending overlay entries below which automatic rebuilds never trigger.
const REBUILD_MIN_PENDING: usize = 1000;

/// Pending overlay entries, as a fraction of the snapshot key count, at
/// which automatic rebuilds trigger.
const REBUILD_PENDING_FRACTION: f64 = 0.1;

/// Writer-side state. Lives inside the writer lock, so holding the lock is
/// what grants access to it.
struct WriterState {
    /// Cursor into the SplitMix64 seed sequence used by table builds.
    seed_state: u64,
}

/// An approximate membership filter with dynamic updates.
///
/// The filter holds an immutable XOR-table snapshot plus an overlay of
/// pending additions and removals. Queries consult the overlay first and the
/// table second, so updates are visible immediately; rebuilds fold the
/// overlay into a fresh table either automatically past a threshold or on
/// [`compact`](Self::compact).
///
/// All methods take `&self`: readers are lock-free and any number of threads
/// may query concurrently, while mutations serialize on an internal writer
/// lock. Share the filter across threads with `Arc`.
///
/// # Examples
///
/// ```
/// # use xorset::filter::XorFilter;
/// let filter = XorFilter::new();
///
/// assert!(filter.add("apple"));
/// assert!(!filter.add("apple"));
/// assert!(filter.contains("apple"));
///
/// assert!(filter.remove("apple"));
/// assert!(!filter.contains("apple"));
/// assert!(filter.is_empty());
/// ```
pub struct XorFilter {
    /// Serializes writers; readers never touch it.
    writer: Mutex<WriterState>,
    snapshot: ArcSwap<Snapshot>,
    pending_adds: ArcSwap<KeySet>,
    pending_removes: ArcSwap<KeySet>,
    bits: u32,
    load_factor: f64,
    auto_rebuild: bool,
}

impl XorFilter {
    /// Creates an empty filter with default options (8 fingerprint bits,
    /// load factor 1.23, automatic rebuilds, random seed).
    pub fn new() -> Self {
        Self::from_parts(
            Snapshot::empty(super::builder::DEFAULT_FINGERPRINT_BITS),
            0,
            super::builder::DEFAULT_LOAD_FACTOR,
            true,
            rand::thread_rng().gen(),
        )
    }

    /// Creates a builder for a filter with custom options.
    pub fn builder() -> XorFilterBuilder {
        XorFilterBuilder::new()
    }

    pub(super) fn from_parts(
        snapshot: Snapshot,
        capacity: usize,
        load_factor: f64,
        auto_rebuild: bool,
        seed_state: u64,
    ) -> Self {
        Self::from_state(
            snapshot,
            KeySet::with_capacity(capacity),
            KeySet::new(),
            load_factor,
            auto_rebuild,
            seed_state,
        )
    }

    pub(super) fn from_state(
        snapshot: Snapshot,
        pending_adds: KeySet,
        pending_removes: KeySet,
        load_factor: f64,
        auto_rebuild: bool,
        seed_state: u64,
    ) -> Self {
        let bits = snapshot.bits;
        Self {
            writer: Mutex::new(WriterState { seed_state }),
            snapshot: ArcSwap::from_pointee(snapshot),
            pending_adds: ArcSwap::from_pointee(pending_adds),
            pending_removes: ArcSwap::from_pointee(pending_removes),
            bits,
            load_factor,
            auto_rebuild,
        }
    }

    /// Captures a consistent snapshot/overlay triple under the writer lock.
    /// A lock-free capture could pair a freshly rebuilt snapshot with the
    /// overlay it was folded from, which no longer satisfies the overlay
    /// invariants.
    pub(super) fn locked_state(&self) -> (Arc<Snapshot>, Arc<KeySet>, Arc<KeySet>) {
        let _writer = self.writer.lock();
        (
            self.snapshot.load_full(),
            self.pending_adds.load_full(),
            self.pending_removes.load_full(),
        )
    }

    /// Tests whether a key is possibly in the set. Lock-free.
    ///
    /// Returns:
    /// - `true`: the key is in the effective set, or is a false positive
    ///   (probability at most `2^-bits`)
    /// - `false`: the key is **definitely not** in the effective set
    ///
    /// # Examples
    ///
    /// ```
    /// # use xorset::filter::XorFilter;
    /// let filter = XorFilter::new();
    /// filter.add("apple");
    ///
    /// assert!(filter.contains("apple"));
    /// assert!(!filter.contains("grape"));
    /// ```
    pub fn contains<K: FilterKey + ?Sized>(&self, value: &K) -> bool {
        let key = value.canonical_bytes();
        let key: &[u8] = key.as_ref();

        if self.pending_adds.load().contains(key) {
            return true;
        }
        if self.pending_removes.load().contains(key) {
            return false;
        }
        self.snapshot.load().probe(key)
    }

    /// Adds a key to the set.
    ///
    /// Returns `true` if the key was newly staged for addition, `false` if
    /// the effective set already accounted for it. Re-adding a key with a
    /// pending removal cancels the removal.
    pub fn add<K: FilterKey + ?Sized>(&self, value: &K) -> bool {
        let key = value.canonical_bytes();
        let mut writer = self.writer.lock();

        let snapshot = self.snapshot.load_full();
        if snapshot.keys.contains(key.as_ref()) {
            let removes = self.pending_removes.load_full();
            if removes.contains(key.as_ref()) {
                let mut next = (*removes).clone();
                next.remove(key.as_ref());
                self.pending_removes.store(Arc::new(next));
            }
            return false;
        }

        let adds = self.pending_adds.load_full();
        if adds.contains(key.as_ref()) {
            return false;
        }

        let mut next = (*adds).clone();
        next.insert(Key::from(key.into_owned()));
        self.pending_adds.store(Arc::new(next));
        self.maybe_rebuild(&mut writer);
        true
    }

    /// Removes a key from the set.
    ///
    /// Returns `true` if the key was effectively present (a pending addition
    /// is withdrawn; a snapshot key gains a pending removal), `false`
    /// otherwise.
    pub fn remove<K: FilterKey + ?Sized>(&self, value: &K) -> bool {
        let key = value.canonical_bytes();
        let mut writer = self.writer.lock();

        let adds = self.pending_adds.load_full();
        if adds.contains(key.as_ref()) {
            let mut next = (*adds).clone();
            next.remove(key.as_ref());
            self.pending_adds.store(Arc::new(next));
            return true;
        }

        let snapshot = self.snapshot.load_full();
        if snapshot.keys.contains(key.as_ref()) {
            let removes = self.pending_removes.load_full();
            if !removes.contains(key.as_ref()) {
                let mut next = (*removes).clone();
                next.insert(Key::from(key.into_owned()));
                self.pending_removes.store(Arc::new(next));
                self.maybe_rebuild(&mut writer);
                return true;
            }
        }

        false
    }

    /// Adds every key in `values`, publishing one overlay update and running
    /// the rebuild policy once. Returns the number of keys for which
    /// [`add`](Self::add) would have returned `true`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use xorset::filter::XorFilter;
    /// let filter = XorFilter::new();
    /// assert_eq!(filter.add_all(["a", "b", "c", "a"]), 3);
    /// assert_eq!(filter.len(), 3);
    /// ```
    pub fn add_all<I, K>(&self, values: I) -> usize
    where
        I: IntoIterator<Item = K>,
        K: FilterKey,
    {
        let mut writer = self.writer.lock();

        let snapshot = self.snapshot.load_full();
        let mut adds = (*self.pending_adds.load_full()).clone();
        let mut removes = (*self.pending_removes.load_full()).clone();
        let mut staged = 0;

        for value in values {
            let key = value.canonical_bytes();
            if snapshot.keys.contains(key.as_ref()) {
                removes.remove(key.as_ref());
                continue;
            }
            if adds.insert(Key::from(key.into_owned())) {
                staged += 1;
            }
        }

        self.pending_adds.store(Arc::new(adds));
        self.pending_removes.store(Arc::new(removes));
        self.maybe_rebuild(&mut writer);
        staged
    }

    /// Removes every key in `values`, publishing one overlay update and
    /// running the rebuild policy once. Returns the number of keys for which
    /// [`remove`](Self::remove) would have returned `true`.
    pub fn remove_all<I, K>(&self, values: I) -> usize
    where
        I: IntoIterator<Item = K>,
        K: FilterKey,
    {
        let mut writer = self.writer.lock();

        let snapshot = self.snapshot.load_full();
        let mut adds = (*self.pending_adds.load_full()).clone();
        let mut removes = (*self.pending_removes.load_full()).clone();
        let mut dropped = 0;

        for value in values {
            let key = value.canonical_bytes();
            if adds.remove(key.as_ref()) {
                dropped += 1;
                continue;
            }
            if snapshot.keys.contains(key.as_ref())
                && removes.insert(Key::from(key.into_owned()))
            {
                dropped += 1;
            }
        }

        self.pending_adds.store(Arc::new(adds));
        self.pending_removes.store(Arc::new(removes));
        self.maybe_rebuild(&mut writer);
        dropped
    }

    /// Returns the size of the effective set. Lock-free.
    ///
    /// Concurrent with a rebuild the value may be momentarily stale, but it
    /// is never negative.
    pub fn len(&self) -> usize {
        let keys = self.snapshot.load().keys.len();
        let adds = self.pending_adds.load().len();
        let removes = self.pending_removes.load().len();
        (keys + adds).saturating_sub(removes)
    }

    /// Returns whether the effective set is empty. Lock-free.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of pending overlay entries (additions plus
    /// removals). Zero right after a rebuild. Lock-free.
    pub fn pending(&self) -> usize {
        self.pending_adds.load().len() + self.pending_removes.load().len()
    }

    /// Returns the fingerprint width in bits.
    pub fn fingerprint_bits(&self) -> u32 {
        self.bits
    }

    /// Returns the upper bound on the false-positive rate, `2^-bits`.
    pub fn false_positive_rate(&self) -> f64 {
        (-(self.bits as f64)).exp2()
    }

    /// Returns the seed of the current snapshot.
    pub fn seed(&self) -> u64 {
        self.snapshot.load().seed
    }

    /// Returns the slot count of the current snapshot's table.
    pub fn slots(&self) -> usize {
        self.snapshot.load().slots()
    }

    /// Folds the overlay into a fresh snapshot regardless of the rebuild
    /// threshold.
    ///
    /// # Examples
    ///
    /// ```
    /// # use xorset::filter::XorFilter;
    /// let filter = XorFilter::builder().auto_rebuild(false).build().unwrap();
    /// filter.add_all(["a", "b", "c"]);
    /// assert_eq!(filter.pending(), 3);
    ///
    /// filter.compact();
    /// assert_eq!(filter.pending(), 0);
    /// assert_eq!(filter.len(), 3);
    /// assert!(filter.contains("a"));
    /// ```
    pub fn compact(&self) {
        let mut writer = self.writer.lock();
        self.rebuild(&mut writer);
    }

    fn maybe_rebuild(&self, writer: &mut MutexGuard<'_, WriterState>) {
        if !self.auto_rebuild {
            return;
        }

        let keys = self.snapshot.load().keys.len();
        let pending = self.pending_adds.load().len() + self.pending_removes.load().len();
        let threshold =
            REBUILD_MIN_PENDING.max(((keys as f64) * REBUILD_PENDING_FRACTION).ceil() as usize);

        if pending >= threshold {
            self.rebuild(writer);
        }
    }

    /// Rebuilds the snapshot from the effective set and resets the overlay.
    ///
    /// Publication order is load-bearing: the new snapshot is stored before
    /// the overlay cells are cleared, so a reader that observes an empty
    /// overlay necessarily observes a table that already encodes the folded
    /// keys. The reverse order could answer `false` for a key that was
    /// effectively present throughout.
    fn rebuild(&self, writer: &mut MutexGuard<'_, WriterState>) {
        let snapshot = self.snapshot.load_full();
        let adds = self.pending_adds.load_full();
        let removes = self.pending_removes.load_full();

        let mut keys = snapshot.keys.clone();
        for key in adds.iter() {
            keys.insert(key.clone());
        }
        for key in removes.iter() {
            keys.remove(key);
        }

        let folded_adds = adds.len();
        let folded_removes = removes.len();
        let next = build_snapshot(keys, self.bits, self.load_factor, &mut writer.seed_state);
        debug!(
            keys = next.keys.len(),
            slots = next.slots(),
            folded_adds,
            folded_removes,
            "rebuilt filter snapshot"
        );

        self.snapshot.store(Arc::new(next));
        self.pending_adds.store(Arc::new(KeySet::new()));
        self.pending_removes.store(Arc::new(KeySet::new()));
    }
}

impl Default for XorFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for XorFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XorFilter")
            .field("len", &self.len())
            .field("fingerprint_bits", &self.bits)
            .field("slots", &self.slots())
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::XorFilter;

    fn overlay_invariants_hold(filter: &XorFilter) -> bool {
        let snapshot = filter.snapshot.load_full();
        let adds = filter.pending_adds.load_full();
        let removes = filter.pending_removes.load_full();

        adds.iter().all(|key| !removes.contains(key))
            && adds.iter().all(|key| !snapshot.keys.contains(key))
            && removes.iter().all(|key| snapshot.keys.contains(key))
    }

    #[test]
    fn test_add_remove_contracts() {
        let filter = XorFilter::new();

        assert!(filter.add("a"));
        assert!(!filter.add("a"));
        assert!(filter.remove("a"));
        assert!(!filter.remove("a"));
        assert!(!filter.remove("never-added"));
    }

    #[test]
    fn test_readding_snapshot_key_cancels_pending_removal() {
        let filter = XorFilter::builder().build_from(["a", "b"]).unwrap();

        assert!(filter.remove("a"));
        assert!(!filter.contains("a"));

        // The key is back in the effective set, yet add reports false since
        // the snapshot never stopped carrying it.
        assert!(!filter.add("a"));
        assert!(filter.contains("a"));
        assert_eq!(filter.pending(), 0);
        assert!(overlay_invariants_hold(&filter));
    }

    #[test]
    fn test_removing_snapshot_key_twice_reports_false() {
        let filter = XorFilter::builder().build_from(["a"]).unwrap();

        assert!(filter.remove("a"));
        assert!(!filter.remove("a"));
        assert!(overlay_invariants_hold(&filter));
    }

    #[test]
    fn test_overlay_invariants_across_mutations() {
        let filter = XorFilter::builder()
            .auto_rebuild(false)
            .build_from((0..50).map(|i| format!("base_{i}")))
            .unwrap();

        for i in 0..50 {
            filter.add(&format!("new_{i}"));
        }
        for i in (0..50).step_by(3) {
            filter.remove(&format!("base_{i}"));
        }
        for i in (0..50).step_by(7) {
            filter.add(&format!("base_{i}"));
            filter.remove(&format!("new_{i}"));
        }

        assert!(overlay_invariants_hold(&filter));
        filter.compact();
        assert!(overlay_invariants_hold(&filter));
        assert_eq!(filter.pending(), 0);
    }

    #[test]
    fn test_len_tracks_effective_set() {
        let filter = XorFilter::builder().build_from(["a", "b", "c"]).unwrap();
        assert_eq!(filter.len(), 3);

        filter.add("d");
        assert_eq!(filter.len(), 4);
        filter.remove("a");
        assert_eq!(filter.len(), 3);
        filter.remove("d");
        assert_eq!(filter.len(), 2);
        assert!(!filter.is_empty());
    }

    #[test]
    fn test_auto_rebuild_folds_overlay_at_threshold() {
        let filter = XorFilter::builder().seed(11).build().unwrap();

        for i in 0..999 {
            filter.add(&format!("key_{i}"));
        }
        assert_eq!(filter.pending(), 999);
        assert_eq!(filter.slots(), 0);

        filter.add("key_999");
        assert_eq!(filter.pending(), 0);
        assert_eq!(filter.len(), 1000);
        assert!(filter.slots() >= 1000);
        assert!(filter.contains("key_123"));
    }

    #[test]
    fn test_compact_is_idempotent_on_effective_set() {
        let filter = XorFilter::builder().seed(5).build_from(["a", "b", "c"]).unwrap();
        filter.remove("b");

        filter.compact();
        assert_eq!(filter.len(), 2);
        assert!(filter.contains("a") && filter.contains("c"));

        filter.compact();
        assert_eq!(filter.len(), 2);
        assert!(filter.contains("a") && filter.contains("c"));
        assert_eq!(filter.pending(), 0);
    }

    #[test]
    fn test_batch_ops_match_singular_decisions() {
        let filter = XorFilter::builder().build_from(["a", "b"]).unwrap();

        // "a" and "b" already in the snapshot, the rest are fresh.
        assert_eq!(filter.add_all(["a", "b", "c", "d"]), 2);
        assert_eq!(filter.len(), 4);

        // "b" and "d" effective, "x" unknown, "d" repeated.
        assert_eq!(filter.remove_all(["b", "d", "x", "d"]), 2);
        assert_eq!(filter.len(), 2);
        assert!(filter.contains("a"));
        assert!(!filter.contains("b"));
        assert!(filter.contains("c"));
        assert!(!filter.contains("d"));
    }

    #[test]
    fn test_debug_output_mentions_len() {
        let filter = XorFilter::new();
        filter.add("a");
        let rendered = format!("{filter:?}");
        assert!(rendered.contains("len: 1"), "unexpected debug: {rendered}");
    }
}
