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

use rand::Rng;
use tracing::debug;
use tracing::trace;

use crate::error::Error;
use crate::filter::snapshot::fingerprint_mask;
use crate::filter::snapshot::Snapshot;
use crate::filter::Key;
use crate::filter::KeySet;
use crate::filter::XorFilter;
use crate::hash;
use crate::key::FilterKey;

pub(super) const MIN_FINGERPRINT_BITS: u32 = 4;
pub(super) const MAX_FINGERPRINT_BITS: u32 = 16;
pub(super) const DEFAULT_FINGERPRINT_BITS: u32 = 8;

/// The smallest slots-per-key ratio at which 3-hypergraph peeling succeeds
/// with high probability.
pub(super) const DEFAULT_LOAD_FACTOR: f64 = 1.23;

/// Seed attempts at a given table size before the table grows.
const SEEDS_PER_SIZE: u32 = 10;

/// Table growth applied after a full round of failed seeds.
const GROWTH_FACTOR: f64 = 1.1;

/// Builder for creating [`XorFilter`] instances.
///
/// All options have working defaults; `XorFilter::new()` is shorthand for
/// `XorFilter::builder().build()` with the defaults.
///
/// # Examples
///
/// ```
/// # use xorset::filter::XorFilter;
/// let filter = XorFilter::builder()
///     .capacity(10_000)
///     .fingerprint_bits(12)
///     .auto_rebuild(false)
///     .build()
///     .unwrap();
/// assert!(filter.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct XorFilterBuilder {
    capacity: usize,
    bits: u32,
    load_factor: f64,
    auto_rebuild: bool,
    seed: Option<u64>,
}

impl Default for XorFilterBuilder {
    fn default() -> Self {
        Self {
            capacity: 0,
            bits: DEFAULT_FINGERPRINT_BITS,
            load_factor: DEFAULT_LOAD_FACTOR,
            auto_rebuild: true,
            seed: None,
        }
    }
}

impl XorFilterBuilder {
    /// Creates a builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the expected number of keys. Used as an allocation hint for the
    /// overlay; the filter works at any size regardless.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the fingerprint width in bits (default: 8).
    ///
    /// The false-positive rate is `2^-bits`. Must be in `[4, 16]`.
    pub fn fingerprint_bits(mut self, bits: u32) -> Self {
        self.bits = bits;
        self
    }

    /// Sets the ratio of table slots to keys (default: 1.23).
    ///
    /// Lower values shrink the table but make build retries more frequent;
    /// below roughly 1.23 peeling starts failing routinely. Must be at
    /// least 1.0.
    pub fn load_factor(mut self, load_factor: f64) -> Self {
        self.load_factor = load_factor;
        self
    }

    /// Enables or disables automatic rebuilds (default: enabled).
    ///
    /// When disabled, pending additions and removals accumulate in the
    /// overlay until [`XorFilter::compact`] is called.
    pub fn auto_rebuild(mut self, enabled: bool) -> Self {
        self.auto_rebuild = enabled;
        self
    }

    /// Sets a fixed base seed, making the sequence of table builds
    /// deterministic. By default each filter draws a random base seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builds an empty filter.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `fingerprint_bits` is outside `[4, 16]`
    /// or `load_factor` is below 1.0.
    pub fn build(self) -> Result<XorFilter, Error> {
        self.validate()?;

        let snapshot = Snapshot::empty(self.bits);
        Ok(XorFilter::from_parts(
            snapshot,
            self.capacity,
            self.load_factor,
            self.auto_rebuild,
            self.base_seed(),
        ))
    }

    /// Builds a filter whose initial snapshot encodes the given keys.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` under the same conditions as
    /// [`build`](Self::build).
    ///
    /// # Examples
    ///
    /// ```
    /// # use xorset::filter::XorFilter;
    /// let filter = XorFilter::builder()
    ///     .build_from(["a", "b", "c"])
    ///     .unwrap();
    /// assert_eq!(filter.len(), 3);
    /// assert_eq!(filter.pending(), 0);
    /// assert!(filter.contains("b"));
    /// ```
    pub fn build_from<I, K>(self, keys: I) -> Result<XorFilter, Error>
    where
        I: IntoIterator<Item = K>,
        K: FilterKey,
    {
        self.validate()?;

        let keys: KeySet = keys
            .into_iter()
            .map(|key| Key::from(key.canonical_bytes().into_owned()))
            .collect();

        let mut seed_state = self.base_seed();
        let snapshot = build_snapshot(keys, self.bits, self.load_factor, &mut seed_state);
        Ok(XorFilter::from_parts(
            snapshot,
            self.capacity,
            self.load_factor,
            self.auto_rebuild,
            seed_state,
        ))
    }

    fn validate(&self) -> Result<(), Error> {
        if !(MIN_FINGERPRINT_BITS..=MAX_FINGERPRINT_BITS).contains(&self.bits) {
            return Err(Error::invalid_argument(format!(
                "fingerprint_bits must be in [{MIN_FINGERPRINT_BITS}, {MAX_FINGERPRINT_BITS}]"
            ))
            .with_context("fingerprint_bits", self.bits));
        }
        if self.load_factor < 1.0 {
            return Err(Error::invalid_argument("load_factor must be at least 1.0")
                .with_context("load_factor", self.load_factor));
        }
        Ok(())
    }

    fn base_seed(&self) -> u64 {
        self.seed.unwrap_or_else(|| rand::thread_rng().gen())
    }
}

/// Builds a snapshot encoding `keys`.
///
/// Tries [`SEEDS_PER_SIZE`] seeds at each table size, growing the table by
/// [`GROWTH_FACTOR`] after every full round of failures. At the default load
/// factor the first seed succeeds almost always, so the loop terminates
/// quickly in practice; each growth round raises the success probability
/// further.
///
/// `seed_state` is advanced through the SplitMix64 sequence once per attempt,
/// so a caller holding a fixed base seed gets a reproducible build.
pub(super) fn build_snapshot(
    keys: KeySet,
    bits: u32,
    load_factor: f64,
    seed_state: &mut u64,
) -> Snapshot {
    if keys.is_empty() {
        return Snapshot::empty(bits);
    }

    let mask = fingerprint_mask(bits);
    let ordered: Vec<&Key> = keys.iter().collect();
    let mut slots = initial_slots(ordered.len(), load_factor);
    let mut attempts = 0_u32;

    loop {
        for _ in 0..SEEDS_PER_SIZE {
            *seed_state = hash::splitmix64(*seed_state);
            let seed = *seed_state;
            attempts += 1;

            if let Some(order) = peel(&ordered, seed, slots) {
                let table = assign(&ordered, &order, seed, slots, mask);
                debug!(keys = ordered.len(), slots, attempts, "built xor table");
                return Snapshot {
                    seed,
                    bits,
                    mask,
                    table,
                    keys,
                };
            }

            trace!(attempts, slots, "peeling failed, retrying with a fresh seed");
        }

        slots = grown_slots(slots);
    }
}

fn initial_slots(keys: usize, load_factor: f64) -> usize {
    (((keys as f64) * load_factor).ceil() as usize).max(1)
}

fn grown_slots(slots: usize) -> usize {
    (((slots as f64) * GROWTH_FACTOR).ceil() as usize).max(slots + 1)
}

/// One peeling step: edge `edge` was removed from the hypergraph because
/// `vertex` was its only remaining endpoint of degree one.
type PeelEntry = (usize, usize);

/// Peels the 3-uniform hypergraph induced by `keys` under `seed`.
///
/// Every key is an edge over its three slot indices. Vertices of degree one
/// are removed together with their unique incident edge until the graph is
/// exhausted; the ordered log of removals comes back only if every edge was
/// peeled. Per-vertex state is a degree count and the XOR of incident edge
/// indices, so the unique edge at a degree-one vertex is just its
/// accumulator value.
fn peel(keys: &[&Key], seed: u64, slots: usize) -> Option<Vec<PeelEntry>> {
    let edges: Vec<(usize, usize, usize)> = keys
        .iter()
        .map(|key| hash::edge(hash::mix(key, seed), slots))
        .collect();

    let mut degree = vec![0_u32; slots];
    let mut incident = vec![0_usize; slots];
    for (index, &(a, b, c)) in edges.iter().enumerate() {
        for vertex in [a, b, c] {
            degree[vertex] += 1;
            incident[vertex] ^= index;
        }
    }

    let mut queue: Vec<usize> = (0..slots).filter(|&vertex| degree[vertex] == 1).collect();
    let mut order: Vec<PeelEntry> = Vec::with_capacity(edges.len());

    while let Some(vertex) = queue.pop() {
        // Stale queue entries: the vertex may have lost its last edge since
        // it was enqueued.
        if degree[vertex] != 1 {
            continue;
        }

        let edge = incident[vertex];
        order.push((edge, vertex));

        let (a, b, c) = edges[edge];
        for endpoint in [a, b, c] {
            if degree[endpoint] > 0 {
                degree[endpoint] -= 1;
                incident[endpoint] ^= edge;
                if degree[endpoint] == 1 {
                    queue.push(endpoint);
                }
            }
        }
        degree[vertex] = 0;
    }

    (order.len() == edges.len()).then_some(order)
}

/// Fills the table by replaying the peel log in reverse.
///
/// Walking the log backwards, the peeled slot of each edge is still zero when
/// its turn comes, so setting it to the fingerprint XOR the other two
/// endpoints establishes the snapshot equation for that key without
/// disturbing any key assigned later in the walk.
fn assign(keys: &[&Key], order: &[PeelEntry], seed: u64, slots: usize, mask: u32) -> Vec<u16> {
    let mut table = vec![0_u16; slots];

    for &(edge, vertex) in order.iter().rev() {
        let mixed = hash::mix(keys[edge], seed);
        let (a, b, c) = hash::edge(mixed, slots);

        let mut value = (hash::fingerprint(mixed) & mask) as u16;
        // Skip the peeled slot exactly once; indices may coincide.
        let mut skipped = false;
        for endpoint in [a, b, c] {
            if !skipped && endpoint == vertex {
                skipped = true;
                continue;
            }
            value ^= table[endpoint];
        }
        table[vertex] = value;
    }

    table
}
