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

use crate::filter::KeySet;
use crate::hash;

/// An immutable filter state: the XOR table together with the exact key set
/// it was built from.
///
/// Invariant: for every key in `keys`, the XOR of its three table slots
/// equals its masked fingerprint. The assignment pass of the builder
/// establishes this and nothing mutates a snapshot afterwards, so readers
/// share snapshots freely.
pub(crate) struct Snapshot {
    /// Salt fed into the key mixer. Fresh for every build.
    pub(super) seed: u64,
    /// Fingerprint width in bits, in `[4, 16]`.
    pub(super) bits: u32,
    /// `(1 << bits) - 1`.
    pub(super) mask: u32,
    /// Fingerprint slots, each holding `bits` significant bits.
    pub(super) table: Vec<u16>,
    /// The key set the table encodes.
    pub(super) keys: KeySet,
}

impl Snapshot {
    /// The snapshot of an empty key set: no table, no build work.
    pub(super) fn empty(bits: u32) -> Self {
        Self {
            seed: 0,
            bits,
            mask: fingerprint_mask(bits),
            table: Vec::new(),
            keys: KeySet::new(),
        }
    }

    /// Number of slots in the table.
    pub(super) fn slots(&self) -> usize {
        self.table.len()
    }

    /// XOR-probes the table for a canonical key.
    ///
    /// Exact `true` for every key in `keys`; for any other key, `true` with
    /// probability at most `2^-bits`.
    pub(super) fn probe(&self, key: &[u8]) -> bool {
        if self.table.is_empty() {
            return false;
        }

        let mixed = hash::mix(key, self.seed);
        let fp = hash::fingerprint(mixed) & self.mask;
        let (i0, i1, i2) = hash::edge(mixed, self.table.len());

        u32::from(self.table[i0] ^ self.table[i1] ^ self.table[i2]) == fp
    }
}

/// `(1 << bits) - 1` for fingerprint widths up to 16.
pub(super) fn fingerprint_mask(bits: u32) -> u32 {
    (1_u32 << bits) - 1
}

#[cfg(test)]
mod tests {
    use super::fingerprint_mask;
    use super::Snapshot;

    #[test]
    fn test_empty_snapshot_probes_false() {
        let snapshot = Snapshot::empty(8);
        assert_eq!(snapshot.slots(), 0);
        assert!(!snapshot.probe(b"anything"));
    }

    #[test]
    fn test_fingerprint_mask() {
        assert_eq!(fingerprint_mask(4), 0xF);
        assert_eq!(fingerprint_mask(8), 0xFF);
        assert_eq!(fingerprint_mask(16), 0xFFFF);
    }
}
