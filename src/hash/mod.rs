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

//! Hashing primitives
//!
//! Every table operation derives from a single 64-bit mix of the canonical
//! key bytes and the snapshot seed: the key hash is FNV-1a, the seed is
//! folded in by XOR, and the result is finalized with SplitMix64. The
//! fingerprint and the three slot indices of a key are both carved out of
//! that one mixed word.
//!
//! The hash function and the exact derivation below are part of the
//! serialized format: a table built by one process must probe identically in
//! another, so neither can change without a format version bump.

mod fnv;
mod splitmix;

pub(crate) use self::fnv::fnv1a64;
pub(crate) use self::splitmix::splitmix64;

/// Mixes a canonical key with a seed into the 64-bit word that drives both
/// the fingerprint and the slot indices.
pub(crate) fn mix(key: &[u8], seed: u64) -> u64 {
    splitmix64(fnv1a64(key) ^ seed)
}

/// Folds a mixed word into a 32-bit fingerprint. Callers mask it down to the
/// configured fingerprint width.
pub(crate) fn fingerprint(mixed: u64) -> u32 {
    ((mixed >> 32) ^ (mixed & 0xFFFF_FFFF)) as u32
}

/// Derives the three slot indices of a key from its mixed word.
///
/// The three windows of the mixed word overlap, and the second and third are
/// decorrelated from the first by XOR. Indices are not guaranteed distinct;
/// the peeling pass tolerates coincidences at the price of more frequent
/// build retries.
pub(crate) fn edge(mixed: u64, slots: usize) -> (usize, usize, usize) {
    let a = (mixed & 0xFFFF_FFFF) as u32;
    let b = ((mixed >> 21) & 0xFFFF_FFFF) as u32;
    let c = ((mixed >> 42) & 0xFFFF_FFFF) as u32;

    (
        a as usize % slots,
        (b ^ a) as usize % slots,
        (c ^ a) as usize % slots,
    )
}

#[cfg(test)]
mod tests {
    use super::edge;
    use super::fingerprint;
    use super::mix;

    #[test]
    fn test_mix_depends_on_seed() {
        let a = mix(b"key", 1);
        let b = mix(b"key", 2);
        assert_ne!(a, b);
    }

    #[test]
    fn test_mix_is_deterministic() {
        assert_eq!(mix(b"key", 42), mix(b"key", 42));
        assert_eq!(fingerprint(mix(b"key", 42)), fingerprint(mix(b"key", 42)));
    }

    #[test]
    fn test_edge_indices_in_range() {
        for slots in [1, 2, 3, 7, 1024] {
            for key in [&b"a"[..], b"b", b"longer key material"] {
                let (i0, i1, i2) = edge(mix(key, 9), slots);
                assert!(i0 < slots && i1 < slots && i2 < slots);
            }
        }
    }

    #[test]
    fn test_single_slot_collapses_indices() {
        assert_eq!(edge(mix(b"x", 7), 1), (0, 0, 0));
    }
}
