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

//! XOR filter with dynamic updates.
//!
//! An XOR filter encodes a key set as a table of fingerprints in which every
//! key maps to three slots whose XOR equals the key's fingerprint. The table
//! is immutable once built; this module layers a mutable overlay of pending
//! additions and removals on top of it and rebuilds the table when the
//! overlay grows past a threshold.
//!
//! # Properties
//!
//! - **No false negatives**: every key in the effective set answers `true`
//! - **Bounded false positives**: a key outside the effective set answers
//!   `true` with probability at most `2^-bits`
//! - **Lock-free reads**: `contains()` and `len()` never block, even while a
//!   writer is rebuilding the table
//! - **Single writer**: mutations are serialized by an internal lock
//!
//! # Usage
//!
//! ```rust
//! use xorset::filter::XorFilter;
//!
//! let filter = XorFilter::builder()
//!     .fingerprint_bits(10)
//!     .build()
//!     .unwrap();
//!
//! filter.add("apple");
//! filter.add("banana");
//! assert!(filter.contains("apple"));
//! assert!(!filter.contains("grape"));
//!
//! filter.remove("banana");
//! assert!(!filter.contains("banana"));
//!
//! // Fold the overlay into a fresh table.
//! filter.compact();
//! assert_eq!(filter.pending(), 0);
//! assert!(filter.contains("apple"));
//! ```
//!
//! # References
//!
//! - Graf and Lemire (2020). "Xor Filters: Faster and Smaller Than Bloom and
//!   Cuckoo Filters"

mod builder;
mod dynamic;
mod serialization;
mod snapshot;

pub use self::builder::XorFilterBuilder;
pub use self::dynamic::XorFilter;

/// A canonical key as stored in the filter's sets.
pub(crate) type Key = Box<[u8]>;

/// A published set of canonical keys. Never mutated after publication;
/// writers clone, edit, and swap.
pub(crate) type KeySet = std::collections::HashSet<Key>;
