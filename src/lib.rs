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

//! # Dynamic XOR filter
//!
//! An approximate membership filter built on an XOR-filter core. The filter
//! answers "might this key be in the set?" with a bounded false-positive
//! probability of `2^-bits` for a configurable fingerprint width, while a
//! dynamic overlay of pending additions and removals makes the structure
//! updatable between rebuilds of the immutable table.
//!
//! Reads are lock-free: the table snapshot and the overlay sets are published
//! through atomically swapped reference cells, so any number of reader
//! threads can query concurrently with a single writer.
//!
//! ```
//! use xorset::filter::XorFilter;
//!
//! let filter = XorFilter::new();
//! filter.add("apple");
//! filter.add("banana");
//!
//! assert!(filter.contains("apple"));
//! assert!(!filter.contains("grape"));
//! assert_eq!(filter.len(), 2);
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]

pub mod error;
pub mod filter;
pub mod key;

pub(crate) mod codec;
pub(crate) mod hash;
