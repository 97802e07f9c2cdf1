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

use std::collections::HashSet;

use googletest::assert_that;
use googletest::prelude::le;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use xorset::filter::XorFilter;

#[test]
fn test_fresh_filter_add_and_contains() {
    let filter = XorFilter::new();
    assert!(!filter.contains("a"));

    assert!(filter.add("a"));
    assert!(filter.contains("a"));
    assert_eq!(filter.len(), 1);
}

#[test]
fn test_add_then_remove() {
    let filter = XorFilter::new();

    filter.add("a");
    assert!(filter.contains("a"));

    assert!(filter.remove("a"));
    assert!(!filter.contains("a"));
    assert!(filter.is_empty());
}

#[test]
fn test_batch_add_and_remove() {
    let filter = XorFilter::new();

    filter.add_all(["a", "b", "c", "d"]);
    for key in ["a", "b", "c", "d"] {
        assert!(filter.contains(key), "missing {key}");
    }

    filter.remove_all(["b", "d"]);
    assert!(filter.contains("a"));
    assert!(!filter.contains("b"));
    assert!(filter.contains("c"));
    assert!(!filter.contains("d"));
}

#[test]
fn test_manual_compaction_folds_overlay() {
    let filter = XorFilter::builder().auto_rebuild(false).build().unwrap();

    filter.add_all(["a", "b", "c"]);
    assert_eq!(filter.pending(), 3);
    for key in ["a", "b", "c"] {
        assert!(filter.contains(key));
    }

    filter.compact();
    assert_eq!(filter.pending(), 0);
    assert_eq!(filter.len(), 3);
    for key in ["a", "b", "c"] {
        assert!(filter.contains(key), "lost {key} in compaction");
    }
}

#[test]
fn test_invalid_fingerprint_bits_rejected() {
    for bits in [0, 3, 17, 64] {
        let result = XorFilter::builder().fingerprint_bits(bits).build();
        assert_eq!(
            result.unwrap_err().kind(),
            xorset::error::ErrorKind::InvalidArgument,
            "bits = {bits}"
        );
    }
    for bits in [4, 8, 16] {
        assert!(XorFilter::builder().fingerprint_bits(bits).build().is_ok());
    }
}

#[test]
fn test_invalid_load_factor_rejected() {
    let result = XorFilter::builder().load_factor(0.9).build();
    assert_eq!(
        result.unwrap_err().kind(),
        xorset::error::ErrorKind::InvalidArgument
    );
}

/// Replays a random add/remove workload against a mirror set: every key the
/// mirror holds must answer `true`. False negatives are the one thing the
/// filter may never produce.
#[test]
fn test_no_false_negatives_under_churn() {
    let filter = XorFilter::builder().seed(21).build().unwrap();
    let mut mirror: HashSet<String> = HashSet::new();
    let mut rng = StdRng::seed_from_u64(21);

    for round in 0..40 {
        for _ in 0..100 {
            let key = format!("key_{}", rng.gen_range(0..2000_u32));
            if rng.gen_bool(0.6) {
                filter.add(&key);
                mirror.insert(key);
            } else {
                filter.remove(&key);
                mirror.remove(&key);
            }
        }

        for key in &mirror {
            assert!(filter.contains(key), "false negative for {key} in round {round}");
        }
        assert_eq!(filter.len(), mirror.len(), "size drift in round {round}");
    }

    filter.compact();
    for key in &mirror {
        assert!(filter.contains(key), "false negative for {key} after compact");
    }
}

/// With 8 fingerprint bits the false-positive rate is bounded by 2^-8, about
/// 0.39%; 100k disjoint probes should stay well under 0.6%.
#[test]
fn test_false_positive_rate_within_bound() {
    const KEYS: usize = 100_000;

    let filter = XorFilter::builder()
        .fingerprint_bits(8)
        .seed(17)
        .build_from((0..KEYS).map(|i| format!("member_{i}")))
        .unwrap();

    let mut hits = 0_usize;
    for i in 0..KEYS {
        if filter.contains(&format!("probe_{i}")) {
            hits += 1;
        }
    }

    let rate = hits as f64 / KEYS as f64;
    assert_that!(rate, le(0.006));
}

/// Raising the fingerprint width must tighten the observed rate accordingly.
#[test]
fn test_wider_fingerprints_lower_the_rate() {
    const KEYS: usize = 50_000;

    let filter = XorFilter::builder()
        .fingerprint_bits(12)
        .seed(17)
        .build_from((0..KEYS).map(|i| format!("member_{i}")))
        .unwrap();

    let mut hits = 0_usize;
    for i in 0..KEYS {
        if filter.contains(&format!("probe_{i}")) {
            hits += 1;
        }
    }

    // 2^-12 is ~0.024%; allow generous statistical slack.
    let rate = hits as f64 / KEYS as f64;
    assert_that!(rate, le(0.001));
}

#[test]
fn test_canonical_identity_spans_types() {
    let filter = XorFilter::new();

    filter.add(&42_u64);
    assert!(filter.contains("42"));
    assert!(filter.remove("42"));
    assert!(!filter.contains(&42_u64));

    filter.add(b"raw".as_slice());
    assert!(filter.contains("raw"));
}
