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

use std::fs;

use tempfile::tempdir;
use xorset::error::ErrorKind;
use xorset::filter::XorFilter;

#[test]
fn test_save_and_load_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("filter.xorf");

    let filter = XorFilter::builder()
        .seed(13)
        .build_from(["a", "b", "c"])
        .unwrap();
    filter.save(&path).unwrap();

    let restored = XorFilter::load(&path).unwrap();
    assert_eq!(restored.len(), 3);
    assert_eq!(restored.seed(), filter.seed());
    assert_eq!(restored.fingerprint_bits(), filter.fingerprint_bits());
    for key in ["a", "b", "c", "z", "zz"] {
        assert_eq!(
            restored.contains(key),
            filter.contains(key),
            "answer drift for {key}"
        );
    }
}

/// Loading preserves the overlay as stored; it never folds it into a new
/// snapshot.
#[test]
fn test_load_does_not_rebuild() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("filter.xorf");

    let filter = XorFilter::builder()
        .auto_rebuild(false)
        .build_from((0..100).map(|i| format!("base_{i}")))
        .unwrap();
    filter.add("pending_add");
    filter.remove("base_0");
    let seed = filter.seed();
    filter.save(&path).unwrap();

    let restored = XorFilter::load(&path).unwrap();
    assert_eq!(restored.pending(), 2);
    assert_eq!(restored.seed(), seed);
    assert_eq!(restored.len(), 100);
    assert!(restored.contains("pending_add"));
    assert!(!restored.contains("base_0"));
}

#[test]
fn test_loaded_filter_accepts_further_updates() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("filter.xorf");

    XorFilter::builder()
        .build_from(["a", "b"])
        .unwrap()
        .save(&path)
        .unwrap();

    let restored = XorFilter::load(&path).unwrap();
    assert!(restored.add("c"));
    assert!(restored.remove("a"));
    restored.compact();

    assert!(restored.contains("b"));
    assert!(restored.contains("c"));
    assert_eq!(restored.len(), 2);
    assert_eq!(restored.pending(), 0);
}

#[test]
fn test_load_missing_file_is_io_error() {
    let dir = tempdir().unwrap();
    let err = XorFilter::load(dir.path().join("absent.xorf")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn test_load_garbage_file_is_invalid_format() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("garbage.xorf");
    fs::write(&path, b"definitely not a filter").unwrap();

    let err = XorFilter::load(&path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidFormat);
}

#[test]
fn test_load_truncated_file_is_corrupt() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("truncated.xorf");

    let filter = XorFilter::builder().build_from(["a", "b", "c"]).unwrap();
    let bytes = filter.to_bytes();
    fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

    let err = XorFilter::load(&path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CorruptData);
}
