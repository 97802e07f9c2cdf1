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

//! Binary persistence, format version 1.
//!
//! Little-endian throughout:
//!
//! | field               | size     |
//! |---------------------|----------|
//! | magic `XORF`        | 4 B      |
//! | format version      | u32      |
//! | seed                | u64      |
//! | fingerprint bits    | u8       |
//! | table size `m`      | u64      |
//! | table               | m × u16  |
//! | base key set        | blob     |
//! | pending additions   | blob     |
//! | pending removals    | blob     |
//!
//! A blob is a u64 byte length followed by that many bytes; a key-set blob
//! body is a u64 key count followed by count repetitions of (u64 length,
//! raw key bytes). The stored state round-trips verbatim — loading never
//! triggers a rebuild, so a filter resumes exactly where it was saved.

use std::fs;
use std::path::Path;

use rand::Rng;

use crate::codec::FilterBytes;
use crate::codec::FilterSlice;
use crate::error::Error;
use crate::filter::builder::DEFAULT_LOAD_FACTOR;
use crate::filter::builder::MAX_FINGERPRINT_BITS;
use crate::filter::builder::MIN_FINGERPRINT_BITS;
use crate::filter::snapshot::fingerprint_mask;
use crate::filter::snapshot::Snapshot;
use crate::filter::Key;
use crate::filter::KeySet;
use crate::filter::XorFilter;

const MAGIC: [u8; 4] = *b"XORF";
const FORMAT_VERSION: u32 = 1;

impl XorFilter {
    /// Serializes the filter — snapshot and overlay — to a byte vector.
    ///
    /// # Examples
    ///
    /// ```
    /// # use xorset::filter::XorFilter;
    /// let filter = XorFilter::builder().build_from(["a", "b"]).unwrap();
    /// filter.add("c");
    ///
    /// let restored = XorFilter::from_bytes(&filter.to_bytes()).unwrap();
    /// assert_eq!(restored.len(), 3);
    /// assert!(restored.contains("c"));
    /// assert_eq!(restored.pending(), filter.pending());
    /// ```
    pub fn to_bytes(&self) -> Vec<u8> {
        let (snapshot, adds, removes) = self.locked_state();

        let keys_blob = encode_key_set(&snapshot.keys);
        let adds_blob = encode_key_set(&adds);
        let removes_blob = encode_key_set(&removes);

        let mut bytes = FilterBytes::with_capacity(
            25 + 2 * snapshot.table.len() + 24 + keys_blob.len() + adds_blob.len() + removes_blob.len(),
        );
        bytes.write(&MAGIC);
        bytes.write_u32_le(FORMAT_VERSION);
        bytes.write_u64_le(snapshot.seed);
        bytes.write_u8(snapshot.bits as u8);
        bytes.write_u64_le(snapshot.table.len() as u64);
        for &slot in &snapshot.table {
            bytes.write_u16_le(slot);
        }
        bytes.write_blob(&keys_blob);
        bytes.write_blob(&adds_blob);
        bytes.write_blob(&removes_blob);
        bytes.into_bytes()
    }

    /// Deserializes a filter from bytes produced by
    /// [`to_bytes`](Self::to_bytes).
    ///
    /// The snapshot and overlay are restored as stored; rebuild policy
    /// options are not part of the stream, so the loaded filter uses the
    /// defaults.
    ///
    /// # Errors
    ///
    /// - `InvalidFormat` if the stream does not start with the filter magic
    /// - `UnsupportedVersion` if the format version is unknown
    /// - `CorruptData` if the stream is truncated or internally inconsistent
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut slice = FilterSlice::new(bytes);

        let mut magic = [0_u8; 4];
        slice
            .read_exact(&mut magic)
            .map_err(|_| Error::insufficient_data("magic"))?;
        if magic != MAGIC {
            return Err(Error::invalid_magic(&magic));
        }

        let version = slice
            .read_u32_le()
            .map_err(|_| Error::insufficient_data("format_version"))?;
        if version != FORMAT_VERSION {
            return Err(Error::unsupported_version(FORMAT_VERSION, version));
        }

        let seed = slice
            .read_u64_le()
            .map_err(|_| Error::insufficient_data("seed"))?;
        let bits = u32::from(
            slice
                .read_u8()
                .map_err(|_| Error::insufficient_data("fingerprint_bits"))?,
        );
        if !(MIN_FINGERPRINT_BITS..=MAX_FINGERPRINT_BITS).contains(&bits) {
            return Err(
                Error::corrupt("fingerprint_bits out of range").with_context("fingerprint_bits", bits)
            );
        }
        let mask = fingerprint_mask(bits);

        let slots = slice
            .read_u64_le()
            .map_err(|_| Error::insufficient_data("table_size"))?;
        if slots.checked_mul(2).map_or(true, |len| len > slice.remaining()) {
            return Err(Error::corrupt("table extends past end of stream")
                .with_context("table_size", slots));
        }
        let mut table = Vec::with_capacity(slots as usize);
        for _ in 0..slots {
            let slot = slice
                .read_u16_le()
                .map_err(|_| Error::insufficient_data("table"))?;
            // Only the low `bits` bits of a slot are significant.
            table.push(slot & mask as u16);
        }

        let keys = read_key_set_blob(&mut slice, "keys")?;
        let pending_adds = read_key_set_blob(&mut slice, "pending_adds")?;
        let pending_removes = read_key_set_blob(&mut slice, "pending_removes")?;

        // An empty table cannot encode any key; such a stream would probe
        // false for its own base set.
        if table.is_empty() && !keys.is_empty() {
            return Err(Error::corrupt("non-empty key set with an empty table")
                .with_context("keys", keys.len()));
        }
        validate_overlay(&keys, &pending_adds, &pending_removes)?;

        let snapshot = Snapshot {
            seed,
            bits,
            mask,
            table,
            keys,
        };
        Ok(Self::from_state(
            snapshot,
            pending_adds,
            pending_removes,
            DEFAULT_LOAD_FACTOR,
            true,
            rand::thread_rng().gen(),
        ))
    }

    /// Writes the serialized filter to a file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        fs::write(path, self.to_bytes())?;
        Ok(())
    }

    /// Reads a filter back from a file written by [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, otherwise the errors of
    /// [`from_bytes`](Self::from_bytes).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::from_bytes(&fs::read(path)?)
    }
}

fn encode_key_set(keys: &KeySet) -> Vec<u8> {
    let payload: usize = keys.iter().map(|key| 8 + key.len()).sum();
    let mut bytes = FilterBytes::with_capacity(8 + payload);
    bytes.write_u64_le(keys.len() as u64);
    for key in keys {
        bytes.write_blob(key);
    }
    bytes.into_bytes()
}

fn read_key_set_blob(slice: &mut FilterSlice<'_>, what: &'static str) -> Result<KeySet, Error> {
    let len = slice
        .read_u64_le()
        .map_err(|_| Error::insufficient_data(format!("{what} blob length")))?;
    let blob = slice
        .read_bytes(len)
        .map_err(|_| Error::insufficient_data(format!("{what} blob")))?;
    decode_key_set(&blob, what)
}

fn decode_key_set(blob: &[u8], what: &'static str) -> Result<KeySet, Error> {
    let mut slice = FilterSlice::new(blob);
    let count = slice
        .read_u64_le()
        .map_err(|_| Error::insufficient_data(format!("{what} count")))?;

    // Each key costs at least its 8-byte length prefix, which bounds a
    // plausible count by the blob size.
    if count > slice.remaining() / 8 {
        return Err(Error::corrupt(format!("{what} count exceeds blob size"))
            .with_context("count", count));
    }

    let mut keys = KeySet::with_capacity(count as usize);
    for _ in 0..count {
        let len = slice
            .read_u64_le()
            .map_err(|_| Error::insufficient_data(format!("{what} key length")))?;
        let bytes = slice
            .read_bytes(len)
            .map_err(|_| Error::insufficient_data(format!("{what} key bytes")))?;
        keys.insert(Key::from(bytes));
    }

    if slice.remaining() != 0 {
        return Err(Error::corrupt(format!("{what} blob has trailing bytes")));
    }
    Ok(keys)
}

fn validate_overlay(keys: &KeySet, adds: &KeySet, removes: &KeySet) -> Result<(), Error> {
    if adds.iter().any(|key| removes.contains(key)) {
        return Err(Error::corrupt("pending additions intersect pending removals"));
    }
    if adds.iter().any(|key| keys.contains(key)) {
        return Err(Error::corrupt("pending additions intersect the base key set"));
    }
    if removes.iter().any(|key| !keys.contains(key)) {
        return Err(Error::corrupt("pending removal of a key absent from the base key set"));
    }
    Ok(())
}
