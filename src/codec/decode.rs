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

use std::io;
use std::io::Cursor;
use std::io::Read;

use byteorder::ReadBytesExt;
use byteorder::LE;

/// A wrapper around a byte slice that provides methods for reading the
/// little-endian fields of the filter format.
pub(crate) struct FilterSlice<'a> {
    slice: Cursor<&'a [u8]>,
}

impl FilterSlice<'_> {
    /// Creates a new `FilterSlice` from the given byte slice.
    pub(crate) fn new(slice: &[u8]) -> FilterSlice<'_> {
        FilterSlice {
            slice: Cursor::new(slice),
        }
    }

    /// Returns the number of bytes left to read.
    pub(crate) fn remaining(&self) -> u64 {
        (self.slice.get_ref().len() as u64).saturating_sub(self.slice.position())
    }

    /// Reads exactly `buf.len()` bytes from the slice into `buf`.
    pub(crate) fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.slice.read_exact(buf)
    }

    /// Reads a single byte from the slice.
    pub(crate) fn read_u8(&mut self) -> io::Result<u8> {
        self.slice.read_u8()
    }

    /// Reads a 16-bit unsigned integer from the slice in little-endian byte
    /// order.
    pub(crate) fn read_u16_le(&mut self) -> io::Result<u16> {
        self.slice.read_u16::<LE>()
    }

    /// Reads a 32-bit unsigned integer from the slice in little-endian byte
    /// order.
    pub(crate) fn read_u32_le(&mut self) -> io::Result<u32> {
        self.slice.read_u32::<LE>()
    }

    /// Reads a 64-bit unsigned integer from the slice in little-endian byte
    /// order.
    pub(crate) fn read_u64_le(&mut self) -> io::Result<u64> {
        self.slice.read_u64::<LE>()
    }

    /// Reads `len` bytes from the slice into a fresh vector. The length is
    /// checked against the remaining input before any allocation so a corrupt
    /// count cannot trigger an oversized reservation.
    pub(crate) fn read_bytes(&mut self, len: u64) -> io::Result<Vec<u8>> {
        if len > self.remaining() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "blob length exceeds remaining input",
            ));
        }

        let mut buf = vec![0_u8; len as usize];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }
}
